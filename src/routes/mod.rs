//! HTTP routes for the API service.
//!
//! The health report is served at `/api/health` and, for clients that poll the
//! root, at `/`. Every response carries permissive CORS headers and `OPTIONS`
//! requests are answered before routing.

pub mod health;

use axum::{middleware, routing::get, Router};
use http::header::{
    HeaderValue, ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
    ACCESS_CONTROL_ALLOW_ORIGIN,
};
use tower_http::set_header::SetResponseHeaderLayer;

use crate::config::{CORS_ALLOW_HEADERS, CORS_ALLOW_METHODS, CORS_ALLOW_ORIGIN, HEALTH_PATH};
use crate::middleware::{preflight_layer, request_id_layer};
use crate::state::AppState;

/// Creates the Axum router with the health routes and CORS headers.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route(HEALTH_PATH, get(health::health))
        .route("/", get(health::health))
        .with_state(state)
        // Preflight short-circuit sits inside the header layers so its response is decorated too
        .layer(middleware::from_fn(preflight_layer))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static(CORS_ALLOW_ORIGIN),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_METHODS,
            HeaderValue::from_static(CORS_ALLOW_METHODS),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            ACCESS_CONTROL_ALLOW_HEADERS,
            HeaderValue::from_static(CORS_ALLOW_HEADERS),
        ))
        // Request ID middleware - creates root span with request_id for correlation
        .layer(middleware::from_fn(request_id_layer))
}
