//! Health check endpoint for the stack's client and orchestration.
//!
//! Unlike a bare liveness probe, every request re-checks MongoDB, so the
//! response reflects the dependency's reachability at request time.

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

/// Body of a successful health check
#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub mongodb: &'static str,
}

impl HealthReport {
    fn connected() -> Self {
        Self {
            status: "ok",
            mongodb: "connected",
        }
    }
}

/// Health check handler.
///
/// Pings MongoDB and reports `{"status":"ok","mongodb":"connected"}`. A failed
/// ping becomes a 500 with the driver's error text via [`AppError`].
#[instrument(name = "health::health", skip(state))]
pub async fn health(State(state): State<AppState>) -> Result<Json<HealthReport>, AppError> {
    state.liveness.check().await?;
    Ok(Json(HealthReport::connected()))
}
