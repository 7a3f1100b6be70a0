//! Errors surfaced through HTTP handlers.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::liveness::ConnectivityError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Connectivity(#[from] ConnectivityError),
}

/// JSON body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Connectivity(e) => {
                tracing::warn!(error = %e, "MongoDB liveness check failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            status: "error",
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
