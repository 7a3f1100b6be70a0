//! Shared application state for request handlers.

use std::sync::Arc;

use crate::liveness::LivenessCheck;

/// Shared application state, cloneable across handlers via Arc-wrapped fields.
///
/// Holds the liveness check the health route runs on every request.
#[derive(Clone)]
pub struct AppState {
    pub liveness: Arc<dyn LivenessCheck>,
}

impl AppState {
    /// Creates a new application state around the given liveness check.
    pub fn new(liveness: Arc<dyn LivenessCheck>) -> Self {
        Self { liveness }
    }
}
