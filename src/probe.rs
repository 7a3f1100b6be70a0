//! Readiness probe: retry a liveness check on a fixed interval until it passes.
//!
//! The probe is a small state machine. Each attempt runs one check; success
//! writes the MongoDB readiness record and ends the probe, failure either
//! schedules another attempt after a constant delay or, once the retry budget is
//! spent, ends the probe with the last error. The delay never grows.

use std::path::PathBuf;
use std::time::Duration;

use tracing::instrument;

use crate::config::ProbeConfig;
use crate::liveness::{ConnectivityError, LivenessCheck};
use crate::record::{RecordError, RecordWriter};

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    RetryAfter(Duration),
    Exhausted,
}

/// Attempt counter, budget and delay, threaded through the retry loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryState {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl RetryState {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            delay,
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.max_attempts, config.delay())
    }

    /// Failed attempts recorded so far
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Count a failed attempt and decide whether another one is allowed.
    pub fn record_failure(&mut self) -> RetryDecision {
        self.attempts += 1;
        if self.attempts >= self.max_attempts {
            RetryDecision::Exhausted
        } else {
            RetryDecision::RetryAfter(self.delay)
        }
    }
}

/// Outcome of a successful probe
#[derive(Debug)]
pub struct ProbeReport {
    /// Attempts made, including the successful one
    pub attempts: u32,
    pub record_path: PathBuf,
}

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("Failed to connect to MongoDB after {attempts} attempts: {last_error}")]
    Exhausted {
        attempts: u32,
        #[source]
        last_error: ConnectivityError,
    },

    #[error(transparent)]
    Record(#[from] RecordError),
}

/// Run `check` until it succeeds or `state`'s budget runs out.
///
/// On success the record is written through `writer` and no further attempts
/// are made. On exhaustion nothing is written.
#[instrument(
    name = "probe",
    skip_all,
    fields(max_attempts = state.max_attempts(), delay_ms = state.delay().as_millis() as u64)
)]
pub async fn run_probe<C>(
    check: &C,
    mut state: RetryState,
    writer: RecordWriter,
) -> Result<ProbeReport, ProbeError>
where
    C: LivenessCheck + ?Sized,
{
    loop {
        let attempt = state.attempts() + 1;
        tracing::debug!(attempt, "Checking MongoDB connectivity");

        let error = match check.check().await {
            Ok(()) => {
                tracing::info!(attempt, "Successfully connected to MongoDB");
                let record_path = writer.write().await?;
                return Ok(ProbeReport {
                    attempts: attempt,
                    record_path,
                });
            }
            Err(e) => e,
        };

        match state.record_failure() {
            RetryDecision::RetryAfter(delay) => {
                tracing::warn!(attempt, error = %error, "MongoDB not ready yet, retrying");
                tokio::time::sleep(delay).await;
            }
            RetryDecision::Exhausted => {
                tracing::error!(
                    attempts = state.attempts(),
                    error = %error,
                    "Retry budget exhausted"
                );
                return Err(ProbeError::Exhausted {
                    attempts: state.attempts(),
                    last_error: error,
                });
            }
        }
    }
}
