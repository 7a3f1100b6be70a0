//! Status poller: the client side of the stack.
//!
//! Polls the API health route on a fixed interval and keeps a two-line status
//! board (API server, MongoDB) current. The first successful poll emits the
//! client readiness signal; later polls never emit it again.

use std::fmt;
use std::path::Path;
use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::instrument;

use crate::config::ClientConfig;
use crate::record::{ReadinessRecord, RecordError, RecordKind, RecordWriter};

/// Health response as the poller reads it. Both success and error bodies fit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HealthResponse {
    pub status: Option<String>,
    pub mongodb: Option<String>,
    pub message: Option<String>,
}

impl HealthResponse {
    pub fn mongodb_connected(&self) -> bool {
        self.mongodb.as_deref() == Some("connected")
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error("{0}")]
    Transport(#[from] reqwest::Error),

    /// Non-success status; `message` comes from the error body when it has one
    #[error("{message}")]
    Http { status: StatusCode, message: String },

    #[error("unexpected health status '{0}'")]
    Unhealthy(String),
}

/// Fetches the health route once per call.
#[derive(Debug, Clone)]
pub struct HealthPoller {
    http: reqwest::Client,
    health_url: String,
}

impl HealthPoller {
    pub fn new(http: reqwest::Client, health_url: impl Into<String>) -> Self {
        Self {
            http,
            health_url: health_url.into(),
        }
    }

    pub fn health_url(&self) -> &str {
        &self.health_url
    }

    /// One GET of the health route. Only a 2xx with `status == "ok"` succeeds.
    #[instrument(name = "poll", skip(self), fields(url = %self.health_url))]
    pub async fn check_once(&self) -> Result<HealthResponse, PollError> {
        let response = self.http.get(&self.health_url).send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .json::<HealthResponse>()
                .await
                .ok()
                .and_then(|body| body.message)
                .unwrap_or_else(|| format!("HTTP {status}"));
            return Err(PollError::Http { status, message });
        }

        let body: HealthResponse = response.json().await?;
        match body.status.as_deref() {
            Some("ok") => Ok(body),
            other => Err(PollError::Unhealthy(other.unwrap_or_default().to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineState {
    Pending,
    Success,
    Error,
}

/// One visible status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusLine {
    pub text: String,
    pub state: LineState,
}

impl StatusLine {
    fn new(text: impl Into<String>, state: LineState) -> Self {
        Self {
            text: text.into(),
            state,
        }
    }
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let marker = match self.state {
            LineState::Pending => "..",
            LineState::Success => "ok",
            LineState::Error => "!!",
        };
        write!(f, "[{marker}] {}", self.text)
    }
}

/// The poller's display: API server line above MongoDB line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusBoard {
    pub api: StatusLine,
    pub mongodb: StatusLine,
}

impl Default for StatusBoard {
    fn default() -> Self {
        Self {
            api: StatusLine::new("API Server: Checking...", LineState::Pending),
            mongodb: StatusLine::new("MongoDB: Checking...", LineState::Pending),
        }
    }
}

impl StatusBoard {
    /// Replace the displayed state with the outcome of one poll.
    pub fn apply(&mut self, outcome: &Result<HealthResponse, PollError>) {
        match outcome {
            Ok(response) => {
                self.api = StatusLine::new("API Server: Connected", LineState::Success);
                self.mongodb = if response.mongodb_connected() {
                    StatusLine::new("MongoDB: Connected", LineState::Success)
                } else {
                    StatusLine::new("MongoDB: Status Unknown", LineState::Error)
                };
            }
            Err(e) => {
                self.api = StatusLine::new(format!("API Server: Error - {e}"), LineState::Error);
                self.mongodb = StatusLine::new("MongoDB: Status Unknown", LineState::Error);
            }
        }
    }
}

impl fmt::Display for StatusBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}\n{}", self.api, self.mongodb)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error(transparent)]
    Record(#[from] RecordError),

    #[error("Failed to POST readiness signal: {0}")]
    Post(#[from] reqwest::Error),
}

/// Where the client readiness signal goes.
#[derive(Debug)]
pub enum ReadinessSignal {
    /// Write `client_status.json` into the runtime directory
    File(RecordWriter),
    /// POST the record document to a side-channel URL
    Post { http: reqwest::Client, url: String },
}

impl ReadinessSignal {
    pub fn from_config(http: reqwest::Client, config: &ClientConfig, runtime_dir: &Path) -> Self {
        match &config.ready_url {
            Some(url) => ReadinessSignal::Post {
                http,
                url: url.clone(),
            },
            None => ReadinessSignal::File(RecordWriter::new(RecordKind::Client, runtime_dir)),
        }
    }

    /// Emit the signal. Consumes the signal, so it can only be sent once.
    pub async fn emit(self) -> Result<(), SignalError> {
        match self {
            ReadinessSignal::File(writer) => {
                writer.write().await?;
            }
            ReadinessSignal::Post { http, url } => {
                let record = ReadinessRecord::new(RecordKind::Client);
                http.post(&url)
                    .json(&record.document())
                    .send()
                    .await?
                    .error_for_status()?;
                tracing::info!(%url, "Readiness signal posted");
            }
        }
        Ok(())
    }
}

/// A repeating poll of the health route.
pub struct PollLoop {
    poller: HealthPoller,
    interval: Duration,
    signal: Option<ReadinessSignal>,
    board: StatusBoard,
}

impl PollLoop {
    /// `interval` must be non-zero.
    pub fn new(poller: HealthPoller, interval: Duration, signal: ReadinessSignal) -> Self {
        Self {
            poller,
            interval,
            signal: Some(signal),
            board: StatusBoard::default(),
        }
    }

    /// Run a single poll, update the board, and emit the signal on first success.
    pub async fn poll(&mut self) -> Result<(), PollError> {
        let outcome = self.poller.check_once().await;
        self.board.apply(&outcome);

        match outcome {
            Ok(_) => {
                if let Some(signal) = self.signal.take() {
                    if let Err(e) = signal.emit().await {
                        tracing::error!(error = %e, "Failed to emit client readiness signal");
                    }
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, url = %self.poller.health_url(), "Health check failed");
                Err(e)
            }
        }
    }

    pub fn board(&self) -> &StatusBoard {
        &self.board
    }

    /// Start polling in the background: one poll immediately, then one per interval.
    pub fn spawn(mut self) -> PollerHandle {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
        let (board_tx, board_rx) = watch::channel(self.board.clone());

        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut stop_rx => break,
                    _ = ticker.tick() => {
                        // Errors are already logged and shown on the board
                        let _ = self.poll().await;
                        board_tx.send_replace(self.board.clone());
                    }
                }
            }

            tracing::debug!("Poll loop stopped");
            self.board
        });

        PollerHandle {
            stop: stop_tx,
            task,
            board: board_rx,
        }
    }
}

/// Handle to a running [`PollLoop`].
pub struct PollerHandle {
    stop: oneshot::Sender<()>,
    task: JoinHandle<StatusBoard>,
    board: watch::Receiver<StatusBoard>,
}

impl PollerHandle {
    /// Receiver that observes the board after every poll
    pub fn subscribe(&self) -> watch::Receiver<StatusBoard> {
        self.board.clone()
    }

    /// Stop the loop after any in-flight poll and return the final board.
    pub async fn stop(self) -> StatusBoard {
        // The loop may already have exited; nothing to stop then
        let _ = self.stop.send(());
        match self.task.await {
            Ok(board) => board,
            Err(e) => {
                tracing::error!(error = %e, "Poll loop task failed");
                self.board.borrow().clone()
            }
        }
    }
}
