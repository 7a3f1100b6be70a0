//! Shared fixtures: scripted liveness checks and an in-process API stub.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::get, routing::post, Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tokio::time::Instant;

use stackcheck::liveness::{ConnectivityError, LivenessCheck};

/// Fails its first `failures` checks, then succeeds. Records when each check ran.
pub struct ScriptedCheck {
    failures: u32,
    calls: Mutex<Vec<Instant>>,
}

impl ScriptedCheck {
    pub fn failing_first(failures: u32) -> Self {
        Self {
            failures,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn always_failing() -> Self {
        Self::failing_first(u32::MAX)
    }

    pub fn calls(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LivenessCheck for ScriptedCheck {
    async fn check(&self) -> Result<(), ConnectivityError> {
        let attempt = {
            let mut calls = self.calls.lock().unwrap();
            calls.push(Instant::now());
            calls.len() as u32
        };
        if attempt <= self.failures {
            Err(ConnectivityError::Unreachable(format!(
                "connection refused (attempt {attempt})"
            )))
        } else {
            Ok(())
        }
    }
}

/// Stand-in for the API service plus a readiness side channel.
#[derive(Clone, Default)]
pub struct StubApi {
    pub unhealthy: Arc<AtomicBool>,
    pub signals: Arc<AtomicUsize>,
    pub last_signal: Arc<Mutex<Option<Value>>>,
}

impl StubApi {
    pub fn set_healthy(&self, healthy: bool) {
        self.unhealthy.store(!healthy, Ordering::SeqCst);
    }

    pub fn signal_count(&self) -> usize {
        self.signals.load(Ordering::SeqCst)
    }

    /// Serve on an ephemeral localhost port
    pub async fn spawn(&self) -> SocketAddr {
        let app = Router::new()
            .route("/api/health", get(health))
            .route("/degraded", get(degraded))
            .route("/ready", post(ready))
            .with_state(self.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }
}

async fn health(State(stub): State<StubApi>) -> (StatusCode, Json<Value>) {
    if stub.unhealthy.load(Ordering::SeqCst) {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "message": "connection refused"})),
        )
    } else {
        (
            StatusCode::OK,
            Json(json!({"status": "ok", "mongodb": "connected"})),
        )
    }
}

async fn degraded() -> Json<Value> {
    Json(json!({"status": "degraded"}))
}

async fn ready(State(stub): State<StubApi>, Json(body): Json<Value>) -> StatusCode {
    stub.signals.fetch_add(1, Ordering::SeqCst);
    *stub.last_signal.lock().unwrap() = Some(body);
    StatusCode::OK
}
