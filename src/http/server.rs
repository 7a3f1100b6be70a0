//! HTTP server startup logic.

use std::future::Future;

use axum::Router;
use tokio::net::TcpListener;

use crate::record::RecordWriter;

/// Server startup error
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind server to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Server(#[source] std::io::Error),
}

/// Bind the API listener.
pub async fn bind(addr: &str) -> Result<TcpListener, ServerError> {
    TcpListener::bind(addr)
        .await
        .map_err(|source| ServerError::Bind {
            addr: addr.to_string(),
            source,
        })
}

/// Serve `app` on an already-bound listener until `shutdown` resolves.
///
/// The readiness record is written once, after binding and before the first
/// connection is accepted. A failed write is logged; the server keeps running.
pub async fn serve<F>(
    app: Router,
    listener: TcpListener,
    ready: RecordWriter,
    shutdown: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    match listener.local_addr() {
        Ok(addr) => tracing::info!(%addr, "API server listening"),
        Err(e) => tracing::warn!(error = %e, "API server listening on unknown address"),
    }

    if let Err(e) = ready.write().await {
        tracing::error!(error = %e, "Failed to write API readiness record");
    }

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(ServerError::Server)?;

    tracing::info!("API server stopped");
    Ok(())
}
