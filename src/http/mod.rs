//! HTTP server module.
//!
//! The server includes:
//! - Listener binding with a dedicated bind error
//! - A write-once readiness record as soon as the listener is bound
//! - Graceful shutdown on SIGTERM/SIGINT

mod server;
mod shutdown;

pub use server::{bind, serve, ServerError};
pub use shutdown::shutdown_signal;
