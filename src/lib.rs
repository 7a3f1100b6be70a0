//! stackcheck: readiness tooling for a MongoDB-backed container stack.
//!
//! Three components share this crate:
//! - [`probe`]: retries a MongoDB ping until it succeeds and records readiness
//! - the API service ([`routes`], [`http`]): a per-request MongoDB health route
//! - [`poller`]: polls the health route and shows its status
//!
//! Each writes a [`record::ReadinessRecord`] into a shared runtime directory,
//! which [`status`] reads back.

pub mod config;
pub mod error;
pub mod http;
pub mod liveness;
pub mod middleware;
pub mod poller;
pub mod probe;
pub mod record;
pub mod routes;
pub mod state;
pub mod status;
