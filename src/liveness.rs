//! MongoDB liveness checks.
//!
//! A liveness check is a single `ping` round trip. It confirms reachability and
//! nothing else. Two flavours exist: [`MongoProbe`] builds and tears down its own
//! client on every check, while [`MongoLiveness`] reuses one connected client.

use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::doc;
use mongodb::options::ClientOptions;
use mongodb::Client;

use crate::config::MongoConfig;

/// Database the ping command is issued against
const PING_DATABASE: &str = "admin";

/// Dependency unreachable, or the ping itself failed.
#[derive(Debug, thiserror::Error)]
pub enum ConnectivityError {
    #[error(transparent)]
    Driver(#[from] mongodb::error::Error),

    /// Failure reported by a check that is not backed by the driver
    #[error("{0}")]
    Unreachable(String),
}

/// A single round-trip reachability check against a dependency.
#[async_trait]
pub trait LivenessCheck: Send + Sync {
    async fn check(&self) -> Result<(), ConnectivityError>;
}

/// Build driver options from the connection URL plus the configured overrides.
pub async fn client_options(config: &MongoConfig) -> Result<ClientOptions, ConnectivityError> {
    let mut options = ClientOptions::parse(config.url.as_str()).await?;
    let overrides = &config.options;

    if let Some(ms) = overrides.server_selection_timeout_ms {
        options.server_selection_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(ms) = overrides.connect_timeout_ms {
        options.connect_timeout = Some(Duration::from_millis(ms));
    }
    if let Some(name) = &overrides.app_name {
        options.app_name = Some(name.clone());
    }
    if let Some(size) = overrides.max_pool_size {
        options.max_pool_size = Some(size);
    }
    if let Some(direct) = overrides.direct_connection {
        options.direct_connection = Some(direct);
    }
    if !overrides.unrecognized.is_empty() {
        tracing::debug!(
            keys = ?overrides.unrecognized.keys().collect::<Vec<_>>(),
            "Ignoring MongoDB options with no driver equivalent"
        );
    }

    Ok(options)
}

async fn ping(client: &Client) -> Result<(), ConnectivityError> {
    client
        .database(PING_DATABASE)
        .run_command(doc! { "ping": 1 })
        .await?;
    Ok(())
}

/// Opens a fresh client per check and always shuts it down afterwards.
#[derive(Debug, Clone)]
pub struct MongoProbe {
    config: MongoConfig,
    server_selection_timeout: Duration,
}

impl MongoProbe {
    /// `server_selection_timeout` applies only when neither the URL nor the
    /// configured options already set one.
    pub fn new(config: MongoConfig, server_selection_timeout: Duration) -> Self {
        Self {
            config,
            server_selection_timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.config.url
    }
}

#[async_trait]
impl LivenessCheck for MongoProbe {
    async fn check(&self) -> Result<(), ConnectivityError> {
        let mut options = client_options(&self.config).await?;
        options
            .server_selection_timeout
            .get_or_insert(self.server_selection_timeout);

        let client = Client::with_options(options)?;
        let result = ping(&client).await;
        client.shutdown().await;
        result
    }
}

/// Pings through one long-lived client, as the API service does per request.
#[derive(Debug, Clone)]
pub struct MongoLiveness {
    client: Client,
}

impl MongoLiveness {
    /// Connect and confirm the server answers a ping.
    pub async fn connect(config: &MongoConfig) -> Result<Self, ConnectivityError> {
        let options = client_options(config).await?;
        let client = Client::with_options(options)?;
        if let Err(e) = ping(&client).await {
            client.shutdown().await;
            return Err(e);
        }
        Ok(Self { client })
    }
}

#[async_trait]
impl LivenessCheck for MongoLiveness {
    async fn check(&self) -> Result<(), ConnectivityError> {
        ping(&self.client).await
    }
}
