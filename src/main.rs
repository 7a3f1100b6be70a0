//! stackcheck: readiness tooling for a MongoDB-backed container stack.
//!
//! This is the application entry point. It parses the command line, loads
//! configuration (or falls back to built-in defaults), initializes tracing and
//! runs the selected component: the readiness probe, the API service, the
//! status poller, or the runtime status report.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use stackcheck::config::{AppConfig, ConfigError, DEFAULT_LOG_FILTER};
use stackcheck::http::{self, shutdown_signal, ServerError};
use stackcheck::liveness::{ConnectivityError, MongoLiveness, MongoProbe};
use stackcheck::poller::{HealthPoller, PollError, PollLoop, ReadinessSignal};
use stackcheck::probe::{run_probe, ProbeError, RetryState};
use stackcheck::record::{RecordKind, RecordWriter};
use stackcheck::routes::create_router;
use stackcheck::state::AppState;
use stackcheck::status::{RuntimeState, StatusError};

/// stackcheck: readiness probe, health API and status poller
#[derive(Parser, Debug)]
#[command(name = "stackcheck", version, about)]
struct Args {
    /// Path to a JSON or TOML configuration file (built-in defaults when omitted)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level filter (e.g., "stackcheck=debug")
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    /// Directory readiness records are written to and read from
    #[arg(long, global = true)]
    runtime_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Retry a MongoDB ping until it succeeds, then write mongodb_status.json
    Probe {
        /// MongoDB connection URL
        #[arg(long)]
        mongodb_url: Option<String>,

        /// Attempts before giving up
        #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
        max_attempts: Option<u32>,

        /// Fixed delay between attempts in milliseconds
        #[arg(long)]
        delay_ms: Option<u64>,
    },

    /// Serve the MongoDB health API and write api_status.json once listening
    Serve {
        #[arg(long)]
        host: Option<String>,

        #[arg(long)]
        port: Option<u16>,

        /// MongoDB connection URL
        #[arg(long)]
        mongodb_url: Option<String>,
    },

    /// Poll the API health route and write client_status.json on first success
    Poll {
        /// Health route URL
        #[arg(long)]
        url: Option<String>,

        /// Seconds between polls
        #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: Option<u64>,

        /// Poll once and exit with the result instead of polling forever
        #[arg(long)]
        once: bool,
    },

    /// Print the readiness records in the runtime directory
    Status {
        /// Comma-separated keys that must be affirmed for a zero exit status
        #[arg(long, value_delimiter = ',')]
        require: Vec<String>,
    },
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to connect to MongoDB: {0}")]
    Connectivity(#[from] ConnectivityError),

    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Server(#[from] ServerError),

    #[error("API health check failed: {0}")]
    Poll(#[from] PollError),

    #[error(transparent)]
    Status(#[from] StatusError),

    #[error("Interrupted before MongoDB became reachable")]
    Interrupted,

    #[error("Not ready: {}", .0.join(", "))]
    NotReady(Vec<String>),
}

#[tokio::main]
async fn main() -> ExitCode {
    // Parse command line arguments
    let args = Args::parse();

    // Load configuration before tracing so the log format can come from it
    let config = match &args.config {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    };

    // Initialize tracing with priority: CLI > env > default
    let log_filter = args
        .log_level
        .clone()
        .or_else(|| std::env::var("RUST_LOG").ok())
        .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());
    let json_logs = config
        .as_ref()
        .map(|config| config.logging.is_json())
        .unwrap_or(false);
    init_tracing(&log_filter, json_logs);

    let result = match config {
        Ok(config) => run(args, config).await,
        Err(e) => Err(CliError::from(e)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "stackcheck failed");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout carries only the status output.
fn init_tracing(filter: &str, json: bool) {
    let registry =
        tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::new(filter));

    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run(args: Args, mut config: AppConfig) -> Result<(), CliError> {
    if let Some(dir) = args.runtime_dir {
        config.runtime.dir = dir;
    }

    match args.command {
        Command::Probe {
            mongodb_url,
            max_attempts,
            delay_ms,
        } => {
            if let Some(url) = mongodb_url {
                config.mongodb.url = url;
            }
            if let Some(max_attempts) = max_attempts {
                config.probe.max_attempts = max_attempts;
            }
            if let Some(delay_ms) = delay_ms {
                config.probe.delay_ms = delay_ms;
            }
            probe(config).await
        }
        Command::Serve {
            host,
            port,
            mongodb_url,
        } => {
            if let Some(host) = host {
                config.api.host = host;
            }
            if let Some(port) = port {
                config.api.port = port;
            }
            if let Some(url) = mongodb_url {
                config.mongodb.url = url;
            }
            serve(config).await
        }
        Command::Poll {
            url,
            interval_secs,
            once,
        } => {
            if let Some(url) = url {
                config.client.health_url = url;
            }
            if let Some(interval_secs) = interval_secs {
                config.client.interval_secs = interval_secs;
            }
            poll(config, once).await
        }
        Command::Status { require } => status(config, &require).await,
    }
}

async fn probe(config: AppConfig) -> Result<(), CliError> {
    let check = MongoProbe::new(
        config.mongodb.clone(),
        Duration::from_millis(config.probe.server_selection_timeout_ms),
    );
    tracing::info!(url = %check.url(), "Using MongoDB URL");

    let writer = RecordWriter::new(RecordKind::Mongodb, &config.runtime.dir);
    let state = RetryState::from_config(&config.probe);

    tokio::select! {
        result = run_probe(&check, state, writer) => {
            let report = result?;
            tracing::info!(
                attempts = report.attempts,
                path = %report.record_path.display(),
                "MongoDB is ready"
            );
            Ok(())
        }
        _ = shutdown_signal() => Err(CliError::Interrupted),
    }
}

async fn serve(config: AppConfig) -> Result<(), CliError> {
    // Retrying is the probe's job; the API fails fast if MongoDB is down
    let liveness = MongoLiveness::connect(&config.mongodb).await?;
    tracing::info!("Connected to MongoDB");

    let state = AppState::new(Arc::new(liveness));
    let app = create_router(state);

    let listener = http::bind(&config.api.bind_addr()).await?;
    let ready = RecordWriter::new(RecordKind::Api, &config.runtime.dir);
    http::serve(app, listener, ready, shutdown_signal()).await?;

    Ok(())
}

async fn poll(config: AppConfig, once: bool) -> Result<(), CliError> {
    let client = reqwest::Client::new();
    let poller = HealthPoller::new(client.clone(), config.client.health_url.clone());
    let signal = ReadinessSignal::from_config(client, &config.client, &config.runtime.dir);
    let mut poll_loop = PollLoop::new(poller, config.client.interval(), signal);

    if once {
        let result = poll_loop.poll().await;
        println!("{}", poll_loop.board());
        result?;
        return Ok(());
    }

    tracing::info!(
        url = %config.client.health_url,
        interval_secs = config.client.interval_secs,
        "Polling API health"
    );

    let handle = poll_loop.spawn();
    let mut boards = handle.subscribe();
    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => break,
            changed = boards.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{}\n", *boards.borrow_and_update());
            }
        }
    }

    handle.stop().await;
    Ok(())
}

async fn status(config: AppConfig, require: &[String]) -> Result<(), CliError> {
    let state = RuntimeState::scan(&config.runtime.dir).await?;

    if state.is_empty() {
        println!("No readiness records in {}", config.runtime.dir.display());
    }
    for (key, assertion) in state.iter() {
        println!("{key}\t{:?}\t{}", assertion.tv, assertion.prompt);
    }

    let missing = state.missing(require);
    if missing.is_empty() {
        Ok(())
    } else {
        Err(CliError::NotReady(
            missing.into_iter().map(str::to_string).collect(),
        ))
    }
}
