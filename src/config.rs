//! Configuration loading and constants.
//!
//! Loads application configuration from JSON or TOML files and defines the
//! defaults every component falls back to when no file is given. `AppConfig` is
//! the root configuration struct shared by the probe, the API service and the
//! status poller.

use const_format::formatcp;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

// =============================================================================
// MongoDB Defaults
// =============================================================================

/// Container hostname used when no configuration overrides it
pub const DEFAULT_MONGODB_URL: &str = "mongodb://pnr_mongodb:27017";

// =============================================================================
// Probe Retry Constants
// =============================================================================

/// Attempts before the probe declares MongoDB unreachable
pub const DEFAULT_PROBE_MAX_ATTEMPTS: u32 = 30;

/// Fixed delay between probe attempts in milliseconds (no backoff growth)
pub const DEFAULT_PROBE_DELAY_MS: u64 = 1000;

/// Server selection timeout for a single probe attempt, so one attempt fails fast
pub const DEFAULT_PROBE_SERVER_SELECTION_TIMEOUT_MS: u64 = 1000;

// =============================================================================
// HTTP API
// =============================================================================

pub const DEFAULT_API_HOST: &str = "0.0.0.0";
pub const DEFAULT_API_PORT: u16 = 3000;

/// Route serving the dependency health report
pub const HEALTH_PATH: &str = "/api/health";

pub const CORS_ALLOW_ORIGIN: &str = "*";
pub const CORS_ALLOW_METHODS: &str = "GET, POST, OPTIONS";
pub const CORS_ALLOW_HEADERS: &str = "Content-Type";

// =============================================================================
// Status Poller
// =============================================================================

/// Health URL polled when none is configured
pub const DEFAULT_HEALTH_URL: &str =
    formatcp!("http://localhost:{}{}", DEFAULT_API_PORT, HEALTH_PATH);

/// Seconds between polls of the health route
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;

// =============================================================================
// Default Paths and Strings
// =============================================================================

/// Shared directory readiness records are written to
pub const DEFAULT_RUNTIME_DIR: &str = "/runtime";

/// Default log filter when RUST_LOG is not set
pub const DEFAULT_LOG_FILTER: &str = "stackcheck=debug";

/// Default log format (text or json)
pub const DEFAULT_LOG_FORMAT: &str = "text";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    /// MongoDB connection settings
    #[serde(default)]
    pub mongodb: MongoConfig,
    /// HTTP API listener
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Readiness probe retry budget
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Status poller settings
    #[serde(default)]
    pub client: ClientConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MongoConfig {
    #[serde(default = "MongoConfig::default_url")]
    pub url: String,
    /// Driver options, keyed the way MongoDB connection strings spell them
    #[serde(default)]
    pub options: MongoOptions,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            url: Self::default_url(),
            options: MongoOptions::default(),
        }
    }
}

impl MongoConfig {
    fn default_url() -> String {
        DEFAULT_MONGODB_URL.to_string()
    }
}

/// Driver options recognised from the config file.
///
/// Keys that the Rust driver has no equivalent for (for example the legacy
/// `useNewUrlParser` flag) are collected in `unrecognized` and ignored.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MongoOptions {
    #[serde(rename = "serverSelectionTimeoutMS")]
    pub server_selection_timeout_ms: Option<u64>,
    #[serde(rename = "connectTimeoutMS")]
    pub connect_timeout_ms: Option<u64>,
    #[serde(rename = "appName")]
    pub app_name: Option<String>,
    #[serde(rename = "maxPoolSize")]
    pub max_pool_size: Option<u32>,
    #[serde(rename = "directConnection")]
    pub direct_connection: Option<bool>,
    #[serde(flatten)]
    pub unrecognized: BTreeMap<String, serde_json::Value>,
}

/// HTTP API listener configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "ApiConfig::default_host")]
    pub host: String,
    #[serde(default = "ApiConfig::default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: Self::default_host(),
            port: Self::default_port(),
        }
    }
}

impl ApiConfig {
    fn default_host() -> String {
        DEFAULT_API_HOST.to_string()
    }

    fn default_port() -> u16 {
        DEFAULT_API_PORT
    }

    /// `host:port` string suitable for binding
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RuntimeConfig {
    /// Directory holding readiness records
    #[serde(default = "RuntimeConfig::default_dir")]
    pub dir: PathBuf,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            dir: Self::default_dir(),
        }
    }
}

impl RuntimeConfig {
    fn default_dir() -> PathBuf {
        PathBuf::from(DEFAULT_RUNTIME_DIR)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Retry budget (must be at least 1)
    #[serde(default = "ProbeConfig::default_max_attempts")]
    pub max_attempts: u32,
    /// Constant delay between attempts
    #[serde(default = "ProbeConfig::default_delay_ms")]
    pub delay_ms: u64,
    /// Server selection timeout applied when the driver options leave it unset
    #[serde(default = "ProbeConfig::default_server_selection_timeout_ms")]
    pub server_selection_timeout_ms: u64,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            max_attempts: Self::default_max_attempts(),
            delay_ms: Self::default_delay_ms(),
            server_selection_timeout_ms: Self::default_server_selection_timeout_ms(),
        }
    }
}

impl ProbeConfig {
    fn default_max_attempts() -> u32 {
        DEFAULT_PROBE_MAX_ATTEMPTS
    }

    fn default_delay_ms() -> u64 {
        DEFAULT_PROBE_DELAY_MS
    }

    fn default_server_selection_timeout_ms() -> u64 {
        DEFAULT_PROBE_SERVER_SELECTION_TIMEOUT_MS
    }

    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// URL of the API health route
    #[serde(default = "ClientConfig::default_health_url")]
    pub health_url: String,
    /// Seconds between polls (must be at least 1)
    #[serde(default = "ClientConfig::default_interval_secs")]
    pub interval_secs: u64,
    /// When set, the readiness signal is POSTed here instead of written to the runtime dir
    pub ready_url: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            health_url: Self::default_health_url(),
            interval_secs: Self::default_interval_secs(),
            ready_url: None,
        }
    }
}

impl ClientConfig {
    fn default_health_url() -> String {
        DEFAULT_HEALTH_URL.to_string()
    }

    fn default_interval_secs() -> u64 {
        DEFAULT_POLL_INTERVAL_SECS
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log format: "text" (human-readable, default) or "json" (structured)
    #[serde(default = "LoggingConfig::default_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: DEFAULT_LOG_FORMAT.to_string(),
        }
    }
}

impl LoggingConfig {
    fn default_format() -> String {
        DEFAULT_LOG_FORMAT.to_string()
    }

    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

impl AppConfig {
    /// Load configuration from a `.toml` file, or from JSON for any other extension.
    ///
    /// A JSON document may nest the settings under an `env` key, which is how the
    /// stack's shared domain file lays them out.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        let config = match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => toml::from_str(&contents)?,
            _ => Self::from_json(&contents)?,
        };

        config.validate()?;
        Ok(config)
    }

    fn from_json(contents: &str) -> Result<Self, ConfigError> {
        let mut document: serde_json::Value = serde_json::from_str(contents)?;
        if let Some(env) = document.get_mut("env") {
            document = env.take();
        }
        Ok(serde_json::from_value(document)?)
    }

    /// Reject settings no component can run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.probe.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "probe.max_attempts must be at least 1".to_string(),
            ));
        }
        if self.client.interval_secs == 0 {
            return Err(ConfigError::Validation(
                "client.interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse TOML config: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Failed to parse JSON config: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Configuration error: {0}")]
    Validation(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(suffix).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_log_filter_targets_crate() {
        assert_eq!(DEFAULT_LOG_FILTER, "stackcheck=debug");
        assert!(tracing_subscriber::EnvFilter::try_new(DEFAULT_LOG_FILTER).is_ok());
    }

    #[test]
    fn test_defaults_match_container_layout() {
        let config = AppConfig::default();
        assert_eq!(config.mongodb.url, "mongodb://pnr_mongodb:27017");
        assert_eq!(config.api.bind_addr(), "0.0.0.0:3000");
        assert_eq!(config.runtime.dir, PathBuf::from("/runtime"));
        assert_eq!(config.probe.max_attempts, 30);
        assert_eq!(config.probe.delay(), Duration::from_secs(1));
        assert_eq!(config.client.health_url, "http://localhost:3000/api/health");
        assert_eq!(config.client.interval(), Duration::from_secs(5));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_json_with_env_wrapper() {
        let file = write_config(
            ".json",
            r#"{
                "name": "pnr_stack",
                "env": {
                    "mongodb": {
                        "url": "mongodb://db:27017",
                        "options": { "useNewUrlParser": true, "serverSelectionTimeoutMS": 2500 }
                    },
                    "api": { "host": "127.0.0.1", "port": 4000 }
                }
            }"#,
        );
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.mongodb.url, "mongodb://db:27017");
        assert_eq!(config.mongodb.options.server_selection_timeout_ms, Some(2500));
        assert!(config.mongodb.options.unrecognized.contains_key("useNewUrlParser"));
        assert_eq!(config.api.bind_addr(), "127.0.0.1:4000");
        // Sections absent from the file keep their defaults
        assert_eq!(config.probe.max_attempts, DEFAULT_PROBE_MAX_ATTEMPTS);
    }

    #[test]
    fn test_load_bare_json() {
        let file = write_config(".json", r#"{ "api": { "port": 8080 } }"#);
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.api.host, DEFAULT_API_HOST);
        assert_eq!(config.api.port, 8080);
        assert_eq!(config.mongodb.url, DEFAULT_MONGODB_URL);
    }

    #[test]
    fn test_load_toml() {
        let file = write_config(
            ".toml",
            r#"
[mongodb]
url = "mongodb://localhost:27017"

[mongodb.options]
appName = "stackcheck"

[runtime]
dir = "/tmp/runtime"

[probe]
max_attempts = 5
delay_ms = 250

[logging]
format = "json"
"#,
        );
        let config = AppConfig::load(file.path()).unwrap();
        assert_eq!(config.mongodb.options.app_name.as_deref(), Some("stackcheck"));
        assert_eq!(config.runtime.dir, PathBuf::from("/tmp/runtime"));
        assert_eq!(config.probe.max_attempts, 5);
        assert_eq!(config.probe.delay(), Duration::from_millis(250));
        assert!(config.logging.is_json());
    }

    #[test]
    fn test_load_malformed_json_is_parse_error() {
        let file = write_config(".json", "{ not json");
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(ConfigError::Json(_))
        ));
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        assert!(matches!(
            AppConfig::load("/nonexistent/stackcheck.json"),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_zero_attempt_budget_rejected() {
        let file = write_config(".json", r#"{ "probe": { "max_attempts": 0 } }"#);
        assert!(matches!(
            AppConfig::load(file.path()),
            Err(ConfigError::Validation(_))
        ));
    }
}
