//! Service configuration
//!
//! Layered with the `config` crate: built-in defaults, then an optional TOML
//! file (path in `INGESTION_CONFIG`, default `ingestion.toml`), then
//! environment variables prefixed `INGESTION__` with `__` as the section
//! separator, e.g. `INGESTION__ENRICHMENT__TIMEOUT_MS=2000`.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File, FileFormat};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

pub const CONFIG_PATH_ENV: &str = "INGESTION_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "ingestion.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_bus_capacity() -> usize {
    1024
}

fn default_enrichment_endpoint() -> String {
    "http://localhost:5005/agent".to_string()
}

fn default_enrichment_timeout_ms() -> u64 {
    5_000
}

fn default_true() -> bool {
    true
}

fn default_visualization_endpoints() -> Vec<String> {
    vec!["ws://localhost:8081/ws/unity".to_string()]
}

fn default_send_timeout_ms() -> u64 {
    2_000
}

fn default_connect_timeout_ms() -> u64 {
    5_000
}

fn default_session_queue() -> usize {
    256
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct BusConfig {
    #[serde(default = "default_bus_capacity")]
    pub capacity: usize,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            capacity: default_bus_capacity(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file; in-memory storage when unset.
    #[serde(default)]
    pub sqlite_path: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_enrichment_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_enrichment_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: default_enrichment_endpoint(),
            timeout_ms: default_enrichment_timeout_ms(),
        }
    }
}

impl EnrichmentConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct VisualizationConfig {
    /// Outbound endpoints dialled once at startup.
    #[serde(default = "default_visualization_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Budget for the TCP connect plus websocket handshake of one endpoint.
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Pending frames per inbound client before it counts as lagging.
    #[serde(default = "default_session_queue")]
    pub session_queue: usize,
}

impl VisualizationConfig {
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self {
            endpoints: default_visualization_endpoints(),
            send_timeout_ms: default_send_timeout_ms(),
            connect_timeout_ms: default_connect_timeout_ms(),
            session_queue: default_session_queue(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub bus: BusConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub enrichment: EnrichmentConfig,
    #[serde(default)]
    pub visualization: VisualizationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ServiceConfig {
    /// Load from the file named by `INGESTION_CONFIG` (if present) and the
    /// environment.
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_sources(Some(Path::new(&path)), true)
    }

    /// Build from an optional TOML file, optionally overlaid with
    /// `INGESTION__*` environment variables.
    pub fn from_sources(path: Option<&Path>, with_env: bool) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            debug!(path = %path.display(), "Reading configuration file");
            builder = builder.add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            );
        }
        if with_env {
            builder = builder.add_source(
                Environment::with_prefix("INGESTION")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("visualization.endpoints")
                    .try_parsing(true),
            );
        }

        let config: ServiceConfig = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.enrichment.enabled && self.enrichment.timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "enrichment.timeout_ms must be greater than zero".into(),
            ));
        }
        if self.bus.capacity == 0 {
            return Err(ConfigError::Invalid("bus.capacity must be greater than zero".into()));
        }
        if self.visualization.send_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "visualization.send_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.visualization.connect_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "visualization.connect_timeout_ms must be greater than zero".into(),
            ));
        }
        if self.visualization.session_queue == 0 {
            return Err(ConfigError::Invalid(
                "visualization.session_queue must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
