//! Configuration management for the stream tracker.
//!
//! Layering: built-in defaults, then `config.json` under the base directory
//! if present, then environment variables.

use crate::{CoreError, CoreResult, LogFormat, Paths};
use delivery_transport::TransportConfig;
use event_tracker::TrackerConfig;
use serde::{Deserialize, Serialize};
use std::path::Path;
use url::Url;

/// Default collector endpoint (can be overridden at compile time via STREAM_TRACKER_ENDPOINT).
pub const DEFAULT_ENDPOINT: &str = match option_env!("STREAM_TRACKER_ENDPOINT") {
    Some(url) => url,
    None => delivery_transport::DEFAULT_ENDPOINT,
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default per-request timeout for the HTTP transport.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;

const ENV_LOG_LEVEL: &str = "STREAM_TRACKER_LOG_LEVEL";
const ENV_ENDPOINT: &str = "STREAM_TRACKER_ENDPOINT";
const ENV_AUTH: &str = "STREAM_TRACKER_AUTH";

/// Main stream tracker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Stderr log format.
    #[serde(default)]
    pub log_format: LogFormat,
    /// Collector base URL.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Shared HMAC secret; empty sends unsigned requests.
    #[serde(default)]
    pub auth: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Buffering, scheduling and retry settings.
    #[serde(default)]
    pub tracker: TrackerConfig,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            auth: String::new(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            tracker: TrackerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the config file if it exists, then apply
    /// environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Override configuration from environment variables.
    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(log_level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = log_level;
        }
        if let Some(endpoint) = lookup(ENV_ENDPOINT) {
            self.endpoint = endpoint;
        }
        if let Some(auth) = lookup(ENV_AUTH) {
            self.auth = auth;
        }
    }

    /// Get the endpoint as a parsed URL.
    pub fn endpoint_url(&self) -> CoreResult<Url> {
        let url = Url::parse(&self.endpoint)?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(CoreError::UnsupportedScheme(other.to_string())),
        }
    }

    /// HTTP transport settings derived from this config.
    pub fn transport_config(&self) -> CoreResult<TransportConfig> {
        self.endpoint_url()?;
        Ok(TransportConfig {
            endpoint: self.endpoint.clone(),
            auth: self.auth.clone(),
            timeout_ms: self.timeout_ms,
            ..Default::default()
        })
    }
}
