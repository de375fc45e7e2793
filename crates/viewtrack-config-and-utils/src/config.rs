//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default collector URL (can be overridden at compile time via VIEWTRACK_COLLECTOR_URL env var).
pub const DEFAULT_COLLECTOR_URL: &str = match option_env!("VIEWTRACK_COLLECTOR_URL") {
    Some(url) => url,
    None => "https://collector.viewtrack.dev/api",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Period of the background retry sweep.
pub const DEFAULT_RETRY_PERIOD_SECS: u64 = 60;

/// Main client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,
    /// Base URL of the event collector.
    pub collector_url: String,
    /// Version string stamped on every event.
    pub client_version: String,
    /// Seconds between retry sweeps.
    pub retry_period_secs: u64,
    /// Seconds a failed entry waits before it is due again.
    pub retry_delay_secs: u64,
    /// Drop queued events after this many attempts. `None` retries forever.
    pub max_retry_attempts: Option<u32>,
    /// Compress the persisted retry queue.
    pub compress_queue: bool,
    /// HTTP request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Prefix for every persisted storage key.
    pub storage_namespace: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            collector_url: DEFAULT_COLLECTOR_URL.to_string(),
            client_version: env!("CARGO_PKG_VERSION").to_string(),
            retry_period_secs: DEFAULT_RETRY_PERIOD_SECS,
            retry_delay_secs: DEFAULT_RETRY_PERIOD_SECS,
            max_retry_attempts: None,
            compress_queue: true,
            request_timeout_secs: 30,
            storage_namespace: "viewtrack".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from the config file, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            debug!(path = %config_path.display(), "Loading config file");
            Self::load_from_file(&config_path)?
        } else {
            debug!(path = %config_path.display(), "No config file, using defaults");
            Self::default()
        };

        config.load_from_env();
        config.validate()?;
        debug!(
            collector_url = %config.collector_url,
            retry_period_secs = config.retry_period_secs,
            "Configuration loaded"
        );

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
        if let Ok(log_level) = std::env::var("VIEWTRACK_LOG_LEVEL") {
            self.log_level = log_level;
        }
        if let Ok(collector_url) = std::env::var("VIEWTRACK_COLLECTOR_URL") {
            self.collector_url = collector_url;
        }
    }

    /// Reject values the client cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        self.collector_url()?;
        if self.retry_period_secs == 0 {
            return Err(CoreError::Config(
                "retry_period_secs must be greater than zero".to_string(),
            ));
        }
        if self.storage_namespace.is_empty() {
            return Err(CoreError::Config(
                "storage_namespace must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Get the collector URL as a parsed URL.
    pub fn collector_url(&self) -> CoreResult<Url> {
        Url::parse(&self.collector_url).map_err(CoreError::from)
    }

    pub fn retry_period(&self) -> Duration {
        Duration::from_secs(self.retry_period_secs)
    }

    pub fn retry_delay(&self) -> Duration {
        Duration::from_secs(self.retry_delay_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}
