//! Client configuration
//!
//! Configuration is read once from a JSON or TOML file; the format is
//! picked from the file extension.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::health::HealthConfig;
use crate::retry::RetryConfig;
use crate::selector::DEFAULT_PROBE_PERCENT;

/// Environment variable holding the path of the configuration file
pub const CONFIG_ENV: &str = "NODESTORE_CONFIG";

/// Name of the persisted discovery cache inside the cache directory
pub const CACHE_FILE_NAME: &str = "query-cache.json";

/// Storage client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Static list of storage nodes
    pub io_hosts: Vec<String>,

    /// Default bucket for object operations
    pub bucket: String,

    /// Account used together with the bucket as the discovery identity
    #[serde(default)]
    pub access_key: String,

    /// Discovery endpoints; discovery is disabled when empty
    #[serde(default)]
    pub uc_hosts: Vec<String>,

    /// Block size announced on uploads
    #[serde(default = "default_part_size", rename = "part")]
    pub part_size: u64,

    /// Attempt ceiling for every network operation
    #[serde(default = "default_retry")]
    pub retry: u32,

    /// First pause between attempts; zero retries immediately
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Upper bound for the pause between attempts
    #[serde(default = "default_retry_max_backoff_ms")]
    pub retry_max_backoff_ms: u64,

    /// Share of the host list probed for a healthy node, in percent
    #[serde(default = "default_probe_percent")]
    pub probe_percent: u32,

    /// Connect timeout for storage node requests
    #[serde(default = "default_base_timeout_ms")]
    pub base_timeout_ms: u64,

    /// Overall timeout for a single storage node request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Use https for hosts given without a scheme
    #[serde(default)]
    pub https: bool,

    /// Directory for the persisted discovery cache
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_dir: Option<PathBuf>,

    #[serde(default)]
    pub health: HealthConfig,
}

fn default_part_size() -> u64 {
    4 * 1024 * 1024
}

fn default_retry() -> u32 {
    3
}

fn default_retry_backoff_ms() -> u64 {
    RetryConfig::default().initial_backoff_ms
}

fn default_retry_max_backoff_ms() -> u64 {
    RetryConfig::default().max_backoff_ms
}

fn default_probe_percent() -> u32 {
    DEFAULT_PROBE_PERCENT
}

fn default_base_timeout_ms() -> u64 {
    1000
}

fn default_request_timeout_secs() -> u64 {
    600
}

impl Config {
    /// Create a configuration for a static host list and bucket
    pub fn new(io_hosts: Vec<String>, bucket: impl Into<String>) -> Self {
        Self {
            io_hosts,
            bucket: bucket.into(),
            access_key: String::new(),
            uc_hosts: Vec::new(),
            part_size: default_part_size(),
            retry: default_retry(),
            retry_backoff_ms: default_retry_backoff_ms(),
            retry_max_backoff_ms: default_retry_max_backoff_ms(),
            probe_percent: default_probe_percent(),
            base_timeout_ms: default_base_timeout_ms(),
            request_timeout_secs: default_request_timeout_secs(),
            https: false,
            cache_dir: None,
            health: HealthConfig::default(),
        }
    }

    /// Load configuration from a `.json` or `.toml` file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {e}", path.display()))
        })?;

        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();

        let config: Config = match ext.as_str() {
            "json" => serde_json::from_str(&raw)
                .map_err(|e| Error::Config(format!("Invalid JSON config: {e}")))?,
            "toml" => toml::from_str(&raw)
                .map_err(|e| Error::Config(format!("Invalid TOML config: {e}")))?,
            _ => {
                return Err(Error::Config(format!(
                    "Unsupported config format: {}",
                    path.display()
                )));
            }
        };

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from the file named by [`CONFIG_ENV`]
    pub fn from_env() -> Result<Self> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => Self::load(PathBuf::from(path)),
            _ => Err(Error::Config(format!("{CONFIG_ENV} is not set"))),
        }
    }

    /// Reject configurations that can never serve a request
    pub fn validate(&self) -> Result<()> {
        if self.io_hosts.is_empty() && self.uc_hosts.is_empty() {
            return Err(Error::Config(
                "Either io_hosts or uc_hosts must be configured".to_string(),
            ));
        }
        if self.retry == 0 {
            return Err(Error::Config("retry must be at least 1".to_string()));
        }
        Ok(())
    }

    /// Retry policy derived from the `retry*` settings
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig::builder()
            .max_attempts(self.retry)
            .initial_backoff_ms(self.retry_backoff_ms)
            .max_backoff_ms(self.retry_max_backoff_ms)
            .build()
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.base_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Location of the persisted discovery cache
    ///
    /// Falls back to the platform cache directory when `cache_dir` is unset.
    pub fn cache_file(&self) -> Option<PathBuf> {
        self.cache_dir
            .clone()
            .or_else(|| dirs::cache_dir().map(|d| d.join("nodestore")))
            .map(|d| d.join(CACHE_FILE_NAME))
    }
}
