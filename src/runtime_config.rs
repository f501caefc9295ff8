//! # Runtime Configuration Module
//!
//! Deadlines, job retention and cache sizing for the middleware and job
//! store, loaded from environment variables and optionally a YAML file.
//!
//! ## Environment Variables
//!
//! | variable | default |
//! |---|---|
//! | `BRRTR_REQUEST_TIMEOUT_MS` | 30000 |
//! | `BRRTR_PENDING_MAX_WAIT_MS` | 2000 |
//! | `BRRTR_JOB_RETENTION_SECS` | 3600 |
//! | `BRRTR_JOB_SWEEP_INTERVAL_SECS` | 60 |
//! | `BRRTR_CACHE_CAPACITY` | 1024 |
//! | `BRRTR_CACHE_TTL_SECS` | 60 |
//!
//! Unparseable values fall back to the default.
//!
//! ## Usage
//!
//! ```rust
//! use brrtrest::runtime_config::RuntimeConfig;
//!
//! let config = RuntimeConfig::from_env();
//! println!("Request timeout: {:?}", config.request_timeout());
//! ```
//!
//! A YAML file uses the field names; missing fields keep their defaults and
//! the environment is applied on top by [`RuntimeConfig::load`]:
//!
//! ```yaml
//! request_timeout_ms: 5000
//! cache_capacity: 256
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Runtime configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Deadline of the timeout middleware (default: 30 s)
    pub request_timeout_ms: u64,
    /// Wait budget of the pending middleware before a job is created (default: 2 s)
    pub pending_max_wait_ms: u64,
    /// How long finished jobs stay retrievable (default: 1 h)
    pub job_retention_secs: u64,
    /// Interval of the job sweeper (default: 60 s)
    pub job_sweep_interval_secs: u64,
    /// Maximum number of cached responses (default: 1024)
    pub cache_capacity: usize,
    /// Default time to live of a cached response (default: 60 s)
    pub cache_ttl_secs: u64,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: 30_000,
            pending_max_wait_ms: 2_000,
            job_retention_secs: 3_600,
            job_sweep_interval_secs: 60,
            cache_capacity: 1024,
            cache_ttl_secs: 60,
        }
    }
}

/// Loading a configuration file failed.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_yaml::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Io { path, source } => {
                write!(f, "cannot read config file {}: {}", path.display(), source)
            }
            ConfigError::Parse(e) => write!(f, "invalid config: {e}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::Io { source, .. } => Some(source),
            ConfigError::Parse(e) => Some(e),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

impl RuntimeConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Parse a YAML document; missing fields keep their defaults.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).map_err(ConfigError::Parse)
    }

    /// Read a YAML file, then apply environment overrides.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_yaml_str(&text)?.with_env_overrides())
    }

    /// Replace fields whose environment variable is set and valid.
    #[must_use]
    pub fn with_env_overrides(self) -> Self {
        Self {
            request_timeout_ms: env_or("BRRTR_REQUEST_TIMEOUT_MS", self.request_timeout_ms),
            pending_max_wait_ms: env_or("BRRTR_PENDING_MAX_WAIT_MS", self.pending_max_wait_ms),
            job_retention_secs: env_or("BRRTR_JOB_RETENTION_SECS", self.job_retention_secs),
            job_sweep_interval_secs: env_or(
                "BRRTR_JOB_SWEEP_INTERVAL_SECS",
                self.job_sweep_interval_secs,
            ),
            cache_capacity: env_or("BRRTR_CACHE_CAPACITY", self.cache_capacity),
            cache_ttl_secs: env_or("BRRTR_CACHE_TTL_SECS", self.cache_ttl_secs),
        }
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    #[must_use]
    pub fn pending_max_wait(&self) -> Duration {
        Duration::from_millis(self.pending_max_wait_ms)
    }

    #[must_use]
    pub fn job_retention(&self) -> Duration {
        Duration::from_secs(self.job_retention_secs)
    }

    /// Sweep period, at least one second.
    #[must_use]
    pub fn job_sweep_interval(&self) -> Duration {
        Duration::from_secs(self.job_sweep_interval_secs.max(1))
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }
}
