// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process configuration
//!
//! One TOML file configures every service; each binary reads the sections it
//! needs. Durations use humantime syntax (`"5s"`, `"250ms"`). A handful of
//! environment variables override the file for container deployments.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const ENV_LOG_STORE_PATH: &str = "DATASTORE_LOG_STORE_PATH";
pub const ENV_COORDINATOR_ADDR: &str = "DATASTORE_COORDINATOR_ADDR";
pub const ENV_WRITER_LISTEN: &str = "DATASTORE_WRITER_LISTEN";
pub const ENV_READER_LISTEN: &str = "DATASTORE_READER_LISTEN";
pub const ENV_DEV_MODE: &str = "DATASTORE_DEV_MODE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid value {value:?} for {var}")]
    InvalidEnv { var: &'static str, value: String },
}

/// Complete configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub logging: LoggingConfig,
    pub log_store: LogStoreConfig,
    pub coordinator: CoordinatorConfig,
    pub writer: WriterConfig,
    pub reader: ReaderConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub filter: String,
    /// Log file; stderr when unset
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LogStoreConfig {
    /// Directory holding the event log
    pub path: PathBuf,
    /// Migration index stamped on events of collections the log has not seen
    pub default_migration_index: u32,
}

impl Default for LogStoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("data"),
            default_migration_index: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoordinatorConfig {
    /// Address clients connect to
    pub addr: String,
    /// Address the coordinator service binds
    pub listen: String,
    /// Bound on one coordinator round trip
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:9400".to_string(),
            listen: "127.0.0.1:9400".to_string(),
            request_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct WriterConfig {
    pub listen: String,
    /// Lease on transaction locks; a crashed writer blocks others at most this long
    #[serde(with = "humantime_serde")]
    pub lock_ttl: Duration,
    /// Bound on acquiring all locks of a transaction
    #[serde(with = "humantime_serde")]
    pub lock_acquire_timeout: Duration,
    /// Bound on the log store commit
    #[serde(with = "humantime_serde")]
    pub commit_timeout: Duration,
    /// Enables administrative operations such as truncation
    pub dev_mode: bool,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9401".to_string(),
            lock_ttl: Duration::from_secs(10),
            lock_acquire_timeout: Duration::from_secs(1),
            commit_timeout: Duration::from_secs(5),
            dev_mode: false,
        }
    }
}

/// How the reader holds state between queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMode {
    /// Replay the log for every query
    None,
    /// Keep an incrementally maintained projection at the known position
    #[default]
    Projection,
}

/// What a query does when it needs a position the reader has not seen yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LaggingPolicy {
    /// Block until caught up, bounded by `wait_timeout`
    #[default]
    Wait,
    /// Serve that query straight from the log store
    ReadThrough,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReaderConfig {
    pub listen: String,
    pub cache_mode: CacheMode,
    pub lagging_policy: LaggingPolicy,
    /// Bound on waiting for a minimum position
    #[serde(with = "humantime_serde")]
    pub wait_timeout: Duration,
    /// Fallback log store poll when notifications are lost
    #[serde(with = "humantime_serde")]
    pub poll_interval: Duration,
}

impl Default for ReaderConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:9402".to_string(),
            cache_mode: CacheMode::default(),
            lagging_policy: LaggingPolicy::default(),
            wait_timeout: Duration::from_secs(2),
            poll_interval: Duration::from_millis(500),
        }
    }
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Load from an optional file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                Self::from_toml(&text)?
            }
            None => Self::default(),
        };
        config.apply_env(|var| std::env::var(var).ok())?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (injectable for tests)
    pub fn apply_env(
        &mut self,
        lookup: impl Fn(&'static str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(path) = lookup(ENV_LOG_STORE_PATH) {
            self.log_store.path = PathBuf::from(path);
        }
        if let Some(addr) = lookup(ENV_COORDINATOR_ADDR) {
            self.coordinator.addr = addr;
        }
        if let Some(listen) = lookup(ENV_WRITER_LISTEN) {
            self.writer.listen = listen;
        }
        if let Some(listen) = lookup(ENV_READER_LISTEN) {
            self.reader.listen = listen;
        }
        if let Some(value) = lookup(ENV_DEV_MODE) {
            self.writer.dev_mode = match value.to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" | "on" => true,
                "0" | "false" | "no" | "off" | "" => false,
                _ => {
                    return Err(ConfigError::InvalidEnv {
                        var: ENV_DEV_MODE,
                        value,
                    })
                }
            };
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
