//! Event pump configuration.
//!
//! Loading order (later sources override earlier):
//! 1. Built-in defaults
//! 2. An explicit JSON file, or `lanmark.json` in the global config directory
//! 3. `LANMARK_*` environment variables

use std::path::{Path, PathBuf};
use std::time::Duration;

use lanmark_util::log::LogLevel;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Config file name inside the global config directory.
pub const FILE_NAME: &str = "lanmark.json";

pub const ENV_POLL_INTERVAL_MS: &str = "LANMARK_POLL_INTERVAL_MS";
pub const ENV_MAX_HANDLES: &str = "LANMARK_MAX_HANDLES";
pub const ENV_LOG_LEVEL: &str = "LANMARK_LOG_LEVEL";

const DEFAULT_POLL_INTERVAL_MS: u64 = 100;

/// Configuration-specific errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config at {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Invalid JSON syntax or shape.
    #[error("invalid config at {path}: {message}")]
    InvalidJson { path: String, message: String },

    /// A setting had an unusable value.
    #[error("invalid value {value:?} for {key}")]
    InvalidValue { key: String, value: String },
}

/// Settings for an [`EventPump`](crate::EventPump).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiscoverConfig {
    /// Longest single wait inside `run_until` and `run_for`.
    pub poll_interval_ms: u64,

    /// Maximum number of simultaneously active handles. `None` is unlimited.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_handles: Option<usize>,

    /// Level used by [`lanmark_util::log::init`] in binaries built on this crate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<LogLevel>,
}

impl Default for DiscoverConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            max_handles: None,
            log_level: None,
        }
    }
}

impl DiscoverConfig {
    /// Load configuration from all sources.
    ///
    /// With `path`, that file must exist. Without it the global file is used
    /// when present. Environment overrides are applied last.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::load_file(path)?,
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::load_file(&path)?,
                _ => Self::default(),
            },
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// `<config dir>/lanmark/lanmark.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("lanmark").join(FILE_NAME))
    }

    /// Load configuration from a file.
    pub fn load_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Self::from_json(&content, &path.display().to_string())
    }

    /// Parse JSON; `source` names the origin in error messages.
    pub fn from_json(content: &str, source: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(content).map_err(|e| ConfigError::InvalidJson {
            path: source.to_string(),
            message: e.to_string(),
        })
    }

    /// Apply `LANMARK_*` overrides, looking variables up through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_POLL_INTERVAL_MS) {
            self.poll_interval_ms = parse_env(ENV_POLL_INTERVAL_MS, &value)?;
        }
        if let Some(value) = lookup(ENV_MAX_HANDLES) {
            self.max_handles = Some(parse_env(ENV_MAX_HANDLES, &value)?);
        }
        if let Some(value) = lookup(ENV_LOG_LEVEL) {
            self.log_level = Some(LogLevel::parse(value.trim()).ok_or_else(|| {
                ConfigError::InvalidValue {
                    key: ENV_LOG_LEVEL.to_string(),
                    value: value.clone(),
                }
            })?);
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval_ms".to_string(),
                value: "0".to_string(),
            });
        }
        if self.max_handles == Some(0) {
            return Err(ConfigError::InvalidValue {
                key: "max_handles".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn parse_env<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}
