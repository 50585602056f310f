//! Persistent configuration for settlekit.
//!
//! Stores user settings in `~/.settlekit/config.json`. Today that is only how
//! the settledness check polls and whether it gives up.
//!
//! # Example
//!
//! ```no_run
//! use settlekit_core::config::SettlekitConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = SettlekitConfig::load();
//! println!("poll every {:?}", config.settle.poll_interval());
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

const CONFIG_DIRNAME: &str = ".settlekit";
const CONFIG_FILENAME: &str = "config.json";
const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

/// Errors loading or saving configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read or written.
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid configuration JSON.
    #[error("Invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// No home directory to store configuration in.
    #[error("Could not determine home directory")]
    NoHomeDir,
}

/// How the settledness check waits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettleConfig {
    /// Fallback re-check interval in milliseconds.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up after this many milliseconds. `None` waits indefinitely.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
}

fn default_poll_interval_ms() -> u64 {
    DEFAULT_POLL_INTERVAL_MS
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            timeout_ms: None,
        }
    }
}

impl SettleConfig {
    /// Poll interval, never zero.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    /// Timeout, if any.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }
}

/// Persistent settlekit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlekitConfig {
    /// Settledness wait settings.
    #[serde(default)]
    pub settle: SettleConfig,
}

/// Returns the settlekit directory (`~/.settlekit/`), if a home directory exists.
pub fn settlekit_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(CONFIG_DIRNAME))
}

impl SettlekitConfig {
    /// Load config from `~/.settlekit/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        settlekit_dir()
            .and_then(|dir| Self::load_from(dir.join(CONFIG_FILENAME)).ok())
            .unwrap_or_default()
    }

    /// Load config from an explicit path. Unlike [`load`](Self::load), a
    /// missing or malformed file is an error.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Save config to `~/.settlekit/config.json`.
    pub fn save(&self) -> Result<(), ConfigError> {
        let dir = settlekit_dir().ok_or(ConfigError::NoHomeDir)?;
        std::fs::create_dir_all(&dir).map_err(|source| ConfigError::Io {
            path: dir.clone(),
            source,
        })?;
        self.save_to(dir.join(CONFIG_FILENAME))
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        let json = serde_json::to_string_pretty(self).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }
}
