//! Persistent configuration for droidrelay.
//!
//! Stores user settings in `~/.droidrelay/config.json`. Every field has a
//! default, so a missing or partial file is fine; binaries layer their
//! command-line arguments on top of what is loaded here.
//!
//! # Example
//!
//! ```no_run
//! use droidrelay_core::config::RelayConfig;
//!
//! // Load (returns defaults if file doesn't exist)
//! let config = RelayConfig::load();
//! println!("Default device: {}", config.default_device_id);
//!
//! let executor = droidrelay_core::executor::CommandExecutor::from_config(config.driver_config());
//! ```

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::adb::DEFAULT_TIMEOUT_MS;
use crate::driver::DriverConfig;

const CONFIG_FILENAME: &str = "config.json";

/// Device targeted when a request does not name one.
pub const DEFAULT_DEVICE_ID: &str = "127.0.0.1:5555";

/// Setting names accepted by [`RelayConfig::set`].
pub const KEYS: &[&str] = &[
    "adb_path",
    "default_device_id",
    "tool_timeout_ms",
    "remote_url",
    "remote_api_key",
    "auth_token",
];

/// Errors that can occur when editing or saving the config.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine home directory")]
    NoHomeDir,

    #[error("Unknown config key: {0}")]
    UnknownKey(String),

    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Returns the droidrelay directory path (`~/.droidrelay/`), if a home
/// directory can be determined.
pub fn relay_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".droidrelay"))
}

/// Persistent droidrelay configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Path or name of the adb executable.
    pub adb_path: String,

    /// Device used when a request leaves `device_id` empty.
    pub default_device_id: String,

    /// Upper bound on a single adb invocation, in milliseconds.
    pub tool_timeout_ms: u64,

    /// When set, actions are forwarded to this automation service instead of
    /// a local adb binary.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,

    /// Bearer token for the remote automation service.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_api_key: Option<String>,

    /// Bearer token the HTTP server requires from its callers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            adb_path: "adb".to_string(),
            default_device_id: DEFAULT_DEVICE_ID.to_string(),
            tool_timeout_ms: DEFAULT_TIMEOUT_MS,
            remote_url: None,
            remote_api_key: None,
            auth_token: None,
        }
    }
}

impl RelayConfig {
    /// Load config from `~/.droidrelay/config.json`.
    ///
    /// Returns [`Default`] if the file does not exist or cannot be parsed.
    pub fn load() -> Self {
        relay_dir()
            .map(|dir| dir.join(CONFIG_FILENAME))
            .and_then(|path| std::fs::read_to_string(path).ok())
            .and_then(|s| serde_json::from_str(&s).ok())
            .unwrap_or_default()
    }

    /// Save config to `~/.droidrelay/config.json`, creating the directory.
    pub fn save(&self) -> Result<(), ConfigError> {
        let dir = relay_dir().ok_or(ConfigError::NoHomeDir)?;
        std::fs::create_dir_all(&dir)?;
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(dir.join(CONFIG_FILENAME), json)?;
        Ok(())
    }

    /// Sets one setting from its string form.
    ///
    /// An empty value clears the optional settings (`remote_url`,
    /// `remote_api_key`, `auth_token`) and is rejected for the others.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let optional = || (!value.is_empty()).then(|| value.to_string());
        let required = || {
            if value.is_empty() {
                Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    message: "must not be empty".to_string(),
                })
            } else {
                Ok(value.to_string())
            }
        };

        match key {
            "adb_path" => self.adb_path = required()?,
            "default_device_id" => self.default_device_id = required()?,
            "tool_timeout_ms" => {
                self.tool_timeout_ms = match value.parse::<u64>() {
                    Ok(ms) if ms > 0 => ms,
                    _ => {
                        return Err(ConfigError::InvalidValue {
                            key: key.to_string(),
                            message: format!("expected a positive number of milliseconds, got {:?}", value),
                        })
                    }
                }
            }
            "remote_url" => self.remote_url = optional(),
            "remote_api_key" => self.remote_api_key = optional(),
            "auth_token" => self.auth_token = optional(),
            other => return Err(ConfigError::UnknownKey(other.to_string())),
        }
        Ok(())
    }

    /// The driver backend this configuration selects: remote when
    /// `remote_url` is set, local adb otherwise.
    pub fn driver_config(&self) -> DriverConfig {
        match &self.remote_url {
            Some(url) => DriverConfig::Remote {
                base_url: url.clone(),
                api_key: self.remote_api_key.clone(),
                timeout_ms: self.tool_timeout_ms,
            },
            None => DriverConfig::Adb {
                adb_path: self.adb_path.clone(),
                timeout_ms: self.tool_timeout_ms,
            },
        }
    }
}
