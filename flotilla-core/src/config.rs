//! Configuration management.

use crate::error::{FlotillaError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persistent configuration for the flotilla coordinator.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub log_level: String,
    pub data_dir: String,
    pub db_max_connections: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            data_dir: paths::data_dir().to_string_lossy().to_string(),
            db_max_connections: 5,
        }
    }
}

impl Config {
    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        paths::config_dir().join("config.json")
    }

    /// Load configuration from disk, falling back to defaults when the
    /// file does not exist.
    pub fn load() -> Result<Self> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path).map_err(|e| FlotillaError::InvalidConfig {
            reason: format!("Failed to read config: {}", e),
        })?;
        serde_json::from_str(&content).map_err(|e| FlotillaError::InvalidConfig {
            reason: format!("Failed to parse config: {}", e),
        })
    }

    /// Save configuration to disk.
    pub fn save(&self) -> Result<()> {
        let path = Self::config_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| FlotillaError::InvalidConfig {
                reason: format!("Failed to create config dir: {}", e),
            })?;
        }
        let content =
            serde_json::to_string_pretty(self).map_err(|e| FlotillaError::InvalidConfig {
                reason: format!("Failed to serialize config: {}", e),
            })?;
        std::fs::write(&path, content).map_err(|e| FlotillaError::InvalidConfig {
            reason: format!("Failed to write config: {}", e),
        })
    }
}
