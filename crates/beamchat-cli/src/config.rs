//! BeamChat CLI Configuration Management
//!
//! Configuration is read from a TOML file: the path given with `--config`, or
//! `beamchat/config.toml` in the platform config directory when it exists.
//! Every section and field is optional; missing values take their defaults.

use std::path::{Path, PathBuf};

use beamchat_ble::BleLinkConfig;
use beamchat_core::ProtocolConfig;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{CliError, Result};

// ----------------------------------------------------------------------------
// CLI Application Configuration
// ----------------------------------------------------------------------------

/// Complete configuration for the BeamChat CLI application
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Transfer protocol configuration
    pub protocol: ProtocolConfig,

    /// BLE link configuration
    pub ble: BleLinkConfig,

    /// Terminal output settings
    pub cli: CliConfig,
}

/// CLI-specific configuration options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Prefix each printed message with its time
    pub show_timestamps: bool,

    /// Label used for our own messages
    pub self_label: String,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            show_timestamps: false,
            self_label: "me".to_string(),
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration from a specific file path
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            CliError::Config(format!("Failed to read {}: {}", path.as_ref().display(), e))
        })?;
        Self::from_toml(&text)
    }

    /// Load the default config file if present, else use defaults
    pub fn load_default() -> Result<Self> {
        match Self::default_config_path() {
            Some(path) if path.exists() => {
                info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)
            }
            _ => Ok(Self::default()),
        }
    }

    /// Parse and validate TOML text
    pub fn from_toml(text: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("beamchat").join("config.toml"))
    }

    /// Save configuration to a specific file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path.as_ref(), toml::to_string_pretty(self)?)?;
        Ok(())
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        self.protocol
            .validate()
            .map_err(|e| CliError::Config(e.to_string()))?;
        if self.ble.max_write_len == 0 {
            return Err(CliError::Config(
                "ble.max_write_len must be at least 1".to_string(),
            ));
        }
        if self.ble.scan_timeout.is_zero() {
            return Err(CliError::Config(
                "ble.scan_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}
