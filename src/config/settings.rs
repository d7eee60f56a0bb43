//! TOML settings file for the command-line front end.
//!
//! The settings file holds everything about an update session except the
//! current version, which always comes from the program being updated.
//!
//! # Location
//!
//! 1. The `AUTOUPDATE_CONFIG` environment variable, if set
//! 2. `<config dir>/autoupdate/config.toml` (for example
//!    `~/.config/autoupdate/config.toml` on Linux)
//!
//! # Format
//!
//! ```toml
//! [update]
//! url = "https://updates.example.com/update"
//! public_key = "3b6a27bcceb6a42d62a3a8d02a6f0d73653215771de243a63ac048a18b59da29"
//! check_interval = 14400   # seconds, 0 = default (4 hours)
//! channel = "stable"
//! os = "linux"             # optional, defaults to the running platform
//! arch = "x86_64"          # optional, defaults to the running platform
//! timeout = 30             # seconds, request timeout
//! ```

use super::{UpdateConfig, UpdateConfigBuilder};
use crate::constants::CONFIG_PATH_ENV;
use crate::core::UpdateResult;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

/// Top-level layout of the settings file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    /// The `[update]` table
    #[serde(default)]
    pub update: UpdateSettings,
}

/// Serializable form of the update configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateSettings {
    /// Update server URL
    #[serde(default)]
    pub url: String,

    /// Trusted Ed25519 public key, hex encoded
    #[serde(default)]
    pub public_key: String,

    /// Seconds between checks; `0` selects the default
    #[serde(default)]
    pub check_interval: u64,

    /// Release channel
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,

    /// Operating system override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,

    /// Architecture override
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arch: Option<String>,

    /// Request timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

impl UpdateSettings {
    /// Default settings file location.
    pub fn default_path() -> Result<PathBuf> {
        if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
            return Ok(PathBuf::from(path));
        }

        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Unable to determine configuration directory"))?;
        Ok(config_dir.join("autoupdate").join("config.toml"))
    }

    /// Load settings from `path`, or from the default location.
    pub async fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::default_path()?,
        };
        Self::load_from(&path).await
    }

    /// Load settings from a specific file.
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read settings from {}", path.display()))?;

        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse settings from {}", path.display()))
    }

    /// Parse settings from TOML text.
    pub fn from_toml(content: &str) -> Result<Self> {
        let file: SettingsFile = toml::from_str(content)?;
        Ok(file.update)
    }

    /// Build an [`UpdateConfig`] for a program currently at `current_version`.
    pub fn into_config(self, current_version: &str) -> UpdateResult<UpdateConfig> {
        self.into_builder(current_version).build()
    }

    /// Start a builder from these settings, for callers that add more.
    pub fn into_builder(self, current_version: &str) -> UpdateConfigBuilder {
        let mut builder = UpdateConfig::builder(current_version, self.url)
            .public_key(self.public_key)
            .check_interval(Duration::from_secs(self.check_interval));

        if let Some(channel) = self.channel {
            builder = builder.channel(channel);
        }
        if let Some(os) = self.os {
            builder = builder.os(os);
        }
        if let Some(arch) = self.arch {
            builder = builder.arch(arch);
        }
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(Duration::from_secs(timeout));
        }

        builder
    }
}
