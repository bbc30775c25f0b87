//! Configuration for zperms
//!
//! This module provides the serde/TOML backed settings the core needs from its
//! host:
//! - The default group used for players without live memberships
//! - Rank tracks (ordered group lists) and the default track
//! - The reserved dynamic permission prefix
//! - The retry budget of the bundled transaction executor
//!
//! # Example
//!
//! ```toml
//! default_group = "default"
//! default_track = "staff"
//!
//! [tracks]
//! staff = ["helper", "moderator", "admin"]
//! ```
//!
//! ```ignore
//! use zperms_core::config::{core_config_path, ZPermsConfig};
//!
//! let config = ZPermsConfig::load(&core_config_path()?)?;
//! let staff = config.track("staff");
//! ```

mod loader;

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

pub use loader::{configs_dir, core_config_path, zperms_base_dir, CONFIG_FILE_NAME, HOME_ENV};

/// Configuration system errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read or write config file
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Failed to parse TOML content
    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config to TOML
    #[error("Failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Could not determine config directory
    #[error("Config directory not available - could not resolve zperms base path")]
    NoConfigDirectory,
}

/// Result type for config operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Default dynamic permission prefix
pub const DEFAULT_DYNAMIC_PREFIX: &str = "zpermissions_player.";

/// Core configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZPermsConfig {
    /// Group players implicitly belong to when they have no live membership
    pub default_group: String,

    /// Track used by rank commands that do not name one
    pub default_track: String,

    /// Reserved namespace that cannot be set or unset directly
    pub dynamic_permission_prefix: String,

    /// Retry budget for conflicting transactions
    pub max_retries: u32,

    /// Named ordered group lists, lowest rank first
    pub tracks: BTreeMap<String, Vec<String>>,
}

impl Default for ZPermsConfig {
    fn default() -> Self {
        Self {
            default_group: "default".to_string(),
            default_track: "default".to_string(),
            dynamic_permission_prefix: DEFAULT_DYNAMIC_PREFIX.to_string(),
            max_retries: 3,
            tracks: BTreeMap::new(),
        }
    }
}

impl ZPermsConfig {
    /// Parse from TOML text.
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config.normalized())
    }

    /// Load config from file, creating default if missing.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let config = Self::from_toml_str(&content)?;
            tracing::debug!("Loaded zperms config from {:?}", path);
            Ok(config)
        } else {
            let default = Self::default();
            default.save(path)?;
            tracing::info!("Created default zperms config at {:?}", path);
            Ok(default)
        }
    }

    /// Save config to file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save(&self, path: &Path) -> ConfigResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        tracing::debug!("Saved zperms config to {:?}", path);
        Ok(())
    }

    /// Reload config from file.
    pub fn reload(&mut self, path: &Path) -> ConfigResult<()> {
        let content = std::fs::read_to_string(path)?;
        *self = Self::from_toml_str(&content)?;
        tracing::debug!("Reloaded zperms config from {:?}", path);
        Ok(())
    }

    /// Ordered groups of a track, `None` if undefined
    pub fn track(&self, name: &str) -> Option<&[String]> {
        self.tracks.get(&name.to_lowercase()).map(Vec::as_slice)
    }

    /// Add or replace a track
    pub fn with_track<I, S>(mut self, name: &str, groups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.tracks.insert(
            name.to_lowercase(),
            groups.into_iter().map(|g| g.as_ref().to_lowercase()).collect(),
        );
        self
    }

    // Names are case-insensitive everywhere else
    fn normalized(mut self) -> Self {
        self.default_group = self.default_group.to_lowercase();
        self.default_track = self.default_track.to_lowercase();
        self.tracks = self
            .tracks
            .into_iter()
            .map(|(name, groups)| {
                (
                    name.to_lowercase(),
                    groups.into_iter().map(|g| g.to_lowercase()).collect(),
                )
            })
            .collect();
        self
    }
}
