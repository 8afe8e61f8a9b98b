//! Store configuration
//!
//! Read from `~/.config/kemtree/config.json` by default; every field is
//! optional in the file and falls back to its default.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// zstd accepts levels 1..=22 for compression
const COMPRESSION_LEVELS: std::ops::RangeInclusive<i32> = 1..=22;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding one record file per node
    pub data_dir: PathBuf,
    /// zstd level for record bodies
    pub compression_level: i32,
    /// fsync each record and the manifest before renaming it into place
    pub sync_writes: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            data_dir: PathBuf::from("./data"),
            compression_level: 3,
            sync_writes: true,
        }
    }
}

impl StoreConfig {
    /// Defaults with a specific data directory
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        StoreConfig {
            data_dir: data_dir.into(),
            ..StoreConfig::default()
        }
    }

    /// `<config_dir>/kemtree/config.json`
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| Error::Config("Could not find config directory".into()))?;
        Ok(config_dir.join("kemtree").join("config.json"))
    }

    /// Load a config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: StoreConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` (or the default path); defaults if the file is absent
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_path() {
                Ok(path) => path,
                Err(_) => return Ok(StoreConfig::default()),
            },
        };
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(StoreConfig::default())
        }
    }

    /// Write the config as pretty JSON, creating parent directories
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| Error::Config(format!("Failed to create config dir: {}", e)))?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("Failed to write config: {}", e)))?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !COMPRESSION_LEVELS.contains(&self.compression_level) {
            return Err(Error::Config(format!(
                "compression_level must be in {:?}, got {}",
                COMPRESSION_LEVELS, self.compression_level
            )));
        }
        Ok(())
    }
}
