//! Configuration system for smbfsp
//!
//! Supports TOML configuration files with sensible defaults.
//! Configuration is loaded from:
//! - macOS: ~/Library/Application Support/com.smbfsp.smbfsp/config.toml
//! - Linux: ~/.config/smbfsp/config.toml
//! - Windows: %APPDATA%/smbfsp/smbfsp/config/config.toml

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::{
    BATCH_SIZE, DEFAULT_CREATE_MODE, INITIAL_BATCH_LIMIT, INITIAL_BATCH_SIZE, READ_CHUNK_SIZE,
    WRITE_CHUNK_SIZE,
};

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Operation engine settings
    pub provider: ProviderConfig,
    /// Message transport settings
    pub transport: TransportConfig,
    /// Local-directory backend settings
    pub local: LocalConfig,
}

/// Operation engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// Bytes per readFile response envelope
    pub read_chunk_size: usize,
    /// Bytes per remote write call
    pub write_chunk_size: usize,
    /// Batch size for stat-populated listings while below `initial_batch_limit`
    pub initial_batch_size: usize,
    /// Entry index at which listings switch to `batch_size`
    pub initial_batch_limit: usize,
    /// Batch size for the remainder of a listing
    pub batch_size: usize,
    /// Permission bits for createFile
    pub create_mode: u32,
    /// Permission bits for createDirectory
    pub mkdir_mode: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            read_chunk_size: READ_CHUNK_SIZE,
            write_chunk_size: WRITE_CHUNK_SIZE,
            initial_batch_size: INITIAL_BATCH_SIZE,
            initial_batch_limit: INITIAL_BATCH_LIMIT,
            batch_size: BATCH_SIZE,
            create_mode: DEFAULT_CREATE_MODE,
            mkdir_mode: DEFAULT_CREATE_MODE,
        }
    }
}

impl ProviderConfig {
    /// Size of the batch starting at `start_index`
    pub fn batch_size_at(&self, start_index: usize) -> usize {
        let size = if start_index < self.initial_batch_limit {
            self.initial_batch_size
        } else {
            self.batch_size
        };
        size.max(1)
    }
}

/// Message transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Depth of the bounded inbound request queue
    pub queue_depth: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self { queue_depth: 64 }
    }
}

/// Local-directory backend configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Directory whose subdirectories are served as shares
    pub export_root: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) => Self::load_from(&path).unwrap_or_else(|e| {
                warn!("Failed to load config from {:?}: {}, using defaults", path, e);
                Self::default()
            }),
            None => {
                debug!("No config directory found, using defaults");
                Self::default()
            }
        }
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("Config file {:?} not found, using defaults", path);
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;

        let config: Config =
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        info!("Loaded config from {:?}", path);
        Ok(config)
    }

    /// Save configuration to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
        }

        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigError::Serialize(e.to_string()))?;

        std::fs::write(path, content).map_err(|e| ConfigError::Io(e.to_string()))?;

        info!("Saved config to {:?}", path);
        Ok(())
    }

    /// Get the default config file path
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "smbfsp", "smbfsp")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Generate a sample configuration file content
    pub fn sample() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Configuration errors
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(String),
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Serialization error: {0}")]
    Serialize(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.provider.read_chunk_size, 32 * 1024);
        assert_eq!(config.provider.initial_batch_size, 16);
        assert_eq!(config.provider.initial_batch_limit, 64);
        assert_eq!(config.provider.batch_size, 64);
        assert_eq!(config.transport.queue_depth, 64);
        assert!(config.local.export_root.is_none());
    }

    #[test]
    fn test_batch_size_at_threshold() {
        let provider = ProviderConfig::default();
        assert_eq!(provider.batch_size_at(0), 16);
        assert_eq!(provider.batch_size_at(48), 16);
        assert_eq!(provider.batch_size_at(63), 16);
        assert_eq!(provider.batch_size_at(64), 64);
        assert_eq!(provider.batch_size_at(128), 64);
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
            [provider]
            read_chunk_size = 4096
        "#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.provider.read_chunk_size, 4096);
        // Other values should be defaults
        assert_eq!(config.provider.batch_size, 64);
        assert_eq!(config.transport.queue_depth, 64);
    }

    #[test]
    fn test_sample_config() {
        let sample = Config::sample();
        assert!(sample.contains("[provider]"));
        assert!(sample.contains("[transport]"));
    }

    #[test]
    fn test_config_load_missing() {
        let config = Config::load_from(Path::new("/nonexistent/config.toml")).unwrap();
        assert_eq!(config.provider.write_chunk_size, 32 * 1024);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.transport.queue_depth = 8;
        config.local.export_root = Some(dir.path().to_path_buf());
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.transport.queue_depth, 8);
        assert_eq!(loaded.local.export_root.as_deref(), Some(dir.path()));
    }
}
