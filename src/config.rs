//! Application Configuration
//!
//! This module provides configuration management for the application,
//! supporting YAML configuration files with sensible defaults.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::service::UploadLimits;
use crate::storage::config::StorageConfig;

/// Environment variable naming an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "FILE_DROP_CONFIG";

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub upload: UploadConfig,
    pub logging: LoggingConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Number of worker threads
    pub workers: usize,
    /// Maximum request body size in bytes
    pub max_payload_size: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3001,
            workers: 4,
            max_payload_size: 100 * 1024 * 1024,
        }
    }
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct UploadConfig {
    /// Maximum number of file parts per request
    pub max_files: usize,
    /// Maximum size of a single file in bytes
    pub max_file_size: u64,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_files: 10,
            max_file_size: 50 * 1024 * 1024,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Path to the log4rs configuration file
    pub config_file: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            config_file: "server_log.yaml".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from `FILE_DROP_CONFIG` or `config.yaml`, use defaults if not found.
    /// Environment overrides for storage are applied afterwards.
    pub fn load() -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut config = Self::load_from(&config_path)?;
        config.storage.apply_env();
        Ok(config)
    }

    /// Load configuration from a specific file, use defaults if it does not exist
    pub fn load_from(config_path: impl AsRef<Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let config_path = config_path.as_ref();
        if config_path.exists() {
            let content = fs::read_to_string(config_path)?;
            let config: AppConfig = serde_yaml::from_str(&content)?;
            info!("Loaded configuration from {}", config_path.display());
            Ok(config)
        } else {
            warn!("Config file {} not found, using defaults", config_path.display());
            Ok(Self::default())
        }
    }

    pub fn upload_limits(&self) -> UploadLimits {
        UploadLimits {
            max_payload_size: self.server.max_payload_size,
            max_files: self.upload.max_files,
            max_file_size: self.upload.max_file_size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::config::StorageBackend;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.upload.max_files, 10);
        assert_eq!(config.storage.backend, StorageBackend::Local);
        assert_eq!(config.logging.config_file, "server_log.yaml");
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(
            file,
            "server:\n  port: 8088\nstorage:\n  backend: blob\n  blob:\n    url: s3://bucket/uploads\nupload:\n  max_files: 3\n"
        )
        .unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert_eq!(config.server.port, 8088);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.storage.backend, StorageBackend::Blob);
        assert_eq!(config.storage.blob.url, "s3://bucket/uploads");
        assert_eq!(config.storage.retry.attempts, 3);
        assert_eq!(config.upload.max_files, 3);
        assert_eq!(config.upload.max_file_size, UploadConfig::default().max_file_size);
    }

    #[test]
    fn test_missing_file_uses_defaults() {
        let config = AppConfig::load_from("/definitely/not/here.yaml").unwrap();
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn test_malformed_file_is_an_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "server: [not, a, map").unwrap();
        assert!(AppConfig::load_from(file.path()).is_err());
    }

    #[test]
    #[serial]
    fn test_load_applies_env() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "storage:\n  backend: local\n").unwrap();
        env::set_var(CONFIG_PATH_ENV, file.path());
        env::set_var("STORAGE_BACKEND", "mock");
        let config = AppConfig::load();
        env::remove_var(CONFIG_PATH_ENV);
        env::remove_var("STORAGE_BACKEND");

        assert_eq!(config.unwrap().storage.backend, StorageBackend::Mock);
    }
}
