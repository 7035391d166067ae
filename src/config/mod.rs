pub mod bluetooth_config;
pub mod logging_config;

use std::path::{Path, PathBuf};

use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs;

use crate::utils::ensure_directory_exists;

pub use bluetooth_config::BluetoothConfig;
pub use logging_config::{LogFormat, LoggingConfig};

const APP_DIR_NAME: &str = "verismart-bridge";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    ConfigDirNotFound,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub bluetooth: BluetoothConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// `<config dir>/verismart-bridge/config.json`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|dir| dir.join(APP_DIR_NAME).join(CONFIG_FILE_NAME))
            .ok_or(ConfigError::ConfigDirNotFound)
    }

    /// Loads the config from `path`, using defaults when the file is missing.
    pub async fn load_config(path: &Path) -> Result<Self, ConfigError> {
        let file_path_str = path.to_string_lossy().into_owned();

        if !path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path_str);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(path).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_str(&config_json).map_err(|source| ConfigError::Json {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Config loaded from {:?}", file_path_str);
        Ok(config)
    }

    /// Saves the current config to `path`, creating parent directories.
    pub async fn save_config(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(config_dir) = path.parent() {
            ensure_directory_exists(config_dir)
                .await
                .map_err(|source| ConfigError::Io {
                    path: config_dir.to_path_buf(),
                    source,
                })?;
        }

        let config_json = match serde_json::to_string_pretty(self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(ConfigError::Json {
                    path: path.to_path_buf(),
                    source: e,
                });
            }
        };

        fs::write(path, config_json).await.map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        info!("Config saved to {:?}.", path.to_string_lossy());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::UUID_UART_SERVICE;

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig::load_config(&dir.path().join("absent.json")).await.unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.bluetooth.service_uuid, UUID_UART_SERVICE);
    }

    #[tokio::test]
    async fn save_then_load_preserves_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE_NAME);
        let mut config = AppConfig::default();
        config.bluetooth.name_filter = Some("VeriSmart".into());
        config.bluetooth.validate_fallback_writable = false;
        config.logging.format = LogFormat::Json;

        config.save_config(&path).await.unwrap();
        let loaded = AppConfig::load_config(&path).await.unwrap();
        assert_eq!(loaded, config);
    }

    #[tokio::test]
    async fn partial_file_fills_in_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, r#"{ "bluetooth": { "scan_window_secs": 10 } }"#).unwrap();

        let config = AppConfig::load_config(&path).await.unwrap();
        assert_eq!(config.bluetooth.scan_window_secs, 10);
        assert_eq!(config.bluetooth.service_uuid, UUID_UART_SERVICE);
        assert_eq!(config.logging, LoggingConfig::default());
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            AppConfig::load_config(&path).await,
            Err(ConfigError::Json { .. })
        ));
    }

    #[test]
    fn unknown_level_falls_back_to_info() {
        let logging = LoggingConfig {
            level: "loud".into(),
            format: LogFormat::Text,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Info);
        let logging = LoggingConfig {
            level: "debug".into(),
            format: LogFormat::Text,
        };
        assert_eq!(logging.level_filter(), log::LevelFilter::Debug);
    }
}
