use super::types::*;
use crate::error_handling::types::ConfigError;
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::{Path, PathBuf};

/// Command-line arguments of the `wallsession` binary.
///
/// Every flag overrides the matching value from the configuration file.
#[derive(Parser, Debug, Clone, Default)]
#[command(name = "wallsession")]
#[command(version)]
#[command(about = "Session segmentation backend for a shared drawing wall")]
pub struct CliArgs {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    pub config_file: Option<PathBuf>,

    /// Port the HTTP interface listens on.
    ///
    /// # Command Line
    /// Use `--port <PORT>` to set this value from the CLI
    #[arg(long, env = "WALLSESSION_PORT")]
    pub port: Option<u16>,

    /// Directory used by the file storage backend.
    ///
    /// # Command Line
    /// Use `--storage-path <PATH>` to set this value from the CLI
    #[arg(long)]
    pub storage_path: Option<PathBuf>,

    /// Keep everything in memory instead of on disk.
    #[arg(long, action = clap::ArgAction::SetTrue)]
    pub memory: bool,
}

/// Application configuration.
///
/// # Fields Overview
///
/// - `server`: bind address and port of the HTTP interface
/// - `storage`: which backend persists sessions and nodes, and where
/// - `segmenter`: inactivity timeout, proximity threshold and debounce delay
///
/// Every section is optional in the file; missing values take their defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub segmenter: SegmenterConfig,
}

impl Config {
    /// Reads and validates a TOML configuration file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Config =
            toml::from_str(content).map_err(|e| ConfigError::TomlError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Builds the configuration from the CLI: file first (if any), then flag overrides.
    pub fn from_args(args: &CliArgs) -> Result<Self, ConfigError> {
        let mut config = match args.config_file {
            Some(ref path) => Self::from_file(path)?,
            None => Config::default(),
        };
        if let Some(port) = args.port {
            config.server.port = port;
        }
        if let Some(ref path) = args.storage_path {
            config.storage.path = path.clone();
        }
        if args.memory {
            config.storage.backend = StorageBackend::Memory;
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server
            .bind_address
            .parse::<IpAddr>()
            .map_err(|e| ConfigError::BadIPFormatting(format!("{}: {}", self.server.bind_address, e)))?;
        if self.server.port == 0 {
            return Err(ConfigError::NotInRange("server.port must not be 0".into()));
        }
        if self.segmenter.inactivity_timeout_ms == 0 {
            return Err(ConfigError::NotInRange(
                "segmenter.inactivity_timeout_ms must be positive".into(),
            ));
        }
        if self.segmenter.debounce_delay_ms == 0 {
            return Err(ConfigError::NotInRange(
                "segmenter.debounce_delay_ms must be positive".into(),
            ));
        }
        if self.segmenter.worker_idle_timeout_ms == 0 {
            return Err(ConfigError::NotInRange(
                "segmenter.worker_idle_timeout_ms must be positive".into(),
            ));
        }
        let threshold = self.segmenter.proximity_threshold_px;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(ConfigError::NotInRange(format!(
                "segmenter.proximity_threshold_px must be a positive number, got {}",
                threshold
            )));
        }
        Ok(())
    }
}
