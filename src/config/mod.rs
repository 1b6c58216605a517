pub mod connection_config;
pub mod scan_config;

use std::path::Path;

use anyhow::{bail, Result};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::connection_config::ConnectionConfig;
use crate::config::scan_config::ScanConfig;
use crate::utils::ensure_directory_exists;

pub const CONFIG_FILE_NAME: &str = "lightlink.json";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub scan: ScanConfig,
    pub connection: ConnectionConfig,
}

impl AppConfig {
    /// Loads the config from a configuration file.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        let file_path_str = file_path.to_string_lossy().into_owned();

        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path_str);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;
        config.validate()?;

        info!("Config loaded from {:?}", file_path_str);
        Ok(config)
    }

    /// Rejects values the session cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.scan.rescan_interval_ms == 0 {
            bail!("scan.rescan_interval_ms must be greater than zero");
        }
        Ok(())
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        if let Some(config_dir) = file_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            ensure_directory_exists(config_dir).await?;
        }
        let file_path_str = file_path.to_string_lossy().into_owned();

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;
        info!("Config saved to {:?}", file_path_str);
        Ok(())
    }
}
