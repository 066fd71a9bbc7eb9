pub mod link_config;

use std::path::{Path, PathBuf};

use anyhow::Result;
use log::{LevelFilter, error, info, warn};
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::config::link_config::LinkConfig;
use crate::utils::{app_config_dir, ensure_directory_exists};

const CONFIG_FILE_NAME: &str = "config.json";
const PRESETS_FILE_NAME: &str = "presets.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub link: LinkConfig,
    /// Used unless `RUST_LOG` is set
    pub log_level: String,
    /// Defaults to `presets.json` next to the config file
    pub presets_file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            link: LinkConfig::default(),
            log_level: "info".to_string(),
            presets_file: None,
        }
    }
}

impl AppConfig {
    pub fn default_path() -> Result<PathBuf> {
        Ok(app_config_dir()?.join(CONFIG_FILE_NAME))
    }

    /// Loads the config from a configuration file.
    pub async fn load_config(file_path: &Path) -> Result<Self> {
        if !file_path.exists() {
            warn!("Config file not found at {:?}, using default.", file_path);
            return Ok(Self::default());
        }

        let config_json = fs::read_to_string(file_path).await?;
        let config: Self = serde_json::from_str(&config_json)?;

        info!("Config loaded from {:?}", file_path);
        Ok(config)
    }

    /// Saves the current config to a configuration file.
    pub async fn save_config(&self, file_path: &Path) -> Result<()> {
        if let Some(dir) = file_path.parent() {
            ensure_directory_exists(dir).await?;
        }

        let config_json = match serde_json::to_string_pretty(&self) {
            Ok(json) => json,
            Err(e) => {
                error!("Failed to serialize config to JSON: {}", e);
                return Err(e.into());
            }
        };

        fs::write(file_path, config_json).await?;
        info!("Config saved to {:?}", file_path);
        Ok(())
    }

    pub fn presets_path(&self) -> Result<PathBuf> {
        match &self.presets_file {
            Some(path) => Ok(path.clone()),
            None => Ok(app_config_dir()?.join(PRESETS_FILE_NAME)),
        }
    }

    /// Configured level, `Info` when it does not parse
    pub fn level_filter(&self) -> LevelFilter {
        self.log_level.parse().unwrap_or(LevelFilter::Info)
    }
}
