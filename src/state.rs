//! Application state management
//! One context object built at startup and handed to every command.

use std::sync::Arc;

use anyhow::Result;
use log::info;
use tokio::sync::{Mutex, OnceCell};

use crate::config::AppConfig;
use crate::core::BluetoothManager;
use crate::core::bluetooth::transport::Central;
use crate::preset::PresetStore;

pub struct AppState {
    pub config: AppConfig,
    /// Platform override; the default adapter is used when absent
    central: Option<Arc<dyn Central>>,
    bluetooth_manager: OnceCell<Arc<BluetoothManager>>,
    pub presets: Mutex<PresetStore>,
}

impl AppState {
    pub async fn new(config: AppConfig) -> Result<Self> {
        Self::build(config, None).await
    }

    /// State whose device access goes through `central`
    pub async fn with_central(config: AppConfig, central: Arc<dyn Central>) -> Result<Self> {
        Self::build(config, Some(central)).await
    }

    async fn build(config: AppConfig, central: Option<Arc<dyn Central>>) -> Result<Self> {
        let presets = PresetStore::load(config.presets_path()?).await?;
        Ok(Self {
            config,
            central,
            bluetooth_manager: OnceCell::new(),
            presets: Mutex::new(presets),
        })
    }

    /// The Bluetooth manager, created on first use so that commands without
    /// a device never touch the adapter.
    pub async fn bluetooth_manager(&self) -> Result<Arc<BluetoothManager>> {
        let manager = self
            .bluetooth_manager
            .get_or_try_init(|| async {
                info!("Initializing BluetoothManager...");
                let link = self.config.link.clone();
                let manager = match &self.central {
                    Some(central) => BluetoothManager::new(central.clone(), link),
                    None => BluetoothManager::with_bluest(link).await?,
                };
                Ok::<_, anyhow::Error>(Arc::new(manager))
            })
            .await?;
        Ok(manager.clone())
    }
}
