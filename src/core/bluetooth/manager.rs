//! Bluetooth manager for the haptic device
//! This module provides the main interface for bluetooth operations

use std::sync::Arc;

use log::info;

use crate::config::link_config::LinkConfig;
use crate::core::bluetooth::api::ParameterApi;
use crate::core::bluetooth::codec::WireValue;
use crate::core::bluetooth::connection::{ConnectionManager, ConnectionState};
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::parameters::Parameter;
use crate::core::bluetooth::scanner::BluestCentral;
use crate::core::bluetooth::subscribers::{Callback, Subscription};
use crate::core::bluetooth::transport::Central;
use crate::core::bluetooth::types::{BluetoothDevice, ScanFilter};
use crate::core::debounce::{DebouncedWriter, ParameterWriter};
use crate::core::device_config::DeviceConfig;
use crate::preset::PresetConfig;

/// Manages Bluetooth operations
pub struct BluetoothManager {
    connection: ConnectionManager,
    api: ParameterApi,
    config: LinkConfig,
}

impl BluetoothManager {
    pub fn new(central: Arc<dyn Central>, config: LinkConfig) -> Self {
        let connection = ConnectionManager::new(central, config.disconnect_timing());
        let api = ParameterApi::new(connection.registry().clone());
        Self {
            connection,
            api,
            config,
        }
    }

    /// Creates a manager on the system's default adapter
    pub async fn with_bluest(config: LinkConfig) -> Result<Self, BleError> {
        let central = BluestCentral::new(config.scan_timeout(), config.min_rssi).await?;
        Ok(Self::new(Arc::new(central), config))
    }

    pub fn link_config(&self) -> &LinkConfig {
        &self.config
    }

    /// Connects using the configured device selection and notification setting
    pub async fn connect(&self) -> Result<(), BleError> {
        let filter = self.config.selection.filter();
        self.connect_with(&filter, self.config.subscribe_notifications)
            .await
    }

    pub async fn connect_with(&self, filter: &ScanFilter, subscribe: bool) -> Result<(), BleError> {
        self.connection.connect(filter, subscribe).await
    }

    pub async fn disconnect(&self) {
        self.connection.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn device(&self) -> Option<BluetoothDevice> {
        self.connection.device()
    }

    pub fn device_name(&self) -> Option<String> {
        self.connection.device_name()
    }

    pub fn api(&self) -> &ParameterApi {
        &self.api
    }

    /// Reads the full configuration, refreshing the cache and notifying listeners
    pub async fn read_all(&self) -> Result<Arc<DeviceConfig>, BleError> {
        if !self.is_connected() {
            return Err(BleError::NotConnected);
        }
        self.connection.cache().read_all(self.connection.registry()).await
    }

    pub fn cached_config(&self) -> Option<Arc<DeviceConfig>> {
        self.connection.cache().cached()
    }

    /// Cached configuration, falling back to a full read on a cache miss
    pub async fn config(&self) -> Result<Arc<DeviceConfig>, BleError> {
        match self.cached_config() {
            Some(config) => Ok(config),
            None => self.read_all().await,
        }
    }

    pub fn on_config_change(&self, callback: Callback<Arc<DeviceConfig>>) -> Subscription {
        self.connection.cache().on_change(callback)
    }

    /// Subscribes to notifications of `parameter`.
    /// Subscriptions only last for the current connection.
    pub fn subscribe(&self, parameter: Parameter, callback: Callback<WireValue>) -> Subscription {
        self.connection.router().subscribe(parameter, callback)
    }

    /// Writes every parameter of `preset`, then refreshes the cache once so
    /// every listener sees the applied state.
    pub async fn apply_preset(&self, preset: &PresetConfig) -> Result<Arc<DeviceConfig>, BleError> {
        if !self.is_connected() {
            return Err(BleError::NotConnected);
        }
        preset.validate()?;
        self.api.apply_config(preset).await?;
        let config = self.read_all().await?;
        match config.motor_mode {
            Some(mode) => info!("Preset applied, device reports motor {}", mode),
            None => info!("Preset applied"),
        }
        Ok(config)
    }

    /// Debounced writer for `parameter`, seeded with its cached value
    pub fn debounced_writer(&self, parameter: Parameter) -> DebouncedWriter<WireValue, ParameterWriter> {
        let writer = DebouncedWriter::new(
            ParameterWriter::new(self.api.clone(), parameter),
            self.config.debounce_delay(),
        );
        match self.cached_config().and_then(|config| config.value(parameter)) {
            Some(value) => writer.with_last_sent(value),
            None => writer,
        }
    }
}
