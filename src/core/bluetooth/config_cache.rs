//! Config cache and change bus
//! Holds the last full configuration snapshot and broadcasts each fresh one.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};
use tokio::sync::Mutex;

use crate::core::bluetooth::codec::{self, WireValue};
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::parameters::Parameter;
use crate::core::bluetooth::registry::CharacteristicRegistry;
use crate::core::bluetooth::subscribers::{Callback, SubscriberSet, Subscription};
use crate::core::device_config::DeviceConfig;

pub struct ConfigCache {
    current: RwLock<Option<Arc<DeviceConfig>>>,
    listeners: Arc<SubscriberSet<Arc<DeviceConfig>>>,
    /// Serializes full reads against each other
    read_lock: Mutex<()>,
}

impl Default for ConfigCache {
    fn default() -> Self {
        Self {
            current: RwLock::new(None),
            listeners: SubscriberSet::new(),
            read_lock: Mutex::new(()),
        }
    }
}

impl ConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads every resolved parameter one after another, then replaces the
    /// cache and broadcasts. Parameters the firmware lacks stay empty in the snapshot.
    ///
    /// On any failure the previous snapshot stays in place and nothing is broadcast.
    pub async fn read_all(&self, registry: &CharacteristicRegistry) -> Result<Arc<DeviceConfig>, BleError> {
        let _guard = self.read_lock.lock().await;
        let available = registry.available();
        if available.is_empty() {
            return Err(BleError::NotConnected);
        }
        info!("Reading full device configuration ({} parameters)...", available.len());

        let mut values = HashMap::with_capacity(available.len());
        for parameter in available {
            let handle = registry.resolve(parameter)?;
            let bytes = handle.read().await?;
            let value = codec::decode(parameter.descriptor().kind, &bytes)?;
            debug!("Read {} = {}", parameter, value);
            values.insert(parameter, value);
        }

        let config = Arc::new(DeviceConfig::from_values(&values)?);
        let missing = config.missing();
        if !missing.is_empty() {
            debug!("Snapshot without {:?}", missing);
        }
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Some(config.clone());

        let notified = self.listeners.emit(&config);
        info!("Device configuration refreshed, {} listener(s) notified", notified);
        Ok(config)
    }

    /// Folds a device-reported change into the cached snapshot.
    ///
    /// The snapshot is replaced whole and broadcast once. Without a cached
    /// snapshot, or when the value is already cached, nothing happens.
    /// Returns whether a new snapshot was installed.
    pub fn apply_notification(&self, parameter: Parameter, value: &WireValue) -> bool {
        let updated = {
            let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
            let Some(snapshot) = current.as_ref() else {
                debug!("No snapshot cached, ignoring {} notification", parameter);
                return false;
            };
            if snapshot.value(parameter).as_ref() == Some(value) {
                return false;
            }
            match snapshot.with_value(parameter, value) {
                Ok(next) => {
                    let next = Arc::new(next);
                    *current = Some(next.clone());
                    next
                }
                Err(e) => {
                    warn!("Not caching {} notification {}: {}", parameter, value, e);
                    return false;
                }
            }
        };

        let notified = self.listeners.emit(&updated);
        info!("Cached {} updated from notification, {} listener(s) notified", parameter, notified);
        true
    }

    /// The last completed snapshot, without touching the device.
    pub fn cached(&self) -> Option<Arc<DeviceConfig>> {
        self.current.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Registers for one broadcast per completed [`ConfigCache::read_all`] and
    /// per snapshot change folded in by [`ConfigCache::apply_notification`].
    pub fn on_change(&self, callback: Callback<Arc<DeviceConfig>>) -> Subscription {
        self.listeners.subscribe(callback)
    }

    pub fn clear(&self) {
        if self
            .current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .is_some()
        {
            warn!("Cached device configuration discarded");
        }
    }
}
