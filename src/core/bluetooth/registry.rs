//! Characteristic registry
//! Maps logical parameters to the characteristic handles of the current connection.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::parameters::{DESCRIPTORS, Parameter};
use crate::core::bluetooth::transport::{GattCharacteristic, Peripheral};

#[derive(Default)]
pub struct CharacteristicRegistry {
    handles: RwLock<HashMap<Parameter, Arc<dyn GattCharacteristic>>>,
}

impl CharacteristicRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves every known parameter under `service`.
    ///
    /// Missing characteristics are logged and left out so that firmware with a
    /// partial feature set can still connect. Only a failure to discover the
    /// service itself is an error. Returns the number of resolved parameters.
    pub async fn discover(&self, peripheral: &dyn Peripheral, service: Uuid) -> Result<usize, BleError> {
        info!("Discovering characteristics of service {}", service);
        let characteristics = peripheral.discover_characteristics(service).await?;
        Ok(self.install(characteristics))
    }

    /// Replaces the mapping with the known parameters found in `characteristics`.
    pub fn install(&self, characteristics: Vec<Arc<dyn GattCharacteristic>>) -> usize {
        let mut found: HashMap<Uuid, Arc<dyn GattCharacteristic>> = characteristics
            .into_iter()
            .map(|c| (c.uuid(), c))
            .collect();

        let mut handles = HashMap::new();
        for descriptor in DESCRIPTORS.iter() {
            match found.remove(&descriptor.uuid) {
                Some(handle) => {
                    debug!("Found characteristic {} for {}", descriptor.uuid, descriptor.parameter);
                    handles.insert(descriptor.parameter, handle);
                }
                None => warn!(
                    "Characteristic {} for {} not present, parameter unavailable",
                    descriptor.uuid, descriptor.parameter
                ),
            }
        }
        for uuid in found.keys() {
            debug!("Ignoring unknown characteristic {}", uuid);
        }

        let count = handles.len();
        *self.handles.write().unwrap_or_else(PoisonError::into_inner) = handles;
        info!("Resolved {} of {} parameters", count, DESCRIPTORS.len());
        count
    }

    pub fn resolve(&self, parameter: Parameter) -> Result<Arc<dyn GattCharacteristic>, BleError> {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&parameter)
            .cloned()
            .ok_or(BleError::NotFound(parameter))
    }

    pub fn contains(&self, parameter: Parameter) -> bool {
        self.handles
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&parameter)
    }

    /// Resolved parameters, in descriptor order
    pub fn available(&self) -> Vec<Parameter> {
        let handles = self.handles.read().unwrap_or_else(PoisonError::into_inner);
        Parameter::ALL
            .into_iter()
            .filter(|p| handles.contains_key(p))
            .collect()
    }

    pub fn clear(&self) {
        self.handles.write().unwrap_or_else(PoisonError::into_inner).clear();
    }
}
