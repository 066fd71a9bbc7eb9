use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Device};
use futures_util::StreamExt;
use log::{debug, info};
use tokio::time::timeout;

use crate::core::bluetooth::bluest_backend::BluestPeripheral;
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::transport::{Central, Peripheral};
use crate::core::bluetooth::types::ScanFilter;

/// Picks the device to connect to, using the system's default adapter
#[derive(Clone)]
pub struct BluestCentral {
    adapter: Adapter,
    scan_timeout: Duration,
    min_rssi: i16,
}

impl BluestCentral {
    pub async fn new(scan_timeout: Duration, min_rssi: i16) -> Result<Self, BleError> {
        let adapter = Adapter::default()
            .await
            .ok_or_else(|| BleError::Connection("No Bluetooth adapter found".into()))?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");
        Ok(Self {
            adapter,
            scan_timeout,
            min_rssi,
        })
    }

    /// Devices the OS already holds a link to. Accept-all never picks one of
    /// these, since any paired accessory would match.
    async fn find_connected(&self, filter: &ScanFilter) -> Result<Option<Device>, BleError> {
        info!("Checking for connected devices");
        let devices = match filter {
            ScanFilter::Service(uuid) => self.adapter.connected_devices_with_services(&[*uuid]).await?,
            ScanFilter::NamePrefix(_) => self.adapter.connected_devices().await?,
            ScanFilter::AcceptAll => return Ok(None),
        };

        let services = filter.service_uuids();
        Ok(devices
            .into_iter()
            .find(|device| filter.matches(device.name().ok().as_deref(), &services)))
    }

    async fn scan(&self, filter: &ScanFilter) -> Result<Option<Device>, BleError> {
        info!("Starting bluetooth scan");
        let services = filter.service_uuids();
        let mut scan_stream = self.adapter.scan(&services).await?;

        while let Some(discovered) = scan_stream.next().await {
            let device = discovered.device;
            let rssi = discovered.rssi;
            debug!("Found device - Device: {:?}, RSSI: {:?}", device, rssi);

            // Only consider devices with medium or stronger signal strength
            if rssi.is_none_or(|strength| strength < self.min_rssi) {
                continue;
            }
            let name = discovered
                .adv_data
                .local_name
                .clone()
                .or_else(|| device.name().ok());
            if filter.matches(name.as_deref(), &discovered.adv_data.services) {
                return Ok(Some(device));
            }
        }
        info!("Bluetooth scan stream has ended.");
        Ok(None)
    }
}

#[async_trait]
impl Central for BluestCentral {
    async fn select_device(&self, filter: &ScanFilter) -> Result<Arc<dyn Peripheral>, BleError> {
        let device = match self.find_connected(filter).await? {
            Some(device) => {
                info!("Using already connected device {}", device.id());
                device
            }
            None => {
                info!("No connected device matches, scanning for {:?}", self.scan_timeout);
                match timeout(self.scan_timeout, self.scan(filter)).await {
                    Ok(Ok(Some(device))) => device,
                    Ok(Ok(None)) => {
                        return Err(BleError::Connection("scan ended without a matching device".into()));
                    }
                    Ok(Err(e)) => return Err(e),
                    Err(_) => {
                        return Err(BleError::Connection(format!(
                            "no matching device found within {:?}",
                            self.scan_timeout
                        )));
                    }
                }
            }
        };

        info!(
            "Selected device: ID: {}, Name: {:?}",
            device.id(),
            device.name().ok()
        );
        Ok(Arc::new(BluestPeripheral::new(self.adapter.clone(), device)))
    }
}
