//! bluest implementation of the transport traits

use std::sync::Arc;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, ConnectionEvent, Device};
use futures_util::StreamExt;
use log::{debug, error, info};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::transport::{
    GattCharacteristic, NotificationSink, Peripheral, RawNotification,
};

#[derive(Clone)]
pub struct BluestCharacteristic {
    inner: Characteristic,
}

impl BluestCharacteristic {
    pub fn new(inner: Characteristic) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl GattCharacteristic for BluestCharacteristic {
    fn uuid(&self) -> Uuid {
        self.inner.uuid()
    }

    async fn read(&self) -> Result<Vec<u8>, BleError> {
        Ok(self.inner.read().await?)
    }

    async fn write(&self, data: &[u8]) -> Result<(), BleError> {
        Ok(self.inner.write(data).await?)
    }

    async fn subscribe(
        &self,
        sink: NotificationSink,
        stop: CancellationToken,
    ) -> Result<JoinHandle<()>, BleError> {
        let characteristic = self.inner.clone();
        let uuid = characteristic.uuid();
        let (ready_tx, ready_rx) = oneshot::channel();

        // The notify stream borrows the characteristic, so both live in the task.
        // Dropping the stream disables notifications on the device.
        let task = tokio::spawn(async move {
            let stream = match characteristic.notify().await {
                Ok(stream) => {
                    let _ = ready_tx.send(Ok(()));
                    stream
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(BleError::from(e)));
                    return;
                }
            };
            tokio::pin!(stream);

            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    next = stream.next() => match next {
                        Some(Ok(payload)) => {
                            debug!("Received {:?} from {}", payload, uuid);
                            if sink.send(RawNotification { uuid, payload }).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => {
                            error!("Error in notification stream of {}: {}", uuid, e);
                            break;
                        }
                        None => break,
                    },
                }
            }
            info!("Notification stream of {} ended", uuid);
        });

        match ready_rx.await {
            Ok(Ok(())) => Ok(task),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(BleError::Transport(format!(
                "notification task for {} ended before subscribing",
                uuid
            ))),
        }
    }
}

pub struct BluestPeripheral {
    adapter: Adapter,
    device: Device,
}

impl BluestPeripheral {
    pub fn new(adapter: Adapter, device: Device) -> Self {
        Self { adapter, device }
    }
}

#[async_trait]
impl Peripheral for BluestPeripheral {
    fn id(&self) -> String {
        self.device.id().to_string()
    }

    fn name(&self) -> Option<String> {
        self.device.name().ok()
    }

    async fn connect(&self) -> Result<(), BleError> {
        if self.device.is_connected().await {
            info!("Device {} already connected at the OS level", self.device.id());
            return Ok(());
        }
        self.adapter.connect_device(&self.device).await?;
        Ok(())
    }

    async fn discover_characteristics(
        &self,
        service: Uuid,
    ) -> Result<Vec<Arc<dyn GattCharacteristic>>, BleError> {
        let services = self.device.discover_services_with_uuid(service).await?;
        let Some(found) = services.into_iter().next() else {
            for available in self.device.services().await.unwrap_or_default() {
                info!("Available service: {}", available.uuid());
            }
            return Err(BleError::Transport(format!("Service {} not found", service)));
        };

        info!("Found configuration service: {}", found.uuid());
        Ok(found
            .characteristics()
            .await?
            .into_iter()
            .map(|c| Arc::new(BluestCharacteristic::new(c)) as Arc<dyn GattCharacteristic>)
            .collect())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        if !self.device.is_connected().await {
            info!("Device {} not connected", self.device.id());
            return Ok(());
        }
        self.adapter.disconnect_device(&self.device).await?;
        Ok(())
    }

    async fn wait_link_dropped(&self) -> Result<(), BleError> {
        let events = self.adapter.device_connection_events(&self.device).await?;
        tokio::pin!(events);
        while let Some(event) = events.next().await {
            if matches!(event, ConnectionEvent::Disconnected) {
                return Ok(());
            }
        }
        Err(BleError::Transport("connection event stream ended".into()))
    }
}
