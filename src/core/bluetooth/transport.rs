//! Platform seam of the BLE layer
//! Everything above this module talks to the radio only through these traits.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::types::ScanFilter;

/// A value-changed event as delivered by the platform, not yet decoded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawNotification {
    pub uuid: Uuid,
    pub payload: Vec<u8>,
}

pub type NotificationSink = mpsc::UnboundedSender<RawNotification>;

/// A live characteristic handle, valid for one connection
#[async_trait]
pub trait GattCharacteristic: Send + Sync {
    fn uuid(&self) -> Uuid;

    async fn read(&self) -> Result<Vec<u8>, BleError>;

    async fn write(&self, data: &[u8]) -> Result<(), BleError>;

    /// Enables notifications and forwards every value into `sink` until `stop` is cancelled.
    /// The returned task finishes once notifications are disabled again.
    async fn subscribe(
        &self,
        sink: NotificationSink,
        stop: CancellationToken,
    ) -> Result<JoinHandle<()>, BleError>;
}

/// A selected device
#[async_trait]
pub trait Peripheral: Send + Sync {
    /// Platform identifier
    fn id(&self) -> String;

    fn name(&self) -> Option<String>;

    async fn connect(&self) -> Result<(), BleError>;

    /// Discovers `service` and returns every characteristic found under it.
    async fn discover_characteristics(
        &self,
        service: Uuid,
    ) -> Result<Vec<Arc<dyn GattCharacteristic>>, BleError>;

    async fn disconnect(&self) -> Result<(), BleError>;

    /// Resolves once the platform reports that the link is gone.
    async fn wait_link_dropped(&self) -> Result<(), BleError>;
}

/// Device selection
#[async_trait]
pub trait Central: Send + Sync {
    async fn select_device(&self, filter: &ScanFilter) -> Result<Arc<dyn Peripheral>, BleError>;
}
