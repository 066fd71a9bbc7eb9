//! In-memory device implementing the transport traits, for tests.
//!
//! Every platform call is appended to an operation log so tests can assert
//! ordering, e.g. of the disconnect sequence.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::core::bluetooth::codec::{Rgb, WireValue, encode};
use crate::core::bluetooth::constants::UUID_CONFIG_SERVICE;
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::parameters::{DESCRIPTORS, Parameter};
use crate::core::bluetooth::transport::{
    Central, GattCharacteristic, NotificationSink, Peripheral, RawNotification,
};
use crate::core::bluetooth::types::ScanFilter;

pub const FAKE_NAME: &str = "HaptiBand-Test";

pub struct FakeDevice {
    values: Mutex<HashMap<Uuid, Vec<u8>>>,
    absent: Mutex<HashSet<Uuid>>,
    failing_reads: Mutex<HashSet<Uuid>>,
    failing_writes: Mutex<HashSet<Uuid>>,
    sinks: Mutex<Vec<(Uuid, NotificationSink)>>,
    log: Mutex<Vec<String>>,
    link: watch::Sender<bool>,
    fail_connect: AtomicBool,
}

fn label(uuid: Uuid) -> String {
    Parameter::from_uuid(uuid)
        .map(|p| p.to_string())
        .unwrap_or_else(|| uuid.to_string())
}

impl FakeDevice {
    pub fn new() -> Arc<Self> {
        let mut values = HashMap::new();
        let defaults = [
            (Parameter::MotorMode, WireValue::U8(4)),
            (Parameter::CustomFrequency, WireValue::U16(100)),
            (Parameter::CustomDutyCycle, WireValue::U8(50)),
            (Parameter::Mode0Intensity, WireValue::U8(50)),
            (Parameter::Mode1Intensity, WireValue::U8(50)),
            (Parameter::Mode2Intensity, WireValue::U8(60)),
            (Parameter::Mode3Intensity, WireValue::U8(60)),
            (Parameter::Mode4Intensity, WireValue::U8(70)),
            (Parameter::LedEnable, WireValue::U8(1)),
            (Parameter::LedColorMode, WireValue::U8(0)),
            (Parameter::LedPaletteIndex, WireValue::U8(3)),
            (Parameter::LedCustomRgb, WireValue::Rgb(Rgb::new(255, 128, 0))),
            (Parameter::LedBrightness, WireValue::U8(20)),
            (Parameter::SessionDuration, WireValue::U32(3600)),
            (Parameter::SessionElapsed, WireValue::U32(0)),
            (Parameter::BatteryLevel, WireValue::U8(87)),
        ];
        for (parameter, value) in defaults {
            values.insert(parameter.descriptor().uuid, encode(value));
        }

        let (link, _) = watch::channel(false);
        Arc::new(Self {
            values: Mutex::new(values),
            absent: Mutex::new(HashSet::new()),
            failing_reads: Mutex::new(HashSet::new()),
            failing_writes: Mutex::new(HashSet::new()),
            sinks: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
            link,
            fail_connect: AtomicBool::new(false),
        })
    }

    pub fn peripheral(self: &Arc<Self>) -> Arc<FakePeripheral> {
        Arc::new(FakePeripheral {
            device: self.clone(),
        })
    }

    pub fn central(self: &Arc<Self>) -> Arc<FakeCentral> {
        Arc::new(FakeCentral {
            device: self.clone(),
        })
    }

    pub fn remove_characteristic(&self, uuid: Uuid) {
        self.absent.lock().unwrap().insert(uuid);
    }

    pub fn fail_reads(&self, parameter: Parameter) {
        self.failing_reads
            .lock()
            .unwrap()
            .insert(parameter.descriptor().uuid);
    }

    pub fn fail_writes(&self, parameter: Parameter) {
        self.failing_writes
            .lock()
            .unwrap()
            .insert(parameter.descriptor().uuid);
    }

    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn set(&self, parameter: Parameter, value: WireValue) {
        self.values
            .lock()
            .unwrap()
            .insert(parameter.descriptor().uuid, encode(value));
    }

    pub fn raw(&self, parameter: Parameter) -> Option<Vec<u8>> {
        self.values
            .lock()
            .unwrap()
            .get(&parameter.descriptor().uuid)
            .cloned()
    }

    pub fn is_connected(&self) -> bool {
        *self.link.borrow()
    }

    /// Number of live notification subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.sinks.lock().unwrap().len()
    }

    /// Pushes a raw payload to every subscription of `parameter`.
    pub fn notify(&self, parameter: Parameter, payload: Vec<u8>) {
        let uuid = parameter.descriptor().uuid;
        for (sink_uuid, sink) in self.sinks.lock().unwrap().iter() {
            if *sink_uuid == uuid {
                let _ = sink.send(RawNotification {
                    uuid,
                    payload: payload.clone(),
                });
            }
        }
    }

    /// Simulates the peer going away.
    pub fn drop_link(&self) {
        self.sinks.lock().unwrap().clear();
        self.link.send_replace(false);
    }

    pub fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn clear_log(&self) {
        self.log.lock().unwrap().clear();
    }

    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

pub struct FakeCharacteristic {
    uuid: Uuid,
    device: Arc<FakeDevice>,
}

#[async_trait]
impl GattCharacteristic for FakeCharacteristic {
    fn uuid(&self) -> Uuid {
        self.uuid
    }

    async fn read(&self) -> Result<Vec<u8>, BleError> {
        self.device.record(format!("read {}", label(self.uuid)));
        if !self.device.is_connected() {
            return Err(BleError::Transport("not connected".into()));
        }
        if self.device.failing_reads.lock().unwrap().contains(&self.uuid) {
            return Err(BleError::Transport(format!("read of {} failed", label(self.uuid))));
        }
        self.device
            .values
            .lock()
            .unwrap()
            .get(&self.uuid)
            .cloned()
            .ok_or_else(|| BleError::Transport("no value".into()))
    }

    async fn write(&self, data: &[u8]) -> Result<(), BleError> {
        self.device.record(format!("write {}", label(self.uuid)));
        if !self.device.is_connected() {
            return Err(BleError::Transport("not connected".into()));
        }
        if self.device.failing_writes.lock().unwrap().contains(&self.uuid) {
            return Err(BleError::Transport(format!("write of {} failed", label(self.uuid))));
        }
        self.device
            .values
            .lock()
            .unwrap()
            .insert(self.uuid, data.to_vec());
        Ok(())
    }

    async fn subscribe(
        &self,
        sink: NotificationSink,
        stop: CancellationToken,
    ) -> Result<JoinHandle<()>, BleError> {
        self.device.record(format!("subscribe {}", label(self.uuid)));
        self.device.sinks.lock().unwrap().push((self.uuid, sink));

        let device = self.device.clone();
        let uuid = self.uuid;
        Ok(tokio::spawn(async move {
            stop.cancelled().await;
            device.sinks.lock().unwrap().retain(|(u, _)| *u != uuid);
            device.record(format!("unsubscribe {}", label(uuid)));
        }))
    }
}

pub struct FakePeripheral {
    device: Arc<FakeDevice>,
}

#[async_trait]
impl Peripheral for FakePeripheral {
    fn id(&self) -> String {
        "FAKE#aa:bb:cc:dd:ee:01".to_string()
    }

    fn name(&self) -> Option<String> {
        Some(FAKE_NAME.to_string())
    }

    async fn connect(&self) -> Result<(), BleError> {
        self.device.record("connect".into());
        if self.device.fail_connect.load(Ordering::SeqCst) {
            return Err(BleError::Transport("connect refused".into()));
        }
        self.device.link.send_replace(true);
        Ok(())
    }

    async fn discover_characteristics(
        &self,
        service: Uuid,
    ) -> Result<Vec<Arc<dyn GattCharacteristic>>, BleError> {
        self.device.record("discover".into());
        if service != UUID_CONFIG_SERVICE {
            return Err(BleError::Transport(format!("service {} not found", service)));
        }
        let absent = self.device.absent.lock().unwrap().clone();
        Ok(DESCRIPTORS
            .iter()
            .filter(|d| !absent.contains(&d.uuid))
            .map(|d| {
                Arc::new(FakeCharacteristic {
                    uuid: d.uuid,
                    device: self.device.clone(),
                }) as Arc<dyn GattCharacteristic>
            })
            .collect())
    }

    async fn disconnect(&self) -> Result<(), BleError> {
        self.device.record("disconnect".into());
        self.device.drop_link();
        Ok(())
    }

    async fn wait_link_dropped(&self) -> Result<(), BleError> {
        let mut rx = self.device.link.subscribe();
        rx.wait_for(|connected| !*connected)
            .await
            .map_err(|e| BleError::Transport(e.to_string()))?;
        Ok(())
    }
}

pub struct FakeCentral {
    device: Arc<FakeDevice>,
}

#[async_trait]
impl Central for FakeCentral {
    async fn select_device(&self, filter: &ScanFilter) -> Result<Arc<dyn Peripheral>, BleError> {
        self.device.record(format!("select {:?}", filter));
        if !filter.matches(Some(FAKE_NAME), &[UUID_CONFIG_SERVICE]) {
            return Err(BleError::Connection("no matching device found".into()));
        }
        Ok(self.device.peripheral())
    }
}
