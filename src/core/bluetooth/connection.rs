//! Connection handling for the haptic device
//! Owns the link lifecycle: selection, connect, discovery, notification
//! subscription and the graceful disconnect sequence.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::codec::WireValue;
use crate::core::bluetooth::config_cache::ConfigCache;
use crate::core::bluetooth::constants::{
    POST_DISCONNECT_SETTLE_MS, PRE_DISCONNECT_SETTLE_MS, UUID_CONFIG_SERVICE,
};
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::notification::NotificationRouter;
use crate::core::bluetooth::parameters::{Parameter, notify_capable};
use crate::core::bluetooth::registry::CharacteristicRegistry;
use crate::core::bluetooth::transport::{Central, Peripheral};
use crate::core::bluetooth::types::{BluetoothDevice, ScanFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Disconnecting,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEvent {
    ConnectRequested,
    ConnectSucceeded,
    ConnectFailed,
    DisconnectRequested,
    DisconnectFinished,
    /// The platform reported the peer gone
    LinkDropped,
}

impl ConnectionState {
    /// Transition table. `None` means the event does not apply in this state.
    pub fn next(self, event: ConnectionEvent) -> Option<ConnectionState> {
        use ConnectionEvent::*;
        use ConnectionState::*;

        match (self, event) {
            (Disconnected, ConnectRequested) => Some(Connecting),
            (Connecting, ConnectSucceeded) => Some(Connected),
            (Connecting, ConnectFailed) => Some(Disconnected),
            (Connected, DisconnectRequested) => Some(Disconnecting),
            (Disconnecting, DisconnectFinished) => Some(Disconnected),
            (Connected, LinkDropped) => Some(Disconnected),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
        };
        f.write_str(name)
    }
}

/// Settle delays of the disconnect sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DisconnectTiming {
    /// Between the forced read and the platform disconnect
    pub pre_settle: Duration,
    /// After the platform disconnect, so the frame actually goes out
    pub post_settle: Duration,
}

impl Default for DisconnectTiming {
    fn default() -> Self {
        Self {
            pre_settle: Duration::from_millis(PRE_DISCONNECT_SETTLE_MS),
            post_settle: Duration::from_millis(POST_DISCONNECT_SETTLE_MS),
        }
    }
}

/// Everything that lives exactly as long as one connection
struct ActiveLink {
    peripheral: Arc<dyn Peripheral>,
    device: BluetoothDevice,
    notify_stop: CancellationToken,
    notify_tasks: Vec<JoinHandle<()>>,
    router_task: Option<JoinHandle<()>>,
    /// Cancelling this removes the link-dropped listener
    watch_stop: CancellationToken,
}

impl ActiveLink {
    fn new(peripheral: Arc<dyn Peripheral>) -> Self {
        let device = BluetoothDevice::new(peripheral.id(), peripheral.name());
        Self {
            peripheral,
            device,
            notify_stop: CancellationToken::new(),
            notify_tasks: Vec::new(),
            router_task: None,
            watch_stop: CancellationToken::new(),
        }
    }

    /// Disables every notification and waits until each subscription task has finished.
    async fn stop_notifications(&mut self) {
        self.notify_stop.cancel();
        for task in self.notify_tasks.drain(..) {
            if let Err(e) = task.await {
                warn!("Notification task ended abnormally: {}", e);
            }
        }
    }
}

/// Connection manager for the device
#[derive(Clone)]
pub struct ConnectionManager {
    central: Arc<dyn Central>,
    registry: Arc<CharacteristicRegistry>,
    router: Arc<NotificationRouter>,
    cache: Arc<ConfigCache>,
    timing: DisconnectTiming,
    state: Arc<Mutex<ConnectionState>>,
    link: Arc<Mutex<Option<ActiveLink>>>,
    /// Serializes connect and disconnect
    op_lock: Arc<AsyncMutex<()>>,
}

impl ConnectionManager {
    pub fn new(central: Arc<dyn Central>, timing: DisconnectTiming) -> Self {
        Self {
            central,
            registry: Arc::new(CharacteristicRegistry::new()),
            router: Arc::new(NotificationRouter::new()),
            cache: Arc::new(ConfigCache::new()),
            timing,
            state: Arc::new(Mutex::new(ConnectionState::Disconnected)),
            link: Arc::new(Mutex::new(None)),
            op_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    pub fn registry(&self) -> &Arc<CharacteristicRegistry> {
        &self.registry
    }

    pub fn router(&self) -> &Arc<NotificationRouter> {
        &self.router
    }

    pub fn cache(&self) -> &Arc<ConfigCache> {
        &self.cache
    }

    pub fn state(&self) -> ConnectionState {
        *self.lock_state()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Identity of the connected device
    pub fn device(&self) -> Option<BluetoothDevice> {
        self.lock_link().as_ref().map(|link| link.device.clone())
    }

    pub fn device_name(&self) -> Option<String> {
        self.device().and_then(|device| device.name)
    }

    /// Selects a device, connects, resolves its characteristics and, if
    /// `subscribe` is set, enables notifications for every notify-capable
    /// parameter. Finishes with one full configuration read.
    ///
    /// Any failure before the link is up leaves the manager disconnected with
    /// all partial resources released.
    pub async fn connect(&self, filter: &ScanFilter, subscribe: bool) -> Result<(), BleError> {
        let _op = self.op_lock.lock().await;
        if !self.transition(ConnectionEvent::ConnectRequested) {
            return Err(BleError::AlreadyConnected);
        }

        let link = match self.establish(filter, subscribe).await {
            Ok(link) => link,
            Err(e) => {
                error!("Connection failed: {}", e);
                self.release(None);
                self.transition(ConnectionEvent::ConnectFailed);
                return Err(e.into_connection());
            }
        };

        info!(
            "Connected to {} ({})",
            link.device.name.as_deref().unwrap_or("Unknown"),
            link.device.address
        );
        let peripheral = link.peripheral.clone();
        let watch_stop = link.watch_stop.clone();
        *self.lock_link() = Some(link);
        self.transition(ConnectionEvent::ConnectSucceeded);
        self.watch_link(peripheral, watch_stop);

        if let Err(e) = self.cache.read_all(&self.registry).await {
            warn!("Initial configuration read failed, staying connected: {}", e);
        }
        Ok(())
    }

    async fn establish(&self, filter: &ScanFilter, subscribe: bool) -> Result<ActiveLink, BleError> {
        info!("Selecting device with filter {:?}", filter);
        let peripheral = self.central.select_device(filter).await?;
        let mut link = ActiveLink::new(peripheral);

        info!("Initiating connection to {}...", link.device.id);
        link.peripheral.connect().await?;

        if let Err(e) = self.prepare(&mut link, subscribe).await {
            warn!("Connection setup failed, closing link");
            link.stop_notifications().await;
            if let Some(task) = link.router_task.take() {
                task.abort();
            }
            if let Err(e) = link.peripheral.disconnect().await {
                warn!("Disconnect after failed setup also failed: {}", e);
            }
            return Err(e);
        }
        Ok(link)
    }

    async fn prepare(&self, link: &mut ActiveLink, subscribe: bool) -> Result<(), BleError> {
        self.registry
            .discover(link.peripheral.as_ref(), UUID_CONFIG_SERVICE)
            .await?;

        if !subscribe {
            info!("Notifications disabled by caller");
            return Ok(());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        link.router_task = Some(tokio::spawn(self.router.clone().run(rx)));

        for descriptor in notify_capable() {
            let handle = match self.registry.resolve(descriptor.parameter) {
                Ok(handle) => handle,
                Err(_) => {
                    debug!("{} not available, not subscribing", descriptor.parameter);
                    continue;
                }
            };
            info!("Subscribing to {} notifications", descriptor.parameter);
            let task = handle
                .subscribe(tx.clone(), link.notify_stop.child_token())
                .await?;
            link.notify_tasks.push(task);

            if descriptor.writable {
                self.feed_cache(descriptor.parameter);
            }
        }
        Ok(())
    }

    /// Keeps the cached snapshot in step with device-side changes of a
    /// configuration parameter. The router drops this subscription on release.
    fn feed_cache(&self, parameter: Parameter) {
        let cache = self.cache.clone();
        let _feed = self.router.subscribe(
            parameter,
            Arc::new(move |value: &WireValue| {
                cache.apply_notification(parameter, value);
            }),
        );
    }

    fn watch_link(&self, peripheral: Arc<dyn Peripheral>, stop: CancellationToken) {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = stop.cancelled() => debug!("Link-dropped listener removed"),
                result = peripheral.wait_link_dropped() => match result {
                    Ok(()) => {
                        warn!("Device link dropped unexpectedly");
                        manager.on_link_dropped();
                    }
                    Err(e) => warn!("Stopped watching link state: {}", e),
                },
            }
        });
    }

    /// Graceful disconnect. Every step's failure is logged and swallowed;
    /// the final state release always runs.
    pub async fn disconnect(&self) {
        let _op = self.op_lock.lock().await;
        // Taking the link first turns a racing link-dropped event into a no-op.
        let Some(mut link) = self.lock_link().take() else {
            info!("Disconnect requested while not connected");
            return;
        };
        self.transition(ConnectionEvent::DisconnectRequested);
        info!("Disconnecting from {}...", link.device.id);

        // 1. Notifications must be off before the link goes down.
        link.stop_notifications().await;

        // 2. A harmless read pulls the link out of idle so the disconnect is flushed.
        self.force_read().await;

        // 3.
        sleep(self.timing.pre_settle).await;

        // 4.
        link.watch_stop.cancel();

        // 5.
        if let Err(e) = link.peripheral.disconnect().await {
            error!("{}", BleError::Disconnect(e.to_string()));
        }

        // 6.
        sleep(self.timing.post_settle).await;

        // 7.
        self.release(Some(link));
        self.transition(ConnectionEvent::DisconnectFinished);
        info!("Disconnected");
    }

    async fn force_read(&self) {
        let parameter = if self.registry.contains(Parameter::BatteryLevel) {
            Parameter::BatteryLevel
        } else {
            match self.registry.available().first() {
                Some(parameter) => *parameter,
                None => {
                    warn!("No characteristic available for the pre-disconnect read");
                    return;
                }
            }
        };

        let result = match self.registry.resolve(parameter) {
            Ok(handle) => handle.read().await.map(|_| ()),
            Err(e) => Err(e),
        };
        match result {
            Ok(()) => debug!("Pre-disconnect read of {} done", parameter),
            Err(e) => warn!("Pre-disconnect read of {} failed, continuing: {}", parameter, e),
        }
    }

    /// Handler for the platform's link-dropped event. Idempotent.
    pub fn on_link_dropped(&self) {
        let Some(link) = self.lock_link().take() else {
            debug!("Link drop after cleanup, ignoring");
            return;
        };
        // Subscriptions died with the link; stop the tasks without touching the device.
        link.notify_stop.cancel();
        self.release(Some(link));
        self.transition(ConnectionEvent::LinkDropped);
    }

    /// Drops every per-connection resource.
    fn release(&self, link: Option<ActiveLink>) {
        if let Some(mut link) = link {
            link.watch_stop.cancel();
            if let Some(task) = link.router_task.take() {
                task.abort();
            }
        }
        self.registry.clear();
        self.router.clear();
        self.cache.clear();
        debug!("Connection state released");
    }

    fn transition(&self, event: ConnectionEvent) -> bool {
        let mut state = self.lock_state();
        match state.next(event) {
            Some(next) => {
                debug!("Connection {} -> {} on {:?}", *state, next, event);
                *state = next;
                true
            }
            None => {
                debug!("Ignoring {:?} while {}", event, *state);
                false
            }
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ConnectionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_link(&self) -> MutexGuard<'_, Option<ActiveLink>> {
        self.link.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
