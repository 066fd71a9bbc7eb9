//! Notification routing
//! Decodes value-changed events from the device and fans them out to per-parameter subscribers.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};
use tokio::sync::mpsc;

use crate::core::bluetooth::codec::{self, WireValue};
use crate::core::bluetooth::parameters::Parameter;
use crate::core::bluetooth::subscribers::{Callback, SubscriberSet, Subscription};
use crate::core::bluetooth::transport::RawNotification;

/// Routes decoded notifications to the callbacks registered for each parameter
pub struct NotificationRouter {
    subscribers: HashMap<Parameter, Arc<SubscriberSet<WireValue>>>,
}

impl Default for NotificationRouter {
    fn default() -> Self {
        Self {
            subscribers: Parameter::ALL
                .into_iter()
                .map(|p| (p, SubscriberSet::new()))
                .collect(),
        }
    }
}

impl NotificationRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `callback` for values of `parameter`.
    pub fn subscribe(&self, parameter: Parameter, callback: Callback<WireValue>) -> Subscription {
        self.set(parameter).subscribe(callback)
    }

    pub fn subscriber_count(&self, parameter: Parameter) -> usize {
        self.set(parameter).len()
    }

    /// Decodes one event and hands it to every subscriber of its parameter.
    ///
    /// Unknown characteristics and malformed payloads are logged and dropped;
    /// they never reach subscribers. Returns the number of callbacks invoked.
    pub fn dispatch(&self, event: &RawNotification) -> usize {
        let Some(parameter) = Parameter::from_uuid(event.uuid) else {
            warn!("Notification from unknown characteristic {}", event.uuid);
            return 0;
        };

        let value = match codec::decode(parameter.descriptor().kind, &event.payload) {
            Ok(value) => value,
            Err(e) => {
                warn!("Dropping malformed {} notification {:?}: {}", parameter, event.payload, e);
                return 0;
            }
        };

        debug!("Notification {} = {}", parameter, value);
        self.set(parameter).emit(&value)
    }

    /// Dispatches events until every sender of `rx` is gone.
    pub async fn run(self: Arc<Self>, mut rx: mpsc::UnboundedReceiver<RawNotification>) {
        info!("Listening for device notifications...");
        while let Some(event) = rx.recv().await {
            self.dispatch(&event);
        }
        info!("Notification stream ended");
    }

    /// Drops every subscription of every parameter.
    pub fn clear(&self) {
        for set in self.subscribers.values() {
            set.clear();
        }
    }

    fn set(&self, parameter: Parameter) -> &Arc<SubscriberSet<WireValue>> {
        // Populated with every parameter at construction.
        &self.subscribers[&parameter]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recorder() -> (Arc<Mutex<Vec<WireValue>>>, Callback<WireValue>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_in_cb = seen.clone();
        let cb: Callback<WireValue> = Arc::new(move |v: &WireValue| {
            seen_in_cb.lock().unwrap().push(*v);
        });
        (seen, cb)
    }

    fn event(parameter: Parameter, payload: &[u8]) -> RawNotification {
        RawNotification {
            uuid: parameter.descriptor().uuid,
            payload: payload.to_vec(),
        }
    }

    #[test]
    fn decodes_with_parameter_kind() {
        let router = NotificationRouter::new();
        let (seen, cb) = recorder();
        let _sub = router.subscribe(Parameter::SessionElapsed, cb);

        assert_eq!(router.dispatch(&event(Parameter::SessionElapsed, &[0x2c, 0x01, 0, 0])), 1);
        assert_eq!(*seen.lock().unwrap(), vec![WireValue::U32(300)]);
    }

    #[test]
    fn malformed_payload_does_not_block_other_parameters() {
        let router = NotificationRouter::new();
        let (elapsed_seen, elapsed_cb) = recorder();
        let (battery_seen, battery_cb) = recorder();
        let _a = router.subscribe(Parameter::SessionElapsed, elapsed_cb);
        let _b = router.subscribe(Parameter::BatteryLevel, battery_cb);

        let batch = [
            event(Parameter::SessionElapsed, &[0x01]),
            event(Parameter::BatteryLevel, &[64]),
        ];
        let delivered: Vec<usize> = batch.iter().map(|e| router.dispatch(e)).collect();

        assert_eq!(delivered, vec![0, 1]);
        assert!(elapsed_seen.lock().unwrap().is_empty());
        assert_eq!(*battery_seen.lock().unwrap(), vec![WireValue::U8(64)]);
    }

    #[test]
    fn every_subscriber_receives_the_value() {
        let router = NotificationRouter::new();
        let (first, first_cb) = recorder();
        let (second, second_cb) = recorder();
        let _a = router.subscribe(Parameter::BatteryLevel, first_cb);
        let _b = router.subscribe(Parameter::BatteryLevel, second_cb);

        router.dispatch(&event(Parameter::BatteryLevel, &[50]));

        assert_eq!(first.lock().unwrap().len(), 1);
        assert_eq!(second.lock().unwrap().len(), 1);
    }

    #[test]
    fn unknown_uuid_is_ignored() {
        let router = NotificationRouter::new();
        let stray = RawNotification {
            uuid: crate::core::bluetooth::constants::family_uuid(0xfe),
            payload: vec![1],
        };
        assert_eq!(router.dispatch(&stray), 0);
    }

    #[test]
    fn clear_drops_all_subscriptions() {
        let router = NotificationRouter::new();
        let (_, cb) = recorder();
        let _sub = router.subscribe(Parameter::MotorMode, cb);
        router.clear();
        assert_eq!(router.subscriber_count(Parameter::MotorMode), 0);
    }

    #[tokio::test]
    async fn run_dispatches_until_senders_close() {
        let router = Arc::new(NotificationRouter::new());
        let (seen, cb) = recorder();
        let _sub = router.subscribe(Parameter::BatteryLevel, cb);

        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(event(Parameter::BatteryLevel, &[10])).unwrap();
        tx.send(event(Parameter::BatteryLevel, &[])).unwrap();
        tx.send(event(Parameter::BatteryLevel, &[9])).unwrap();
        drop(tx);

        router.clone().run(rx).await;
        assert_eq!(*seen.lock().unwrap(), vec![WireValue::U8(10), WireValue::U8(9)]);
    }
}
