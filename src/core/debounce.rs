//! Pause-to-send scheduling for slider-like controls.
//!
//! While the user is dragging, each new value restarts a timer; the value is
//! only written once the control has been still for the configured delay.
//! Releasing the control cancels the timer without sending: the caller sends
//! the committed value itself, either directly or through [`DebouncedWriter::commit`].

use std::fmt::Debug;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::core::bluetooth::api::ParameterApi;
use crate::core::bluetooth::codec::WireValue;
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::parameters::Parameter;

/// Destination of debounced values
#[async_trait]
pub trait ValueWriter<T>: Send + Sync {
    async fn write_value(&self, value: T) -> Result<(), BleError>;
}

/// Writes values of one parameter through the parameter API
#[derive(Clone)]
pub struct ParameterWriter {
    api: ParameterApi,
    parameter: Parameter,
}

impl ParameterWriter {
    pub fn new(api: ParameterApi, parameter: Parameter) -> Self {
        Self { api, parameter }
    }

    pub fn parameter(&self) -> Parameter {
        self.parameter
    }
}

#[async_trait]
impl ValueWriter<WireValue> for ParameterWriter {
    async fn write_value(&self, value: WireValue) -> Result<(), BleError> {
        self.api.write(self.parameter, value).await
    }
}

struct DebounceState<T> {
    last_sent: Option<T>,
    interacting: bool,
    pending: Option<JoinHandle<()>>,
    /// Bumped on every cancel so a timer that already woke up can tell it is stale
    generation: u64,
}

impl<T> DebounceState<T> {
    fn cancel_pending(&mut self) -> bool {
        self.generation = self.generation.wrapping_add(1);
        match self.pending.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }
}

/// Debounces one stream of values into writes on `W`.
///
/// Timers are spawned on the current tokio runtime, so value callbacks must be
/// made from within it.
pub struct DebouncedWriter<T, W> {
    writer: Arc<W>,
    delay: Duration,
    state: Arc<Mutex<DebounceState<T>>>,
}

impl<T, W> DebouncedWriter<T, W>
where
    T: Clone + PartialEq + Debug + Send + 'static,
    W: ValueWriter<T> + 'static,
{
    pub fn new(writer: W, delay: Duration) -> Self {
        Self {
            writer: Arc::new(writer),
            delay,
            state: Arc::new(Mutex::new(DebounceState {
                last_sent: None,
                interacting: false,
                pending: None,
                generation: 0,
            })),
        }
    }

    /// Seeds the last sent value, typically from the cached device configuration.
    pub fn with_last_sent(self, value: T) -> Self {
        self.lock().last_sent = Some(value);
        self
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    pub fn on_interaction_start(&self) {
        self.lock().interacting = true;
    }

    /// Feeds a candidate value. Ignored unless an interaction is in progress.
    pub fn on_value(&self, value: T) {
        let mut state = self.lock();
        if !state.interacting {
            debug!("Ignoring {:?} outside of an interaction", value);
            return;
        }

        state.cancel_pending();
        if state.last_sent.as_ref() == Some(&value) {
            return;
        }

        let generation = state.generation;
        let shared = self.state.clone();
        let writer = self.writer.clone();
        let delay = self.delay;

        state.pending = Some(tokio::spawn(async move {
            sleep(delay).await;
            {
                let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                if state.generation != generation {
                    return;
                }
                // From here on the write is in flight and can no longer be cancelled.
                state.pending = None;
            }

            debug!("Sending debounced value {:?}", value);
            match writer.write_value(value.clone()).await {
                Ok(()) => {
                    let mut state = shared.lock().unwrap_or_else(PoisonError::into_inner);
                    // A newer value or a commit has taken over while this write was in flight.
                    if state.generation == generation {
                        state.last_sent = Some(value);
                    }
                }
                Err(e) => error!("Debounced write of {:?} failed: {}", value, e),
            }
        }));
    }

    /// Ends the interaction and drops any pending write without sending it.
    pub fn on_interaction_end(&self) {
        let mut state = self.lock();
        state.interacting = false;
        if state.cancel_pending() {
            debug!("Pending debounced write cancelled");
        }
    }

    /// Ends the interaction and immediately writes the committed value.
    pub async fn commit(&self, value: T) -> Result<(), BleError> {
        self.on_interaction_end();
        info!("Committing {:?}", value);
        self.writer.write_value(value.clone()).await?;
        self.lock().last_sent = Some(value);
        Ok(())
    }

    pub fn is_interacting(&self) -> bool {
        self.lock().interacting
    }

    pub fn has_pending(&self) -> bool {
        self.lock().pending.is_some()
    }

    pub fn last_sent(&self) -> Option<T> {
        self.lock().last_sent.clone()
    }

    fn lock(&self) -> MutexGuard<'_, DebounceState<T>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T, W> Drop for DebouncedWriter<T, W> {
    fn drop(&mut self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.cancel_pending();
    }
}
