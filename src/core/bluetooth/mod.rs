//! Bluetooth functionality for the haptic device
//! This module handles all bluetooth operations including device selection,
//! the connection lifecycle, parameter access and notifications.

pub mod api;
pub mod bluest_backend;
pub mod codec;
pub mod config_cache;
pub mod connection;
pub mod constants;
pub mod error;
pub mod manager;
pub mod notification;
pub mod parameters;
pub mod registry;
pub mod scanner;
pub mod subscribers;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod fake;

// Re-export types that should be publicly accessible
pub use api::ParameterApi;
pub use codec::{Rgb, WireKind, WireValue};
pub use connection::{ConnectionManager, ConnectionState, DisconnectTiming};
pub use error::{BleError, FormatError};
pub use manager::BluetoothManager;
pub use parameters::Parameter;
pub use subscribers::{Callback, Subscription};
pub use types::{BluetoothDevice, ScanFilter};
