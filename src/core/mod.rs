//! Core functionality for the haptic companion
//! This module contains the BLE protocol layer and the value scheduling built on it

pub mod bluetooth;
pub mod debounce;
pub mod device_config;

// Re-export commonly used types
pub use bluetooth::BluetoothManager;
pub use device_config::{DeviceConfig, LedColorMode, MotorMode};
