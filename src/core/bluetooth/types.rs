//! Defines shared data structures for the Bluetooth module.

use std::sync::LazyLock;

use regex::Regex;
use uuid::Uuid;

use crate::core::bluetooth::constants::UUID_CONFIG_SERVICE;

static MAC_ADDRESS: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").ok());

/// Identity of the connected device
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct BluetoothDevice {
    /// Platform-specific unique identifier for the device (especially important on macOS)
    pub id: String,
    /// The name of the device, if available
    pub name: Option<String>,
    /// The MAC address embedded in the platform id, or "N/A" where the platform hides it
    pub address: String,
}

impl BluetoothDevice {
    pub fn new(id: String, name: Option<String>) -> Self {
        let address = extract_mac_address(&id).unwrap_or_else(|| "N/A".to_string());
        Self { id, name, address }
    }
}

fn extract_mac_address(device_id: &str) -> Option<String> {
    MAC_ADDRESS
        .as_ref()?
        .find_iter(device_id)
        .last()
        .map(|m| m.as_str().to_uppercase())
}

/// How a device is picked during connect. Exactly one discriminator applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    /// Devices advertising the given service
    Service(Uuid),
    /// Devices whose advertised name starts with the prefix
    NamePrefix(String),
    /// Any device, for diagnostics
    AcceptAll,
}

impl Default for ScanFilter {
    fn default() -> Self {
        ScanFilter::Service(UUID_CONFIG_SERVICE)
    }
}

impl ScanFilter {
    /// Accept-all wins over a name prefix, which wins over the service filter.
    pub fn from_request(accept_all: bool, name_prefix: Option<&str>) -> Self {
        if accept_all {
            return ScanFilter::AcceptAll;
        }
        match name_prefix.map(str::trim) {
            Some(prefix) if !prefix.is_empty() => ScanFilter::NamePrefix(prefix.to_string()),
            _ => ScanFilter::default(),
        }
    }

    pub fn matches(&self, name: Option<&str>, services: &[Uuid]) -> bool {
        match self {
            ScanFilter::Service(uuid) => services.contains(uuid),
            ScanFilter::NamePrefix(prefix) => name.is_some_and(|n| n.starts_with(prefix.as_str())),
            ScanFilter::AcceptAll => true,
        }
    }

    /// Service UUIDs to hand to the platform scanner
    pub fn service_uuids(&self) -> Vec<Uuid> {
        match self {
            ScanFilter::Service(uuid) => vec![*uuid],
            _ => Vec::new(),
        }
    }
}
