use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::connection::DisconnectTiming;
use crate::core::bluetooth::constants::{
    DEFAULT_DEBOUNCE_DELAY_MS, DEFAULT_SCAN_TIMEOUT_SECS, MIN_RSSI_THRESHOLD,
    POST_DISCONNECT_SETTLE_MS, PRE_DISCONNECT_SETTLE_MS,
};
use crate::core::bluetooth::types::ScanFilter;

/// Which device to pick when connecting
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSelection {
    /// Take any device, for diagnostics. Overrides the name prefix.
    pub accept_all: bool,
    /// Match by advertised name instead of by service
    pub name_prefix: Option<String>,
}

impl DeviceSelection {
    pub fn filter(&self) -> ScanFilter {
        ScanFilter::from_request(self.accept_all, self.name_prefix.as_deref())
    }
}

/// Link settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LinkConfig {
    pub selection: DeviceSelection,
    /// Subscribe to status notifications on connect
    pub subscribe_notifications: bool,
    /// Pause before a dragged value is sent
    pub debounce_delay_ms: u64,
    pub pre_disconnect_settle_ms: u64,
    pub post_disconnect_settle_ms: u64,
    pub scan_timeout_secs: u64,
    /// Weaker advertisements are ignored while scanning
    pub min_rssi: i16,
}

impl Default for LinkConfig {
    fn default() -> Self {
        LinkConfig {
            selection: DeviceSelection::default(),
            subscribe_notifications: true,
            debounce_delay_ms: DEFAULT_DEBOUNCE_DELAY_MS,
            pre_disconnect_settle_ms: PRE_DISCONNECT_SETTLE_MS,
            post_disconnect_settle_ms: POST_DISCONNECT_SETTLE_MS,
            scan_timeout_secs: DEFAULT_SCAN_TIMEOUT_SECS,
            min_rssi: MIN_RSSI_THRESHOLD,
        }
    }
}

impl LinkConfig {
    pub fn disconnect_timing(&self) -> DisconnectTiming {
        DisconnectTiming {
            pre_settle: Duration::from_millis(self.pre_disconnect_settle_ms),
            post_settle: Duration::from_millis(self.post_disconnect_settle_ms),
        }
    }

    pub fn debounce_delay(&self) -> Duration {
        Duration::from_millis(self.debounce_delay_ms)
    }

    pub fn scan_timeout(&self) -> Duration {
        Duration::from_secs(self.scan_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let config: LinkConfig =
            serde_json::from_str(r#"{"debounce_delay_ms": 250, "selection": {"name_prefix": "Hapti"}}"#)
                .unwrap();
        assert_eq!(config.debounce_delay(), Duration::from_millis(250));
        assert!(config.subscribe_notifications);
        assert_eq!(config.min_rssi, MIN_RSSI_THRESHOLD);
        assert_eq!(config.selection.filter(), ScanFilter::NamePrefix("Hapti".into()));
    }

    #[test]
    fn default_selection_uses_the_service_filter() {
        let config = LinkConfig::default();
        assert_eq!(config.selection.name_prefix, None);
        assert_eq!(config.selection.filter(), ScanFilter::default());
    }

    #[test]
    fn default_timing_matches_disconnect_sequence() {
        assert_eq!(LinkConfig::default().disconnect_timing(), DisconnectTiming::default());
    }
}
