//! Constants used by the BLE layer
//! UUIDs of the configuration service, default delays and scan settings.

use uuid::Uuid;

/// Every UUID of the configuration service shares this base; only the last byte differs.
const UUID_FAMILY_BASE: u128 = 0x8d3b_0000_5c2e_4f6a_9b71_e04c_2a9d_6e00;

/// Builds a UUID of the configuration service family from its distinguishing byte.
pub const fn family_uuid(byte: u8) -> Uuid {
    Uuid::from_u128(UUID_FAMILY_BASE | byte as u128)
}

/// The UUID of the configuration service
pub const UUID_CONFIG_SERVICE: Uuid = family_uuid(0x00);

pub const UUID_MOTOR_MODE: Uuid = family_uuid(0x01);
pub const UUID_CUSTOM_FREQUENCY: Uuid = family_uuid(0x02);
pub const UUID_CUSTOM_DUTY_CYCLE: Uuid = family_uuid(0x03);
pub const UUID_MODE0_INTENSITY: Uuid = family_uuid(0x04);
pub const UUID_MODE1_INTENSITY: Uuid = family_uuid(0x05);
pub const UUID_MODE2_INTENSITY: Uuid = family_uuid(0x06);
pub const UUID_MODE3_INTENSITY: Uuid = family_uuid(0x07);
pub const UUID_MODE4_INTENSITY: Uuid = family_uuid(0x08);
pub const UUID_LED_ENABLE: Uuid = family_uuid(0x09);
pub const UUID_LED_COLOR_MODE: Uuid = family_uuid(0x0a);
pub const UUID_LED_PALETTE_INDEX: Uuid = family_uuid(0x0b);
pub const UUID_LED_CUSTOM_RGB: Uuid = family_uuid(0x0c);
pub const UUID_LED_BRIGHTNESS: Uuid = family_uuid(0x0d);
pub const UUID_SESSION_DURATION: Uuid = family_uuid(0x0e);
pub const UUID_SESSION_ELAPSED: Uuid = family_uuid(0x0f);
pub const UUID_BATTERY_LEVEL: Uuid = family_uuid(0x10);

/// Settle delay between the forced read and the disconnect request, in milliseconds
pub const PRE_DISCONNECT_SETTLE_MS: u64 = 100;

/// Settle delay after the disconnect request so the frame actually goes out, in milliseconds
pub const POST_DISCONNECT_SETTLE_MS: u64 = 150;

/// Default pause before a debounced write is sent, in milliseconds
pub const DEFAULT_DEBOUNCE_DELAY_MS: u64 = 500;

/// Scan duration in seconds
pub const DEFAULT_SCAN_TIMEOUT_SECS: u64 = 10;

/// Devices weaker than this are ignored during selection
pub const MIN_RSSI_THRESHOLD: i16 = -85;
