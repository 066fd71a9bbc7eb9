//! Logical parameters of the configuration service and their static descriptors.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::codec::{WireKind, WireValue};
use crate::core::bluetooth::constants::*;
use crate::core::bluetooth::error::BleError;
use crate::core::device_config::MotorMode;

/// One addressable characteristic of the configuration service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parameter {
    MotorMode,
    CustomFrequency,
    CustomDutyCycle,
    Mode0Intensity,
    Mode1Intensity,
    Mode2Intensity,
    Mode3Intensity,
    Mode4Intensity,
    LedEnable,
    LedColorMode,
    LedPaletteIndex,
    LedCustomRgb,
    LedBrightness,
    SessionDuration,
    SessionElapsed,
    BatteryLevel,
}

impl Parameter {
    /// All parameters in read order. Matches the order of [`DESCRIPTORS`].
    pub const ALL: [Parameter; 16] = [
        Parameter::MotorMode,
        Parameter::CustomFrequency,
        Parameter::CustomDutyCycle,
        Parameter::Mode0Intensity,
        Parameter::Mode1Intensity,
        Parameter::Mode2Intensity,
        Parameter::Mode3Intensity,
        Parameter::Mode4Intensity,
        Parameter::LedEnable,
        Parameter::LedColorMode,
        Parameter::LedPaletteIndex,
        Parameter::LedCustomRgb,
        Parameter::LedBrightness,
        Parameter::SessionDuration,
        Parameter::SessionElapsed,
        Parameter::BatteryLevel,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Parameter::MotorMode => "motor_mode",
            Parameter::CustomFrequency => "custom_frequency",
            Parameter::CustomDutyCycle => "custom_duty_cycle",
            Parameter::Mode0Intensity => "mode0_intensity",
            Parameter::Mode1Intensity => "mode1_intensity",
            Parameter::Mode2Intensity => "mode2_intensity",
            Parameter::Mode3Intensity => "mode3_intensity",
            Parameter::Mode4Intensity => "mode4_intensity",
            Parameter::LedEnable => "led_enable",
            Parameter::LedColorMode => "led_color_mode",
            Parameter::LedPaletteIndex => "led_palette_index",
            Parameter::LedCustomRgb => "led_custom_rgb",
            Parameter::LedBrightness => "led_brightness",
            Parameter::SessionDuration => "session_duration",
            Parameter::SessionElapsed => "session_elapsed",
            Parameter::BatteryLevel => "battery_level",
        }
    }

    pub fn descriptor(&self) -> &'static ParameterDescriptor {
        &DESCRIPTORS[*self as usize]
    }

    /// The intensity parameter belonging to a motor mode
    pub fn mode_intensity(mode: MotorMode) -> Parameter {
        match mode {
            MotorMode::Mode0 => Parameter::Mode0Intensity,
            MotorMode::Mode1 => Parameter::Mode1Intensity,
            MotorMode::Mode2 => Parameter::Mode2Intensity,
            MotorMode::Mode3 => Parameter::Mode3Intensity,
            MotorMode::Custom => Parameter::Mode4Intensity,
        }
    }

    pub fn from_uuid(uuid: Uuid) -> Option<Parameter> {
        DESCRIPTORS
            .iter()
            .find(|d| d.uuid == uuid)
            .map(|d| d.parameter)
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Parameter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().replace('-', "_").to_ascii_lowercase();
        Parameter::ALL
            .into_iter()
            .find(|p| p.as_str() == wanted)
            .ok_or_else(|| format!("unknown parameter {:?}", s))
    }
}

/// Static metadata of one parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParameterDescriptor {
    pub parameter: Parameter,
    pub uuid: Uuid,
    pub kind: WireKind,
    /// Inclusive bounds for integer kinds; `None` when every encodable value is valid
    pub range: Option<(u32, u32)>,
    /// Device pushes changes of this parameter
    pub notify: bool,
    pub writable: bool,
}

impl ParameterDescriptor {
    const fn new(
        parameter: Parameter,
        uuid: Uuid,
        kind: WireKind,
        range: Option<(u32, u32)>,
        notify: bool,
        writable: bool,
    ) -> Self {
        Self {
            parameter,
            uuid,
            kind,
            range,
            notify,
            writable,
        }
    }

    /// Checks that `value` has this parameter's kind and lies within its bounds.
    pub fn validate(&self, value: &WireValue) -> Result<(), BleError> {
        if value.kind() != self.kind {
            return Err(BleError::KindMismatch {
                parameter: self.parameter,
                expected: self.kind,
                actual: value.kind(),
            });
        }
        if let (Some((min, max)), Some(v)) = (self.range, value.as_u32()) {
            if v < min || v > max {
                return Err(BleError::OutOfRange {
                    parameter: self.parameter,
                    value: v,
                    min,
                    max,
                });
            }
        }
        Ok(())
    }

    /// Clamps an integer into this parameter's bounds.
    pub fn clamp(&self, value: u32) -> u32 {
        match self.range {
            Some((min, max)) => value.clamp(min, max),
            None => value,
        }
    }
}

use Parameter as P;
use WireKind::*;

/// Descriptor table, indexed by `Parameter as usize`.
pub static DESCRIPTORS: [ParameterDescriptor; 16] = [
    ParameterDescriptor::new(P::MotorMode, UUID_MOTOR_MODE, U8, Some((0, 4)), true, true),
    ParameterDescriptor::new(P::CustomFrequency, UUID_CUSTOM_FREQUENCY, U16Le, Some((25, 200)), false, true),
    ParameterDescriptor::new(P::CustomDutyCycle, UUID_CUSTOM_DUTY_CYCLE, U8, Some((10, 100)), false, true),
    ParameterDescriptor::new(P::Mode0Intensity, UUID_MODE0_INTENSITY, U8, Some((30, 70)), false, true),
    ParameterDescriptor::new(P::Mode1Intensity, UUID_MODE1_INTENSITY, U8, Some((30, 70)), false, true),
    ParameterDescriptor::new(P::Mode2Intensity, UUID_MODE2_INTENSITY, U8, Some((40, 80)), false, true),
    ParameterDescriptor::new(P::Mode3Intensity, UUID_MODE3_INTENSITY, U8, Some((40, 80)), false, true),
    ParameterDescriptor::new(P::Mode4Intensity, UUID_MODE4_INTENSITY, U8, Some((30, 90)), false, true),
    ParameterDescriptor::new(P::LedEnable, UUID_LED_ENABLE, U8, Some((0, 1)), false, true),
    ParameterDescriptor::new(P::LedColorMode, UUID_LED_COLOR_MODE, U8, Some((0, 1)), false, true),
    ParameterDescriptor::new(P::LedPaletteIndex, UUID_LED_PALETTE_INDEX, U8, Some((0, 15)), false, true),
    ParameterDescriptor::new(P::LedCustomRgb, UUID_LED_CUSTOM_RGB, Rgb24, None, false, true),
    ParameterDescriptor::new(P::LedBrightness, UUID_LED_BRIGHTNESS, U8, Some((10, 30)), false, true),
    ParameterDescriptor::new(P::SessionDuration, UUID_SESSION_DURATION, U32Le, Some((1200, 5400)), false, true),
    ParameterDescriptor::new(P::SessionElapsed, UUID_SESSION_ELAPSED, U32Le, None, true, false),
    ParameterDescriptor::new(P::BatteryLevel, UUID_BATTERY_LEVEL, U8, Some((0, 100)), true, false),
];

/// Parameters the device pushes notifications for
pub fn notify_capable() -> impl Iterator<Item = &'static ParameterDescriptor> {
    DESCRIPTORS.iter().filter(|d| d.notify)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_indexed_by_parameter() {
        for (i, parameter) in Parameter::ALL.iter().enumerate() {
            assert_eq!(DESCRIPTORS[i].parameter, *parameter);
            assert_eq!(parameter.descriptor().parameter, *parameter);
        }
    }

    #[test]
    fn uuids_differ_only_in_last_byte() {
        let service = UUID_CONFIG_SERVICE.as_u128();
        for d in DESCRIPTORS.iter() {
            assert_eq!(d.uuid.as_u128() & !0xff, service);
            assert_eq!(Parameter::from_uuid(d.uuid), Some(d.parameter));
        }
    }

    #[test]
    fn notify_set_is_status_and_mode() {
        let notify: Vec<Parameter> = notify_capable().map(|d| d.parameter).collect();
        assert_eq!(
            notify,
            vec![Parameter::MotorMode, Parameter::SessionElapsed, Parameter::BatteryLevel]
        );
    }

    #[test]
    fn validates_kind_and_bounds() {
        let brightness = Parameter::LedBrightness.descriptor();
        assert!(brightness.validate(&WireValue::U8(22)).is_ok());
        assert!(matches!(
            brightness.validate(&WireValue::U8(31)),
            Err(BleError::OutOfRange { value: 31, min: 10, max: 30, .. })
        ));
        assert!(matches!(
            brightness.validate(&WireValue::U16(22)),
            Err(BleError::KindMismatch { .. })
        ));
        assert_eq!(Parameter::Mode2Intensity.descriptor().clamp(95), 80);
    }

    #[test]
    fn parses_names() {
        assert_eq!("led-brightness".parse::<Parameter>(), Ok(Parameter::LedBrightness));
        assert_eq!("MODE4_INTENSITY".parse::<Parameter>(), Ok(Parameter::Mode4Intensity));
        assert!("volume".parse::<Parameter>().is_err());
    }
}
