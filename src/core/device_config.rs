//! Device configuration snapshot
//! Typed view of every readable parameter, assembled from one full read pass.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::bluetooth::codec::{Rgb, WireValue};
use crate::core::bluetooth::error::FormatError;
use crate::core::bluetooth::parameters::Parameter;

/// Motor drive mode. Modes 0..=3 are fixed programs, `Custom` uses the custom frequency and duty cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum MotorMode {
    Mode0 = 0,
    Mode1 = 1,
    Mode2 = 2,
    Mode3 = 3,
    Custom = 4,
}

impl MotorMode {
    pub const ALL: [MotorMode; 5] = [
        MotorMode::Mode0,
        MotorMode::Mode1,
        MotorMode::Mode2,
        MotorMode::Mode3,
        MotorMode::Custom,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for MotorMode {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        MotorMode::ALL
            .get(value as usize)
            .copied()
            .ok_or(FormatError::InvalidValue {
                what: "motor mode",
                value: value as u32,
            })
    }
}

impl From<MotorMode> for u8 {
    fn from(mode: MotorMode) -> Self {
        mode as u8
    }
}

impl fmt::Display for MotorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MotorMode::Custom => write!(f, "custom"),
            other => write!(f, "mode {}", *other as u8),
        }
    }
}

/// Whether the LED shows a palette entry or the custom color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum LedColorMode {
    Palette = 0,
    CustomRgb = 1,
}

impl TryFrom<u8> for LedColorMode {
    type Error = FormatError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(LedColorMode::Palette),
            1 => Ok(LedColorMode::CustomRgb),
            other => Err(FormatError::InvalidValue {
                what: "LED color mode",
                value: other as u32,
            }),
        }
    }
}

impl From<LedColorMode> for u8 {
    fn from(mode: LedColorMode) -> Self {
        mode as u8
    }
}

/// Every readable parameter as last reported by the device.
///
/// A field is `None` when the firmware does not expose that characteristic.
/// Snapshots are replaced whole; see [`DeviceConfig::from_values`] and
/// [`DeviceConfig::with_value`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DeviceConfig {
    pub motor_mode: Option<MotorMode>,
    /// Hundredths of a hertz
    pub custom_frequency: Option<u16>,
    /// Percent
    pub custom_duty_cycle: Option<u8>,
    /// Intensity percent, indexed by [`MotorMode::index`]
    pub mode_intensities: [Option<u8>; 5],
    pub led_enabled: Option<bool>,
    pub led_color_mode: Option<LedColorMode>,
    pub led_palette_index: Option<u8>,
    pub led_custom_rgb: Option<Rgb>,
    /// Percent
    pub led_brightness: Option<u8>,
    /// Seconds
    pub session_duration: Option<u32>,
    /// Seconds
    pub session_elapsed: Option<u32>,
    /// Percent
    pub battery_level: Option<u8>,
}

impl DeviceConfig {
    pub fn intensity(&self, mode: MotorMode) -> Option<u8> {
        self.mode_intensities[mode.index()]
    }

    /// Custom frequency in hertz
    pub fn custom_frequency_hz(&self) -> Option<f32> {
        self.custom_frequency.map(|f| f as f32 / 100.0)
    }

    /// Wire value of one parameter in this snapshot, if the device reported it
    pub fn value(&self, parameter: Parameter) -> Option<WireValue> {
        match parameter {
            Parameter::MotorMode => self.motor_mode.map(|m| WireValue::U8(m.into())),
            Parameter::CustomFrequency => self.custom_frequency.map(WireValue::U16),
            Parameter::CustomDutyCycle => self.custom_duty_cycle.map(WireValue::U8),
            Parameter::Mode0Intensity => self.mode_intensities[0].map(WireValue::U8),
            Parameter::Mode1Intensity => self.mode_intensities[1].map(WireValue::U8),
            Parameter::Mode2Intensity => self.mode_intensities[2].map(WireValue::U8),
            Parameter::Mode3Intensity => self.mode_intensities[3].map(WireValue::U8),
            Parameter::Mode4Intensity => self.mode_intensities[4].map(WireValue::U8),
            Parameter::LedEnable => self.led_enabled.map(|on| WireValue::U8(on as u8)),
            Parameter::LedColorMode => self.led_color_mode.map(|m| WireValue::U8(m.into())),
            Parameter::LedPaletteIndex => self.led_palette_index.map(WireValue::U8),
            Parameter::LedCustomRgb => self.led_custom_rgb.map(WireValue::Rgb),
            Parameter::LedBrightness => self.led_brightness.map(WireValue::U8),
            Parameter::SessionDuration => self.session_duration.map(WireValue::U32),
            Parameter::SessionElapsed => self.session_elapsed.map(WireValue::U32),
            Parameter::BatteryLevel => self.battery_level.map(WireValue::U8),
        }
    }

    /// Parameters this snapshot has no value for
    pub fn missing(&self) -> Vec<Parameter> {
        Parameter::ALL
            .into_iter()
            .filter(|p| self.value(*p).is_none())
            .collect()
    }

    /// Builds a snapshot from the decoded values of one read pass.
    /// Parameters absent from `values` stay `None`.
    pub fn from_values(values: &HashMap<Parameter, WireValue>) -> Result<Self, FormatError> {
        let mut config = Self::default();
        for (parameter, value) in values {
            config.store(*parameter, value)?;
        }
        Ok(config)
    }

    /// A copy of this snapshot with one parameter replaced.
    pub fn with_value(&self, parameter: Parameter, value: &WireValue) -> Result<Self, FormatError> {
        let mut config = self.clone();
        config.store(parameter, value)?;
        Ok(config)
    }

    fn store(&mut self, parameter: Parameter, value: &WireValue) -> Result<(), FormatError> {
        match (parameter, *value) {
            (Parameter::MotorMode, WireValue::U8(v)) => self.motor_mode = Some(MotorMode::try_from(v)?),
            (Parameter::CustomFrequency, WireValue::U16(v)) => self.custom_frequency = Some(v),
            (Parameter::CustomDutyCycle, WireValue::U8(v)) => self.custom_duty_cycle = Some(v),
            (Parameter::Mode0Intensity, WireValue::U8(v)) => self.mode_intensities[0] = Some(v),
            (Parameter::Mode1Intensity, WireValue::U8(v)) => self.mode_intensities[1] = Some(v),
            (Parameter::Mode2Intensity, WireValue::U8(v)) => self.mode_intensities[2] = Some(v),
            (Parameter::Mode3Intensity, WireValue::U8(v)) => self.mode_intensities[3] = Some(v),
            (Parameter::Mode4Intensity, WireValue::U8(v)) => self.mode_intensities[4] = Some(v),
            (Parameter::LedEnable, WireValue::U8(v)) => self.led_enabled = Some(v != 0),
            (Parameter::LedColorMode, WireValue::U8(v)) => {
                self.led_color_mode = Some(LedColorMode::try_from(v)?)
            }
            (Parameter::LedPaletteIndex, WireValue::U8(v)) => self.led_palette_index = Some(v),
            (Parameter::LedCustomRgb, WireValue::Rgb(v)) => self.led_custom_rgb = Some(v),
            (Parameter::LedBrightness, WireValue::U8(v)) => self.led_brightness = Some(v),
            (Parameter::SessionDuration, WireValue::U32(v)) => self.session_duration = Some(v),
            (Parameter::SessionElapsed, WireValue::U32(v)) => self.session_elapsed = Some(v),
            (Parameter::BatteryLevel, WireValue::U8(v)) => self.battery_level = Some(v),
            (parameter, _) => return Err(FormatError::WrongKind(parameter.as_str())),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_values() -> HashMap<Parameter, WireValue> {
        let mut values = HashMap::new();
        values.insert(Parameter::MotorMode, WireValue::U8(4));
        values.insert(Parameter::CustomFrequency, WireValue::U16(100));
        values.insert(Parameter::CustomDutyCycle, WireValue::U8(50));
        for (i, mode) in MotorMode::ALL.into_iter().enumerate() {
            values.insert(Parameter::mode_intensity(mode), WireValue::U8(40 + i as u8));
        }
        values.insert(Parameter::LedEnable, WireValue::U8(1));
        values.insert(Parameter::LedColorMode, WireValue::U8(1));
        values.insert(Parameter::LedPaletteIndex, WireValue::U8(3));
        values.insert(Parameter::LedCustomRgb, WireValue::Rgb(Rgb::new(10, 20, 30)));
        values.insert(Parameter::LedBrightness, WireValue::U8(20));
        values.insert(Parameter::SessionDuration, WireValue::U32(3600));
        values.insert(Parameter::SessionElapsed, WireValue::U32(61));
        values.insert(Parameter::BatteryLevel, WireValue::U8(87));
        values
    }

    #[test]
    fn assembles_full_snapshot() {
        let config = DeviceConfig::from_values(&sample_values()).unwrap();
        assert_eq!(config.motor_mode, Some(MotorMode::Custom));
        assert_eq!(config.custom_frequency_hz(), Some(1.0));
        assert_eq!(config.intensity(MotorMode::Mode2), Some(42));
        assert_eq!(config.led_color_mode, Some(LedColorMode::CustomRgb));
        assert_eq!(config.led_enabled, Some(true));
        assert_eq!(config.battery_level, Some(87));
        assert!(config.missing().is_empty());
    }

    #[test]
    fn value_matches_the_source_values() {
        let values = sample_values();
        let config = DeviceConfig::from_values(&values).unwrap();
        for parameter in Parameter::ALL {
            assert_eq!(config.value(parameter).as_ref(), values.get(&parameter), "{}", parameter);
        }
    }

    #[test]
    fn rejects_unknown_motor_mode() {
        let mut values = sample_values();
        values.insert(Parameter::MotorMode, WireValue::U8(7));
        assert_eq!(
            DeviceConfig::from_values(&values),
            Err(FormatError::InvalidValue {
                what: "motor mode",
                value: 7
            })
        );
    }

    #[test]
    fn absent_parameters_stay_empty() {
        let mut values = sample_values();
        values.remove(&Parameter::LedPaletteIndex);
        values.remove(&Parameter::BatteryLevel);

        let config = DeviceConfig::from_values(&values).unwrap();

        assert_eq!(config.led_palette_index, None);
        assert_eq!(config.value(Parameter::BatteryLevel), None);
        assert_eq!(config.missing(), vec![Parameter::LedPaletteIndex, Parameter::BatteryLevel]);
        assert_eq!(config.led_brightness, Some(20));
    }

    #[test]
    fn with_value_replaces_one_field() {
        let config = DeviceConfig::from_values(&sample_values()).unwrap();

        let changed = config.with_value(Parameter::MotorMode, &WireValue::U8(1)).unwrap();

        assert_eq!(changed.motor_mode, Some(MotorMode::Mode1));
        assert_eq!(config.motor_mode, Some(MotorMode::Custom));
        assert_eq!(changed.custom_frequency, config.custom_frequency);
        assert_eq!(
            config.with_value(Parameter::SessionDuration, &WireValue::U8(1)),
            Err(FormatError::WrongKind("session_duration"))
        );
    }

    #[test]
    fn serializes_modes_as_numbers() {
        let json = serde_json::to_value(MotorMode::Mode3).unwrap();
        assert_eq!(json, serde_json::json!(3));
        assert!(serde_json::from_value::<MotorMode>(serde_json::json!(9)).is_err());
    }
}
