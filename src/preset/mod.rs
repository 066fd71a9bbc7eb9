//! Preset model
//! Named bundles of every writable device parameter, as saved and applied by users.

pub mod store;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::core::bluetooth::codec::{Rgb, WireValue};
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::parameters::Parameter;
use crate::core::device_config::{DeviceConfig, LedColorMode, MotorMode};

pub use store::PresetStore;

/// Current bundle format
pub const BUNDLE_VERSION: u32 = 2;

/// Every writable parameter. Read-only status fields are not part of a preset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "StoredPresetConfig")]
pub struct PresetConfig {
    pub motor_mode: MotorMode,
    /// Hundredths of a hertz
    pub custom_frequency: u16,
    pub custom_duty_cycle: u8,
    pub mode0_intensity: u8,
    pub mode1_intensity: u8,
    pub mode2_intensity: u8,
    pub mode3_intensity: u8,
    pub mode4_intensity: u8,
    pub led_enable: bool,
    pub led_color_mode: LedColorMode,
    pub led_palette_index: u8,
    pub led_custom_rgb: Rgb,
    pub led_brightness: u8,
    /// Seconds
    pub session_duration: u32,
}

/// On-disk shape, accepting both the per-mode intensities and the older flat `pwmIntensity`.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredPresetConfig {
    motor_mode: MotorMode,
    custom_frequency: u16,
    custom_duty_cycle: u8,
    mode0_intensity: Option<u8>,
    mode1_intensity: Option<u8>,
    mode2_intensity: Option<u8>,
    mode3_intensity: Option<u8>,
    mode4_intensity: Option<u8>,
    pwm_intensity: Option<u8>,
    led_enable: bool,
    led_color_mode: LedColorMode,
    led_palette_index: u8,
    led_custom_rgb: Rgb,
    led_brightness: u8,
    session_duration: u32,
}

impl TryFrom<StoredPresetConfig> for PresetConfig {
    type Error = String;

    fn try_from(stored: StoredPresetConfig) -> Result<Self, Self::Error> {
        let per_mode = [
            stored.mode0_intensity,
            stored.mode1_intensity,
            stored.mode2_intensity,
            stored.mode3_intensity,
            stored.mode4_intensity,
        ];

        let intensities = match (per_mode, stored.pwm_intensity) {
            ([Some(a), Some(b), Some(c), Some(d), Some(e)], _) => [a, b, c, d, e],
            (_, Some(flat)) => migrate_flat_intensity(flat),
            _ => {
                return Err("preset needs mode0Intensity..mode4Intensity or pwmIntensity".to_string());
            }
        };

        Ok(Self {
            motor_mode: stored.motor_mode,
            custom_frequency: stored.custom_frequency,
            custom_duty_cycle: stored.custom_duty_cycle,
            mode0_intensity: intensities[0],
            mode1_intensity: intensities[1],
            mode2_intensity: intensities[2],
            mode3_intensity: intensities[3],
            mode4_intensity: intensities[4],
            led_enable: stored.led_enable,
            led_color_mode: stored.led_color_mode,
            led_palette_index: stored.led_palette_index,
            led_custom_rgb: stored.led_custom_rgb,
            led_brightness: stored.led_brightness,
            session_duration: stored.session_duration,
        })
    }
}

/// Spreads a single legacy intensity over every mode, clamped into each mode's range.
fn migrate_flat_intensity(flat: u8) -> [u8; 5] {
    let mut intensities = [0u8; 5];
    for mode in MotorMode::ALL {
        let descriptor = Parameter::mode_intensity(mode).descriptor();
        intensities[mode.index()] = descriptor.clamp(flat as u32) as u8;
    }
    intensities
}

impl PresetConfig {
    pub fn intensity(&self, mode: MotorMode) -> u8 {
        self.intensities()[mode.index()]
    }

    fn intensities(&self) -> [u8; 5] {
        [
            self.mode0_intensity,
            self.mode1_intensity,
            self.mode2_intensity,
            self.mode3_intensity,
            self.mode4_intensity,
        ]
    }

    /// One write per parameter, in the order they are sent to the device.
    pub fn writes(&self) -> Vec<(Parameter, WireValue)> {
        let mut writes = vec![
            (Parameter::MotorMode, WireValue::U8(self.motor_mode.into())),
            (Parameter::CustomFrequency, WireValue::U16(self.custom_frequency)),
            (Parameter::CustomDutyCycle, WireValue::U8(self.custom_duty_cycle)),
        ];
        for mode in MotorMode::ALL {
            writes.push((Parameter::mode_intensity(mode), WireValue::U8(self.intensity(mode))));
        }
        writes.extend([
            (Parameter::LedEnable, WireValue::U8(self.led_enable as u8)),
            (Parameter::LedColorMode, WireValue::U8(self.led_color_mode.into())),
            (Parameter::LedPaletteIndex, WireValue::U8(self.led_palette_index)),
            (Parameter::LedCustomRgb, WireValue::Rgb(self.led_custom_rgb)),
            (Parameter::LedBrightness, WireValue::U8(self.led_brightness)),
            (Parameter::SessionDuration, WireValue::U32(self.session_duration)),
        ]);
        writes
    }

    /// Checks every field against its parameter's bounds.
    pub fn validate(&self) -> Result<(), BleError> {
        self.writes()
            .iter()
            .try_for_each(|(parameter, value)| parameter.descriptor().validate(value))
    }
}

impl Default for PresetConfig {
    /// Factory settings of the wearable
    fn default() -> Self {
        Self {
            motor_mode: MotorMode::Mode0,
            custom_frequency: 100,
            custom_duty_cycle: 50,
            mode0_intensity: 50,
            mode1_intensity: 50,
            mode2_intensity: 60,
            mode3_intensity: 60,
            mode4_intensity: 60,
            led_enable: true,
            led_color_mode: LedColorMode::Palette,
            led_palette_index: 0,
            led_custom_rgb: Rgb::new(255, 255, 255),
            led_brightness: 20,
            session_duration: 1800,
        }
    }
}

/// Captures the device state. Parameters the device did not report keep
/// their factory value.
impl From<&DeviceConfig> for PresetConfig {
    fn from(config: &DeviceConfig) -> Self {
        let defaults = Self::default();
        let [m0, m1, m2, m3, m4] = config.mode_intensities;
        Self {
            motor_mode: config.motor_mode.unwrap_or(defaults.motor_mode),
            custom_frequency: config.custom_frequency.unwrap_or(defaults.custom_frequency),
            custom_duty_cycle: config.custom_duty_cycle.unwrap_or(defaults.custom_duty_cycle),
            mode0_intensity: m0.unwrap_or(defaults.mode0_intensity),
            mode1_intensity: m1.unwrap_or(defaults.mode1_intensity),
            mode2_intensity: m2.unwrap_or(defaults.mode2_intensity),
            mode3_intensity: m3.unwrap_or(defaults.mode3_intensity),
            mode4_intensity: m4.unwrap_or(defaults.mode4_intensity),
            led_enable: config.led_enabled.unwrap_or(defaults.led_enable),
            led_color_mode: config.led_color_mode.unwrap_or(defaults.led_color_mode),
            led_palette_index: config.led_palette_index.unwrap_or(defaults.led_palette_index),
            led_custom_rgb: config.led_custom_rgb.unwrap_or(defaults.led_custom_rgb),
            led_brightness: config.led_brightness.unwrap_or(defaults.led_brightness),
            session_duration: config.session_duration.unwrap_or(defaults.session_duration),
        }
    }
}

/// A saved preset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresetRecord {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub config: PresetConfig,
}

impl PresetRecord {
    pub fn new(name: impl Into<String>, config: PresetConfig) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            name: name.into(),
            created_at: Utc::now(),
            config,
        }
    }
}

/// Versioned import/export envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PresetBundle {
    pub version: u32,
    #[serde(default)]
    pub presets: Vec<PresetRecord>,
}

impl Default for PresetBundle {
    fn default() -> Self {
        Self {
            version: BUNDLE_VERSION,
            presets: Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> PresetConfig {
        PresetConfig {
            motor_mode: MotorMode::Mode1,
            custom_frequency: 50,
            custom_duty_cycle: 40,
            mode0_intensity: 50,
            mode1_intensity: 55,
            mode2_intensity: 60,
            mode3_intensity: 65,
            mode4_intensity: 70,
            led_enable: true,
            led_color_mode: LedColorMode::CustomRgb,
            led_palette_index: 2,
            led_custom_rgb: Rgb::new(0, 64, 255),
            led_brightness: 15,
            session_duration: 1800,
        }
    }

    #[test]
    fn writes_cover_every_writable_parameter_once() {
        let writes = sample().writes();
        let parameters: Vec<Parameter> = writes.iter().map(|(p, _)| *p).collect();
        let writable: Vec<Parameter> = Parameter::ALL
            .into_iter()
            .filter(|p| p.descriptor().writable)
            .collect();
        assert_eq!(parameters, writable);
        assert_eq!(writes[1], (Parameter::CustomFrequency, WireValue::U16(50)));
    }

    #[test]
    fn validate_reports_out_of_range_field() {
        assert!(sample().validate().is_ok());
        let mut config = sample();
        config.mode2_intensity = 30;
        assert!(matches!(
            config.validate(),
            Err(BleError::OutOfRange {
                parameter: Parameter::Mode2Intensity,
                ..
            })
        ));
    }

    #[test]
    fn json_uses_camel_case_keys() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["motorMode"], json!(1));
        assert_eq!(value["mode4Intensity"], json!(70));
        assert_eq!(value["ledCustomRgb"], json!({"r": 0, "g": 64, "b": 255}));
        assert!(value.get("pwmIntensity").is_none());
        assert!(value.get("batteryLevel").is_none());
    }

    #[test]
    fn legacy_flat_intensity_is_clamped_per_mode() {
        let legacy = json!({
            "motorMode": 2,
            "customFrequency": 100,
            "customDutyCycle": 50,
            "pwmIntensity": 85,
            "ledEnable": false,
            "ledColorMode": 0,
            "ledPaletteIndex": 4,
            "ledCustomRgb": {"r": 1, "g": 2, "b": 3},
            "ledBrightness": 20,
            "sessionDuration": 3600
        });
        let config: PresetConfig = serde_json::from_value(legacy).unwrap();
        assert_eq!(
            [
                config.mode0_intensity,
                config.mode1_intensity,
                config.mode2_intensity,
                config.mode3_intensity,
                config.mode4_intensity
            ],
            [70, 70, 80, 80, 85]
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn missing_intensities_are_rejected() {
        let mut value = serde_json::to_value(sample()).unwrap();
        value.as_object_mut().unwrap().remove("mode3Intensity");
        assert!(serde_json::from_value::<PresetConfig>(value).is_err());
    }

    #[test]
    fn captures_device_state() {
        let device = DeviceConfig {
            motor_mode: Some(MotorMode::Custom),
            custom_frequency: Some(100),
            custom_duty_cycle: Some(50),
            mode_intensities: [Some(50), Some(50), Some(60), Some(60), Some(70)],
            led_enabled: Some(true),
            led_color_mode: Some(LedColorMode::Palette),
            led_palette_index: Some(3),
            led_custom_rgb: Some(Rgb::new(255, 128, 0)),
            led_brightness: Some(20),
            session_duration: Some(3600),
            session_elapsed: Some(120),
            battery_level: Some(87),
        };
        let preset = PresetConfig::from(&device);
        assert_eq!(preset.intensity(MotorMode::Custom), 70);
        assert_eq!(preset.led_palette_index, 3);
        for (parameter, value) in preset.writes() {
            assert_eq!(device.value(parameter), Some(value));
        }
    }

    #[test]
    fn unreported_parameters_fall_back_to_factory_settings() {
        let device = DeviceConfig {
            motor_mode: Some(MotorMode::Mode3),
            led_brightness: Some(12),
            ..DeviceConfig::default()
        };

        let preset = PresetConfig::from(&device);

        assert_eq!(preset.motor_mode, MotorMode::Mode3);
        assert_eq!(preset.led_brightness, 12);
        assert_eq!(preset.led_palette_index, PresetConfig::default().led_palette_index);
        assert_eq!(preset.session_duration, 1800);
        assert!(preset.validate().is_ok());
        assert!(PresetConfig::default().validate().is_ok());
    }
}
