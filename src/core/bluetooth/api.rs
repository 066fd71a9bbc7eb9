//! Typed read/write access to each device parameter
//! Resolves the characteristic, encodes/decodes the value and performs the platform call.
//! Writes never touch the config cache.

use std::sync::Arc;

use log::{debug, info, warn};

use crate::core::bluetooth::codec::{self, Rgb, WireValue};
use crate::core::bluetooth::error::BleError;
use crate::core::bluetooth::parameters::Parameter;
use crate::core::bluetooth::registry::CharacteristicRegistry;
use crate::core::device_config::{LedColorMode, MotorMode};
use crate::preset::PresetConfig;

#[derive(Clone)]
pub struct ParameterApi {
    registry: Arc<CharacteristicRegistry>,
}

impl ParameterApi {
    pub fn new(registry: Arc<CharacteristicRegistry>) -> Self {
        Self { registry }
    }

    /// Reads and decodes one parameter.
    pub async fn read(&self, parameter: Parameter) -> Result<WireValue, BleError> {
        let handle = self.registry.resolve(parameter)?;
        let bytes = handle.read().await?;
        let value = codec::decode(parameter.descriptor().kind, &bytes)?;
        debug!("Read {} = {}", parameter, value);
        Ok(value)
    }

    /// Validates, encodes and writes one parameter.
    pub async fn write(&self, parameter: Parameter, value: WireValue) -> Result<(), BleError> {
        let descriptor = parameter.descriptor();
        if !descriptor.writable {
            return Err(BleError::ReadOnly(parameter));
        }
        descriptor.validate(&value)?;

        let handle = self.registry.resolve(parameter)?;
        debug!("Writing {} = {}", parameter, value);
        handle.write(&codec::encode(value)).await
    }

    async fn read_u8(&self, parameter: Parameter) -> Result<u8, BleError> {
        match self.read(parameter).await? {
            WireValue::U8(v) => Ok(v),
            other => Err(unexpected(parameter, other)),
        }
    }

    async fn read_u32(&self, parameter: Parameter) -> Result<u32, BleError> {
        match self.read(parameter).await? {
            WireValue::U32(v) => Ok(v),
            other => Err(unexpected(parameter, other)),
        }
    }

    pub async fn get_motor_mode(&self) -> Result<MotorMode, BleError> {
        Ok(MotorMode::try_from(self.read_u8(Parameter::MotorMode).await?)?)
    }

    pub async fn set_motor_mode(&self, mode: MotorMode) -> Result<(), BleError> {
        self.write(Parameter::MotorMode, WireValue::U8(mode.into())).await
    }

    /// Custom frequency in hundredths of a hertz
    pub async fn get_custom_frequency(&self) -> Result<u16, BleError> {
        match self.read(Parameter::CustomFrequency).await? {
            WireValue::U16(v) => Ok(v),
            other => Err(unexpected(Parameter::CustomFrequency, other)),
        }
    }

    pub async fn set_custom_frequency(&self, centihertz: u16) -> Result<(), BleError> {
        self.write(Parameter::CustomFrequency, WireValue::U16(centihertz)).await
    }

    pub async fn get_custom_duty_cycle(&self) -> Result<u8, BleError> {
        self.read_u8(Parameter::CustomDutyCycle).await
    }

    pub async fn set_custom_duty_cycle(&self, percent: u8) -> Result<(), BleError> {
        self.write(Parameter::CustomDutyCycle, WireValue::U8(percent)).await
    }

    pub async fn get_mode_intensity(&self, mode: MotorMode) -> Result<u8, BleError> {
        self.read_u8(Parameter::mode_intensity(mode)).await
    }

    pub async fn set_mode_intensity(&self, mode: MotorMode, percent: u8) -> Result<(), BleError> {
        self.write(Parameter::mode_intensity(mode), WireValue::U8(percent)).await
    }

    pub async fn get_led_enabled(&self) -> Result<bool, BleError> {
        Ok(self.read_u8(Parameter::LedEnable).await? != 0)
    }

    pub async fn set_led_enabled(&self, enabled: bool) -> Result<(), BleError> {
        self.write(Parameter::LedEnable, WireValue::U8(enabled as u8)).await
    }

    pub async fn get_led_color_mode(&self) -> Result<LedColorMode, BleError> {
        Ok(LedColorMode::try_from(self.read_u8(Parameter::LedColorMode).await?)?)
    }

    pub async fn set_led_color_mode(&self, mode: LedColorMode) -> Result<(), BleError> {
        self.write(Parameter::LedColorMode, WireValue::U8(mode.into())).await
    }

    pub async fn get_led_palette_index(&self) -> Result<u8, BleError> {
        self.read_u8(Parameter::LedPaletteIndex).await
    }

    pub async fn set_led_palette_index(&self, index: u8) -> Result<(), BleError> {
        self.write(Parameter::LedPaletteIndex, WireValue::U8(index)).await
    }

    pub async fn get_led_custom_rgb(&self) -> Result<Rgb, BleError> {
        match self.read(Parameter::LedCustomRgb).await? {
            WireValue::Rgb(rgb) => Ok(rgb),
            other => Err(unexpected(Parameter::LedCustomRgb, other)),
        }
    }

    pub async fn set_led_custom_rgb(&self, rgb: Rgb) -> Result<(), BleError> {
        self.write(Parameter::LedCustomRgb, WireValue::Rgb(rgb)).await
    }

    pub async fn get_led_brightness(&self) -> Result<u8, BleError> {
        self.read_u8(Parameter::LedBrightness).await
    }

    pub async fn set_led_brightness(&self, percent: u8) -> Result<(), BleError> {
        self.write(Parameter::LedBrightness, WireValue::U8(percent)).await
    }

    /// Session duration in seconds
    pub async fn get_session_duration(&self) -> Result<u32, BleError> {
        self.read_u32(Parameter::SessionDuration).await
    }

    pub async fn set_session_duration(&self, seconds: u32) -> Result<(), BleError> {
        self.write(Parameter::SessionDuration, WireValue::U32(seconds)).await
    }

    /// Elapsed session time in seconds
    pub async fn get_session_elapsed(&self) -> Result<u32, BleError> {
        self.read_u32(Parameter::SessionElapsed).await
    }

    pub async fn get_battery_level(&self) -> Result<u8, BleError> {
        self.read_u8(Parameter::BatteryLevel).await
    }

    /// Writes every parameter of `config`, one after another. Parameters the
    /// firmware does not expose are skipped.
    /// Stops at the first failure; earlier writes stay applied.
    pub async fn apply_config(&self, config: &PresetConfig) -> Result<(), BleError> {
        let writes = config.writes();
        info!("Applying configuration ({} writes)...", writes.len());
        for (parameter, value) in writes {
            if !self.registry.contains(parameter) {
                warn!("{} not available on this device, skipping", parameter);
                continue;
            }
            self.write(parameter, value).await?;
        }
        info!("Configuration applied");
        Ok(())
    }
}

fn unexpected(parameter: Parameter, value: WireValue) -> BleError {
    BleError::KindMismatch {
        parameter,
        expected: parameter.descriptor().kind,
        actual: value.kind(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::UUID_CONFIG_SERVICE;
    use crate::core::bluetooth::fake::FakeDevice;
    use crate::core::bluetooth::transport::Peripheral;

    async fn api_for(device: &Arc<FakeDevice>) -> ParameterApi {
        let peripheral = device.peripheral();
        peripheral.connect().await.unwrap();
        let registry = Arc::new(CharacteristicRegistry::new());
        registry.discover(&*peripheral, UUID_CONFIG_SERVICE).await.unwrap();
        device.clear_log();
        ParameterApi::new(registry)
    }

    #[tokio::test]
    async fn typed_reads_decode_device_values() {
        let device = FakeDevice::new();
        let api = api_for(&device).await;

        assert_eq!(api.get_motor_mode().await.unwrap(), MotorMode::Custom);
        assert_eq!(api.get_custom_frequency().await.unwrap(), 100);
        assert_eq!(api.get_mode_intensity(MotorMode::Custom).await.unwrap(), 70);
        assert_eq!(api.get_led_custom_rgb().await.unwrap(), Rgb::new(255, 128, 0));
        assert_eq!(api.get_led_color_mode().await.unwrap(), LedColorMode::Palette);
        assert_eq!(api.get_battery_level().await.unwrap(), 87);
    }

    #[tokio::test]
    async fn writes_are_encoded_little_endian() {
        let device = FakeDevice::new();
        let api = api_for(&device).await;

        api.set_session_duration(5400).await.unwrap();
        api.set_custom_frequency(25).await.unwrap();
        api.set_led_custom_rgb(Rgb::new(1, 2, 3)).await.unwrap();

        assert_eq!(device.raw(Parameter::SessionDuration), Some(vec![0x18, 0x15, 0, 0]));
        assert_eq!(device.raw(Parameter::CustomFrequency), Some(vec![25, 0]));
        assert_eq!(device.raw(Parameter::LedCustomRgb), Some(vec![1, 2, 3]));
        assert_eq!(api.get_session_duration().await.unwrap(), 5400);
    }

    #[tokio::test]
    async fn rejects_invalid_writes_before_transport() {
        let device = FakeDevice::new();
        let api = api_for(&device).await;

        assert!(matches!(
            api.set_led_brightness(31).await,
            Err(BleError::OutOfRange { .. })
        ));
        assert!(matches!(
            api.write(Parameter::BatteryLevel, WireValue::U8(50)).await,
            Err(BleError::ReadOnly(Parameter::BatteryLevel))
        ));
        assert!(matches!(
            api.write(Parameter::SessionDuration, WireValue::U8(50)).await,
            Err(BleError::KindMismatch { .. })
        ));
        assert!(device.log().is_empty());
    }

    #[tokio::test]
    async fn missing_characteristic_is_not_found() {
        let device = FakeDevice::new();
        device.remove_characteristic(Parameter::LedPaletteIndex.descriptor().uuid);
        let api = api_for(&device).await;

        assert!(matches!(
            api.get_led_palette_index().await,
            Err(BleError::NotFound(Parameter::LedPaletteIndex))
        ));
        assert!(api.get_led_brightness().await.is_ok());
    }

    #[tokio::test]
    async fn apply_config_skips_missing_characteristics() {
        let device = FakeDevice::new();
        device.remove_characteristic(Parameter::LedPaletteIndex.descriptor().uuid);
        let api = api_for(&device).await;

        api.apply_config(&PresetConfig::default()).await.unwrap();

        let log = device.log();
        assert_eq!(log.len(), PresetConfig::default().writes().len() - 1);
        assert!(!log.contains(&"write led_palette_index".to_string()));
        assert_eq!(device.raw(Parameter::SessionDuration), Some(1800u32.to_le_bytes().to_vec()));
    }

    #[tokio::test]
    async fn transport_failures_reach_the_caller() {
        let device = FakeDevice::new();
        device.fail_writes(Parameter::MotorMode);
        let api = api_for(&device).await;

        assert!(matches!(
            api.set_motor_mode(MotorMode::Mode1).await,
            Err(BleError::Transport(_))
        ));
    }
}
