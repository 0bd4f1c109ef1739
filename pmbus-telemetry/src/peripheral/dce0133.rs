//! Murata DCE0133V2 DC-DC Converter Telemetry Driver
//!
//! The DCE0133V2 is a non-isolated step-down module with a PMBus interface.
//! This driver reads its telemetry: input voltage, output voltage,
//! temperature, output current and output power. Everything except output
//! voltage is reported in LINEAR11; output voltage is LINEAR16 scaled by the
//! exponent in VOUT_MODE.
//!
//! The module does not implement READ_IIN or READ_PIN, so input current and
//! input power are not available as channels.

use std::fmt;

use crate::hw_trait::{I2c, Result};
use crate::tracing::prelude::*;

use super::pmbus::{self, Linear11, Linear16, PmbusCommand, VoutMode, VoutModeFormat};

/// Protocol constants for the DCE0133V2
pub mod protocol {
    /// Default 7-bit I2C address
    pub const DEFAULT_ADDRESS: u8 = 0x7F;

    /// Length of a LINEAR11/LINEAR16 reading in bytes
    pub const WORD_LENGTH: usize = 2;

    /// Length of the VOUT_MODE register in bytes
    pub const VOUT_MODE_LENGTH: usize = 1;
}

use protocol::{DEFAULT_ADDRESS, VOUT_MODE_LENGTH, WORD_LENGTH};

/// Environment variable overriding the device address
const ADDRESS_ENV: &str = "PMBUS_TELEMETRY_ADDRESS";

/// How a channel's reading is encoded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Self-describing LINEAR11 word
    Linear11,
    /// LINEAR16 mantissa; exponent read from VOUT_MODE
    Linear16,
}

/// Telemetry channels supported by the DCE0133V2
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    InputVoltage,
    OutputVoltage,
    Temperature,
    OutputCurrent,
    OutputPower,
}

impl Channel {
    /// All channels, in the order [`Dce0133::read_all`] reads them
    pub const ALL: [Channel; 5] = [
        Channel::InputVoltage,
        Channel::OutputVoltage,
        Channel::Temperature,
        Channel::OutputCurrent,
        Channel::OutputPower,
    ];

    /// PMBus command that reads this channel
    pub fn command(self) -> PmbusCommand {
        match self {
            Channel::InputVoltage => PmbusCommand::ReadVin,
            Channel::OutputVoltage => PmbusCommand::ReadVout,
            Channel::Temperature => PmbusCommand::ReadTemperature1,
            Channel::OutputCurrent => PmbusCommand::ReadIout,
            Channel::OutputPower => PmbusCommand::ReadPout,
        }
    }

    pub fn encoding(self) -> Encoding {
        match self {
            Channel::OutputVoltage => Encoding::Linear16,
            _ => Encoding::Linear11,
        }
    }

    /// Unit symbol of the decoded value
    pub fn unit(self) -> &'static str {
        match self {
            Channel::InputVoltage | Channel::OutputVoltage => "V",
            Channel::Temperature => "°C",
            Channel::OutputCurrent => "A",
            Channel::OutputPower => "W",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Channel::InputVoltage => "input voltage",
            Channel::OutputVoltage => "output voltage",
            Channel::Temperature => "temperature",
            Channel::OutputCurrent => "output current",
            Channel::OutputPower => "output power",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// DCE0133V2 driver configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dce0133Config {
    /// 7-bit I2C address of the module
    pub address: u8,
}

impl Default for Dce0133Config {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS,
        }
    }
}

impl Dce0133Config {
    /// Build configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PMBUS_TELEMETRY_ADDRESS`: 7-bit device address, decimal or
    ///   `0x`-prefixed hex (default: 0x7F)
    ///
    /// Unparsable or out-of-range values are logged and replaced by the
    /// default.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(raw) = std::env::var(ADDRESS_ENV) {
            match parse_address(&raw) {
                Some(address) => config.address = address,
                None => warn!(
                    "Ignoring {}={:?}: not a 7-bit I2C address, using 0x{:02x}",
                    ADDRESS_ENV, raw, DEFAULT_ADDRESS
                ),
            }
        }

        config
    }
}

fn parse_address(raw: &str) -> Option<u8> {
    let raw = raw.trim();
    let address = match raw.strip_prefix("0x").or_else(|| raw.strip_prefix("0X")) {
        Some(hex) => u8::from_str_radix(hex, 16).ok()?,
        None => raw.parse().ok()?,
    };
    (address <= 0x7F).then_some(address)
}

/// One reading of every channel
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Telemetry {
    /// Input voltage (V)
    pub input_voltage: f32,
    /// Output voltage (V)
    pub output_voltage: f32,
    /// Module temperature (°C)
    pub temperature: f32,
    /// Output current (A)
    pub output_current: f32,
    /// Output power (W)
    pub output_power: f32,
}

impl Telemetry {
    pub fn get(&self, channel: Channel) -> f32 {
        match channel {
            Channel::InputVoltage => self.input_voltage,
            Channel::OutputVoltage => self.output_voltage,
            Channel::Temperature => self.temperature,
            Channel::OutputCurrent => self.output_current,
            Channel::OutputPower => self.output_power,
        }
    }
}

impl fmt::Display for Telemetry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:.3}V in, {:.3}V out, {:.1}°C, {:.3}A, {:.3}W",
            self.input_voltage,
            self.output_voltage,
            self.temperature,
            self.output_current,
            self.output_power
        )
    }
}

/// DCE0133V2 telemetry reader
///
/// Owns its bus handle, so calls on one reader never interleave. To read
/// several modules on one bus, give each a clone of a
/// [`SharedI2c`](crate::hw_trait::SharedI2c).
pub struct Dce0133<I2C> {
    i2c: I2C,
    config: Dce0133Config,
}

impl<I2C: I2c> Dce0133<I2C> {
    /// Create a new DCE0133V2 reader
    pub fn new(i2c: I2C, config: Dce0133Config) -> Self {
        Self { i2c, config }
    }

    pub fn address(&self) -> u8 {
        self.config.address
    }

    /// Read input voltage in volts
    pub async fn input_voltage(&mut self) -> Result<f32> {
        self.read_channel(Channel::InputVoltage).await
    }

    /// Read output voltage in volts
    pub async fn output_voltage(&mut self) -> Result<f32> {
        self.read_channel(Channel::OutputVoltage).await
    }

    /// Read module temperature in degrees Celsius
    pub async fn temperature(&mut self) -> Result<f32> {
        self.read_channel(Channel::Temperature).await
    }

    /// Read output current in amps
    pub async fn output_current(&mut self) -> Result<f32> {
        self.read_channel(Channel::OutputCurrent).await
    }

    /// Read output power in watts
    pub async fn output_power(&mut self) -> Result<f32> {
        self.read_channel(Channel::OutputPower).await
    }

    /// Read and decode a single channel
    pub async fn read_channel(&mut self, channel: Channel) -> Result<f32> {
        let value = match channel.encoding() {
            Encoding::Linear11 => {
                let raw = self.read_word(channel.command()).await?;
                Linear11::new(raw).to_f32()
            }
            Encoding::Linear16 => {
                let raw = self.read_word(channel.command()).await?;
                let mode = self.read_vout_mode().await?;
                Linear16::new(raw, mode).to_f32()
            }
        };

        debug!("{}: {:.3}{}", channel, value, channel.unit());
        Ok(value)
    }

    /// Read every channel once.
    ///
    /// Stops at the first channel that fails.
    pub async fn read_all(&mut self) -> Result<Telemetry> {
        Ok(Telemetry {
            input_voltage: self.input_voltage().await?,
            output_voltage: self.output_voltage().await?,
            temperature: self.temperature().await?,
            output_current: self.output_current().await?,
            output_power: self.output_power().await?,
        })
    }

    /// Read VOUT_MODE, which carries the LINEAR16 exponent
    pub async fn read_vout_mode(&mut self) -> Result<VoutMode> {
        let raw = pmbus::request(
            &mut self.i2c,
            self.config.address,
            PmbusCommand::VoutMode.as_u8(),
            VOUT_MODE_LENGTH,
        )
        .await?;

        let mode = VoutMode::new(raw as u8);
        if mode.mode() != VoutModeFormat::Linear {
            warn!(
                "VOUT_MODE {} is not linear; decoding READ_VOUT as LINEAR16 anyway",
                mode
            );
        }
        Ok(mode)
    }

    // Helper methods for I2C operations

    async fn read_word(&mut self, command: PmbusCommand) -> Result<u16> {
        let address = self.config.address;
        pmbus::request(&mut self.i2c, address, command.as_u8(), WORD_LENGTH)
            .await
            .map_err(|e| {
                debug!("{} read from 0x{:02x} failed: {}", command, address, e);
                e
            })
    }
}

impl<I2C> fmt::Debug for Dce0133<I2C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dce0133")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hw_trait::mock::{MockI2c, Transaction};
    use crate::hw_trait::{HwError, I2cError, SharedI2c};
    use serial_test::serial;

    /// Module answering every channel with plausible values
    fn healthy_module() -> MockI2c {
        MockI2c::new(DEFAULT_ADDRESS)
            // 12.0V: mantissa 768, exponent -6
            .with_response(0x88, &0xD300u16.to_le_bytes())
            // 3.3V: 1690 / 512, VOUT_MODE exponent -9
            .with_response(0x8B, &1690u16.to_le_bytes())
            .with_response(0x20, &[0x17])
            // 25.0°C: mantissa 100, exponent -2
            .with_response(0x8D, &0xF064u16.to_le_bytes())
            // 1.5A: mantissa 6, exponent -2
            .with_response(0x8C, &0xF006u16.to_le_bytes())
            // 4.95W: mantissa 1267, exponent -8
            .with_response(0x96, &0xC4F3u16.to_le_bytes())
    }

    #[test]
    fn test_channel_table() {
        let commands: Vec<u8> = Channel::ALL.iter().map(|c| c.command().as_u8()).collect();
        assert_eq!(commands, vec![0x88, 0x8B, 0x8D, 0x8C, 0x96]);

        for channel in Channel::ALL {
            let expected = if channel == Channel::OutputVoltage {
                Encoding::Linear16
            } else {
                Encoding::Linear11
            };
            assert_eq!(channel.encoding(), expected);
        }

        assert_eq!(Channel::Temperature.unit(), "°C");
        assert_eq!(format!("{}", Channel::OutputPower), "output power");
    }

    #[tokio::test]
    async fn test_temperature_zero() {
        let i2c = MockI2c::new(DEFAULT_ADDRESS).with_response(0x8D, &[0x00, 0x00]);
        let mut dce = Dce0133::new(i2c, Dce0133Config::default());
        assert_eq!(dce.temperature().await.unwrap(), 0.0);
    }

    #[tokio::test]
    async fn test_linear11_channels() {
        let mut dce = Dce0133::new(healthy_module(), Dce0133Config::default());

        assert_eq!(dce.input_voltage().await.unwrap(), 12.0);
        assert_eq!(dce.temperature().await.unwrap(), 25.0);
        assert_eq!(dce.output_current().await.unwrap(), 1.5);
        assert_eq!(dce.output_power().await.unwrap(), 1267.0 / 256.0);
    }

    #[tokio::test]
    async fn test_output_voltage_reads_value_then_mode() {
        let i2c = healthy_module();
        let log = i2c.log();
        let mut dce = Dce0133::new(i2c, Dce0133Config::default());

        assert_eq!(dce.output_voltage().await.unwrap(), 1690.0 / 512.0);

        let log = log.lock().unwrap();
        assert_eq!(
            *log,
            vec![
                Transaction {
                    addr: DEFAULT_ADDRESS,
                    write: vec![0x8B],
                    read_len: 2,
                },
                Transaction {
                    addr: DEFAULT_ADDRESS,
                    write: vec![0x20],
                    read_len: 1,
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_output_voltage_non_linear_mode_still_decodes() {
        // Direct mode bits set, exponent bits 0b11101 (-3)
        let i2c = MockI2c::new(DEFAULT_ADDRESS)
            .with_response(0x8B, &1000u16.to_le_bytes())
            .with_response(0x20, &[0x5D]);
        let mut dce = Dce0133::new(i2c, Dce0133Config::default());

        assert_eq!(dce.output_voltage().await.unwrap(), 125.0);
    }

    #[tokio::test]
    async fn test_read_all() {
        let mut dce = Dce0133::new(healthy_module(), Dce0133Config::default());
        let telemetry = dce.read_all().await.unwrap();

        assert_eq!(
            telemetry,
            Telemetry {
                input_voltage: 12.0,
                output_voltage: 1690.0 / 512.0,
                temperature: 25.0,
                output_current: 1.5,
                output_power: 1267.0 / 256.0,
            }
        );
        assert_eq!(telemetry.get(Channel::Temperature), 25.0);
        assert_eq!(
            format!("{}", telemetry),
            "12.000V in, 3.301V out, 25.0°C, 1.500A, 4.949W"
        );
    }

    #[tokio::test]
    async fn test_short_read_fails_channel() {
        let i2c = MockI2c::new(DEFAULT_ADDRESS).with_response(0x8C, &[0x06]);
        let mut dce = Dce0133::new(i2c, Dce0133Config::default());

        let err = dce.output_current().await.unwrap_err();
        assert!(matches!(
            err,
            HwError::I2c(I2cError::Incomplete {
                expected: 2,
                actual: 1,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_missing_vout_mode_fails_output_voltage() {
        let i2c = MockI2c::new(DEFAULT_ADDRESS).with_response(0x8B, &1000u16.to_le_bytes());
        let mut dce = Dce0133::new(i2c, Dce0133Config::default());

        let err = dce.output_voltage().await.unwrap_err();
        assert!(matches!(
            err,
            HwError::I2c(I2cError::Incomplete {
                expected: 1,
                actual: 0,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_read_all_stops_at_first_failure() {
        // No temperature response
        let i2c = MockI2c::new(DEFAULT_ADDRESS)
            .with_response(0x88, &0xD300u16.to_le_bytes())
            .with_response(0x8B, &1690u16.to_le_bytes())
            .with_response(0x20, &[0x17]);
        let log = i2c.log();
        let mut dce = Dce0133::new(i2c, Dce0133Config::default());

        assert!(dce.read_all().await.is_err());
        let commands: Vec<u8> = log.lock().unwrap().iter().map(|t| t.write[0]).collect();
        assert_eq!(commands, vec![0x88, 0x8B, 0x20, 0x8D]);
    }

    #[tokio::test]
    async fn test_configured_address() {
        let i2c = MockI2c::new(0x12).with_response(0x8D, &0xF064u16.to_le_bytes());
        let mut dce = Dce0133::new(i2c, Dce0133Config { address: 0x12 });

        assert_eq!(dce.address(), 0x12);
        assert_eq!(dce.temperature().await.unwrap(), 25.0);

        // Default address NACKs on this bus
        let i2c = MockI2c::new(0x12).with_response(0x8D, &0xF064u16.to_le_bytes());
        let mut dce = Dce0133::new(i2c, Dce0133Config::default());
        let err = dce.temperature().await.unwrap_err();
        assert!(matches!(err, HwError::I2c(I2cError::NoAck(0x7F))));
    }

    #[tokio::test]
    async fn test_readers_share_bus() {
        let bus = SharedI2c::new(healthy_module());
        let mut first = Dce0133::new(bus.clone(), Dce0133Config::default());
        let mut second = Dce0133::new(bus, Dce0133Config::default());

        let (a, b) = tokio::join!(first.read_all(), second.read_all());
        assert_eq!(a.unwrap(), b.unwrap());
    }

    #[test]
    fn test_parse_address() {
        assert_eq!(parse_address("127"), Some(0x7F));
        assert_eq!(parse_address("0x24"), Some(0x24));
        assert_eq!(parse_address(" 0X4c "), Some(0x4C));
        assert_eq!(parse_address("0x80"), None);
        assert_eq!(parse_address("200"), None);
        assert_eq!(parse_address("bogus"), None);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        std::env::remove_var(ADDRESS_ENV);
        assert_eq!(Dce0133Config::from_env().address, DEFAULT_ADDRESS);

        std::env::set_var(ADDRESS_ENV, "0x24");
        assert_eq!(Dce0133Config::from_env().address, 0x24);

        std::env::set_var(ADDRESS_ENV, "not-an-address");
        assert_eq!(Dce0133Config::from_env().address, DEFAULT_ADDRESS);

        std::env::remove_var(ADDRESS_ENV);
    }
}
