//! PMBus Protocol Support
//!
//! This module provides the PMBus pieces the telemetry drivers are built
//! from: the command codes, the word-read bus transaction, and decoders for
//! the LINEAR11 and LINEAR16 data formats.
//!
//! PMBus is a variant of SMBus with extensions for power management.
//! Specification: <https://pmbus.org/specification-documents/>

use std::fmt;
use thiserror::Error;

use crate::hw_trait::{HwError, I2c, I2cError, Result};
use crate::tracing::prelude::*;

// ============================================================================
// PMBus Commands
// ============================================================================

/// Macro to define PMBus commands with metadata in one place
macro_rules! define_pmbus_commands {
    (
        $(
            $variant:ident = $value:literal,
            $name:literal,
            $desc:literal
        ),* $(,)?
    ) => {
        /// PMBus standard command codes
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum PmbusCommand {
            $(
                $variant = $value,
            )*
        }

        impl PmbusCommand {
            /// Command metadata: (value, name, description)
            const METADATA: &'static [(u8, &'static str, &'static str)] = &[
                $(
                    ($value, $name, $desc),
                )*
            ];

            /// Get the command name as a string
            pub fn name(&self) -> &'static str {
                let value = self.as_u8();
                Self::METADATA
                    .iter()
                    .find(|(v, _, _)| *v == value)
                    .map(|(_, name, _)| *name)
                    .unwrap_or("UNKNOWN")
            }

            /// Get command description
            pub fn description(&self) -> &'static str {
                let value = self.as_u8();
                Self::METADATA
                    .iter()
                    .find(|(v, _, _)| *v == value)
                    .map(|(_, _, desc)| *desc)
                    .unwrap_or("unknown command")
            }

            /// Convert to u8 command code
            pub fn as_u8(self) -> u8 {
                self as u8
            }
        }

        impl fmt::Display for PmbusCommand {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.name())
            }
        }

        impl TryFrom<u8> for PmbusCommand {
            type Error = PMBusError;

            fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
                match value {
                    $(
                        $value => Ok(Self::$variant),
                    )*
                    _ => Err(PMBusError::CommandNotSupported(value)),
                }
            }
        }

        impl From<PmbusCommand> for u8 {
            fn from(cmd: PmbusCommand) -> Self {
                cmd.as_u8()
            }
        }
    };
}

define_pmbus_commands! {
    VoutMode = 0x20, "VOUT_MODE", "output voltage data format",
    ReadVin = 0x88, "READ_VIN", "input voltage",
    ReadIin = 0x89, "READ_IIN", "input current",
    ReadVout = 0x8B, "READ_VOUT", "output voltage",
    ReadIout = 0x8C, "READ_IOUT", "output current",
    ReadTemperature1 = 0x8D, "READ_TEMPERATURE_1", "temperature 1",
    ReadPout = 0x96, "READ_POUT", "output power",
    ReadPin = 0x97, "READ_PIN", "input power",
}

// ============================================================================
// Bus Transactions
// ============================================================================

/// Read a one- or two-byte PMBus value.
///
/// Writes `command` to the device at `address` and, without releasing the
/// bus, reads `expected_length` bytes back. PMBus sends the low byte first,
/// so for a two-byte read the result is `(second << 8) | first`; a one-byte
/// read leaves the high byte zero.
///
/// A device that delivers fewer bytes than requested yields
/// [`I2cError::Incomplete`] rather than a partially assembled word.
pub async fn request<I: I2c + ?Sized>(
    i2c: &mut I,
    address: u8,
    command: u8,
    expected_length: usize,
) -> Result<u16> {
    if !(1..=2).contains(&expected_length) {
        return Err(HwError::InvalidParameter(format!(
            "PMBus read length must be 1 or 2 bytes, got {}",
            expected_length
        )));
    }

    let mut data = [0u8; 2];
    let received = i2c
        .write_read(address, &[command], &mut data[..expected_length])
        .await?;

    if received != expected_length {
        return Err(I2cError::Incomplete {
            addr: address,
            expected: expected_length,
            actual: received,
        }
        .into());
    }

    let word = u16::from_le_bytes(data);
    trace!(
        "PMBus read addr=0x{:02x} cmd=0x{:02x} len={} -> 0x{:04x}",
        address,
        command,
        expected_length,
        word
    );
    Ok(word)
}

// ============================================================================
// Data Format Converters
// ============================================================================

/// Negate a 5-bit two's complement field: `(!raw + 1) & 0x1F`.
///
/// Only the low five bits of `raw` matter, so a whole VOUT_MODE byte can be
/// passed straight in.
fn twos_complement_5bit(raw: u8) -> u8 {
    (!raw).wrapping_add(1) & 0x1F
}

/// Halve `value` `times` times.
///
/// Each halving is exact in floating point, so no fractional bits are lost
/// the way they would be with an integer shift of the mantissa.
fn halve(mut value: f32, times: u8) -> f32 {
    for _ in 0..times {
        value /= 2.0;
    }
    value
}

/// LINEAR11 data format conversion
///
/// Bits 15:11 hold a 5-bit two's complement exponent, bits 10:0 the
/// mantissa. The mantissa is read as unsigned (0 to 2047); a device that
/// sets bit 10 to report a negative reading is outside what this decoder
/// handles and will come out as a large positive value.
pub mod linear11 {
    use super::{halve, twos_complement_5bit};

    const EXPONENT_SHIFT: u16 = 11;
    const EXPONENT_SIGN_BIT: u8 = 0x10;
    const MANTISSA_MASK: u16 = 0x07FF;

    /// Mantissa field (bits 10:0), unsigned.
    pub fn mantissa(value: u16) -> u16 {
        value & MANTISSA_MASK
    }

    /// Raw exponent field (bits 15:11).
    pub fn exponent_bits(value: u16) -> u8 {
        (value >> EXPONENT_SHIFT) as u8
    }

    /// Number of times the mantissa is halved when decoding `value`.
    ///
    /// An exponent with the sign bit set is negated to its magnitude. An
    /// exponent with the sign bit clear is used as-is, so it also divides:
    /// positive LINEAR11 exponents are never scaled up.
    pub fn shift_count(value: u16) -> u8 {
        let raw = exponent_bits(value);
        if raw & EXPONENT_SIGN_BIT != 0 {
            twos_complement_5bit(raw)
        } else {
            raw
        }
    }

    /// Convert LINEAR11 format to floating point
    pub fn to_float(value: u16) -> f32 {
        halve(mantissa(value) as f32, shift_count(value))
    }
}

/// LINEAR16 data format conversion
///
/// The whole word is an unsigned mantissa. The exponent lives in the low
/// five bits of VOUT_MODE and is always negated before use, whatever its
/// sign bit says.
pub mod linear16 {
    use super::{halve, twos_complement_5bit};

    /// Number of times the mantissa is halved for the given exponent field.
    pub fn shift_count(exponent_bits: u8) -> u8 {
        twos_complement_5bit(exponent_bits)
    }

    /// Convert LINEAR16 format to floating point
    pub fn to_float(value: u16, exponent_bits: u8) -> f32 {
        halve(value as f32, shift_count(exponent_bits))
    }
}

// ============================================================================
// Error Types
// ============================================================================

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PMBusError {
    #[error("Invalid data format")]
    InvalidDataFormat,
    #[error("Command 0x{0:02x} not supported")]
    CommandNotSupported(u8),
}

// Import type-safe Linear format types
mod pmbus_types;
pub use pmbus_types::*;
