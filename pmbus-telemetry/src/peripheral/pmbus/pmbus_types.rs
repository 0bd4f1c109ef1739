//! Type-safe PMBus Linear format implementations
//!
//! This module provides type-safe wrappers for PMBus Linear11 and Linear16 formats,
//! along with VOUT_MODE handling for proper voltage decoding.

use std::fmt;

use super::{linear11, linear16, PMBusError};

/// PMBus VOUT_MODE format enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoutModeFormat {
    Linear,
    Vid,
    Direct,
    Ieee754Half,
    Reserved(u8),
}

impl TryFrom<u8> for VoutModeFormat {
    type Error = PMBusError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0b000 => Ok(Self::Linear),
            0b001 => Ok(Self::Vid),
            0b010 => Ok(Self::Direct),
            0b011 => Ok(Self::Ieee754Half),
            0b100..=0b111 => Ok(Self::Reserved(value)),
            _ => Err(PMBusError::InvalidDataFormat),
        }
    }
}

impl fmt::Display for VoutModeFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Linear => write!(f, "linear"),
            Self::Vid => write!(f, "VID"),
            Self::Direct => write!(f, "direct"),
            Self::Ieee754Half => write!(f, "IEEE 754 half"),
            Self::Reserved(mode) => write!(f, "reserved ({:#05b})", mode),
        }
    }
}

/// PMBus VOUT_MODE register (command 0x20)
/// Determines the data format for voltage-related commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoutMode(pub u8);

impl VoutMode {
    pub fn new(raw: u8) -> Self {
        Self(raw)
    }

    /// Get the mode field (bits 7:5)
    pub fn mode(&self) -> VoutModeFormat {
        // Three bits always fit
        VoutModeFormat::try_from((self.0 >> 5) & 0x07).unwrap_or(VoutModeFormat::Reserved(0))
    }

    /// Raw 5-bit exponent field (bits 4:0)
    pub fn exponent_bits(&self) -> u8 {
        self.0 & 0x1F
    }

    /// Convert Linear16 value using this VOUT_MODE
    pub fn decode_linear16(&self, value: u16) -> f32 {
        linear16::to_float(value, self.exponent_bits())
    }
}

impl fmt::Display for VoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "0x{:02x} ({}, exponent -{})",
            self.0,
            self.mode(),
            linear16::shift_count(self.exponent_bits())
        )
    }
}

/// Linear11 format (11-bit mantissa, 5-bit exponent)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linear11(pub u16);

impl Linear11 {
    pub fn new(raw: u16) -> Self {
        Self(raw)
    }

    pub fn mantissa(self) -> u16 {
        linear11::mantissa(self.0)
    }

    pub fn exponent_bits(self) -> u8 {
        linear11::exponent_bits(self.0)
    }

    pub fn to_f32(self) -> f32 {
        linear11::to_float(self.0)
    }
}

impl From<Linear11> for f32 {
    fn from(value: Linear11) -> Self {
        value.to_f32()
    }
}

/// Linear16 format (16-bit mantissa with separate VOUT_MODE)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Linear16 {
    pub value: u16,
    pub mode: VoutMode,
}

impl Linear16 {
    pub fn new(value: u16, mode: VoutMode) -> Self {
        Self { value, mode }
    }

    pub fn to_f32(self) -> f32 {
        self.mode.decode_linear16(self.value)
    }
}

impl From<Linear16> for f32 {
    fn from(value: Linear16) -> Self {
        value.to_f32()
    }
}
