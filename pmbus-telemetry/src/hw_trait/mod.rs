//! Hardware abstraction layer traits.
//!
//! This module defines the bus interface that the PMBus drivers talk to, so
//! the same driver works against a Linux I2C adapter, a shared bus handle,
//! or a scripted test double.

pub mod i2c;
#[cfg(test)]
pub(crate) mod mock;
#[cfg(feature = "rppal")]
pub mod rppal_i2c;
pub mod shared;

// Re-export traits
pub use i2c::{I2c, I2cError};
#[cfg(feature = "rppal")]
pub use rppal_i2c::RppalI2c;
pub use shared::SharedI2c;

/// Common error type for hardware operations
#[derive(Debug, thiserror::Error)]
pub enum HwError {
    /// I/O error from underlying transport
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I2C bus error
    #[error(transparent)]
    I2c(#[from] I2cError),

    /// Invalid parameter or argument
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Operation not supported by hardware
    #[error("Operation not supported: {0}")]
    NotSupported(String),

    /// Timeout waiting for hardware response
    #[error("Hardware timeout")]
    Timeout,

    /// Other hardware-specific error
    #[error("Hardware error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, HwError>;
