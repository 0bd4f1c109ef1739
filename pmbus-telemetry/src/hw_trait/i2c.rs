//! I2C hardware abstraction trait.

use async_trait::async_trait;
use super::Result;

/// I2C-specific errors
#[derive(Debug, thiserror::Error)]
pub enum I2cError {
    /// No acknowledgment from device
    #[error("No acknowledgment from device at address 0x{0:02x}")]
    NoAck(u8),

    /// Bus arbitration lost
    #[error("Bus arbitration lost")]
    ArbitrationLost,

    /// Bus error
    #[error("Bus error")]
    BusError,

    /// Device returned fewer bytes than the transaction asked for
    #[error("Incomplete transaction with device at address 0x{addr:02x}: expected {expected} bytes, got {actual}")]
    Incomplete {
        addr: u8,
        expected: usize,
        actual: usize,
    },

    /// Other I2C error
    #[error("I2C error: {0}")]
    Other(String),
}

/// I2C bus abstraction
#[async_trait]
pub trait I2c: Send + Sync {
    /// Write data then read from an I2C device (repeated start).
    ///
    /// The write and the read are one transaction: no stop condition is
    /// sent between them, and the bus is released once the read completes.
    /// Returns the number of bytes the device actually delivered into
    /// `read`, which may be less than `read.len()`.
    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<usize>;
}
