//! I2C implementation on Linux `/dev/i2c-N` adapters using rppal.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rppal::i2c;

use crate::hw_trait::i2c::{I2c, I2cError};
use crate::hw_trait::{HwError, Result};
use crate::tracing::prelude::*;

/// I2C bus backed by a Linux I2C adapter.
///
/// rppal issues blocking ioctls, so each transaction runs on tokio's
/// blocking pool. The combined write+read uses a single `I2C_RDWR` transfer,
/// which keeps the bus between the command byte and the read (repeated
/// start, no stop).
pub struct RppalI2c {
    bus: Arc<Mutex<i2c::I2c>>,
    bus_number: u8,
}

impl RppalI2c {
    /// Open I2C bus `bus_number` (`/dev/i2c-<bus_number>`).
    pub fn with_bus(bus_number: u8) -> Result<Self> {
        let bus = i2c::I2c::with_bus(bus_number).map_err(map_rppal_error)?;
        debug!(bus = bus_number, "Opened I2C bus");
        Ok(Self {
            bus: Arc::new(Mutex::new(bus)),
            bus_number,
        })
    }

    /// Linux bus number this adapter was opened on.
    pub fn bus_number(&self) -> u8 {
        self.bus_number
    }
}

fn map_rppal_error(err: i2c::Error) -> HwError {
    match err {
        i2c::Error::Io(e) => HwError::Io(e),
        i2c::Error::InvalidSlaveAddress(addr) => {
            HwError::InvalidParameter(format!("invalid I2C address 0x{:02x}", addr))
        }
        other => HwError::I2c(I2cError::Other(other.to_string())),
    }
}

#[async_trait]
impl I2c for RppalI2c {
    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<usize> {
        let bus = Arc::clone(&self.bus);
        let write = write.to_vec();
        let len = read.len();

        let data = tokio::task::spawn_blocking(move || -> Result<Vec<u8>> {
            let mut bus = bus
                .lock()
                .map_err(|_| HwError::Other("I2C bus lock poisoned".to_string()))?;
            bus.set_slave_address(addr as u16).map_err(map_rppal_error)?;

            let mut buffer = vec![0u8; len];
            bus.write_read(&write, &mut buffer).map_err(map_rppal_error)?;
            Ok(buffer)
        })
        .await
        .map_err(|e| HwError::Other(format!("I2C worker failed: {}", e)))??;

        read.copy_from_slice(&data);
        Ok(data.len())
    }
}
