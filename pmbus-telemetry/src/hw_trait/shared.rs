//! Shared I2C bus handle.
//!
//! A two-wire transaction cannot be interleaved with another one on the same
//! bus. `SharedI2c` lets several drivers (one per device address) hold the
//! same underlying bus; each transaction takes the lock for its whole
//! write+read, so transactions from different holders never overlap.
//!
//! Uses `tokio::sync::Mutex` so a waiting driver yields instead of blocking
//! the worker thread.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::i2c::I2c;
use super::Result;

/// Cloneable handle to an I2C bus shared between drivers.
pub struct SharedI2c<I> {
    bus: Arc<Mutex<I>>,
}

impl<I: I2c> SharedI2c<I> {
    /// Take ownership of `bus` and wrap it for sharing.
    pub fn new(bus: I) -> Self {
        Self {
            bus: Arc::new(Mutex::new(bus)),
        }
    }
}

impl<I> Clone for SharedI2c<I> {
    fn clone(&self) -> Self {
        Self {
            bus: Arc::clone(&self.bus),
        }
    }
}

#[async_trait]
impl<I: I2c> I2c for SharedI2c<I> {
    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<usize> {
        let mut bus = self.bus.lock().await;
        bus.write_read(addr, write, read).await
    }
}
