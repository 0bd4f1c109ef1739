//! Scripted I2C bus for driver tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::i2c::{I2c, I2cError};
use super::Result;

/// One write+read transaction as seen by the mock bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    pub addr: u8,
    pub write: Vec<u8>,
    pub read_len: usize,
}

/// I2C bus with a single device that answers each command byte with canned
/// bytes.
///
/// Any other address NACKs. A command with no canned response is acked but
/// returns no data; a canned response shorter than the requested read
/// produces a short read.
pub struct MockI2c {
    address: u8,
    responses: HashMap<u8, Vec<u8>>,
    log: Arc<Mutex<Vec<Transaction>>>,
}

impl MockI2c {
    pub fn new(address: u8) -> Self {
        Self {
            address,
            responses: HashMap::new(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_response(mut self, command: u8, bytes: &[u8]) -> Self {
        self.responses.insert(command, bytes.to_vec());
        self
    }

    /// Handle to the transaction log, usable after the mock is moved into a
    /// driver.
    pub fn log(&self) -> Arc<Mutex<Vec<Transaction>>> {
        Arc::clone(&self.log)
    }
}

#[async_trait]
impl I2c for MockI2c {
    async fn write_read(&mut self, addr: u8, write: &[u8], read: &mut [u8]) -> Result<usize> {
        self.log.lock().unwrap().push(Transaction {
            addr,
            write: write.to_vec(),
            read_len: read.len(),
        });

        if addr != self.address {
            return Err(I2cError::NoAck(addr).into());
        }

        let Some(bytes) = write.first().and_then(|cmd| self.responses.get(cmd)) else {
            return Ok(0);
        };

        let n = bytes.len().min(read.len());
        read[..n].copy_from_slice(&bytes[..n]);
        Ok(n)
    }
}
