//! Telemetry readout for PMBus DC-DC converter modules.
//!
//! A [`Dce0133`](peripheral::dce0133::Dce0133) reader fetches raw words over
//! any [`I2c`](hw_trait::I2c) bus and decodes them from the PMBus LINEAR11
//! and LINEAR16 formats into volts, amps, watts and degrees Celsius.

pub mod hw_trait;
pub mod peripheral;
pub mod tracing;
