//! PMBus peripheral drivers.
//!
//! `pmbus` holds the protocol pieces shared by PMBus devices: command codes,
//! the word-read transaction and the LINEAR11/LINEAR16 decoders. Device
//! drivers such as `dce0133` are generic over the hw_trait interfaces.

pub mod dce0133;
pub mod pmbus;
