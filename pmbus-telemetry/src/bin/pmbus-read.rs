//! Read telemetry from a DCE0133V2 module once and print it.
//!
//! Environment:
//!   PMBUS_TELEMETRY_BUS      Linux I2C bus number (default: 1)
//!   PMBUS_TELEMETRY_ADDRESS  Device address (default: 0x7F)

use std::env;

use anyhow::{Context, Result};

use pmbus_telemetry::hw_trait::RppalI2c;
use pmbus_telemetry::peripheral::dce0133::{Channel, Dce0133, Dce0133Config};
use pmbus_telemetry::tracing::{self, prelude::*};

const DEFAULT_BUS: u8 = 1;

fn bus_from_env() -> u8 {
    match env::var("PMBUS_TELEMETRY_BUS") {
        Ok(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(
                "Ignoring PMBUS_TELEMETRY_BUS={:?}, using bus {}",
                raw, DEFAULT_BUS
            );
            DEFAULT_BUS
        }),
        Err(_) => DEFAULT_BUS,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing::init_journald_or_stdout();

    let bus = bus_from_env();
    let config = Dce0133Config::from_env();
    let address = config.address;

    let i2c = RppalI2c::with_bus(bus).with_context(|| format!("opening /dev/i2c-{}", bus))?;
    let mut dce = Dce0133::new(i2c, config);
    info!("Reading DCE0133V2 at 0x{:02x} on /dev/i2c-{}", address, bus);

    let telemetry = dce
        .read_all()
        .await
        .with_context(|| format!("reading telemetry from 0x{:02x}", address))?;

    for channel in Channel::ALL {
        println!(
            "{:<16} {:>10.3} {}",
            channel.name(),
            telemetry.get(channel),
            channel.unit()
        );
    }

    Ok(())
}
