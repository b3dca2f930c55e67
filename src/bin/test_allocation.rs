//! Offline demonstration of the allocation algorithm.
//!
//! Runs the allocator over the documented fallback snapshot and the
//! reference device catalog, the same inputs the service uses when the
//! price API is unreachable, and prints the resulting allocation.

use anyhow::Result;
use tracing::{info, Level};
use wattmix::optimizer::{allocate, fallback_snapshot, DeviceCatalog, OptimizerConfig};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Running allocation against the fallback snapshot");

    let catalog = DeviceCatalog::default();
    let devices = catalog.device_types()?;
    let snapshots = vec![fallback_snapshot()];
    let power_cap = OptimizerConfig::default().power_cap;

    let allocation = allocate(&snapshots, &devices, power_cap)?;

    info!(
        "Best mix uses {} of {} device types",
        allocation.units_by_device.len(),
        devices.len()
    );
    println!("{}", serde_json::to_string_pretty(&allocation)?);

    Ok(())
}
