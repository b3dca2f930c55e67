//! Allocation engine: wires the price feed, the device catalog, the
//! allocator, and the allocation sink into one optimization cycle.
//!
//! The engine owns the fallback-or-fail decision for upstream data:
//! a failing or empty price feed is replaced by the documented fallback
//! snapshot, so the allocator itself never sees a transport error.

use crate::optimizer::allocator::{allocate, AllocationError};
use crate::optimizer::catalog::DeviceCatalog;
use crate::optimizer::data_sources::{fallback_snapshot, PriceFeed};
use crate::optimizer::dispatcher::AllocationSink;
use crate::optimizer::types::OptimizerConfig;
use crate::types::{Allocation, DeviceType, MarketSnapshot};
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, instrument, warn};

/// One optimization cycle's outcome: the chosen allocation plus the
/// snapshots it was computed from.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub allocation: Allocation,
    pub market_data_used: Vec<MarketSnapshot>,
    /// Wall-clock time the cycle finished, for operator logs
    pub evaluated_at: chrono::DateTime<chrono::Utc>,
}

/// Orchestrates fetch -> allocate -> apply.
pub struct AllocationEngine {
    feed: Arc<dyn PriceFeed>,
    sink: Arc<dyn AllocationSink>,
    devices: Vec<DeviceType>,
    config: OptimizerConfig,
}

impl AllocationEngine {
    /// Build an engine from its collaborators. The catalog is validated
    /// and flattened here, so a malformed catalog fails at construction
    /// rather than mid-cycle.
    pub fn new(
        feed: Arc<dyn PriceFeed>,
        sink: Arc<dyn AllocationSink>,
        catalog: &DeviceCatalog,
        config: OptimizerConfig,
    ) -> Result<Self, AllocationError> {
        let devices = catalog.device_types()?;
        info!(
            "Allocation engine ready: {} device types, power cap {}",
            devices.len(),
            config.power_cap
        );

        Ok(Self {
            feed,
            sink,
            devices,
            config,
        })
    }

    /// Pure planning step: best mix for the given snapshots against the
    /// engine's catalog and power cap. No I/O.
    pub fn plan(&self, snapshots: &[MarketSnapshot]) -> Result<Allocation, AllocationError> {
        allocate(snapshots, &self.devices, self.config.power_cap)
    }

    /// Run one full optimization cycle: fetch prices (falling back on
    /// transport failure), compute the best mix, and push it to the
    /// sink when applying is enabled and the mix is non-empty.
    #[instrument(skip(self))]
    pub async fn run_once(&self) -> Result<CycleOutcome> {
        let snapshots = match self.feed.latest_prices().await {
            Ok(snapshots) if !snapshots.is_empty() => snapshots,
            Ok(_) => {
                warn!("Price feed returned no observations, using fallback snapshot");
                vec![fallback_snapshot()]
            }
            Err(e) => {
                warn!("Price feed failed ({e:#}), using fallback snapshot");
                vec![fallback_snapshot()]
            }
        };

        let allocation = self.plan(&snapshots)?;

        match &allocation.market_timestamp {
            Some(timestamp) => info!(
                "Best mix from snapshot {}: {:?}, expected revenue {:.2}, unallocated power {}",
                timestamp,
                allocation.units_by_device,
                allocation.expected_revenue,
                allocation.unallocated_power
            ),
            None => info!("No snapshot yielded positive revenue, keeping machines untouched"),
        }

        if self.config.apply_allocations {
            self.sink.apply_allocation(&allocation).await?;
        }

        Ok(CycleOutcome {
            allocation,
            market_data_used: snapshots,
            evaluated_at: chrono::Utc::now(),
        })
    }

    /// Continuous polling loop. Errors in one cycle are logged and the
    /// loop keeps going; only construction-time problems are fatal.
    pub async fn run(&self) {
        info!(
            "Starting allocation loop, polling every {}s",
            self.config.poll_interval_secs
        );
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs.max(1)));

        loop {
            interval.tick().await;
            if let Err(e) = self.run_once().await {
                error!("Allocation cycle failed: {e:#}");
            }
        }
    }
}
