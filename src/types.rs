//! Core types and data structures for the wattmix allocation system.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One timestamped observation of token and hash prices.
///
/// Immutable once constructed; produced by the market data layer and
/// consumed read-only by the allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketSnapshot {
    /// Revenue multiplier for inference output (per token)
    pub token_price: f64,
    /// Revenue multiplier for mining output (per unit of hashrate)
    pub hash_price: f64,
    /// Opaque identifier carried through unchanged; never parsed
    pub timestamp: String,
}

/// Which price and output metric apply to a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceCategory {
    /// Compute accelerators earning on token output
    Inference,
    /// Mining hardware earning on hashrate
    Miner,
}

impl DeviceCategory {
    /// Returns the string representation of the category.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceCategory::Inference => "inference",
            DeviceCategory::Miner => "miner",
        }
    }
}

/// One kind of activatable hardware unit from the device catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceType {
    /// Unique device name; catalog validation guarantees uniqueness
    /// across categories as well
    pub name: String,
    /// Explicit category; determines which price applies
    pub category: DeviceCategory,
    /// Tokens per unit (inference) or hashrate per unit (miner)
    pub output_rate: f64,
    /// Power drawn by one active unit, in watts
    pub power_per_unit: i64,
}

/// The result of one optimization run.
///
/// Invariant: total power used by `units_by_device` never exceeds the
/// power cap the allocation was computed against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    /// Active unit counts keyed by device name; zero-count entries
    /// never appear. BTreeMap keeps output order deterministic.
    pub units_by_device: BTreeMap<String, u64>,
    /// Expected total revenue, rounded to 2 decimal places
    pub expected_revenue: f64,
    /// Power budget left unused
    pub unallocated_power: i64,
    /// Timestamp of the winning snapshot, absent if no snapshot
    /// yielded positive revenue
    pub market_timestamp: Option<String>,
}

impl Allocation {
    /// The empty allocation for a given power cap: no units, zero
    /// revenue, the whole budget unused.
    pub fn empty(power_cap: i64) -> Self {
        Self {
            units_by_device: BTreeMap::new(),
            expected_revenue: 0.0,
            unallocated_power: power_cap,
            market_timestamp: None,
        }
    }

    /// Whether any device received units.
    pub fn is_empty(&self) -> bool {
        self.units_by_device.is_empty()
    }
}
