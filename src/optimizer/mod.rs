//! Optimizer subsystem: the greedy best-mix allocator plus the I/O
//! collaborators that feed it (price data, device catalog) and consume
//! its output (machine dispatch).

pub mod allocator;
pub mod catalog;
pub mod data_sources;
pub mod dispatcher;
pub mod engine;
pub mod types;

// Re-export main types
pub use allocator::{allocate, AllocationError};
pub use catalog::{DeviceCatalog, InferenceSpec, MinerSpec};
pub use data_sources::{fallback_snapshot, MarketDataSources, PriceFeed, PriceObservation, SiteInfo};
pub use dispatcher::{AllocationSink, MachineDispatcher};
pub use engine::{AllocationEngine, CycleOutcome};
pub use types::{ApiConfig, OptimizerConfig};
