//! wattmix - revenue-maximizing power allocation for mixed fleets
//!
//! This crate picks, for the best market snapshot in a batch, how many
//! units of each device type (inference accelerators and miners) to
//! activate under a fixed site power budget.

pub mod optimizer;
pub mod types;

// Re-export main types for convenience
pub use types::{Allocation, DeviceCategory, DeviceType, MarketSnapshot};
