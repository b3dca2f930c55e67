//! Greedy best-mix allocator.
//!
//! Given a batch of market snapshots and a device catalog, picks the
//! revenue-maximizing device mix for the single best snapshot under a
//! shared power budget. Pure and synchronous: no I/O, no shared state,
//! safe to call concurrently.

use crate::types::{Allocation, DeviceCategory, DeviceType, MarketSnapshot};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use thiserror::Error;

/// Errors intrinsic to the allocator. Everything network-shaped belongs
/// to the I/O layer and never reaches this module.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllocationError {
    /// Malformed power cap or device spec, rejected before any
    /// computation starts.
    #[error("invalid input: {0}")]
    InvalidInput(String),
}

/// Per-device ranking info computed for one snapshot.
struct DeviceRevenue<'a> {
    device: &'a DeviceType,
    revenue: f64,
    revenue_per_watt: f64,
}

/// Compute the best device mix across all snapshots under `power_cap`.
///
/// Each snapshot is evaluated independently with a greedy
/// revenue-per-watt pass; the snapshot with the strictly highest total
/// revenue wins, earliest snapshot on ties. If no snapshot yields
/// positive revenue the empty allocation is returned with the whole
/// budget unallocated and no timestamp.
pub fn allocate(
    snapshots: &[MarketSnapshot],
    devices: &[DeviceType],
    power_cap: i64,
) -> Result<Allocation, AllocationError> {
    validate_inputs(devices, power_cap)?;

    let mut best_mix: Option<BTreeMap<String, u64>> = None;
    let mut best_total_revenue = 0.0_f64;
    let mut best_timestamp: Option<String> = None;

    for snapshot in snapshots {
        let ranked = rank_devices(snapshot, devices);
        let (allocation, total_revenue) = greedy_pass(&ranked, power_cap);

        // Strict comparison: ties keep the earliest snapshot.
        if total_revenue > best_total_revenue {
            best_total_revenue = total_revenue;
            best_mix = Some(allocation);
            best_timestamp = Some(snapshot.timestamp.clone());
        }
    }

    let Some(units_by_device) = best_mix else {
        return Ok(Allocation::empty(power_cap));
    };

    // Recompute unallocated power from the winning mix against the
    // catalog rather than trusting the loop's running remainder.
    let power_used: i64 = units_by_device
        .iter()
        .map(|(name, units)| {
            devices
                .iter()
                .find(|d| d.name == *name)
                .map(|d| d.power_per_unit * *units as i64)
                .unwrap_or(0)
        })
        .sum();

    Ok(Allocation {
        units_by_device,
        expected_revenue: round_to_cents(best_total_revenue),
        unallocated_power: power_cap - power_used,
        market_timestamp: best_timestamp,
    })
}

/// Reject inputs that would make the greedy pass divide by zero or
/// produce a negative budget.
fn validate_inputs(devices: &[DeviceType], power_cap: i64) -> Result<(), AllocationError> {
    if power_cap < 0 {
        return Err(AllocationError::InvalidInput(format!(
            "power cap must be non-negative, got {power_cap}"
        )));
    }
    for device in devices {
        if device.power_per_unit <= 0 {
            return Err(AllocationError::InvalidInput(format!(
                "device '{}' has non-positive power per unit ({})",
                device.name, device.power_per_unit
            )));
        }
    }
    Ok(())
}

/// Rank devices by revenue-per-watt for one snapshot, descending.
/// The sort is stable: devices tied on revenue-per-watt keep their
/// relative input order.
fn rank_devices<'a>(snapshot: &MarketSnapshot, devices: &'a [DeviceType]) -> Vec<DeviceRevenue<'a>> {
    let mut ranked: Vec<DeviceRevenue<'a>> = devices
        .iter()
        .map(|device| {
            let price = match device.category {
                DeviceCategory::Inference => snapshot.token_price,
                DeviceCategory::Miner => snapshot.hash_price,
            };
            let revenue = device.output_rate * price;
            DeviceRevenue {
                device,
                revenue,
                revenue_per_watt: revenue / device.power_per_unit as f64,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.revenue_per_watt
            .partial_cmp(&a.revenue_per_watt)
            .unwrap_or(Ordering::Equal)
    });
    ranked
}

/// Single greedy walk over the ranked devices: each device gets as many
/// whole units as the remaining budget affords, zero-unit devices are
/// skipped entirely.
fn greedy_pass(ranked: &[DeviceRevenue<'_>], power_cap: i64) -> (BTreeMap<String, u64>, f64) {
    let mut allocation = BTreeMap::new();
    let mut total_revenue = 0.0_f64;
    let mut remaining_power = power_cap;

    for entry in ranked {
        let units = remaining_power / entry.device.power_per_unit;
        if units == 0 {
            continue;
        }

        allocation.insert(entry.device.name.clone(), units as u64);
        remaining_power -= units * entry.device.power_per_unit;
        total_revenue += units as f64 * entry.revenue;
    }

    (allocation, total_revenue)
}

/// Round to exactly 2 decimal places at the output boundary.
fn round_to_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(token_price: f64, hash_price: f64, timestamp: &str) -> MarketSnapshot {
        MarketSnapshot {
            token_price,
            hash_price,
            timestamp: timestamp.to_string(),
        }
    }

    fn inference(name: &str, output_rate: f64, power: i64) -> DeviceType {
        DeviceType {
            name: name.to_string(),
            category: DeviceCategory::Inference,
            output_rate,
            power_per_unit: power,
        }
    }

    fn miner(name: &str, output_rate: f64, power: i64) -> DeviceType {
        DeviceType {
            name: name.to_string(),
            category: DeviceCategory::Miner,
            output_rate,
            power_per_unit: power,
        }
    }

    fn power_used(allocation: &Allocation, devices: &[DeviceType]) -> i64 {
        allocation
            .units_by_device
            .iter()
            .map(|(name, units)| {
                let device = devices.iter().find(|d| d.name == *name).unwrap();
                device.power_per_unit * *units as i64
            })
            .sum()
    }

    #[test]
    fn test_greedy_prefers_revenue_per_watt() {
        // A: revenue 10 / power 5 -> 2.0 per watt
        // B: revenue 3 / power 1  -> 3.0 per watt
        let devices = vec![inference("a", 10.0, 5), inference("b", 3.0, 1)];
        let snapshots = vec![snapshot(1.0, 0.0, "t0")];

        let allocation = allocate(&snapshots, &devices, 10).unwrap();

        assert_eq!(allocation.units_by_device.len(), 1);
        assert_eq!(allocation.units_by_device["b"], 10);
        assert_eq!(allocation.expected_revenue, 30.0);
        assert_eq!(allocation.unallocated_power, 0);
        assert_eq!(allocation.market_timestamp.as_deref(), Some("t0"));
    }

    #[test]
    fn test_leftover_power_flows_to_next_device() {
        let devices = vec![miner("big", 100.0, 7), miner("small", 1.0, 2)];
        let snapshots = vec![snapshot(0.0, 1.0, "t0")];

        let allocation = allocate(&snapshots, &devices, 10).unwrap();

        // big: 10 / 7 = 1 unit (7 power), small: 3 / 2 = 1 unit (2 power)
        assert_eq!(allocation.units_by_device["big"], 1);
        assert_eq!(allocation.units_by_device["small"], 1);
        assert_eq!(allocation.unallocated_power, 1);
    }

    #[test]
    fn test_best_of_many_snapshots() {
        let devices = vec![inference("gpu", 10.0, 5)];
        let snapshots = vec![
            snapshot(1.0, 0.0, "first"),  // 3 units * 10 = 30
            snapshot(1.5, 0.0, "second"), // 3 units * 15 = 45
        ];

        let allocation = allocate(&snapshots, &devices, 15).unwrap();

        assert_eq!(allocation.expected_revenue, 45.0);
        assert_eq!(allocation.market_timestamp.as_deref(), Some("second"));
        assert_eq!(allocation.units_by_device["gpu"], 3);
    }

    #[test]
    fn test_snapshot_ties_keep_earliest() {
        let devices = vec![inference("gpu", 10.0, 5)];
        let snapshots = vec![snapshot(1.0, 0.0, "first"), snapshot(1.0, 0.0, "second")];

        let allocation = allocate(&snapshots, &devices, 15).unwrap();

        assert_eq!(allocation.market_timestamp.as_deref(), Some("first"));
    }

    #[test]
    fn test_device_ties_keep_input_order() {
        // Both devices score 1.0 revenue per watt; the stable sort must
        // keep input order, so whichever comes first soaks up the budget.
        let x = inference("x", 10.0, 10);
        let y = inference("y", 1.0, 1);
        let snapshots = vec![snapshot(1.0, 0.0, "t0")];

        let forward = allocate(&snapshots, &[x.clone(), y.clone()], 10).unwrap();
        assert_eq!(forward.units_by_device["x"], 1);
        assert!(!forward.units_by_device.contains_key("y"));

        let reversed = allocate(&snapshots, &[y, x], 10).unwrap();
        assert_eq!(reversed.units_by_device["y"], 10);
        assert!(!reversed.units_by_device.contains_key("x"));
    }

    #[test]
    fn test_empty_snapshots_yield_empty_allocation() {
        let devices = vec![inference("gpu", 10.0, 5)];

        let allocation = allocate(&[], &devices, 500).unwrap();

        assert!(allocation.is_empty());
        assert_eq!(allocation.expected_revenue, 0.0);
        assert_eq!(allocation.unallocated_power, 500);
        assert_eq!(allocation.market_timestamp, None);
    }

    #[test]
    fn test_zero_revenue_yields_empty_allocation() {
        let devices = vec![inference("gpu", 10.0, 5), miner("air", 100.0, 3)];
        let snapshots = vec![snapshot(0.0, 0.0, "t0"), snapshot(0.0, 0.0, "t1")];

        let allocation = allocate(&snapshots, &devices, 1_000).unwrap();

        assert!(allocation.is_empty());
        assert_eq!(allocation.unallocated_power, 1_000);
        assert_eq!(allocation.market_timestamp, None);
    }

    #[test]
    fn test_no_devices_yields_empty_allocation() {
        let snapshots = vec![snapshot(1.0, 1.0, "t0")];

        let allocation = allocate(&snapshots, &[], 1_000).unwrap();

        assert!(allocation.is_empty());
        assert_eq!(allocation.unallocated_power, 1_000);
    }

    #[test]
    fn test_zero_power_cap() {
        let devices = vec![miner("air", 1_000.0, 3_333)];
        let snapshots = vec![snapshot(0.0, 2.0, "t0")];

        let allocation = allocate(&snapshots, &devices, 0).unwrap();

        assert!(allocation.is_empty());
        assert_eq!(allocation.unallocated_power, 0);
    }

    #[test]
    fn test_device_larger_than_cap_is_skipped() {
        let devices = vec![miner("huge", 10_000.0, 2_000), miner("small", 1.0, 100)];
        let snapshots = vec![snapshot(0.0, 1.0, "t0")];

        let allocation = allocate(&snapshots, &devices, 1_000).unwrap();

        assert!(!allocation.units_by_device.contains_key("huge"));
        assert_eq!(allocation.units_by_device["small"], 10);
    }

    #[test]
    fn test_feasibility_never_exceeds_cap() {
        let devices = vec![
            miner("hydro", 10_000.0, 5_000),
            miner("air", 1_000.0, 3_333),
            inference("gpu", 1_000.0, 3_333),
            inference("asic", 5_000.0, 10_000),
            miner("immersion", 5_000.0, 10_000),
        ];
        let snapshots = vec![
            snapshot(1.0051279914607045, 1.6452360741024257, "t0"),
            snapshot(2.5, 0.3, "t1"),
            snapshot(0.01, 0.02, "t2"),
        ];

        for cap in [0_i64, 1, 3_332, 3_333, 9_999, 100_000, 1_000_000] {
            let allocation = allocate(&snapshots, &devices, cap).unwrap();
            let used = power_used(&allocation, &devices);
            assert!(used <= cap, "cap {cap} exceeded: used {used}");
            assert_eq!(allocation.unallocated_power, cap - used);
        }
    }

    #[test]
    fn test_zero_unit_entries_never_appear() {
        let devices = vec![miner("hydro", 10_000.0, 5_000), miner("immersion", 5_000.0, 10_000)];
        let snapshots = vec![snapshot(0.0, 1.0, "t0")];

        // hydro consumes the whole budget, immersion must not show up
        // with a zero entry.
        let allocation = allocate(&snapshots, &devices, 10_000).unwrap();

        assert_eq!(allocation.units_by_device.len(), 1);
        assert!(allocation.units_by_device.values().all(|&units| units > 0));
    }

    #[test]
    fn test_revenue_rounded_to_two_decimals() {
        let devices = vec![miner("air", 1_000.0, 3_333)];
        let snapshots = vec![snapshot(0.0, 1.6452360741024257, "t0")];

        let allocation = allocate(&snapshots, &devices, 10_000).unwrap();

        // 3 units * 1000 * 1.6452360741024257 = 4935.708222...
        assert_eq!(allocation.expected_revenue, 4935.71);
    }

    #[test]
    fn test_determinism_repeated_calls() {
        let devices = vec![
            miner("hydro", 10_000.0, 5_000),
            inference("asic", 5_000.0, 10_000),
            miner("air", 1_000.0, 3_333),
        ];
        let snapshots = vec![
            snapshot(1.0051279914607045, 1.6452360741024257, "t0"),
            snapshot(0.9, 1.1, "t1"),
        ];

        let first = allocate(&snapshots, &devices, 123_456).unwrap();
        let second = allocate(&snapshots, &devices, 123_456).unwrap();

        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_negative_power_cap_rejected() {
        let devices = vec![inference("gpu", 10.0, 5)];

        let err = allocate(&[], &devices, -1).unwrap_err();

        assert!(matches!(err, AllocationError::InvalidInput(_)));
    }

    #[test]
    fn test_non_positive_device_power_rejected() {
        for bad_power in [0, -5] {
            let devices = vec![inference("gpu", 10.0, bad_power)];
            let snapshots = vec![snapshot(1.0, 0.0, "t0")];

            let err = allocate(&snapshots, &devices, 100).unwrap_err();

            assert!(matches!(err, AllocationError::InvalidInput(_)));
        }
    }

    #[test]
    fn test_category_selects_price() {
        let devices = vec![inference("gpu", 100.0, 10), miner("rig", 100.0, 10)];

        // Only the token price is positive: the miner earns nothing and
        // the whole budget goes to inference.
        let token_only = allocate(&[snapshot(2.0, 0.0, "t0")], &devices, 100).unwrap();
        assert_eq!(token_only.units_by_device["gpu"], 10);
        assert!(!token_only.units_by_device.contains_key("rig"));

        let hash_only = allocate(&[snapshot(0.0, 2.0, "t0")], &devices, 100).unwrap();
        assert_eq!(hash_only.units_by_device["rig"], 10);
        assert!(!hash_only.units_by_device.contains_key("gpu"));
    }
}
