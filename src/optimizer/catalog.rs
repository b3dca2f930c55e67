//! Device catalog configuration.
//!
//! The catalog is the static hardware inventory the allocator chooses
//! from: inference accelerators keyed by name with a token output rate,
//! and miners keyed by name with a hashrate. Categories are explicit
//! here; nothing is ever derived from name suffixes, and a name present
//! in both categories is rejected up front so allocation keys stay
//! unambiguous.

use crate::optimizer::allocator::AllocationError;
use crate::types::{DeviceCategory, DeviceType};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Spec of one inference accelerator model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceSpec {
    /// Tokens produced per unit
    pub tokens: f64,
    /// Power drawn by one unit, in watts
    pub power: i64,
}

/// Spec of one miner model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinerSpec {
    /// Hashrate per unit
    pub hashrate: f64,
    /// Power drawn by one unit, in watts
    pub power: i64,
}

/// Static hardware catalog, supplied by configuration and never mutated
/// by the optimizer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCatalog {
    /// Inference accelerators keyed by model name
    pub inference: BTreeMap<String, InferenceSpec>,
    /// Mining hardware keyed by model name
    pub miners: BTreeMap<String, MinerSpec>,
}

impl DeviceCatalog {
    /// Parse a catalog from its JSON configuration form.
    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let catalog: DeviceCatalog = serde_json::from_str(json)?;
        Ok(catalog)
    }

    /// Load a catalog from a JSON file, for deployments overriding the
    /// reference hardware.
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read catalog file {}", path.as_ref().display()))?;
        Self::from_json(&contents)
    }

    /// Validate the catalog and flatten it into the device list the
    /// allocator consumes: inference entries first, then miners, each
    /// category in name order. This order is deterministic and is what
    /// the allocator's stable tie-break operates on.
    pub fn device_types(&self) -> Result<Vec<DeviceType>, AllocationError> {
        self.validate()?;

        let mut devices = Vec::with_capacity(self.inference.len() + self.miners.len());

        for (name, spec) in &self.inference {
            devices.push(DeviceType {
                name: name.clone(),
                category: DeviceCategory::Inference,
                output_rate: spec.tokens,
                power_per_unit: spec.power,
            });
        }
        for (name, spec) in &self.miners {
            devices.push(DeviceType {
                name: name.clone(),
                category: DeviceCategory::Miner,
                output_rate: spec.hashrate,
                power_per_unit: spec.power,
            });
        }

        Ok(devices)
    }

    /// Fail fast on specs the allocator would choke on: non-positive
    /// power or output rates, and device names shared between the two
    /// categories (which would make allocation keys ambiguous).
    pub fn validate(&self) -> Result<(), AllocationError> {
        for (name, spec) in &self.inference {
            if spec.power <= 0 {
                return Err(AllocationError::InvalidInput(format!(
                    "inference device '{name}' has non-positive power ({})",
                    spec.power
                )));
            }
            if spec.tokens <= 0.0 {
                return Err(AllocationError::InvalidInput(format!(
                    "inference device '{name}' has non-positive token rate ({})",
                    spec.tokens
                )));
            }
        }
        for (name, spec) in &self.miners {
            if spec.power <= 0 {
                return Err(AllocationError::InvalidInput(format!(
                    "miner '{name}' has non-positive power ({})",
                    spec.power
                )));
            }
            if spec.hashrate <= 0.0 {
                return Err(AllocationError::InvalidInput(format!(
                    "miner '{name}' has non-positive hashrate ({})",
                    spec.hashrate
                )));
            }
            if self.inference.contains_key(name) {
                return Err(AllocationError::InvalidInput(format!(
                    "device name '{name}' appears in both inference and miners"
                )));
            }
        }
        Ok(())
    }

    /// Total number of device models across both categories.
    pub fn len(&self) -> usize {
        self.inference.len() + self.miners.len()
    }

    /// Whether the catalog holds no devices at all.
    pub fn is_empty(&self) -> bool {
        self.inference.is_empty() && self.miners.is_empty()
    }
}

impl Default for DeviceCatalog {
    /// The reference deployment's hardware catalog.
    fn default() -> Self {
        let mut inference = BTreeMap::new();
        inference.insert(
            "gpu".to_string(),
            InferenceSpec {
                tokens: 1_000.0,
                power: 3_333,
            },
        );
        inference.insert(
            "asic".to_string(),
            InferenceSpec {
                tokens: 5_000.0,
                power: 10_000,
            },
        );

        let mut miners = BTreeMap::new();
        miners.insert(
            "air".to_string(),
            MinerSpec {
                hashrate: 1_000.0,
                power: 3_333,
            },
        );
        miners.insert(
            "hydro".to_string(),
            MinerSpec {
                hashrate: 10_000.0,
                power: 5_000,
            },
        );
        miners.insert(
            "immersion".to_string(),
            MinerSpec {
                hashrate: 5_000.0,
                power: 10_000,
            },
        );

        Self { inference, miners }
    }
}
