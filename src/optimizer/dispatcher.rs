//! Allocation sink: pushes a computed best mix to the machines API.
//!
//! This is a fire-and-forget push; the allocator never consults the
//! result. An empty mix is never pushed.

use crate::optimizer::types::ApiConfig;
use crate::types::Allocation;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Contract for anything that can apply an allocation to a live
/// machine inventory.
#[async_trait]
pub trait AllocationSink: Send + Sync {
    /// Apply the allocation's unit counts. Returns the upstream
    /// response body when a push happened, `None` when the mix was
    /// empty and nothing was sent.
    async fn apply_allocation(&self, allocation: &Allocation) -> Result<Option<serde_json::Value>>;
}

/// Pushes unit counts to the upstream machines resource.
pub struct MachineDispatcher {
    http_client: Client,
    config: ApiConfig,
}

impl MachineDispatcher {
    /// Create a new dispatcher from an explicit configuration.
    pub fn new(http_client: Client, config: ApiConfig) -> Self {
        Self {
            http_client,
            config,
        }
    }
}

#[async_trait]
impl AllocationSink for MachineDispatcher {
    #[instrument(skip(self, allocation), fields(devices = allocation.units_by_device.len()))]
    async fn apply_allocation(&self, allocation: &Allocation) -> Result<Option<serde_json::Value>> {
        if allocation.is_empty() {
            warn!("Empty allocation, skipping machines update");
            return Ok(None);
        }

        let response = self
            .http_client
            .put(self.config.machines_url())
            .header("X-Api-Key", &self.config.api_key)
            .json(&allocation.units_by_device)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .context("Failed to update machines")?;

        if !response.status().is_success() {
            return Err(anyhow!("Machines API returned {}", response.status()));
        }

        let body = response
            .json::<serde_json::Value>()
            .await
            .context("Failed to parse machines update response")?;

        info!(
            "Applied allocation of {} device types at {}",
            allocation.units_by_device.len(),
            chrono::Utc::now().format("%Y-%m-%d %H:%M:%S"),
        );
        Ok(Some(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::optimizer::types::ApiConfig;

    #[tokio::test]
    async fn test_empty_allocation_is_never_pushed() {
        // Points at the default remote, but an empty mix must short
        // circuit before any request is made.
        let dispatcher = MachineDispatcher::new(Client::new(), ApiConfig::default());
        let empty = Allocation::empty(1_000_000);

        let result = dispatcher.apply_allocation(&empty).await.unwrap();

        assert!(result.is_none());
    }
}
