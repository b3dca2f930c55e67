//! Configuration types for the optimizer subsystem.
//!
//! Credentials and endpoints travel in an explicit config struct handed
//! to the I/O layer at construction time; nothing in this crate reads
//! process-wide constants, and the allocator itself never sees any of
//! this.

use serde::{Deserialize, Serialize};

/// Configuration for the upstream market/site/machine API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the upstream API
    pub base_url: String,
    /// API key sent as `X-Api-Key` on every request
    pub api_key: String,
    /// Per-request timeout in seconds
    pub request_timeout_secs: u64,
    /// Retry attempts for upstream fetches
    pub retry_attempts: usize,
    /// Rate limit for upstream requests per second
    pub rate_limit_requests_per_second: u32,
    /// TTL for the cached price response, in seconds
    pub price_cache_ttl_seconds: u64,
}

impl ApiConfig {
    /// Full URL of the prices resource.
    pub fn prices_url(&self) -> String {
        format!("{}/prices", self.base_url)
    }

    /// Full URL of the sites resource.
    pub fn sites_url(&self) -> String {
        format!("{}/sites", self.base_url)
    }

    /// Full URL of the machines resource.
    pub fn machines_url(&self) -> String {
        format!("{}/machines", self.base_url)
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "https://mara-hackathon-api.onrender.com".to_string(),
            api_key: String::new(),
            request_timeout_secs: 10,
            retry_attempts: 3,
            rate_limit_requests_per_second: 5,
            price_cache_ttl_seconds: 30,
        }
    }
}

/// Configuration for the allocation engine itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptimizerConfig {
    /// Total power budget for one optimization run, in watts
    pub power_cap: i64,
    /// Whether computed allocations are pushed to the machines API
    pub apply_allocations: bool,
    /// Polling interval for the continuous run loop, in seconds
    pub poll_interval_secs: u64,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            power_cap: 1_000_000,
            apply_allocations: false,
            poll_interval_secs: 60,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_api_config_urls() {
        let config = ApiConfig::default();

        assert_eq!(
            config.prices_url(),
            "https://mara-hackathon-api.onrender.com/prices"
        );
        assert_eq!(
            config.sites_url(),
            "https://mara-hackathon-api.onrender.com/sites"
        );
        assert_eq!(
            config.machines_url(),
            "https://mara-hackathon-api.onrender.com/machines"
        );
    }

    #[test]
    fn test_default_optimizer_config() {
        let config = OptimizerConfig::default();

        assert_eq!(config.power_cap, 1_000_000);
        assert!(!config.apply_allocations);
    }
}
