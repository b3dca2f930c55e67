//! Data sources for fetching market, site, and machine information.
//!
//! This module handles all external data fetching for the optimizer:
//! price observations, site metadata, and the live machine inventory,
//! with retry logic, rate limiting, and short-lived caching. Transport
//! failures never escape to the allocator; the price feed substitutes a
//! documented fallback snapshot instead.

use crate::optimizer::types::ApiConfig;
use crate::types::MarketSnapshot;
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use moka::future::Cache;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use tokio_retry::{strategy::ExponentialBackoff, Retry};
use tracing::{debug, instrument};

/// One raw price observation as served by the upstream API. The energy
/// price is carried on the wire but not consumed by the allocator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceObservation {
    #[serde(default)]
    pub hash_price: f64,
    #[serde(default)]
    pub token_price: f64,
    #[serde(default)]
    pub energy_price: f64,
    #[serde(default)]
    pub timestamp: String,
}

impl From<PriceObservation> for MarketSnapshot {
    fn from(observation: PriceObservation) -> Self {
        MarketSnapshot {
            token_price: observation.token_price,
            hash_price: observation.hash_price,
            timestamp: observation.timestamp,
        }
    }
}

/// Site metadata as served by the upstream API. The optimizer only
/// logs this; none of it feeds the allocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteInfo {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub power: Option<i64>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// The documented substitute snapshot used when the price API is
/// unreachable. Matches the reference deployment's fallback observation.
pub fn fallback_snapshot() -> MarketSnapshot {
    MarketSnapshot {
        token_price: 1.0051279914607045,
        hash_price: 1.6452360741024257,
        timestamp: "2025-06-21T19:50:00".to_string(),
    }
}

/// Contract for anything that can supply market snapshots to the
/// allocation engine. Transport failures surface as errors here; the
/// engine translates them into the documented fallback before the
/// allocator runs.
#[async_trait]
pub trait PriceFeed: Send + Sync {
    /// Latest market snapshots, newest first as served upstream.
    async fn latest_prices(&self) -> Result<Vec<MarketSnapshot>>;
}

/// Upstream API client for prices, site data, and machine inventory.
pub struct MarketDataSources {
    http_client: Client,
    config: ApiConfig,
    limiter: DefaultDirectRateLimiter,
    price_cache: Cache<&'static str, Arc<Vec<MarketSnapshot>>>,
}

impl MarketDataSources {
    /// Create a new data sources client from an explicit configuration.
    pub fn new(http_client: Client, config: ApiConfig) -> Self {
        let quota = Quota::per_second(
            NonZeroU32::new(config.rate_limit_requests_per_second)
                .unwrap_or(NonZeroU32::new(1).unwrap()),
        );
        let price_cache = Cache::builder()
            .max_capacity(8)
            .time_to_live(Duration::from_secs(config.price_cache_ttl_seconds))
            .build();

        Self {
            http_client,
            config,
            limiter: RateLimiter::direct(quota),
            price_cache,
        }
    }

    /// Fetch the latest price observations, with caching and retries.
    #[instrument(skip(self))]
    pub async fn fetch_prices(&self) -> Result<Vec<MarketSnapshot>> {
        if let Some(cached) = self.price_cache.get("prices").await {
            debug!("Serving {} cached price snapshots", cached.len());
            return Ok((*cached).clone());
        }

        let retry_strategy = ExponentialBackoff::from_millis(100)
            .max_delay(Duration::from_secs(5))
            .take(self.config.retry_attempts);

        let observations = Retry::spawn(retry_strategy, || self.fetch_prices_once()).await?;
        let snapshots: Vec<MarketSnapshot> =
            observations.into_iter().map(MarketSnapshot::from).collect();

        self.price_cache
            .insert("prices", Arc::new(snapshots.clone()))
            .await;

        debug!("Fetched {} price snapshots", snapshots.len());
        Ok(snapshots)
    }

    /// One uncached, unretried GET of the prices resource.
    async fn fetch_prices_once(&self) -> Result<Vec<PriceObservation>> {
        self.limiter.until_ready().await;

        let response = self
            .http_client
            .get(self.config.prices_url())
            .header("X-Api-Key", &self.config.api_key)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .context("Failed to fetch prices")?;

        if !response.status().is_success() {
            return Err(anyhow!("Price API returned {}", response.status()));
        }

        response
            .json::<Vec<PriceObservation>>()
            .await
            .context("Failed to parse price observations")
    }

    /// Fetch site metadata. Pass-through; nothing here feeds the
    /// allocation.
    #[instrument(skip(self))]
    pub async fn fetch_site(&self) -> Result<SiteInfo> {
        self.limiter.until_ready().await;

        let response = self
            .http_client
            .get(self.config.sites_url())
            .header("X-Api-Key", &self.config.api_key)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .context("Failed to fetch site")?;

        if !response.status().is_success() {
            return Err(anyhow!("Site API returned {}", response.status()));
        }

        response.json::<SiteInfo>().await.context("Failed to parse site")
    }

    /// Fetch the live machine inventory as served upstream.
    #[instrument(skip(self))]
    pub async fn fetch_machines(&self) -> Result<serde_json::Value> {
        self.limiter.until_ready().await;

        let response = self
            .http_client
            .get(self.config.machines_url())
            .header("X-Api-Key", &self.config.api_key)
            .timeout(Duration::from_secs(self.config.request_timeout_secs))
            .send()
            .await
            .context("Failed to fetch machines")?;

        if !response.status().is_success() {
            return Err(anyhow!("Machines API returned {}", response.status()));
        }

        response
            .json::<serde_json::Value>()
            .await
            .context("Failed to parse machines")
    }
}

#[async_trait]
impl PriceFeed for MarketDataSources {
    async fn latest_prices(&self) -> Result<Vec<MarketSnapshot>> {
        self.fetch_prices().await
    }
}
