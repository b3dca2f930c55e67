//! Main entry point for the wattmix allocation service.
//!
//! Fetches the latest market prices, computes the revenue-maximizing
//! device mix under the configured power cap, and optionally applies it
//! to the live machine inventory. With a polling interval configured it
//! keeps re-optimizing on a loop.

use anyhow::Result;
use reqwest::Client;
use std::sync::Arc;
use tracing::{info, warn, Level};
use wattmix::optimizer::{
    AllocationEngine, ApiConfig, DeviceCatalog, MachineDispatcher, MarketDataSources,
    OptimizerConfig,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_max_level(Level::INFO)
        .init();

    info!("Starting wattmix allocation service");

    let (api_config, optimizer_config, watch) = load_config();
    if api_config.api_key.is_empty() {
        warn!("WATTMIX_API_KEY not set; upstream requests will be unauthenticated");
    }

    let catalog = match std::env::var("WATTMIX_CATALOG") {
        Ok(path) => {
            info!("Loading device catalog from {path}");
            DeviceCatalog::load(&path)?
        }
        Err(_) => DeviceCatalog::default(),
    };

    let http_client = Client::new();
    let data_sources = Arc::new(MarketDataSources::new(
        http_client.clone(),
        api_config.clone(),
    ));
    let dispatcher = Arc::new(MachineDispatcher::new(http_client, api_config));

    let engine = AllocationEngine::new(data_sources, dispatcher, &catalog, optimizer_config)?;

    if watch {
        engine.run().await;
    } else {
        let outcome = engine.run_once().await?;
        info!(
            "Cycle finished at {}: expected revenue {:.2}",
            outcome.evaluated_at.format("%Y-%m-%d %H:%M:%S"),
            outcome.allocation.expected_revenue
        );
    }

    Ok(())
}

/// Assemble configuration from environment overrides on top of the
/// defaults. Credentials live here, in an explicit config struct passed
/// to the I/O layer, never in module constants.
fn load_config() -> (ApiConfig, OptimizerConfig, bool) {
    let mut api_config = ApiConfig::default();
    if let Ok(url) = std::env::var("WATTMIX_API_URL") {
        api_config.base_url = url;
    }
    if let Ok(key) = std::env::var("WATTMIX_API_KEY") {
        api_config.api_key = key;
    }

    let mut optimizer_config = OptimizerConfig::default();
    if let Ok(cap) = std::env::var("WATTMIX_POWER_CAP") {
        match cap.parse::<i64>() {
            Ok(parsed) if parsed >= 0 => optimizer_config.power_cap = parsed,
            _ => warn!("Ignoring invalid WATTMIX_POWER_CAP '{cap}'"),
        }
    }
    optimizer_config.apply_allocations = std::env::var("WATTMIX_APPLY")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);

    let mut watch = false;
    if let Ok(interval) = std::env::var("WATTMIX_INTERVAL_SECS") {
        match interval.parse::<u64>() {
            Ok(parsed) if parsed > 0 => {
                optimizer_config.poll_interval_secs = parsed;
                watch = true;
            }
            _ => warn!("Ignoring invalid WATTMIX_INTERVAL_SECS '{interval}'"),
        }
    }

    (api_config, optimizer_config, watch)
}
