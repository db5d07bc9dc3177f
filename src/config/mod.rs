//! Configuration management for the price feed
//!
//! Loads from TOML files + environment variables via .env

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use ethers::types::Address;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::oracle::{
    FeedParams, FeedSettings, PRIMARY_TIMEOUT_SECS, SECONDARY_BROKEN_SECS, SECONDARY_FROZEN_SECS,
};

/// Main application configuration
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub oracle: OracleConfig,
    pub sources: SourcesConfig,
    pub persistence: PersistenceConfig,
    pub logging: LoggingConfig,
    pub dashboard: DashboardConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OracleConfig {
    /// Base asset symbol queried from the secondary (e.g. ETH)
    pub base_symbol: String,
    /// Quote asset symbol queried from the secondary (e.g. USD)
    pub quote_symbol: String,
    /// Primary freeze timeout in seconds
    pub primary_timeout_secs: u64,
    /// Max primary move between consecutive rounds (0.5 = 50%)
    pub max_round_deviation: Decimal,
    /// Max difference between sources to call them similar (0.05 = 5%)
    pub max_source_difference: Decimal,
    /// Secondary counts as frozen past this age in seconds
    pub secondary_frozen_secs: u64,
    /// Secondary counts as broken past this age in seconds
    pub secondary_broken_secs: u64,
    /// How often the service requests a price
    pub poll_interval_secs: u64,
    /// Notification channel capacity
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SourcesConfig {
    /// JSON-RPC endpoint both contracts are read through
    pub rpc_url: String,
    /// Chainlink AggregatorV3 contract
    pub primary_address: String,
    /// Band StdReference contract
    pub secondary_address: String,
    /// Per-call timeout enforced by the adapters
    pub call_timeout_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PersistenceConfig {
    /// Data directory
    pub data_dir: String,
    /// Enable the CSV event journal
    pub journal_enabled: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON log lines
    pub json: bool,
    /// Filter used when RUST_LOG is not set
    pub filter: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    /// Listen address for the dashboard API
    pub bind: String,
}

impl AppConfig {
    /// Load configuration from file and environment
    pub fn load() -> Result<Self> {
        // Load .env file first
        dotenvy::dotenv().ok();

        let config = Self::builder()?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name("config/local").required(false))
            // Override with environment variables (PRICEFEED_*)
            .add_source(Environment::with_prefix("PRICEFEED").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        let app_config: AppConfig = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        Ok(app_config)
    }

    /// Defaults only, without files or environment
    pub fn defaults() -> Result<Self> {
        Self::builder()?
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        Ok(Config::builder()
            // Oracle defaults
            .set_default("oracle.base_symbol", "ETH")?
            .set_default("oracle.quote_symbol", "USD")?
            .set_default("oracle.primary_timeout_secs", PRIMARY_TIMEOUT_SECS as i64)?
            .set_default("oracle.max_round_deviation", "0.5")?
            .set_default("oracle.max_source_difference", "0.05")?
            .set_default("oracle.secondary_frozen_secs", SECONDARY_FROZEN_SECS as i64)?
            .set_default("oracle.secondary_broken_secs", SECONDARY_BROKEN_SECS as i64)?
            .set_default("oracle.poll_interval_secs", 60)?
            .set_default("oracle.event_capacity", 256)?
            // Source defaults
            .set_default("sources.rpc_url", "http://127.0.0.1:8545")?
            .set_default(
                "sources.primary_address",
                "0x5f4eC3Df9cbd43714FE2740f5E3616155c5b8419",
            )?
            .set_default(
                "sources.secondary_address",
                "0xDA7a001b254CD22e46d3eAB04d937489c93174C3",
            )?
            .set_default("sources.call_timeout_ms", 5000)?
            // Persistence defaults
            .set_default("persistence.data_dir", "./data")?
            .set_default("persistence.journal_enabled", true)?
            // Logging defaults
            .set_default("logging.json", false)?
            .set_default("logging.filter", "info")?
            // Dashboard defaults
            .set_default("dashboard.bind", "127.0.0.1:8088")?)
    }

    /// Feed thresholds and symbols derived from the oracle section
    pub fn feed_settings(&self) -> Result<FeedSettings> {
        let params = FeedParams::from_config(&self.oracle)?;
        Ok(FeedSettings {
            params,
            base_symbol: self.oracle.base_symbol.clone(),
            quote_symbol: self.oracle.quote_symbol.clone(),
            event_capacity: self.oracle.event_capacity,
        })
    }

    /// Generate a digest of the config for logging
    pub fn digest(&self) -> String {
        format!(
            "pair={}/{} primary_timeout={}s round_dev={} source_diff={} secondary_frozen={}s secondary_broken={}s poll={}s",
            self.oracle.base_symbol,
            self.oracle.quote_symbol,
            self.oracle.primary_timeout_secs,
            self.oracle.max_round_deviation,
            self.oracle.max_source_difference,
            self.oracle.secondary_frozen_secs,
            self.oracle.secondary_broken_secs,
            self.oracle.poll_interval_secs,
        )
    }
}

impl SourcesConfig {
    pub fn primary_address(&self) -> Result<Address> {
        self.primary_address
            .parse()
            .with_context(|| format!("Invalid primary_address '{}'", self.primary_address))
    }

    pub fn secondary_address(&self) -> Result<Address> {
        self.secondary_address
            .parse()
            .with_context(|| format!("Invalid secondary_address '{}'", self.secondary_address))
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

impl std::fmt::Display for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.digest())
    }
}
