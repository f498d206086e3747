//! Configuration management
//!
//! Loads the JSON configuration file. Every section has defaults so a partial
//! (or empty) file is valid; the exchange base URL can be overridden from the
//! environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::exchange::DEFAULT_BASE_URL;
use crate::feed::{FeedParams, DEFAULT_OHLCV_LIMIT};
use crate::Timeframe;

pub const BASE_URL_ENV: &str = "CRYPTO_FEED_BASE_URL";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub exchange: ExchangeConfig,
    #[serde(default)]
    pub feed: FeedConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<CacheConfig>,
    /// Seconds to wait after a load returned no data
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
}

fn default_poll_interval() -> u64 {
    5
}

impl Default for Config {
    fn default() -> Self {
        Config {
            exchange: ExchangeConfig::default(),
            feed: FeedConfig::default(),
            cache: None,
            poll_interval_secs: default_poll_interval(),
        }
    }
}

impl Config {
    /// Load configuration from JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let mut config: Config =
            serde_json::from_str(&contents).context("Failed to parse config JSON")?;

        config.apply_env();
        Ok(config)
    }

    /// Load from `path` if it exists, otherwise start from defaults
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        if path.as_ref().exists() {
            Self::from_file(path)
        } else {
            let mut config = Config::default();
            config.apply_env();
            Ok(config)
        }
    }

    fn apply_env(&mut self) {
        if let Ok(base_url) = std::env::var(BASE_URL_ENV) {
            self.exchange.base_url = base_url;
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Exchange configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExchangeConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        ExchangeConfig {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
        }
    }
}

impl ExchangeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Feed configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedConfig {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub compression: u32,
    pub historical: bool,
    pub backfill_start: bool,
    pub ohlcv_limit: u32,
    pub drop_newest: bool,
    pub debug: bool,
    pub fetch_ohlcv_params: BTreeMap<String, String>,
}

impl Default for FeedConfig {
    fn default() -> Self {
        FeedConfig {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::Minutes,
            compression: 1,
            historical: false,
            backfill_start: false,
            ohlcv_limit: DEFAULT_OHLCV_LIMIT,
            drop_newest: false,
            debug: false,
            fetch_ohlcv_params: BTreeMap::new(),
        }
    }
}

impl FeedConfig {
    pub fn to_params(&self) -> FeedParams {
        FeedParams {
            historical: self.historical,
            backfill_start: self.backfill_start,
            fetch_ohlcv_params: self.fetch_ohlcv_params.clone(),
            ohlcv_limit: self.ohlcv_limit,
            drop_newest: self.drop_newest,
            debug: self.debug,
            ..FeedParams::new(self.symbol.clone(), self.timeframe, self.compression)
        }
    }
}

/// Historical cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub path: String,
}
