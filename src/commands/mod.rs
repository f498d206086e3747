//! Subcommand implementations

pub mod download;
pub mod import;
pub mod stream;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tracing::info;

use crypto_feed::cache::SqliteBarCache;
use crypto_feed::exchange::BinanceClient;
use crypto_feed::{Config, CryptoStore, Timeframe};

/// Feed settings given on the command line
#[derive(Debug)]
pub struct FeedOverrides {
    pub symbol: Option<String>,
    pub timeframe: Option<String>,
    pub compression: Option<u32>,
}

impl FeedOverrides {
    pub fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(symbol) = self.symbol {
            info!("Overriding symbol to: {}", symbol);
            config.feed.symbol = symbol;
        }
        if let Some(timeframe) = self.timeframe {
            config.feed.timeframe = timeframe
                .parse::<Timeframe>()
                .map_err(anyhow::Error::msg)?;
        }
        if let Some(compression) = self.compression {
            config.feed.compression = compression;
        }
        Ok(())
    }
}

/// Parse `YYYY-MM-DD` (midnight UTC) or an RFC 3339 timestamp
pub fn parse_date(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|ndt| ndt.and_utc())
        .with_context(|| format!("Failed to parse date: {}", value))
}

pub fn exchange_client(config: &Config) -> Result<BinanceClient> {
    info!("Exchange: {}", config.exchange.base_url);
    BinanceClient::new(&config.exchange.base_url, config.exchange.timeout())
        .context("Failed to build HTTP client")
}

pub fn open_cache(config: &Config) -> Result<Option<SqliteBarCache>> {
    config
        .cache
        .as_ref()
        .map(|cache| {
            SqliteBarCache::open(&cache.path)
                .with_context(|| format!("Failed to open bar cache: {}", cache.path))
        })
        .transpose()
}

/// Store over the configured exchange, reading from the bar cache when one is configured
pub fn build_store(config: &Config) -> Result<Arc<CryptoStore<BinanceClient>>> {
    let mut store = CryptoStore::new(exchange_client(config)?);
    if let Some(cache) = open_cache(config)? {
        store = store.with_cache(cache);
    }
    Ok(Arc::new(store))
}
