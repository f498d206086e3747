//! Download command implementation

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crypto_feed::cache;
use crypto_feed::source::GranularityResolver;
use crypto_feed::{Config, CryptoStore, DataFeed, LoadStatus};

use super::{exchange_client, open_cache, parse_date, FeedOverrides};

pub fn run(
    config_path: String,
    overrides: FeedOverrides,
    from: String,
    to: String,
    limit: u32,
    output: Option<String>,
) -> Result<()> {
    let mut config = Config::load_or_default(&config_path)?;
    overrides.apply(&mut config)?;

    let fromdate = parse_date(&from)?;
    let todate = parse_date(&to)?;
    if fromdate >= todate {
        anyhow::bail!("--from must be before --to");
    }

    let mut bar_cache = open_cache(&config)?;
    if bar_cache.is_none() && output.is_none() {
        anyhow::bail!("Nothing to write: configure a cache or pass --output");
    }

    // Always hit the exchange here; the cache is the destination, not the source
    let store = Arc::new(CryptoStore::new(exchange_client(&config)?));
    let granularity = store
        .source()
        .granularity(config.feed.timeframe, config.feed.compression)?;

    let mut params = config.feed.to_params();
    params.historical = true;
    params.ohlcv_limit = limit;
    let mut feed = store.feed(params);

    info!(
        "Downloading {} {} from {} to {}",
        config.feed.symbol, granularity, fromdate, todate
    );
    feed.start(Some(fromdate), Some(todate))?;

    let mut bars = Vec::new();
    while feed.load_next()? == LoadStatus::Delivered {
        if let Some(bar) = feed.current_bar() {
            bars.push(*bar);
        }
    }

    if bars.is_empty() {
        warn!("No data fetched for {}", config.feed.symbol);
        return Ok(());
    }
    info!("Total bars fetched: {}", bars.len());

    if let Some(bar_cache) = bar_cache.as_mut() {
        let stored = bar_cache
            .store(&config.feed.symbol, &granularity, &bars)
            .context("Failed to store bars in cache")?;
        info!("Stored {} bars in cache", stored);
    }

    if let Some(output) = output {
        cache::save_csv(&output, &bars).context("Failed to write CSV")?;
    }

    Ok(())
}
