//! Import command implementation

use anyhow::{Context, Result};
use tracing::info;

use crypto_feed::cache;
use crypto_feed::Config;

use super::open_cache;

pub fn run(config_path: String, symbol: String, granularity: String, input: String) -> Result<()> {
    let config = Config::load_or_default(&config_path)?;
    let mut bar_cache = open_cache(&config)?
        .context("No cache configured: set \"cache\": { \"path\": ... } in the config file")?;

    let mut bars = cache::load_csv(&input).with_context(|| format!("Failed to load {}", input))?;
    bars.sort_by_key(|bar| bar.timestamp);
    bars.dedup_by_key(|bar| bar.timestamp);

    let stored = bar_cache.store(&symbol, &granularity, &bars)?;
    info!("Imported {} {} {} bars from {}", stored, symbol, granularity, input);

    Ok(())
}
