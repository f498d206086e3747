//! Stream command implementation

use anyhow::Result;
use std::thread::sleep;
use tracing::{debug, info};

use crypto_feed::{DataFeed, LoadStatus, Timeframe};

use super::{build_store, parse_date, FeedOverrides};
use crypto_feed::Config;

pub fn run(
    config_path: String,
    overrides: FeedOverrides,
    from: Option<String>,
    to: Option<String>,
    ticks: bool,
    historical: bool,
) -> Result<()> {
    let mut config = Config::load_or_default(&config_path)?;
    overrides.apply(&mut config)?;
    if ticks {
        config.feed.timeframe = Timeframe::Ticks;
    }
    if historical {
        config.feed.historical = true;
    }

    let fromdate = from.as_deref().map(parse_date).transpose()?;
    let todate = to.as_deref().map(parse_date).transpose()?;

    let store = build_store(&config)?;
    let mut feed = store.feed(config.feed.to_params());

    info!(
        "Starting {} feed: {} x{}",
        config.feed.symbol, config.feed.timeframe, config.feed.compression
    );
    feed.start(fromdate, todate)?;

    let mut delivered = 0usize;
    loop {
        match feed.load_next()? {
            LoadStatus::Delivered => {
                delivered += 1;
                if let Some(bar) = feed.current_bar() {
                    info!(
                        "{} {} O:{} H:{} L:{} C:{} V:{}",
                        config.feed.symbol,
                        bar.datetime()
                            .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                            .unwrap_or_else(|| bar.timestamp.to_string()),
                        bar.open,
                        bar.high,
                        bar.low,
                        bar.close,
                        bar.volume
                    );
                }
            }
            LoadStatus::NoDataYet => {
                debug!("No data yet, waiting {}s", config.poll_interval_secs);
                sleep(config.poll_interval());
            }
            LoadStatus::NoMoreData => {
                info!("Feed finished after {} records", delivered);
                break;
            }
        }

        for notification in feed.take_notifications() {
            debug!("Notification: {:?}", notification);
        }
    }

    Ok(())
}
