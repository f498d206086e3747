//! Collaborators a feed pulls data from
//!
//! Exchange access, granularity naming and the optional historical cache are
//! separate seams so each can be swapped independently (a REST client in
//! production, scripted sources in tests).

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::error::FeedResult;
use crate::types::{Bar, RawBar, RawTrade, Timeframe};

/// Market data endpoints of an exchange
pub trait ExchangeSource {
    /// Fetch up to `limit` bars starting at `since` (ms). With no `since` the
    /// exchange picks its default window (usually the most recent bars).
    fn fetch_ohlcv(
        &self,
        instrument: &str,
        granularity: &str,
        since: Option<i64>,
        limit: u32,
        params: &BTreeMap<String, String>,
    ) -> FeedResult<Vec<RawBar>>;

    /// Fetch the most recent public trades, oldest first
    fn fetch_trades(&self, instrument: &str) -> FeedResult<Vec<RawTrade>>;
}

/// Maps a timeframe/compression pair to the exchange's native token ("1m", "4h", ...)
pub trait GranularityResolver {
    fn granularity(&self, timeframe: Timeframe, compression: u32) -> FeedResult<String>;
}

/// Locally stored bars that can stand in for network requests
pub trait HistoricalCache {
    fn query(
        &self,
        instrument: &str,
        granularity: &str,
        start: Option<DateTime<Utc>>,
        end: DateTime<Utc>,
    ) -> FeedResult<Vec<Bar>>;
}
