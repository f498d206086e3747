//! Core data types used across the feed

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, FeedResult};

/// Format of the `datetime` field on exchange trade records
pub const TRADE_DATETIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.fZ";

/// OHLCV bar keyed by its opening time in milliseconds since the epoch (UTC)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// Opening time as a UTC datetime, truncated to whole seconds
    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.timestamp.div_euclid(1000), 0)
    }
}

impl From<&Tick> for Bar {
    /// A tick fills every price line with the trade price and the volume with its size
    fn from(tick: &Tick) -> Self {
        Bar {
            timestamp: tick.time.timestamp_millis(),
            open: tick.price,
            high: tick.price,
            low: tick.price,
            close: tick.price,
            volume: tick.size,
        }
    }
}

/// A bar record as returned by an exchange, before validation.
///
/// Exchanges sometimes return rows with missing or unparsable fields. Any `None`
/// marks the whole record as incomplete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RawBar {
    pub timestamp: Option<i64>,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub volume: Option<f64>,
}

impl RawBar {
    pub fn complete(&self) -> Option<Bar> {
        Some(Bar {
            timestamp: self.timestamp?,
            open: self.open?,
            high: self.high?,
            low: self.low?,
            close: self.close?,
            volume: self.volume?,
        })
    }
}

impl From<Bar> for RawBar {
    fn from(bar: Bar) -> Self {
        RawBar {
            timestamp: Some(bar.timestamp),
            open: Some(bar.open),
            high: Some(bar.high),
            low: Some(bar.low),
            close: Some(bar.close),
            volume: Some(bar.volume),
        }
    }
}

/// A public trade as returned by an exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTrade {
    /// Exchange trade id, increasing per instrument
    pub id: u64,
    /// ISO-8601 UTC time with fractional seconds and a `Z` suffix
    pub datetime: String,
    pub price: f64,
    pub amount: f64,
}

impl RawTrade {
    pub fn to_tick(&self) -> FeedResult<Tick> {
        let time = NaiveDateTime::parse_from_str(&self.datetime, TRADE_DATETIME_FORMAT)
            .map_err(|source| FeedError::InvalidTradeTime {
                value: self.datetime.clone(),
                source,
            })?
            .and_utc();

        Ok(Tick {
            time,
            price: self.price,
            size: self.amount,
        })
    }
}

/// A single trade waiting to be delivered
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    pub time: DateTime<Utc>,
    pub price: f64,
    pub size: f64,
}

/// Entry of the feed's pending queue
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Pending {
    Bar(Bar),
    Tick(Tick),
}

impl Pending {
    /// Render the entry into a working bar
    pub fn to_bar(&self) -> Bar {
        match self {
            Pending::Bar(bar) => *bar,
            Pending::Tick(tick) => Bar::from(tick),
        }
    }
}

/// Abstract timeframe unit; paired with a compression factor to form a granularity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Ticks,
    Seconds,
    Minutes,
    Days,
    Weeks,
    Months,
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Timeframe::Ticks => "ticks",
            Timeframe::Seconds => "seconds",
            Timeframe::Minutes => "minutes",
            Timeframe::Days => "days",
            Timeframe::Weeks => "weeks",
            Timeframe::Months => "months",
        };
        f.write_str(name)
    }
}

impl FromStr for Timeframe {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ticks" | "tick" => Ok(Timeframe::Ticks),
            "seconds" | "second" | "s" => Ok(Timeframe::Seconds),
            "minutes" | "minute" | "m" => Ok(Timeframe::Minutes),
            "days" | "day" | "d" => Ok(Timeframe::Days),
            "weeks" | "week" | "w" => Ok(Timeframe::Weeks),
            "months" | "month" | "mo" => Ok(Timeframe::Months),
            other => Err(format!("unknown timeframe: {}", other)),
        }
    }
}

/// Outcome of a single `load_next` call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// A record was delivered into the working bar
    Delivered,
    /// The stream has ended (historical-only mode)
    NoMoreData,
    /// Nothing queued right now; try again later
    NoDataYet,
}

/// Lifecycle of a feed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedState {
    Live,
    HistoricalBackfill,
    Finished,
}

/// Status changes a feed reports to its consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedNotification {
    /// Delivering historical data ahead of live operation
    Delayed,
    Live,
    /// Historical-only stream is over
    Disconnected,
}
