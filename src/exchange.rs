//! Binance-compatible public market data client
//!
//! Blocking HTTP client for the klines and recent-trades endpoints. Requests are
//! issued one at a time from the caller's thread; there is no retry layer.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat};
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{FeedError, FeedResult};
use crate::source::{ExchangeSource, GranularityResolver};
use crate::types::{RawBar, RawTrade, Timeframe};

pub const DEFAULT_BASE_URL: &str = "https://api.binance.com";
const KLINES_PATH: &str = "/api/v3/klines";
const TRADES_PATH: &str = "/api/v3/trades";
const TRADES_LIMIT: u32 = 50;

/// Supported (timeframe, compression) pairs and their interval tokens
const GRANULARITIES: &[(Timeframe, u32, &str)] = &[
    (Timeframe::Seconds, 1, "1s"),
    (Timeframe::Minutes, 1, "1m"),
    (Timeframe::Minutes, 3, "3m"),
    (Timeframe::Minutes, 5, "5m"),
    (Timeframe::Minutes, 15, "15m"),
    (Timeframe::Minutes, 30, "30m"),
    (Timeframe::Minutes, 60, "1h"),
    (Timeframe::Minutes, 120, "2h"),
    (Timeframe::Minutes, 240, "4h"),
    (Timeframe::Minutes, 360, "6h"),
    (Timeframe::Minutes, 480, "8h"),
    (Timeframe::Minutes, 720, "12h"),
    (Timeframe::Days, 1, "1d"),
    (Timeframe::Days, 3, "3d"),
    (Timeframe::Weeks, 1, "1w"),
    (Timeframe::Months, 1, "1M"),
];

#[derive(Debug, Clone)]
pub struct BinanceClient {
    client: reqwest::blocking::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct TradeResponse {
    id: u64,
    price: String,
    qty: String,
    time: i64,
}

impl BinanceClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> FeedResult<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<T: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &[(String, String)],
    ) -> FeedResult<T> {
        let url = format!("{}{}", self.base_url, path);
        debug!("GET {} {:?}", url, query);

        let response = self.client.get(&url).query(query).send()?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(FeedError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json()
            .map_err(|e| FeedError::Decode(e.to_string()))
    }
}

impl ExchangeSource for BinanceClient {
    fn fetch_ohlcv(
        &self,
        instrument: &str,
        granularity: &str,
        since: Option<i64>,
        limit: u32,
        params: &BTreeMap<String, String>,
    ) -> FeedResult<Vec<RawBar>> {
        let query = klines_query(instrument, granularity, since, limit, params);
        let rows: Vec<Vec<Value>> = self.get(KLINES_PATH, &query)?;
        Ok(rows.iter().map(|row| parse_kline(row)).collect())
    }

    fn fetch_trades(&self, instrument: &str) -> FeedResult<Vec<RawTrade>> {
        let query = vec![
            ("symbol".to_string(), instrument.to_string()),
            ("limit".to_string(), TRADES_LIMIT.to_string()),
        ];

        let trades: Vec<TradeResponse> = self.get(TRADES_PATH, &query)?;
        trades.into_iter().map(to_raw_trade).collect()
    }
}

impl GranularityResolver for BinanceClient {
    fn granularity(&self, timeframe: Timeframe, compression: u32) -> FeedResult<String> {
        resolve_granularity(timeframe, compression)
    }
}

pub fn resolve_granularity(timeframe: Timeframe, compression: u32) -> FeedResult<String> {
    GRANULARITIES
        .iter()
        .find(|(tf, c, _)| *tf == timeframe && *c == compression)
        .map(|(_, _, token)| token.to_string())
        .ok_or(FeedError::UnsupportedGranularity {
            timeframe,
            compression,
        })
}

/// Query string for the klines endpoint; extra params are appended as given
fn klines_query(
    instrument: &str,
    granularity: &str,
    since: Option<i64>,
    limit: u32,
    params: &BTreeMap<String, String>,
) -> Vec<(String, String)> {
    let mut query = vec![
        ("symbol".to_string(), instrument.to_string()),
        ("interval".to_string(), granularity.to_string()),
        ("limit".to_string(), limit.to_string()),
    ];
    if let Some(since) = since {
        query.push(("startTime".to_string(), since.to_string()));
    }
    query.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));
    query
}

/// `[openTime, "open", "high", "low", "close", "volume", ...]`
fn parse_kline(row: &[Value]) -> RawBar {
    RawBar {
        timestamp: row.first().and_then(Value::as_i64),
        open: number(row.get(1)),
        high: number(row.get(2)),
        low: number(row.get(3)),
        close: number(row.get(4)),
        volume: number(row.get(5)),
    }
}

fn number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::String(s) => s.parse().ok(),
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
}

fn to_raw_trade(trade: TradeResponse) -> FeedResult<RawTrade> {
    let datetime = DateTime::from_timestamp_millis(trade.time)
        .ok_or_else(|| FeedError::Decode(format!("trade {} time out of range", trade.id)))?
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let price = trade
        .price
        .parse()
        .map_err(|_| FeedError::Decode(format!("trade {} price: {}", trade.id, trade.price)))?;
    let amount = trade
        .qty
        .parse()
        .map_err(|_| FeedError::Decode(format!("trade {} qty: {}", trade.id, trade.qty)))?;

    Ok(RawTrade {
        id: trade.id,
        datetime,
        price,
        amount,
    })
}
