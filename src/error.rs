//! Feed error types

use thiserror::Error;

use crate::types::Timeframe;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("network error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("exchange returned status {status}: {body}")]
    Api { status: u16, body: String },

    #[error("failed to decode exchange response: {0}")]
    Decode(String),

    #[error("cache error: {0}")]
    Cache(#[from] rusqlite::Error),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no exchange granularity for {compression} {timeframe}")]
    UnsupportedGranularity { timeframe: Timeframe, compression: u32 },

    #[error("invalid trade datetime '{value}': {source}")]
    InvalidTradeTime {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
}

pub type FeedResult<T> = Result<T, FeedError>;
