//! Crypto Data Feed
//!
//! Incremental OHLCV and tick loading from crypto exchanges, exposed through a
//! pull-based, one-bar-at-a-time feed for backtesting and live trading engines.

pub mod cache;
pub mod config;
pub mod error;
pub mod exchange;
pub mod feed;
pub mod source;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::{FeedError, FeedResult};
pub use feed::{CryptoFeed, DataFeed, FeedParams};
pub use store::CryptoStore;
pub use types::*;
