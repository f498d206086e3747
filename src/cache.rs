//! Historical bar cache
//!
//! SQLite-backed store of previously downloaded bars, keyed by instrument,
//! granularity and timestamp. A feed configured with an end date reads its
//! whole range from here instead of the exchange. CSV import/export keeps
//! the cache easy to seed and inspect.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tracing::{debug, info};

use crate::error::FeedResult;
use crate::source::HistoricalCache;
use crate::types::Bar;

pub struct SqliteBarCache {
    conn: Connection,
}

impl SqliteBarCache {
    /// Open (or create) a cache database on disk
    pub fn open(db_path: impl AsRef<Path>) -> FeedResult<Self> {
        let db_path = db_path.as_ref();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        let cache = Self { conn };
        cache.create_tables()?;
        info!("Bar cache opened at {}", db_path.display());

        Ok(cache)
    }

    pub fn in_memory() -> FeedResult<Self> {
        let cache = Self {
            conn: Connection::open_in_memory()?,
        };
        cache.create_tables()?;
        Ok(cache)
    }

    fn create_tables(&self) -> FeedResult<()> {
        self.conn.execute(
            "CREATE TABLE IF NOT EXISTS bars (
                instrument TEXT NOT NULL,
                granularity TEXT NOT NULL,
                timestamp INTEGER NOT NULL,
                open REAL NOT NULL,
                high REAL NOT NULL,
                low REAL NOT NULL,
                close REAL NOT NULL,
                volume REAL NOT NULL,
                PRIMARY KEY (instrument, granularity, timestamp)
            )",
            [],
        )?;
        Ok(())
    }

    /// Insert or replace bars; returns the number written
    pub fn store(&mut self, instrument: &str, granularity: &str, bars: &[Bar]) -> FeedResult<usize> {
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT OR REPLACE INTO bars
                    (instrument, granularity, timestamp, open, high, low, close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            )?;
            for bar in bars {
                stmt.execute(params![
                    instrument,
                    granularity,
                    bar.timestamp,
                    bar.open,
                    bar.high,
                    bar.low,
                    bar.close,
                    bar.volume
                ])?;
            }
        }
        tx.commit()?;

        debug!("Stored {} {} {} bars", bars.len(), instrument, granularity);
        Ok(bars.len())
    }

    pub fn count(&self, instrument: &str, granularity: &str) -> FeedResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM bars WHERE instrument = ?1 AND granularity = ?2",
            params![instrument, granularity],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl HistoricalCache for SqliteBarCache {
    fn query(
        &self,
        instrument: &str,
        granularity: &str,
        start: Option<DateTime<Utc>>,
        end: DateTime<Utc>,
    ) -> FeedResult<Vec<Bar>> {
        let start = start.map_or(i64::MIN, |d| d.timestamp_millis());

        let mut stmt = self.conn.prepare(
            "SELECT timestamp, open, high, low, close, volume FROM bars
             WHERE instrument = ?1 AND granularity = ?2 AND timestamp >= ?3 AND timestamp <= ?4
             ORDER BY timestamp",
        )?;

        let bars = stmt
            .query_map(
                params![instrument, granularity, start, end.timestamp_millis()],
                |row| {
                    Ok(Bar {
                        timestamp: row.get(0)?,
                        open: row.get(1)?,
                        high: row.get(2)?,
                        low: row.get(3)?,
                        close: row.get(4)?,
                        volume: row.get(5)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(bars)
    }
}

/// Load bars from a `timestamp,open,high,low,close,volume` CSV file
pub fn load_csv(path: impl AsRef<Path>) -> FeedResult<Vec<Bar>> {
    let mut reader = csv::Reader::from_path(path.as_ref())?;

    let bars = reader
        .deserialize()
        .collect::<Result<Vec<Bar>, _>>()?;

    Ok(bars)
}

/// Save bars to a CSV file with a header row
pub fn save_csv(path: impl AsRef<Path>, bars: &[Bar]) -> FeedResult<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    for bar in bars {
        writer.serialize(bar)?;
    }
    writer.flush()?;

    info!("Saved {} rows to {}", bars.len(), path.display());
    Ok(())
}
