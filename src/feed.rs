//! Incremental bar loader
//!
//! `CryptoFeed` bridges an exchange's request/response market data API into a
//! pull model: the consumer calls [`DataFeed::load_next`] once per bar and the
//! feed decides when to hit the exchange, which time window to ask for, and
//! which of the returned records are new.
//!
//! State machine:
//!
//! ```text
//!   start(fromdate) ──► HistoricalBackfill ──(queue drained)──► Live
//!   start()         ──► Live                        │
//!                                                   └─(historical only)──► Finished
//! ```

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info, trace};

use crate::error::FeedResult;
use crate::source::{ExchangeSource, GranularityResolver, HistoricalCache};
use crate::store::CryptoStore;
use crate::types::{Bar, FeedNotification, FeedState, LoadStatus, Pending, RawBar, Timeframe};

/// Default number of bars requested per call
pub const DEFAULT_OHLCV_LIMIT: u32 = 20;

/// Pull-based data feed contract expected by bar-consuming engines
pub trait DataFeed {
    /// Initialize the feed. `fromdate` / `todate` override the configured bounds.
    fn start(
        &mut self,
        fromdate: Option<DateTime<Utc>>,
        todate: Option<DateTime<Utc>>,
    ) -> FeedResult<()>;

    /// Advance by one record
    fn load_next(&mut self) -> FeedResult<LoadStatus>;

    /// Whether the feed keeps going after its historical part
    fn is_live(&self) -> bool;

    /// Whether live data is queued and ready to be delivered without a fetch
    fn has_live_data(&self) -> bool;
}

/// Per-feed parameters
#[derive(Debug, Clone)]
pub struct FeedParams {
    /// Exchange instrument, e.g. "BTCUSDT"
    pub dataname: String,
    pub timeframe: Timeframe,
    pub compression: u32,
    pub fromdate: Option<DateTime<Utc>>,
    pub todate: Option<DateTime<Utc>>,
    /// Stop after the first download of data instead of going live
    pub historical: bool,
    /// Prime the queue with the exchange's default window when starting live
    pub backfill_start: bool,
    /// Extra exchange-specific query parameters, forwarded verbatim
    pub fetch_ohlcv_params: BTreeMap<String, String>,
    pub ohlcv_limit: u32,
    /// Discard the newest bar of every batch. Some exchanges return the
    /// still-forming current bar and offer no parameter to exclude it.
    pub drop_newest: bool,
    /// Log every request and record
    pub debug: bool,
}

impl FeedParams {
    pub fn new(dataname: impl Into<String>, timeframe: Timeframe, compression: u32) -> Self {
        Self {
            dataname: dataname.into(),
            timeframe,
            compression,
            fromdate: None,
            todate: None,
            historical: false,
            backfill_start: false,
            fetch_ohlcv_params: BTreeMap::new(),
            ohlcv_limit: DEFAULT_OHLCV_LIMIT,
            drop_newest: false,
            debug: false,
        }
    }
}

/// Data feed over a [`CryptoStore`]
pub struct CryptoFeed<S> {
    store: Arc<CryptoStore<S>>,
    params: FeedParams,
    state: FeedState,
    pending: VecDeque<Pending>,
    last_timestamp: Option<i64>,
    last_trade_id: Option<u64>,
    estimated_interval: Option<i64>,
    current: Option<Bar>,
    notifications: VecDeque<FeedNotification>,
}

impl<S> CryptoFeed<S>
where
    S: ExchangeSource + GranularityResolver,
{
    pub fn new(store: Arc<CryptoStore<S>>, params: FeedParams) -> Self {
        Self {
            store,
            params,
            state: FeedState::Live,
            pending: VecDeque::new(),
            last_timestamp: None,
            last_trade_id: None,
            estimated_interval: None,
            current: None,
            notifications: VecDeque::new(),
        }
    }

    pub fn params(&self) -> &FeedParams {
        &self.params
    }

    pub fn state(&self) -> FeedState {
        self.state
    }

    /// The working bar filled by the last delivered record
    pub fn current_bar(&self) -> Option<&Bar> {
        self.current.as_ref()
    }

    /// Number of records queued for delivery
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.last_timestamp
    }

    pub fn last_trade_id(&self) -> Option<u64> {
        self.last_trade_id
    }

    pub fn estimated_interval(&self) -> Option<i64> {
        self.estimated_interval
    }

    /// Drain the status notifications raised since the last call
    pub fn take_notifications(&mut self) -> Vec<FeedNotification> {
        self.notifications.drain(..).collect()
    }

    fn notify(&mut self, notification: FeedNotification) {
        info!("{} feed: {:?}", self.params.dataname, notification);
        self.notifications.push_back(notification);
    }

    fn is_ticks(&self) -> bool {
        self.params.timeframe == Timeframe::Ticks
    }

    /// Fetch OHLCV data into the pending queue
    fn fetch_ohlcv(&mut self, fromdate: Option<DateTime<Utc>>) -> FeedResult<()> {
        let store = Arc::clone(&self.store);
        let granularity = store
            .source()
            .granularity(self.params.timeframe, self.params.compression)?;

        if let (Some(cache), Some(todate)) = (store.cache(), self.params.todate) {
            return self.fetch_from_cache(cache, &granularity, fromdate, todate);
        }

        let till = self.params.todate.map(|d| d.timestamp_millis());
        let mut since = match fromdate {
            Some(d) => Some(d.timestamp_millis()),
            None => self
                .last_timestamp
                .map(|ts| ts + self.estimated_interval.unwrap_or(0)),
        };

        loop {
            let queued_before = self.pending.len();

            if self.params.debug {
                info!(
                    "Requesting {} since={:?} granularity={} limit={} params={:?}",
                    self.params.dataname,
                    since,
                    granularity,
                    self.params.ohlcv_limit,
                    self.params.fetch_ohlcv_params
                );
            }

            let mut batch = store.source().fetch_ohlcv(
                &self.params.dataname,
                &granularity,
                since,
                self.params.ohlcv_limit,
                &self.params.fetch_ohlcv_params,
            )?;
            batch.sort_by_key(|raw| raw.timestamp);

            if self.params.drop_newest {
                batch.pop();
            }

            let newest = self.accept_batch(&batch, till);

            debug!(
                "{} {}: received {} bars, queued {}, last_timestamp={:?}",
                self.params.dataname,
                granularity,
                batch.len(),
                self.pending.len() - queued_before,
                self.last_timestamp
            );

            if let (Some(till), Some(newest)) = (till, newest) {
                if newest >= till {
                    break;
                }
                since = Some(newest);
            }

            if self.pending.len() == queued_before {
                break;
            }
        }

        Ok(())
    }

    /// Queue the new bars of a sorted batch. Returns the newest valid timestamp seen,
    /// whether or not it was queued.
    fn accept_batch(&mut self, batch: &[RawBar], till: Option<i64>) -> Option<i64> {
        let mut first = None;
        let mut newest = None;

        for raw in batch {
            let Some(bar) = raw.complete() else {
                trace!("Skipping incomplete bar: {:?}", raw);
                continue;
            };
            newest = Some(bar.timestamp);

            if let Some(first) = first {
                if self.estimated_interval.is_none() {
                    self.estimated_interval = Some(bar.timestamp - first);
                }
            }

            if self.is_newer(bar.timestamp) {
                if self.params.debug {
                    info!("Adding: {:?}", bar);
                }
                self.pending.push_back(Pending::Bar(bar));
                self.last_timestamp = Some(bar.timestamp);
            }

            if till.is_some_and(|till| bar.timestamp >= till) {
                break;
            }

            if first.is_none() {
                first = Some(bar.timestamp);
            }
        }

        newest
    }

    fn fetch_from_cache(
        &mut self,
        cache: &dyn HistoricalCache,
        granularity: &str,
        fromdate: Option<DateTime<Utc>>,
        todate: DateTime<Utc>,
    ) -> FeedResult<()> {
        let start = fromdate.or_else(|| {
            self.last_timestamp
                .and_then(DateTime::from_timestamp_millis)
        });
        info!(
            "Loading from cache {} {} {:?} {}",
            self.params.dataname, granularity, start, todate
        );

        let mut bars = cache.query(&self.params.dataname, granularity, start, todate)?;
        bars.sort_by_key(|bar| bar.timestamp);
        if self.params.drop_newest {
            bars.pop();
        }

        for bar in bars {
            if self.is_newer(bar.timestamp) {
                self.pending.push_back(Pending::Bar(bar));
                self.last_timestamp = Some(bar.timestamp);
            }
        }

        Ok(())
    }

    fn is_newer(&self, timestamp: i64) -> bool {
        self.last_timestamp.map_or(true, |last| timestamp > last)
    }

    /// Poll recent trades and deliver at most one new tick
    fn load_ticks(&mut self) -> FeedResult<LoadStatus> {
        let trades = self.store.source().fetch_trades(&self.params.dataname)?;

        // First poll only takes the latest trade; later polls look at the last two
        let window = if self.last_trade_id.is_none() { 1 } else { 2 };
        let recent = &trades[trades.len().saturating_sub(window)..];

        let mut accepted = Vec::with_capacity(window);
        for trade in recent {
            if self.last_trade_id.map_or(true, |last| trade.id > last) {
                self.last_trade_id = Some(trade.id);
                match trade.to_tick() {
                    Ok(tick) => accepted.push(tick),
                    Err(e) => trace!("Skipping trade {}: {}", trade.id, e),
                }
            }
        }

        // Only the most recent accepted trade is queued per poll; an older new
        // trade from the same poll is not delivered.
        if let Some(tick) = accepted.pop() {
            self.pending.push_back(Pending::Tick(tick));
        }

        Ok(self.load_pending())
    }

    fn load_pending(&mut self) -> LoadStatus {
        match self.pending.pop_front() {
            Some(entry) => {
                let bar = entry.to_bar();
                if self.params.debug {
                    info!("Load {} returning {:?}", self.params.dataname, bar);
                }
                self.current = Some(bar);
                LoadStatus::Delivered
            }
            None => LoadStatus::NoDataYet,
        }
    }
}

impl<S> DataFeed for CryptoFeed<S>
where
    S: ExchangeSource + GranularityResolver,
{
    fn start(
        &mut self,
        fromdate: Option<DateTime<Utc>>,
        todate: Option<DateTime<Utc>>,
    ) -> FeedResult<()> {
        if fromdate.is_some() {
            self.params.fromdate = fromdate;
        }
        if todate.is_some() {
            self.params.todate = todate;
        }

        self.pending.clear();
        self.last_timestamp = None;
        self.last_trade_id = None;
        self.estimated_interval = None;
        self.current = None;

        if let Some(fromdate) = self.params.fromdate {
            self.state = FeedState::HistoricalBackfill;
            self.notify(FeedNotification::Delayed);
            if !self.is_ticks() {
                self.fetch_ohlcv(Some(fromdate))?;
            }
        } else {
            self.state = FeedState::Live;
            self.notify(FeedNotification::Live);
            if self.params.backfill_start && !self.is_ticks() {
                self.fetch_ohlcv(None)?;
            }
        }

        Ok(())
    }

    fn load_next(&mut self) -> FeedResult<LoadStatus> {
        loop {
            match self.state {
                FeedState::Finished => return Ok(LoadStatus::NoMoreData),
                FeedState::Live => {
                    if self.is_ticks() {
                        return self.load_ticks();
                    }
                    // Fetch only once the queue is drained: every request costs a
                    // round trip while bars are consumed one at a time.
                    if self.pending.is_empty() {
                        self.fetch_ohlcv(None)?;
                    }
                    return Ok(self.load_pending());
                }
                FeedState::HistoricalBackfill => {
                    if self.load_pending() == LoadStatus::Delivered {
                        return Ok(LoadStatus::Delivered);
                    }

                    if self.params.historical {
                        self.notify(FeedNotification::Disconnected);
                        self.state = FeedState::Finished;
                        return Ok(LoadStatus::NoMoreData);
                    }

                    self.state = FeedState::Live;
                    self.notify(FeedNotification::Live);
                }
            }
        }
    }

    fn is_live(&self) -> bool {
        !self.params.historical
    }

    fn has_live_data(&self) -> bool {
        self.state == FeedState::Live && !self.pending.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FeedError;
    use crate::types::RawTrade;
    use std::cell::RefCell;

    /// Exchange double replaying scripted responses; returns empty lists once exhausted
    #[derive(Default)]
    struct ScriptedSource {
        ohlcv: RefCell<VecDeque<Vec<RawBar>>>,
        trades: RefCell<VecDeque<Vec<RawTrade>>>,
        since_requested: RefCell<Vec<Option<i64>>>,
        limits_requested: RefCell<Vec<u32>>,
        params_requested: RefCell<Vec<BTreeMap<String, String>>>,
    }

    impl ScriptedSource {
        fn with_batches(batches: Vec<Vec<RawBar>>) -> Self {
            let source = Self::default();
            source.ohlcv.borrow_mut().extend(batches);
            source
        }

        fn with_polls(polls: Vec<Vec<RawTrade>>) -> Self {
            let source = Self::default();
            source.trades.borrow_mut().extend(polls);
            source
        }

        fn requests(&self) -> Vec<Option<i64>> {
            self.since_requested.borrow().clone()
        }
    }

    impl ExchangeSource for ScriptedSource {
        fn fetch_ohlcv(
            &self,
            _instrument: &str,
            _granularity: &str,
            since: Option<i64>,
            limit: u32,
            params: &BTreeMap<String, String>,
        ) -> FeedResult<Vec<RawBar>> {
            self.since_requested.borrow_mut().push(since);
            self.limits_requested.borrow_mut().push(limit);
            self.params_requested.borrow_mut().push(params.clone());
            Ok(self.ohlcv.borrow_mut().pop_front().unwrap_or_default())
        }

        fn fetch_trades(&self, _instrument: &str) -> FeedResult<Vec<RawTrade>> {
            Ok(self.trades.borrow_mut().pop_front().unwrap_or_default())
        }
    }

    impl GranularityResolver for ScriptedSource {
        fn granularity(&self, timeframe: Timeframe, compression: u32) -> FeedResult<String> {
            match timeframe {
                Timeframe::Minutes => Ok(format!("{}m", compression)),
                _ => Err(FeedError::UnsupportedGranularity {
                    timeframe,
                    compression,
                }),
            }
        }
    }

    struct MemoryCache(Vec<Bar>);

    impl HistoricalCache for MemoryCache {
        fn query(
            &self,
            _instrument: &str,
            _granularity: &str,
            start: Option<DateTime<Utc>>,
            end: DateTime<Utc>,
        ) -> FeedResult<Vec<Bar>> {
            let start = start.map_or(i64::MIN, |d| d.timestamp_millis());
            let end = end.timestamp_millis();
            Ok(self
                .0
                .iter()
                .filter(|b| b.timestamp >= start && b.timestamp <= end)
                .copied()
                .collect())
        }
    }

    fn bar(ts: i64) -> Bar {
        Bar::new(ts, 100.0, 110.0, 90.0, 105.0, 1.0)
    }

    fn raw(ts: i64) -> RawBar {
        RawBar::from(bar(ts))
    }

    fn raws(timestamps: &[i64]) -> Vec<RawBar> {
        timestamps.iter().map(|&ts| raw(ts)).collect()
    }

    fn trade(id: u64) -> RawTrade {
        RawTrade {
            id,
            datetime: format!("2024-01-01T00:00:{:02}.000Z", id % 60),
            price: id as f64,
            amount: 0.5,
        }
    }

    fn ms(ts: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ts).unwrap()
    }

    fn feed(source: ScriptedSource, params: FeedParams) -> CryptoFeed<ScriptedSource> {
        Arc::new(CryptoStore::new(source)).feed(params)
    }

    fn minute_params() -> FeedParams {
        FeedParams::new("BTCUSDT", Timeframe::Minutes, 1)
    }

    fn drain(feed: &mut CryptoFeed<ScriptedSource>) -> Vec<i64> {
        let mut delivered = Vec::new();
        while feed.pending() > 0 {
            assert_eq!(feed.load_next().unwrap(), LoadStatus::Delivered);
            delivered.push(feed.current_bar().unwrap().timestamp);
        }
        delivered
    }

    #[test]
    fn test_first_fetch_and_follow_up() {
        let source = ScriptedSource::with_batches(vec![
            raws(&[1000, 2000, 3000]),
            raws(&[1000, 2000, 3000]),
            raws(&[3000, 4000]),
        ]);
        let mut feed = feed(source, minute_params());
        feed.start(None, None).unwrap();

        feed.fetch_ohlcv(None).unwrap();
        assert_eq!(feed.pending(), 3);
        assert_eq!(feed.last_timestamp(), Some(3000));
        assert_eq!(feed.estimated_interval(), Some(1000));
        assert_eq!(drain(&mut feed), vec![1000, 2000, 3000]);

        // Queue drained: the next load fetches from last_timestamp + interval
        assert_eq!(feed.load_next().unwrap(), LoadStatus::Delivered);
        assert_eq!(feed.current_bar().unwrap().timestamp, 4000);
        assert_eq!(feed.pending(), 0);
        assert_eq!(
            feed.store.source().requests(),
            vec![None, None, Some(4000), Some(4000)]
        );
    }

    #[test]
    fn test_refetch_of_seen_bars_queues_nothing() {
        let source = ScriptedSource::with_batches(vec![
            raws(&[1000, 2000]),
            vec![],
            raws(&[1000, 2000]),
        ]);
        let mut feed = feed(source, minute_params());

        feed.fetch_ohlcv(None).unwrap();
        assert_eq!(feed.pending(), 2);

        feed.fetch_ohlcv(None).unwrap();
        assert_eq!(feed.pending(), 2);
        // The empty-progress check stops the second fetch after one request
        assert_eq!(feed.store.source().requests().len(), 3);
    }

    #[test]
    fn test_unsorted_batch_is_accepted_in_order() {
        let source = ScriptedSource::with_batches(vec![
            raws(&[3000, 1000, 2000]),
            vec![],
            raws(&[2500, 3500]),
        ]);
        let mut feed = feed(source, minute_params());
        feed.start(None, None).unwrap();

        feed.fetch_ohlcv(None).unwrap();
        feed.fetch_ohlcv(None).unwrap();
        assert_eq!(drain(&mut feed), vec![1000, 2000, 3000, 3500]);
    }

    #[test]
    fn test_limit_and_extra_params_are_forwarded() {
        let source = ScriptedSource::with_batches(vec![raws(&[1000, 2000])]);
        let mut params = minute_params();
        params.ohlcv_limit = 7;
        params
            .fetch_ohlcv_params
            .insert("partial".to_string(), "false".to_string());
        let mut feed = feed(source, params);

        feed.fetch_ohlcv(None).unwrap();

        let source = feed.store.source();
        let expected: BTreeMap<String, String> =
            [("partial".to_string(), "false".to_string())].into_iter().collect();
        assert_eq!(source.requests(), vec![None, None]);
        assert_eq!(*source.limits_requested.borrow(), vec![7, 7]);
        assert_eq!(*source.params_requested.borrow(), vec![expected.clone(), expected]);
    }

    #[test]
    fn test_drop_newest() {
        let source = ScriptedSource::with_batches(vec![raws(&[1000, 2000, 3000])]);
        let mut params = minute_params();
        params.drop_newest = true;
        let mut feed = feed(source, params);
        feed.start(None, None).unwrap();

        feed.fetch_ohlcv(None).unwrap();
        assert_eq!(feed.last_timestamp(), Some(2000));
        assert_eq!(drain(&mut feed), vec![1000, 2000]);
    }

    #[test]
    fn test_drop_newest_on_empty_batch() {
        let mut params = minute_params();
        params.drop_newest = true;
        let mut feed = feed(ScriptedSource::default(), params);

        feed.fetch_ohlcv(None).unwrap();
        assert_eq!(feed.pending(), 0);
        assert_eq!(feed.last_timestamp(), None);
    }

    #[test]
    fn test_incomplete_bars_are_skipped() {
        let mut broken = raw(2000);
        broken.close = None;
        let source = ScriptedSource::with_batches(vec![vec![raw(1000), broken, raw(4000)]]);
        let mut feed = feed(source, minute_params());
        feed.start(None, None).unwrap();

        feed.fetch_ohlcv(None).unwrap();
        assert_eq!(feed.estimated_interval(), Some(3000));
        assert_eq!(drain(&mut feed), vec![1000, 4000]);
    }

    #[test]
    fn test_interval_is_inferred_once() {
        let source = ScriptedSource::with_batches(vec![
            raws(&[1000, 2000]),
            vec![],
            raws(&[5000, 9000, 20000]),
        ]);
        let mut feed = feed(source, minute_params());

        feed.fetch_ohlcv(None).unwrap();
        assert_eq!(feed.estimated_interval(), Some(1000));

        feed.fetch_ohlcv(None).unwrap();
        assert_eq!(feed.estimated_interval(), Some(1000));
        assert_eq!(feed.last_timestamp(), Some(20000));
    }

    #[test]
    fn test_end_bound_advances_and_stops_fetch() {
        let source = ScriptedSource::with_batches(vec![
            raws(&[1000, 2000, 3000]),
            raws(&[3000, 4000, 5000, 6000]),
        ]);
        let mut params = minute_params();
        params.historical = true;
        let mut feed = feed(source, params);

        feed.start(Some(ms(1000)), Some(ms(5000))).unwrap();
        assert_eq!(feed.state(), FeedState::HistoricalBackfill);
        assert_eq!(feed.store.source().requests(), vec![Some(1000), Some(3000)]);
        assert_eq!(drain(&mut feed), vec![1000, 2000, 3000, 4000, 5000]);
    }

    #[test]
    fn test_historical_only_finishes() {
        let source = ScriptedSource::with_batches(vec![raws(&[1000, 2000, 3000])]);
        let mut params = minute_params();
        params.historical = true;
        let mut feed = feed(source, params);

        feed.start(Some(ms(1000)), Some(ms(3000))).unwrap();
        assert!(!feed.is_live());
        assert_eq!(drain(&mut feed).len(), 3);

        assert_eq!(feed.load_next().unwrap(), LoadStatus::NoMoreData);
        assert_eq!(feed.state(), FeedState::Finished);
        assert_eq!(feed.load_next().unwrap(), LoadStatus::NoMoreData);
        assert_eq!(
            feed.take_notifications(),
            vec![FeedNotification::Delayed, FeedNotification::Disconnected]
        );
        assert_eq!(feed.store.source().requests().len(), 1);
    }

    #[test]
    fn test_backfill_then_live() {
        let source = ScriptedSource::with_batches(vec![raws(&[1000, 2000, 3000])]);
        let mut feed = feed(source, minute_params());

        feed.start(Some(ms(1000)), Some(ms(3000))).unwrap();
        assert!(feed.is_live());
        assert!(!feed.has_live_data());
        assert_eq!(drain(&mut feed).len(), 3);

        // Backfill exhausted: goes live and fetches again
        assert_eq!(feed.load_next().unwrap(), LoadStatus::NoDataYet);
        assert_eq!(feed.state(), FeedState::Live);
        assert_eq!(feed.store.source().requests(), vec![Some(1000), Some(4000)]);
        assert_eq!(
            feed.take_notifications(),
            vec![FeedNotification::Delayed, FeedNotification::Live]
        );
    }

    #[test]
    fn test_live_fetches_only_when_drained() {
        let source = ScriptedSource::with_batches(vec![raws(&[1000, 2000])]);
        let mut params = minute_params();
        params.backfill_start = true;
        let mut feed = feed(source, params);

        feed.start(None, None).unwrap();
        assert_eq!(feed.state(), FeedState::Live);
        assert!(feed.has_live_data());
        let requests = feed.store.source().requests().len();

        assert_eq!(feed.load_next().unwrap(), LoadStatus::Delivered);
        assert_eq!(feed.load_next().unwrap(), LoadStatus::Delivered);
        assert_eq!(feed.store.source().requests().len(), requests);
        assert!(!feed.has_live_data());
    }

    #[test]
    fn test_cache_short_circuits_network() {
        let cached = vec![bar(3000), bar(1000), bar(2000), bar(9000)];
        let store = CryptoStore::new(ScriptedSource::default()).with_cache(MemoryCache(cached));
        let mut params = minute_params();
        params.drop_newest = true;
        params.historical = true;
        let mut feed = Arc::new(store).feed(params);

        feed.start(Some(ms(1000)), Some(ms(3000))).unwrap();
        assert_eq!(drain(&mut feed), vec![1000, 2000]);
        assert_eq!(feed.load_next().unwrap(), LoadStatus::NoMoreData);
        assert!(feed.store.source().requests().is_empty());
    }

    #[test]
    fn test_ticks_dedupe_by_id() {
        let source = ScriptedSource::with_polls(vec![
            vec![trade(99), trade(100)],
            vec![trade(100), trade(101)],
            vec![trade(100), trade(101), trade(101)],
            vec![trade(101), trade(102)],
        ]);
        let mut feed = feed(source, FeedParams::new("BTCUSDT", Timeframe::Ticks, 1));
        feed.start(None, None).unwrap();

        let mut delivered = Vec::new();
        for _ in 0..4 {
            if feed.load_next().unwrap() == LoadStatus::Delivered {
                delivered.push(feed.current_bar().unwrap().close as u64);
            }
        }

        assert_eq!(delivered, vec![100, 101, 102]);
        assert_eq!(feed.last_trade_id(), Some(102));
    }

    #[test]
    fn test_ticks_render_working_bar() {
        let source = ScriptedSource::with_polls(vec![vec![trade(7)]]);
        let mut feed = feed(source, FeedParams::new("BTCUSDT", Timeframe::Ticks, 1));
        feed.start(None, None).unwrap();

        assert_eq!(feed.load_next().unwrap(), LoadStatus::Delivered);
        let bar = feed.current_bar().unwrap();
        assert_eq!(bar.open, 7.0);
        assert_eq!(bar.high, 7.0);
        assert_eq!(bar.volume, 0.5);
        assert_eq!(feed.load_next().unwrap(), LoadStatus::NoDataYet);
    }

    // Known limitation: with two new trades in one poll only the newer is delivered.
    #[test]
    fn test_ticks_second_new_trade_in_poll_is_not_delivered() {
        let source = ScriptedSource::with_polls(vec![
            vec![trade(100)],
            vec![trade(100), trade(101), trade(102)],
            vec![trade(101), trade(102)],
        ]);
        let mut feed = feed(source, FeedParams::new("BTCUSDT", Timeframe::Ticks, 1));
        feed.start(None, None).unwrap();

        assert_eq!(feed.load_next().unwrap(), LoadStatus::Delivered);
        assert_eq!(feed.load_next().unwrap(), LoadStatus::Delivered);
        assert_eq!(feed.current_bar().unwrap().close, 102.0);
        assert_eq!(feed.load_next().unwrap(), LoadStatus::NoDataYet);
        assert_eq!(feed.last_trade_id(), Some(102));
    }

    #[test]
    fn test_ticks_skip_trade_with_bad_datetime() {
        let mut broken = trade(101);
        broken.datetime = "not a time".to_string();
        let source = ScriptedSource::with_polls(vec![
            vec![trade(100)],
            vec![trade(100), broken.clone()],
            vec![broken, trade(102)],
        ]);
        let mut feed = feed(source, FeedParams::new("BTCUSDT", Timeframe::Ticks, 1));
        feed.start(None, None).unwrap();

        assert_eq!(feed.load_next().unwrap(), LoadStatus::Delivered);
        assert_eq!(feed.load_next().unwrap(), LoadStatus::NoDataYet);
        assert_eq!(feed.last_trade_id(), Some(101));

        assert_eq!(feed.load_next().unwrap(), LoadStatus::Delivered);
        assert_eq!(feed.current_bar().unwrap().close, 102.0);
    }

    #[test]
    fn test_unsupported_granularity_propagates() {
        let params = FeedParams::new("BTCUSDT", Timeframe::Days, 1);
        let mut feed = feed(ScriptedSource::default(), params);

        let err = feed.start(Some(ms(1000)), None).unwrap_err();
        assert!(matches!(err, FeedError::UnsupportedGranularity { .. }));
    }
}
