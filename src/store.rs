//! Exchange store shared by the feeds of one session

use std::sync::Arc;

use crate::feed::{CryptoFeed, FeedParams};
use crate::source::{ExchangeSource, GranularityResolver, HistoricalCache};

/// Bundles an exchange source with an optional historical cache.
///
/// Feeds receive the store explicitly; several feeds (one per instrument and
/// timeframe) can share it through an `Arc`.
pub struct CryptoStore<S> {
    source: S,
    cache: Option<Box<dyn HistoricalCache>>,
}

impl<S> CryptoStore<S>
where
    S: ExchangeSource + GranularityResolver,
{
    pub fn new(source: S) -> Self {
        Self {
            source,
            cache: None,
        }
    }

    pub fn with_cache(mut self, cache: impl HistoricalCache + 'static) -> Self {
        self.cache = Some(Box::new(cache));
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn cache(&self) -> Option<&dyn HistoricalCache> {
        self.cache.as_deref()
    }

    /// Create a feed bound to this store
    pub fn feed(self: &Arc<Self>, params: FeedParams) -> CryptoFeed<S> {
        CryptoFeed::new(Arc::clone(self), params)
    }
}
