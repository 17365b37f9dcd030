//! Time-boxed memoization of provider calls with stale fallback.

use crate::clients::{MarketDataSource, PRICE_HISTORY_DAYS};
use crate::data::{MarketSnapshot, SentimentPoint, SentimentReading};
use crate::error::FetchError;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use std::fmt;
use std::time::{Duration, Instant};

/// Freshness window of the current sentiment and market snapshot.
pub const REALTIME_TTL: Duration = Duration::from_secs(300);

/// Freshness window of the historical series.
pub const HISTORY_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Number of historical sentiment values kept for display.
pub const SENTIMENT_HISTORY_POINTS: usize = 5;

/// The cached data sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKey {
    /// Current sentiment index.
    Sentiment,
    /// Current market snapshot.
    Market,
    /// Historical sentiment values.
    SentimentHistory,
    /// Historical daily closes.
    PriceHistory,
}

impl fmt::Display for SourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Sentiment => "sentiment",
            Self::Market => "market",
            Self::SentimentHistory => "sentiment_history",
            Self::PriceHistory => "price_history",
        };
        f.write_str(name)
    }
}

// =============================================================================
// Cache Slot
// =============================================================================

/// A cached payload and when it was fetched.
#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    /// The last successfully fetched payload.
    pub payload: T,
    /// When it was fetched.
    pub fetched_at: Instant,
}

/// The outcome of a cache read.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRead<T> {
    /// The payload, `None` when nothing was ever fetched.
    pub payload: Option<T>,
    /// Whether the payload is within its freshness window.
    pub fresh: bool,
    /// Whether any fetch has ever succeeded.
    pub had_any_data: bool,
}

impl<T> CacheRead<T> {
    /// Whether an old payload is being served after a failed refresh.
    pub fn is_stale(&self) -> bool {
        self.payload.is_some() && !self.fresh
    }
}

/// One memoized data source.
///
/// A failed refresh never discards the previous entry.
///
/// ```
/// use feargreed_core::{CacheSlot, FetchError, SourceKey};
/// use std::time::{Duration, Instant};
///
/// let mut slot = CacheSlot::new(SourceKey::Market);
/// let now = Instant::now();
/// let ttl = Duration::from_secs(300);
///
/// let first = slot.get(now, ttl, || Ok::<_, FetchError>(42));
/// assert!(first.fresh);
///
/// let later = now + Duration::from_secs(600);
/// let stale = slot.get(later, ttl, || Err(FetchError::Status(500)));
/// assert_eq!(stale.payload, Some(42));
/// assert!(!stale.fresh);
/// ```
#[derive(Debug)]
pub struct CacheSlot<T> {
    key: SourceKey,
    entry: Option<CacheEntry<T>>,
}

impl<T: Clone> CacheSlot<T> {
    /// An empty slot.
    pub fn new(key: SourceKey) -> Self {
        Self { key, entry: None }
    }

    /// The current entry, without refreshing.
    pub fn peek(&self) -> Option<&CacheEntry<T>> {
        self.entry.as_ref()
    }

    /// Whether the entry is younger than `max_age` at `now`.
    pub fn is_fresh(&self, now: Instant, max_age: Duration) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| now.saturating_duration_since(e.fetched_at) < max_age)
    }

    /// Return the cached payload, refreshing it with `fetch` when too old.
    pub fn get<F>(&mut self, now: Instant, max_age: Duration, fetch: F) -> CacheRead<T>
    where
        F: FnOnce() -> Result<T, FetchError>,
    {
        if self.is_fresh(now, max_age) {
            debug!("cache hit: {}", self.key);
            return CacheRead {
                payload: self.entry.as_ref().map(|e| e.payload.clone()),
                fresh: true,
                had_any_data: true,
            };
        }

        match fetch() {
            Ok(payload) => {
                debug!("cache refreshed: {}", self.key);
                self.entry = Some(CacheEntry {
                    payload: payload.clone(),
                    fetched_at: now,
                });
                CacheRead {
                    payload: Some(payload),
                    fresh: true,
                    had_any_data: true,
                }
            }
            Err(e) => match &self.entry {
                Some(entry) => {
                    warn!("refresh of {} failed, serving stale data: {}", self.key, e);
                    CacheRead {
                        payload: Some(entry.payload.clone()),
                        fresh: false,
                        had_any_data: true,
                    }
                }
                None => {
                    warn!("fetch of {} failed, no data yet: {}", self.key, e);
                    CacheRead {
                        payload: None,
                        fresh: false,
                        had_any_data: false,
                    }
                }
            },
        }
    }
}

// =============================================================================
// Market Data Facade
// =============================================================================

/// The data a mode is built from, with "no data" already substituted.
#[derive(Debug, Clone, Default)]
pub struct ModeData {
    /// Current sentiment, if the mode uses it.
    pub sentiment: Option<SentimentReading>,
    /// Current market snapshot, if the mode uses it.
    pub market: Option<MarketSnapshot>,
    /// Last historical sentiment values, oldest first.
    pub sentiment_history: Vec<SentimentPoint>,
    /// Last daily closes, oldest first.
    pub price_history: Vec<f64>,
    /// Whether any source served stale data.
    pub stale: bool,
}

/// A [`MarketDataSource`] behind four cache slots.
pub struct MarketData {
    source: Box<dyn MarketDataSource>,
    sentiment: CacheSlot<SentimentReading>,
    market: CacheSlot<MarketSnapshot>,
    sentiment_history: CacheSlot<Vec<SentimentPoint>>,
    price_history: CacheSlot<Vec<f64>>,
    realtime_ttl: Duration,
    history_ttl: Duration,
}

impl MarketData {
    /// Cache `source` with the default freshness windows.
    pub fn new(source: Box<dyn MarketDataSource>) -> Self {
        Self::with_ttls(source, REALTIME_TTL, HISTORY_TTL)
    }

    /// Cache `source` with custom freshness windows.
    pub fn with_ttls(
        source: Box<dyn MarketDataSource>,
        realtime_ttl: Duration,
        history_ttl: Duration,
    ) -> Self {
        Self {
            source,
            sentiment: CacheSlot::new(SourceKey::Sentiment),
            market: CacheSlot::new(SourceKey::Market),
            sentiment_history: CacheSlot::new(SourceKey::SentimentHistory),
            price_history: CacheSlot::new(SourceKey::PriceHistory),
            realtime_ttl,
            history_ttl,
        }
    }

    /// Current sentiment index.
    pub fn sentiment(&mut self, now: Instant) -> CacheRead<SentimentReading> {
        let source = &self.source;
        self.sentiment
            .get(now, self.realtime_ttl, || source.current_sentiment())
    }

    /// Current market snapshot.
    pub fn market(&mut self, now: Instant) -> CacheRead<MarketSnapshot> {
        let source = &self.source;
        self.market
            .get(now, self.realtime_ttl, || source.market_snapshot())
    }

    /// Historical sentiment values.
    pub fn sentiment_history(&mut self, now: Instant) -> CacheRead<Vec<SentimentPoint>> {
        let source = &self.source;
        self.sentiment_history
            .get(now, self.history_ttl, || source.sentiment_history())
    }

    /// Historical daily closes.
    pub fn price_history(&mut self, now: Instant) -> CacheRead<Vec<f64>> {
        let source = &self.source;
        self.price_history.get(now, self.history_ttl, || {
            source.price_history(PRICE_HISTORY_DAYS)
        })
    }

    /// Refresh the given sources and collect them for a mode build.
    ///
    /// `wall_time` stamps the "no data" records of sources that never
    /// produced anything.
    pub fn collect(&mut self, keys: &[SourceKey], now: Instant, wall_time: DateTime<Utc>) -> ModeData {
        let mut data = ModeData::default();
        for key in keys {
            match key {
                SourceKey::Sentiment => {
                    let read = self.sentiment(now);
                    data.stale |= read.is_stale();
                    data.sentiment = Some(
                        read.payload
                            .unwrap_or_else(|| SentimentReading::unavailable(wall_time)),
                    );
                }
                SourceKey::Market => {
                    let read = self.market(now);
                    data.stale |= read.is_stale();
                    data.market = Some(
                        read.payload
                            .unwrap_or_else(|| MarketSnapshot::unavailable(wall_time)),
                    );
                }
                SourceKey::SentimentHistory => {
                    let read = self.sentiment_history(now);
                    data.stale |= read.is_stale();
                    let mut points = read.payload.unwrap_or_default();
                    let skip = points.len().saturating_sub(SENTIMENT_HISTORY_POINTS);
                    data.sentiment_history = points.split_off(skip);
                }
                SourceKey::PriceHistory => {
                    let read = self.price_history(now);
                    data.stale |= read.is_stale();
                    data.price_history = read.payload.unwrap_or_default();
                }
            }
        }
        data
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockMarketData;
    use std::cell::Cell;

    const TTL: Duration = Duration::from_secs(300);

    #[test]
    fn test_hit_does_not_fetch() {
        let mut slot = CacheSlot::new(SourceKey::Sentiment);
        let calls = Cell::new(0);
        let now = Instant::now();
        let fetch = || {
            calls.set(calls.get() + 1);
            Ok(vec![1u8, 2, 3])
        };

        let first = slot.get(now, TTL, fetch);
        let second = slot.get(now + Duration::from_secs(299), TTL, || {
            calls.set(calls.get() + 1);
            Ok(vec![9])
        });

        assert_eq!(calls.get(), 1);
        assert_eq!(first, second);
        assert!(second.fresh);
    }

    #[test]
    fn test_expired_entry_is_refetched() {
        let mut slot = CacheSlot::new(SourceKey::Market);
        let now = Instant::now();
        slot.get(now, TTL, || Ok(1));
        let read = slot.get(now + TTL, TTL, || Ok(2));
        assert_eq!(read.payload, Some(2));
        assert!(read.fresh);
        assert_eq!(slot.peek().map(|e| e.fetched_at), Some(now + TTL));
    }

    #[test]
    fn test_failure_keeps_stale_entry() {
        let mut slot = CacheSlot::new(SourceKey::Market);
        let now = Instant::now();
        slot.get(now, TTL, || Ok(7));

        let later = now + Duration::from_secs(400);
        let read = slot.get(later, TTL, || Err(FetchError::Status(503)));
        assert_eq!(read.payload, Some(7));
        assert!(!read.fresh);
        assert!(read.had_any_data);
        assert!(read.is_stale());

        // The failed refresh left the old timestamp in place.
        assert_eq!(slot.peek().map(|e| e.fetched_at), Some(now));
    }

    #[test]
    fn test_first_failure_reports_no_data() {
        let mut slot: CacheSlot<u32> = CacheSlot::new(SourceKey::PriceHistory);
        let read = slot.get(Instant::now(), TTL, || {
            Err(FetchError::Malformed("bad".to_string()))
        });
        assert_eq!(read.payload, None);
        assert!(!read.fresh);
        assert!(!read.had_any_data);
        assert!(!read.is_stale());
    }

    #[test]
    fn test_collect_substitutes_no_data() {
        let source = MockMarketData::new();
        source.fail_all();
        let mut data = MarketData::new(Box::new(source.clone()));
        let wall = Utc::now();

        let collected = data.collect(
            &[SourceKey::Sentiment, SourceKey::Market, SourceKey::PriceHistory],
            Instant::now(),
            wall,
        );
        assert_eq!(collected.sentiment, Some(SentimentReading::unavailable(wall)));
        assert_eq!(collected.market, Some(MarketSnapshot::unavailable(wall)));
        assert!(collected.price_history.is_empty());
        assert!(!collected.stale);
    }

    #[test]
    fn test_collect_only_touches_requested_sources() {
        let source = MockMarketData::new();
        let mut data = MarketData::new(Box::new(source.clone()));
        data.collect(&[SourceKey::Market], Instant::now(), Utc::now());

        let calls = source.calls();
        assert_eq!(calls.market_snapshot, 1);
        assert_eq!(calls.current_sentiment, 0);
        assert_eq!(calls.price_history, 0);
    }

    #[test]
    fn test_collect_truncates_sentiment_history() {
        let source = MockMarketData::new();
        source.set_sentiment_history((0..30).map(|v| (v as u8, v as i64 * 86_400)).collect());
        let mut data = MarketData::new(Box::new(source.clone()));

        let collected = data.collect(&[SourceKey::SentimentHistory], Instant::now(), Utc::now());
        let values: Vec<u8> = collected.sentiment_history.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![25, 26, 27, 28, 29]);
    }
}
