//! Mock hardware and data sources for testing.
//!
//! Every mock is a cheap handle around shared state: clone it, hand one
//! clone to the [`Engine`](crate::Engine) and keep the other to script
//! inputs and inspect what happened.

use crate::animation::{AnimationStore, Clip};
use crate::clients::MarketDataSource;
use crate::data::{MarketSnapshot, SentimentPoint, SentimentReading};
use crate::display::{DisplaySink, LedColor};
use crate::error::{FetchError, HardwareError, RenderError};
use crate::frame::Frame;
use crate::input::{Button, ButtonReader};
use crate::platform::{NetworkStatus, Platform};
use crate::sentiment::classify;

use chrono::{DateTime, TimeDelta, Utc};
use embedded_graphics::pixelcolor::Rgb888;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

// =============================================================================
// Display Sink
// =============================================================================

/// Everything a [`MockSink`] was asked to do.
#[derive(Debug, Clone, Default)]
pub struct SinkLog {
    /// Number of successful blits.
    pub blits: usize,
    /// The last frame blitted.
    pub last_frame: Option<Frame>,
    /// Every backlight level set, in order.
    pub backlight: Vec<f64>,
    /// Every LED color set, in order.
    pub led: Vec<LedColor>,
    /// Whether the sink was released.
    pub released: bool,
    /// How many times the sink was released.
    pub releases: usize,
}

#[derive(Debug, Default)]
struct SinkState {
    log: SinkLog,
    fail_backlight: bool,
    blit_budget: Option<usize>,
}

/// A display sink that records calls.
///
/// # Example
///
/// ```
/// use feargreed_core::{DisplaySink, LedColor, MockSink};
///
/// let sink = MockSink::new();
/// let mut device = sink.clone();
/// device.set_led(LedColor::red(1.0)).unwrap();
/// assert_eq!(sink.snapshot().led, vec![LedColor::red(1.0)]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockSink {
    state: Arc<Mutex<SinkState>>,
}

impl MockSink {
    /// Create a mock sink that accepts everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make backlight calls fail.
    pub fn fail_backlight(&self, fail: bool) {
        self.state.lock().unwrap().fail_backlight = fail;
    }

    /// Let `count` more blits succeed, then fail every one after.
    pub fn fail_blits_after(&self, count: usize) {
        self.state.lock().unwrap().blit_budget = Some(count);
    }

    /// A copy of the call log.
    pub fn snapshot(&self) -> SinkLog {
        self.state.lock().unwrap().log.clone()
    }
}

impl DisplaySink for MockSink {
    fn blit(&mut self, frame: &Frame) -> Result<(), HardwareError> {
        let mut state = self.state.lock().unwrap();
        if let Some(budget) = state.blit_budget.as_mut() {
            if *budget == 0 {
                return Err(HardwareError::Device("framebuffer gone".to_string()));
            }
            *budget -= 1;
        }
        state.log.blits += 1;
        state.log.last_frame = Some(frame.clone());
        Ok(())
    }

    fn set_backlight(&mut self, level: f64) -> Result<(), HardwareError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_backlight {
            return Err(HardwareError::Device("backlight unavailable".to_string()));
        }
        state.log.backlight.push(level);
        Ok(())
    }

    fn set_led(&mut self, color: LedColor) -> Result<(), HardwareError> {
        self.state.lock().unwrap().log.led.push(color);
        Ok(())
    }

    fn release(&mut self) -> Result<(), HardwareError> {
        let mut state = self.state.lock().unwrap();
        state.log.released = true;
        state.log.releases += 1;
        Ok(())
    }
}

// =============================================================================
// Buttons
// =============================================================================

/// Buttons pressed and released by the test.
#[derive(Debug, Clone, Default)]
pub struct MockButtons {
    held: Arc<Mutex<HashSet<Button>>>,
}

impl MockButtons {
    /// Create mock buttons, all released.
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold `button` down.
    pub fn press(&self, button: Button) {
        self.held.lock().unwrap().insert(button);
    }

    /// Let go of `button`.
    pub fn release(&self, button: Button) {
        self.held.lock().unwrap().remove(&button);
    }
}

impl ButtonReader for MockButtons {
    fn is_pressed(&mut self, button: Button) -> bool {
        self.held.lock().unwrap().contains(&button)
    }
}

// =============================================================================
// Market Data
// =============================================================================

/// How many times each [`MockMarketData`] method was called.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockCalls {
    /// Calls to `current_sentiment`.
    pub current_sentiment: usize,
    /// Calls to `sentiment_history`.
    pub sentiment_history: usize,
    /// Calls to `market_snapshot`.
    pub market_snapshot: usize,
    /// Calls to `price_history`.
    pub price_history: usize,
}

#[derive(Debug)]
struct MarketState {
    sentiment: Option<u8>,
    price: Option<f64>,
    change_24h: Option<f64>,
    volume_24h: Option<f64>,
    sentiment_history: Vec<(u8, i64)>,
    price_history: Vec<f64>,
    failing: bool,
    calls: MockCalls,
}

/// A scripted market data provider.
#[derive(Debug, Clone)]
pub struct MockMarketData {
    state: Arc<Mutex<MarketState>>,
}

impl MockMarketData {
    /// A provider reporting a neutral market with five days of history.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MarketState {
                sentiment: Some(50),
                price: Some(43_250.0),
                change_24h: Some(1.5),
                volume_24h: Some(2.5e10),
                sentiment_history: (0..5).map(|i| (40 + i as u8 * 5, i * 86_400)).collect(),
                price_history: vec![42_000.0, 42_500.0, 41_800.0, 43_000.0, 43_250.0],
                failing: false,
                calls: MockCalls::default(),
            })),
        }
    }

    /// Report `value` as the current sentiment.
    pub fn set_sentiment(&self, value: u8) {
        self.state.lock().unwrap().sentiment = Some(value);
    }

    /// Report a market snapshot with the given price and 24h change.
    pub fn set_market(&self, price: Option<f64>, change_24h: Option<f64>) {
        let mut state = self.state.lock().unwrap();
        state.price = price;
        state.change_24h = change_24h;
    }

    /// Report `(value, unix seconds)` pairs as sentiment history.
    pub fn set_sentiment_history(&self, points: Vec<(u8, i64)>) {
        self.state.lock().unwrap().sentiment_history = points;
    }

    /// Report `closes` as the price history.
    pub fn set_price_history(&self, closes: Vec<f64>) {
        self.state.lock().unwrap().price_history = closes;
    }

    /// Make every call fail.
    pub fn fail_all(&self) {
        self.state.lock().unwrap().failing = true;
    }

    /// Make calls succeed again.
    pub fn recover(&self) {
        self.state.lock().unwrap().failing = false;
    }

    /// Call counts so far.
    pub fn calls(&self) -> MockCalls {
        self.state.lock().unwrap().calls
    }

    fn call<T>(
        &self,
        count: impl FnOnce(&mut MockCalls),
        answer: impl FnOnce(&MarketState) -> Result<T, FetchError>,
    ) -> Result<T, FetchError> {
        let mut state = self.state.lock().unwrap();
        count(&mut state.calls);
        if state.failing {
            return Err(FetchError::Status(503));
        }
        answer(&state)
    }
}

impl Default for MockMarketData {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketDataSource for MockMarketData {
    fn current_sentiment(&self) -> Result<SentimentReading, FetchError> {
        self.call(
            |c| c.current_sentiment += 1,
            |s| match s.sentiment {
                Some(v) => Ok(SentimentReading::new(v, classify(v).label(), Utc::now())),
                None => Err(FetchError::Malformed("no value".to_string())),
            },
        )
    }

    fn sentiment_history(&self) -> Result<Vec<SentimentPoint>, FetchError> {
        self.call(
            |c| c.sentiment_history += 1,
            |s| {
                Ok(s.sentiment_history
                    .iter()
                    .map(|&(value, secs)| SentimentPoint {
                        value,
                        timestamp: DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or_default(),
                    })
                    .collect())
            },
        )
    }

    fn market_snapshot(&self) -> Result<MarketSnapshot, FetchError> {
        self.call(
            |c| c.market_snapshot += 1,
            |s| match s.price {
                Some(_) => Ok(MarketSnapshot {
                    price: s.price,
                    change_24h: s.change_24h,
                    volume_24h: s.volume_24h,
                    fetched_at: Utc::now(),
                }),
                None => Err(FetchError::Malformed("no price".to_string())),
            },
        )
    }

    fn price_history(&self, days: u32) -> Result<Vec<f64>, FetchError> {
        self.call(
            |c| c.price_history += 1,
            |s| {
                let skip = s.price_history.len().saturating_sub(days as usize);
                Ok(s.price_history[skip..].to_vec())
            },
        )
    }
}

// =============================================================================
// Platform
// =============================================================================

#[derive(Debug)]
struct PlatformState {
    start: Instant,
    wall_start: DateTime<Utc>,
    elapsed: Duration,
    slept: Duration,
    memory: Option<u64>,
    network: NetworkStatus,
    fail_set_time: bool,
    set_times: Vec<DateTime<Utc>>,
}

/// A platform with a manual clock.
///
/// Time only moves when the loop sleeps or the test calls
/// [`advance`](Self::advance).
#[derive(Debug, Clone)]
pub struct MockPlatform {
    state: Arc<Mutex<PlatformState>>,
}

impl MockPlatform {
    /// Wall clock starting at 2024-01-01 00:00 UTC, plenty of memory, online.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(PlatformState {
                start: Instant::now(),
                wall_start: DateTime::<Utc>::from_timestamp(1_704_067_200, 0)
                    .unwrap_or_default(),
                elapsed: Duration::ZERO,
                slept: Duration::ZERO,
                memory: Some(512 * 1024 * 1024),
                network: NetworkStatus {
                    online: true,
                    ssid: Some("testnet".to_string()),
                    signal_dbm: Some("-55".to_string()),
                },
                fail_set_time: false,
                set_times: Vec::new(),
            })),
        }
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: Duration) {
        self.state.lock().unwrap().elapsed += duration;
    }

    /// Total time the loop has slept.
    pub fn slept(&self) -> Duration {
        self.state.lock().unwrap().slept
    }

    /// Report `bytes` of available memory.
    pub fn set_memory(&self, bytes: Option<u64>) {
        self.state.lock().unwrap().memory = bytes;
    }

    /// Report `network` as the wireless status.
    pub fn set_network(&self, network: NetworkStatus) {
        self.state.lock().unwrap().network = network;
    }

    /// Make clock setting fail.
    pub fn fail_set_time(&self, fail: bool) {
        self.state.lock().unwrap().fail_set_time = fail;
    }

    /// Every time the system clock was set to.
    pub fn set_times(&self) -> Vec<DateTime<Utc>> {
        self.state.lock().unwrap().set_times.clone()
    }
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl Platform for MockPlatform {
    fn now(&self) -> Instant {
        let state = self.state.lock().unwrap();
        state.start + state.elapsed
    }

    fn wall_time(&self) -> DateTime<Utc> {
        let state = self.state.lock().unwrap();
        let elapsed = TimeDelta::from_std(state.elapsed).unwrap_or(TimeDelta::zero());
        state.wall_start + elapsed
    }

    fn available_memory(&self) -> Option<u64> {
        self.state.lock().unwrap().memory
    }

    fn network_status(&self) -> NetworkStatus {
        self.state.lock().unwrap().network.clone()
    }

    fn set_system_time(&mut self, time: DateTime<Utc>) -> Result<(), HardwareError> {
        let mut state = self.state.lock().unwrap();
        if state.fail_set_time {
            return Err(HardwareError::Device("permission denied".to_string()));
        }
        state.set_times.push(time);
        Ok(())
    }

    fn sleep(&mut self, duration: Duration) {
        let mut state = self.state.lock().unwrap();
        state.elapsed += duration;
        state.slept += duration;
    }
}

// =============================================================================
// Animations
// =============================================================================

#[derive(Debug, Default)]
struct AnimationState {
    loaded: Vec<Clip>,
    failing: bool,
}

/// Clips made of plain colored frames.
#[derive(Debug, Clone, Default)]
pub struct MockAnimations {
    state: Arc<Mutex<AnimationState>>,
}

impl MockAnimations {
    /// Frames in every mock clip.
    pub const FRAMES_PER_CLIP: usize = 4;

    /// Create a mock store that serves every clip.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every clip requested, in order.
    pub fn loaded(&self) -> Vec<Clip> {
        self.state.lock().unwrap().loaded.clone()
    }

    /// Make every load fail.
    pub fn fail_all(&self, fail: bool) {
        self.state.lock().unwrap().failing = fail;
    }
}

impl AnimationStore for MockAnimations {
    fn load(&self, clip: Clip) -> Result<Vec<Frame>, RenderError> {
        let mut state = self.state.lock().unwrap();
        state.loaded.push(clip);
        if state.failing {
            return Err(RenderError::EmptyClip(format!("{:?}", clip)));
        }
        Ok((0..Self::FRAMES_PER_CLIP)
            .map(|i| {
                let level = 40 * (i as u8 + 1);
                Frame::filled(Rgb888::new(level, level, level))
            })
            .collect())
    }
}
