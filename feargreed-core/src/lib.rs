//! Mode state machine, data cache and render loop for a Fear & Greed display.
//!
//! This crate drives a small 320x240 panel with four buttons and an RGB LED.
//! It rotates through a set of market visualizations (sentiment gauge, price
//! ticker, money flow, historical graph, volume, donation QR code), serves
//! provider data from a time-boxed cache with stale fallback, and hosts an
//! on-device settings menu persisted to a JSON file.
//!
//! Hardware sits behind three traits: [`DisplaySink`] for the panel, backlight
//! and LED, [`ButtonReader`] for the buttons and [`Platform`] for the clock,
//! memory and network. Market data comes from a [`MarketDataSource`] and clip
//! frames from an [`AnimationStore`].
//!
//! # Example
//!
//! ```no_run
//! use feargreed_core::{
//!     Engine, EngineConfig, GifLibrary, Hardware, HttpMarketData, LinuxPlatform, MarketData,
//!     SettingsStore,
//! };
//! # use feargreed_core::{MockButtons, MockSink};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let hardware = Hardware {
//!         sink: Box::new(MockSink::new()),
//!         buttons: Box::new(MockButtons::new()),
//!         platform: Box::new(LinuxPlatform::new()),
//!     };
//!     let mut engine = Engine::new(
//!         hardware,
//!         MarketData::new(Box::new(HttpMarketData::new()?)),
//!         Box::new(GifLibrary::new("/opt/feargreed/gifs")),
//!         SettingsStore::new("/opt/feargreed/config.json"),
//!         EngineConfig::default(),
//!     );
//!     engine.run_supervised()?;
//!     Ok(())
//! }
//! ```
//!
//! # Testing
//!
//! The mocks drive the whole loop without hardware or network:
//!
//! ```
//! use feargreed_core::{
//!     Button, DisplayMode, Engine, EngineConfig, Hardware, MarketData, MockAnimations,
//!     MockButtons, MockMarketData, MockPlatform, MockSink, Phase, SettingsStore,
//! };
//!
//! let buttons = MockButtons::new();
//! let hardware = Hardware {
//!     sink: Box::new(MockSink::new()),
//!     buttons: Box::new(buttons.clone()),
//!     platform: Box::new(MockPlatform::new()),
//! };
//! let store = SettingsStore::new(std::env::temp_dir().join("feargreed-doc-missing.json"));
//! let mut engine = Engine::new(
//!     hardware,
//!     MarketData::new(Box::new(MockMarketData::new())),
//!     Box::new(MockAnimations::new()),
//!     store,
//!     EngineConfig::default(),
//! );
//!
//! engine.tick().unwrap();
//! buttons.press(Button::Y);
//! engine.tick().unwrap();
//! assert_eq!(engine.phase(), Phase::Showing(DisplayMode::SentimentGauge));
//! ```

#![warn(missing_docs)]

mod animation;
mod cache;
mod clients;
mod data;
mod display;
mod engine;
mod error;
mod frame;
mod input;
mod menu;
mod mock;
mod modes;
mod platform;
pub mod scenes;
mod sentiment;
mod settings;
mod state;

// Re-export public API
pub use animation::{AnimationStore, Clip, GifLibrary, MAX_CLIP_FRAMES, frame_from_rgba};
pub use cache::{
    CacheEntry, CacheRead, CacheSlot, HISTORY_TTL, MarketData, ModeData, REALTIME_TTL,
    SENTIMENT_HISTORY_POINTS, SourceKey,
};
pub use clients::{HttpMarketData, MarketDataSource, PRICE_HISTORY_DAYS, REQUEST_TIMEOUT};
pub use data::{
    FlowDirection, MarketSnapshot, SentimentPoint, SentimentReading, UNAVAILABLE_CLASSIFICATION,
};
pub use display::{DisplaySink, LedColor, teardown};
pub use engine::{
    BACKLIGHT_FADE, BOOT_HOLD, Engine, EngineConfig, FATAL_PAUSE, Hardware,
    MEMORY_CHECK_INTERVAL, StopHandle, TICK,
};
pub use error::{EngineError, FetchError, HardwareError, RenderError, SettingsError};
pub use frame::{DEFAULT_FRAME_DURATION, Frame, FrameSequence, HEIGHT, WIDTH};
pub use input::{Button, ButtonReader, DEBOUNCE, InputPoller};
pub use menu::{
    BRIGHTNESS_STEP, DISPLAY_TIME_STEP, MenuOutcome, SettingsRow, TimeOutcome, TimeRow,
    offset_time,
};
pub use mock::{
    MockAnimations, MockButtons, MockCalls, MockMarketData, MockPlatform, MockSink, SinkLog,
};
pub use modes::{
    BOOT_FRAME_DURATION, BOOT_HOLD_FRAMES, BuildContext, DisplayMode, GRAPH_FRAME_DURATION,
    GRAPH_PAUSE_FRAMES, ModeRegistry, Rotation, Selection, Step, TICKER_FRAME_DURATION,
    TICKER_PAUSE_FRAMES,
};
pub use platform::{
    LOW_MEMORY_THRESHOLD, LinuxPlatform, MemoryStatus, NetworkStatus, Platform, parse_meminfo,
    parse_signal_level,
};
pub use sentiment::{BUCKET_TABLE, SentimentBucket, classify, mood_led};
pub use settings::{
    AppSettings, MAX_DISPLAY_SECONDS, MIN_DISPLAY_SECONDS, SETTINGS_FILE, SettingsStore,
};
pub use state::{Command, Phase, RenderState, dispatch};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_sink_records_calls() {
        let sink = MockSink::new();
        let mut device = sink.clone();

        device.blit(&Frame::black()).unwrap();
        device.set_backlight(0.5).unwrap();
        device.set_led(LedColor::red(1.0)).unwrap();

        let log = sink.snapshot();
        assert_eq!(log.blits, 1);
        assert_eq!(log.backlight, vec![0.5]);
        assert_eq!(log.led, vec![LedColor::red(1.0)]);
        assert!(!log.released);
    }

    #[test]
    fn test_mock_sink_blit_budget() {
        let sink = MockSink::new();
        sink.fail_blits_after(1);
        let mut device = sink.clone();

        assert!(device.blit(&Frame::black()).is_ok());
        assert!(matches!(
            device.blit(&Frame::black()),
            Err(HardwareError::Device(_))
        ));
        assert_eq!(sink.snapshot().blits, 1);
    }

    #[test]
    fn test_mock_platform_clock_moves_on_sleep() {
        let platform = MockPlatform::new();
        let mut handle = platform.clone();
        let t0 = platform.now();
        let wall0 = platform.wall_time();

        handle.sleep(TICK);
        platform.advance(TICK);
        assert_eq!(platform.now() - t0, 2 * TICK);
        assert_eq!((platform.wall_time() - wall0).num_milliseconds(), 20);
        assert_eq!(platform.slept(), TICK);
    }

    #[test]
    fn test_mock_market_data_failure_and_recovery() {
        let source = MockMarketData::new();
        source.set_sentiment(80);
        assert_eq!(source.current_sentiment().unwrap().value, Some(80));

        source.fail_all();
        assert!(source.market_snapshot().is_err());
        source.recover();
        assert!(source.market_snapshot().is_ok());

        let calls = source.calls();
        assert_eq!(calls.current_sentiment, 1);
        assert_eq!(calls.market_snapshot, 2);
    }

    #[test]
    fn test_mock_price_history_keeps_latest_days() {
        let source = MockMarketData::new();
        source.set_price_history((1..=8).map(f64::from).collect());
        assert_eq!(
            source.price_history(PRICE_HISTORY_DAYS).unwrap(),
            vec![4.0, 5.0, 6.0, 7.0, 8.0]
        );
    }
}
