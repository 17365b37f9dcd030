//! The render loop.
//!
//! [`Engine`] owns every piece of mutable state. Input polling, cache
//! refreshes, frame building and blits all happen on the thread that calls
//! [`Engine::tick`], so no state is shared across threads. The only thing
//! another thread may touch is the [`StopHandle`].

use crate::animation::AnimationStore;
use crate::cache::MarketData;
use crate::display::{DisplaySink, LedColor, teardown};
use crate::error::EngineError;
use crate::frame::{Frame, FrameSequence};
use crate::input::{Button, ButtonReader, DEBOUNCE, InputPoller};
use crate::menu::{MenuOutcome, SettingsRow, TimeOutcome, TimeRow, offset_time};
use crate::modes::{BuildContext, DisplayMode, ModeRegistry, Rotation, Selection, Step};
use crate::platform::{LOW_MEMORY_THRESHOLD, MemoryStatus, Platform};
use crate::sentiment::mood_led;
use crate::settings::{AppSettings, SettingsStore};
use crate::state::{Command, Phase, RenderState, dispatch};

use log::{debug, error, info, trace, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Sleep between two loop iterations.
pub const TICK: Duration = Duration::from_millis(10);
/// How long the boot screen stays up without a button press.
pub const BOOT_HOLD: Duration = Duration::from_secs(10);
/// How long the error LED stays on before teardown after a fatal error.
pub const FATAL_PAUSE: Duration = Duration::from_secs(5);
/// Duration of the backlight fade-in at start.
pub const BACKLIGHT_FADE: Duration = Duration::from_secs(1);
/// Interval between low memory checks while an animation-heavy mode runs.
pub const MEMORY_CHECK_INTERVAL: Duration = Duration::from_secs(1);

const BACKLIGHT_FADE_STEPS: u32 = 20;
const CLOCK_REDRAW: Duration = Duration::from_secs(1);

/// Loop timing and thresholds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Sleep between iterations.
    pub tick: Duration,
    /// Boot screen hold.
    pub boot_hold: Duration,
    /// Error LED pause before teardown.
    pub fatal_pause: Duration,
    /// Backlight fade-in at start.
    pub backlight_fade: Duration,
    /// Button debounce window.
    pub debounce: Duration,
    /// Available memory, in bytes, below which the low memory guard engages.
    pub low_memory_threshold: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick: TICK,
            boot_hold: BOOT_HOLD,
            fatal_pause: FATAL_PAUSE,
            backlight_fade: BACKLIGHT_FADE,
            debounce: DEBOUNCE,
            low_memory_threshold: LOW_MEMORY_THRESHOLD,
        }
    }
}

/// The devices the loop drives.
pub struct Hardware {
    /// Panel, backlight and LED.
    pub sink: Box<dyn DisplaySink>,
    /// Front panel buttons.
    pub buttons: Box<dyn ButtonReader>,
    /// Clock, memory and network services.
    pub platform: Box<dyn Platform>,
}

/// Asks a running loop to stop after its current tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request a stop.
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop was requested.
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Frames built ahead of a rotation, plus the sentiment they were built from.
struct Built {
    sequence: FrameSequence,
    sentiment: Option<Option<u8>>,
}

struct Prefetched {
    selection: Selection,
    built: Built,
}

// =============================================================================
// Engine
// =============================================================================

/// The mode state machine and render loop.
pub struct Engine {
    sink: Box<dyn DisplaySink>,
    input: InputPoller,
    platform: Box<dyn Platform>,
    data: MarketData,
    registry: ModeRegistry,
    store: SettingsStore,
    settings: AppSettings,
    rotation: Rotation,
    state: RenderState,
    config: EngineConfig,
    prefetched: Option<Prefetched>,
    led_reading: Option<Option<u8>>,
    memory_checked_at: Instant,
    stop: StopHandle,
    started: bool,
    torn_down: bool,
}

impl Engine {
    /// Create an engine. Settings are loaded from `store` immediately.
    pub fn new(
        hardware: Hardware,
        data: MarketData,
        animations: Box<dyn AnimationStore>,
        store: SettingsStore,
        config: EngineConfig,
    ) -> Self {
        let settings = store.load();
        let rotation = Rotation::from_settings(&settings);
        let now = hardware.platform.now();
        debug!(
            "rotation: {:?}",
            rotation.modes().iter().map(|m| m.name()).collect::<Vec<_>>()
        );

        Self {
            sink: hardware.sink,
            input: InputPoller::with_debounce(hardware.buttons, config.debounce),
            platform: hardware.platform,
            data,
            registry: ModeRegistry::new(animations),
            store,
            settings,
            rotation,
            state: RenderState::booting(FrameSequence::still(Frame::black()), now),
            config,
            prefetched: None,
            led_reading: None,
            memory_checked_at: now,
            stop: StopHandle::default(),
            started: false,
            torn_down: false,
        }
    }

    /// Loop state.
    pub fn state(&self) -> &RenderState {
        &self.state
    }

    /// Current phase.
    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    /// Current settings.
    pub fn settings(&self) -> &AppSettings {
        &self.settings
    }

    /// Current rotation.
    pub fn rotation(&self) -> &Rotation {
        &self.rotation
    }

    /// A handle that stops [`run`](Self::run) from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Fade the backlight in and show the boot screen.
    ///
    /// Called by the first [`tick`](Self::tick) if not called before.
    pub fn start(&mut self) -> Result<(), EngineError> {
        if self.started {
            return Ok(());
        }
        self.started = true;
        info!("starting with {} modes in rotation", self.rotation.len());

        self.sink.set_led(LedColor::OFF)?;
        let network = self.platform.network_status();
        match &network.ssid {
            Some(ssid) => info!("connected to {}", ssid),
            None => warn!("no wireless connection"),
        }
        let boot = self.registry.boot(&network);
        let now = self.platform.now();
        self.state = RenderState::booting(boot, now);
        self.present(now, true)?;
        self.fade_in_backlight()?;

        self.state.mode_entered_at = self.platform.now();
        Ok(())
    }

    /// Run one loop iteration: poll input, advance timers, present a frame.
    pub fn tick(&mut self) -> Result<(), EngineError> {
        self.start()?;

        let now = self.platform.now();
        let pressed = self.input.poll(now);
        match pressed {
            Some(button) => self.handle_button(button)?,
            None => self.advance(now)?,
        }

        let now = self.platform.now();
        self.present(now, pressed.is_some())?;
        if pressed.is_none() {
            self.platform.sleep(self.config.tick);
        }
        Ok(())
    }

    /// Tick until stopped. Errors propagate without teardown.
    pub fn run(&mut self) -> Result<(), EngineError> {
        self.start()?;
        while !self.stop.is_stopped() {
            self.tick()?;
        }
        info!("stop requested");
        Ok(())
    }

    /// Run until stopped or failed, then tear the hardware down.
    ///
    /// A failure or panic lights the LED red for the fatal pause first.
    pub fn run_supervised(&mut self) -> Result<(), EngineError> {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run()));
        let result = match outcome {
            Ok(result) => result,
            Err(payload) => Err(EngineError::Panicked(panic_message(payload.as_ref()))),
        };

        if let Err(e) = &result {
            error!("render loop failed: {}", e);
            self.signal_fatal();
        }
        self.shutdown();
        result
    }

    /// Switch the backlight and LED off and release the display.
    ///
    /// Only the first call does anything. Also called on drop.
    pub fn shutdown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        info!("shutting down");
        teardown(self.sink.as_mut());
    }

    // -------------------------------------------------------------------------
    // Timers
    // -------------------------------------------------------------------------

    fn advance(&mut self, now: Instant) -> Result<(), EngineError> {
        let elapsed = now.saturating_duration_since(self.state.mode_entered_at);
        match self.state.phase {
            Phase::Booting => {
                if elapsed >= self.config.boot_hold {
                    self.complete_boot()?;
                }
            }
            Phase::Showing(mode) => {
                let duration = self.settings.display_duration();
                if elapsed >= duration {
                    self.rotate(Step::Next)?;
                } else if elapsed + self.config.tick >= duration {
                    self.prefetch_next();
                } else if mode.is_animation_heavy() {
                    self.guard_memory(now)?;
                }
            }
            Phase::Settings => {}
            Phase::TimeSetting => {
                if elapsed >= CLOCK_REDRAW {
                    self.redraw_menu();
                    self.state.mode_entered_at = now;
                }
            }
        }
        Ok(())
    }

    fn guard_memory(&mut self, now: Instant) -> Result<(), EngineError> {
        if now.saturating_duration_since(self.memory_checked_at) < MEMORY_CHECK_INTERVAL {
            return Ok(());
        }
        self.memory_checked_at = now;
        if self.memory_status() == MemoryStatus::Low {
            let selection = self.rotation.resume(DisplayMode::CHEAPEST, MemoryStatus::Low);
            self.enter(selection)?;
        }
        Ok(())
    }

    fn memory_status(&self) -> MemoryStatus {
        MemoryStatus::from_available(
            self.platform.available_memory(),
            self.config.low_memory_threshold,
        )
    }

    // -------------------------------------------------------------------------
    // Mode transitions
    // -------------------------------------------------------------------------

    fn complete_boot(&mut self) -> Result<(), EngineError> {
        info!("boot complete");
        let selection = self
            .rotation
            .resume(self.rotation.first(), self.memory_status());
        self.enter(selection)
    }

    fn rotate(&mut self, step: Step) -> Result<(), EngineError> {
        let selection = self
            .rotation
            .select(self.state.cycle_position, step, self.memory_status());
        self.enter(selection)
    }

    fn prefetch_next(&mut self) {
        if self.prefetched.is_some() {
            return;
        }
        let selection = self.rotation.select(
            self.state.cycle_position,
            Step::Next,
            self.memory_status(),
        );
        if selection.degraded {
            return;
        }
        debug!("prefetching {}", selection.mode.name());
        let built = self.build(selection.mode);
        self.prefetched = Some(Prefetched { selection, built });
    }

    fn enter(&mut self, selection: Selection) -> Result<(), EngineError> {
        let built = if selection.degraded {
            warn!("available memory low, showing {}", selection.mode.name());
            self.prefetched = None;
            Built {
                sequence: self.registry.low_memory(),
                sentiment: None,
            }
        } else {
            match self.prefetched.take() {
                Some(prefetched) if prefetched.selection == selection => prefetched.built,
                _ => self.build(selection.mode),
            }
        };

        info!("showing {}", selection.mode.name());
        self.state.phase = Phase::Showing(selection.mode);
        self.state.cycle_position = selection.position;
        let now = self.platform.now();
        self.state.show(built.sequence, now);
        self.memory_checked_at = now;

        if let Some(value) = built.sentiment {
            self.led_reading = Some(value);
            self.refresh_led()?;
        }
        Ok(())
    }

    fn build(&mut self, mode: DisplayMode) -> Built {
        let now = self.platform.now();
        let wall_time = self.platform.wall_time();
        let data = self.data.collect(mode.sources(), now, wall_time);
        if data.stale {
            debug!("{} built from stale data", mode.name());
        }
        let ctx = BuildContext {
            data: &data,
            settings: &self.settings,
            settings_row: self.state.settings_row,
            time_row: self.state.time_row,
            wall_time,
        };
        let sequence = self.registry.build(mode, &ctx);
        let sentiment = match mode {
            DisplayMode::SentimentGauge => Some(data.sentiment.as_ref().and_then(|r| r.value)),
            _ => None,
        };
        Built {
            sequence,
            sentiment,
        }
    }

    // -------------------------------------------------------------------------
    // Buttons
    // -------------------------------------------------------------------------

    fn handle_button(&mut self, button: Button) -> Result<(), EngineError> {
        let command = dispatch(self.state.phase, button);
        debug!("{:?} in {:?}: {:?}", button, self.state.phase, command);
        match command {
            Command::CompleteBoot => self.complete_boot(),
            Command::EnterSettings => {
                if let Phase::Showing(mode) = self.state.phase {
                    self.state.prev_mode_before_settings = Some(mode);
                }
                self.prefetched = None;
                self.state.settings_row = SettingsRow::DisplayTime;
                self.open_menu(Phase::Settings);
                Ok(())
            }
            Command::NextMode => self.rotate(Step::Next),
            Command::PreviousMode => self.rotate(Step::Previous),
            Command::ToggleLed => {
                self.settings.led_enabled = !self.settings.led_enabled;
                info!("LED {}", if self.settings.led_enabled { "on" } else { "off" });
                self.store.save(&self.settings);
                self.refresh_led()
            }
            Command::CursorUp | Command::CursorDown => {
                let up = command == Command::CursorUp;
                match self.state.phase {
                    Phase::Settings => {
                        let row = self.state.settings_row;
                        self.state.settings_row = if up { row.up() } else { row.down() };
                    }
                    Phase::TimeSetting => {
                        let row = self.state.time_row;
                        self.state.time_row = if up { row.up() } else { row.down() };
                    }
                    _ => {}
                }
                self.redraw_menu();
                Ok(())
            }
            Command::Increase | Command::Decrease => {
                let increase = command == Command::Increase;
                match self.state.phase {
                    Phase::Settings => self.adjust_setting(increase),
                    Phase::TimeSetting => self.adjust_time(increase),
                    _ => Ok(()),
                }
            }
        }
    }

    fn adjust_setting(&mut self, increase: bool) -> Result<(), EngineError> {
        let row = self.state.settings_row;
        let outcome = if increase {
            row.increase(&mut self.settings)
        } else {
            row.decrease(&mut self.settings)
        };

        match outcome {
            MenuOutcome::Unchanged => {}
            MenuOutcome::Updated(row) => {
                debug!("{}", row.label(&self.settings));
                self.store.save(&self.settings);
                match row {
                    SettingsRow::ScreenBrightness => {
                        self.sink.set_backlight(self.settings.screen_brightness)?
                    }
                    SettingsRow::LedBrightness | SettingsRow::Led => self.refresh_led()?,
                    _ => {}
                }
                self.redraw_menu();
            }
            MenuOutcome::EnterTimeSetting => {
                self.settings.manual_time_offset_seconds = 0;
                self.state.time_row = TimeRow::Year;
                self.open_menu(Phase::TimeSetting);
            }
            MenuOutcome::Exit => self.exit_settings()?,
        }
        Ok(())
    }

    fn adjust_time(&mut self, increase: bool) -> Result<(), EngineError> {
        let row = self.state.time_row;
        let offset = &mut self.settings.manual_time_offset_seconds;
        let outcome = if increase {
            row.increase(offset)
        } else {
            row.decrease(offset)
        };

        match outcome {
            TimeOutcome::Unchanged => {}
            TimeOutcome::Adjusted => {
                self.store.save(&self.settings);
                self.redraw_menu();
            }
            TimeOutcome::Commit => self.commit_time(),
            TimeOutcome::Back => {
                self.settings.manual_time_offset_seconds = 0;
                self.store.save(&self.settings);
                self.open_menu(Phase::Settings);
            }
        }
        Ok(())
    }

    fn commit_time(&mut self) {
        let target = offset_time(
            self.platform.wall_time(),
            self.settings.manual_time_offset_seconds,
        );
        match self.platform.set_system_time(target) {
            Ok(()) => {
                info!("system time set to {}", target);
                self.settings.manual_time = true;
                self.settings.manual_time_offset_seconds = 0;
                self.store.save(&self.settings);
                self.open_menu(Phase::Settings);
            }
            Err(e) => warn!("failed to set system time: {}", e),
        }
    }

    fn exit_settings(&mut self) -> Result<(), EngineError> {
        self.rotation = Rotation::from_settings(&self.settings);
        let mode = self
            .state
            .prev_mode_before_settings
            .take()
            .unwrap_or_else(|| self.rotation.first());
        info!("leaving settings");
        let selection = self.rotation.resume(mode, self.memory_status());
        self.enter(selection)
    }

    fn open_menu(&mut self, phase: Phase) {
        let Some(mode) = phase.mode() else {
            return;
        };
        self.state.phase = phase;
        let built = self.build(mode);
        let now = self.platform.now();
        self.state.show(built.sequence, now);
    }

    fn redraw_menu(&mut self) {
        let phase = self.state.phase;
        if matches!(phase, Phase::Settings | Phase::TimeSetting)
            && let Some(mode) = phase.mode()
        {
            let built = self.build(mode);
            self.state.redraw(built.sequence);
        }
    }

    // -------------------------------------------------------------------------
    // Output
    // -------------------------------------------------------------------------

    fn refresh_led(&mut self) -> Result<(), EngineError> {
        let color = match self.led_reading {
            Some(value) => mood_led(value, &self.settings),
            None if !self.settings.led_enabled => LedColor::OFF,
            None => return Ok(()),
        };
        trace!("LED {:?}", color);
        self.sink.set_led(color)?;
        Ok(())
    }

    fn fade_in_backlight(&mut self) -> Result<(), EngineError> {
        let target = self.settings.screen_brightness;
        let pause = self.config.backlight_fade / BACKLIGHT_FADE_STEPS;
        for step in 1..=BACKLIGHT_FADE_STEPS {
            self.sink
                .set_backlight(target * f64::from(step) / f64::from(BACKLIGHT_FADE_STEPS))?;
            if !pause.is_zero() {
                self.platform.sleep(pause);
            }
        }
        Ok(())
    }

    fn present(&mut self, now: Instant, interacted: bool) -> Result<(), EngineError> {
        let len = self.state.sequence.len();
        match (self.state.frame_shown_at, self.state.sequence.frame_duration()) {
            (Some(shown), Some(duration)) if now.saturating_duration_since(shown) >= duration => {
                self.state.frame_cursor = (self.state.frame_cursor + 1) % len;
                self.state.frame_shown_at = Some(now);
            }
            (None, _) => self.state.frame_shown_at = Some(now),
            _ => {}
        }

        let frame = Arc::clone(self.state.sequence.frame_at(self.state.frame_cursor));
        let unchanged = self
            .state
            .last_blit
            .as_ref()
            .is_some_and(|last| Arc::ptr_eq(last, &frame) || **last == *frame);
        if unchanged && !interacted {
            return Ok(());
        }

        trace!("blit frame {}/{}", self.state.frame_cursor + 1, len);
        self.sink.blit(&frame)?;
        self.state.last_blit = Some(frame);
        Ok(())
    }

    fn signal_fatal(&mut self) {
        if let Err(e) = self.sink.set_led(LedColor::red(1.0)) {
            warn!("failed to show error LED: {}", e);
        }
        self.platform.sleep(self.config.fatal_pause);
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockAnimations, MockButtons, MockMarketData, MockPlatform, MockSink};
    use crate::settings::SETTINGS_FILE;
    use chrono::TimeDelta;
    use std::path::PathBuf;

    struct Rig {
        engine: Engine,
        sink: MockSink,
        buttons: MockButtons,
        platform: MockPlatform,
        source: MockMarketData,
        dir: PathBuf,
    }

    impl Drop for Rig {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.dir);
        }
    }

    fn rig(name: &str, settings: Option<AppSettings>) -> Rig {
        let dir = std::env::temp_dir().join(format!(
            "feargreed-engine-{}-{}",
            name,
            std::process::id()
        ));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        let store = SettingsStore::new(dir.join(SETTINGS_FILE));
        if let Some(settings) = settings {
            store.try_save(&settings).unwrap();
        }

        let sink = MockSink::new();
        let buttons = MockButtons::new();
        let platform = MockPlatform::new();
        let source = MockMarketData::new();
        let hardware = Hardware {
            sink: Box::new(sink.clone()),
            buttons: Box::new(buttons.clone()),
            platform: Box::new(platform.clone()),
        };
        let engine = Engine::new(
            hardware,
            MarketData::new(Box::new(source.clone())),
            Box::new(MockAnimations::new()),
            store,
            EngineConfig::default(),
        );
        Rig {
            engine,
            sink,
            buttons,
            platform,
            source,
            dir,
        }
    }

    fn tap(rig: &mut Rig, button: Button) {
        rig.buttons.press(button);
        rig.engine.tick().unwrap();
        rig.buttons.release(button);
        rig.engine.tick().unwrap();
    }

    #[test]
    fn test_start_fades_backlight_in() {
        let mut rig = rig("fade", None);
        rig.engine.start().unwrap();

        let log = rig.sink.snapshot();
        assert_eq!(log.backlight.len(), BACKLIGHT_FADE_STEPS as usize);
        assert!(log.backlight.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(log.backlight.last(), Some(&1.0));
        assert_eq!(log.blits, 1);
        assert_eq!(rig.engine.phase(), Phase::Booting);
    }

    #[test]
    fn test_boot_ends_on_button() {
        let mut rig = rig("boot-button", None);
        rig.engine.tick().unwrap();
        tap(&mut rig, Button::X);
        assert_eq!(
            rig.engine.phase(),
            Phase::Showing(DisplayMode::SentimentGauge)
        );
    }

    #[test]
    fn test_boot_ends_after_hold() {
        let mut rig = rig("boot-hold", None);
        rig.engine.start().unwrap();
        rig.platform.advance(BOOT_HOLD);
        rig.engine.tick().unwrap();
        assert_eq!(
            rig.engine.phase(),
            Phase::Showing(DisplayMode::SentimentGauge)
        );
    }

    #[test]
    fn test_rotation_after_display_duration() {
        let mut rig = rig("rotate", None);
        rig.engine.start().unwrap();
        tap(&mut rig, Button::A);
        assert_eq!(rig.engine.state().cycle_position, 0);

        rig.platform.advance(rig.engine.settings().display_duration());
        rig.engine.tick().unwrap();
        assert_eq!(rig.engine.phase(), Phase::Showing(DisplayMode::PriceTicker));
        assert_eq!(rig.engine.state().cycle_position, 1);
    }

    #[test]
    fn test_next_mode_is_prefetched_one_tick_early() {
        let mut rig = rig("prefetch", None);
        rig.engine.start().unwrap();
        tap(&mut rig, Button::A);
        let before = rig.source.calls().market_snapshot;

        // One tick has already passed since the gauge was entered.
        let duration = rig.engine.settings().display_duration();
        rig.platform.advance(duration - 2 * TICK);
        rig.engine.tick().unwrap();
        assert_eq!(rig.source.calls().market_snapshot, before + 1);
        assert_eq!(
            rig.engine.phase(),
            Phase::Showing(DisplayMode::SentimentGauge)
        );

        rig.engine.tick().unwrap();
        assert_eq!(rig.engine.phase(), Phase::Showing(DisplayMode::PriceTicker));
        assert_eq!(rig.source.calls().market_snapshot, before + 1);
    }

    #[test]
    fn test_buttons_rotate_both_ways() {
        let mut rig = rig("buttons", None);
        rig.engine.start().unwrap();
        tap(&mut rig, Button::A);
        rig.platform.advance(Duration::from_millis(20));

        tap(&mut rig, Button::B);
        assert_eq!(
            rig.engine.phase(),
            Phase::Showing(DisplayMode::HistoricalGraph)
        );
        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::Y);
        assert_eq!(
            rig.engine.phase(),
            Phase::Showing(DisplayMode::SentimentGauge)
        );
    }

    #[test]
    fn test_settings_round_trip_returns_to_mode() {
        let mut rig = rig("settings", None);
        rig.engine.start().unwrap();
        tap(&mut rig, Button::A);
        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::Y);
        assert_eq!(rig.engine.phase(), Phase::Showing(DisplayMode::PriceTicker));

        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::A);
        assert_eq!(rig.engine.phase(), Phase::Settings);

        // Cursor up from the first row wraps to Exit.
        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::A);
        assert_eq!(rig.engine.state().settings_row, SettingsRow::Exit);

        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::X);
        assert_eq!(rig.engine.phase(), Phase::Showing(DisplayMode::PriceTicker));
    }

    #[test]
    fn test_display_time_change_is_persisted() {
        let mut rig = rig("persist", None);
        rig.engine.start().unwrap();
        tap(&mut rig, Button::A);
        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::A);
        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::X);

        assert_eq!(rig.engine.settings().display_duration_seconds, 15);
        let stored = SettingsStore::new(rig.dir.join(SETTINGS_FILE)).try_load().unwrap();
        assert_eq!(stored.display_duration_seconds, 15);
    }

    #[test]
    fn test_toggle_led_switches_it_off() {
        let mut rig = rig("led", None);
        rig.engine.start().unwrap();
        tap(&mut rig, Button::A);
        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::X);

        assert!(!rig.engine.settings().led_enabled);
        assert_eq!(rig.sink.snapshot().led.last(), Some(&LedColor::OFF));
    }

    #[test]
    fn test_unchanged_frames_are_not_blitted() {
        let settings = AppSettings {
            enabled_modes: [DisplayMode::QrCode].into_iter().collect(),
            ..AppSettings::default()
        };
        let mut rig = rig("blits", Some(settings));
        rig.engine.start().unwrap();
        tap(&mut rig, Button::A);
        let blits = rig.sink.snapshot().blits;

        for _ in 0..20 {
            rig.engine.tick().unwrap();
        }
        assert_eq!(rig.sink.snapshot().blits, blits);
    }

    /// Boot, open settings and step into the clock screen.
    fn open_clock(rig: &mut Rig) {
        rig.engine.start().unwrap();
        tap(rig, Button::A);

        rig.platform.advance(Duration::from_millis(20));
        tap(rig, Button::A);
        for _ in 0..5 {
            rig.platform.advance(Duration::from_millis(20));
            tap(rig, Button::B);
        }
        assert_eq!(rig.engine.state().settings_row, SettingsRow::SetSystemTime);
        rig.platform.advance(Duration::from_millis(20));
        tap(rig, Button::X);
        assert_eq!(rig.engine.phase(), Phase::TimeSetting);
    }

    fn move_to(rig: &mut Rig, row: TimeRow) {
        while rig.engine.state().time_row != row {
            rig.platform.advance(Duration::from_millis(20));
            tap(rig, Button::B);
        }
    }

    fn stored(rig: &Rig) -> AppSettings {
        SettingsStore::new(rig.dir.join(SETTINGS_FILE))
            .try_load()
            .unwrap()
    }

    #[test]
    fn test_failed_time_commit_stays_in_time_setting() {
        let mut rig = rig("clock", None);
        rig.platform.fail_set_time(true);
        open_clock(&mut rig);

        // Year +1, then move to "Set Time" and confirm.
        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::X);
        assert!(rig.engine.settings().manual_time_offset_seconds > 0);
        move_to(&mut rig, TimeRow::SetTime);
        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::X);

        assert_eq!(rig.engine.phase(), Phase::TimeSetting);
        assert!(!rig.engine.settings().manual_time);
    }

    #[test]
    fn test_time_commit_sets_clock_and_returns_to_settings() {
        let mut rig = rig("clock-commit", None);
        open_clock(&mut rig);

        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::X);
        assert_eq!(
            rig.engine.settings().manual_time_offset_seconds,
            365 * 24 * 60 * 60
        );
        move_to(&mut rig, TimeRow::SetTime);
        rig.platform.advance(Duration::from_millis(20));
        let wall = rig.platform.wall_time();
        tap(&mut rig, Button::X);

        assert_eq!(rig.platform.set_times(), vec![wall + TimeDelta::days(365)]);
        assert_eq!(rig.engine.phase(), Phase::Settings);
        assert_eq!(rig.engine.settings().manual_time_offset_seconds, 0);
        assert!(rig.engine.settings().manual_time);

        let saved = stored(&rig);
        assert_eq!(saved.manual_time_offset_seconds, 0);
        assert!(saved.manual_time);
    }

    #[test]
    fn test_time_back_discards_offset() {
        let mut rig = rig("clock-back", None);
        open_clock(&mut rig);

        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::X);
        assert!(rig.engine.settings().manual_time_offset_seconds > 0);
        assert!(stored(&rig).manual_time_offset_seconds > 0);
        move_to(&mut rig, TimeRow::Back);
        rig.platform.advance(Duration::from_millis(20));
        tap(&mut rig, Button::Y);

        assert_eq!(rig.engine.phase(), Phase::Settings);
        assert_eq!(rig.engine.settings().manual_time_offset_seconds, 0);
        assert!(!rig.engine.settings().manual_time);
        assert!(rig.platform.set_times().is_empty());
        assert_eq!(stored(&rig).manual_time_offset_seconds, 0);
    }

    #[test]
    fn test_shutdown_is_idempotent() {
        let mut rig = rig("shutdown", None);
        rig.engine.start().unwrap();
        rig.engine.shutdown();
        rig.engine.shutdown();

        let log = rig.sink.snapshot();
        assert!(log.released);
        assert_eq!(log.releases, 1);
        assert_eq!(log.backlight.last(), Some(&0.0));
    }

    #[test]
    fn test_supervised_failure_lights_red_then_tears_down() {
        let mut rig = rig("fatal", None);
        rig.sink.fail_blits_after(3);
        let result = rig.engine.run_supervised();

        assert!(matches!(result, Err(EngineError::Hardware(_))));
        let log = rig.sink.snapshot();
        let red = log.led.iter().position(|c| *c == LedColor::red(1.0));
        let off = log.led.iter().rposition(|c| *c == LedColor::OFF);
        assert!(red.is_some());
        assert!(red < off);
        assert!(log.released);
        assert!(rig.platform.slept() >= FATAL_PAUSE);
    }

    #[test]
    fn test_stop_handle_ends_run() {
        let mut rig = rig("stop", None);
        rig.engine.stop_handle().stop();
        rig.engine.run().unwrap();
        assert_eq!(rig.engine.phase(), Phase::Booting);
    }

    #[test]
    fn test_stop_request_tears_down_supervised_run() {
        let mut rig = rig("stop-supervised", None);
        rig.engine.stop_handle().stop();
        rig.engine.run_supervised().unwrap();

        let log = rig.sink.snapshot();
        assert!(log.released);
        assert_eq!(log.led.last(), Some(&LedColor::OFF));
        assert!(!log.led.contains(&LedColor::red(1.0)));
        assert_eq!(log.backlight.last(), Some(&0.0));
    }

    #[test]
    fn test_panic_message() {
        let payload: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
    }
}
