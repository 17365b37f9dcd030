//! Display modes, rotation policy and frame building.

use crate::animation::{AnimationStore, Clip};
use crate::cache::{ModeData, SourceKey};
use crate::data::MarketSnapshot;
use crate::error::RenderError;
use crate::frame::{DEFAULT_FRAME_DURATION, FrameSequence};
use crate::menu::{SettingsRow, TimeRow, offset_time};
use crate::platform::{MemoryStatus, NetworkStatus};
use crate::scenes;
use crate::settings::AppSettings;

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Time each counting frame of the price ticker is shown.
pub const TICKER_FRAME_DURATION: Duration = Duration::from_millis(100);
/// Pause frames after the ticker has counted up.
pub const TICKER_PAUSE_FRAMES: usize = 10;
/// Time each step of the historical graph is shown.
pub const GRAPH_FRAME_DURATION: Duration = Duration::from_millis(100);
/// Pause frames after the graph is complete.
pub const GRAPH_PAUSE_FRAMES: usize = 5;
/// Time each boot line is shown before the next one is typed.
pub const BOOT_FRAME_DURATION: Duration = Duration::from_millis(400);
/// Frames the completed boot screen is held before it starts over.
pub const BOOT_HOLD_FRAMES: usize = 20;

// =============================================================================
// Display Mode
// =============================================================================

/// Every visualization the appliance can show.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum DisplayMode {
    /// Animated sentiment gauge.
    #[serde(alias = "fear_greed")]
    SentimentGauge,
    /// Counting price ticker.
    PriceTicker,
    /// Up/down/neutral money flow animation.
    MoneyFlow,
    /// Five day price chart.
    HistoricalGraph,
    /// 24h trading volume.
    Volume,
    /// Donation address QR code.
    QrCode,
    /// Settings menu. Never rotated into.
    #[serde(alias = "config")]
    Settings,
    /// Clock adjustment screen. Never rotated into.
    TimeSetting,
}

impl DisplayMode {
    /// Modes eligible for automatic rotation, in rotation order.
    pub const CYCLABLE: [DisplayMode; 6] = [
        DisplayMode::SentimentGauge,
        DisplayMode::PriceTicker,
        DisplayMode::MoneyFlow,
        DisplayMode::HistoricalGraph,
        DisplayMode::Volume,
        DisplayMode::QrCode,
    ];

    /// The mode chosen when resources are short.
    pub const CHEAPEST: DisplayMode = DisplayMode::PriceTicker;

    /// Whether the mode takes part in automatic rotation.
    pub fn is_cyclable(self) -> bool {
        Self::CYCLABLE.contains(&self)
    }

    /// Whether the mode decodes or draws many frames.
    pub fn is_animation_heavy(self) -> bool {
        matches!(
            self,
            Self::SentimentGauge | Self::MoneyFlow | Self::HistoricalGraph
        )
    }

    /// Name used in logs.
    pub fn name(self) -> &'static str {
        match self {
            Self::SentimentGauge => "sentiment_gauge",
            Self::PriceTicker => "price_ticker",
            Self::MoneyFlow => "money_flow",
            Self::HistoricalGraph => "historical_graph",
            Self::Volume => "volume",
            Self::QrCode => "qr_code",
            Self::Settings => "settings",
            Self::TimeSetting => "time_setting",
        }
    }

    /// Cached sources refreshed on entry.
    pub fn sources(self) -> &'static [SourceKey] {
        match self {
            Self::SentimentGauge => &[SourceKey::Sentiment],
            Self::PriceTicker | Self::MoneyFlow | Self::Volume => &[SourceKey::Market],
            Self::HistoricalGraph => &[SourceKey::PriceHistory, SourceKey::SentimentHistory],
            Self::QrCode | Self::Settings | Self::TimeSetting => &[],
        }
    }

    /// Text of the error frame shown when the mode fails to build.
    pub fn error_text(self) -> &'static str {
        match self {
            Self::SentimentGauge => "GIF Error",
            Self::PriceTicker => "Price Error",
            Self::MoneyFlow => "Money Flow Error",
            Self::HistoricalGraph => "Graph Error",
            Self::Volume => "Volume Error",
            Self::QrCode => "QR Error",
            Self::Settings => "Menu Error",
            Self::TimeSetting => "Time Error",
        }
    }
}

// =============================================================================
// Rotation
// =============================================================================

/// Direction of a rotation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Forward, wrapping from last to first.
    Next,
    /// Backward, wrapping from first to last.
    Previous,
}

/// The outcome of a rotation step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    /// Position in the rotation.
    pub position: usize,
    /// Mode at that position.
    pub mode: DisplayMode,
    /// Whether the low memory guard overrode the step.
    pub degraded: bool,
}

/// The enabled cyclable modes in rotation order.
///
/// Never empty: with nothing enabled, the rotation is just the cheapest mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rotation {
    modes: Vec<DisplayMode>,
}

impl Rotation {
    /// The rotation for the given settings.
    pub fn from_settings(settings: &AppSettings) -> Self {
        Self::from_modes(
            DisplayMode::CYCLABLE
                .into_iter()
                .filter(|m| settings.enabled_modes.contains(m)),
        )
    }

    /// A rotation of the cyclable modes in `modes`, kept in rotation order.
    pub fn from_modes(modes: impl IntoIterator<Item = DisplayMode>) -> Self {
        let wanted: Vec<DisplayMode> = modes.into_iter().collect();
        let mut modes: Vec<DisplayMode> = DisplayMode::CYCLABLE
            .into_iter()
            .filter(|m| wanted.contains(m))
            .collect();
        if modes.is_empty() {
            modes.push(DisplayMode::CHEAPEST);
        }
        Self { modes }
    }

    /// The modes, in order.
    pub fn modes(&self) -> &[DisplayMode] {
        &self.modes
    }

    /// Number of modes.
    pub fn len(&self) -> usize {
        self.modes.len()
    }

    /// Always false.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// The first mode.
    pub fn first(&self) -> DisplayMode {
        self.modes[0]
    }

    /// The mode at `position`, wrapping.
    pub fn mode_at(&self, position: usize) -> DisplayMode {
        self.modes[position % self.modes.len()]
    }

    /// Position of `mode`, if it is in the rotation.
    pub fn position_of(&self, mode: DisplayMode) -> Option<usize> {
        self.modes.iter().position(|m| *m == mode)
    }

    /// Step from `position`, honoring the low memory guard.
    ///
    /// ```
    /// use feargreed_core::{DisplayMode, MemoryStatus, Rotation, Step};
    ///
    /// let rotation = Rotation::from_modes(DisplayMode::CYCLABLE);
    /// let last = rotation.len() - 1;
    /// let next = rotation.select(last, Step::Next, MemoryStatus::Sufficient);
    /// assert_eq!(next.mode, DisplayMode::SentimentGauge);
    ///
    /// let guarded = rotation.select(0, Step::Next, MemoryStatus::Low);
    /// assert_eq!(guarded.mode, DisplayMode::PriceTicker);
    /// ```
    pub fn select(&self, position: usize, step: Step, memory: MemoryStatus) -> Selection {
        let len = self.modes.len();
        let position = position % len;
        let stepped = match step {
            Step::Next => (position + 1) % len,
            Step::Previous => (position + len - 1) % len,
        };
        self.land(stepped, memory)
    }

    /// Show `mode` directly, or the first mode if it is not in the rotation.
    pub fn resume(&self, mode: DisplayMode, memory: MemoryStatus) -> Selection {
        self.land(self.position_of(mode).unwrap_or(0), memory)
    }

    fn land(&self, position: usize, memory: MemoryStatus) -> Selection {
        if memory == MemoryStatus::Low {
            return Selection {
                position: self.position_of(DisplayMode::CHEAPEST).unwrap_or(position),
                mode: DisplayMode::CHEAPEST,
                degraded: true,
            };
        }
        Selection {
            position,
            mode: self.modes[position],
            degraded: false,
        }
    }
}

// =============================================================================
// Mode Registry
// =============================================================================

/// Everything a mode build may look at.
#[derive(Debug, Clone, Copy)]
pub struct BuildContext<'a> {
    /// Cached data collected for the mode.
    pub data: &'a ModeData,
    /// Current settings.
    pub settings: &'a AppSettings,
    /// Highlighted settings row.
    pub settings_row: SettingsRow,
    /// Highlighted time setting row.
    pub time_row: TimeRow,
    /// Current wall clock time.
    pub wall_time: DateTime<Utc>,
}

/// Builds the frame sequence of each mode.
///
/// A failed build is replaced by a single error frame.
pub struct ModeRegistry {
    animations: Box<dyn AnimationStore>,
}

impl ModeRegistry {
    /// A registry drawing clips from `animations`.
    pub fn new(animations: Box<dyn AnimationStore>) -> Self {
        Self { animations }
    }

    /// Frames of `mode`. Never fails.
    pub fn build(&self, mode: DisplayMode, ctx: &BuildContext<'_>) -> FrameSequence {
        match self.try_build(mode, ctx) {
            Ok(sequence) => {
                debug!("built {} frames for {}", sequence.len(), mode.name());
                sequence
            }
            Err(e) => {
                warn!("failed to build {}: {}", mode.name(), e);
                FrameSequence::still(scenes::error_frame(mode.error_text()))
            }
        }
    }

    /// Frames of `mode`, or the reason they could not be built.
    pub fn try_build(
        &self,
        mode: DisplayMode,
        ctx: &BuildContext<'_>,
    ) -> Result<FrameSequence, RenderError> {
        match mode {
            DisplayMode::SentimentGauge => {
                let clip = match ctx.data.sentiment.as_ref().and_then(|r| r.bucket()) {
                    Some(bucket) => Clip::Mood(bucket),
                    None => Clip::MoodError,
                };
                self.clip(clip)
            }
            DisplayMode::PriceTicker => {
                let snapshot = market_or_unavailable(ctx);
                let frames = scenes::price_ticker(&snapshot)?;
                Ok(FrameSequence::animated(frames, TICKER_FRAME_DURATION)?
                    .hold_last(TICKER_PAUSE_FRAMES))
            }
            DisplayMode::MoneyFlow => {
                let snapshot = market_or_unavailable(ctx);
                self.clip(Clip::MoneyFlow(snapshot.direction()))
            }
            DisplayMode::HistoricalGraph => {
                let frames =
                    scenes::historical_graph(&ctx.data.price_history, &ctx.data.sentiment_history)?;
                Ok(FrameSequence::animated(frames, GRAPH_FRAME_DURATION)?
                    .hold_last(GRAPH_PAUSE_FRAMES))
            }
            DisplayMode::Volume => {
                let snapshot = market_or_unavailable(ctx);
                Ok(FrameSequence::still(scenes::volume(&snapshot)?))
            }
            DisplayMode::QrCode => Ok(FrameSequence::still(scenes::qr_code(
                &ctx.settings.donation_address,
            )?)),
            DisplayMode::Settings => Ok(FrameSequence::still(scenes::settings_menu(
                ctx.settings,
                ctx.settings_row,
            ))),
            DisplayMode::TimeSetting => {
                let adjusted = offset_time(ctx.wall_time, ctx.settings.manual_time_offset_seconds);
                Ok(FrameSequence::still(scenes::time_setting(
                    adjusted,
                    ctx.time_row,
                )))
            }
        }
    }

    /// The single frame shown while memory is low.
    pub fn low_memory(&self) -> FrameSequence {
        FrameSequence::still(scenes::error_frame("Low Memory"))
    }

    /// The boot screen for the given network status.
    pub fn boot(&self, network: &NetworkStatus) -> FrameSequence {
        match FrameSequence::animated(scenes::boot_frames(network), BOOT_FRAME_DURATION) {
            Ok(sequence) => sequence.hold_last(BOOT_HOLD_FRAMES),
            Err(_) => FrameSequence::still(scenes::error_frame("Boot Error")),
        }
    }

    fn clip(&self, clip: Clip) -> Result<FrameSequence, RenderError> {
        let frames = self.animations.load(clip)?;
        FrameSequence::animated(frames, DEFAULT_FRAME_DURATION)
    }
}

fn market_or_unavailable(ctx: &BuildContext<'_>) -> MarketSnapshot {
    ctx.data
        .market
        .clone()
        .unwrap_or_else(|| MarketSnapshot::unavailable(ctx.wall_time))
}
