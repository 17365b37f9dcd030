//! Render loop state and button dispatch.

use crate::frame::{Frame, FrameSequence};
use crate::input::Button;
use crate::menu::{SettingsRow, TimeRow};
use crate::modes::DisplayMode;

use std::sync::Arc;
use std::time::Instant;

/// Top level state of the render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Boot screen, until the first button press or the boot hold expires.
    Booting,
    /// A cyclable mode is on screen.
    Showing(DisplayMode),
    /// The settings menu is open.
    Settings,
    /// The clock screen is open.
    TimeSetting,
}

impl Phase {
    /// The mode on screen, if any.
    pub fn mode(self) -> Option<DisplayMode> {
        match self {
            Self::Booting => None,
            Self::Showing(mode) => Some(mode),
            Self::Settings => Some(DisplayMode::Settings),
            Self::TimeSetting => Some(DisplayMode::TimeSetting),
        }
    }
}

/// What a button press asks the loop to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Leave the boot screen.
    CompleteBoot,
    /// Open the settings menu.
    EnterSettings,
    /// Rotate forward.
    NextMode,
    /// Rotate backward.
    PreviousMode,
    /// Flip the LED on or off.
    ToggleLed,
    /// Move the menu cursor up.
    CursorUp,
    /// Move the menu cursor down.
    CursorDown,
    /// Increase or confirm the highlighted row.
    Increase,
    /// Decrease or go back on the highlighted row.
    Decrease,
}

/// Map a button press to a command, given the current phase.
///
/// ```
/// use feargreed_core::{dispatch, Button, Command, DisplayMode, Phase};
///
/// let showing = Phase::Showing(DisplayMode::PriceTicker);
/// assert_eq!(dispatch(showing, Button::Y), Command::NextMode);
/// assert_eq!(dispatch(Phase::Settings, Button::Y), Command::Decrease);
/// ```
pub fn dispatch(phase: Phase, button: Button) -> Command {
    match (phase, button) {
        (Phase::Booting, _) => Command::CompleteBoot,
        (Phase::Showing(_), Button::A) => Command::EnterSettings,
        (Phase::Showing(_), Button::B) => Command::PreviousMode,
        (Phase::Showing(_), Button::X) => Command::ToggleLed,
        (Phase::Showing(_), Button::Y) => Command::NextMode,
        (Phase::Settings | Phase::TimeSetting, Button::A) => Command::CursorUp,
        (Phase::Settings | Phase::TimeSetting, Button::B) => Command::CursorDown,
        (Phase::Settings | Phase::TimeSetting, Button::X) => Command::Increase,
        (Phase::Settings | Phase::TimeSetting, Button::Y) => Command::Decrease,
    }
}

/// Everything the render loop tracks between ticks.
///
/// Owned by the [`Engine`](crate::Engine) and only changed from its tick.
#[derive(Debug, Clone)]
pub struct RenderState {
    /// Current phase.
    pub phase: Phase,
    /// Position in the rotation.
    pub cycle_position: usize,
    /// Frames on screen.
    pub sequence: FrameSequence,
    /// Index of the frame on screen.
    pub frame_cursor: usize,
    /// When the frame on screen was first shown.
    pub frame_shown_at: Option<Instant>,
    /// When the current phase or mode was entered.
    pub mode_entered_at: Instant,
    /// Highlighted settings row.
    pub settings_row: SettingsRow,
    /// Highlighted clock row.
    pub time_row: TimeRow,
    /// Mode to return to when the settings menu closes.
    pub prev_mode_before_settings: Option<DisplayMode>,
    /// The last frame pushed to the panel.
    pub last_blit: Option<Arc<Frame>>,
}

impl RenderState {
    /// Booting state showing `sequence`.
    pub fn booting(sequence: FrameSequence, now: Instant) -> Self {
        Self {
            phase: Phase::Booting,
            cycle_position: 0,
            sequence,
            frame_cursor: 0,
            frame_shown_at: None,
            mode_entered_at: now,
            settings_row: SettingsRow::DisplayTime,
            time_row: TimeRow::Year,
            prev_mode_before_settings: None,
            last_blit: None,
        }
    }

    /// Swap in a new frame sequence, starting at its first frame.
    pub fn show(&mut self, sequence: FrameSequence, now: Instant) {
        self.sequence = sequence;
        self.frame_cursor = 0;
        self.frame_shown_at = None;
        self.mode_entered_at = now;
    }

    /// Replace the frames without restarting the mode timer.
    pub fn redraw(&mut self, sequence: FrameSequence) {
        self.sequence = sequence;
        self.frame_cursor = 0;
        self.frame_shown_at = None;
    }
}
