//! Button polling with debounce.

use log::trace;
use std::time::{Duration, Instant};

/// Minimum time between two honored button presses.
pub const DEBOUNCE: Duration = Duration::from_millis(5);

/// The four front panel buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    /// Top left.
    A,
    /// Bottom left.
    B,
    /// Top right.
    X,
    /// Bottom right.
    Y,
}

impl Button {
    /// All buttons, in polling priority order.
    pub const ALL: [Button; 4] = [Button::A, Button::B, Button::X, Button::Y];

    fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::X => 2,
            Self::Y => 3,
        }
    }
}

/// Raw button line levels.
///
/// Implementations report the logical state: `true` while held down,
/// whatever the electrical polarity of the line.
pub trait ButtonReader: Send {
    /// Whether `button` is currently held down.
    fn is_pressed(&mut self, button: Button) -> bool;
}

/// Turns held buttons into debounced press events.
///
/// A press is reported on the tick its line goes down. Presses arriving
/// within [`DEBOUNCE`] of the last honored one are dropped, not queued.
pub struct InputPoller {
    reader: Box<dyn ButtonReader>,
    debounce: Duration,
    held: [bool; 4],
    last_honored: Option<Instant>,
}

impl InputPoller {
    /// A poller with the default debounce window.
    pub fn new(reader: Box<dyn ButtonReader>) -> Self {
        Self::with_debounce(reader, DEBOUNCE)
    }

    /// A poller with a custom debounce window.
    pub fn with_debounce(reader: Box<dyn ButtonReader>, debounce: Duration) -> Self {
        Self {
            reader,
            debounce,
            held: [false; 4],
            last_honored: None,
        }
    }

    /// Read the buttons once and return at most one new press.
    pub fn poll(&mut self, now: Instant) -> Option<Button> {
        let mut pressed = None;
        for button in Button::ALL {
            let down = self.reader.is_pressed(button);
            let was_down = std::mem::replace(&mut self.held[button.index()], down);
            if down && !was_down && pressed.is_none() {
                pressed = Some(button);
            }
        }

        let button = pressed?;
        if let Some(last) = self.last_honored
            && now.saturating_duration_since(last) < self.debounce
        {
            trace!("dropping {:?} inside debounce window", button);
            return None;
        }
        self.last_honored = Some(now);
        Some(button)
    }
}
