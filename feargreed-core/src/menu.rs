//! On-device settings and clock menus.

use crate::settings::{AppSettings, MAX_DISPLAY_SECONDS, MIN_DISPLAY_SECONDS, round_tenth};

use chrono::{DateTime, TimeDelta, Utc};

/// Display duration change per button press, in seconds.
pub const DISPLAY_TIME_STEP: u32 = 5;
/// Brightness change per button press.
pub const BRIGHTNESS_STEP: f64 = 0.1;

/// `wall` shifted by `offset_seconds`, saturating to `wall` on overflow.
pub fn offset_time(wall: DateTime<Utc>, offset_seconds: i64) -> DateTime<Utc> {
    TimeDelta::try_seconds(offset_seconds)
        .and_then(|delta| wall.checked_add_signed(delta))
        .unwrap_or(wall)
}

// =============================================================================
// Settings Menu
// =============================================================================

/// Rows of the settings menu, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SettingsRow {
    /// Seconds per mode.
    DisplayTime,
    /// Backlight level.
    ScreenBrightness,
    /// LED brightness.
    LedBrightness,
    /// LED on/off.
    Led,
    /// Read-only summary of the rotation.
    EnabledModes,
    /// Opens the clock screen.
    SetSystemTime,
    /// Leaves the menu.
    Exit,
}

/// What a settings menu press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    /// Nothing changed.
    Unchanged,
    /// The setting on this row changed and must be saved.
    Updated(SettingsRow),
    /// Open the clock screen.
    EnterTimeSetting,
    /// Leave the menu.
    Exit,
}

impl SettingsRow {
    /// All rows, top to bottom.
    pub const ALL: [SettingsRow; 7] = [
        SettingsRow::DisplayTime,
        SettingsRow::ScreenBrightness,
        SettingsRow::LedBrightness,
        SettingsRow::Led,
        SettingsRow::EnabledModes,
        SettingsRow::SetSystemTime,
        SettingsRow::Exit,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|r| *r == self).unwrap_or(0)
    }

    /// The row above, wrapping to the bottom.
    pub fn up(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// The row below, wrapping to the top.
    pub fn down(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Row text, including the current value.
    pub fn label(self, settings: &AppSettings) -> String {
        match self {
            Self::DisplayTime => format!("Display Time: {}s", settings.display_duration_seconds),
            Self::ScreenBrightness => format!("Screen Bright: {:.1}", settings.screen_brightness),
            Self::LedBrightness => format!("LED Bright: {:.1}", settings.led_brightness),
            Self::Led => format!(
                "LED: {}",
                if settings.led_enabled { "On" } else { "Off" }
            ),
            Self::EnabledModes => format!("Enabled Modes: {}", settings.enabled_modes.len()),
            Self::SetSystemTime => "Set System Time".to_string(),
            Self::Exit => "Exit".to_string(),
        }
    }

    /// Apply the increase/confirm button to this row.
    pub fn increase(self, settings: &mut AppSettings) -> MenuOutcome {
        match self {
            Self::DisplayTime => {
                let value = (settings.display_duration_seconds + DISPLAY_TIME_STEP)
                    .min(MAX_DISPLAY_SECONDS);
                set_duration(settings, value)
            }
            Self::ScreenBrightness => {
                let value = round_tenth((settings.screen_brightness + BRIGHTNESS_STEP).min(1.0));
                set_unit(&mut settings.screen_brightness, value, self)
            }
            Self::LedBrightness => {
                let value = round_tenth((settings.led_brightness + BRIGHTNESS_STEP).min(1.0));
                set_unit(&mut settings.led_brightness, value, self)
            }
            Self::Led => {
                settings.led_enabled = !settings.led_enabled;
                MenuOutcome::Updated(self)
            }
            Self::EnabledModes => MenuOutcome::Unchanged,
            Self::SetSystemTime => MenuOutcome::EnterTimeSetting,
            Self::Exit => MenuOutcome::Exit,
        }
    }

    /// Apply the decrease/back button to this row.
    pub fn decrease(self, settings: &mut AppSettings) -> MenuOutcome {
        match self {
            Self::DisplayTime => {
                let value = settings
                    .display_duration_seconds
                    .saturating_sub(DISPLAY_TIME_STEP)
                    .max(MIN_DISPLAY_SECONDS);
                set_duration(settings, value)
            }
            Self::ScreenBrightness => {
                let value = round_tenth((settings.screen_brightness - BRIGHTNESS_STEP).max(0.0));
                set_unit(&mut settings.screen_brightness, value, self)
            }
            Self::LedBrightness => {
                let value = round_tenth((settings.led_brightness - BRIGHTNESS_STEP).max(0.0));
                set_unit(&mut settings.led_brightness, value, self)
            }
            Self::Led => {
                settings.led_enabled = !settings.led_enabled;
                MenuOutcome::Updated(self)
            }
            Self::EnabledModes | Self::SetSystemTime => MenuOutcome::Unchanged,
            Self::Exit => MenuOutcome::Exit,
        }
    }
}

fn set_duration(settings: &mut AppSettings, value: u32) -> MenuOutcome {
    if value == settings.display_duration_seconds {
        return MenuOutcome::Unchanged;
    }
    settings.display_duration_seconds = value;
    MenuOutcome::Updated(SettingsRow::DisplayTime)
}

fn set_unit(field: &mut f64, value: f64, row: SettingsRow) -> MenuOutcome {
    if value == *field {
        return MenuOutcome::Unchanged;
    }
    *field = value;
    MenuOutcome::Updated(row)
}

// =============================================================================
// Time Setting Menu
// =============================================================================

/// Rows of the clock screen, top to bottom.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimeRow {
    /// ±365 days.
    Year,
    /// ±30 days.
    Month,
    /// ±1 day.
    Day,
    /// ±1 hour.
    Hour,
    /// ±1 minute.
    Minute,
    /// Commit the adjusted time.
    SetTime,
    /// Discard the offset.
    Back,
}

/// What a clock screen press did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOutcome {
    /// Nothing changed.
    Unchanged,
    /// The offset changed.
    Adjusted,
    /// Set the system clock to now plus the offset.
    Commit,
    /// Discard the offset and return to the settings menu.
    Back,
}

impl TimeRow {
    /// All rows, top to bottom.
    pub const ALL: [TimeRow; 7] = [
        TimeRow::Year,
        TimeRow::Month,
        TimeRow::Day,
        TimeRow::Hour,
        TimeRow::Minute,
        TimeRow::SetTime,
        TimeRow::Back,
    ];

    fn index(self) -> usize {
        Self::ALL.iter().position(|r| *r == self).unwrap_or(0)
    }

    /// The row above, wrapping to the bottom.
    pub fn up(self) -> Self {
        Self::ALL[(self.index() + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    /// The row below, wrapping to the top.
    pub fn down(self) -> Self {
        Self::ALL[(self.index() + 1) % Self::ALL.len()]
    }

    /// Row text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Year => "Year",
            Self::Month => "Month",
            Self::Day => "Day",
            Self::Hour => "Hour",
            Self::Minute => "Min",
            Self::SetTime => "Set Time",
            Self::Back => "Back",
        }
    }

    /// Seconds added or removed per press, for the adjustable rows.
    pub fn step_seconds(self) -> Option<i64> {
        const DAY: i64 = 24 * 60 * 60;
        match self {
            Self::Year => Some(365 * DAY),
            Self::Month => Some(30 * DAY),
            Self::Day => Some(DAY),
            Self::Hour => Some(60 * 60),
            Self::Minute => Some(60),
            Self::SetTime | Self::Back => None,
        }
    }

    /// Apply the increase/confirm button to this row.
    pub fn increase(self, offset_seconds: &mut i64) -> TimeOutcome {
        match self.step_seconds() {
            Some(step) => {
                *offset_seconds = offset_seconds.saturating_add(step);
                TimeOutcome::Adjusted
            }
            None if self == Self::SetTime => TimeOutcome::Commit,
            None => TimeOutcome::Back,
        }
    }

    /// Apply the decrease/back button to this row.
    pub fn decrease(self, offset_seconds: &mut i64) -> TimeOutcome {
        match self.step_seconds() {
            Some(step) => {
                *offset_seconds = offset_seconds.saturating_sub(step);
                TimeOutcome::Adjusted
            }
            None if self == Self::Back => TimeOutcome::Back,
            None => TimeOutcome::Unchanged,
        }
    }
}
