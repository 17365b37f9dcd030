//! User settings and their JSON file.

use crate::error::SettingsError;
use crate::modes::DisplayMode;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Default settings file name.
pub const SETTINGS_FILE: &str = "config.json";

/// Shortest allowed display duration in seconds.
pub const MIN_DISPLAY_SECONDS: u32 = 5;
/// Longest allowed display duration in seconds.
pub const MAX_DISPLAY_SECONDS: u32 = 30;

/// Persistent user settings.
///
/// Every change made from the on-device menu is written through to disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppSettings {
    /// Seconds each mode stays on screen (5-30).
    #[serde(alias = "display_time")]
    pub display_duration_seconds: u32,
    /// Backlight level (0.0-1.0).
    #[serde(alias = "brightness")]
    pub screen_brightness: f64,
    /// LED brightness multiplier (0.0-1.0).
    pub led_brightness: f64,
    /// Whether the status LED is used at all.
    pub led_enabled: bool,
    /// Modes taking part in the automatic rotation.
    pub enabled_modes: BTreeSet<DisplayMode>,
    /// Offset being dialled in on the time setting screen.
    #[serde(alias = "time_offset")]
    pub manual_time_offset_seconds: i64,
    /// Whether the clock was last set by hand on the device.
    pub manual_time: bool,
    /// Address shown by the QR code mode.
    pub donation_address: String,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            display_duration_seconds: 10,
            screen_brightness: 1.0,
            led_brightness: 0.5,
            led_enabled: true,
            enabled_modes: [
                DisplayMode::SentimentGauge,
                DisplayMode::PriceTicker,
                DisplayMode::MoneyFlow,
                DisplayMode::HistoricalGraph,
            ]
            .into_iter()
            .collect(),
            manual_time_offset_seconds: 0,
            manual_time: false,
            donation_address: "YOUR_BTC_ADDRESS".to_string(),
        }
    }
}

/// Round to one decimal place, so repeated 0.1 steps stay on the grid.
pub(crate) fn round_tenth(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

fn field<T: serde::de::DeserializeOwned>(map: &Map<String, Value>, keys: &[&str]) -> Option<T> {
    keys.iter()
        .filter_map(|k| map.get(*k))
        .find_map(|v| match serde_json::from_value(v.clone()) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("ignoring settings value {}: {}", v, e);
                None
            }
        })
}

impl AppSettings {
    /// Settings from a JSON object, field by field.
    ///
    /// A missing key, or one whose value has the wrong type, keeps that
    /// field's default. The result is clamped.
    pub fn from_json(map: &Map<String, Value>) -> Self {
        let defaults = Self::default();
        let offset = ["manual_time_offset_seconds", "time_offset"]
            .iter()
            .filter_map(|k| map.get(*k))
            .find_map(|v| v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)));

        Self {
            display_duration_seconds: field(map, &["display_duration_seconds", "display_time"])
                .unwrap_or(defaults.display_duration_seconds),
            screen_brightness: field(map, &["screen_brightness", "brightness"])
                .unwrap_or(defaults.screen_brightness),
            led_brightness: field(map, &["led_brightness"]).unwrap_or(defaults.led_brightness),
            led_enabled: field(map, &["led_enabled"]).unwrap_or(defaults.led_enabled),
            enabled_modes: field(map, &["enabled_modes"]).unwrap_or(defaults.enabled_modes),
            manual_time_offset_seconds: offset.unwrap_or(defaults.manual_time_offset_seconds),
            manual_time: field(map, &["manual_time"]).unwrap_or(defaults.manual_time),
            donation_address: field(map, &["donation_address"])
                .unwrap_or(defaults.donation_address),
        }
        .clamped()
    }

    /// Bring every field into its documented range.
    pub fn clamped(mut self) -> Self {
        self.display_duration_seconds = self
            .display_duration_seconds
            .clamp(MIN_DISPLAY_SECONDS, MAX_DISPLAY_SECONDS);
        self.screen_brightness = clamp_unit(self.screen_brightness);
        self.led_brightness = clamp_unit(self.led_brightness);
        self.enabled_modes.retain(|m| m.is_cyclable());
        self
    }

    /// [`display_duration_seconds`](Self::display_duration_seconds) as a duration.
    pub fn display_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.display_duration_seconds))
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

// =============================================================================
// Settings Store
// =============================================================================

/// Loads and saves [`AppSettings`] at a fixed path.
///
/// ```
/// use feargreed_core::{AppSettings, SettingsStore};
///
/// let path = std::env::temp_dir().join(format!("feargreed-doc-{}.json", std::process::id()));
/// let store = SettingsStore::new(&path);
///
/// let settings = AppSettings { display_duration_seconds: 20, ..AppSettings::default() };
/// store.save(&settings);
/// assert_eq!(store.load(), settings);
/// # let _ = std::fs::remove_file(&path);
/// ```
#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    /// A store backed by `path`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Read the settings file.
    pub fn try_load(&self) -> Result<AppSettings, SettingsError> {
        let text = fs::read_to_string(&self.path)?;
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(AppSettings::from_json(&map)),
            _ => Err(SettingsError::NotAnObject),
        }
    }

    /// Read the settings file, falling back to defaults on any failure.
    pub fn load(&self) -> AppSettings {
        match self.try_load() {
            Ok(settings) => {
                info!("loaded settings from {}", self.path.display());
                settings
            }
            Err(SettingsError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("no settings at {}, using defaults", self.path.display());
                AppSettings::default()
            }
            Err(e) => {
                warn!(
                    "could not load settings from {}, using defaults: {}",
                    self.path.display(),
                    e
                );
                AppSettings::default()
            }
        }
    }

    /// Write the settings file, replacing it.
    pub fn try_save(&self, settings: &AppSettings) -> Result<(), SettingsError> {
        let text = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, text)?;
        Ok(())
    }

    /// Write the settings file. Failures are logged and otherwise ignored.
    pub fn save(&self, settings: &AppSettings) {
        match self.try_save(settings) {
            Ok(()) => debug!("saved settings to {}", self.path.display()),
            Err(e) => warn!("could not save settings to {}: {}", self.path.display(), e),
        }
    }
}
