//! Sentiment buckets and the mappings derived from them.
//!
//! The gauge visual and the LED color both go through [`classify`], so they
//! always agree on the bucket.

use crate::display::LedColor;
use crate::settings::AppSettings;

use serde::{Deserialize, Serialize};

/// One of the five fixed sentiment index buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentBucket {
    /// 0 to 25.
    ExtremeFear,
    /// 26 to 45.
    Fear,
    /// 46 to 55.
    Neutral,
    /// 56 to 75.
    Greed,
    /// 76 and above.
    ExtremeGreed,
}

/// Inclusive upper bound of each bucket, in ascending order.
pub const BUCKET_TABLE: [(u8, SentimentBucket); 5] = [
    (25, SentimentBucket::ExtremeFear),
    (45, SentimentBucket::Fear),
    (55, SentimentBucket::Neutral),
    (75, SentimentBucket::Greed),
    (u8::MAX, SentimentBucket::ExtremeGreed),
];

/// Map a sentiment index value to its bucket.
///
/// ```
/// use feargreed_core::{classify, SentimentBucket};
///
/// assert_eq!(classify(25), SentimentBucket::ExtremeFear);
/// assert_eq!(classify(26), SentimentBucket::Fear);
/// assert_eq!(classify(76), SentimentBucket::ExtremeGreed);
/// ```
pub fn classify(value: u8) -> SentimentBucket {
    BUCKET_TABLE
        .iter()
        .find(|(upper, _)| value <= *upper)
        .map(|(_, bucket)| *bucket)
        .unwrap_or(SentimentBucket::ExtremeGreed)
}

impl SentimentBucket {
    /// Machine name, as used in logs and asset names.
    pub fn name(self) -> &'static str {
        match self {
            Self::ExtremeFear => "extreme_fear",
            Self::Fear => "fear",
            Self::Neutral => "neutral",
            Self::Greed => "greed",
            Self::ExtremeGreed => "extreme_greed",
        }
    }

    /// Human readable label.
    pub fn label(self) -> &'static str {
        match self {
            Self::ExtremeFear => "Extreme Fear",
            Self::Fear => "Fear",
            Self::Neutral => "Neutral",
            Self::Greed => "Greed",
            Self::ExtremeGreed => "Extreme Greed",
        }
    }

    /// Full-brightness LED color on the red to green ramp.
    pub fn led_ramp(self) -> (f64, f64, f64) {
        match self {
            Self::ExtremeFear => (1.0, 0.0, 0.0),
            Self::Fear => (1.0, 0.65, 0.0),
            Self::Neutral => (1.0, 1.0, 0.0),
            Self::Greed => (0.0, 1.0, 0.0),
            Self::ExtremeGreed => (0.0, 0.5, 0.0),
        }
    }
}

/// LED color for a sentiment reading under the current settings.
///
/// Off when the LED is disabled, solid red when there is no value.
pub fn mood_led(value: Option<u8>, settings: &AppSettings) -> LedColor {
    if !settings.led_enabled {
        return LedColor::OFF;
    }
    let brightness = settings.led_brightness;
    match value {
        Some(v) => {
            let (r, g, b) = classify(v).led_ramp();
            LedColor::new(r * brightness, g * brightness, b * brightness)
        }
        None => LedColor::red(brightness),
    }
}
