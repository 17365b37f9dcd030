//! Market data records.

use crate::sentiment::{SentimentBucket, classify};

use chrono::{DateTime, Utc};

/// Classification text used when no sentiment value is available.
pub const UNAVAILABLE_CLASSIFICATION: &str = "Error fetching data";

/// The current sentiment index.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentReading {
    /// Index value, `None` when no data could be fetched.
    pub value: Option<u8>,
    /// Provider classification text.
    pub classification: String,
    /// When the provider was asked.
    pub fetched_at: DateTime<Utc>,
}

impl SentimentReading {
    /// A reading with a value.
    pub fn new(value: u8, classification: impl Into<String>, fetched_at: DateTime<Utc>) -> Self {
        Self {
            value: Some(value),
            classification: classification.into(),
            fetched_at,
        }
    }

    /// The "no data" reading.
    pub fn unavailable(fetched_at: DateTime<Utc>) -> Self {
        Self {
            value: None,
            classification: UNAVAILABLE_CLASSIFICATION.to_string(),
            fetched_at,
        }
    }

    /// The bucket of the value, if any.
    pub fn bucket(&self) -> Option<SentimentBucket> {
        self.value.map(classify)
    }
}

/// One historical sentiment index value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentimentPoint {
    /// Index value.
    pub value: u8,
    /// Day the value belongs to.
    pub timestamp: DateTime<Utc>,
}

/// Direction of the 24h money flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlowDirection {
    /// Positive 24h change.
    Up,
    /// Negative 24h change.
    Down,
    /// Zero or unknown change.
    Neutral,
}

impl FlowDirection {
    /// Direction from the sign of a 24h percent change.
    pub fn from_change(change: Option<f64>) -> Self {
        match change {
            Some(c) if c > 0.0 => Self::Up,
            Some(c) if c < 0.0 => Self::Down,
            _ => Self::Neutral,
        }
    }
}

/// Current price figures of the tracked asset.
#[derive(Debug, Clone, PartialEq)]
pub struct MarketSnapshot {
    /// Price in USD.
    pub price: Option<f64>,
    /// 24h change in percent.
    pub change_24h: Option<f64>,
    /// 24h traded volume in USD.
    pub volume_24h: Option<f64>,
    /// When the provider was asked.
    pub fetched_at: DateTime<Utc>,
}

impl MarketSnapshot {
    /// The "no data" snapshot.
    pub fn unavailable(fetched_at: DateTime<Utc>) -> Self {
        Self {
            price: None,
            change_24h: None,
            volume_24h: None,
            fetched_at,
        }
    }

    /// Money flow direction of this snapshot.
    pub fn direction(&self) -> FlowDirection {
        FlowDirection::from_change(self.change_24h)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flow_direction_from_sign() {
        assert_eq!(FlowDirection::from_change(Some(2.5)), FlowDirection::Up);
        assert_eq!(FlowDirection::from_change(Some(-3.2)), FlowDirection::Down);
        assert_eq!(FlowDirection::from_change(Some(0.0)), FlowDirection::Neutral);
        assert_eq!(FlowDirection::from_change(None), FlowDirection::Neutral);
    }

    #[test]
    fn test_unavailable_reading_has_no_bucket() {
        let reading = SentimentReading::unavailable(Utc::now());
        assert_eq!(reading.bucket(), None);
        assert_eq!(reading.classification, UNAVAILABLE_CLASSIFICATION);

        let reading = SentimentReading::new(10, "Extreme Fear", Utc::now());
        assert_eq!(reading.bucket(), Some(SentimentBucket::ExtremeFear));
    }
}
