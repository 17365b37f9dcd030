//! External market data providers.

use crate::data::{MarketSnapshot, SentimentPoint, SentimentReading};
use crate::error::FetchError;

use chrono::{DateTime, Utc};
use log::debug;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// Request timeout for every provider call.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

/// Days of daily closes shown by the historical graph.
pub const PRICE_HISTORY_DAYS: u32 = 5;

const SENTIMENT_URL: &str = "https://api.alternative.me/fng/";
const MARKET_URL: &str = "https://api.coingecko.com/api/v3";
const COIN_ID: &str = "bitcoin";
const VS_CURRENCY: &str = "usd";
const USER_AGENT: &str = concat!("feargreed/", env!("CARGO_PKG_VERSION"));

// =============================================================================
// Market Data Source Trait
// =============================================================================

/// A provider of sentiment and market data.
///
/// Implementations do not retry and do not cache; both are the caller's job.
pub trait MarketDataSource: Send {
    /// The current sentiment index.
    fn current_sentiment(&self) -> Result<SentimentReading, FetchError>;

    /// All historical sentiment values, oldest first.
    fn sentiment_history(&self) -> Result<Vec<SentimentPoint>, FetchError>;

    /// Current price, 24h change and 24h volume.
    fn market_snapshot(&self) -> Result<MarketSnapshot, FetchError>;

    /// Daily closing prices for the trailing `days`, oldest first.
    fn price_history(&self, days: u32) -> Result<Vec<f64>, FetchError>;
}

// =============================================================================
// Response Shapes
// =============================================================================

#[derive(Debug, Deserialize)]
struct FngResponse {
    data: Vec<FngEntry>,
}

#[derive(Debug, Deserialize)]
struct FngEntry {
    value: String,
    value_classification: String,
    timestamp: String,
}

#[derive(Debug, Deserialize)]
struct CoinMarket {
    current_price: Option<f64>,
    price_change_percentage_24h: Option<f64>,
    total_volume: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct MarketChart {
    prices: Vec<(f64, f64)>,
}

fn parse_index(raw: &str) -> Result<u8, FetchError> {
    match raw.trim().parse::<u8>() {
        Ok(v) if v <= 100 => Ok(v),
        _ => Err(FetchError::Malformed(format!("sentiment value {:?}", raw))),
    }
}

fn parse_current_sentiment(
    response: FngResponse,
    fetched_at: DateTime<Utc>,
) -> Result<SentimentReading, FetchError> {
    let entry = response
        .data
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Malformed("empty sentiment data".to_string()))?;
    let value = parse_index(&entry.value)?;
    Ok(SentimentReading::new(
        value,
        entry.value_classification,
        fetched_at,
    ))
}

fn parse_sentiment_history(response: FngResponse) -> Result<Vec<SentimentPoint>, FetchError> {
    let mut points = response
        .data
        .iter()
        .map(|entry| {
            let value = parse_index(&entry.value)?;
            let timestamp = entry
                .timestamp
                .trim()
                .parse::<i64>()
                .ok()
                .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
                .ok_or_else(|| {
                    FetchError::Malformed(format!("sentiment timestamp {:?}", entry.timestamp))
                })?;
            Ok(SentimentPoint { value, timestamp })
        })
        .collect::<Result<Vec<_>, FetchError>>()?;
    points.sort_by_key(|p| p.timestamp);
    Ok(points)
}

fn parse_market_snapshot(
    markets: Vec<CoinMarket>,
    fetched_at: DateTime<Utc>,
) -> Result<MarketSnapshot, FetchError> {
    let coin = markets
        .into_iter()
        .next()
        .ok_or_else(|| FetchError::Malformed("empty market list".to_string()))?;
    if coin.current_price.is_none() {
        return Err(FetchError::Malformed("missing current_price".to_string()));
    }
    Ok(MarketSnapshot {
        price: coin.current_price,
        change_24h: coin.price_change_percentage_24h,
        volume_24h: coin.total_volume,
        fetched_at,
    })
}

fn parse_price_history(chart: MarketChart, days: u32) -> Result<Vec<f64>, FetchError> {
    let days = days as usize;
    if chart.prices.len() < days {
        return Err(FetchError::Malformed(format!(
            "expected {} daily prices, got {}",
            days,
            chart.prices.len()
        )));
    }
    let skip = chart.prices.len() - days;
    Ok(chart.prices.into_iter().skip(skip).map(|(_, p)| p).collect())
}

// =============================================================================
// HTTP Implementation
// =============================================================================

/// The public alternative.me and CoinGecko APIs over blocking HTTP.
pub struct HttpMarketData {
    client: reqwest::blocking::Client,
    sentiment_url: String,
    market_url: String,
}

impl HttpMarketData {
    /// Client for the public endpoints.
    pub fn new() -> Result<Self, FetchError> {
        Self::with_endpoints(SENTIMENT_URL, MARKET_URL)
    }

    /// Client for custom endpoints, e.g. a local proxy.
    pub fn with_endpoints(
        sentiment_url: impl Into<String>,
        market_url: impl Into<String>,
    ) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()?;
        Ok(Self {
            client,
            sentiment_url: sentiment_url.into(),
            market_url: market_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<T, FetchError> {
        debug!("GET {} {:?}", url, query);
        let response = self.client.get(url).query(query).send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }
        Ok(response.json::<T>()?)
    }
}

impl MarketDataSource for HttpMarketData {
    fn current_sentiment(&self) -> Result<SentimentReading, FetchError> {
        let response: FngResponse = self.get_json(&self.sentiment_url, &[])?;
        parse_current_sentiment(response, Utc::now())
    }

    fn sentiment_history(&self) -> Result<Vec<SentimentPoint>, FetchError> {
        let response: FngResponse = self.get_json(&self.sentiment_url, &[("limit", "0")])?;
        parse_sentiment_history(response)
    }

    fn market_snapshot(&self) -> Result<MarketSnapshot, FetchError> {
        let url = format!("{}/coins/markets", self.market_url);
        let markets: Vec<CoinMarket> = self.get_json(
            &url,
            &[
                ("ids", COIN_ID),
                ("vs_currency", VS_CURRENCY),
                ("order", "market_cap_desc"),
                ("per_page", "1"),
                ("page", "1"),
                ("sparkline", "false"),
                ("price_change_percentage", "24h"),
                ("locale", "en"),
            ],
        )?;
        parse_market_snapshot(markets, Utc::now())
    }

    fn price_history(&self, days: u32) -> Result<Vec<f64>, FetchError> {
        let url = format!("{}/coins/{}/market_chart", self.market_url, COIN_ID);
        let days_param = days.to_string();
        let chart: MarketChart = self.get_json(
            &url,
            &[
                ("vs_currency", VS_CURRENCY),
                ("days", days_param.as_str()),
                ("interval", "daily"),
            ],
        )?;
        parse_price_history(chart, days)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap()
    }

    #[test]
    fn test_parse_current_sentiment() {
        let body = r#"{"name":"Fear and Greed Index","data":[
            {"value":"10","value_classification":"Extreme Fear","timestamp":"1700000000","time_until_update":"100"}
        ],"metadata":{"error":null}}"#;
        let response: FngResponse = serde_json::from_str(body).unwrap();
        let reading = parse_current_sentiment(response, at()).unwrap();
        assert_eq!(reading.value, Some(10));
        assert_eq!(reading.classification, "Extreme Fear");
        assert_eq!(reading.fetched_at, at());
    }

    #[test]
    fn test_parse_current_sentiment_rejects_bad_value() {
        let body = r#"{"data":[{"value":"high","value_classification":"?","timestamp":"1"}]}"#;
        let response: FngResponse = serde_json::from_str(body).unwrap();
        assert!(matches!(
            parse_current_sentiment(response, at()),
            Err(FetchError::Malformed(_))
        ));

        let body = r#"{"data":[{"value":"101","value_classification":"?","timestamp":"1"}]}"#;
        let response: FngResponse = serde_json::from_str(body).unwrap();
        assert!(parse_current_sentiment(response, at()).is_err());

        let response: FngResponse = serde_json::from_str(r#"{"data":[]}"#).unwrap();
        assert!(parse_current_sentiment(response, at()).is_err());
    }

    #[test]
    fn test_parse_sentiment_history_orders_oldest_first() {
        let body = r#"{"data":[
            {"value":"40","value_classification":"Fear","timestamp":"1700172800"},
            {"value":"35","value_classification":"Fear","timestamp":"1700086400"},
            {"value":"20","value_classification":"Extreme Fear","timestamp":"1700000000"}
        ]}"#;
        let response: FngResponse = serde_json::from_str(body).unwrap();
        let points = parse_sentiment_history(response).unwrap();
        let values: Vec<u8> = points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![20, 35, 40]);
        assert_eq!(points[0].timestamp, at());
    }

    #[test]
    fn test_parse_market_snapshot() {
        let body = r#"[{"id":"bitcoin","current_price":43000.5,
            "price_change_percentage_24h":-3.2,"total_volume":21500000000.0}]"#;
        let markets: Vec<CoinMarket> = serde_json::from_str(body).unwrap();
        let snapshot = parse_market_snapshot(markets, at()).unwrap();
        assert_eq!(snapshot.price, Some(43000.5));
        assert_eq!(snapshot.change_24h, Some(-3.2));
        assert_eq!(snapshot.volume_24h, Some(21_500_000_000.0));

        let markets: Vec<CoinMarket> = serde_json::from_str("[]").unwrap();
        assert!(parse_market_snapshot(markets, at()).is_err());
    }

    #[test]
    fn test_parse_price_history_keeps_trailing_days() {
        let body = r#"{"prices":[[1,1.0],[2,2.0],[3,3.0],[4,4.0],[5,5.0],[6,6.0]]}"#;
        let chart: MarketChart = serde_json::from_str(body).unwrap();
        assert_eq!(
            parse_price_history(chart, 5).unwrap(),
            vec![2.0, 3.0, 4.0, 5.0, 6.0]
        );

        let chart: MarketChart = serde_json::from_str(r#"{"prices":[[1,1.0]]}"#).unwrap();
        assert!(parse_price_history(chart, 5).is_err());
    }

    #[test]
    fn test_shape_mismatch_is_a_decode_error() {
        assert!(serde_json::from_str::<FngResponse>(r#"{"data":{"value":"1"}}"#).is_err());
        assert!(serde_json::from_str::<MarketChart>(r#"{"prices":"none"}"#).is_err());
    }
}
