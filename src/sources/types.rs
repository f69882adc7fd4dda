// src/sources/types.rs
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Outcome of a single fetch attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Ok,
    /// Fetch succeeded but the payload was empty.
    Degraded,
    /// Fetch failed; `data` holds the documented default.
    Failed,
}

impl SourceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceStatus::Ok => "ok",
            SourceStatus::Degraded => "degraded",
            SourceStatus::Failed => "failed",
        }
    }
}

/// Errors a fetcher may raise. Never leaves the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("source unavailable: {0}")]
    Unavailable(String),

    #[error("source timed out after {0:?}")]
    Timeout(Duration),

    #[error("configuration missing: {0}")]
    ConfigurationMissing(&'static str),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Payload types that can sit in a snapshot slot.
pub trait SourceData: Default + Send + 'static {
    /// True when the payload carries no usable data.
    fn is_empty(&self) -> bool;
}

impl<T: Send + 'static> SourceData for Vec<T> {
    fn is_empty(&self) -> bool {
        Vec::is_empty(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResult<T> {
    pub data: T,
    pub status: SourceStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: SourceData> SourceResult<T> {
    /// Classify a successful fetch: empty payloads are `Degraded`.
    pub fn fetched(data: T) -> Self {
        let status = if data.is_empty() {
            SourceStatus::Degraded
        } else {
            SourceStatus::Ok
        };
        Self {
            data,
            status,
            error: None,
        }
    }

    /// Substitute the documented default for a failed fetch.
    pub fn failed(err: &SourceError) -> Self {
        Self {
            data: T::default(),
            status: SourceStatus::Failed,
            error: Some(err.to_string()),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == SourceStatus::Ok
    }
}

impl<T: SourceData> Default for SourceResult<T> {
    fn default() -> Self {
        Self {
            data: T::default(),
            status: SourceStatus::Failed,
            error: Some("not fetched".to_string()),
        }
    }
}

/// One market-data provider feeding one snapshot slot.
#[async_trait::async_trait]
pub trait SourceFetcher<T>: Send + Sync {
    async fn fetch(&self) -> Result<T, SourceError>;
    fn name(&self) -> &'static str;
}

// ------------------------------------------------------------
// Slot payloads
// ------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketQuote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
}

impl MarketQuote {
    /// Derive change fields from the provider's `regularMarketPrice` / `previousClose`.
    pub fn from_prices(symbol: &str, name: &str, price: f64, previous_close: f64) -> Self {
        let change = price - previous_close;
        let change_percent = if previous_close != 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        };
        Self {
            symbol: symbol.to_string(),
            name: name.to_string(),
            price,
            change,
            change_percent,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mover {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub price: f64,
    pub change_percent: f64,
    #[serde(default)]
    pub volume: u64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movers {
    #[serde(default)]
    pub gainers: Vec<Mover>,
    #[serde(default)]
    pub losers: Vec<Mover>,
    #[serde(default)]
    pub most_active: Vec<Mover>,
}

impl SourceData for Movers {
    fn is_empty(&self) -> bool {
        self.gainers.is_empty() && self.losers.is_empty() && self.most_active.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoQuote {
    pub symbol: String,
    #[serde(default)]
    pub name: String,
    pub price: f64,
    #[serde(default)]
    pub change_percent_24h: f64,
    #[serde(default)]
    pub market_cap: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EconomicEvent {
    pub series_id: String,
    pub name: String,
    pub date: String,
    pub value: Option<f64>,
    pub previous: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub source: String,
    pub url: Option<String>,
    pub published_at: u64, // unix seconds
    pub summary: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketBreadth {
    #[serde(default)]
    pub advancers: u32,
    #[serde(default)]
    pub decliners: u32,
    #[serde(default)]
    pub unchanged: u32,
    #[serde(default)]
    pub new_highs: u32,
    #[serde(default)]
    pub new_lows: u32,
}

impl MarketBreadth {
    pub fn advance_decline_ratio(&self) -> Option<f64> {
        if self.decliners == 0 {
            None
        } else {
            Some(self.advancers as f64 / self.decliners as f64)
        }
    }
}

impl SourceData for MarketBreadth {
    fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Chronological closing prices, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PriceSeries(Vec<f64>);

impl PriceSeries {
    /// Build from provider closes; non-finite values are dropped.
    pub fn from_closes<I: IntoIterator<Item = f64>>(closes: I) -> Self {
        Self(closes.into_iter().filter(|c| c.is_finite()).collect())
    }

    pub fn closes(&self) -> &[f64] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn last(&self) -> Option<f64> {
        self.0.last().copied()
    }
}

impl SourceData for PriceSeries {
    fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
