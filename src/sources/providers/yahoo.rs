// src/sources/providers/yahoo.rs
//! Quote/chart provider (Yahoo Finance v8 chart API).

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;

use crate::sources::types::{MarketQuote, PriceSeries, SourceError, SourceFetcher};

/// `(symbol, display name)` pairs.
pub type Instruments = &'static [(&'static str, &'static str)];

pub const US_INDICES: Instruments = &[
    ("^GSPC", "S&P 500"),
    ("^DJI", "Dow Jones"),
    ("^IXIC", "Nasdaq Composite"),
    ("^RUT", "Russell 2000"),
    ("^VIX", "CBOE Volatility Index"),
];

pub const GLOBAL_INDICES: Instruments = &[
    ("^FTSE", "FTSE 100"),
    ("^GDAXI", "DAX"),
    ("^FCHI", "CAC 40"),
    ("^N225", "Nikkei 225"),
    ("^HSI", "Hang Seng"),
    ("000001.SS", "Shanghai Composite"),
];

pub const FOREX_PAIRS: Instruments = &[
    ("EURUSD=X", "EUR/USD"),
    ("GBPUSD=X", "GBP/USD"),
    ("USDJPY=X", "USD/JPY"),
    ("DX-Y.NYB", "US Dollar Index"),
];

pub const COMMODITIES: Instruments = &[
    ("GC=F", "Gold"),
    ("SI=F", "Silver"),
    ("CL=F", "Crude Oil"),
    ("NG=F", "Natural Gas"),
    ("HG=F", "Copper"),
];

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: Chart,
}

#[derive(Debug, Deserialize)]
struct Chart {
    result: Option<Vec<ChartResult>>,
    error: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    meta: Meta,
    #[serde(default)]
    indicators: Option<Indicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Meta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteBlock>,
}

#[derive(Debug, Deserialize)]
struct QuoteBlock {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

/// Parsed chart payload: meta prices plus the non-null closes.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartData {
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub closes: Vec<f64>,
}

impl ChartData {
    /// Quote with change fields; falls back to the last close when the meta price is missing.
    pub fn to_quote(&self, symbol: &str, name: &str) -> Option<MarketQuote> {
        let price = self.price.or_else(|| self.closes.last().copied())?;
        let prev = self.previous_close.unwrap_or(price);
        Some(MarketQuote::from_prices(symbol, name, price, prev))
    }
}

pub fn parse_chart(body: &str) -> Result<ChartData, SourceError> {
    let env: ChartEnvelope =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(format!("chart json: {e}")))?;
    if let Some(err) = env.chart.error.filter(|v| !v.is_null()) {
        return Err(SourceError::Unavailable(format!("chart error: {err}")));
    }
    let first = env
        .chart
        .result
        .and_then(|mut v| if v.is_empty() { None } else { Some(v.swap_remove(0)) })
        .ok_or_else(|| SourceError::Decode("chart result empty".to_string()))?;

    let closes = first
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .map(|q| q.close.into_iter().flatten().filter(|c| c.is_finite()).collect())
        .unwrap_or_default();

    Ok(ChartData {
        price: first.meta.regular_market_price,
        previous_close: first.meta.previous_close.or(first.meta.chart_previous_close),
        closes,
    })
}

#[derive(Clone)]
pub struct YahooChartClient {
    http: reqwest::Client,
    base_url: String,
}

impl YahooChartClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .user_agent("Mozilla/5.0 (market-report-engine/0.1)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn chart(&self, symbol: &str, interval: &str, range: &str) -> Result<ChartData, SourceError> {
        let mut url = reqwest::Url::parse(&format!("{}/v8/finance/chart/", self.base_url))
            .map_err(|e| SourceError::Decode(format!("chart url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| SourceError::Decode("chart url cannot be a base".to_string()))?
            .pop_if_empty()
            .push(symbol);
        url.query_pairs_mut()
            .append_pair("interval", interval)
            .append_pair("range", range);

        let resp = self.http.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "chart {symbol}: HTTP {}",
                resp.status()
            )));
        }
        let body = resp.text().await?;
        parse_chart(&body)
    }
}

/// A list of instruments quoted from the chart endpoint (indices, forex, ...).
pub struct QuoteListSource {
    name: &'static str,
    client: YahooChartClient,
    instruments: Instruments,
}

impl QuoteListSource {
    pub fn new(name: &'static str, client: YahooChartClient, instruments: Instruments) -> Self {
        Self {
            name,
            client,
            instruments,
        }
    }
}

#[async_trait]
impl SourceFetcher<Vec<MarketQuote>> for QuoteListSource {
    async fn fetch(&self) -> Result<Vec<MarketQuote>, SourceError> {
        let calls = self
            .instruments
            .iter()
            .map(|(sym, _)| self.client.chart(sym, "1d", "5d"));
        let results = join_all(calls).await;

        let mut out = Vec::with_capacity(self.instruments.len());
        let mut last_err = None;
        for ((sym, name), res) in self.instruments.iter().zip(results) {
            match res {
                Ok(chart) => {
                    if let Some(q) = chart.to_quote(sym, name) {
                        out.push(q);
                    }
                }
                Err(e) => {
                    tracing::debug!(source = self.name, symbol = *sym, error = %e, "quote failed");
                    last_err = Some(e);
                }
            }
        }

        // Partial lists are fine; only a total wipe-out counts as a failure.
        match last_err {
            Some(e) if out.is_empty() => Err(e),
            _ => Ok(out),
        }
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Daily closes of the benchmark symbol, used by the indicator engine.
pub struct PriceHistorySource {
    client: YahooChartClient,
    symbol: String,
    range: String,
}

impl PriceHistorySource {
    pub fn new(client: YahooChartClient, symbol: &str, range: &str) -> Self {
        Self {
            client,
            symbol: symbol.to_string(),
            range: range.to_string(),
        }
    }
}

#[async_trait]
impl SourceFetcher<PriceSeries> for PriceHistorySource {
    async fn fetch(&self) -> Result<PriceSeries, SourceError> {
        let chart = self.client.chart(&self.symbol, "1d", &self.range).await?;
        Ok(PriceSeries::from_closes(chart.closes))
    }

    fn name(&self) -> &'static str {
        "priceHistory"
    }
}
