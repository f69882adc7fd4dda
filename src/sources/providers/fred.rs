// src/sources/providers/fred.rs
//! Economic-data provider (FRED series observations).
//!
//! Needs an API key. Without one the fetch fails with `ConfigurationMissing`,
//! which only degrades the economic slot of the snapshot.

use std::time::Duration;

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;

use crate::sources::types::{EconomicEvent, SourceError, SourceFetcher};

/// `(series id, display name)` pairs.
pub const ECONOMIC_SERIES: &[(&str, &str)] = &[
    ("FEDFUNDS", "Federal Funds Rate"),
    ("CPIAUCSL", "Consumer Price Index"),
    ("UNRATE", "Unemployment Rate"),
    ("DGS10", "10-Year Treasury Yield"),
    ("T10Y2Y", "10Y-2Y Treasury Spread"),
];

#[derive(Debug, Deserialize)]
struct Observations {
    #[serde(default)]
    observations: Vec<Observation>,
}

#[derive(Debug, Deserialize)]
struct Observation {
    date: String,
    value: String,
}

/// FRED encodes missing values as ".".
fn parse_value(v: &str) -> Option<f64> {
    v.trim().parse::<f64>().ok().filter(|x| x.is_finite())
}

/// Parse a descending observations payload into one event (latest + previous).
pub fn parse_observations(series_id: &str, name: &str, body: &str) -> Result<EconomicEvent, SourceError> {
    let obs: Observations =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(format!("fred json: {e}")))?;
    let mut it = obs.observations.into_iter();
    let latest = it
        .next()
        .ok_or_else(|| SourceError::Decode(format!("fred {series_id}: no observations")))?;
    let previous = it.next().and_then(|o| parse_value(&o.value));

    Ok(EconomicEvent {
        series_id: series_id.to_string(),
        name: name.to_string(),
        date: latest.date,
        value: parse_value(&latest.value),
        previous,
    })
}

pub struct FredSource {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FredSource {
    pub fn new(base_url: &str, api_key: Option<String>, timeout: Duration) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(4))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    async fn series(&self, key: &str, series_id: &str, name: &str) -> Result<EconomicEvent, SourceError> {
        let url = format!("{}/fred/series/observations", self.base_url);
        let resp = self
            .http
            .get(url)
            .query(&[
                ("series_id", series_id),
                ("api_key", key),
                ("file_type", "json"),
                ("sort_order", "desc"),
                ("limit", "2"),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "fred {series_id}: HTTP {}",
                resp.status()
            )));
        }
        let body = resp.text().await?;
        parse_observations(series_id, name, &body)
    }
}

#[async_trait]
impl SourceFetcher<Vec<EconomicEvent>> for FredSource {
    async fn fetch(&self) -> Result<Vec<EconomicEvent>, SourceError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(SourceError::ConfigurationMissing("FRED_API_KEY"))?;

        let results = join_all(
            ECONOMIC_SERIES
                .iter()
                .map(|(id, name)| self.series(key, id, name)),
        )
        .await;

        let mut out = Vec::with_capacity(ECONOMIC_SERIES.len());
        let mut last_err = None;
        for res in results {
            match res {
                Ok(ev) => out.push(ev),
                Err(e) => {
                    tracing::debug!(source = "economic", error = %e, "fred series failed");
                    last_err = Some(e);
                }
            }
        }
        match last_err {
            Some(e) if out.is_empty() => Err(e),
            _ => Ok(out),
        }
    }

    fn name(&self) -> &'static str {
        "economic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_key_is_configuration_missing() {
        let src = FredSource::new("http://127.0.0.1:9", None, Duration::from_secs(1)).unwrap();
        let err = src.fetch().await.unwrap_err();
        assert!(matches!(err, SourceError::ConfigurationMissing("FRED_API_KEY")));
    }

    #[test]
    fn parses_latest_and_previous_with_missing_marker() {
        let body = r#"{"observations":[
            {"date":"2026-09-01","value":"4.33"},
            {"date":"2026-08-01","value":"."}
        ]}"#;
        let ev = parse_observations("FEDFUNDS", "Federal Funds Rate", body).unwrap();
        assert_eq!(ev.date, "2026-09-01");
        assert_eq!(ev.value, Some(4.33));
        assert_eq!(ev.previous, None);

        assert!(parse_observations("X", "X", r#"{"observations":[]}"#).is_err());
    }
}
