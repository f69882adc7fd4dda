// src/sources/providers/sibling.rs
//! Sibling market-data endpoints (movers, crypto, breadth) returning typed JSON.

use std::marker::PhantomData;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::sources::types::{SourceError, SourceFetcher};

/// Decode a sibling payload, unwrapping `envelope` (e.g. `"data"`) when given.
pub fn decode_payload<T: DeserializeOwned>(body: &str, envelope: Option<&str>) -> Result<T, SourceError> {
    let mut v: serde_json::Value =
        serde_json::from_str(body).map_err(|e| SourceError::Decode(format!("json: {e}")))?;
    if let Some(key) = envelope {
        v = v
            .get_mut(key)
            .map(serde_json::Value::take)
            .ok_or_else(|| SourceError::Decode(format!("missing envelope key '{key}'")))?;
    }
    serde_json::from_value(v).map_err(|e| SourceError::Decode(format!("payload: {e}")))
}

pub struct SiblingJsonSource<T> {
    name: &'static str,
    http: reqwest::Client,
    url: String,
    envelope: Option<&'static str>,
    _payload: PhantomData<fn() -> T>,
}

impl<T> SiblingJsonSource<T> {
    pub fn new(
        name: &'static str,
        base_url: &str,
        path: &str,
        envelope: Option<&'static str>,
        timeout: Duration,
    ) -> Result<Self, SourceError> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(2))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            name,
            http,
            url: format!("{}{}", base_url.trim_end_matches('/'), path),
            envelope,
            _payload: PhantomData,
        })
    }
}

#[async_trait]
impl<T> SourceFetcher<T> for SiblingJsonSource<T>
where
    T: DeserializeOwned + Send + 'static,
{
    async fn fetch(&self) -> Result<T, SourceError> {
        let resp = self.http.get(&self.url).send().await?;
        if !resp.status().is_success() {
            return Err(SourceError::Unavailable(format!(
                "{}: HTTP {}",
                self.name,
                resp.status()
            )));
        }
        let body = resp.text().await?;
        decode_payload(&body, self.envelope)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}
