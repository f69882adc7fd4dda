// src/sources/stub.rs
//! In-memory fetchers for tests and offline runs.

use std::time::Duration;

use async_trait::async_trait;

use crate::sources::orchestrator::Sources;
use crate::sources::types::{SourceError, SourceFetcher};

/// Always returns a clone of `data`, optionally after a delay.
pub struct StaticSource<T> {
    name: &'static str,
    data: T,
    delay: Option<Duration>,
}

impl<T> StaticSource<T> {
    pub fn new(name: &'static str, data: T) -> Self {
        Self {
            name,
            data,
            delay: None,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

#[async_trait]
impl<T> SourceFetcher<T> for StaticSource<T>
where
    T: Clone + Send + Sync + 'static,
{
    async fn fetch(&self) -> Result<T, SourceError> {
        if let Some(d) = self.delay {
            tokio::time::sleep(d).await;
        }
        Ok(self.data.clone())
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Always fails with `SourceError::Unavailable`.
pub struct FailingSource {
    name: &'static str,
}

impl FailingSource {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl<T: Send + 'static> SourceFetcher<T> for FailingSource {
    async fn fetch(&self) -> Result<T, SourceError> {
        Err(SourceError::Unavailable(format!("{} is down", self.name)))
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

/// Panics inside the fetch future.
pub struct PanickingSource {
    name: &'static str,
}

impl PanickingSource {
    pub fn new(name: &'static str) -> Self {
        Self { name }
    }
}

#[async_trait]
impl<T: Send + 'static> SourceFetcher<T> for PanickingSource {
    async fn fetch(&self) -> Result<T, SourceError> {
        panic!("{} fetcher bug", self.name)
    }

    fn name(&self) -> &'static str {
        self.name
    }
}

impl Sources {
    /// Every slot fails; handy as a base to override single slots in tests.
    pub fn all_failing() -> Self {
        Self {
            indices: Box::new(FailingSource::new("indices")),
            movers: Box::new(FailingSource::new("movers")),
            global_markets: Box::new(FailingSource::new("globalMarkets")),
            crypto: Box::new(FailingSource::new("crypto")),
            forex: Box::new(FailingSource::new("forex")),
            commodities: Box::new(FailingSource::new("commodities")),
            economic: Box::new(FailingSource::new("economic")),
            news: Box::new(FailingSource::new("news")),
            breadth: Box::new(FailingSource::new("breadth")),
            price_history: Box::new(FailingSource::new("priceHistory")),
        }
    }
}
