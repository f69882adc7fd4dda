// src/sources/orchestrator.rs
//! Concurrent fan-out over every market-data source with per-source isolation.
//!
//! Each slot is fetched under its own timeout; errors, timeouts and panics are
//! converted into a `Failed` result carrying the slot's default payload. The
//! join happens in a fixed slot order, so the snapshot does not depend on which
//! source finishes first.

use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use futures::FutureExt;
use metrics::{counter, histogram};
use serde::Serialize;

use crate::sources::types::{
    CryptoQuote, EconomicEvent, MarketBreadth, MarketQuote, Movers, NewsItem, PriceSeries,
    SourceData, SourceError, SourceFetcher, SourceResult, SourceStatus,
};

pub type Fetcher<T> = Box<dyn SourceFetcher<T>>;

/// Static source definitions, one fetcher per snapshot slot.
pub struct Sources {
    pub indices: Fetcher<Vec<MarketQuote>>,
    pub movers: Fetcher<Movers>,
    pub global_markets: Fetcher<Vec<MarketQuote>>,
    pub crypto: Fetcher<Vec<CryptoQuote>>,
    pub forex: Fetcher<Vec<MarketQuote>>,
    pub commodities: Fetcher<Vec<MarketQuote>>,
    pub economic: Fetcher<Vec<EconomicEvent>>,
    pub news: Fetcher<Vec<NewsItem>>,
    pub breadth: Fetcher<MarketBreadth>,
    pub price_history: Fetcher<PriceSeries>,
}

/// Slot keys in their fixed order (also used for data-quality flags).
pub const SLOT_NAMES: [&str; 10] = [
    "indices",
    "movers",
    "globalMarkets",
    "crypto",
    "forex",
    "commodities",
    "economic",
    "news",
    "breadth",
    "priceHistory",
];

/// Fully populated aggregate of all source results for one request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub indices: SourceResult<Vec<MarketQuote>>,
    pub movers: SourceResult<Movers>,
    pub global_markets: SourceResult<Vec<MarketQuote>>,
    pub crypto: SourceResult<Vec<CryptoQuote>>,
    pub forex: SourceResult<Vec<MarketQuote>>,
    pub commodities: SourceResult<Vec<MarketQuote>>,
    pub economic: SourceResult<Vec<EconomicEvent>>,
    pub news: SourceResult<Vec<NewsItem>>,
    pub breadth: SourceResult<MarketBreadth>,
    pub price_history: SourceResult<PriceSeries>,
}

impl Snapshot {
    /// `(slot, status)` pairs in `SLOT_NAMES` order.
    pub fn statuses(&self) -> [(&'static str, SourceStatus); 10] {
        let s = [
            self.indices.status,
            self.movers.status,
            self.global_markets.status,
            self.crypto.status,
            self.forex.status,
            self.commodities.status,
            self.economic.status,
            self.news.status,
            self.breadth.status,
            self.price_history.status,
        ];
        std::array::from_fn(|i| (SLOT_NAMES[i], s[i]))
    }

    pub fn failed_count(&self) -> usize {
        self.statuses()
            .iter()
            .filter(|(_, st)| *st == SourceStatus::Failed)
            .count()
    }
}

pub struct Orchestrator {
    sources: Sources,
    source_timeout: Duration,
}

impl Orchestrator {
    pub fn new(sources: Sources, source_timeout: Duration) -> Self {
        Self {
            sources,
            source_timeout,
        }
    }

    pub fn source_timeout(&self) -> Duration {
        self.source_timeout
    }

    /// Fetch every source concurrently and wait for all of them.
    /// Source failures are absorbed; this never errors.
    pub async fn snapshot(&self) -> Snapshot {
        let s = &self.sources;
        let t = self.source_timeout;

        let (
            indices,
            movers,
            global_markets,
            crypto,
            forex,
            commodities,
            economic,
            news,
            breadth,
            price_history,
        ) = tokio::join!(
            guarded(&*s.indices, t),
            guarded(&*s.movers, t),
            guarded(&*s.global_markets, t),
            guarded(&*s.crypto, t),
            guarded(&*s.forex, t),
            guarded(&*s.commodities, t),
            guarded(&*s.economic, t),
            guarded(&*s.news, t),
            guarded(&*s.breadth, t),
            guarded(&*s.price_history, t),
        );

        let snap = Snapshot {
            indices,
            movers,
            global_markets,
            crypto,
            forex,
            commodities,
            economic,
            news,
            breadth,
            price_history,
        };

        tracing::info!(
            target: "orchestrator",
            failed = snap.failed_count(),
            price_points = snap.price_history.data.len(),
            "snapshot assembled"
        );
        snap
    }
}

/// Run one fetch with timeout + panic isolation and classify the outcome.
async fn guarded<T: SourceData>(fetcher: &dyn SourceFetcher<T>, timeout: Duration) -> SourceResult<T> {
    let name = fetcher.name();
    let t0 = Instant::now();

    let guarded_fetch = AssertUnwindSafe(fetcher.fetch()).catch_unwind();
    let outcome = match tokio::time::timeout(timeout, guarded_fetch).await {
        Ok(Ok(res)) => res,
        Ok(Err(_panic)) => Err(SourceError::Unavailable("fetcher panicked".to_string())),
        Err(_elapsed) => Err(SourceError::Timeout(timeout)),
    };

    let ms = t0.elapsed().as_secs_f64() * 1_000.0;
    histogram!("report_source_fetch_ms", "source" => name).record(ms);

    match outcome {
        Ok(data) => {
            let res = SourceResult::fetched(data);
            if res.status == SourceStatus::Degraded {
                tracing::debug!(source = name, "source returned empty payload");
            }
            res
        }
        Err(e) => {
            tracing::warn!(source = name, error = %e, "source failed; using default");
            counter!("report_source_failures_total", "source" => name).increment(1);
            SourceResult::failed(&e)
        }
    }
}
