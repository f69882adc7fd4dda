// src/lib.rs
// Public library surface for integration tests (and potential reuse).

pub mod api;
pub mod config;
pub mod error;
pub mod indicators;
pub mod metrics;
pub mod narrative;
pub mod pipeline;
pub mod prompt;
pub mod report;
pub mod sources;

// ---- Re-exports for stable public API ----
pub use crate::error::ReportError;
pub use crate::pipeline::ReportPipeline;
pub use crate::report::Report;
pub use crate::sources::orchestrator::{Orchestrator, Snapshot, Sources};

use std::sync::Arc;

use anyhow::Context;
use axum::Router;
use tracing::info;

use crate::config::ReportConfig;

/// Wire sources, narrative client and pipeline from an explicit config.
pub fn build_pipeline(cfg: &ReportConfig) -> anyhow::Result<ReportPipeline> {
    let sources = sources::build_sources(&cfg.sources).context("building sources")?;
    let orchestrator = Orchestrator::new(sources, cfg.sources.source_timeout());
    let narrative =
        narrative::build_narrative_client(&cfg.narrative).context("building narrative client")?;
    Ok(ReportPipeline::new(orchestrator, narrative))
}

/// Full HTTP app for the given config (adds `/metrics` when enabled).
pub fn build_app(cfg: &ReportConfig) -> anyhow::Result<Router> {
    let pipeline = build_pipeline(cfg)?;
    info!(
        model = pipeline.model(),
        fred_key = cfg.sources.fred_api_key.is_some(),
        narrative_key = cfg.narrative.api_key.is_some(),
        source_timeout_ms = cfg.sources.source_timeout_ms,
        "report pipeline configured"
    );

    let state = api::AppState {
        pipeline: Arc::new(pipeline),
        request_timeout: cfg.request_timeout(),
    };
    let mut router = api::create_router(state);
    if cfg.metrics_enabled {
        let m = metrics::Metrics::init()?;
        router = router.merge(m.router());
    }
    Ok(router)
}

/// Build the app from `config/report.toml` (or `$REPORT_CONFIG_PATH`).
pub async fn app() -> anyhow::Result<Router> {
    let cfg = ReportConfig::load_default()?;
    build_app(&cfg)
}
