//! Market Report Service: binary entrypoint.
//! Boots the Axum HTTP server with the report pipeline wired from config.

use shuttle_axum::ShuttleAxum;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use market_report::config::ReportConfig;

/// Compact tracing logs; filter from `REPORT_LOG`, then `RUST_LOG`, then a default.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("REPORT_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("market_report=info,orchestrator=info,pipeline=info,warn"));

    // Shuttle may already have installed a subscriber; keep theirs in that case.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();

    init_tracing();

    let cfg = ReportConfig::load_default().map_err(shuttle_runtime::Error::Custom)?;
    let router = market_report::build_app(&cfg).map_err(shuttle_runtime::Error::Custom)?;

    Ok(router.into())
}
