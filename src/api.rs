use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use tower_http::cors::CorsLayer;

use crate::error::ReportError;
use crate::narrative::MarketNarrative;
use crate::pipeline::ReportPipeline;
use crate::report::{RawData, Report};

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<ReportPipeline>,
    /// Outer deadline for one report request.
    pub request_timeout: Duration,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/api/market-report", get(market_report))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportEnvelope<'a> {
    success: bool,
    report: &'a MarketNarrative,
    generated_at: DateTime<Utc>,
    model: &'a str,
    data_quality: &'a BTreeMap<String, bool>,
    raw_data: &'a RawData,
}

impl<'a> From<&'a Report> for ReportEnvelope<'a> {
    fn from(r: &'a Report) -> Self {
        Self {
            success: true,
            report: &r.narrative,
            generated_at: r.generated_at,
            model: &r.model,
            data_quality: &r.data_quality,
            raw_data: &r.raw_data,
        }
    }
}

#[derive(serde::Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

fn error_response(status: StatusCode, error: &'static str, details: Option<String>) -> Response {
    (status, Json(ErrorBody { error, details })).into_response()
}

impl IntoResponse for ReportError {
    fn into_response(self) -> Response {
        let code = self.code();
        match self {
            ReportError::NarrativeService(msg) => {
                error_response(StatusCode::BAD_GATEWAY, code, Some(msg))
            }
            ReportError::NarrativeParse { reason, excerpt } => error_response(
                StatusCode::BAD_GATEWAY,
                code,
                Some(format!("{reason}; raw: {excerpt}")),
            ),
        }
    }
}

async fn market_report(State(state): State<AppState>) -> Response {
    // Dropping the pipeline future on timeout cancels every in-flight fetch.
    match tokio::time::timeout(state.request_timeout, state.pipeline.generate()).await {
        Ok(Ok(report)) => (StatusCode::OK, Json(ReportEnvelope::from(&report))).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(_) => {
            tracing::warn!(
                timeout_secs = state.request_timeout.as_secs(),
                "market report deadline exceeded"
            );
            error_response(
                StatusCode::GATEWAY_TIMEOUT,
                "timeout",
                Some(format!(
                    "report generation exceeded {}s",
                    state.request_timeout.as_secs()
                )),
            )
        }
    }
}
