use axum::{routing::get, Router};
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

static HANDLE: OnceCell<PrometheusHandle> = OnceCell::new();

impl Metrics {
    /// Install the Prometheus recorder once per process and describe the report series.
    pub fn init() -> anyhow::Result<Self> {
        let handle = HANDLE.get_or_try_init(|| {
            let handle = PrometheusBuilder::new()
                .install_recorder()
                .map_err(|e| anyhow::anyhow!("prometheus: install recorder: {e}"))?;
            describe();
            Ok::<_, anyhow::Error>(handle)
        })?;
        Ok(Self {
            handle: handle.clone(),
        })
    }

    /// Returns a router exposing `/metrics` with the Prometheus exposition format.
    pub fn router(&self) -> Router {
        let handle = self.handle.clone();
        Router::new().route(
            "/metrics",
            get(move || {
                let h = handle.clone();
                async move { h.render() }
            }),
        )
    }
}

fn describe() {
    describe_counter!("report_generated_total", "Market reports completed.");
    describe_counter!(
        "report_failed_total",
        "Market reports failed, labeled by stage."
    );
    describe_counter!(
        "report_source_failures_total",
        "Source fetches replaced by defaults, labeled by source."
    );
    describe_histogram!("report_generation_ms", "End-to-end report time in milliseconds.");
    describe_histogram!("report_source_fetch_ms", "Per-source fetch time in milliseconds.");
    describe_histogram!("report_news_parse_ms", "RSS parse time in milliseconds.");
}
