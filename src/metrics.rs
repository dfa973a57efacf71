use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and register series descriptions.
    pub fn init() -> Self {
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_pipeline_metrics();

        Self { handle }
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

/// One-time metrics registration (so series show up on /metrics).
pub fn describe_pipeline_metrics() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Batch runner invocations.");
        describe_counter!(
            "pipeline_runs_failed_total",
            "Batches that failed wholesale (cursor unchanged)."
        );
        describe_counter!(
            "pipeline_records_enriched_total",
            "Records enriched and handed to the sink."
        );
        describe_counter!(
            "pipeline_records_skipped_total",
            "Records deliberately excluded (length filter, label policy)."
        );
        describe_counter!(
            "pipeline_records_failed_total",
            "Records excluded by per-record provider failures."
        );
        describe_counter!(
            "pipeline_scheduler_ticks_total",
            "Scheduler trigger evaluations."
        );
        describe_gauge!(
            "pipeline_last_trigger_ts",
            "Unix ts of the last scheduler trigger."
        );
    });
}
