// src/metrics.rs
// Prometheus wiring: series registration, the recorder, and the /metrics
// exposition route.

use metrics::{describe_counter, describe_gauge, describe_histogram, gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;
use shuttle_axum::axum::{routing::get, Router};

/// Register descriptions for every series the pipeline emits. Callable from
/// any entry point; registration happens once per process.
pub fn describe_series() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("pipeline_runs_total", "Completed pipeline runs.");
        describe_counter!(
            "pipeline_attempts_total",
            "Generation attempts by outcome."
        );
        describe_counter!("ledger_entries_total", "Ledger rows written, by outcome.");
        describe_counter!(
            "ledger_write_errors_total",
            "Swallowed ledger write failures."
        );
        describe_histogram!(
            "generation_ms",
            "Per-source generation time in milliseconds."
        );
        describe_gauge!("pipeline_last_run_ts", "Unix ts when a run last finished.");
        describe_gauge!(
            "pipeline_max_articles_per_day",
            "Configured daily draft ceiling."
        );
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Initialize the Prometheus recorder and expose a static gauge with the
    /// configured daily ceiling.
    pub fn init(max_articles_per_day: usize) -> Self {
        // Use default buckets to avoid API differences across crate versions.
        let builder = PrometheusBuilder::new();

        let handle = builder
            .install_recorder()
            .expect("prometheus: install recorder");

        describe_series();
        gauge!("pipeline_max_articles_per_day").set(max_articles_per_day as f64);

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
