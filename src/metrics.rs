use axum::{routing::get, Router};
use metrics::{describe_counter, describe_gauge, describe_histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use once_cell::sync::OnceCell;

/// One-time metrics registration (so series show up on /metrics).
pub fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("monitor_posts_fetched_total", "Posts returned by the feed.");
        describe_counter!(
            "monitor_posts_matched_total",
            "Posts mentioning at least one target keyword."
        );
        describe_counter!(
            "monitor_classify_errors_total",
            "Posts dropped because classification failed."
        );
        describe_counter!(
            "monitor_observations_ingested_total",
            "Observations inserted into topic windows."
        );
        describe_counter!(
            "monitor_observations_duplicate_total",
            "Observations skipped as already seen."
        );
        describe_counter!("monitor_alerts_emitted_total", "Alerts emitted by the gate.");
        describe_counter!(
            "monitor_alert_delivery_failures_total",
            "Alerts no channel could deliver."
        );
        describe_counter!("monitor_feed_errors_total", "Feed fetch failures per account.");
        describe_counter!(
            "monitor_store_errors_total",
            "Persistent store put/query failures."
        );
        describe_histogram!("monitor_feed_fetch_ms", "Feed fetch time in milliseconds.");
        describe_gauge!("monitor_topic_positive_ratio", "Current positive ratio per topic.");
        describe_gauge!("monitor_last_cycle_ts", "Unix ts when the last cycle finished.");
    });
}

pub struct Metrics {
    pub handle: PrometheusHandle,
}

impl Metrics {
    /// Install the Prometheus recorder for this process.
    pub fn init() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new().install_recorder()?;
        ensure_metrics_described();
        Ok(Self { handle })
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
