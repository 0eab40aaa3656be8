//! Metrics collection and exposition.
//!
//! # Responsibilities
//! - Define request metrics (count, latency, in-flight)
//! - Render the Prometheus text format for `GET /metrics`
//!
//! # Metrics
//! - `http_requests_total` (counter): requests by method, handler, status
//! - `http_request_duration_seconds` (histogram): latency distribution
//! - `http_requests_in_flight` (gauge): requests currently being served
//! - `span_export_dropped_total` (counter): spans lost to failed exports
//!
//! # Design Decisions
//! - `handler` is the matched route template, never the raw path
//! - Histogram buckets tuned for typical web latencies

use std::time::Duration;

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 1.5, 2.0, 2.5, 5.0, 10.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full("http_request_duration_seconds".to_string()),
        LATENCY_BUCKETS,
    )
}

/// Install the global Prometheus recorder and return its render handle.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = builder()?.install_recorder()?;
    tracing::info!("Prometheus recorder installed");
    Ok(handle)
}

/// A render handle whose recorder is not installed globally (tests).
pub fn detached_handle() -> PrometheusHandle {
    PrometheusBuilder::new().build_recorder().handle()
}

/// Record a finished request.
pub fn record_request(method: &str, handler: &str, status: u16, latency: Duration) {
    let status = status.to_string();
    metrics::counter!(
        "http_requests_total",
        "method" => method.to_string(),
        "handler" => handler.to_string(),
        "status" => status
    )
    .increment(1);
    metrics::histogram!(
        "http_request_duration_seconds",
        "method" => method.to_string(),
        "handler" => handler.to_string()
    )
    .record(latency.as_secs_f64());
}

pub fn request_started() {
    metrics::gauge!("http_requests_in_flight").increment(1.0);
}

pub fn request_finished() {
    metrics::gauge!("http_requests_in_flight").decrement(1.0);
}

pub fn record_span_dropped(count: u64) {
    metrics::counter!("span_export_dropped_total").increment(count);
}
