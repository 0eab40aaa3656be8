//! Span export.
//!
//! # Data Flow
//! ```text
//! tracing span closes
//!     → OpenTelemetryLayer (tracing-opentelemetry)
//!         → SdkTracerProvider span processor
//!             → SpanSink (unset status → Ok, failure accounting)
//!                 → collector: BatchSpanProcessor → opentelemetry-otlp (OTLP/HTTP)
//!                 → console:   SimpleSpanProcessor → opentelemetry-stdout
//! ```
//!
//! # Design Decisions
//! - Export failures are logged and counted here and never reach a request
//! - `exporter = "none"` installs no processor; ids are still generated

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use opentelemetry::trace::Status;
use opentelemetry_otlp::{ExporterBuildError, WithExportConfig};
use opentelemetry_sdk::error::OTelSdkResult;
use opentelemetry_sdk::trace::{BatchConfigBuilder, BatchSpanProcessor, SpanData, SpanExporter};
use opentelemetry_sdk::Resource;

use crate::config::TracingConfig;
use crate::observability::metrics;

const TRACES_PATH: &str = "/v1/traces";

/// Spans lost to failed exports. Clones share the count.
#[derive(Debug, Clone, Default)]
pub struct ExportFailures(Arc<AtomicU64>);

impl ExportFailures {
    pub fn dropped(&self) -> u64 {
        self.0.load(Ordering::Relaxed)
    }

    fn add(&self, count: u64) {
        self.0.fetch_add(count, Ordering::Relaxed);
    }
}

/// Wraps the real exporter. A span closed without a status leaves as `Ok`;
/// a failed batch is logged, counted and reported to the processor.
#[derive(Debug)]
pub struct SpanSink<E> {
    inner: E,
    failures: ExportFailures,
}

impl<E: SpanExporter> SpanSink<E> {
    pub fn new(inner: E) -> Self {
        Self {
            inner,
            failures: ExportFailures::default(),
        }
    }

    pub fn failures(&self) -> ExportFailures {
        self.failures.clone()
    }
}

impl<E: SpanExporter> SpanExporter for SpanSink<E> {
    async fn export(&self, mut batch: Vec<SpanData>) -> OTelSdkResult {
        for span in &mut batch {
            if span.status == Status::Unset {
                span.status = Status::Ok;
            }
        }

        let count = batch.len() as u64;
        let result = self.inner.export(batch).await;
        if let Err(e) = &result {
            self.failures.add(count);
            metrics::record_span_dropped(count);
            tracing::warn!(error = %e, spans = count, "Span export failed");
        }
        result
    }

    fn shutdown_with_timeout(&mut self, timeout: Duration) -> OTelSdkResult {
        self.inner.shutdown_with_timeout(timeout)
    }

    fn force_flush(&mut self) -> OTelSdkResult {
        self.inner.force_flush()
    }

    fn set_resource(&mut self, resource: &Resource) {
        self.inner.set_resource(resource);
    }
}

/// Batched OTLP/HTTP export to the configured collector.
pub fn collector_processor(
    config: &TracingConfig,
) -> Result<(BatchSpanProcessor, ExportFailures), ExporterBuildError> {
    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_http()
        .with_endpoint(traces_endpoint(&config.collector_endpoint))
        .with_timeout(Duration::from_secs(config.export_timeout_secs))
        .build()?;
    let sink = SpanSink::new(exporter);
    let failures = sink.failures();

    let batch = BatchConfigBuilder::default()
        .with_max_queue_size(config.max_queue_size)
        .with_max_export_batch_size(config.max_batch_size)
        .with_scheduled_delay(Duration::from_millis(config.scheduled_delay_ms))
        .build();
    let processor = BatchSpanProcessor::builder(sink)
        .with_batch_config(batch)
        .build();

    Ok((processor, failures))
}

/// Human-readable spans on stdout.
pub fn console_exporter() -> SpanSink<opentelemetry_stdout::SpanExporter> {
    SpanSink::new(opentelemetry_stdout::SpanExporter::default())
}

/// `{endpoint}/v1/traces`, unless the endpoint already names the path.
fn traces_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim_end_matches('/');
    if endpoint.ends_with(TRACES_PATH) {
        endpoint.to_owned()
    } else {
        format!("{}{}", endpoint, TRACES_PATH)
    }
}
