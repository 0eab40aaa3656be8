//! Distributed tracing support.
//!
//! # Responsibilities
//! - Build the `SdkTracerProvider` for the configured exporter
//! - Bridge `tracing` spans into OpenTelemetry spans (`tracing-opentelemetry`)
//! - `SpanExt`: exceptions and trace context on `tracing::Span`
//!
//! # Design Decisions
//! - Ambient context is tracing's per-task span stack (`Instrument`), never
//!   a process-wide "current span"
//! - `otel.name` / `otel.kind` fields set the exported span name and kind
//! - Status is set once, by the code owning the span; status setting lives
//!   on `OpenTelemetrySpanExt::set_status`
//! - Error-level events never change a span's status or add exceptions;
//!   only `record_exception` does

use opentelemetry::trace::{TraceContextExt, TracerProvider as _};
use opentelemetry::KeyValue;
use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::trace::{SdkTracer, SdkTracerProvider};
use opentelemetry_sdk::Resource;
use tracing::Subscriber;
use tracing_opentelemetry::{OpenTelemetryLayer, OpenTelemetrySpanExt};
use tracing_subscriber::registry::LookupSpan;

use crate::config::{ExporterKind, TracingConfig};
use crate::observability::context::TraceContext;
use crate::observability::export::{collector_processor, console_exporter, ExportFailures};

/// Name of the span event carrying a recorded failure.
pub const EXCEPTION_EVENT: &str = "exception";

/// Tracer provider for `config.exporter`, labelled with `service.name`.
///
/// Must be called from within a tokio runtime when the collector exporter
/// is selected.
pub fn tracer_provider(
    config: &TracingConfig,
    service_name: &str,
) -> Result<(SdkTracerProvider, ExportFailures), ExporterBuildError> {
    let resource = Resource::builder()
        .with_attribute(KeyValue::new("service.name", service_name.to_owned()))
        .build();
    let builder = SdkTracerProvider::builder().with_resource(resource);

    let pipeline = match config.exporter {
        ExporterKind::Collector => {
            let (processor, failures) = collector_processor(config)?;
            (builder.with_span_processor(processor).build(), failures)
        }
        ExporterKind::Console => {
            let exporter = console_exporter();
            let failures = exporter.failures();
            (builder.with_simple_exporter(exporter).build(), failures)
        }
        ExporterKind::None => (builder.build(), ExportFailures::default()),
    };
    Ok(pipeline)
}

/// The `tracing` → OpenTelemetry bridge layer.
pub fn otel_layer<S>(provider: &SdkTracerProvider, service_name: &str) -> OpenTelemetryLayer<S, SdkTracer>
where
    S: Subscriber + for<'span> LookupSpan<'span>,
{
    tracing_opentelemetry::layer()
        .with_tracer(provider.tracer(service_name.to_owned()))
        .with_location(false)
        .with_threads(false)
        .with_tracked_inactivity(false)
        .with_error_events_to_status(false)
        .with_error_events_to_exceptions(false)
}

/// Span-tree operations on `tracing::Span`.
///
/// Both are no-ops (an empty context) on spans the OpenTelemetry layer
/// never saw, e.g. under a subscriber without `otel_layer`.
pub trait SpanExt {
    /// Record an `exception` event on the span.
    fn record_exception(&self, error_type: &str, message: &str);

    /// Identifiers of this span.
    fn trace_context(&self) -> TraceContext;
}

impl SpanExt for tracing::Span {
    fn record_exception(&self, error_type: &str, message: &str) {
        self.add_event(
            EXCEPTION_EVENT,
            vec![
                KeyValue::new("exception.type", error_type.to_owned()),
                KeyValue::new("exception.message", message.to_owned()),
            ],
        );
    }

    fn trace_context(&self) -> TraceContext {
        let context = self.context();
        let span = context.span();
        let span_context = span.span_context();
        if span_context.is_valid() {
            TraceContext::new(
                span_context.trace_id().to_string(),
                span_context.span_id().to_string(),
            )
        } else {
            TraceContext::default()
        }
    }
}
