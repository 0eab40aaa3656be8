//! Span capture for unit tests.

use opentelemetry::Value;
use opentelemetry_sdk::trace::{InMemorySpanExporter, InMemorySpanExporterBuilder, SdkTracerProvider, SpanData};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::layer::SubscriberExt;

use crate::observability::export::SpanSink;
use crate::observability::tracing::{otel_layer, EXCEPTION_EVENT};

/// Thread-local subscriber exporting every closed span into memory.
pub(crate) struct SpanCapture {
    _guard: DefaultGuard,
    _provider: SdkTracerProvider,
    exporter: InMemorySpanExporter,
}

impl SpanCapture {
    pub(crate) fn new() -> Self {
        let exporter = InMemorySpanExporterBuilder::new().build();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(SpanSink::new(exporter.clone()))
            .build();
        let subscriber = tracing_subscriber::registry().with(otel_layer(&provider, "test"));
        Self {
            _guard: tracing::subscriber::set_default(subscriber),
            _provider: provider,
            exporter,
        }
    }

    /// Every span closed so far, in close order.
    pub(crate) fn spans(&self) -> Vec<SpanData> {
        self.exporter.get_finished_spans().unwrap_or_default()
    }

    pub(crate) fn find(&self, name: &str) -> Option<SpanData> {
        self.spans().into_iter().find(|span| span.name == name)
    }
}

pub(crate) fn attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

pub(crate) fn exceptions(span: &SpanData) -> usize {
    span.events
        .events
        .iter()
        .filter(|event| event.name == EXCEPTION_EVENT)
        .count()
}
