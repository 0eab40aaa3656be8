//! Shared utilities for integration testing.
//!
//! `Harness` installs a thread-local subscriber (OpenTelemetry layer over an
//! in-memory span exporter plus a JSON log layer writing to a buffer) and builds
//! the fully layered router. Tests use `#[tokio::test]`, whose current-thread
//! runtime keeps every task on the thread that owns the subscriber.

#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use opentelemetry::trace::{SpanId, SpanKind};
use opentelemetry_sdk::trace::{InMemorySpanExporter, InMemorySpanExporterBuilder, SdkTracerProvider, SpanData};

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tower::ServiceExt;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;

use telemetry_demo::config::AppConfig;
use telemetry_demo::http::{build_router, AppState};
use telemetry_demo::observability::export::SpanSink;
use telemetry_demo::observability::logging::{env_filter, json_layer};
use telemetry_demo::observability::metrics::detached_handle;
use telemetry_demo::observability::tracing::EXCEPTION_EVENT;
use telemetry_demo::observability::otel_layer;

/// Per-stage delay used by the text endpoint in tests.
pub const STAGE_DELAY_MS: u64 = 20;

/// Captured JSON log lines.
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

impl LogCapture {
    /// Every captured line, parsed.
    pub fn lines(&self) -> Vec<Value> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    /// Only the per-request records (the ones carrying `status_code`).
    pub fn request_records(&self) -> Vec<Value> {
        self.lines()
            .into_iter()
            .filter(|line| line.get("status_code").is_some())
            .collect()
    }
}

pub struct Harness {
    pub config: AppConfig,
    pub spans: InMemorySpanExporter,
    pub logs: LogCapture,
    pub provider: SdkTracerProvider,
    _guard: DefaultGuard,
}

impl Harness {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.endpoints.stage_delay_ms = STAGE_DELAY_MS;
        Self::with_config(config)
    }

    pub fn with_config(config: AppConfig) -> Self {
        let spans = InMemorySpanExporterBuilder::new().build();
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(SpanSink::new(spans.clone()))
            .build();
        Self::build(config, spans, provider)
    }

    /// Route spans through `provider` instead of the in-memory exporter.
    pub fn with_provider(provider: SdkTracerProvider) -> Self {
        let mut config = AppConfig::default();
        config.endpoints.stage_delay_ms = STAGE_DELAY_MS;
        Self::build(config, InMemorySpanExporterBuilder::new().build(), provider)
    }

    fn build(config: AppConfig, spans: InMemorySpanExporter, provider: SdkTracerProvider) -> Self {
        let logs = LogCapture::default();

        let subscriber = tracing_subscriber::registry()
            .with(otel_layer(&provider, "telemetry-demo"))
            .with(json_layer(logs.clone(), env_filter("info")));
        let guard = tracing::subscriber::set_default(subscriber);

        Self {
            config,
            spans,
            logs,
            provider,
            _guard: guard,
        }
    }

    pub fn state(&self) -> AppState {
        AppState::from_config(&self.config, Some(detached_handle()))
    }

    pub fn router(&self) -> Router {
        build_router(&self.config, self.state())
    }

    /// The single request record, asserting there is exactly one.
    pub fn only_record(&self) -> Value {
        let records = self.logs.request_records();
        assert_eq!(records.len(), 1, "expected one request record, got {:?}", records);
        records.into_iter().next().unwrap()
    }

    /// Every exported span, in close order.
    pub fn all_spans(&self) -> Vec<SpanData> {
        self.spans.get_finished_spans().unwrap()
    }

    pub fn find_span(&self, name: &str) -> Option<SpanData> {
        self.all_spans().into_iter().find(|span| span.name == name)
    }

    /// Direct children of `parent`, in close order.
    pub fn children_of(&self, parent: SpanId) -> Vec<SpanData> {
        self.all_spans()
            .into_iter()
            .filter(|span| span.parent_span_id == parent)
            .collect()
    }

    /// The exported server span.
    pub fn server_span(&self) -> SpanData {
        let spans: Vec<SpanData> = self
            .all_spans()
            .into_iter()
            .filter(|span| span.span_kind == SpanKind::Server)
            .collect();
        assert_eq!(spans.len(), 1, "expected one server span");
        spans.into_iter().next().unwrap()
    }

    pub fn span(&self, name: &str) -> SpanData {
        self.find_span(name)
            .unwrap_or_else(|| panic!("span {} not exported", name))
    }
}

pub fn attribute<'a>(span: &'a SpanData, key: &str) -> Option<&'a opentelemetry::Value> {
    span.attributes
        .iter()
        .find(|kv| kv.key.as_str() == key)
        .map(|kv| &kv.value)
}

pub fn attr_str(span: &SpanData, key: &str) -> Option<String> {
    attribute(span, key).map(|value| value.as_str().into_owned())
}

/// Number of `exception` events on the span.
pub fn exceptions(span: &SpanData) -> usize {
    span.events
        .events
        .iter()
        .filter(|event| event.name == EXCEPTION_EVENT)
        .count()
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

/// Send a GET through the router.
pub async fn get(router: Router, uri: &str) -> TestResponse {
    send(router, Request::get(uri).body(Body::empty()).unwrap()).await
}

pub async fn send(router: Router, request: Request<Body>) -> TestResponse {
    let response = router.oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    };
    TestResponse {
        status,
        headers,
        body,
    }
}

pub fn is_lower_hex(value: &Value, len: usize) -> bool {
    value
        .as_str()
        .map(|s| s.len() == len && s.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')))
        .unwrap_or(false)
}
