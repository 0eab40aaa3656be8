//! Structured logging.
//!
//! # Responsibilities
//! - Build the JSON log layers (stdout, rotating file)
//! - Define the per-request `LogRecord` and emit it as one event
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - Record fields are flattened to the top level of each JSON line
//! - `trace_id` / `span_id` are always present, `null` outside a span
//! - Levels are written as `info`, `warning`, `error`
//! - Log level is configurable via config; spans are never filtered by it

use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt::format::Writer;
use tracing_subscriber::fmt::{FmtContext, FormatEvent, FormatFields, MakeWriter};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::Layer;

use crate::observability::context::TraceContext;

/// A boxed, filtered layer that can be stacked on the registry.
pub type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync + 'static>;

/// Build an `EnvFilter` from a directive string, falling back to `info`.
pub fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// JSON log layer writing one line per event to `writer`.
pub fn json_layer<S, W>(writer: W, filter: EnvFilter) -> BoxedLayer<S>
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    tracing_subscriber::fmt::layer()
        .event_format(JsonLines)
        .with_writer(writer)
        .with_filter(filter)
        .boxed()
}

/// Fields every line carries, written as `null` when the event lacks them.
const TRACE_FIELDS: [&str; 2] = ["trace_id", "span_id"];

/// One flat JSON object per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonLines;

impl<S, N> FormatEvent<S, N> for JsonLines
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let mut line = Map::new();
        line.insert(
            "timestamp".into(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true).into(),
        );
        line.insert("level".into(), level_name(meta.level()).into());
        line.insert("target".into(), meta.target().into());

        event.record(&mut FieldVisitor(&mut line));
        for key in TRACE_FIELDS {
            line.entry(key).or_insert(Value::Null);
        }

        writeln!(writer, "{}", Value::Object(line))
    }
}

fn level_name(level: &Level) -> &'static str {
    if *level == Level::ERROR {
        "error"
    } else if *level == Level::WARN {
        "warning"
    } else if *level == Level::INFO {
        "info"
    } else if *level == Level::DEBUG {
        "debug"
    } else {
        "trace"
    }
}

struct FieldVisitor<'a>(&'a mut Map<String, Value>);

impl Visit for FieldVisitor<'_> {
    fn record_f64(&mut self, field: &Field, value: f64) {
        self.0.insert(field.name().into(), serde_json::json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.0.insert(field.name().into(), value.into());
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        self.0.insert(field.name().into(), format!("{:?}", value).into());
    }
}

/// Severity of a request log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordLevel {
    Info,
    Warning,
    Error,
}

/// The single structured record emitted for each request.
#[derive(Debug, Clone, PartialEq)]
pub struct LogRecord {
    pub level: RecordLevel,
    pub message: &'static str,
    pub service: String,
    pub endpoint: String,
    pub method: String,
    pub status_code: u16,
    pub latency_ms: u64,
    pub request_id: Option<String>,
    pub trace: TraceContext,
    pub error_type: Option<String>,
}

impl LogRecord {
    /// Emit the record as one `tracing` event.
    pub fn emit(&self) {
        let trace_id = self.trace.trace_id.as_deref();
        let span_id = self.trace.span_id.as_deref();
        let request_id = self.request_id.as_deref();
        let error_type = self.error_type.as_deref();

        macro_rules! emit_at {
            ($macro:ident) => {
                tracing::$macro!(
                    service = %self.service,
                    endpoint = %self.endpoint,
                    method = %self.method,
                    status_code = self.status_code,
                    latency_ms = self.latency_ms,
                    request_id,
                    trace_id,
                    span_id,
                    error_type,
                    "{}",
                    self.message
                )
            };
        }

        match self.level {
            RecordLevel::Info => emit_at!(info),
            RecordLevel::Warning => emit_at!(warn),
            RecordLevel::Error => emit_at!(error),
        }
    }
}
