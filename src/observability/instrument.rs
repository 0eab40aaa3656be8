//! Instrumented operations.
//!
//! `Operation` wraps a unit of work in a child span of whatever span is
//! active on the current task:
//!
//! ```text
//! open span(name) → set input.* → await work
//!     Ok  → set output.* → status Ok
//!     Err → status Error(message) → record exception (once) → return Err
//! ```
//!
//! A future dropped mid-flight closes its span with `Error("operation cancelled")`.

use std::future::Future;

use opentelemetry::trace::Status;
use opentelemetry::{KeyValue, Value};
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::error::AppError;
use crate::observability::tracing::SpanExt;

const CANCELLED: &str = "operation cancelled";

/// Values an operation can describe as `output.*` span attributes.
pub trait SpanOutput {
    fn output_attributes(&self) -> Vec<KeyValue>;
}

impl SpanOutput for f64 {
    fn output_attributes(&self) -> Vec<KeyValue> {
        vec![KeyValue::new("output.value", *self)]
    }
}

impl SpanOutput for String {
    fn output_attributes(&self) -> Vec<KeyValue> {
        vec![KeyValue::new("output.text", self.clone())]
    }
}

impl SpanOutput for () {
    fn output_attributes(&self) -> Vec<KeyValue> {
        Vec::new()
    }
}

/// Builder for one traced unit of work.
#[derive(Debug)]
#[must_use = "an operation does nothing until `run` is awaited"]
pub struct Operation {
    name: &'static str,
    inputs: Vec<KeyValue>,
}

impl Operation {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            inputs: Vec::new(),
        }
    }

    /// Attach an input attribute (conventionally `input.*`).
    pub fn input(mut self, key: &'static str, value: impl Into<Value>) -> Self {
        self.inputs.push(KeyValue::new(key, value));
        self
    }

    /// Run `work` inside the operation's span.
    pub async fn run<T, F>(self, work: F) -> Result<T, AppError>
    where
        T: SpanOutput,
        F: Future<Output = Result<T, AppError>>,
    {
        let span = tracing::info_span!("operation", otel.name = self.name);
        for input in self.inputs {
            span.set_attribute(input.key, input.value);
        }

        let mut guard = CancelGuard {
            span: span.clone(),
            armed: true,
        };
        let result = work.instrument(span.clone()).await;
        guard.armed = false;

        match result {
            Ok(value) => {
                for output in value.output_attributes() {
                    span.set_attribute(output.key, output.value);
                }
                span.set_status(Status::Ok);
                Ok(value)
            }
            Err(mut err) => {
                span.set_status(Status::error(err.message().to_owned()));
                if !err.is_recorded() {
                    span.record_exception(err.category(), err.message());
                    err.mark_recorded();
                }
                Err(err)
            }
        }
    }
}

struct CancelGuard {
    span: tracing::Span,
    armed: bool,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        if self.armed {
            self.span.set_status(Status::error(CANCELLED));
        }
    }
}
