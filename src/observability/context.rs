//! Trace context accessor.
//!
//! Reads the identifiers of the span active on the current task so they can
//! be attached to log records and response payloads.

use serde::Serialize;

use crate::observability::tracing::SpanExt;

/// `(trace_id, span_id)` of the active span, rendered as lowercase hex.
///
/// Both fields are present or both are `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TraceContext {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
}

impl TraceContext {
    pub(crate) fn new(trace_id: String, span_id: String) -> Self {
        Self {
            trace_id: Some(trace_id),
            span_id: Some(span_id),
        }
    }

    /// Context of the span entered on the current task, or an empty pair.
    pub fn current() -> Self {
        tracing::Span::current().trace_context()
    }

    pub fn is_active(&self) -> bool {
        self.trace_id.is_some()
    }
}
