//! Request boundary middleware.
//!
//! # Responsibilities
//! - Open the server span every other span of the request hangs under
//! - Time the request and classify its outcome
//! - Emit exactly one `LogRecord` per request, on every path
//! - Turn panics into a generic 500 response
//! - Record request metrics
//!
//! # Outcome classification
//! ```text
//! ServerFailure extension or panic → error   "server error"      500, error_type = category
//! 400..=499                        → warning "client error"      error_type = HTTP_<status>
//! anything else                    → info    "request completed"
//! future dropped (disconnect)      → warning "request cancelled" 499, error_type = Cancelled
//! ```

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use axum::extract::{MatchedPath, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::Response;
use futures_util::FutureExt;
use opentelemetry::trace::Status;
use tracing::field::Empty;
use tracing::Instrument;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::error::{server_error_response, ServerFailure};
use crate::http::request::RequestIdExt;
use crate::http::server::AppState;
use crate::observability::logging::{LogRecord, RecordLevel};
use crate::observability::metrics;
use crate::observability::tracing::SpanExt;

/// Status reported when the client went away before a response was produced.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

const PANIC: &str = "Panic";
const CANCELLED: &str = "Cancelled";
const UNMATCHED: &str = "unmatched";

/// Slot the route layer fills with the matched route template.
#[derive(Clone, Default)]
struct RouteSlot(Arc<OnceLock<String>>);

impl RouteSlot {
    fn handler(&self) -> &str {
        self.0.get().map(String::as_str).unwrap_or(UNMATCHED)
    }
}

/// Route layer copying the matched route template into the request's `RouteSlot`.
pub async fn tag_matched_path(matched: Option<MatchedPath>, request: Request, next: Next) -> Response {
    if let (Some(matched), Some(slot)) = (matched, request.extensions().get::<RouteSlot>()) {
        let _ = slot.0.set(matched.as_str().to_owned());
    }
    next.run(request).await
}

/// Wraps every request: span, timing, classification, one log record.
pub async fn request_log_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let endpoint = request.uri().path().to_owned();
    let request_id = request.request_id().map(str::to_owned);

    let span = tracing::info_span!(
        "request",
        otel.name = %format!("{} {}", method, endpoint),
        otel.kind = "server",
        http.method = %method,
        http.target = %endpoint,
        http.request_id = Empty,
        http.status_code = Empty,
    );
    if let Some(id) = &request_id {
        span.record("http.request_id", id.as_str());
    }

    let route = RouteSlot::default();
    request.extensions_mut().insert(route.clone());

    let mut guard = InFlight::start(RequestInfo {
        service: state.service_name.to_string(),
        endpoint,
        method,
        request_id,
        route,
        span: span.clone(),
        start,
    });

    let outcome = AssertUnwindSafe(next.run(request))
        .catch_unwind()
        .instrument(span.clone())
        .await;

    let response = match outcome {
        Ok(response) => response,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            span.record_exception(PANIC, &message);
            server_error_response(PANIC)
        }
    };

    guard.complete();
    let info = &guard.info;
    let elapsed = start.elapsed();
    let (response, record) = classify(response, info, elapsed);

    span.record("http.status_code", record.status_code);
    match response.extensions().get::<ServerFailure>() {
        Some(failure) => span.set_status(Status::error(failure.category)),
        None => span.set_status(Status::Ok),
    }

    metrics::record_request(&record.method, info.route.handler(), record.status_code, elapsed);
    record.emit();

    response
}

struct RequestInfo {
    service: String,
    endpoint: String,
    method: String,
    request_id: Option<String>,
    route: RouteSlot,
    span: tracing::Span,
    start: Instant,
}

impl RequestInfo {
    fn record(
        &self,
        level: RecordLevel,
        message: &'static str,
        status_code: u16,
        latency: Duration,
        error_type: Option<String>,
    ) -> LogRecord {
        LogRecord {
            level,
            message,
            service: self.service.clone(),
            endpoint: self.endpoint.clone(),
            method: self.method.clone(),
            status_code,
            latency_ms: latency_ms(latency),
            request_id: self.request_id.clone(),
            trace: self.span.trace_context(),
            error_type,
        }
    }
}

/// Tracks one in-flight request; emits the cancellation record if dropped
/// before `complete`.
struct InFlight {
    info: RequestInfo,
    completed: bool,
}

impl InFlight {
    fn start(info: RequestInfo) -> Self {
        metrics::request_started();
        Self {
            info,
            completed: false,
        }
    }

    fn complete(&mut self) {
        self.completed = true;
        metrics::request_finished();
    }
}

impl Drop for InFlight {
    fn drop(&mut self) {
        if self.completed {
            return;
        }
        metrics::request_finished();

        let info = &self.info;
        let elapsed = info.start.elapsed();
        info.span.set_status(Status::error("request cancelled"));
        info.span.record("http.status_code", CLIENT_CLOSED_REQUEST);
        metrics::record_request(&info.method, info.route.handler(), CLIENT_CLOSED_REQUEST, elapsed);
        info.record(
            RecordLevel::Warning,
            "request cancelled",
            CLIENT_CLOSED_REQUEST,
            elapsed,
            Some(CANCELLED.to_owned()),
        )
        .emit();
    }
}

fn classify(response: Response, info: &RequestInfo, elapsed: Duration) -> (Response, LogRecord) {
    if let Some(failure) = response.extensions().get::<ServerFailure>().copied() {
        let record = info.record(
            RecordLevel::Error,
            "server error",
            StatusCode::INTERNAL_SERVER_ERROR.as_u16(),
            elapsed,
            Some(failure.category.to_owned()),
        );
        return (server_error_response(failure.category), record);
    }

    let status = response.status();
    let record = if status.is_client_error() {
        info.record(
            RecordLevel::Warning,
            "client error",
            status.as_u16(),
            elapsed,
            Some(format!("HTTP_{}", status.as_u16())),
        )
    } else {
        info.record(RecordLevel::Info, "request completed", status.as_u16(), elapsed, None)
    };
    (response, record)
}

/// Milliseconds rounded to the nearest integer.
fn latency_ms(elapsed: Duration) -> u64 {
    (elapsed.as_secs_f64() * 1000.0).round() as u64
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latency_rounds_to_nearest_millisecond() {
        assert_eq!(latency_ms(Duration::from_micros(1_499)), 1);
        assert_eq!(latency_ms(Duration::from_micros(1_500)), 2);
        assert_eq!(latency_ms(Duration::ZERO), 0);
    }

    #[test]
    fn test_panic_message_payloads() {
        let payload: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn Any + Send> = Box::new(String::from("kaboom"));
        assert_eq!(panic_message(payload.as_ref()), "kaboom");
        let payload: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(payload.as_ref()), "panic");
    }

    #[test]
    fn test_route_slot_defaults_to_unmatched() {
        let slot = RouteSlot::default();
        assert_eq!(slot.handler(), "unmatched");
        slot.0.set("/end1/{value}".to_owned()).unwrap();
        assert_eq!(slot.handler(), "/end1/{value}");
    }
}
