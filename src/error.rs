//! Request-level error type.
//!
//! `AppError` is what handlers and instrumented operations return. Client
//! errors render as `{"detail": ...}`, internal failures as
//! `{"error": <category>}` plus a `ServerFailure` extension the request
//! middleware uses to classify the outcome.

use axum::extract::rejection::{PathRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Category name reported for validation failures.
pub const VALIDATION_ERROR: &str = "ValidationError";

#[derive(Debug, Clone, Error)]
pub enum ErrorKind {
    /// Expected, caller-caused failure with the status to answer with.
    #[error("{message}")]
    Validation { status: StatusCode, message: String },

    /// Unexpected failure. Only `category` ever reaches the caller.
    #[error("{category}: {message}")]
    Internal { category: &'static str, message: String },
}

/// Error raised by handlers and instrumented operations.
#[derive(Debug, Clone, Error)]
#[error("{kind}")]
pub struct AppError {
    kind: ErrorKind,
    recorded: bool,
}

impl AppError {
    pub fn validation(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Validation {
                status,
                message: message.into(),
            },
            recorded: false,
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::validation(StatusCode::BAD_REQUEST, message)
    }

    pub fn unprocessable(message: impl Into<String>) -> Self {
        Self::validation(StatusCode::UNPROCESSABLE_ENTITY, message)
    }

    pub fn internal(category: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: ErrorKind::Internal {
                category,
                message: message.into(),
            },
            recorded: false,
        }
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn status(&self) -> StatusCode {
        match &self.kind {
            ErrorKind::Validation { status, .. } => *status,
            ErrorKind::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Type name recorded on spans and reported for server errors.
    pub fn category(&self) -> &'static str {
        match &self.kind {
            ErrorKind::Validation { .. } => VALIDATION_ERROR,
            ErrorKind::Internal { category, .. } => *category,
        }
    }

    pub fn message(&self) -> &str {
        match &self.kind {
            ErrorKind::Validation { message, .. } | ErrorKind::Internal { message, .. } => message,
        }
    }

    /// Whether an instrumented operation already recorded this error on a span.
    pub fn is_recorded(&self) -> bool {
        self.recorded
    }

    pub(crate) fn mark_recorded(&mut self) {
        self.recorded = true;
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        Self::unprocessable(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        Self::unprocessable(rejection.body_text())
    }
}

/// Response extension marking a response produced by an internal failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServerFailure {
    pub category: &'static str,
}

/// The only body an internal failure is allowed to expose.
pub fn server_error_response(category: &'static str) -> Response {
    let mut response = (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": category })),
    )
        .into_response();
    response.extensions_mut().insert(ServerFailure { category });
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self.kind {
            ErrorKind::Validation { status, message } => {
                (status, Json(serde_json::json!({ "detail": message }))).into_response()
            }
            ErrorKind::Internal { category, .. } => server_error_response(category),
        }
    }
}
