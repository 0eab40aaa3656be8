//! HTTP middleware.
//!
//! - `request_log`: per-request span, outcome classification, log record and metrics

pub mod request_log;

pub use request_log::{request_log_middleware, tag_matched_path, CLIENT_CLOSED_REQUEST};
