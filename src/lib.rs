//! Observability-correlated request pipeline.
//!
//! Every request gets a span tree, one structured log record carrying the
//! same trace/span ids, and request metrics; handlers echo the ids back in
//! their JSON payloads.

pub mod config;
pub mod endpoints;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::AppConfig;
pub use error::AppError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
