//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, batch sizes, addresses)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: AppConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::{AppConfig, ExporterKind};

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

/// Check the configuration, collecting every problem found.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.service.name.trim().is_empty() {
        errors.push(ValidationError::new("service.name", "must not be empty"));
    }

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "listener.bind_address",
            format!("'{}' is not a socket address", config.listener.bind_address),
        ));
    }

    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }

    let logging = &config.logging;
    if logging.file_enabled {
        if logging.file_name.trim().is_empty() {
            errors.push(ValidationError::new("logging.file_name", "must not be empty"));
        }
        if logging.max_file_bytes == 0 {
            errors.push(ValidationError::new("logging.max_file_bytes", "must be greater than 0"));
        }
    }

    let tracing = &config.tracing;
    if tracing.max_batch_size == 0 {
        errors.push(ValidationError::new("tracing.max_batch_size", "must be greater than 0"));
    }
    if tracing.max_batch_size > tracing.max_queue_size {
        errors.push(ValidationError::new(
            "tracing.max_batch_size",
            "must not exceed tracing.max_queue_size",
        ));
    }
    if tracing.scheduled_delay_ms == 0 {
        errors.push(ValidationError::new("tracing.scheduled_delay_ms", "must be greater than 0"));
    }
    if tracing.exporter == ExporterKind::Collector
        && !(tracing.collector_endpoint.starts_with("http://")
            || tracing.collector_endpoint.starts_with("https://"))
    {
        errors.push(ValidationError::new(
            "tracing.collector_endpoint",
            format!("'{}' must be an http(s) URL", tracing.collector_endpoint),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
