//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Service identity used as the tracing resource label.
pub const SERVICE_NAME: &str = "telemetry-demo";

/// Environment variable overriding the collector endpoint.
pub const COLLECTOR_ENDPOINT_ENV: &str = "OTEL_EXPORTER_OTLP_ENDPOINT";

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Service identity.
    pub service: ServiceConfig,

    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Structured log sink settings.
    pub logging: LoggingConfig,

    /// Span export settings.
    pub tracing: TracingConfig,

    /// Metrics endpoint settings.
    pub metrics: MetricsConfig,

    /// Sample endpoint behavior.
    pub endpoints: EndpointConfig,
}

/// Service identity.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Name reported in log records and as `service.name` on exported spans.
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: SERVICE_NAME.to_string(),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,

    /// Time allowed for flushing telemetry at shutdown, in seconds.
    pub shutdown_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            request_secs: 30,
            shutdown_secs: 10,
        }
    }
}

/// Structured log sink configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level threshold or `EnvFilter` directives (trace, debug, info, warn, error).
    pub level: String,

    /// Write JSON records to stdout.
    pub stdout: bool,

    /// Write JSON records to a rotating file.
    pub file_enabled: bool,

    /// Directory holding the log file and its rotations.
    pub directory: String,

    /// Active log file name.
    pub file_name: String,

    /// Rotate when the file reaches this size.
    pub max_file_bytes: u64,

    /// Rotate when the file is this old (0 disables age rotation).
    pub max_file_age_secs: u64,

    /// Delete rotated files older than this many days.
    pub retention_days: u64,

    /// Gzip rotated files.
    pub compress: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            stdout: true,
            file_enabled: true,
            directory: "logs".to_string(),
            file_name: "app.log".to_string(),
            max_file_bytes: 10 * 1024 * 1024,
            max_file_age_secs: 0,
            retention_days: 7,
            compress: true,
        }
    }
}

/// Which exporter receives completed spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExporterKind {
    /// Synchronous JSON lines on stdout.
    Console,
    /// Batched OTLP/HTTP export to a collector.
    Collector,
    /// Discard spans.
    None,
}

/// Span export configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TracingConfig {
    /// Export policy.
    pub exporter: ExporterKind,

    /// Collector base URL (`/v1/traces` is appended).
    pub collector_endpoint: String,

    /// Spans buffered before new ones are dropped.
    pub max_queue_size: usize,

    /// Spans per export call.
    pub max_batch_size: usize,

    /// Interval between time-based flushes, in milliseconds.
    pub scheduled_delay_ms: u64,

    /// Timeout of one export call, in seconds.
    pub export_timeout_secs: u64,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            exporter: ExporterKind::Collector,
            collector_endpoint: "http://localhost:4318".to_string(),
            max_queue_size: 2048,
            max_batch_size: 512,
            scheduled_delay_ms: 5000,
            export_timeout_secs: 10,
        }
    }
}

/// Metrics configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Expose `GET /metrics`.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Sample endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct EndpointConfig {
    /// Artificial delay of each text pipeline stage, in milliseconds.
    pub stage_delay_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self { stage_delay_ms: 500 }
    }
}

impl EndpointConfig {
    pub fn stage_delay(&self) -> Duration {
        Duration::from_millis(self.stage_delay_ms)
    }
}
