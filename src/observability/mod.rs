//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Request middleware and instrumented operations produce:
//!     → tracing.rs (tracing spans bridged to OpenTelemetry spans)
//!     → logging.rs (one structured record per request)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → export.rs (OTLP collector or console via the OpenTelemetry SDK)
//!     → JSON log lines on stdout and in a rotating file (rolling.rs)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Trace context flows through the task's span stack, so log records and
//!   response payloads carry the same ids as the exported spans
//! - Telemetry is initialized once at startup and flushed once at shutdown
//! - Export failures never fail a request

pub mod context;
pub mod export;
pub mod instrument;
pub mod logging;
pub mod metrics;
pub mod rolling;
pub mod tracing;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use opentelemetry_otlp::ExporterBuildError;
use opentelemetry_sdk::trace::SdkTracerProvider;
use thiserror::Error;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{Layer, Registry};

use crate::config::{AppConfig, LoggingConfig};
use crate::observability::export::ExportFailures;
use crate::observability::logging::{env_filter, json_layer, BoxedLayer};
use crate::observability::rolling::{RollingFile, RotationPolicy};

pub use context::TraceContext;
pub use instrument::Operation;
pub use self::tracing::{otel_layer, tracer_provider, SpanExt};

/// Errors raised while setting up telemetry.
#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("failed to open log file: {0}")]
    LogFile(#[from] std::io::Error),

    #[error("failed to build span exporter: {0}")]
    Exporter(#[from] ExporterBuildError),

    #[error("a global subscriber is already installed: {0}")]
    Subscriber(#[from] TryInitError),
}

/// Handle to the installed telemetry pipeline.
///
/// Dropping it without calling [`Telemetry::shutdown`] loses buffered spans.
pub struct Telemetry {
    provider: SdkTracerProvider,
    failures: ExportFailures,
    log_guard: Option<WorkerGuard>,
}

impl Telemetry {
    /// Install the global subscriber: JSON logs plus span export.
    ///
    /// Must be called from within a tokio runtime when the collector
    /// exporter is selected.
    pub fn init(config: &AppConfig) -> Result<Self, TelemetryError> {
        let service = &config.service.name;
        let (provider, failures) = tracer_provider(&config.tracing, service)?;

        let mut layers: Vec<BoxedLayer<Registry>> = vec![otel_layer(&provider, service).boxed()];

        if config.logging.stdout {
            layers.push(json_layer(std::io::stdout, env_filter(&config.logging.level)));
        }

        let log_guard = if config.logging.file_enabled {
            let file = RollingFile::open(
                &config.logging.directory,
                &config.logging.file_name,
                rotation_policy(&config.logging),
            )?;
            let (writer, guard) = tracing_appender::non_blocking(file);
            layers.push(json_layer(writer, env_filter(&config.logging.level)));
            Some(guard)
        } else {
            None
        };

        tracing_subscriber::registry().with(layers).try_init()?;

        ::tracing::info!(
            service = %service,
            exporter = ?config.tracing.exporter,
            "Telemetry initialized"
        );

        Ok(Self {
            provider,
            failures,
            log_guard,
        })
    }

    /// Flush buffered spans and log lines, waiting at most `timeout`.
    pub async fn shutdown(self, timeout: Duration) {
        let Self {
            provider,
            failures,
            log_guard,
        } = self;

        // Provider shutdown blocks until the batch processor has drained.
        let drained = tokio::task::spawn_blocking(move || provider.shutdown());
        match tokio::time::timeout(timeout, drained).await {
            Ok(Ok(Ok(()))) => ::tracing::debug!("Span export drained"),
            Ok(Ok(Err(e))) => ::tracing::warn!(error = %e, "Tracer provider shutdown failed"),
            Ok(Err(e)) => ::tracing::warn!(error = %e, "Tracer provider shutdown panicked"),
            Err(_) => ::tracing::warn!(?timeout, "Span export did not drain in time"),
        }

        let dropped = failures.dropped();
        if dropped > 0 {
            ::tracing::warn!(dropped, "Spans lost to failed exports");
        }

        // Dropping the guard flushes the non-blocking file writer.
        drop(log_guard);
    }
}

fn rotation_policy(config: &LoggingConfig) -> RotationPolicy {
    RotationPolicy {
        max_bytes: config.max_file_bytes,
        max_age: (config.max_file_age_secs > 0)
            .then(|| Duration::from_secs(config.max_file_age_secs)),
        retention: Duration::from_secs(config.retention_days * 24 * 3600),
        compress: config.compress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ExporterKind, TracingConfig};

    #[test]
    fn test_rotation_policy_from_config() {
        let mut config = LoggingConfig::default();
        let policy = rotation_policy(&config);
        assert_eq!(policy.max_bytes, 10 * 1024 * 1024);
        assert_eq!(policy.max_age, None);
        assert_eq!(policy.retention, Duration::from_secs(7 * 24 * 3600));

        config.max_file_age_secs = 60;
        assert_eq!(rotation_policy(&config).max_age, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_every_exporter_kind_builds() {
        let mut config = TracingConfig::default();
        for kind in [ExporterKind::Collector, ExporterKind::Console, ExporterKind::None] {
            config.exporter = kind;
            let (provider, failures) = tracer_provider(&config, "svc").unwrap();
            assert_eq!(failures.dropped(), 0);
            provider.shutdown().unwrap();
        }
    }
}
