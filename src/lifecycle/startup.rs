//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize telemetry before anything else logs
//! - Install the metrics recorder
//! - Bind the listener and serve until a termination signal
//! - Flush telemetry on the way out
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - Listener binds last (traffic only when ready)

use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::http::HttpServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::observability::metrics;
use crate::observability::{Telemetry, TelemetryError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("failed to install metrics recorder: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Run the service to completion with a validated configuration.
pub async fn run(config: AppConfig) -> Result<(), StartupError> {
    let telemetry = Telemetry::init(&config)?;

    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        collector_endpoint = %config.tracing.collector_endpoint,
        "Configuration loaded"
    );

    let metrics_handle = if config.metrics.enabled {
        Some(metrics::init_metrics()?)
    } else {
        None
    };

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: config.listener.bind_address.clone(),
            source,
        })?;

    let shutdown = Shutdown::new();
    let signals = spawn_signal_listener(&shutdown);
    let flush_timeout = Duration::from_secs(config.timeouts.shutdown_secs);

    let server = HttpServer::new(config, metrics_handle);
    let served = server.run(listener, shutdown.subscribe()).await;

    signals.abort();
    telemetry.shutdown(flush_timeout).await;

    served?;
    Ok(())
}
