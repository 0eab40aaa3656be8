//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with all handlers
//! - Wire up middleware (request ID, request log, timeout)
//! - Bind server to listener
//! - Serve until the shutdown signal fires
//!
//! # Layer order (outermost first)
//! ```text
//! SetRequestId → PropagateRequestId → request_log → Timeout → Router
//!                                                              └─ route_layer(tag_matched_path)
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::timeout::TimeoutLayer;

use crate::config::AppConfig;
use crate::endpoints::{end1, end2};
use crate::http::middleware::{request_log_middleware, tag_matched_path};
use crate::http::request::{propagate_request_id_layer, set_request_id_layer};

/// Application state injected into handlers and middleware.
#[derive(Clone)]
pub struct AppState {
    pub service_name: Arc<str>,
    pub stage_delay: Duration,
    pub metrics: Option<PrometheusHandle>,
}

impl AppState {
    pub fn from_config(config: &AppConfig, metrics: Option<PrometheusHandle>) -> Self {
        Self {
            service_name: Arc::from(config.service.name.as_str()),
            stage_delay: config.endpoints.stage_delay(),
            metrics,
        }
    }
}

/// HTTP server for the sample service.
pub struct HttpServer {
    router: Router,
    config: AppConfig,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    ///
    /// `metrics` is the render handle of the installed Prometheus recorder;
    /// `GET /metrics` is only routed when one is given.
    pub fn new(config: AppConfig, metrics: Option<PrometheusHandle>) -> Self {
        let state = AppState::from_config(&config, metrics);
        let router = build_router(&config, state);
        Self { router, config }
    }

    /// The fully layered router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            service = %self.config.service.name,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }
}

/// Build the Axum router with all middleware layers.
#[allow(deprecated)]
pub fn build_router(config: &AppConfig, state: AppState) -> Router {
    let mut routes = Router::new()
        .route("/end1/{value}", get(end1))
        .route("/end2/", get(end2));
    if state.metrics.is_some() {
        routes = routes.route("/metrics", get(metrics_handler));
    }

    routes
        .route_layer(middleware::from_fn(tag_matched_path))
        .with_state(state.clone())
        .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)))
        .layer(middleware::from_fn_with_state(state, request_log_middleware))
        .layer(propagate_request_id_layer())
        .layer(set_request_id_layer())
}

/// Prometheus scrape endpoint.
async fn metrics_handler(State(state): State<AppState>) -> Response {
    match state.metrics {
        Some(handle) => (
            [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
            handle.render(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
