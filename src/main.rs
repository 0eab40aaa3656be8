//! telemetry-demo
//!
//! A small Axum service whose point is observability correlation.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ request id ─▶ request_log middleware ─▶ timeout ─▶ router
//!                                   │ server span                         │
//!                                   │                                     ▼
//!                                   │                          handler span (end1/end2)
//!                                   │                                     │
//!                                   │                          operation spans (square, root,
//!                                   │                          normalize, validate, reverse)
//!                                   ▼
//!                     one JSON log record ─▶ stdout + rotating file
//!                     closed spans        ─▶ console | batched OTLP/HTTP collector
//!                     request metrics     ─▶ GET /metrics
//! ```

use std::path::PathBuf;

use clap::Parser;

use telemetry_demo::config::load_config;
use telemetry_demo::lifecycle::startup;

#[derive(Parser, Debug)]
#[command(name = "telemetry-demo", version, about = "Observability-correlated sample service")]
struct Cli {
    /// Path to a TOML configuration file. Defaults apply when omitted.
    #[arg(short, long, env = "TELEMETRY_DEMO_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // No subscriber exists yet; configuration errors go to stderr.
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("telemetry-demo: {}", e);
            return Err(e.into());
        }
    };

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
