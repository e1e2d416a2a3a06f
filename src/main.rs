//! API gateway
//!
//! # Architecture Overview
//!
//! ```text
//!     Client ──▶ http (axum router, request ID, trace, timeout)
//!                  │
//!                  ▼
//!              services (NASA APOD, Rick and Morty: validate + parse)
//!                  │
//!                  ▼
//!              resilience::ResilientCaller
//!                  ├─ circuit breaker registry (fail fast when open)
//!                  └─ RetryingClient (backoff on connection/timeout)
//!                         │
//!                         ▼
//!              upstream::HttpExecutor ──▶ shared reqwest pool ──▶ public API
//!
//!     Cross-cutting: config, observability (tracing + Prometheus), lifecycle
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use api_gateway::config::{default_config, load_config};
use api_gateway::lifecycle::{self, Shutdown};
use api_gateway::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "api-gateway")]
#[command(about = "Gateway in front of free public APIs", long_about = None)]
struct Args {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let loaded = match &args.config {
        Some(path) => load_config(path),
        None => default_config(),
    };
    let mut config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "api-gateway starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        max_connections = config.http_client.max_connections,
        max_retries = config.retries.max_retries,
        request_timeout_secs = config.timeouts.request_secs,
        "Configuration loaded"
    );

    let shutdown = Shutdown::new();
    lifecycle::spawn_signal_listener(shutdown.clone());

    match lifecycle::run(config, shutdown).await {
        Ok(()) => {
            tracing::info!("Shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "Gateway failed");
            ExitCode::FAILURE
        }
    }
}
