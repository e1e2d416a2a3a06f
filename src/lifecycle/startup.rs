//! Startup orchestration.
//!
//! # Order
//! metrics exporter → shared HTTP client → circuit registry → services →
//! listener. Shutdown runs the other way: stop accepting, drain, close the
//! shared client.
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when ready)

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::GatewayConfig;
use crate::http::{AppState, HttpServer};
use crate::lifecycle::shutdown::Shutdown;
use crate::observability::metrics;
use crate::resilience::CircuitBreakerRegistry;
use crate::upstream::pool::{HttpClientPool, PoolError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Failed to create HTTP client: {0}")]
    Pool(#[from] PoolError),

    #[error("Invalid upstream base URL: {0}")]
    UpstreamUrl(#[from] url::ParseError),

    #[error("Invalid metrics address '{0}'")]
    MetricsAddress(String),

    #[error("Failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Server error: {0}")]
    Serve(#[from] std::io::Error),
}

/// Build the shared client, registry and services.
pub fn build_state(config: GatewayConfig) -> Result<AppState, StartupError> {
    let pool = Arc::new(HttpClientPool::new(&config.http_client, &config.timeouts)?);
    let registry = Arc::new(CircuitBreakerRegistry::new(config.circuit_breaker.defaults));
    Ok(AppState::new(config, pool, registry)?)
}

/// Run the gateway until `shutdown` fires.
pub async fn run(config: GatewayConfig, shutdown: Shutdown) -> Result<(), StartupError> {
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config
            .observability
            .metrics_address
            .parse()
            .map_err(|_| StartupError::MetricsAddress(config.observability.metrics_address.clone()))?;
        metrics::init_metrics(addr);
    }

    let bind_address = config.listener.bind_address.clone();
    let state = build_state(config)?;
    let pool = state.pool.clone();

    let listener = TcpListener::bind(&bind_address)
        .await
        .map_err(|source| StartupError::Bind {
            address: bind_address.clone(),
            source,
        })?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let result = HttpServer::new(state).run(listener, shutdown.signalled()).await;

    pool.close();
    result.map_err(StartupError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_build_state_registers_nothing_until_used() {
        let state = build_state(GatewayConfig::default()).unwrap();
        assert!(state.registry.is_empty());
        assert!(!state.pool.is_closed());
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let mut config = GatewayConfig::default();
        config.listener.bind_address = taken.local_addr().unwrap().to_string();

        let err = run(config, Shutdown::new()).await.unwrap_err();
        assert!(matches!(err, StartupError::Bind { .. }));
    }
}
