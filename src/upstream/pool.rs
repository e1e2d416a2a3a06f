//! Shared outbound connection pool.
//!
//! # Responsibilities
//! - Own the single `reqwest::Client` used for every upstream
//! - Bound concurrent in-flight requests across all upstreams
//! - Refuse new work once closed at shutdown

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{self, HeaderMap, HeaderValue};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use crate::config::{HttpClientConfig, TimeoutConfig};

/// Error raised when the pool cannot hand out a slot.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("connection pool is closed")]
    Closed,

    #[error("failed to build HTTP client: {0}")]
    Build(#[from] reqwest::Error),
}

/// The process-wide HTTP client plus its concurrency limit.
#[derive(Debug)]
pub struct HttpClientPool {
    client: reqwest::Client,
    permits: Arc<Semaphore>,
    max_connections: usize,
    attempt_timeout: Duration,
}

impl HttpClientPool {
    /// Build the pool. Called once at startup.
    pub fn new(config: &HttpClientConfig, timeouts: &TimeoutConfig) -> Result<Self, PoolError> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("application/json"));

        let attempt_timeout = Duration::from_secs(timeouts.upstream_secs);
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .timeout(attempt_timeout)
            .pool_max_idle_per_host(config.max_keepalive_connections)
            .build()?;

        tracing::info!(
            max_connections = config.max_connections,
            max_keepalive = config.max_keepalive_connections,
            timeout_secs = timeouts.upstream_secs,
            "Shared HTTP client created"
        );

        Ok(Self {
            client,
            permits: Arc::new(Semaphore::new(config.max_connections)),
            max_connections: config.max_connections,
            attempt_timeout,
        })
    }

    /// Wait for a free slot and return the client to use with it.
    pub async fn acquire(&self) -> Result<(OwnedSemaphorePermit, &reqwest::Client), PoolError> {
        let permit = self
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        Ok((permit, &self.client))
    }

    /// Default deadline for one attempt.
    pub fn attempt_timeout(&self) -> Duration {
        self.attempt_timeout
    }

    /// Number of requests currently holding a slot.
    pub fn in_flight(&self) -> usize {
        self.max_connections - self.permits.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }

    pub fn is_closed(&self) -> bool {
        self.permits.is_closed()
    }

    /// Stop handing out slots. In-flight requests finish normally.
    pub fn close(&self) {
        if !self.permits.is_closed() {
            self.permits.close();
            tracing::info!("Shared HTTP client closed");
        }
    }
}
