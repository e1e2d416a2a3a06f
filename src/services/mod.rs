//! Typed callers for each upstream API.
//!
//! # Responsibilities
//! - Validate inbound parameters before any I/O
//! - Build `UpstreamRequest`s and run them through a `ResilientCaller`
//! - Deserialize payloads into typed models
//! - Per-dependency health probes
//!
//! # Design Decisions
//! - One circuit per upstream, named by the service's `DEPENDENCY` constant
//! - Dropping a service future aborts the in-flight attempt

pub mod nasa;
pub mod rick_and_morty;

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::{CircuitSettings, GatewayConfig};
use crate::resilience::{CircuitBreakerRegistry, FailurePolicy, ResilientCaller, RetryPolicy, RetryingClient};
use crate::upstream::{HttpClientPool, RequestExecutor, UpstreamResult};

pub use nasa::{Apod, ApodQuery, ApodResult, NasaService};
pub use rick_and_morty::{
    Character, CharacterFilter, CharacterLookup, Episode, EpisodeFilter, Location, LocationFilter, Page,
    PageInfo, RickAndMortyService,
};

/// Shared pieces every service is built from.
#[derive(Clone)]
pub struct ServiceContext {
    pub pool: Arc<HttpClientPool>,
    pub registry: Arc<CircuitBreakerRegistry>,
    pub retry: RetryPolicy,
    pub failure: FailurePolicy,
}

impl ServiceContext {
    pub fn new(config: &GatewayConfig, pool: Arc<HttpClientPool>, registry: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            pool,
            registry,
            retry: RetryPolicy::from(&config.retries),
            failure: FailurePolicy::from(&config.circuit_breaker),
        }
    }

    pub fn caller(
        &self,
        dependency: &str,
        executor: Arc<dyn RequestExecutor>,
        settings: CircuitSettings,
    ) -> ResilientCaller {
        ResilientCaller::new(
            dependency,
            self.registry.clone(),
            RetryingClient::new(executor, self.retry),
            self.failure,
        )
        .with_settings(settings)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

/// Result of probing one upstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DependencyHealth {
    pub service: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_time_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub base_url: String,
    pub checked_at: DateTime<Utc>,
}

impl DependencyHealth {
    /// Build a health record from a probe result.
    pub fn from_probe<T>(service: &str, base_url: &str, started: Instant, result: UpstreamResult<T>) -> Self {
        let (status, response_time_ms, error) = match result {
            Ok(_) => (HealthStatus::Healthy, Some(started.elapsed().as_millis() as u64), None),
            Err(e) => {
                tracing::error!(service = %service, error = %e, "Health check failed");
                (HealthStatus::Unhealthy, None, Some(e.to_string()))
            }
        };

        Self {
            service: service.to_string(),
            status,
            response_time_ms,
            error,
            base_url: base_url.to_string(),
            checked_at: Utc::now(),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}
