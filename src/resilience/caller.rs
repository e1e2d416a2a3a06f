//! Circuit-guarded, retrying call path for one dependency.
//!
//! # Data Flow
//! ```text
//! call(request)
//!     → registry.get_or_create(dependency)
//!     → breaker.is_open()? → CircuitOpen, no I/O
//!     → RetryingClient::execute
//!     → FailurePolicy::classify → record_success / record_failure / nothing
//!     → result returned unchanged
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::{CircuitBreakerConfig, CircuitSettings};
use crate::observability::metrics;
use crate::resilience::registry::CircuitBreakerRegistry;
use crate::resilience::retries::RetryingClient;
use crate::upstream::{ErrorKind, ParsedResponse, UpstreamError, UpstreamRequest, UpstreamResult};

/// What an outcome means for circuit accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitOutcome {
    Success,
    Failure,
    /// Leave the circuit untouched.
    Ignore,
}

/// Decides which errors count against a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FailurePolicy {
    /// Count 4xx `Api` errors as failures.
    pub count_client_errors: bool,
    /// Count 429 responses as failures.
    pub count_rate_limited: bool,
}

impl Default for FailurePolicy {
    fn default() -> Self {
        Self {
            count_client_errors: false,
            count_rate_limited: true,
        }
    }
}

impl From<&CircuitBreakerConfig> for FailurePolicy {
    fn from(config: &CircuitBreakerConfig) -> Self {
        Self {
            count_client_errors: config.count_client_errors,
            count_rate_limited: config.count_rate_limited,
        }
    }
}

impl FailurePolicy {
    pub fn classify<T>(&self, result: &UpstreamResult<T>) -> CircuitOutcome {
        let err = match result {
            Ok(_) => return CircuitOutcome::Success,
            Err(err) => err,
        };

        match err.kind() {
            ErrorKind::Connection | ErrorKind::Timeout | ErrorKind::Service => CircuitOutcome::Failure,
            ErrorKind::RateLimit if self.count_rate_limited => CircuitOutcome::Failure,
            ErrorKind::Api => match err.upstream_status() {
                Some(status) if status >= 500 => CircuitOutcome::Failure,
                _ if self.count_client_errors => CircuitOutcome::Failure,
                _ => CircuitOutcome::Success,
            },
            // The dependency answered; the request was at fault.
            ErrorKind::RateLimit | ErrorKind::Auth | ErrorKind::NotFound | ErrorKind::Validation => {
                CircuitOutcome::Success
            }
            ErrorKind::Cancelled | ErrorKind::CircuitOpen => CircuitOutcome::Ignore,
        }
    }
}

/// Circuit breaker plus retries for a named dependency.
#[derive(Clone)]
pub struct ResilientCaller {
    dependency: String,
    registry: Arc<CircuitBreakerRegistry>,
    settings: Option<CircuitSettings>,
    client: RetryingClient,
    policy: FailurePolicy,
}

impl ResilientCaller {
    pub fn new(
        dependency: impl Into<String>,
        registry: Arc<CircuitBreakerRegistry>,
        client: RetryingClient,
        policy: FailurePolicy,
    ) -> Self {
        Self {
            dependency: dependency.into(),
            registry,
            settings: None,
            client,
            policy,
        }
    }

    /// Use these settings if this caller is the first to create the circuit.
    pub fn with_settings(mut self, settings: CircuitSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn dependency(&self) -> &str {
        &self.dependency
    }

    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    pub async fn call(&self, request: &UpstreamRequest) -> UpstreamResult<ParsedResponse> {
        self.call_with_cancel(request, &CancellationToken::new()).await
    }

    pub async fn call_with_cancel(
        &self,
        request: &UpstreamRequest,
        cancel: &CancellationToken,
    ) -> UpstreamResult<ParsedResponse> {
        let breaker = match self.settings {
            Some(settings) => self.registry.get_or_create_with(&self.dependency, settings),
            None => self.registry.get_or_create(&self.dependency),
        };

        if breaker.is_open() {
            tracing::warn!(dependency = %self.dependency, "Circuit open, failing fast");
            metrics::record_circuit_rejection(&self.dependency);
            return Err(UpstreamError::CircuitOpen {
                service: self.dependency.clone(),
            });
        }

        let result = self.client.execute(request, cancel).await;

        match self.policy.classify(&result) {
            CircuitOutcome::Success => breaker.record_success(),
            CircuitOutcome::Failure => breaker.record_failure(),
            CircuitOutcome::Ignore => {}
        }

        result
    }
}
