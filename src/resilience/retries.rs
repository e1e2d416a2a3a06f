//! Retry logic.
//!
//! # Responsibilities
//! - Re-run a single-attempt executor for transient failures only
//! - Exponential backoff between attempts
//! - Abort promptly on caller cancellation
//!
//! # Design Decisions
//! - Only Connection and Timeout errors are retried
//! - The last error is returned as-is; there is no "retries exhausted" wrapper
//! - Cancellation wins over an in-flight attempt or a backoff sleep

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::observability::metrics;
use crate::resilience::backoff::calculate_backoff;
use crate::upstream::{ParsedResponse, RequestExecutor, UpstreamError, UpstreamRequest, UpstreamResult};

/// Retry budget and backoff shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter: config.jitter,
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (0-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        calculate_backoff(attempt.saturating_add(1), self.base_delay, self.max_delay, self.jitter)
    }
}

/// Executor wrapper that retries transient failures with backoff.
#[derive(Clone)]
pub struct RetryingClient {
    executor: Arc<dyn RequestExecutor>,
    policy: RetryPolicy,
}

impl RetryingClient {
    pub fn new(executor: Arc<dyn RequestExecutor>, policy: RetryPolicy) -> Self {
        Self { executor, policy }
    }

    pub fn service(&self) -> &str {
        self.executor.service()
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Run `request`, making at most `max_retries + 1` attempts.
    pub async fn execute(
        &self,
        request: &UpstreamRequest,
        cancel: &CancellationToken,
    ) -> UpstreamResult<ParsedResponse> {
        let service = self.executor.service();
        let mut attempt: u32 = 0;

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(service)),
                result = self.executor.attempt(request) => result,
            };

            let err = match result {
                Ok(response) => return Ok(response),
                Err(err) => err,
            };

            if !err.is_retryable() || attempt >= self.policy.max_retries {
                if err.is_retryable() {
                    tracing::error!(
                        service = %service,
                        attempts = attempt + 1,
                        error = %err,
                        "Retries exhausted"
                    );
                }
                return Err(err);
            }

            let delay = self.policy.delay_after(attempt);
            tracing::warn!(
                service = %service,
                attempt = attempt + 1,
                max_attempts = self.policy.max_retries + 1,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                "Upstream attempt failed, retrying"
            );
            metrics::record_retry(service);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(cancelled(service)),
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }
}

fn cancelled(service: &str) -> UpstreamError {
    tracing::debug!(service = %service, "Upstream call cancelled");
    UpstreamError::Cancelled {
        service: service.to_string(),
    }
}
