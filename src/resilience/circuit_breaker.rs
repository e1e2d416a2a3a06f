//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, requests pass through
//! - Open: upstream assumed down, requests fail fast
//! - Half-Open: the next request is a trial
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures reach failure_threshold
//! Open → Half-Open: first is_open() query after open_timeout has elapsed
//! Half-Open → Closed: trial request succeeds
//! Half-Open → Open: trial request fails
//! ```
//!
//! # Design Decisions
//! - One breaker per dependency name (see `registry.rs`)
//! - Open → Half-Open is evaluated on query, never by a background timer
//! - Every method takes the breaker's lock once, so counters stay
//!   consistent under concurrent callers
//! - Lifetime counters survive `reset()`

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::config::CircuitSettings;
use crate::observability::metrics;
use crate::resilience::clock::{elapsed_between, Clock, SystemClock};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    Closed,
    Open,
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "CLOSED",
            CircuitState::Open => "OPEN",
            CircuitState::HalfOpen => "HALF_OPEN",
        }
    }
}

#[derive(Debug)]
struct CircuitInner {
    state: CircuitState,
    failure_count: u32,
    success_count: u32,
    last_failure_time: Option<DateTime<Utc>>,
    last_success_time: Option<DateTime<Utc>>,
    total_requests: u64,
    total_failures: u64,
    total_successes: u64,
    times_opened: u64,
}

/// Per-dependency circuit breaker.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    failure_threshold: u32,
    open_timeout: Duration,
    clock: Arc<dyn Clock>,
    inner: Mutex<CircuitInner>,
}

impl CircuitBreaker {
    /// Create a breaker on the system clock.
    pub fn new(name: impl Into<String>, failure_threshold: u32, open_timeout: Duration) -> Self {
        Self::with_clock(name, failure_threshold, open_timeout, Arc::new(SystemClock))
    }

    pub fn with_clock(
        name: impl Into<String>,
        failure_threshold: u32,
        open_timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let name = name.into();
        let failure_threshold = failure_threshold.max(1);
        tracing::info!(
            circuit = %name,
            threshold = failure_threshold,
            timeout_secs = open_timeout.as_secs(),
            "Circuit breaker initialized"
        );
        Self {
            name,
            failure_threshold,
            open_timeout,
            clock,
            inner: Mutex::new(CircuitInner {
                state: CircuitState::Closed,
                failure_count: 0,
                success_count: 0,
                last_failure_time: None,
                last_success_time: None,
                total_requests: 0,
                total_failures: 0,
                total_successes: 0,
                times_opened: 0,
            }),
        }
    }

    pub fn from_settings(name: impl Into<String>, settings: CircuitSettings, clock: Arc<dyn Clock>) -> Self {
        Self::with_clock(
            name,
            settings.failure_threshold,
            Duration::from_secs(settings.open_timeout_secs),
            clock,
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn failure_threshold(&self) -> u32 {
        self.failure_threshold
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    /// Current state without evaluating the open timeout.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// True while requests should be blocked.
    ///
    /// An open circuit whose timeout has elapsed moves to half-open here and
    /// lets the caller through.
    pub fn is_open(&self) -> bool {
        let mut inner = self.inner.lock();
        self.poll_open(&mut inner)
    }

    fn poll_open(&self, inner: &mut CircuitInner) -> bool {
        if inner.state != CircuitState::Open {
            return false;
        }
        match inner.last_failure_time {
            Some(last) if elapsed_between(last, self.clock.now()) > self.open_timeout => {
                self.transition(inner, CircuitState::HalfOpen);
                tracing::info!(circuit = %self.name, "Circuit breaker moved to HALF_OPEN for testing");
                false
            }
            _ => true,
        }
    }

    /// Record a successful request.
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        inner.total_successes += 1;
        inner.success_count = inner.success_count.saturating_add(1);
        inner.failure_count = 0;
        inner.last_success_time = Some(self.clock.now());

        if inner.state == CircuitState::HalfOpen {
            self.transition(&mut inner, CircuitState::Closed);
            tracing::info!(circuit = %self.name, "Circuit breaker closed after successful test");
        }

        tracing::debug!(circuit = %self.name, "Circuit breaker recorded success");
    }

    /// Record a failed request.
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        inner.total_requests += 1;
        inner.total_failures += 1;
        inner.failure_count = inner.failure_count.saturating_add(1);
        inner.success_count = 0;
        inner.last_failure_time = Some(self.clock.now());

        let state = inner.state;
        match state {
            CircuitState::Closed if inner.failure_count >= self.failure_threshold => {
                self.transition(&mut inner, CircuitState::Open);
                inner.times_opened += 1;
                tracing::warn!(
                    circuit = %self.name,
                    failures = inner.failure_count,
                    retry_in_secs = self.open_timeout.as_secs(),
                    "Circuit breaker opened"
                );
            }
            CircuitState::HalfOpen => {
                self.transition(&mut inner, CircuitState::Open);
                tracing::warn!(circuit = %self.name, "Circuit breaker returned to OPEN after failed test");
            }
            _ => {}
        }

        tracing::debug!(
            circuit = %self.name,
            failures = inner.failure_count,
            threshold = self.failure_threshold,
            "Circuit breaker recorded failure"
        );
    }

    /// Force the circuit closed. Lifetime counters are kept.
    pub fn reset(&self) {
        let mut inner = self.inner.lock();
        inner.failure_count = 0;
        inner.success_count = 0;
        self.transition(&mut inner, CircuitState::Closed);
        tracing::info!(circuit = %self.name, "Circuit breaker manually reset");
    }

    /// Snapshot for monitoring. Applies the same lazy transition as `is_open`.
    pub fn metrics(&self) -> CircuitMetrics {
        let mut inner = self.inner.lock();
        let is_open = self.poll_open(&mut inner);
        let now = self.clock.now();

        let success_rate = if inner.total_requests > 0 {
            let rate = inner.total_successes as f64 / inner.total_requests as f64 * 100.0;
            (rate * 100.0).round() / 100.0
        } else {
            100.0
        };

        CircuitMetrics {
            name: self.name.clone(),
            state: inner.state,
            is_open,
            failure_count: inner.failure_count,
            success_count: inner.success_count,
            total_requests: inner.total_requests,
            total_failures: inner.total_failures,
            total_successes: inner.total_successes,
            success_rate_percent: success_rate,
            times_opened: inner.times_opened,
            failure_threshold: self.failure_threshold,
            open_timeout_secs: self.open_timeout.as_secs(),
            last_failure_time: inner.last_failure_time,
            last_success_time: inner.last_success_time,
            seconds_since_last_failure: inner
                .last_failure_time
                .map(|t| elapsed_between(t, now).as_secs_f64()),
            seconds_since_last_success: inner
                .last_success_time
                .map(|t| elapsed_between(t, now).as_secs_f64()),
        }
    }

    fn transition(&self, inner: &mut CircuitInner, to: CircuitState) {
        inner.state = to;
        metrics::record_circuit_state(&self.name, to);
    }
}

/// Read-only view of one circuit breaker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CircuitMetrics {
    pub name: String,
    pub state: CircuitState,
    pub is_open: bool,
    pub failure_count: u32,
    pub success_count: u32,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    pub success_rate_percent: f64,
    pub times_opened: u64,
    pub failure_threshold: u32,
    pub open_timeout_secs: u64,
    pub last_failure_time: Option<DateTime<Utc>>,
    pub last_success_time: Option<DateTime<Utc>>,
    pub seconds_since_last_failure: Option<f64>,
    pub seconds_since_last_success: Option<f64>,
}

impl CircuitMetrics {
    /// Below this success rate a circuit is reported as unhealthy.
    pub const HEALTHY_SUCCESS_RATE: f64 = 90.0;

    pub fn is_healthy(&self) -> bool {
        !self.is_open && self.success_rate_percent >= Self::HEALTHY_SUCCESS_RATE
    }

    /// Operator advice keyed by severity.
    pub fn recommendations(&self) -> BTreeMap<&'static str, String> {
        let mut advice = BTreeMap::new();

        if self.is_open {
            advice.insert(
                "immediate",
                "Circuit is OPEN - external service is likely down. Check service health.".to_string(),
            );
            advice.insert(
                "action",
                format!(
                    "Wait {} seconds for automatic retry or check external service status.",
                    self.open_timeout_secs
                ),
            );
        } else if self.success_rate_percent < Self::HEALTHY_SUCCESS_RATE {
            advice.insert(
                "warning",
                format!(
                    "Success rate is {}% - monitor external service closely.",
                    self.success_rate_percent
                ),
            );
            advice.insert(
                "action",
                "Consider increasing timeout or checking external service performance.".to_string(),
            );
        } else if self.failure_count > 0 {
            advice.insert(
                "info",
                format!("Recent failures detected ({}). Monitor for patterns.", self.failure_count),
            );
        } else {
            advice.insert(
                "status",
                "Circuit breaker is healthy and operating normally.".to_string(),
            );
        }

        if self.times_opened > 5 {
            advice.insert(
                "concern",
                format!(
                    "Circuit has opened {} times. Consider adjusting thresholds or improving external service reliability.",
                    self.times_opened
                ),
            );
        }

        advice
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    fn breaker(threshold: u32, timeout_secs: u64) -> (CircuitBreaker, ManualClock) {
        let clock = ManualClock::default();
        let cb = CircuitBreaker::with_clock(
            "test",
            threshold,
            Duration::from_secs(timeout_secs),
            Arc::new(clock.clone()),
        );
        (cb, clock)
    }

    #[test]
    fn test_opens_exactly_at_threshold() {
        for threshold in 1..=7 {
            let (cb, _) = breaker(threshold, 60);
            for _ in 0..threshold - 1 {
                cb.record_failure();
            }
            assert!(!cb.is_open(), "threshold {}: open too early", threshold);

            cb.record_failure();
            assert!(cb.is_open(), "threshold {}: should be open", threshold);
            assert_eq!(cb.metrics().times_opened, 1);
        }
    }

    #[test]
    fn test_zero_threshold_clamped_to_one() {
        let (cb, _) = breaker(0, 60);
        assert_eq!(cb.failure_threshold(), 1);
        assert_eq!(cb.metrics().failure_threshold, 1);

        cb.record_failure();
        assert!(cb.is_open());
    }

    #[test]
    fn test_success_resets_failure_streak() {
        let (cb, _) = breaker(3, 60);
        cb.record_failure();
        cb.record_failure();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert!(!cb.is_open());
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_full_recovery_cycle() {
        let (cb, clock) = breaker(5, 60);
        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.metrics().last_failure_time.is_some());
        assert_eq!(cb.metrics().times_opened, 1);

        clock.advance(Duration::from_secs(61));
        assert!(!cb.is_open());
        assert_eq!(cb.state(), CircuitState::HalfOpen);

        cb.record_success();
        let m = cb.metrics();
        assert_eq!(m.state, CircuitState::Closed);
        assert_eq!(m.failure_count, 0);
        assert_eq!(m.times_opened, 1);
    }

    #[test]
    fn test_still_open_at_exact_timeout() {
        let (cb, clock) = breaker(1, 60);
        cb.record_failure();
        clock.advance(Duration::from_secs(60));
        assert!(cb.is_open());
        clock.advance(Duration::from_millis(1));
        assert!(!cb.is_open());
    }

    #[test]
    fn test_half_open_failure_reopens() {
        let (cb, clock) = breaker(2, 10);
        cb.record_failure();
        cb.record_failure();
        clock.advance(Duration::from_secs(11));
        assert!(!cb.is_open());

        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
        assert!(cb.is_open());

        // The refreshed failure time restarts the cooldown.
        clock.advance(Duration::from_secs(5));
        assert!(cb.is_open());
    }

    #[test]
    fn test_reset_keeps_lifetime_counters() {
        let (cb, _) = breaker(1, 60);
        cb.record_success();
        cb.record_failure();
        assert!(cb.is_open());

        cb.reset();
        let m = cb.metrics();
        assert_eq!(m.state, CircuitState::Closed);
        assert!(!m.is_open);
        assert_eq!(m.failure_count, 0);
        assert_eq!(m.success_count, 0);
        assert_eq!(m.total_requests, 2);
        assert_eq!(m.times_opened, 1);
    }

    #[test]
    fn test_metrics_idempotent() {
        let (cb, _) = breaker(3, 60);
        cb.record_success();
        cb.record_failure();
        let first = cb.metrics();
        let second = cb.metrics();
        assert_eq!(first, second);
        assert_eq!(first.success_rate_percent, 50.0);
    }

    #[test]
    fn test_recommendations() {
        let (cb, _) = breaker(1, 45);
        assert!(cb.metrics().recommendations().contains_key("status"));

        cb.record_failure();
        let advice = cb.metrics().recommendations();
        assert!(advice["immediate"].contains("OPEN"));
        assert!(advice["action"].contains("45 seconds"));

        let (cb, _) = breaker(10, 60);
        cb.record_success();
        cb.record_failure();
        let advice = cb.metrics().recommendations();
        assert!(advice["warning"].contains("50%"));
    }

    #[test]
    fn test_concurrent_failures_open_once() {
        let (cb, _) = breaker(50, 60);
        let cb = Arc::new(cb);
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cb = cb.clone();
                std::thread::spawn(move || {
                    for _ in 0..25 {
                        cb.record_failure();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let m = cb.metrics();
        assert_eq!(m.total_failures, 200);
        assert_eq!(m.failure_count, 200);
        assert_eq!(m.times_opened, 1);
        assert!(m.is_open);
    }
}
