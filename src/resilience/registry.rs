//! Named circuit breaker store.
//!
//! # Responsibilities
//! - Map a dependency name to exactly one `CircuitBreaker`
//! - Aggregate metrics for monitoring endpoints
//! - Administrative reset of one or all circuits
//!
//! # Design Decisions
//! - Constructed once by the composition root and shared via `Arc`
//! - First writer wins: later config for an existing name is ignored
//! - Insertion only on first use per name; lookups are read-mostly

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::config::CircuitSettings;
use crate::resilience::circuit_breaker::{CircuitBreaker, CircuitMetrics};
use crate::resilience::clock::{Clock, SystemClock};

/// Process-wide set of circuit breakers keyed by dependency name.
#[derive(Debug)]
pub struct CircuitBreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
    defaults: CircuitSettings,
    clock: Arc<dyn Clock>,
}

impl CircuitBreakerRegistry {
    pub fn new(defaults: CircuitSettings) -> Self {
        Self::with_clock(defaults, Arc::new(SystemClock))
    }

    pub fn with_clock(defaults: CircuitSettings, clock: Arc<dyn Clock>) -> Self {
        Self {
            breakers: DashMap::new(),
            defaults,
            clock,
        }
    }

    /// Get the breaker for `name`, creating it with the registry defaults.
    pub fn get_or_create(&self, name: &str) -> Arc<CircuitBreaker> {
        self.get_or_create_with(name, self.defaults)
    }

    /// Get the breaker for `name`, creating it with `settings` on first use.
    pub fn get_or_create_with(&self, name: &str, settings: CircuitSettings) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(name) {
            return Arc::clone(existing.value());
        }

        let entry = self.breakers.entry(name.to_string()).or_insert_with(|| {
            Arc::new(CircuitBreaker::from_settings(name, settings, self.clock.clone()))
        });
        Arc::clone(entry.value())
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).map(|b| Arc::clone(b.value()))
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }

    /// Metrics for every registered breaker, keyed by name.
    pub fn all_metrics(&self) -> BTreeMap<String, CircuitMetrics> {
        // Snapshot the Arcs first so no shard lock is held while breakers lock.
        let breakers: Vec<Arc<CircuitBreaker>> =
            self.breakers.iter().map(|e| Arc::clone(e.value())).collect();

        breakers
            .into_iter()
            .map(|b| (b.name().to_string(), b.metrics()))
            .collect()
    }

    /// Reset one breaker. Returns false when the name is unknown.
    pub fn reset(&self, name: &str) -> bool {
        match self.get(name) {
            Some(breaker) => {
                breaker.reset();
                true
            }
            None => false,
        }
    }

    pub fn reset_all(&self) {
        for breaker in self.breakers.iter().map(|e| Arc::clone(e.value())).collect::<Vec<_>>() {
            breaker.reset();
        }
        tracing::info!("All circuit breakers reset");
    }

    pub fn summary(&self) -> RegistrySummary {
        RegistrySummary::from_metrics(&self.all_metrics())
    }
}

/// Aggregate health across all circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OverallStatus {
    Healthy,
    Degraded,
    Critical,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegistrySummary {
    pub status: OverallStatus,
    pub total_circuits: usize,
    pub healthy_circuits: usize,
    pub unhealthy_circuits: usize,
    pub open_circuits: usize,
    pub total_requests: u64,
    pub total_failures: u64,
    pub total_successes: u64,
    pub overall_success_rate_percent: f64,
    pub unhealthy_circuit_names: Vec<String>,
    pub open_circuit_names: Vec<String>,
}

impl RegistrySummary {
    pub fn from_metrics(metrics: &BTreeMap<String, CircuitMetrics>) -> Self {
        let open: Vec<String> = metrics
            .iter()
            .filter(|(_, m)| m.is_open)
            .map(|(name, _)| name.clone())
            .collect();
        let unhealthy: Vec<String> = metrics
            .iter()
            .filter(|(_, m)| !m.is_healthy())
            .map(|(name, _)| name.clone())
            .collect();

        let average = if metrics.is_empty() {
            100.0
        } else {
            let sum: f64 = metrics.values().map(|m| m.success_rate_percent).sum();
            (sum / metrics.len() as f64 * 100.0).round() / 100.0
        };

        let status = if !open.is_empty() {
            OverallStatus::Critical
        } else if !unhealthy.is_empty() {
            OverallStatus::Degraded
        } else {
            OverallStatus::Healthy
        };

        Self {
            status,
            total_circuits: metrics.len(),
            healthy_circuits: metrics.len() - unhealthy.len(),
            unhealthy_circuits: unhealthy.len(),
            open_circuits: open.len(),
            total_requests: metrics.values().map(|m| m.total_requests).sum(),
            total_failures: metrics.values().map(|m| m.total_failures).sum(),
            total_successes: metrics.values().map(|m| m.total_successes).sum(),
            overall_success_rate_percent: average,
            unhealthy_circuit_names: unhealthy,
            open_circuit_names: open,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::clock::ManualClock;

    fn settings(threshold: u32) -> CircuitSettings {
        CircuitSettings {
            failure_threshold: threshold,
            open_timeout_secs: 60,
        }
    }

    #[test]
    fn test_first_writer_wins() {
        let registry = CircuitBreakerRegistry::new(CircuitSettings::default());
        let first = registry.get_or_create_with("x", settings(3));
        let second = registry.get_or_create_with("x", settings(10));

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.failure_threshold(), 3);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_defaults_apply() {
        let registry = CircuitBreakerRegistry::new(settings(7));
        assert_eq!(registry.get_or_create("nasa").failure_threshold(), 7);
        assert!(registry.get("unknown").is_none());
    }

    #[test]
    fn test_reset_one_and_all() {
        let registry = CircuitBreakerRegistry::with_clock(settings(1), Arc::new(ManualClock::default()));
        registry.get_or_create("a").record_failure();
        registry.get_or_create("b").record_failure();

        assert!(registry.reset("a"));
        assert!(!registry.reset("missing"));
        assert!(!registry.get_or_create("a").is_open());
        assert!(registry.get_or_create("b").is_open());

        registry.reset_all();
        assert!(registry.all_metrics().values().all(|m| !m.is_open));
    }

    #[test]
    fn test_summary_status() {
        let registry = CircuitBreakerRegistry::with_clock(settings(2), Arc::new(ManualClock::default()));
        assert_eq!(registry.summary().status, OverallStatus::Healthy);

        let a = registry.get_or_create("a");
        a.record_success();
        a.record_failure();
        registry.get_or_create("b").record_success();
        let summary = registry.summary();
        assert_eq!(summary.status, OverallStatus::Degraded);
        assert_eq!(summary.unhealthy_circuit_names, vec!["a".to_string()]);
        assert_eq!(summary.overall_success_rate_percent, 75.0);

        a.record_failure();
        let summary = registry.summary();
        assert_eq!(summary.status, OverallStatus::Critical);
        assert_eq!(summary.open_circuit_names, vec!["a".to_string()]);
        assert_eq!(summary.total_requests, 4);
    }

    #[test]
    fn test_concurrent_get_or_create_single_instance() {
        let registry = Arc::new(CircuitBreakerRegistry::new(CircuitSettings::default()));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = registry.clone();
                std::thread::spawn(move || registry.get_or_create_with("shared", settings(i + 1)))
            })
            .collect();
        let breakers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(breakers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
        assert_eq!(registry.len(), 1);
    }
}
