//! Metrics collection and exposition.
//!
//! # Metrics
//! - `gateway_requests_total` (counter): inbound requests by method, status
//! - `gateway_request_duration_seconds` (histogram): inbound latency
//! - `gateway_upstream_requests_total` (counter): attempts by dependency, outcome
//! - `gateway_upstream_duration_seconds` (histogram): attempt latency by dependency
//! - `gateway_upstream_retries_total` (counter): retries by dependency
//! - `gateway_circuit_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `gateway_circuit_rejections_total` (counter): fast-fails by dependency
//!
//! # Design Decisions
//! - Recording is a no-op until `init_metrics` installs the exporter
//! - Labels are low-cardinality: dependency names, methods, status codes

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::CircuitState;

/// Install the Prometheus exporter with its own scrape listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Prometheus metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(method: &str, status: u16, start: Instant) {
    counter!(
        "gateway_requests_total",
        "method" => method.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!("gateway_request_duration_seconds").record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_attempt(dependency: &str, outcome: &str, start: Instant) {
    counter!(
        "gateway_upstream_requests_total",
        "dependency" => dependency.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
    histogram!("gateway_upstream_duration_seconds", "dependency" => dependency.to_string())
        .record(start.elapsed().as_secs_f64());
}

pub fn record_retry(dependency: &str) {
    counter!("gateway_upstream_retries_total", "dependency" => dependency.to_string()).increment(1);
}

pub fn record_circuit_state(dependency: &str, state: CircuitState) {
    gauge!("gateway_circuit_state", "dependency" => dependency.to_string()).set(circuit_state_value(state));
}

pub fn record_circuit_rejection(dependency: &str) {
    counter!("gateway_circuit_rejections_total", "dependency" => dependency.to_string()).increment(1);
}

fn circuit_state_value(state: CircuitState) -> f64 {
    match state {
        CircuitState::Closed => 0.0,
        CircuitState::HalfOpen => 1.0,
        CircuitState::Open => 2.0,
    }
}
