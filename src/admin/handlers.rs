use std::collections::BTreeMap;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::http::server::AppState;
use crate::resilience::{CircuitMetrics, OverallStatus, RegistrySummary};

#[derive(Debug, Serialize)]
pub struct CircuitOverview {
    pub status: OverallStatus,
    pub timestamp: DateTime<Utc>,
    pub summary: RegistrySummary,
    pub circuit_breakers: BTreeMap<String, CircuitMetrics>,
}

#[derive(Debug, Serialize)]
pub struct CircuitDetails {
    pub circuit_name: String,
    pub metrics: CircuitMetrics,
    pub recommendations: BTreeMap<&'static str, String>,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub status: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub circuit_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct UnknownCircuit {
    pub error: String,
    pub available_circuits: Vec<String>,
}

fn unknown_circuit(state: &AppState, name: &str) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(UnknownCircuit {
            error: format!("Circuit breaker '{}' not found", name),
            available_circuits: state.registry.names(),
        }),
    )
        .into_response()
}

pub async fn list_circuits(State(state): State<AppState>) -> Json<CircuitOverview> {
    let metrics = state.registry.all_metrics();
    let summary = RegistrySummary::from_metrics(&metrics);

    Json(CircuitOverview {
        status: summary.status,
        timestamp: Utc::now(),
        summary,
        circuit_breakers: metrics,
    })
}

pub async fn get_circuit(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    match state.registry.get(&name) {
        Some(breaker) => {
            let metrics = breaker.metrics();
            Json(CircuitDetails {
                circuit_name: name,
                recommendations: metrics.recommendations(),
                metrics,
            })
            .into_response()
        }
        None => unknown_circuit(&state, &name),
    }
}

pub async fn reset_all_circuits(State(state): State<AppState>) -> Json<ResetResponse> {
    state.registry.reset_all();
    Json(ResetResponse {
        status: "success",
        message: "All circuit breakers have been reset".to_string(),
        circuit_name: None,
        timestamp: Utc::now(),
    })
}

pub async fn reset_circuit(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    if !state.registry.reset(&name) {
        return unknown_circuit(&state, &name);
    }

    tracing::info!(circuit = %name, "Circuit breaker reset via admin API");
    Json(ResetResponse {
        status: "success",
        message: format!("Circuit breaker '{}' has been reset", name),
        circuit_name: Some(name),
        timestamp: Utc::now(),
    })
    .into_response()
}
