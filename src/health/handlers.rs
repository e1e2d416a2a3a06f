use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use futures_util::future::{join_all, BoxFuture};
use futures_util::FutureExt;
use serde::Serialize;

use crate::http::server::AppState;
use crate::services::DependencyHealth;

pub const SERVICE_NAME: &str = "api-gateway";

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: &'static str,
    pub version: &'static str,
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize)]
pub struct DependenciesResponse {
    pub status: &'static str,
    pub timestamp: DateTime<Utc>,
    pub dependencies: Vec<DependencyHealth>,
}

fn health_body(state: &AppState, status: &'static str) -> HealthResponse {
    HealthResponse {
        status,
        service: SERVICE_NAME,
        version: env!("CARGO_PKG_VERSION"),
        timestamp: Utc::now(),
        uptime_seconds: state.uptime().as_secs(),
    }
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(health_body(&state, "healthy"))
}

pub async fn ready(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    if state.pool.is_closed() {
        (StatusCode::SERVICE_UNAVAILABLE, Json(health_body(&state, "not_ready")))
    } else {
        (StatusCode::OK, Json(health_body(&state, "ready")))
    }
}

pub async fn dependencies(State(state): State<AppState>) -> Json<DependenciesResponse> {
    let probes: Vec<BoxFuture<'_, DependencyHealth>> = vec![
        state.nasa.health_check().boxed(),
        state.rick_and_morty.health_check().boxed(),
    ];
    let dependencies = join_all(probes).await;

    Json(DependenciesResponse {
        status: overall_status(&dependencies),
        timestamp: Utc::now(),
        dependencies,
    })
}

/// `healthy` when all pass, `unhealthy` when all fail, `degraded` otherwise.
pub fn overall_status(dependencies: &[DependencyHealth]) -> &'static str {
    let healthy = dependencies.iter().filter(|d| d.is_healthy()).count();
    if healthy == dependencies.len() {
        "healthy"
    } else if healthy == 0 {
        "unhealthy"
    } else {
        "degraded"
    }
}
