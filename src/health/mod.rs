//! Health endpoints.
//!
//! # Endpoints
//! - `GET /health`: liveness, never touches upstreams
//! - `GET /health/ready`: 503 once the shared HTTP client is closed
//! - `GET /health/dependencies`: probes every upstream concurrently
//!
//! # Design Decisions
//! - Probes go through the normal resilient call path, so an open circuit
//!   reports the dependency unhealthy without any I/O

pub mod handlers;

use axum::{routing::get, Router};

use crate::http::server::AppState;
use self::handlers::*;

pub fn setup_health_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(ready))
        .route("/health/dependencies", get(dependencies))
        .with_state(state)
}
