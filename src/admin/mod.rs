//! Circuit breaker monitoring and administration.
//!
//! # Endpoints
//! - `GET /api/circuit-breakers`: summary plus per-circuit metrics
//! - `GET /api/circuit-breakers/{name}`: one circuit with recommendations
//! - `POST /api/circuit-breakers/reset`: close every circuit
//! - `POST /api/circuit-breakers/{name}/reset`: close one circuit

pub mod handlers;

use axum::{
    routing::{get, post},
    Router,
};

use crate::http::server::AppState;
use self::handlers::*;

pub fn setup_admin_router(state: AppState) -> Router {
    Router::new()
        .route("/api/circuit-breakers", get(list_circuits))
        .route("/api/circuit-breakers/reset", post(reset_all_circuits))
        .route("/api/circuit-breakers/{name}", get(get_circuit))
        .route("/api/circuit-breakers/{name}/reset", post(reset_circuit))
        .with_state(state)
}
