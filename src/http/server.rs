//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, metrics)
//! - Serve on a bound listener until shutdown

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    http::{StatusCode, Uri},
    middleware,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admin::setup_admin_router;
use crate::config::GatewayConfig;
use crate::health::setup_health_router;
use crate::http::request::{make_request_span, propagate_request_id_layer, set_request_id_layer, track_requests};
use crate::http::{nasa, rick_and_morty};
use crate::resilience::CircuitBreakerRegistry;
use crate::services::{NasaService, RickAndMortyService, ServiceContext};
use crate::upstream::HttpClientPool;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub registry: Arc<CircuitBreakerRegistry>,
    pub pool: Arc<HttpClientPool>,
    pub nasa: Arc<NasaService>,
    pub rick_and_morty: Arc<RickAndMortyService>,
    pub started_at: Instant,
}

impl AppState {
    /// Build the services on top of a shared pool and registry.
    pub fn new(
        config: GatewayConfig,
        pool: Arc<HttpClientPool>,
        registry: Arc<CircuitBreakerRegistry>,
    ) -> Result<Self, url::ParseError> {
        let ctx = ServiceContext::new(&config, pool.clone(), registry.clone());
        let nasa = NasaService::new(&config.upstreams.nasa, &ctx)?;
        let rick_and_morty = RickAndMortyService::new(&config.upstreams.rick_and_morty, &ctx)?;

        Ok(Self {
            config: Arc::new(config),
            registry,
            pool,
            nasa: Arc::new(nasa),
            rick_and_morty: Arc::new(rick_and_morty),
            started_at: Instant::now(),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }
}

/// HTTP server for the gateway.
pub struct HttpServer {
    router: Router,
    config: Arc<GatewayConfig>,
}

impl HttpServer {
    pub fn new(state: AppState) -> Self {
        let config = state.config.clone();
        let router = Self::build_router(state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    pub fn build_router(state: AppState) -> Router {
        let request_timeout = Duration::from_secs(state.config.timeouts.request_secs);

        let api = Router::new()
            .route("/api/v1/nasa/apod", get(nasa::get_apod))
            .route("/api/v1/rickandmorty/character", get(rick_and_morty::get_characters))
            .route("/api/v1/rickandmorty/character/{ids}", get(rick_and_morty::get_characters_by_ids))
            .route("/api/v1/rickandmorty/location", get(rick_and_morty::get_locations))
            .route("/api/v1/rickandmorty/episode", get(rick_and_morty::get_episodes))
            .with_state(state.clone());

        // Outermost first: the ID must exist before the trace span is created.
        let stack = ServiceBuilder::new()
            .layer(set_request_id_layer())
            .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
            .layer(propagate_request_id_layer())
            .layer(TimeoutLayer::new(request_timeout))
            .layer(middleware::from_fn(track_requests));

        Router::new()
            .merge(setup_health_router(state.clone()))
            .merge(setup_admin_router(state))
            .merge(api)
            .fallback(not_found)
            .layer(stack)
    }

    /// Serve until `shutdown` resolves, then drain in-flight requests.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            request_timeout_secs = self.config.timeouts.request_secs,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn into_router(self) -> Router {
        self.router
    }
}

async fn not_found(uri: Uri) -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(serde_json::json!({
            "error": "not_found",
            "message": format!("No route for {}", uri.path()),
        })),
    )
}
