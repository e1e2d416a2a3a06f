//! API gateway library.
//!
//! Puts free public APIs behind one REST surface, with retries and a
//! circuit breaker per upstream.

pub mod admin;
pub mod config;
pub mod health;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resilience;
pub mod services;
pub mod upstream;

pub use config::GatewayConfig;
pub use http::{AppState, HttpServer};
pub use lifecycle::Shutdown;
