//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML) or built-in defaults
//!     → loader.rs (parse, apply environment overrides)
//!     → validation.rs (semantic checks)
//!     → GatewayConfig (validated, immutable)
//!     → handed to subsystems at startup
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{default_config, load_config, ConfigError};
pub use schema::{
    CircuitBreakerConfig, CircuitSettings, GatewayConfig, HttpClientConfig, ListenerConfig,
    LogFormat, NasaConfig, ObservabilityConfig, RetryConfig, RickAndMortyConfig, TimeoutConfig,
    UpstreamsConfig,
};
