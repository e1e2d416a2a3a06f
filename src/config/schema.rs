//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gateway.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the API gateway.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Shared outbound connection pool.
    pub http_client: HttpClientConfig,

    /// Retry configuration.
    pub retries: RetryConfig,

    /// Circuit breaker defaults and failure-counting policy.
    pub circuit_breaker: CircuitBreakerConfig,

    /// Upstream API definitions.
    pub upstreams: UpstreamsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8000".to_string(),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Deadline for a single outbound attempt in seconds.
    pub upstream_secs: u64,

    /// Deadline for a whole inbound request in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            upstream_secs: 30,
            request_secs: 60,
        }
    }
}

/// Shared outbound HTTP client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpClientConfig {
    /// Maximum concurrent outbound requests across all upstreams.
    pub max_connections: usize,

    /// Maximum idle keep-alive connections kept per host.
    pub max_keepalive_connections: usize,

    /// User-Agent header sent upstream.
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            max_connections: 20,
            max_keepalive_connections: 10,
            user_agent: format!("api-gateway/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Additional attempts after the first one.
    pub max_retries: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,

    /// Add up to 10% random jitter to each delay.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
            jitter: false,
        }
    }
}

/// Circuit breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitSettings {
    /// Consecutive failures that open the circuit.
    pub failure_threshold: u32,

    /// Seconds the circuit stays open before a trial call.
    pub open_timeout_secs: u64,
}

impl Default for CircuitSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            open_timeout_secs: 60,
        }
    }
}

/// Circuit breaker defaults and failure-counting policy.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Thresholds for circuits created without explicit settings.
    #[serde(flatten)]
    pub defaults: CircuitSettings,

    /// Count upstream 4xx application errors as circuit failures.
    pub count_client_errors: bool,

    /// Count upstream 429 responses as circuit failures.
    pub count_rate_limited: bool,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            defaults: CircuitSettings::default(),
            count_client_errors: false,
            count_rate_limited: true,
        }
    }
}

/// Known upstream APIs.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamsConfig {
    pub nasa: NasaConfig,
    pub rick_and_morty: RickAndMortyConfig,
}

/// NASA open API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct NasaConfig {
    pub base_url: String,

    /// Sent as the `api_key` query parameter.
    pub api_key: String,

    pub circuit: CircuitSettings,
}

impl Default for NasaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.nasa.gov/".to_string(),
            api_key: "DEMO_KEY".to_string(),
            circuit: CircuitSettings {
                failure_threshold: 5,
                open_timeout_secs: 60,
            },
        }
    }
}

/// Rick and Morty API settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RickAndMortyConfig {
    pub base_url: String,
    pub circuit: CircuitSettings,
}

impl Default for RickAndMortyConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rickandmortyapi.com/api/".to_string(),
            circuit: CircuitSettings {
                failure_threshold: 5,
                open_timeout_secs: 30,
            },
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
