//! Classified upstream errors.

use std::time::Duration;
use thiserror::Error;

/// Where a validation problem was detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationStage {
    /// The caller's input could not form a valid upstream request.
    Request,
    /// The upstream answered with a payload of the wrong shape.
    Response,
}

/// Fieldless projection of [`UpstreamError`], used for retry and circuit decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Connection,
    Timeout,
    Auth,
    NotFound,
    RateLimit,
    Api,
    Validation,
    CircuitOpen,
    Cancelled,
    Service,
}

impl ErrorKind {
    /// Stable snake_case label for logs, metrics and error bodies.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Connection => "connection_error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Auth => "auth_error",
            ErrorKind::NotFound => "not_found",
            ErrorKind::RateLimit => "rate_limited",
            ErrorKind::Api => "api_error",
            ErrorKind::Validation => "validation_error",
            ErrorKind::CircuitOpen => "circuit_open",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Service => "service_error",
        }
    }
}

/// Errors produced while calling an upstream API.
#[derive(Debug, Clone, Error)]
pub enum UpstreamError {
    /// Transport could not reach the host.
    #[error("{service} connection error: {message}")]
    Connection { service: String, message: String },

    /// The attempt exceeded its deadline.
    #[error("{service} timeout: request timed out after {:.1}s", .timeout.as_secs_f64())]
    Timeout { service: String, timeout: Duration },

    /// 401/403 from the upstream.
    #[error("{service} API Error {status}: {message}")]
    Auth {
        service: String,
        status: u16,
        message: String,
    },

    /// 404 from the upstream.
    #[error("{service} API Error 404: {message}")]
    NotFound { service: String, message: String },

    /// 429 from the upstream.
    #[error("{service} API Error 429: Rate limit exceeded")]
    RateLimited {
        service: String,
        retry_after: Option<Duration>,
    },

    /// Any other HTTP status >= 400.
    #[error("{service} API Error {status}: {message}")]
    Api {
        service: String,
        status: u16,
        message: String,
        body: Option<serde_json::Value>,
    },

    #[error("{service} validation error: {message}")]
    Validation {
        service: String,
        stage: ValidationStage,
        message: String,
    },

    /// Fast-fail: the circuit for this dependency is open.
    #[error("Circuit breaker '{service}' is open")]
    CircuitOpen { service: String },

    #[error("{service} request cancelled")]
    Cancelled { service: String },

    /// Unexpected failure, treated as a bug signal.
    #[error("{service}: Unexpected error: {message}")]
    Service { service: String, message: String },
}

impl UpstreamError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            UpstreamError::Connection { .. } => ErrorKind::Connection,
            UpstreamError::Timeout { .. } => ErrorKind::Timeout,
            UpstreamError::Auth { .. } => ErrorKind::Auth,
            UpstreamError::NotFound { .. } => ErrorKind::NotFound,
            UpstreamError::RateLimited { .. } => ErrorKind::RateLimit,
            UpstreamError::Api { .. } => ErrorKind::Api,
            UpstreamError::Validation { .. } => ErrorKind::Validation,
            UpstreamError::CircuitOpen { .. } => ErrorKind::CircuitOpen,
            UpstreamError::Cancelled { .. } => ErrorKind::Cancelled,
            UpstreamError::Service { .. } => ErrorKind::Service,
        }
    }

    /// Only transport-level failures are worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Connection | ErrorKind::Timeout)
    }

    /// Name of the dependency that produced the error.
    pub fn service(&self) -> &str {
        match self {
            UpstreamError::Connection { service, .. }
            | UpstreamError::Timeout { service, .. }
            | UpstreamError::Auth { service, .. }
            | UpstreamError::NotFound { service, .. }
            | UpstreamError::RateLimited { service, .. }
            | UpstreamError::Api { service, .. }
            | UpstreamError::Validation { service, .. }
            | UpstreamError::CircuitOpen { service }
            | UpstreamError::Cancelled { service }
            | UpstreamError::Service { service, .. } => service,
        }
    }

    /// HTTP status returned by the upstream, when there was one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            UpstreamError::Auth { status, .. } | UpstreamError::Api { status, .. } => Some(*status),
            UpstreamError::NotFound { .. } => Some(404),
            UpstreamError::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    pub fn request_validation(service: impl Into<String>, message: impl Into<String>) -> Self {
        UpstreamError::Validation {
            service: service.into(),
            stage: ValidationStage::Request,
            message: message.into(),
        }
    }

    pub fn response_validation(service: impl Into<String>, message: impl Into<String>) -> Self {
        UpstreamError::Validation {
            service: service.into(),
            stage: ValidationStage::Response,
            message: message.into(),
        }
    }
}

/// Result type for upstream operations.
pub type UpstreamResult<T> = Result<T, UpstreamError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_transport_errors_retry() {
        let conn = UpstreamError::Connection {
            service: "nasa".into(),
            message: "refused".into(),
        };
        let timeout = UpstreamError::Timeout {
            service: "nasa".into(),
            timeout: Duration::from_secs(30),
        };
        let auth = UpstreamError::Auth {
            service: "nasa".into(),
            status: 403,
            message: "Forbidden".into(),
        };
        let limited = UpstreamError::RateLimited {
            service: "nasa".into(),
            retry_after: None,
        };

        assert!(conn.is_retryable());
        assert!(timeout.is_retryable());
        assert!(!auth.is_retryable());
        assert!(!limited.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = UpstreamError::Api {
            service: "RickAndMorty".into(),
            status: 500,
            message: "API error: 500".into(),
            body: None,
        };
        assert_eq!(err.to_string(), "RickAndMorty API Error 500: API error: 500");
        assert_eq!(err.upstream_status(), Some(500));

        let err = UpstreamError::CircuitOpen { service: "nasa-apod".into() };
        assert_eq!(err.to_string(), "Circuit breaker 'nasa-apod' is open");
        assert_eq!(err.kind().as_str(), "circuit_open");
    }
}
