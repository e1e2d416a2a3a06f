//! Error responses.
//!
//! # Responsibilities
//! - Map each upstream error kind to a distinct HTTP status
//! - Render a uniform JSON error body
//!
//! # Design Decisions
//! - Clients always see the upstream error kind, never a generic 500
//! - 429 responses carry `Retry-After` when the upstream sent one

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::upstream::{UpstreamError, ValidationStage};

/// Client closed request (nginx convention).
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// JSON body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
    pub dependency: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
}

/// An upstream failure rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub UpstreamError);

impl From<UpstreamError> for ApiError {
    fn from(err: UpstreamError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        status_for(&self.0)
    }

    pub fn body(&self) -> ErrorBody {
        ErrorBody {
            error: self.0.kind().as_str(),
            message: self.0.to_string(),
            dependency: self.0.service().to_string(),
            upstream_status: self.0.upstream_status(),
        }
    }
}

/// HTTP status for an upstream error.
pub fn status_for(err: &UpstreamError) -> StatusCode {
    match err {
        UpstreamError::Connection { .. } => StatusCode::SERVICE_UNAVAILABLE,
        UpstreamError::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
        UpstreamError::CircuitOpen { .. } => StatusCode::SERVICE_UNAVAILABLE,
        UpstreamError::Auth { .. } => StatusCode::FORBIDDEN,
        UpstreamError::NotFound { .. } => StatusCode::NOT_FOUND,
        UpstreamError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
        UpstreamError::Api { status, .. } if *status >= 500 => StatusCode::BAD_GATEWAY,
        UpstreamError::Api { .. } => StatusCode::BAD_REQUEST,
        UpstreamError::Validation {
            stage: ValidationStage::Request,
            ..
        } => StatusCode::UNPROCESSABLE_ENTITY,
        UpstreamError::Validation {
            stage: ValidationStage::Response,
            ..
        } => StatusCode::BAD_GATEWAY,
        UpstreamError::Cancelled { .. } => {
            StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST)
        }
        UpstreamError::Service { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = self.body();

        if status.is_server_error() {
            tracing::warn!(dependency = %body.dependency, error = body.error, status = %status, "{}", body.message);
        } else {
            tracing::debug!(dependency = %body.dependency, error = body.error, status = %status, "{}", body.message);
        }

        let mut response = (status, Json(body)).into_response();
        if let UpstreamError::RateLimited {
            retry_after: Some(after),
            ..
        } = &self.0
        {
            if let Ok(value) = HeaderValue::from_str(&after.as_secs().to_string()) {
                response.headers_mut().insert(RETRY_AFTER, value);
            }
        }
        response
    }
}
