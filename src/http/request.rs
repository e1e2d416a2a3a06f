//! Inbound request plumbing.
//!
//! # Responsibilities
//! - Request ID generation and propagation (`x-request-id`, UUID v4)
//! - Per-request span carrying the request ID
//! - Inbound request metrics
//!
//! # Design Decisions
//! - Request ID added as early as possible for tracing
//! - An ID supplied by the client is kept as-is

use std::time::Instant;

use axum::{
    body::Body,
    extract::FromRequestParts,
    http::{request::Parts, HeaderName, Request},
    middleware::Next,
    response::Response,
};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tracing::Span;

use crate::observability::metrics;

pub const X_REQUEST_ID: &str = "x-request-id";

/// The request ID assigned to the current request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

/// Read the request ID from headers.
pub trait RequestIdExt {
    fn request_id(&self) -> Option<&str>;
}

impl<B> RequestIdExt for Request<B> {
    fn request_id(&self) -> Option<&str> {
        self.headers().get(X_REQUEST_ID).and_then(|v| v.to_str().ok())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for RequestId {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown");
        Ok(RequestId(id.to_string()))
    }
}

pub fn set_request_id_layer() -> SetRequestIdLayer<MakeRequestUuid> {
    SetRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID), MakeRequestUuid)
}

pub fn propagate_request_id_layer() -> PropagateRequestIdLayer {
    PropagateRequestIdLayer::new(HeaderName::from_static(X_REQUEST_ID))
}

/// Span for `TraceLayer` that includes the request ID.
pub fn make_request_span(request: &Request<Body>) -> Span {
    tracing::info_span!(
        "request",
        method = %request.method(),
        path = %request.uri().path(),
        request_id = request.request_id().unwrap_or("unknown"),
    )
}

/// Record `gateway_requests_total` and latency for every request.
pub async fn track_requests(request: Request<Body>, next: Next) -> Response {
    let started = Instant::now();
    let method = request.method().to_string();

    let response = next.run(request).await;

    metrics::record_request(&method, response.status().as_u16(), started);
    response
}
