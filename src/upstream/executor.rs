//! Single-attempt upstream execution.
//!
//! # Responsibilities
//! - Build one outbound HTTP call (URL join, auth injection, headers, body)
//! - Classify the outcome into a typed `UpstreamError`
//! - Decode successful bodies (JSON or text)
//!
//! # Design Decisions
//! - No retries here; `resilience::retries` owns re-attempts
//! - Connect failures and timeouts are distinct from HTTP status errors
//! - Anything unexpected becomes `Service` and is logged at error level

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::header::{HeaderMap, CONTENT_TYPE, RETRY_AFTER};
use reqwest::StatusCode;
use url::Url;

use crate::observability::metrics;
use crate::upstream::error::{UpstreamError, UpstreamResult};
use crate::upstream::pool::HttpClientPool;
use crate::upstream::request::UpstreamRequest;
use crate::upstream::response::{ParsedResponse, ResponseBody};

/// Performs exactly one attempt of an upstream call.
#[async_trait]
pub trait RequestExecutor: Send + Sync {
    /// Dependency name used in errors, logs and metrics.
    fn service(&self) -> &str;

    async fn attempt(&self, request: &UpstreamRequest) -> UpstreamResult<ParsedResponse>;
}

/// How an upstream expects credentials.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamAuth {
    None,
    /// Appended to every query string, e.g. NASA's `api_key`.
    QueryApiKey { param: String, key: String },
    Bearer(String),
}

/// `RequestExecutor` backed by the shared `reqwest` pool.
#[derive(Debug, Clone)]
pub struct HttpExecutor {
    service: String,
    base_url: Url,
    auth: UpstreamAuth,
    pool: Arc<HttpClientPool>,
}

impl HttpExecutor {
    pub fn new(
        service: impl Into<String>,
        base_url: &str,
        auth: UpstreamAuth,
        pool: Arc<HttpClientPool>,
    ) -> Result<Self, url::ParseError> {
        // Url::join drops the last segment unless the base ends with '/'.
        let normalized = format!("{}/", base_url.trim_end_matches('/'));
        Ok(Self {
            service: service.into(),
            base_url: Url::parse(&normalized)?,
            auth,
            pool,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn classify_transport(&self, err: reqwest::Error, timeout: Duration) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout {
                service: self.service.clone(),
                timeout,
            }
        } else if err.is_connect() || err.is_request() || err.is_body() {
            UpstreamError::Connection {
                service: self.service.clone(),
                message: err.to_string(),
            }
        } else {
            tracing::error!(service = %self.service, error = %err, "Unexpected HTTP client error");
            UpstreamError::Service {
                service: self.service.clone(),
                message: err.to_string(),
            }
        }
    }
}

#[async_trait]
impl RequestExecutor for HttpExecutor {
    fn service(&self) -> &str {
        &self.service
    }

    async fn attempt(&self, request: &UpstreamRequest) -> UpstreamResult<ParsedResponse> {
        let path = request.resolve_path(&self.service)?;
        let url = self.base_url.join(&path).map_err(|e| {
            UpstreamError::request_validation(&self.service, format!("Invalid endpoint '{}': {}", path, e))
        })?;

        // One deadline covers waiting for a pool slot and the call itself.
        let timeout = request.timeout.unwrap_or_else(|| self.pool.attempt_timeout());
        let started = Instant::now();
        let deadline = tokio::time::Instant::now() + timeout;

        let (_permit, client) = match tokio::time::timeout_at(deadline, self.pool.acquire()).await {
            Ok(Ok(slot)) => slot,
            Ok(Err(e)) => {
                let err = UpstreamError::Service {
                    service: self.service.clone(),
                    message: e.to_string(),
                };
                metrics::record_upstream_attempt(&self.service, err.kind().as_str(), started);
                return Err(err);
            }
            Err(_) => {
                tracing::warn!(
                    service = %self.service,
                    timeout_ms = timeout.as_millis() as u64,
                    "No free connection slot before deadline"
                );
                let err = UpstreamError::Timeout {
                    service: self.service.clone(),
                    timeout,
                };
                metrics::record_upstream_attempt(&self.service, err.kind().as_str(), started);
                return Err(err);
            }
        };

        let mut query = request.query.clone();
        let mut builder = client
            .request(request.method.clone(), url.clone())
            .timeout(deadline.saturating_duration_since(tokio::time::Instant::now()));

        match &self.auth {
            UpstreamAuth::None => {}
            UpstreamAuth::QueryApiKey { param, key } => query.push((param.clone(), key.clone())),
            UpstreamAuth::Bearer(token) => builder = builder.bearer_auth(token),
        }
        if !query.is_empty() {
            builder = builder.query(&query);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        tracing::debug!(service = %self.service, method = %request.method, path = %url.path(), "Upstream attempt");

        let response = match builder.send().await {
            Ok(response) => response,
            Err(e) => {
                let err = self.classify_transport(e, timeout);
                metrics::record_upstream_attempt(&self.service, err.kind().as_str(), started);
                return Err(err);
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = match response.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                let err = self.classify_transport(e, timeout);
                metrics::record_upstream_attempt(&self.service, err.kind().as_str(), started);
                return Err(err);
            }
        };

        if status.is_client_error() || status.is_server_error() {
            let err = classify_status(&self.service, status, &headers, &bytes);
            metrics::record_upstream_attempt(&self.service, err.kind().as_str(), started);
            return Err(err);
        }

        let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
        let body = match ResponseBody::decode(content_type, &bytes) {
            Ok(body) => body,
            Err(e) => {
                let err = UpstreamError::response_validation(&self.service, format!("Malformed JSON body: {}", e));
                metrics::record_upstream_attempt(&self.service, err.kind().as_str(), started);
                return Err(err);
            }
        };

        metrics::record_upstream_attempt(&self.service, "success", started);
        tracing::info!(service = %self.service, path = %url.path(), status = %status, "Successfully fetched data");

        Ok(ParsedResponse {
            status,
            body,
            headers,
        })
    }
}

/// Map an HTTP error status to its error kind.
pub fn classify_status(
    service: &str,
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
) -> UpstreamError {
    let service = service.to_string();
    match status.as_u16() {
        401 => UpstreamError::Auth {
            service,
            status: 401,
            message: "Unauthorized - invalid API key".to_string(),
        },
        403 => UpstreamError::Auth {
            service,
            status: 403,
            message: "Forbidden - quota exceeded or insufficient permissions".to_string(),
        },
        404 => UpstreamError::NotFound {
            service,
            message: "Resource not found".to_string(),
        },
        429 => UpstreamError::RateLimited {
            service,
            retry_after: headers
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(Duration::from_secs),
        },
        code => UpstreamError::Api {
            service,
            status: code,
            message: format!("API error: {}", code),
            body: Some(ResponseBody::decode_error(body)),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{HttpClientConfig, TimeoutConfig};
    use crate::upstream::error::ErrorKind;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_classify_status() {
        let headers = HeaderMap::new();
        let kind = |code: u16| {
            classify_status("svc", StatusCode::from_u16(code).unwrap(), &headers, b"").kind()
        };

        assert_eq!(kind(401), ErrorKind::Auth);
        assert_eq!(kind(403), ErrorKind::Auth);
        assert_eq!(kind(404), ErrorKind::NotFound);
        assert_eq!(kind(429), ErrorKind::RateLimit);
        assert_eq!(kind(400), ErrorKind::Api);
        assert_eq!(kind(503), ErrorKind::Api);
    }

    #[test]
    fn test_classify_keeps_error_body_and_retry_after() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));

        match classify_status("svc", StatusCode::TOO_MANY_REQUESTS, &headers, b"") {
            UpstreamError::RateLimited { retry_after, .. } => {
                assert_eq!(retry_after, Some(Duration::from_secs(12)));
            }
            other => panic!("unexpected {:?}", other),
        }

        match classify_status("svc", StatusCode::BAD_GATEWAY, &HeaderMap::new(), b"upstream down") {
            UpstreamError::Api { status, body, .. } => {
                assert_eq!(status, 502);
                assert_eq!(body, Some(serde_json::json!({"error": "upstream down"})));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_saturated_pool_times_out_attempt() {
        let config = HttpClientConfig {
            max_connections: 1,
            ..HttpClientConfig::default()
        };
        let pool = Arc::new(HttpClientPool::new(&config, &TimeoutConfig::default()).unwrap());
        let exec = HttpExecutor::new("rm", "http://127.0.0.1:9/", UpstreamAuth::None, pool.clone()).unwrap();
        let (_held, _) = pool.acquire().await.unwrap();

        let started = tokio::time::Instant::now();
        let err = exec
            .attempt(&UpstreamRequest::get("character").timeout(Duration::from_millis(200)))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Timeout);
        assert!(err.is_retryable());
        assert_eq!(started.elapsed(), Duration::from_millis(200));
        assert_eq!(pool.in_flight(), 1);
    }

    #[test]
    fn test_base_url_normalized() {
        let pool = Arc::new(
            HttpClientPool::new(&HttpClientConfig::default(), &TimeoutConfig::default()).unwrap(),
        );
        let exec = HttpExecutor::new("rm", "https://rickandmortyapi.com/api", UpstreamAuth::None, pool)
            .unwrap();
        assert_eq!(
            exec.base_url().join("character/1").unwrap().as_str(),
            "https://rickandmortyapi.com/api/character/1"
        );
    }
}
