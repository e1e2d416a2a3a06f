//! Upstream executor, retries and circuit breaking against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use api_gateway::config::{CircuitSettings, HttpClientConfig, TimeoutConfig};
use api_gateway::resilience::{
    CircuitBreakerRegistry, CircuitState, FailurePolicy, ResilientCaller, RetryPolicy, RetryingClient,
};
use api_gateway::upstream::{
    ErrorKind, HttpClientPool, HttpExecutor, RequestExecutor, ResponseBody, UpstreamAuth, UpstreamError,
    UpstreamRequest, ValidationStage,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::json;
use tokio_util::sync::CancellationToken;

mod common;
use common::{start_mock_backend, start_programmable_backend, unused_addr, MockResponse};

fn pool(upstream_secs: u64) -> Arc<HttpClientPool> {
    let timeouts = TimeoutConfig {
        connect_secs: 1,
        upstream_secs,
        request_secs: 30,
    };
    Arc::new(HttpClientPool::new(&HttpClientConfig::default(), &timeouts).unwrap())
}

fn executor(base_url: &str, auth: UpstreamAuth) -> Arc<HttpExecutor> {
    Arc::new(HttpExecutor::new("mock", base_url, auth, pool(5)).unwrap())
}

fn fast_retries(max_retries: u32) -> RetryPolicy {
    RetryPolicy {
        max_retries,
        base_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(50),
        jitter: false,
    }
}

#[tokio::test]
async fn test_success_decodes_json_and_sends_api_key() {
    let backend = start_programmable_backend(|req, _| {
        assert_eq!(req.path(), "/planetary/apod");
        assert_eq!(req.query_param("api_key").as_deref(), Some("DEMO_KEY"));
        assert_eq!(req.query_param("date").as_deref(), Some("2024-01-01"));
        MockResponse::json(200, json!({"title": "Pillars"}))
    })
    .await;

    let exec = executor(
        &backend.base_url(),
        UpstreamAuth::QueryApiKey {
            param: "api_key".into(),
            key: "DEMO_KEY".into(),
        },
    );
    let response = exec
        .attempt(&UpstreamRequest::get("planetary/apod").query("date", "2024-01-01"))
        .await
        .unwrap();

    assert_eq!(response.body, ResponseBody::Json(json!({"title": "Pillars"})));
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_text_body_is_kept() {
    let backend = start_mock_backend(MockResponse::text(200, "plain words")).await;
    let response = executor(&backend.base_url(), UpstreamAuth::None)
        .attempt(&UpstreamRequest::get(""))
        .await
        .unwrap();
    assert_eq!(response.body, ResponseBody::Text("plain words".into()));
}

#[tokio::test]
async fn test_status_classification() {
    let cases = [
        (401, ErrorKind::Auth),
        (403, ErrorKind::Auth),
        (404, ErrorKind::NotFound),
        (429, ErrorKind::RateLimit),
        (400, ErrorKind::Api),
        (500, ErrorKind::Api),
    ];

    for (status, expected) in cases {
        let backend = start_mock_backend(MockResponse::json(status, json!({"error": "nope"}))).await;
        let err = executor(&backend.base_url(), UpstreamAuth::None)
            .attempt(&UpstreamRequest::get("thing"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), expected, "status {}", status);
        assert!(!err.is_retryable());
    }
}

#[tokio::test]
async fn test_rate_limit_carries_retry_after() {
    let backend = start_mock_backend(MockResponse::json(429, json!({})).header("Retry-After", "7")).await;
    let err = executor(&backend.base_url(), UpstreamAuth::None)
        .attempt(&UpstreamRequest::get("thing"))
        .await
        .unwrap_err();

    match err {
        UpstreamError::RateLimited { retry_after, .. } => assert_eq!(retry_after, Some(Duration::from_secs(7))),
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_api_error_keeps_upstream_body() {
    let backend = start_mock_backend(MockResponse::text(502, "bad gateway upstream")).await;
    let err = executor(&backend.base_url(), UpstreamAuth::None)
        .attempt(&UpstreamRequest::get("thing"))
        .await
        .unwrap_err();

    match err {
        UpstreamError::Api { status, body, .. } => {
            assert_eq!(status, 502);
            assert_eq!(body, Some(json!({"error": "bad gateway upstream"})));
        }
        other => panic!("unexpected {:?}", other),
    }
}

#[tokio::test]
async fn test_malformed_json_is_response_validation() {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();
    let _guard = metrics::set_default_local_recorder(&recorder);

    let backend = start_mock_backend(MockResponse::raw_json(200, "{not json")).await;
    let err = executor(&backend.base_url(), UpstreamAuth::None)
        .attempt(&UpstreamRequest::get("thing"))
        .await
        .unwrap_err();

    match err {
        UpstreamError::Validation { stage, .. } => assert_eq!(stage, ValidationStage::Response),
        other => panic!("unexpected {:?}", other),
    }

    let rendered = handle.render();
    let attempts = rendered
        .lines()
        .find(|line| line.starts_with("gateway_upstream_requests_total{"))
        .unwrap_or_else(|| panic!("no attempt counter in:\n{}", rendered));
    assert!(attempts.contains("outcome=\"validation_error\""), "{}", attempts);
    assert!(attempts.ends_with(" 1"), "{}", attempts);
}

#[tokio::test]
async fn test_connection_refused_is_connection_error() {
    let addr = unused_addr().await;
    let err = executor(&format!("http://{}/", addr), UpstreamAuth::None)
        .attempt(&UpstreamRequest::get("thing"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Connection);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_slow_upstream_is_timeout() {
    let backend =
        start_mock_backend(MockResponse::json(200, json!({})).delayed(Duration::from_secs(2))).await;
    let err = executor(&backend.base_url(), UpstreamAuth::None)
        .attempt(&UpstreamRequest::get("thing").timeout(Duration::from_millis(200)))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Timeout);
    assert_eq!(err.to_string(), "mock timeout: request timed out after 0.2s");
}

#[tokio::test]
async fn test_retry_recovers_from_timeouts() {
    let backend = start_programmable_backend(|_, n| {
        let response = MockResponse::json(200, json!({"attempt": n}));
        if n < 2 {
            response.delayed(Duration::from_secs(2))
        } else {
            response
        }
    })
    .await;

    let client = RetryingClient::new(executor(&backend.base_url(), UpstreamAuth::None), fast_retries(3));
    let request = UpstreamRequest::get("thing").timeout(Duration::from_millis(200));
    let response = client.execute(&request, &CancellationToken::new()).await.unwrap();

    assert_eq!(response.body, ResponseBody::Json(json!({"attempt": 2})));
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn test_server_errors_are_not_retried() {
    let backend = start_mock_backend(MockResponse::json(503, json!({"error": "down"}))).await;
    let client = RetryingClient::new(executor(&backend.base_url(), UpstreamAuth::None), fast_retries(3));

    let err = client
        .execute(&UpstreamRequest::get("thing"), &CancellationToken::new())
        .await
        .unwrap_err();
    assert_eq!(err.upstream_status(), Some(503));
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_circuit_opens_and_stops_traffic() {
    let backend = start_mock_backend(MockResponse::json(500, json!({"error": "boom"}))).await;
    let registry = Arc::new(CircuitBreakerRegistry::new(CircuitSettings {
        failure_threshold: 2,
        open_timeout_secs: 60,
    }));
    let caller = ResilientCaller::new(
        "mock",
        registry.clone(),
        RetryingClient::new(executor(&backend.base_url(), UpstreamAuth::None), fast_retries(0)),
        FailurePolicy::default(),
    );
    let request = UpstreamRequest::get("thing");

    for _ in 0..2 {
        assert_eq!(caller.call(&request).await.unwrap_err().kind(), ErrorKind::Api);
    }
    for _ in 0..3 {
        assert_eq!(caller.call(&request).await.unwrap_err().kind(), ErrorKind::CircuitOpen);
    }

    assert_eq!(backend.hits(), 2);
    let metrics = registry.get("mock").unwrap().metrics();
    assert_eq!(metrics.state, CircuitState::Open);
    assert_eq!(metrics.total_requests, 2);
    assert_eq!(metrics.times_opened, 1);
}

#[tokio::test]
async fn test_client_errors_leave_circuit_closed() {
    let backend = start_mock_backend(MockResponse::json(404, json!({"error": "missing"}))).await;
    let registry = Arc::new(CircuitBreakerRegistry::new(CircuitSettings {
        failure_threshold: 1,
        open_timeout_secs: 60,
    }));
    let caller = ResilientCaller::new(
        "mock",
        registry.clone(),
        RetryingClient::new(executor(&backend.base_url(), UpstreamAuth::None), fast_retries(0)),
        FailurePolicy::default(),
    );

    for _ in 0..3 {
        assert_eq!(
            caller.call(&UpstreamRequest::get("thing")).await.unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
    assert_eq!(backend.hits(), 3);
    assert!(!registry.get("mock").unwrap().is_open());
}
