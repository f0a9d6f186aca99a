//! Retry scope, breaker contract and deadlines through the whole stack.

use super::common::*;
use axum::http::StatusCode;
use employee_gateway::ResilienceSettings;
use serde_json::json;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn server_errors_are_retried_then_surface_as_502() {
    let h = harness().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&h.upstream)
        .await;

    let reply = get(&h.app, "/api/v1").await;
    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        reply.body["message"],
        "Error communicating with external service: upstream server error (HTTP 503)"
    );
    assert_eq!(received(&h.upstream, "GET").await, 3);
}

#[tokio::test]
async fn transient_failure_recovers_within_the_budget() {
    let h = harness().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&h.upstream)
        .await;
    seed(&h.upstream, trio()).await;

    let reply = get(&h.app, "/api/v1/highestSalary").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!(75000));
    assert_eq!(received(&h.upstream, "GET").await, 3);
}

#[tokio::test]
async fn rejected_create_is_not_retried() {
    let h = harness().await;
    Mock::given(method("POST"))
        .and(path(COLLECTION))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "error": "salary out of range" })),
        )
        .mount(&h.upstream)
        .await;

    let reply = call(
        &h.app,
        "POST",
        "/api/v1",
        Some(json!({"name": "N", "salary": 1, "age": 30, "title": "T"})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "salary out of range");
    assert_eq!(received(&h.upstream, "POST").await, 1);
}

#[tokio::test]
async fn upstream_not_found_on_delete_is_404() {
    let h = harness().await;
    seed(&h.upstream, vec![record("x", "Alice", 10)]).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.upstream)
        .await;

    let reply = call(&h.app, "DELETE", "/api/v1/x", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["message"], "employee 'Alice' not found");
    assert_eq!(received(&h.upstream, "DELETE").await, 1);
}

#[tokio::test]
async fn open_breaker_short_circuits_and_fails_readiness() {
    let h = harness_with(ResilienceSettings {
        max_attempts: 1,
        window_size: 4,
        minimum_calls: 4,
        open_wait: Duration::from_secs(60),
        ..quick_settings()
    })
    .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&h.upstream)
        .await;

    for _ in 0..4 {
        assert_eq!(get(&h.app, "/api/v1").await.status, StatusCode::BAD_GATEWAY);
    }
    assert_eq!(received(&h.upstream, "GET").await, 4);

    let reply = get(&h.app, "/api/v1/highestSalary").await;
    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert_eq!(received(&h.upstream, "GET").await, 4);

    let reply = get(&h.app, "/health/ready").await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(reply.body["circuit_state"], "Open");
}

#[tokio::test]
async fn client_rejections_do_not_open_the_breaker() {
    let h = harness_with(ResilienceSettings {
        window_size: 2,
        minimum_calls: 2,
        ..quick_settings()
    })
    .await;
    seed(&h.upstream, vec![record("x", "Alice", 10)]).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&h.upstream)
        .await;

    for _ in 0..4 {
        let reply = call(&h.app, "DELETE", "/api/v1/x", None).await;
        assert_eq!(reply.status, StatusCode::NOT_FOUND);
    }

    assert_eq!(received(&h.upstream, "DELETE").await, 4);
    assert_eq!(get(&h.app, "/health/ready").await.status, StatusCode::OK);
}

#[tokio::test]
async fn slow_upstream_hits_the_deadline() {
    let h = harness_with(ResilienceSettings {
        deadline: Duration::from_millis(100),
        ..quick_settings()
    })
    .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": trio() }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&h.upstream)
        .await;

    let reply = get(&h.app, "/api/v1").await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(reply.body["message"]
        .as_str()
        .unwrap()
        .contains("deadline of 100 ms exceeded"));
}

#[tokio::test]
async fn repeated_deadline_expiries_open_the_breaker() {
    let h = harness_with(ResilienceSettings {
        deadline: Duration::from_millis(100),
        max_attempts: 1,
        window_size: 2,
        minimum_calls: 2,
        open_wait: Duration::from_secs(60),
        ..quick_settings()
    })
    .await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": trio() }))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&h.upstream)
        .await;

    for _ in 0..2 {
        let reply = get(&h.app, "/api/v1").await;
        assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    }
    assert_eq!(received(&h.upstream, "GET").await, 2);

    let reply = get(&h.app, "/api/v1/highestSalary").await;
    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        reply.body["message"],
        "Error communicating with external service: circuit breaker 'employeeAPI' is open; call not permitted"
    );
    assert_eq!(received(&h.upstream, "GET").await, 2);

    let reply = get(&h.app, "/health/ready").await;
    assert_eq!(reply.status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(
        reply.body,
        json!({ "status": "unhealthy", "circuit_state": "Open" })
    );
}
