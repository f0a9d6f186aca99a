//! End-to-end request flows against a mocked upstream.

use super::common::*;
use axum::http::StatusCode;
use serde_json::json;
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn list_then_search_is_case_insensitive() {
    let h = harness().await;
    seed(&h.upstream, trio()).await;

    let reply = get(&h.app, "/api/v1").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(names(&reply.body).len(), 3);

    let reply = get(&h.app, "/api/v1/search/john").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(names(&reply.body), vec!["John Doe", "Bob Johnson"]);
    assert_eq!(received(&h.upstream, "GET").await, 1);
}

#[tokio::test]
async fn blank_search_is_rejected() {
    let h = harness().await;
    seed(&h.upstream, trio()).await;

    let reply = get(&h.app, "/api/v1/search/%20%20").await;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.body["message"], "Search string cannot be blank");
    assert_eq!(received(&h.upstream, "GET").await, 0);
}

#[tokio::test]
async fn highest_salary() {
    let h = harness().await;
    seed(&h.upstream, trio()).await;

    let reply = get(&h.app, "/api/v1/highestSalary").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!(75000));
}

#[tokio::test]
async fn highest_salary_of_nobody_is_not_found() {
    let h = harness().await;
    seed(&h.upstream, Vec::new()).await;

    let reply = get(&h.app, "/api/v1/highestSalary").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn top_ten_with_fewer_employees() {
    let h = harness().await;
    seed(&h.upstream, trio()).await;

    let reply = get(&h.app, "/api/v1/topTenHighestEarningEmployeeNames").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!(["Jane Smith", "Bob Johnson", "John Doe"]));
}

#[tokio::test]
async fn top_ten_with_more_than_ten() {
    let h = harness().await;
    let employees = (0..15)
        .map(|i| record(&i.to_string(), &format!("Employee {i}"), 30_000 + i * 5_000))
        .collect();
    seed(&h.upstream, employees).await;

    let reply = get(&h.app, "/api/v1/topTenHighestEarningEmployeeNames").await;
    let top = reply.body.as_array().unwrap();
    assert_eq!(top.len(), 10);
    assert_eq!(top[0], "Employee 14");
}

#[tokio::test]
async fn get_by_id() {
    let h = harness().await;
    seed(&h.upstream, trio()).await;

    let reply = get(&h.app, "/api/v1/2").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["employee_name"], "Jane Smith");
    assert_eq!(reply.body["employee_email"], "jane.smith@company.com");

    let reply = get(&h.app, "/api/v1/99").await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["path"], "/api/v1/99");
}

#[tokio::test]
async fn create_invalidates_the_cached_list() {
    let h = harness().await;
    seed(&h.upstream, trio()).await;
    Mock::given(method("POST"))
        .and(path(COLLECTION))
        .and(body_json(json!({"name": "N", "salary": 1, "age": 16, "title": "T"})))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": record("4", "N", 1) })),
        )
        .expect(1)
        .mount(&h.upstream)
        .await;

    get(&h.app, "/api/v1").await;
    assert_eq!(received(&h.upstream, "GET").await, 1);

    let reply = call(
        &h.app,
        "POST",
        "/api/v1",
        Some(json!({"name": "N", "salary": 1, "age": 16, "title": "T"})),
    )
    .await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["id"], "4");
    assert!(!h.service.cache().is_populated());

    get(&h.app, "/api/v1").await;
    assert_eq!(received(&h.upstream, "GET").await, 2);
}

#[tokio::test]
async fn delete_by_id_resolves_name_first() {
    let h = harness().await;
    // The collection holds Alice until she is deleted.
    Mock::given(method("GET"))
        .and(path(COLLECTION))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "data": [record("x", "Alice", 10)] })),
        )
        .up_to_n_times(1)
        .mount(&h.upstream)
        .await;
    seed(&h.upstream, Vec::new()).await;
    Mock::given(method("DELETE"))
        .and(path(COLLECTION))
        .and(body_json(json!({ "name": "Alice" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": true })))
        .expect(1)
        .mount(&h.upstream)
        .await;

    let reply = call(&h.app, "DELETE", "/api/v1/x", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body, json!("Alice"));

    let reply = call(&h.app, "DELETE", "/api/v1/x", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(received(&h.upstream, "DELETE").await, 1);
    assert_eq!(received(&h.upstream, "GET").await, 2);
}

#[tokio::test]
async fn declined_delete_is_not_found() {
    let h = harness().await;
    seed(&h.upstream, vec![record("x", "Alice", 10)]).await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "data": false })))
        .mount(&h.upstream)
        .await;

    let reply = call(&h.app, "DELETE", "/api/v1/x", None).await;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    assert_eq!(reply.body["message"], "employee 'x' was not deleted");
    assert!(h.service.cache().is_populated());
}

#[tokio::test]
async fn invalid_create_is_rejected_locally() {
    let h = harness().await;

    let reply = call(
        &h.app,
        "POST",
        "/api/v1",
        Some(json!({"name": "", "salary": 0, "age": 10, "title": ""})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        reply.body["message"],
        "name: Name is required and cannot be blank; \
         salary: Salary must be greater than zero; \
         age: Age must be at least 16; \
         title: Title is required and cannot be blank"
    );
    assert!(h.upstream.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn persistent_rate_limit_is_bad_gateway() {
    let h = harness().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .mount(&h.upstream)
        .await;

    let reply = get(&h.app, "/api/v1").await;
    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert!(reply.body["message"]
        .as_str()
        .unwrap()
        .contains("rate limit persisted after 3 attempts"));
    assert_eq!(received(&h.upstream, "GET").await, 3);
}

#[tokio::test]
async fn rate_limit_opens_the_breaker() {
    let h = harness_with(employee_gateway::ResilienceSettings {
        window_size: 2,
        minimum_calls: 2,
        ..quick_settings()
    })
    .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .mount(&h.upstream)
        .await;

    for _ in 0..2 {
        assert_eq!(get(&h.app, "/api/v1").await.status, StatusCode::BAD_GATEWAY);
    }

    let reply = get(&h.app, "/api/v1").await;
    assert_eq!(reply.status, StatusCode::BAD_GATEWAY);
    assert_eq!(
        reply.body["message"],
        "Error communicating with external service: \
         circuit breaker 'employeeAPI' is open; call not permitted"
    );
    assert_eq!(received(&h.upstream, "GET").await, 6);
}

#[tokio::test]
async fn unretried_rate_limit_passes_retry_after_through() {
    let h = harness_with(employee_gateway::ResilienceSettings {
        max_attempts: 1,
        ..quick_settings()
    })
    .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "5"))
        .mount(&h.upstream)
        .await;

    let reply = get(&h.app, "/api/v1").await;
    assert_eq!(reply.status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(reply.headers["retry-after"], "5");
    assert_eq!(reply.body["error"], "Too Many Requests");
}
