//! Collection cache behaviour observed from the upstream's side.

use super::common::*;
use axum::http::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn concurrent_misses_share_one_fetch() {
    let h = harness().await;
    Mock::given(method("GET"))
        .and(path(COLLECTION))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": trio() }))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&h.upstream)
        .await;

    let readers = (0..20).map(|_| {
        let service = h.service.clone();
        tokio::spawn(async move { service.all_employees().await })
    });
    let snapshots: Vec<_> = futures::future::join_all(readers)
        .await
        .into_iter()
        .map(|reader| reader.unwrap().unwrap())
        .collect();

    assert!(snapshots.iter().all(|s| Arc::ptr_eq(s, &snapshots[0])));
    assert_eq!(snapshots[0].len(), 3);
    assert_eq!(received(&h.upstream, "GET").await, 1);
}

#[tokio::test]
async fn every_read_endpoint_shares_the_cache() {
    let h = harness().await;
    seed(&h.upstream, trio()).await;

    for uri in [
        "/api/v1",
        "/api/v1/search/jane",
        "/api/v1/1",
        "/api/v1/highestSalary",
        "/api/v1/topTenHighestEarningEmployeeNames",
    ] {
        assert_eq!(get(&h.app, uri).await.status, StatusCode::OK, "{uri}");
    }

    assert_eq!(received(&h.upstream, "GET").await, 1);
    let stats = h.service.cache().stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 4);
}

#[tokio::test]
async fn failed_fill_is_not_cached() {
    let h = harness_with(employee_gateway::ResilienceSettings {
        max_attempts: 1,
        ..quick_settings()
    })
    .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&h.upstream)
        .await;
    seed(&h.upstream, trio()).await;

    assert_eq!(get(&h.app, "/api/v1").await.status, StatusCode::BAD_GATEWAY);
    assert!(!h.service.cache().is_populated());

    let reply = get(&h.app, "/api/v1").await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(names(&reply.body).len(), 3);
    assert_eq!(received(&h.upstream, "GET").await, 2);
}

#[tokio::test]
async fn failed_create_keeps_the_cache() {
    let h = harness().await;
    seed(&h.upstream, trio()).await;
    Mock::given(method("POST"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({ "message": "duplicate name" })),
        )
        .expect(1)
        .mount(&h.upstream)
        .await;

    get(&h.app, "/api/v1").await;
    let reply = call(
        &h.app,
        "POST",
        "/api/v1",
        Some(json!({"name": "John Doe", "salary": 1, "age": 30, "title": "T"})),
    )
    .await;

    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert!(h.service.cache().is_populated());
    get(&h.app, "/api/v1").await;
    assert_eq!(received(&h.upstream, "GET").await, 1);
}
