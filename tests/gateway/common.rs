//! Shared harness: a wiremock upstream and the facade router in front of it.

use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use employee_gateway::{api, EmployeeService, ResilienceSettings, ResilientUpstream, UpstreamClient};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::time::Duration;
use tower::ServiceExt;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const COLLECTION: &str = "/api/v1/employee";

pub struct Harness {
    pub upstream: MockServer,
    pub service: EmployeeService,
    pub app: Router,
}

/// Fast retries so failing scenarios finish quickly.
pub fn quick_settings() -> ResilienceSettings {
    ResilienceSettings {
        base_delay: Duration::from_millis(1),
        ..ResilienceSettings::default()
    }
}

pub async fn harness() -> Harness {
    harness_with(quick_settings()).await
}

pub async fn harness_with(settings: ResilienceSettings) -> Harness {
    let upstream = MockServer::start().await;
    let client = UpstreamClient::new(
        &format!("{}{COLLECTION}", upstream.uri()),
        Duration::from_secs(2),
    )
    .unwrap();
    let service = EmployeeService::new(ResilientUpstream::new(client, &settings));
    let app = api::router(service.clone());
    Harness {
        upstream,
        service,
        app,
    }
}

pub fn record(id: &str, name: &str, salary: i64) -> Value {
    json!({
        "id": id,
        "employee_name": name,
        "employee_salary": salary,
        "employee_age": 35,
        "employee_title": "Engineer",
        "employee_email": format!("{}@company.com", name.to_lowercase().replace(' ', "."))
    })
}

/// The three-employee seed used by the list/search/aggregate scenarios.
pub fn trio() -> Vec<Value> {
    vec![
        record("1", "John Doe", 50_000),
        record("2", "Jane Smith", 75_000),
        record("3", "Bob Johnson", 60_000),
    ]
}

/// Answers every collection GET with `employees`.
pub async fn seed(server: &MockServer, employees: Vec<Value>) {
    Mock::given(method("GET"))
        .and(path(COLLECTION))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "data": employees, "status": "Successfully processed request." })),
        )
        .mount(server)
        .await;
}

/// Number of upstream requests received with the given HTTP method.
pub async fn received(server: &MockServer, verb: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|r| r.method.as_str() == verb)
        .count()
}

pub struct Reply {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

pub async fn call(app: &Router, verb: &str, uri: &str, body: Option<Value>) -> Reply {
    let mut builder = Request::builder().method(verb).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };

    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };

    Reply {
        status,
        headers,
        body,
    }
}

pub async fn get(app: &Router, uri: &str) -> Reply {
    call(app, "GET", uri, None).await
}

pub fn names(body: &Value) -> Vec<String> {
    body.as_array()
        .unwrap()
        .iter()
        .map(|e| e["employee_name"].as_str().unwrap().to_string())
        .collect()
}
