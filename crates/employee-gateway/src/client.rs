//! The upstream employee service, spoken to over HTTP.
//!
//! [`UpstreamClient`] is a plain Tower [`Service`] with no policy of its own:
//! one request, one HTTP round-trip, one typed result. Retries and the
//! circuit breaker are layered on top in [`upstream`](crate::upstream).
//!
//! Every non-2xx answer is mapped into [`UpstreamError`] here and nowhere
//! else:
//!
//! | Upstream status | Error |
//! |---|---|
//! | 400 | `InvalidInput` with the upstream's message |
//! | 404 | `NotFound` with a resource tag |
//! | 429 | `RateLimited` with `Retry-After` seconds when sent |
//! | other 4xx | `UpstreamClient` |
//! | 5xx | `UpstreamServer` |
//! | transport or decode failure | `UpstreamUnavailable` |

use crate::model::{CreateEmployeeRequest, DeleteEmployeeRequest, Employee, Envelope};
use employee_gateway_core::UpstreamError;
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, ACCEPT, RETRY_AFTER};
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use std::task::{Context, Poll};
use std::time::Duration;
use thiserror::Error;
use tower::Service;

/// One call against the upstream collection URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamRequest {
    /// `GET` the whole collection.
    ListAll,
    /// `POST` a new employee.
    Create(CreateEmployeeRequest),
    /// `DELETE` with body `{"name": ...}`.
    DeleteByName(String),
}

impl UpstreamRequest {
    /// Operation name used in logs.
    pub fn operation(&self) -> &'static str {
        match self {
            UpstreamRequest::ListAll => "list_all",
            UpstreamRequest::Create(_) => "create",
            UpstreamRequest::DeleteByName(_) => "delete_by_name",
        }
    }

    fn resource(&self) -> String {
        match self {
            UpstreamRequest::ListAll | UpstreamRequest::Create(_) => "employees".to_string(),
            UpstreamRequest::DeleteByName(name) => format!("employee '{name}'"),
        }
    }
}

/// Decoded `data` of a successful upstream answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpstreamResponse {
    Employees(Vec<Employee>),
    Created(Employee),
    /// Whether the upstream confirmed the deletion.
    Deleted(bool),
}

/// The client could not be constructed.
#[derive(Debug, Error)]
pub enum ClientBuildError {
    #[error("invalid upstream base url '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    #[error("failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}

/// HTTP client for the upstream employee collection.
///
/// Cloning shares the connection pool.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    http: reqwest::Client,
    base_url: Url,
}

impl UpstreamClient {
    /// Creates a client for `base_url` with a per-attempt `timeout`.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, ClientBuildError> {
        let parsed = Url::parse(base_url).map_err(|e| ClientBuildError::InvalidBaseUrl {
            url: base_url.to_string(),
            reason: e.to_string(),
        })?;

        let http = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("employee-gateway/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: parsed,
        })
    }

    /// The collection URL every request is sent to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }
}

impl Service<UpstreamRequest> for UpstreamClient {
    type Response = UpstreamResponse;
    type Error = UpstreamError;
    type Future = BoxFuture<'static, Result<UpstreamResponse, UpstreamError>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, request: UpstreamRequest) -> Self::Future {
        let http = self.http.clone();
        let url = self.base_url.clone();

        Box::pin(async move {
            let operation = request.operation();
            let result = send(&http, url, &request).await;
            match &result {
                Ok(_) => tracing::debug!(operation, "upstream call succeeded"),
                Err(error) => log_failure(operation, error),
            }
            result
        })
    }
}

async fn send(
    http: &reqwest::Client,
    url: Url,
    request: &UpstreamRequest,
) -> Result<UpstreamResponse, UpstreamError> {
    let builder = match request {
        UpstreamRequest::ListAll => http.get(url),
        UpstreamRequest::Create(body) => http.post(url).json(body),
        UpstreamRequest::DeleteByName(name) => http.delete(url).json(&DeleteEmployeeRequest { name }),
    };

    let response = builder
        .header(ACCEPT, "application/json")
        .send()
        .await
        .map_err(transport_error)?;

    let status = response.status();
    if !status.is_success() {
        let retry_after = retry_after(response.headers());
        // Only feeds the message.
        let body = response.text().await.unwrap_or_default();
        return Err(map_status(status, retry_after, &body, request));
    }

    match request {
        UpstreamRequest::ListAll => decode(response, status).await.map(UpstreamResponse::Employees),
        UpstreamRequest::Create(_) => decode(response, status).await.map(UpstreamResponse::Created),
        UpstreamRequest::DeleteByName(_) => {
            decode(response, status).await.map(UpstreamResponse::Deleted)
        }
    }
}

async fn decode<T: DeserializeOwned>(
    response: reqwest::Response,
    status: StatusCode,
) -> Result<T, UpstreamError> {
    let bytes = response.bytes().await.map_err(transport_error)?;
    let envelope: Envelope<T> = serde_json::from_slice(&bytes).map_err(|e| {
        UpstreamError::unavailable(format!("failed to decode upstream response: {e}"))
    })?;

    envelope.data.ok_or_else(|| UpstreamError::UpstreamClient {
        status: status.as_u16(),
        message: "empty payload".to_string(),
    })
}

fn transport_error(error: reqwest::Error) -> UpstreamError {
    if error.is_timeout() {
        UpstreamError::unavailable(format!("upstream request timed out: {error}"))
    } else {
        UpstreamError::unavailable(error)
    }
}

/// Maps a non-2xx upstream status to the error taxonomy.
pub(crate) fn map_status(
    status: StatusCode,
    retry_after: Option<u64>,
    body: &str,
    request: &UpstreamRequest,
) -> UpstreamError {
    match status.as_u16() {
        400 => UpstreamError::InvalidInput {
            message: upstream_message(body)
                .unwrap_or_else(|| "upstream rejected the request".to_string()),
        },
        404 => UpstreamError::NotFound {
            resource: request.resource(),
        },
        429 => UpstreamError::RateLimited { retry_after },
        code @ 400..=499 => UpstreamError::UpstreamClient {
            status: code,
            message: upstream_message(body)
                .or_else(|| status.canonical_reason().map(str::to_string))
                .unwrap_or_else(|| "client error".to_string()),
        },
        code @ 500..=599 => UpstreamError::UpstreamServer { status: code },
        code => UpstreamError::UpstreamClient {
            status: code,
            message: "unexpected upstream status".to_string(),
        },
    }
}

/// The `error` or `message` field of a JSON body, else the trimmed text.
fn upstream_message(body: &str) -> Option<String> {
    if let Ok(serde_json::Value::Object(map)) = serde_json::from_str::<serde_json::Value>(body) {
        let field = ["error", "message"]
            .iter()
            .find_map(|key| map.get(*key).and_then(|v| v.as_str()));
        if let Some(message) = field {
            return Some(message.to_string());
        }
    }
    let trimmed = body.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

// Only the delta-seconds form is honoured.
fn retry_after(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

fn log_failure(operation: &'static str, error: &UpstreamError) {
    let kind = error.kind();
    match error.upstream_status() {
        Some(status) if status < 500 => {
            tracing::warn!(operation, kind, status, "upstream call failed: {error}")
        }
        Some(status) => tracing::error!(operation, kind, status, "upstream call failed: {error}"),
        None => tracing::error!(operation, kind, "upstream call failed: {error}"),
    }
}
