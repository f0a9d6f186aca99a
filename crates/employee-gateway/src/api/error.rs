//! Mapping of every failure to an HTTP response.
//!
//! Handlers return [`ApiError`]; its `IntoResponse` picks the status and the
//! message and leaves an [`ErrorDetails`] extension on the response.
//! [`render_errors`] then turns that into the JSON body
//! `{status, error, message, path}` once the request path is at hand.

use axum::extract::Request;
use axum::http::header::{CONTENT_LENGTH, RETRY_AFTER};
use axum::http::{HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use employee_gateway_core::UpstreamError;
use serde::Serialize;
use std::any::Any;
use thiserror::Error;

const UPSTREAM_PREFIX: &str = "Error communicating with external service: ";

/// Errors a handler can answer with.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The request itself is malformed or invalid.
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("An unexpected error occurred.")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Upstream(err) => match err {
                UpstreamError::InvalidInput { .. } => StatusCode::BAD_REQUEST,
                UpstreamError::NotFound { .. } => StatusCode::NOT_FOUND,
                UpstreamError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
                UpstreamError::UpstreamClient { .. }
                | UpstreamError::UpstreamServer { .. }
                | UpstreamError::CircuitOpen { .. } => StatusCode::BAD_GATEWAY,
                UpstreamError::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            },
        }
    }

    /// The `message` of the JSON error body.
    pub fn message(&self) -> String {
        match self {
            ApiError::Upstream(UpstreamError::InvalidInput { message }) => message.clone(),
            ApiError::Upstream(
                err @ (UpstreamError::UpstreamClient { .. }
                | UpstreamError::UpstreamServer { .. }
                | UpstreamError::CircuitOpen { .. }),
            ) => format!("{UPSTREAM_PREFIX}{err}"),
            other => other.to_string(),
        }
    }

    fn retry_after(&self) -> Option<u64> {
        match self {
            ApiError::Upstream(UpstreamError::RateLimited { retry_after }) => *retry_after,
            _ => None,
        }
    }
}

/// Error message waiting for [`render_errors`] to add the path.
#[derive(Debug, Clone)]
pub(crate) struct ErrorDetails {
    message: String,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    status: u16,
    error: &'static str,
    message: String,
    path: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = self.message();

        match &self {
            ApiError::Internal => tracing::error!(%status, "{message}"),
            ApiError::Upstream(err) if status.is_server_error() => {
                tracing::error!(%status, kind = err.kind(), "{message}")
            }
            ApiError::Upstream(err) => tracing::warn!(%status, kind = err.kind(), "{message}"),
            _ => tracing::warn!(%status, "{message}"),
        }

        let mut response = status.into_response();
        if let Some(seconds) = self.retry_after() {
            response
                .headers_mut()
                .insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response.extensions_mut().insert(ErrorDetails { message });
        response
    }
}

/// Middleware writing the JSON body of every error response.
pub(crate) async fn render_errors(request: Request, next: Next) -> Response {
    let path = request.uri().path().to_string();
    let mut response = next.run(request).await;

    let Some(details) = response.extensions_mut().remove::<ErrorDetails>() else {
        return response;
    };

    let status = response.status();
    let body = ErrorBody {
        status: status.as_u16(),
        error: status.canonical_reason().unwrap_or("Unknown Status"),
        message: details.message,
        path,
    };

    let (mut parts, _) = response.into_parts();
    parts.headers.remove(CONTENT_LENGTH);
    (parts, Json(body)).into_response()
}

/// Response for a panicking handler; the payload is only logged.
pub(crate) fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "non-string panic payload"
    };
    tracing::error!(panic = detail, "handler panicked");
    ApiError::Internal.into_response()
}
