//! The closed error taxonomy of the upstream adapter.
//!
//! Every failure the upstream client, the resilience policies, or the cache
//! can produce is one of the [`UpstreamError`] variants. Nothing below the
//! HTTP facade knows about status codes of the *facade*; mapping to the
//! outward response happens exactly once, at the edge.
//!
//! Two classifications drive the resilience policies:
//!
//! - [`UpstreamError::is_transient`] decides whether the retry policy may try
//!   again (5xx, 429, transport failures).
//! - [`UpstreamError::trips_breaker`] decides whether a result counts toward
//!   the circuit breaker's failure window. Rejections that describe the
//!   caller's request (`InvalidInput`, `NotFound`) never do.
//!
//! ```
//! use employee_gateway_core::UpstreamError;
//!
//! let err = UpstreamError::UpstreamServer { status: 503 };
//! assert!(err.is_transient());
//! assert!(err.trips_breaker());
//!
//! let err = UpstreamError::NotFound { resource: "employees".into() };
//! assert!(!err.is_transient());
//! assert!(!err.trips_breaker());
//! ```

use thiserror::Error;

/// Errors produced by the upstream adapter layer.
///
/// The type is `Clone` so a single failed fill can be fanned out to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UpstreamError {
    /// The upstream rejected the request as malformed (HTTP 400).
    #[error("upstream rejected the request: {message}")]
    InvalidInput {
        /// Message reported by the upstream.
        message: String,
    },

    /// The upstream does not know the addressed resource (HTTP 404).
    #[error("{resource} not found")]
    NotFound {
        /// Tag of the missing resource.
        resource: String,
    },

    /// The upstream throttled the call (HTTP 429).
    #[error("{}", rate_limited_message(.retry_after))]
    RateLimited {
        /// Seconds to wait, from the upstream's `Retry-After` header.
        retry_after: Option<u64>,
    },

    /// Any other 4xx, or a 2xx whose envelope carried no payload.
    #[error("upstream client error (HTTP {status}): {message}")]
    UpstreamClient {
        /// HTTP status returned by the upstream.
        status: u16,
        /// What went wrong.
        message: String,
    },

    /// The upstream failed (HTTP 5xx).
    #[error("upstream server error (HTTP {status})")]
    UpstreamServer {
        /// HTTP status returned by the upstream.
        status: u16,
    },

    /// The upstream could not be reached or its answer could not be decoded.
    #[error("upstream unavailable: {cause}")]
    UpstreamUnavailable {
        /// Transport, timeout, or decode failure.
        cause: String,
    },

    /// The circuit breaker is open and the call was not attempted.
    #[error("circuit breaker '{name}' is open; call not permitted")]
    CircuitOpen {
        /// Name of the breaker that rejected the call.
        name: String,
    },
}

fn rate_limited_message(retry_after: &Option<u64>) -> String {
    match retry_after {
        Some(secs) => format!("upstream rate limit exceeded, retry after {secs}s"),
        None => "upstream rate limit exceeded".to_string(),
    }
}

impl UpstreamError {
    /// Creates an `UpstreamUnavailable` error from any displayable cause.
    pub fn unavailable(cause: impl std::fmt::Display) -> Self {
        UpstreamError::UpstreamUnavailable {
            cause: cause.to_string(),
        }
    }

    /// Returns `true` if the error is eligible for retry.
    ///
    /// `CircuitOpen` is transient for the caller but the retry policy never
    /// sees it: the breaker sits outside the retry loop.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            UpstreamError::UpstreamServer { .. }
                | UpstreamError::UpstreamUnavailable { .. }
                | UpstreamError::RateLimited { .. }
        )
    }

    /// Returns `true` if the error counts toward the circuit breaker's
    /// failure window.
    pub fn trips_breaker(&self) -> bool {
        !matches!(
            self,
            UpstreamError::InvalidInput { .. } | UpstreamError::NotFound { .. }
        )
    }

    /// Short, stable name of the variant, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            UpstreamError::InvalidInput { .. } => "InvalidInput",
            UpstreamError::NotFound { .. } => "NotFound",
            UpstreamError::RateLimited { .. } => "RateLimited",
            UpstreamError::UpstreamClient { .. } => "UpstreamClient",
            UpstreamError::UpstreamServer { .. } => "UpstreamServer",
            UpstreamError::UpstreamUnavailable { .. } => "UpstreamUnavailable",
            UpstreamError::CircuitOpen { .. } => "CircuitOpen",
        }
    }

    /// The upstream HTTP status behind this error, when there was one.
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            UpstreamError::InvalidInput { .. } => Some(400),
            UpstreamError::NotFound { .. } => Some(404),
            UpstreamError::RateLimited { .. } => Some(429),
            UpstreamError::UpstreamClient { status, .. }
            | UpstreamError::UpstreamServer { status } => Some(*status),
            UpstreamError::UpstreamUnavailable { .. } | UpstreamError::CircuitOpen { .. } => None,
        }
    }

    /// Returns `true` if this is a circuit breaker rejection.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, UpstreamError::CircuitOpen { .. })
    }

    /// Returns `true` if this is a rate limit error.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, UpstreamError::RateLimited { .. })
    }
}
