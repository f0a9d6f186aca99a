use employee_gateway_core::UpstreamError;
use thiserror::Error;

/// Errors returned by the `CircuitBreaker` service.
#[derive(Debug, Clone, Error)]
pub enum CircuitBreakerError<E> {
    /// The circuit is open; calls are not permitted.
    #[error("circuit '{name}' is open; call not permitted")]
    OpenCircuit {
        /// Name of the rejecting breaker.
        name: String,
    },

    /// An error returned by the inner service.
    #[error("inner service error: {0}")]
    Inner(E),
}

impl<E> CircuitBreakerError<E> {
    /// Returns true if the error indicates the circuit is open.
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CircuitBreakerError::OpenCircuit { .. })
    }

    /// Returns the inner error if present.
    pub fn into_inner(self) -> Option<E> {
        match self {
            CircuitBreakerError::Inner(e) => Some(e),
            _ => None,
        }
    }
}

impl From<CircuitBreakerError<UpstreamError>> for UpstreamError {
    fn from(err: CircuitBreakerError<UpstreamError>) -> Self {
        match err {
            CircuitBreakerError::OpenCircuit { name } => UpstreamError::CircuitOpen { name },
            CircuitBreakerError::Inner(e) => e,
        }
    }
}
