//! Circuit breaker for the upstream employee service.
//!
//! A circuit breaker prevents cascading failures by monitoring calls and
//! rejecting them outright while the failure rate of a sliding window is at
//! or above a threshold.
//!
//! ## States
//! - **Closed**: normal operation, every call passes through and its outcome
//!   is recorded in the window
//! - **Open**: calls are rejected with [`CircuitBreakerError::OpenCircuit`]
//!   until the open wait elapses
//! - **Half-Open**: a fixed number of probe calls are admitted; all of them
//!   must succeed to close the circuit, any failure re-opens it
//!
//! ## Usage
//!
//! ```rust
//! use employee_gateway_circuitbreaker::CircuitBreakerLayer;
//! use employee_gateway_core::UpstreamError;
//! use std::time::Duration;
//! use tower::{ServiceBuilder, service_fn};
//!
//! # async fn example() {
//! let breaker = CircuitBreakerLayer::<String, UpstreamError>::builder()
//!     .name("employeeAPI")
//!     .failure_rate_threshold(0.5)
//!     .sliding_window_size(10)
//!     .minimum_number_of_calls(5)
//!     .wait_duration_in_open(Duration::from_secs(10))
//!     .permitted_calls_in_half_open(3)
//!     .failure_classifier(|result: &Result<String, UpstreamError>| {
//!         matches!(result, Err(e) if e.trips_breaker())
//!     })
//!     .build();
//!
//! let service = ServiceBuilder::new()
//!     .layer(breaker)
//!     .service(service_fn(|req: String| async move { Ok::<_, UpstreamError>(req) }));
//! # }
//! ```
//!
//! ## Feature Flags
//! - `metrics`: counters and a state gauge via the `metrics` crate
//! - `tracing`: transition and rejection logging via `tracing`
//! - `serde`: `Serialize` for [`CircuitState`] and [`CircuitMetrics`]

use crate::circuit::{Admission, Circuit};
use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use tower::Service;

pub use circuit::{CircuitMetrics, CircuitState};
pub use config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder, SlidingWindowType};
pub use error::CircuitBreakerError;
pub use events::CircuitBreakerEvent;
pub use layer::CircuitBreakerLayer;

mod circuit;
mod config;
mod error;
mod events;
mod layer;

/// Circuit state shared by every service a layer produces.
#[derive(Clone)]
pub(crate) struct SharedCircuit {
    circuit: Arc<Mutex<Circuit>>,
    state: Arc<AtomicU8>,
}

impl SharedCircuit {
    pub(crate) fn new() -> Self {
        let state = Arc::new(AtomicU8::new(CircuitState::Closed as u8));
        Self {
            circuit: Arc::new(Mutex::new(Circuit::new(Arc::clone(&state)))),
            state,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Circuit> {
        self.circuit.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Returns the admitted probe slot if the call is dropped before completion.
struct AdmissionGuard {
    shared: SharedCircuit,
    admission: Option<Admission>,
}

impl AdmissionGuard {
    fn complete(mut self) -> Option<Admission> {
        self.admission.take()
    }
}

impl Drop for AdmissionGuard {
    fn drop(&mut self) {
        if let Some(admission) = self.admission.take() {
            self.shared.lock().release(admission);
        }
    }
}

/// A Tower Service that applies circuit breaker logic to an inner service.
pub struct CircuitBreaker<S, Res, Err> {
    inner: S,
    shared: SharedCircuit,
    config: Arc<CircuitBreakerConfig<Res, Err>>,
}

impl<S, Res, Err> CircuitBreaker<S, Res, Err> {
    pub(crate) fn new(
        inner: S,
        config: Arc<CircuitBreakerConfig<Res, Err>>,
        shared: SharedCircuit,
    ) -> Self {
        Self {
            inner,
            shared,
            config,
        }
    }

    /// The breaker's configured name.
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Forces the circuit into the open state.
    pub fn force_open(&self) {
        self.shared.lock().force_open(&self.config);
    }

    /// Forces the circuit into the closed state.
    pub fn force_closed(&self) {
        self.shared.lock().force_closed(&self.config);
    }

    /// Resets the circuit to the closed state and clears the window.
    pub fn reset(&self) {
        self.shared.lock().reset(&self.config);
    }

    /// Returns the current state of the circuit, taking the lock.
    pub fn state(&self) -> CircuitState {
        self.shared.lock().state()
    }

    /// Returns the current state without taking the lock.
    pub fn state_sync(&self) -> CircuitState {
        CircuitState::from_u8(self.shared.state.load(Ordering::Acquire))
    }

    /// Returns whether the circuit is currently open.
    pub fn is_open(&self) -> bool {
        self.state_sync() == CircuitState::Open
    }

    /// Returns a snapshot of the current circuit breaker metrics.
    pub fn metrics(&self) -> CircuitMetrics {
        self.shared.lock().metrics(&self.config)
    }

    /// HTTP status for a readiness check; see [`CircuitHandle::http_status`].
    pub fn http_status(&self) -> u16 {
        self.handle().http_status()
    }

    /// Readiness label; see [`CircuitHandle::health_status`].
    pub fn health_status(&self) -> &'static str {
        self.handle().health_status()
    }

    /// A cheap handle for health checks that does not own the inner service.
    pub fn handle(&self) -> CircuitHandle {
        CircuitHandle {
            state: Arc::clone(&self.shared.state),
        }
    }
}

/// Read-only view of a breaker's state.
#[derive(Clone, Debug)]
pub struct CircuitHandle {
    state: Arc<AtomicU8>,
}

impl CircuitHandle {
    /// Returns the current state without taking the lock.
    pub fn state(&self) -> CircuitState {
        CircuitState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Returns an HTTP status code based on circuit state.
    ///
    /// - Closed: 200
    /// - HalfOpen: 200, accepting probe traffic
    /// - Open: 503
    pub fn http_status(&self) -> u16 {
        match self.state() {
            CircuitState::Closed | CircuitState::HalfOpen => 200,
            CircuitState::Open => 503,
        }
    }

    /// Returns "healthy" when closed, "degraded" when half-open and
    /// "unhealthy" when open.
    pub fn health_status(&self) -> &'static str {
        match self.state() {
            CircuitState::Closed => "healthy",
            CircuitState::HalfOpen => "degraded",
            CircuitState::Open => "unhealthy",
        }
    }
}

impl<S, Res, Err> Clone for CircuitBreaker<S, Res, Err>
where
    S: Clone,
{
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            shared: self.shared.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Req, Res, Err> Service<Req> for CircuitBreaker<S, Res, Err>
where
    S: Service<Req, Response = Res, Error = Err> + Clone + Send + 'static,
    S::Future: Send + 'static,
    Req: Send + 'static,
    Res: Send + 'static,
    Err: Send + 'static,
{
    type Response = Res;
    type Error = CircuitBreakerError<Err>;
    type Future = BoxFuture<'static, Result<Res, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner
            .poll_ready(cx)
            .map_err(CircuitBreakerError::Inner)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let config = Arc::clone(&self.config);
        let shared = self.shared.clone();
        // Take the readied service, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        Box::pin(async move {
            let admission = shared.lock().try_acquire(&config);

            let Some(admission) = admission else {
                #[cfg(feature = "tracing")]
                tracing::warn!(breaker = %config.name, "circuit open, call rejected");

                #[cfg(feature = "metrics")]
                counter!(
                    "circuitbreaker_calls_total",
                    "circuitbreaker" => config.name.clone(),
                    "outcome" => "rejected"
                )
                .increment(1);

                return Err(CircuitBreakerError::OpenCircuit {
                    name: config.name.clone(),
                });
            };

            #[cfg(feature = "tracing")]
            tracing::trace!(breaker = %config.name, "circuit breaker permitted call");

            let guard = AdmissionGuard {
                shared: shared.clone(),
                admission: Some(admission),
            };

            let result = inner.call(req).await;

            if let Some(admission) = guard.complete() {
                let is_failure = config.is_failure(&result);
                shared.lock().record(&config, admission, is_failure);
            }

            result.map_err(CircuitBreakerError::Inner)
        })
    }
}
