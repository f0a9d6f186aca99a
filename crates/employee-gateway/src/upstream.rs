//! The upstream client wrapped in its resilience policies.
//!
//! The stack is, from the outside in:
//!
//! ```text
//! circuit breaker -> deadline -> retry -> UpstreamClient
//! ```
//!
//! The breaker sees one result per logical call, so an exhausted retry
//! counts as a single failure, and so does a call abandoned at the deadline.
//! Both policies are named `employeeAPI` and are shared by list, create and
//! delete.

use crate::client::{UpstreamRequest, UpstreamResponse};
use crate::model::{CreateEmployeeRequest, Employee};
use employee_gateway_circuitbreaker::{
    CircuitBreakerError, CircuitBreakerLayer, CircuitHandle, CircuitState,
};
use employee_gateway_core::UpstreamError;
use employee_gateway_retry::RetryLayer;
use futures::future::BoxFuture;
use std::task::{Context, Poll};
use std::time::Duration;
use tower::util::BoxCloneSyncService;
use tower::{Layer, Service, ServiceBuilder, ServiceExt};

/// Name shared by the retry policy and the circuit breaker.
pub const POLICY_NAME: &str = "employeeAPI";

/// Tunables of the resilient stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ResilienceSettings {
    /// Attempts per call, the first one included.
    pub max_attempts: usize,
    /// Initial backoff; doubled per retry with jitter.
    pub base_delay: Duration,
    /// Failure ratio at which the circuit opens.
    pub failure_ratio: f64,
    pub window_size: usize,
    pub minimum_calls: usize,
    pub open_wait: Duration,
    pub half_open_probes: usize,
    /// Budget for a whole call, retries included.
    pub deadline: Duration,
}

impl Default for ResilienceSettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
            failure_ratio: 0.5,
            window_size: 10,
            minimum_calls: 5,
            open_wait: Duration::from_secs(10),
            half_open_probes: 3,
            deadline: Duration::from_secs(15),
        }
    }
}

type UpstreamService = BoxCloneSyncService<UpstreamRequest, UpstreamResponse, UpstreamError>;

/// The upstream, guarded by retry, circuit breaker and a per-call deadline.
///
/// Clones share the breaker state and the underlying connection pool.
#[derive(Clone)]
pub struct ResilientUpstream {
    service: UpstreamService,
    circuit: CircuitHandle,
}

impl ResilientUpstream {
    /// Wraps `inner` (normally an [`UpstreamClient`](crate::client::UpstreamClient)).
    pub fn new<S>(inner: S, settings: &ResilienceSettings) -> Self
    where
        S: Service<UpstreamRequest, Response = UpstreamResponse, Error = UpstreamError>
            + Clone
            + Send
            + Sync
            + 'static,
        S::Future: Send + 'static,
    {
        let retry = RetryLayer::<UpstreamError>::builder()
            .name(POLICY_NAME)
            .max_attempts(settings.max_attempts)
            .exponential_random_backoff(settings.base_delay)
            .retry_on(UpstreamError::is_transient)
            .map_exhausted(persisted_rate_limit)
            .build();

        let breaker = CircuitBreakerLayer::<UpstreamResponse, UpstreamError>::builder()
            .name(POLICY_NAME)
            .failure_rate_threshold(settings.failure_ratio)
            .sliding_window_size(settings.window_size)
            .minimum_number_of_calls(settings.minimum_calls)
            .wait_duration_in_open(settings.open_wait)
            .permitted_calls_in_half_open(settings.half_open_probes)
            .failure_classifier(|result: &Result<UpstreamResponse, UpstreamError>| {
                matches!(result, Err(e) if e.trips_breaker())
            })
            .build()
            .layer_fn(Deadline::new(retry.layer(inner), settings.deadline));

        let circuit = breaker.handle();
        let service = ServiceBuilder::new()
            .map_err(flatten_breaker_error)
            .service(breaker);

        Self {
            service: BoxCloneSyncService::new(service),
            circuit,
        }
    }

    /// Current state of the shared circuit.
    pub fn circuit_state(&self) -> CircuitState {
        self.circuit.state()
    }

    /// Read-only view of the shared circuit, for readiness checks.
    pub fn circuit(&self) -> &CircuitHandle {
        &self.circuit
    }

    /// Runs one logical upstream call through the stack.
    ///
    /// When the deadline passes, the call and any pending retries are
    /// dropped, the result is `UpstreamUnavailable` and the breaker records
    /// a failure.
    pub async fn call(&self, request: UpstreamRequest) -> Result<UpstreamResponse, UpstreamError> {
        self.service.clone().oneshot(request).await
    }

    /// Fetches the whole collection.
    pub async fn list_all(&self) -> Result<Vec<Employee>, UpstreamError> {
        match self.call(UpstreamRequest::ListAll).await? {
            UpstreamResponse::Employees(employees) => Ok(employees),
            other => Err(unexpected("list_all", &other)),
        }
    }

    /// Creates an employee; the upstream assigns id and email.
    pub async fn create(&self, request: CreateEmployeeRequest) -> Result<Employee, UpstreamError> {
        match self.call(UpstreamRequest::Create(request)).await? {
            UpstreamResponse::Created(employee) => Ok(employee),
            other => Err(unexpected("create", &other)),
        }
    }

    /// Deletes by name; `Ok(false)` when the upstream declined.
    pub async fn delete_by_name(&self, name: String) -> Result<bool, UpstreamError> {
        match self.call(UpstreamRequest::DeleteByName(name)).await? {
            UpstreamResponse::Deleted(deleted) => Ok(deleted),
            other => Err(unexpected("delete_by_name", &other)),
        }
    }
}

/// Bounds a whole retried call, backoff included.
#[derive(Clone)]
struct Deadline<S> {
    inner: S,
    limit: Duration,
}

impl<S> Deadline<S> {
    fn new(inner: S, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

impl<S> Service<UpstreamRequest> for Deadline<S>
where
    S: Service<UpstreamRequest, Response = UpstreamResponse, Error = UpstreamError>
        + Clone
        + Send
        + 'static,
    S::Future: Send + 'static,
{
    type Response = UpstreamResponse;
    type Error = UpstreamError;
    type Future = BoxFuture<'static, Result<UpstreamResponse, UpstreamError>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, request: UpstreamRequest) -> Self::Future {
        let operation = request.operation();
        let limit = self.limit;
        let call = self.inner.call(request);

        Box::pin(async move {
            match tokio::time::timeout(limit, call).await {
                Ok(result) => result,
                Err(_) => {
                    let deadline_ms = limit.as_millis() as u64;
                    tracing::error!(operation, deadline_ms, "upstream call abandoned at deadline");
                    Err(UpstreamError::unavailable(format!(
                        "deadline of {deadline_ms} ms exceeded"
                    )))
                }
            }
        })
    }
}

fn flatten_breaker_error(error: CircuitBreakerError<UpstreamError>) -> UpstreamError {
    error.into()
}

fn persisted_rate_limit(error: UpstreamError, attempts: usize) -> UpstreamError {
    match error {
        UpstreamError::RateLimited { .. } => UpstreamError::UpstreamClient {
            status: 429,
            message: format!("rate limit persisted after {attempts} attempts"),
        },
        other => other,
    }
}

fn unexpected(operation: &str, response: &UpstreamResponse) -> UpstreamError {
    UpstreamError::unavailable(format!(
        "unexpected upstream response to {operation}: {response:?}"
    ))
}
