//! Bounded retry middleware for calls to the upstream employee service.
//!
//! Failed calls are retried up to a fixed number of attempts with a backoff
//! between them. A predicate selects which errors are worth another attempt;
//! everything else is returned immediately. When retries run out, an optional
//! mapper may rewrite the last error so the caller can tell a persistent
//! condition from a one-off one.
//!
//! ```rust
//! use employee_gateway_core::UpstreamError;
//! use employee_gateway_retry::RetryLayer;
//! use std::time::Duration;
//!
//! let layer = RetryLayer::<UpstreamError>::builder()
//!     .name("employeeAPI")
//!     .max_attempts(3)
//!     .exponential_random_backoff(Duration::from_millis(100))
//!     .retry_on(UpstreamError::is_transient)
//!     .build();
//! ```
//!
//! ## Feature Flags
//! - `metrics`: `retry_calls_total` and `retry_attempts_total` counters
//! - `tracing`: attempt logging via `tracing`

use futures::future::BoxFuture;
#[cfg(feature = "metrics")]
use metrics::counter;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;
use tower::Service;

pub use backoff::{
    ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, FnInterval, IntervalFunction,
};
pub use config::{RetryConfig, RetryConfigBuilder, DEFAULT_MAX_INTERVAL};
pub use events::RetryEvent;
pub use layer::RetryLayer;

mod backoff;
mod config;
mod events;
mod layer;

/// A Tower [`Service`] that retries failed calls to the inner service.
pub struct Retry<S, E> {
    inner: S,
    config: Arc<RetryConfig<E>>,
}

impl<S, E> Retry<S, E> {
    pub(crate) fn new(inner: S, config: Arc<RetryConfig<E>>) -> Self {
        Self { inner, config }
    }
}

impl<S: Clone, E> Clone for Retry<S, E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: Arc::clone(&self.config),
        }
    }
}

impl<S, Req, E> Service<Req> for Retry<S, E>
where
    S: Service<Req, Error = E> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Response: Send + 'static,
    Req: Clone + Send + 'static,
    E: Send + 'static,
{
    type Response = S::Response;
    type Error = E;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Req) -> Self::Future {
        let clone = self.inner.clone();
        let mut service = std::mem::replace(&mut self.inner, clone);
        let config = Arc::clone(&self.config);

        Box::pin(async move {
            let mut attempt = 0;

            loop {
                // The first attempt uses the service readied by the caller.
                if attempt > 0 {
                    futures::future::poll_fn(|cx| service.poll_ready(cx)).await?;
                }

                match service.call(req.clone()).await {
                    Ok(response) => {
                        config.event_listeners.emit(&RetryEvent::Success {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempts: attempt + 1,
                        });

                        #[cfg(feature = "metrics")]
                        counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "success")
                            .increment(1);

                        return Ok(response);
                    }
                    Err(error) => {
                        if !config.should_retry(&error) {
                            config.event_listeners.emit(&RetryEvent::IgnoredError {
                                pattern_name: config.name.clone(),
                                timestamp: Instant::now(),
                            });

                            #[cfg(feature = "metrics")]
                            counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "ignored")
                                .increment(1);

                            return Err(error);
                        }

                        let attempts = attempt + 1;
                        if attempts >= config.max_attempts {
                            config.event_listeners.emit(&RetryEvent::Error {
                                pattern_name: config.name.clone(),
                                timestamp: Instant::now(),
                                attempts,
                            });

                            #[cfg(feature = "tracing")]
                            tracing::debug!(retry = %config.name, attempts, "retries exhausted");

                            #[cfg(feature = "metrics")]
                            counter!("retry_calls_total", "retry" => config.name.clone(), "outcome" => "exhausted")
                                .increment(1);

                            return Err(config.exhausted(error, attempts));
                        }

                        let delay = config.next_backoff(attempt);
                        config.event_listeners.emit(&RetryEvent::Retry {
                            pattern_name: config.name.clone(),
                            timestamp: Instant::now(),
                            attempt: attempts,
                            delay,
                        });

                        #[cfg(feature = "tracing")]
                        tracing::debug!(
                            retry = %config.name,
                            attempt = attempts,
                            delay_ms = delay.as_millis() as u64,
                            "retrying after failed attempt"
                        );

                        #[cfg(feature = "metrics")]
                        counter!("retry_attempts_total", "retry" => config.name.clone()).increment(1);

                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                }
            }
        })
    }
}
