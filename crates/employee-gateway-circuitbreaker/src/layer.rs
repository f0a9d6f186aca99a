use crate::config::{CircuitBreakerConfig, CircuitBreakerConfigBuilder};
use crate::CircuitBreaker;
use std::sync::Arc;
use tower::Layer;

/// A Tower Layer that applies circuit breaker behavior to an inner service.
///
/// Every service produced by one layer instance shares the same circuit, so
/// cloning the stack (as axum does per request) never splits the window.
///
/// ```rust
/// use employee_gateway_circuitbreaker::CircuitBreakerLayer;
/// use tower::{ServiceBuilder, service_fn};
///
/// let layer = CircuitBreakerLayer::<String, std::io::Error>::builder()
///     .failure_rate_threshold(0.5)
///     .sliding_window_size(10)
///     .build();
///
/// let service = ServiceBuilder::new()
///     .layer(layer)
///     .service(service_fn(|req: String| async move { Ok::<_, std::io::Error>(req) }));
/// ```
pub struct CircuitBreakerLayer<Res, Err> {
    config: Arc<CircuitBreakerConfig<Res, Err>>,
    shared: crate::SharedCircuit,
}

impl<Res, Err> CircuitBreakerLayer<Res, Err> {
    pub(crate) fn new(config: CircuitBreakerConfig<Res, Err>) -> Self {
        Self {
            config: Arc::new(config),
            shared: crate::SharedCircuit::new(),
        }
    }

    /// Creates a new builder for configuring a circuit breaker layer.
    pub fn builder() -> CircuitBreakerConfigBuilder<Res, Err> {
        CircuitBreakerConfigBuilder::new()
    }

    /// Wraps the given service, returning the concrete `CircuitBreaker`.
    ///
    /// Useful when the caller needs state inspection (`state_sync`, `metrics`)
    /// in addition to the `Service` impl.
    pub fn layer_fn<S>(&self, service: S) -> CircuitBreaker<S, Res, Err> {
        CircuitBreaker::new(service, Arc::clone(&self.config), self.shared.clone())
    }

    #[cfg(test)]
    pub(crate) fn config(&self) -> &CircuitBreakerConfig<Res, Err> {
        &self.config
    }

    #[cfg(test)]
    pub(crate) fn into_config(self) -> Arc<CircuitBreakerConfig<Res, Err>> {
        self.config
    }
}

impl<Res, Err> Clone for CircuitBreakerLayer<Res, Err> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            shared: self.shared.clone(),
        }
    }
}

impl<S, Res, Err> Layer<S> for CircuitBreakerLayer<Res, Err> {
    type Service = CircuitBreaker<S, Res, Err>;

    fn layer(&self, service: S) -> Self::Service {
        self.layer_fn(service)
    }
}
