use crate::events::CircuitBreakerEvent;
use crate::CircuitState;
use employee_gateway_core::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

pub(crate) type SharedFailureClassifier<Res, Err> =
    Arc<dyn Fn(&Result<Res, Err>) -> bool + Send + Sync>;

/// Type of sliding window used for tracking calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SlidingWindowType {
    /// Count-based window tracks the outcomes of the last N calls.
    CountBased,
    /// Time-based window tracks calls within a time duration.
    TimeBased,
}

/// Configuration for the circuit breaker pattern.
pub struct CircuitBreakerConfig<Res, Err> {
    pub(crate) failure_rate_threshold: f64,
    pub(crate) sliding_window_type: SlidingWindowType,
    pub(crate) sliding_window_size: usize,
    pub(crate) sliding_window_duration: Duration,
    pub(crate) wait_duration_in_open: Duration,
    pub(crate) permitted_calls_in_half_open: usize,
    pub(crate) minimum_number_of_calls: usize,
    pub(crate) failure_classifier: Option<SharedFailureClassifier<Res, Err>>,
    pub(crate) event_listeners: EventListeners<CircuitBreakerEvent>,
    pub(crate) name: String,
}

impl<Res, Err> CircuitBreakerConfig<Res, Err> {
    /// Creates a new configuration builder.
    pub fn builder() -> CircuitBreakerConfigBuilder<Res, Err> {
        CircuitBreakerConfigBuilder::new()
    }

    /// The breaker's name, as used in events and errors.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` if the result counts toward the failure window.
    pub(crate) fn is_failure(&self, result: &Result<Res, Err>) -> bool {
        match &self.failure_classifier {
            Some(classify) => classify(result),
            None => result.is_err(),
        }
    }
}

/// Builder for configuring and constructing a circuit breaker.
pub struct CircuitBreakerConfigBuilder<Res, Err> {
    failure_rate_threshold: f64,
    sliding_window_type: SlidingWindowType,
    sliding_window_size: usize,
    sliding_window_duration: Duration,
    wait_duration_in_open: Duration,
    permitted_calls_in_half_open: usize,
    failure_classifier: Option<SharedFailureClassifier<Res, Err>>,
    minimum_number_of_calls: Option<usize>,
    event_listeners: EventListeners<CircuitBreakerEvent>,
    name: String,
}

impl<Res, Err> CircuitBreakerConfigBuilder<Res, Err> {
    /// Creates a new builder with default values.
    pub fn new() -> Self {
        Self {
            failure_rate_threshold: 0.5,
            sliding_window_type: SlidingWindowType::CountBased,
            sliding_window_size: 100,
            sliding_window_duration: Duration::from_secs(60),
            wait_duration_in_open: Duration::from_secs(30),
            permitted_calls_in_half_open: 1,
            failure_classifier: None,
            minimum_number_of_calls: None,
            event_listeners: EventListeners::new(),
            name: String::from("<unnamed>"),
        }
    }

    /// Sets the failure rate threshold at which the circuit will open.
    ///
    /// The circuit opens when the failure ratio of the window is greater
    /// than or equal to this value. Values are clamped into `(0.0, 1.0]`.
    ///
    /// Default: 0.5 (50%)
    pub fn failure_rate_threshold(mut self, rate: f64) -> Self {
        self.failure_rate_threshold = rate.clamp(f64::MIN_POSITIVE, 1.0);
        self
    }

    /// Uses a count-based window holding the outcomes of the last `size` calls.
    ///
    /// Default: count-based, 100 calls
    pub fn sliding_window_size(mut self, size: usize) -> Self {
        self.sliding_window_type = SlidingWindowType::CountBased;
        self.sliding_window_size = size.max(1);
        self
    }

    /// Uses a time-based window holding the outcomes of calls completed
    /// within the last `duration`.
    pub fn time_based_window(mut self, duration: Duration) -> Self {
        self.sliding_window_type = SlidingWindowType::TimeBased;
        self.sliding_window_duration = duration;
        self
    }

    /// Sets the duration the circuit remains open before transitioning to half-open.
    ///
    /// Default: 30 seconds
    pub fn wait_duration_in_open(mut self, duration: Duration) -> Self {
        self.wait_duration_in_open = duration;
        self
    }

    /// Sets the number of probe calls admitted in the half-open state.
    ///
    /// All probes must succeed to close the circuit; any failing probe
    /// re-opens it.
    ///
    /// Default: 1
    pub fn permitted_calls_in_half_open(mut self, n: usize) -> Self {
        self.permitted_calls_in_half_open = n.max(1);
        self
    }

    /// Sets a custom failure classifier function.
    ///
    /// Default: classifies errors as failures
    pub fn failure_classifier<F>(mut self, classifier: F) -> Self
    where
        F: Fn(&Result<Res, Err>) -> bool + Send + Sync + 'static,
    {
        self.failure_classifier = Some(Arc::new(classifier));
        self
    }

    /// Sets the minimum number of recorded calls before the failure rate is evaluated.
    ///
    /// Default: same as the window size for count-based windows, 1 for time-based windows
    pub fn minimum_number_of_calls(mut self, n: usize) -> Self {
        self.minimum_number_of_calls = Some(n.max(1));
        self
    }

    /// Give this breaker a human-readable name for observability.
    ///
    /// Default: `<unnamed>`
    pub fn name<N: Into<String>>(mut self, n: N) -> Self {
        self.name = n.into();
        self
    }

    /// Registers a callback when the circuit breaker transitions between states.
    ///
    /// The callback receives the state the circuit leaves and the state it enters.
    ///
    /// # Example
    /// ```rust,no_run
    /// use employee_gateway_circuitbreaker::{CircuitBreakerConfig, CircuitState};
    ///
    /// let layer = CircuitBreakerConfig::<(), ()>::builder()
    ///     .on_state_transition(|from, to| {
    ///         if to == CircuitState::Open {
    ///             eprintln!("upstream degraded ({:?} -> {:?})", from, to);
    ///         }
    ///     })
    ///     .build();
    /// ```
    pub fn on_state_transition<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState, CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::StateTransition {
                    from_state,
                    to_state,
                    ..
                } = event
                {
                    f(*from_state, *to_state);
                }
            }));
        self
    }

    /// Registers a callback when a call is permitted through the circuit breaker.
    pub fn on_call_permitted<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::CallPermitted { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback when a call is rejected by the circuit breaker.
    ///
    /// Calls are rejected while the circuit is open, and in the half-open
    /// state once every probe slot is taken.
    pub fn on_call_rejected<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if matches!(event, CircuitBreakerEvent::CallRejected { .. }) {
                    f();
                }
            }));
        self
    }

    /// Registers a callback when a successful call is recorded.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::SuccessRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Registers a callback when a failed call is recorded.
    pub fn on_failure<F>(mut self, f: F) -> Self
    where
        F: Fn(CircuitState) + Send + Sync + 'static,
    {
        self.event_listeners
            .add(FnListener::new(move |event: &CircuitBreakerEvent| {
                if let CircuitBreakerEvent::FailureRecorded { state, .. } = event {
                    f(*state);
                }
            }));
        self
    }

    /// Builds the configuration and returns a CircuitBreakerLayer.
    pub fn build(self) -> crate::layer::CircuitBreakerLayer<Res, Err> {
        let default_minimum = match self.sliding_window_type {
            SlidingWindowType::CountBased => self.sliding_window_size,
            SlidingWindowType::TimeBased => 1,
        };

        let config = CircuitBreakerConfig {
            failure_rate_threshold: self.failure_rate_threshold,
            sliding_window_type: self.sliding_window_type,
            sliding_window_size: self.sliding_window_size,
            sliding_window_duration: self.sliding_window_duration,
            wait_duration_in_open: self.wait_duration_in_open,
            permitted_calls_in_half_open: self.permitted_calls_in_half_open,
            failure_classifier: self.failure_classifier,
            minimum_number_of_calls: self.minimum_number_of_calls.unwrap_or(default_minimum),
            event_listeners: self.event_listeners,
            name: self.name,
        };

        crate::layer::CircuitBreakerLayer::new(config)
    }
}

impl<Res, Err> Default for CircuitBreakerConfigBuilder<Res, Err> {
    fn default() -> Self {
        Self::new()
    }
}
