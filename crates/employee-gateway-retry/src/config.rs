use crate::backoff::{ExponentialBackoff, ExponentialRandomBackoff, FixedInterval, IntervalFunction};
use crate::events::RetryEvent;
use employee_gateway_core::{EventListeners, FnListener};
use std::sync::Arc;
use std::time::Duration;

pub(crate) type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
pub(crate) type ExhaustedMapper<E> = Arc<dyn Fn(E, usize) -> E + Send + Sync>;

/// Longest delay the default backoff will ever wait between attempts.
pub const DEFAULT_MAX_INTERVAL: Duration = Duration::from_secs(10);

/// Configuration for the retry middleware.
pub struct RetryConfig<E> {
    pub(crate) max_attempts: usize,
    pub(crate) interval_fn: Arc<dyn IntervalFunction>,
    pub(crate) retry_predicate: Option<RetryPredicate<E>>,
    pub(crate) exhausted_mapper: Option<ExhaustedMapper<E>>,
    pub(crate) event_listeners: EventListeners<RetryEvent>,
    pub(crate) name: String,
}

impl<E> RetryConfig<E> {
    /// Creates a new configuration builder.
    pub fn builder() -> RetryConfigBuilder<E> {
        RetryConfigBuilder::new()
    }

    /// Total attempts, including the initial one.
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    pub(crate) fn should_retry(&self, error: &E) -> bool {
        self.retry_predicate
            .as_ref()
            .map(|predicate| predicate(error))
            .unwrap_or(true)
    }

    pub(crate) fn next_backoff(&self, attempt: usize) -> Duration {
        self.interval_fn.next_interval(attempt)
    }

    // Only errors that survived at least one retry are rewritten.
    pub(crate) fn exhausted(&self, error: E, attempts: usize) -> E {
        match &self.exhausted_mapper {
            Some(map) if attempts > 1 => map(error, attempts),
            _ => error,
        }
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<E> {
    max_attempts: usize,
    interval_fn: Option<Arc<dyn IntervalFunction>>,
    retry_predicate: Option<RetryPredicate<E>>,
    exhausted_mapper: Option<ExhaustedMapper<E>>,
    event_listeners: EventListeners<RetryEvent>,
    name: String,
}

impl<E> Default for RetryConfigBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RetryConfigBuilder<E> {
    /// Creates a new builder with defaults.
    ///
    /// Defaults:
    /// - max_attempts: 3
    /// - backoff: exponential from 100ms with 50% jitter, capped at 10s
    /// - retry predicate: every error
    /// - name: `"<unnamed>"`
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            interval_fn: None,
            retry_predicate: None,
            exhausted_mapper: None,
            event_listeners: EventListeners::new(),
            name: "<unnamed>".to_string(),
        }
    }

    /// Sets the maximum number of attempts.
    ///
    /// This includes the initial attempt, so max_attempts=3 means
    /// 1 initial attempt + 2 retries. Zero is treated as one.
    pub fn max_attempts(mut self, max_attempts: usize) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets a fixed backoff interval.
    pub fn fixed_backoff(mut self, duration: Duration) -> Self {
        self.interval_fn = Some(Arc::new(FixedInterval::new(duration)));
        self
    }

    /// Sets exponential backoff without jitter.
    pub fn exponential_backoff(mut self, initial_interval: Duration) -> Self {
        self.interval_fn = Some(Arc::new(ExponentialBackoff::new(initial_interval)));
        self
    }

    /// Sets exponential backoff with 50% jitter, capped at [`DEFAULT_MAX_INTERVAL`].
    pub fn exponential_random_backoff(mut self, initial_interval: Duration) -> Self {
        self.interval_fn = Some(Arc::new(
            ExponentialRandomBackoff::new(initial_interval, 0.5).max_interval(DEFAULT_MAX_INTERVAL),
        ));
        self
    }

    /// Sets a custom interval function for backoff.
    pub fn backoff<I>(mut self, interval_fn: I) -> Self
    where
        I: IntervalFunction + 'static,
    {
        self.interval_fn = Some(Arc::new(interval_fn));
        self
    }

    /// Sets a predicate to determine which errors should be retried.
    pub fn retry_on<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.retry_predicate = Some(Arc::new(predicate));
        self
    }

    /// Rewrites the final error once retries run out.
    ///
    /// The mapper receives the last error and the number of attempts made.
    /// It is only applied when at least one retry happened; an error that
    /// was returned on the first attempt is passed through untouched.
    ///
    /// ```rust
    /// use employee_gateway_core::UpstreamError;
    /// use employee_gateway_retry::RetryLayer;
    ///
    /// let layer = RetryLayer::<UpstreamError>::builder()
    ///     .map_exhausted(|err, attempts| match err {
    ///         UpstreamError::RateLimited { .. } => UpstreamError::UpstreamClient {
    ///             status: 429,
    ///             message: format!("rate limit persisted after {attempts} attempts"),
    ///         },
    ///         other => other,
    ///     })
    ///     .build();
    /// ```
    pub fn map_exhausted<F>(mut self, mapper: F) -> Self
    where
        F: Fn(E, usize) -> E + Send + Sync + 'static,
    {
        self.exhausted_mapper = Some(Arc::new(mapper));
        self
    }

    /// Sets the name for this retry instance (used in events and logs).
    pub fn name<S: Into<String>>(mut self, name: S) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback when a retry attempt is about to be made.
    ///
    /// Called with the retry number (1 = first retry) and the delay that
    /// precedes it.
    pub fn on_retry<F>(mut self, f: F) -> Self
    where
        F: Fn(usize, Duration) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Retry { attempt, delay, .. } = event {
                f(*attempt, *delay);
            }
        }));
        self
    }

    /// Registers a callback when an operation succeeds, with the total
    /// number of attempts it took.
    pub fn on_success<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Success { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when all attempts are exhausted.
    pub fn on_error<F>(mut self, f: F) -> Self
    where
        F: Fn(usize) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let RetryEvent::Error { attempts, .. } = event {
                f(*attempts);
            }
        }));
        self
    }

    /// Registers a callback when an error is returned without retrying
    /// because the predicate rejected it.
    pub fn on_ignored_error<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, RetryEvent::IgnoredError { .. }) {
                f();
            }
        }));
        self
    }

    /// Builds the retry layer.
    pub fn build(self) -> crate::RetryLayer<E> {
        let interval_fn = self.interval_fn.unwrap_or_else(|| {
            Arc::new(
                ExponentialRandomBackoff::new(Duration::from_millis(100), 0.5)
                    .max_interval(DEFAULT_MAX_INTERVAL),
            )
        });

        let config = RetryConfig {
            max_attempts: self.max_attempts,
            interval_fn,
            retry_predicate: self.retry_predicate,
            exhausted_mapper: self.exhausted_mapper,
            event_listeners: self.event_listeners,
            name: self.name,
        };

        crate::RetryLayer::new(config)
    }
}
