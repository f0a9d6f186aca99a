use rand::Rng;
use std::time::Duration;

/// Abstraction for computing retry intervals.
pub trait IntervalFunction: Send + Sync {
    /// Computes the delay before the next retry attempt.
    ///
    /// # Arguments
    /// * `attempt` - The retry attempt number (0-indexed, so first retry is 0)
    fn next_interval(&self, attempt: usize) -> Duration;
}

/// Fixed interval backoff - returns the same duration for every retry.
#[derive(Debug, Clone)]
pub struct FixedInterval {
    duration: Duration,
}

impl FixedInterval {
    /// Creates a new fixed interval backoff.
    pub fn new(duration: Duration) -> Self {
        Self { duration }
    }
}

impl IntervalFunction for FixedInterval {
    fn next_interval(&self, _attempt: usize) -> Duration {
        self.duration
    }
}

/// Exponential backoff with configurable multiplier.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    initial_interval: Duration,
    multiplier: f64,
    max_interval: Option<Duration>,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff with default multiplier of 2.0.
    pub fn new(initial_interval: Duration) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            max_interval: None,
        }
    }

    /// Sets the multiplier for exponential growth.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the maximum interval to cap exponential growth.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }
}

impl IntervalFunction for ExponentialBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        grow(self.initial_interval, self.multiplier, attempt, self.max_interval)
    }
}

/// Exponential backoff with jitter, so that callers failing together do not
/// retry together.
///
/// For attempt `n` the nominal interval is `initial * multiplier^n`, capped at
/// `max_interval`; the actual delay is drawn uniformly from
/// `[nominal * (1 - jitter), nominal]`.
#[derive(Debug, Clone)]
pub struct ExponentialRandomBackoff {
    initial_interval: Duration,
    multiplier: f64,
    jitter: f64,
    max_interval: Option<Duration>,
}

impl ExponentialRandomBackoff {
    /// Creates a new exponential random backoff.
    ///
    /// A `jitter` of 0.5 draws each delay from the upper half of the nominal
    /// interval. Values are clamped into `[0.0, 1.0]`.
    pub fn new(initial_interval: Duration, jitter: f64) -> Self {
        Self {
            initial_interval,
            multiplier: 2.0,
            jitter: jitter.clamp(0.0, 1.0),
            max_interval: None,
        }
    }

    /// Sets the multiplier for exponential growth.
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Sets the maximum interval to cap exponential growth.
    pub fn max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = Some(max_interval);
        self
    }

    /// The interval before jitter is applied.
    pub fn nominal_interval(&self, attempt: usize) -> Duration {
        grow(self.initial_interval, self.multiplier, attempt, self.max_interval)
    }
}

impl IntervalFunction for ExponentialRandomBackoff {
    fn next_interval(&self, attempt: usize) -> Duration {
        let nominal = self.nominal_interval(attempt);
        let high = nominal.as_secs_f64();
        let low = high * (1.0 - self.jitter);
        if high <= low {
            return nominal;
        }
        let drawn = rand::rng().random_range(low..=high);
        Duration::try_from_secs_f64(drawn)
            .map(|d| d.min(nominal))
            .unwrap_or(nominal)
    }
}

/// Function-based interval implementation.
pub struct FnInterval<F> {
    f: F,
}

impl<F> FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    /// Creates a new function-based interval.
    pub fn new(f: F) -> Self {
        Self { f }
    }
}

impl<F> IntervalFunction for FnInterval<F>
where
    F: Fn(usize) -> Duration + Send + Sync,
{
    fn next_interval(&self, attempt: usize) -> Duration {
        (self.f)(attempt)
    }
}

fn grow(initial: Duration, multiplier: f64, attempt: usize, max: Option<Duration>) -> Duration {
    let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
    let factor = multiplier.powi(exponent);
    let interval = if factor.is_finite() && initial.as_secs_f64() * factor < MAX_SECS {
        initial.mul_f64(factor)
    } else {
        Duration::MAX
    };
    match max {
        Some(max) => interval.min(max),
        None => interval,
    }
}

// Far beyond any sensible delay, well inside what `Duration` can hold.
const MAX_SECS: f64 = 1e12;
