use crate::config::{CircuitBreakerConfig, SlidingWindowType};
use crate::events::CircuitBreakerEvent;
#[cfg(feature = "metrics")]
use metrics::{counter, gauge};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Represents the state of the circuit breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(u8)]
pub enum CircuitState {
    /// The circuit is closed and calls are allowed.
    Closed = 0,
    /// The circuit is open and calls are rejected.
    Open = 1,
    /// The circuit is half-open and a limited number of probe calls are allowed.
    HalfOpen = 2,
}

impl CircuitState {
    pub(crate) fn from_u8(value: u8) -> Self {
        match value {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }

    /// Stable label used in logs, metrics and health payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "Closed",
            CircuitState::Open => "Open",
            CircuitState::HalfOpen => "HalfOpen",
        }
    }
}

/// Snapshot of circuit breaker metrics for observability.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct CircuitMetrics {
    /// Current state of the circuit breaker.
    pub state: CircuitState,
    /// Total number of recorded calls in the sliding window.
    pub total_calls: usize,
    /// Number of failed calls in the sliding window.
    pub failure_count: usize,
    /// Number of successful calls in the sliding window.
    pub success_count: usize,
    /// Current failure rate (0.0 to 1.0).
    pub failure_rate: f64,
    /// Time since the last state transition.
    pub time_since_state_change: Duration,
}

#[derive(Debug, Clone, Copy)]
struct CallRecord {
    timestamp: Instant,
    is_failure: bool,
}

/// Proof that a call was admitted, tied to the state epoch it was admitted in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Admission {
    epoch: u64,
    state: CircuitState,
}

pub(crate) struct Circuit {
    state: CircuitState,
    state_atomic: Arc<AtomicU8>,
    last_state_change: Instant,
    // Bumped on every transition so late results can be told apart.
    epoch: u64,
    records: VecDeque<CallRecord>,
    half_open_admitted: usize,
    half_open_successes: usize,
}

impl Circuit {
    pub(crate) fn new(state_atomic: Arc<AtomicU8>) -> Self {
        state_atomic.store(CircuitState::Closed as u8, Ordering::Release);
        Self {
            state: CircuitState::Closed,
            state_atomic,
            last_state_change: Instant::now(),
            epoch: 0,
            records: VecDeque::new(),
            half_open_admitted: 0,
            half_open_successes: 0,
        }
    }

    pub(crate) fn state(&self) -> CircuitState {
        self.state
    }

    /// Returns a snapshot of the current window.
    pub(crate) fn metrics<Res, Err>(
        &mut self,
        config: &CircuitBreakerConfig<Res, Err>,
    ) -> CircuitMetrics {
        self.evict_expired(config);
        let (total_calls, failure_count) = self.window_stats();
        let failure_rate = if total_calls > 0 {
            failure_count as f64 / total_calls as f64
        } else {
            0.0
        };

        CircuitMetrics {
            state: self.state,
            total_calls,
            failure_count,
            success_count: total_calls - failure_count,
            failure_rate,
            time_since_state_change: self.last_state_change.elapsed(),
        }
    }

    /// Decides whether a call may proceed.
    ///
    /// An open circuit whose wait has elapsed moves to half-open here, and
    /// the caller that observed it becomes the first probe.
    pub(crate) fn try_acquire<Res, Err>(
        &mut self,
        config: &CircuitBreakerConfig<Res, Err>,
    ) -> Option<Admission> {
        let permitted = match self.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if self.last_state_change.elapsed() >= config.wait_duration_in_open {
                    self.transition_to(CircuitState::HalfOpen, config);
                    self.half_open_admitted = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if self.half_open_admitted < config.permitted_calls_in_half_open {
                    self.half_open_admitted += 1;
                    true
                } else {
                    false
                }
            }
        };

        if permitted {
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallPermitted {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                    state: self.state,
                });
            Some(Admission {
                epoch: self.epoch,
                state: self.state,
            })
        } else {
            config
                .event_listeners
                .emit(&CircuitBreakerEvent::CallRejected {
                    pattern_name: config.name.clone(),
                    timestamp: Instant::now(),
                });
            None
        }
    }

    /// Gives back a half-open probe slot whose call never completed.
    pub(crate) fn release(&mut self, admission: Admission) {
        if admission.state == CircuitState::HalfOpen
            && self.state == CircuitState::HalfOpen
            && admission.epoch == self.epoch
        {
            self.half_open_admitted = self.half_open_admitted.saturating_sub(1);
        }
    }

    pub(crate) fn record<Res, Err>(
        &mut self,
        config: &CircuitBreakerConfig<Res, Err>,
        admission: Admission,
        is_failure: bool,
    ) {
        let event = if is_failure {
            CircuitBreakerEvent::FailureRecorded {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            }
        } else {
            CircuitBreakerEvent::SuccessRecorded {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                state: self.state,
            }
        };
        config.event_listeners.emit(&event);

        #[cfg(feature = "metrics")]
        counter!(
            "circuitbreaker_calls_total",
            "circuitbreaker" => config.name.clone(),
            "outcome" => if is_failure { "failure" } else { "success" }
        )
        .increment(1);

        match self.state {
            // Late results from before the circuit opened carry no signal.
            CircuitState::Open => {}
            CircuitState::HalfOpen => {
                if admission.epoch != self.epoch {
                    return;
                }
                if is_failure {
                    self.transition_to(CircuitState::Open, config);
                } else {
                    self.half_open_successes += 1;
                    if self.half_open_successes >= config.permitted_calls_in_half_open {
                        self.transition_to(CircuitState::Closed, config);
                    }
                }
            }
            CircuitState::Closed => {
                self.push_record(config, is_failure);
                self.evaluate_window(config);
            }
        }
    }

    pub(crate) fn force_open<Res, Err>(&mut self, config: &CircuitBreakerConfig<Res, Err>) {
        self.transition_to(CircuitState::Open, config);
    }

    pub(crate) fn force_closed<Res, Err>(&mut self, config: &CircuitBreakerConfig<Res, Err>) {
        self.transition_to(CircuitState::Closed, config);
    }

    pub(crate) fn reset<Res, Err>(&mut self, config: &CircuitBreakerConfig<Res, Err>) {
        self.transition_to(CircuitState::Closed, config);
        self.records.clear();
    }

    fn push_record<Res, Err>(&mut self, config: &CircuitBreakerConfig<Res, Err>, is_failure: bool) {
        self.records.push_back(CallRecord {
            timestamp: Instant::now(),
            is_failure,
        });
        if config.sliding_window_type == SlidingWindowType::CountBased {
            while self.records.len() > config.sliding_window_size {
                self.records.pop_front();
            }
        }
    }

    fn evict_expired<Res, Err>(&mut self, config: &CircuitBreakerConfig<Res, Err>) {
        if config.sliding_window_type != SlidingWindowType::TimeBased {
            return;
        }
        let now = Instant::now();
        while let Some(record) = self.records.front() {
            if now.duration_since(record.timestamp) > config.sliding_window_duration {
                self.records.pop_front();
            } else {
                break;
            }
        }
    }

    fn window_stats(&self) -> (usize, usize) {
        let failures = self.records.iter().filter(|r| r.is_failure).count();
        (self.records.len(), failures)
    }

    fn evaluate_window<Res, Err>(&mut self, config: &CircuitBreakerConfig<Res, Err>) {
        self.evict_expired(config);
        let (total, failures) = self.window_stats();

        if total < config.minimum_number_of_calls {
            return;
        }

        let failure_rate = failures as f64 / total as f64;
        if failure_rate >= config.failure_rate_threshold {
            self.transition_to(CircuitState::Open, config);
        }
    }

    fn transition_to<Res, Err>(&mut self, state: CircuitState, config: &CircuitBreakerConfig<Res, Err>) {
        if self.state == state {
            return;
        }

        let from_state = self.state;

        config
            .event_listeners
            .emit(&CircuitBreakerEvent::StateTransition {
                pattern_name: config.name.clone(),
                timestamp: Instant::now(),
                from_state,
                to_state: state,
            });

        #[cfg(feature = "tracing")]
        tracing::info!(
            breaker = %config.name,
            from = from_state.as_str(),
            to = state.as_str(),
            "circuit state transition"
        );

        #[cfg(feature = "metrics")]
        {
            counter!(
                "circuitbreaker_transitions_total",
                "circuitbreaker" => config.name.clone(),
                "from" => from_state.as_str(),
                "to" => state.as_str()
            )
            .increment(1);
            gauge!("circuitbreaker_state", "circuitbreaker" => config.name.clone())
                .set(state as u8 as f64);
        }

        self.state = state;
        self.state_atomic.store(state as u8, Ordering::Release);
        self.last_state_change = Instant::now();
        self.epoch = self.epoch.wrapping_add(1);
        self.half_open_admitted = 0;
        self.half_open_successes = 0;
        // A fresh window after every transition; stale failures must not
        // re-open a circuit that just closed.
        self.records.clear();
    }
}
