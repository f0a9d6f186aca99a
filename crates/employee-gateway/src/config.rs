//! Command-line and environment configuration.

use crate::upstream::ResilienceSettings;
use clap::{Parser, ValueEnum};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human-readable lines.
    Text,
    /// One JSON object per line.
    Json,
}

/// Runtime configuration of the gateway.
///
/// Every flag can also be set through the matching `GATEWAY_*` variable.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "employee-gateway",
    version,
    about = "REST facade over the employee directory service"
)]
pub struct GatewayConfig {
    /// Address the facade listens on.
    #[arg(long, env = "GATEWAY_LISTEN", default_value = "127.0.0.1:8111")]
    pub listen: SocketAddr,

    /// Employee collection URL of the upstream service.
    #[arg(
        long,
        env = "GATEWAY_UPSTREAM_BASE_URL",
        default_value = "http://localhost:8112/api/v1/employee"
    )]
    pub upstream_base_url: String,

    /// Timeout of a single upstream attempt, in milliseconds.
    #[arg(long, env = "GATEWAY_UPSTREAM_TIMEOUT_MS", default_value_t = 5_000)]
    pub upstream_timeout_ms: u64,

    /// Budget for a whole upstream call including retries, in milliseconds.
    #[arg(long, env = "GATEWAY_REQUEST_DEADLINE_MS", default_value_t = 15_000)]
    pub request_deadline_ms: u64,

    /// Attempts per upstream call, the first one included.
    #[arg(long, env = "GATEWAY_RETRY_MAX_ATTEMPTS", default_value_t = 3)]
    pub retry_max_attempts: usize,

    /// Initial backoff between attempts, in milliseconds.
    #[arg(long, env = "GATEWAY_RETRY_BASE_DELAY_MS", default_value_t = 100)]
    pub retry_base_delay_ms: u64,

    /// Failure ratio at which the circuit opens.
    #[arg(long, env = "GATEWAY_BREAKER_FAILURE_RATIO", default_value_t = 0.5)]
    pub breaker_failure_ratio: f64,

    /// Number of recent calls the breaker evaluates.
    #[arg(long, env = "GATEWAY_BREAKER_WINDOW_SIZE", default_value_t = 10)]
    pub breaker_window_size: usize,

    /// Calls required before the failure ratio is evaluated.
    #[arg(long, env = "GATEWAY_BREAKER_MINIMUM_CALLS", default_value_t = 5)]
    pub breaker_minimum_calls: usize,

    /// How long the circuit stays open before probing, in milliseconds.
    #[arg(long, env = "GATEWAY_BREAKER_OPEN_WAIT_MS", default_value_t = 10_000)]
    pub breaker_open_wait_ms: u64,

    /// Probe calls admitted while half-open.
    #[arg(long, env = "GATEWAY_BREAKER_HALF_OPEN_PROBES", default_value_t = 3)]
    pub breaker_half_open_probes: usize,

    /// Log output format.
    #[arg(long, env = "GATEWAY_LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

/// A configuration value the gateway cannot run with.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("upstream base url must start with http:// or https://, got '{0}'")]
    BaseUrlScheme(String),

    #[error("retry max attempts must be at least 1")]
    ZeroAttempts,

    #[error("breaker failure ratio must be in (0, 1], got {0}")]
    FailureRatio(f64),

    #[error("breaker window size must be at least 1")]
    ZeroWindow,

    #[error("breaker half-open probes must be at least 1")]
    ZeroProbes,

    #[error("breaker minimum calls ({minimum}) cannot exceed the window size ({window})")]
    MinimumCalls { minimum: usize, window: usize },
}

impl GatewayConfig {
    /// Rejects values the policies would misbehave with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.upstream_base_url.to_ascii_lowercase();
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::BaseUrlScheme(self.upstream_base_url.clone()));
        }
        if self.retry_max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        if !(self.breaker_failure_ratio > 0.0 && self.breaker_failure_ratio <= 1.0) {
            return Err(ConfigError::FailureRatio(self.breaker_failure_ratio));
        }
        if self.breaker_window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        if self.breaker_half_open_probes == 0 {
            return Err(ConfigError::ZeroProbes);
        }
        if self.breaker_minimum_calls > self.breaker_window_size {
            return Err(ConfigError::MinimumCalls {
                minimum: self.breaker_minimum_calls,
                window: self.breaker_window_size,
            });
        }
        Ok(())
    }

    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_millis(self.upstream_timeout_ms)
    }

    /// Retry, breaker and deadline settings for the upstream stack.
    pub fn resilience(&self) -> ResilienceSettings {
        ResilienceSettings {
            max_attempts: self.retry_max_attempts,
            base_delay: Duration::from_millis(self.retry_base_delay_ms),
            failure_ratio: self.breaker_failure_ratio,
            window_size: self.breaker_window_size,
            minimum_calls: self.breaker_minimum_calls,
            open_wait: Duration::from_millis(self.breaker_open_wait_ms),
            half_open_probes: self.breaker_half_open_probes,
            deadline: Duration::from_millis(self.request_deadline_ms),
        }
    }
}
