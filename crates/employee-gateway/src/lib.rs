//! REST facade over the employee directory service.
//!
//! The gateway keeps one cached copy of the upstream's employee collection,
//! answers every read from it, and forwards creates and deletes to the
//! upstream, invalidating the cache when they succeed. Every upstream call
//! runs through a retry policy and a circuit breaker.
//!
//! ```text
//! api -> service -> cache -> upstream (breaker -> retry -> client)
//!              \-> query
//! ```
//!
//! ```rust,no_run
//! use employee_gateway::{api, build_service, GatewayConfig};
//! use clap::Parser;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = GatewayConfig::parse();
//! config.validate()?;
//! let app = api::router(build_service(&config)?);
//! let listener = tokio::net::TcpListener::bind(config.listen).await?;
//! axum::serve(listener, app).await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod model;
pub mod query;
pub mod service;
pub mod telemetry;
pub mod upstream;
pub mod validation;

pub use client::{ClientBuildError, UpstreamClient, UpstreamRequest, UpstreamResponse};
pub use config::{ConfigError, GatewayConfig, LogFormat};
pub use employee_gateway_core::UpstreamError;
pub use model::{CreateEmployeeRequest, Employee};
pub use service::{DeleteOutcome, EmployeeService};
pub use upstream::{ResilienceSettings, ResilientUpstream};

/// Wires the HTTP client, the resilience policies and the cache together.
pub fn build_service(config: &GatewayConfig) -> Result<EmployeeService, ClientBuildError> {
    let client = UpstreamClient::new(&config.upstream_base_url, config.upstream_timeout())?;
    let upstream = ResilientUpstream::new(client, &config.resilience());
    Ok(EmployeeService::new(upstream))
}
