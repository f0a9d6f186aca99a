//! Core infrastructure for employee-gateway.
//!
//! This crate provides the pieces shared by every layer of the gateway:
//! - Event system for observability of the resilience policies and the cache
//! - The closed error taxonomy produced by the upstream adapter

pub mod error;
pub mod events;

pub use error::UpstreamError;
pub use events::{EventListener, EventListeners, FnListener, GatewayEvent};
