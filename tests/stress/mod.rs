//! Stress tests for the gateway's cache and resilience policies.
//!
//! These tests push the components well past normal traffic. They are marked
//! with `#[ignore]` and must be run explicitly:
//!
//! ```bash
//! cargo test --test stress -- --ignored --nocapture
//! ```


use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Tracks peak concurrent operations.
pub struct ConcurrencyTracker {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl ConcurrencyTracker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            current: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        })
    }

    pub fn enter(&self) {
        let current = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(current, Ordering::SeqCst);
    }

    pub fn exit(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}
