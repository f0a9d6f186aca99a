use employee_gateway_core::GatewayEvent;
use std::time::Instant;

/// Events emitted by the collection cache.
#[derive(Debug, Clone)]
pub enum CacheEvent {
    /// A read was served from the populated slot.
    Hit {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A read found the slot empty and started a fill.
    Miss {
        pattern_name: String,
        timestamp: Instant,
    },
    /// A read found the slot empty and joined a fill already in flight.
    Coalesced {
        pattern_name: String,
        timestamp: Instant,
    },
    /// The slot was emptied.
    Invalidated {
        pattern_name: String,
        timestamp: Instant,
        generation: u64,
    },
    /// A fill finished. `stored` is false when the fill failed or the slot
    /// was invalidated while it ran.
    FillCompleted {
        pattern_name: String,
        timestamp: Instant,
        stored: bool,
    },
}

impl GatewayEvent for CacheEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CacheEvent::Hit { .. } => "hit",
            CacheEvent::Miss { .. } => "miss",
            CacheEvent::Coalesced { .. } => "coalesced",
            CacheEvent::Invalidated { .. } => "invalidated",
            CacheEvent::FillCompleted { .. } => "fill_completed",
        }
    }

    fn timestamp(&self) -> Instant {
        match self {
            CacheEvent::Hit { timestamp, .. }
            | CacheEvent::Miss { timestamp, .. }
            | CacheEvent::Coalesced { timestamp, .. }
            | CacheEvent::Invalidated { timestamp, .. }
            | CacheEvent::FillCompleted { timestamp, .. } => *timestamp,
        }
    }

    fn pattern_name(&self) -> &str {
        match self {
            CacheEvent::Hit { pattern_name, .. }
            | CacheEvent::Miss { pattern_name, .. }
            | CacheEvent::Coalesced { pattern_name, .. }
            | CacheEvent::Invalidated { pattern_name, .. }
            | CacheEvent::FillCompleted { pattern_name, .. } => pattern_name,
        }
    }
}
