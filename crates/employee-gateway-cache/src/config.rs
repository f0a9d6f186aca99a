use crate::events::CacheEvent;
use crate::CollectionCache;
use employee_gateway_core::{EventListeners, FnListener};
use std::marker::PhantomData;

/// Configuration for a [`CollectionCache`].
pub struct CacheConfig {
    pub(crate) name: String,
    pub(crate) event_listeners: EventListeners<CacheEvent>,
}

impl CacheConfig {
    /// Creates a new configuration builder for a cache of `T` failing with `E`.
    pub fn builder<T, E>() -> CacheConfigBuilder<T, E> {
        CacheConfigBuilder::new()
    }
}

/// Builder for a [`CollectionCache`] holding `T` and failing with `E`.
pub struct CacheConfigBuilder<T, E> {
    name: String,
    event_listeners: EventListeners<CacheEvent>,
    _marker: PhantomData<fn() -> (T, E)>,
}

impl<T, E> Default for CacheConfigBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> CacheConfigBuilder<T, E> {
    /// Creates a new builder with defaults.
    pub fn new() -> Self {
        Self {
            name: "<unnamed>".to_string(),
            event_listeners: EventListeners::new(),
            _marker: PhantomData,
        }
    }

    /// Sets the name for this cache (used in events and logs).
    pub fn name<N: Into<String>>(mut self, name: N) -> Self {
        self.name = name.into();
        self
    }

    /// Registers a callback for reads served from the slot.
    pub fn on_hit<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Hit { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback for reads that start a fill.
    pub fn on_miss<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Miss { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback for reads that wait on another caller's fill.
    pub fn on_coalesced<F>(mut self, f: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if matches!(event, CacheEvent::Coalesced { .. }) {
                f();
            }
        }));
        self
    }

    /// Registers a callback for invalidations, with the new generation.
    pub fn on_invalidated<F>(mut self, f: F) -> Self
    where
        F: Fn(u64) + Send + Sync + 'static,
    {
        self.event_listeners.add(FnListener::new(move |event| {
            if let CacheEvent::Invalidated { generation, .. } = event {
                f(*generation);
            }
        }));
        self
    }

    /// Builds the cache.
    pub fn build(self) -> CollectionCache<T, E> {
        CollectionCache::with_config(CacheConfig {
            name: self.name,
            event_listeners: self.event_listeners,
        })
    }
}
