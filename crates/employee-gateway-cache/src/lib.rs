//! Single-slot collection cache with coalesced refills.
//!
//! [`CollectionCache`] holds at most one value: the most recent successful
//! result of an expensive "fetch everything" call. It has two states, empty
//! and populated, and three linearizable operations ([`get`], [`put`],
//! [`invalidate`]) guarded by one short critical section.
//!
//! [`get_or_fill`] adds stampede control on top: when the slot is empty, the
//! first caller runs the fill and every concurrent caller waits for that same
//! result instead of starting its own.
//!
//! ## Generations
//!
//! Every invalidation bumps a generation counter. A fill remembers the
//! generation it started under and only populates the slot if no
//! invalidation happened in the meantime; it still answers the callers that
//! were already waiting on it. Callers arriving after an invalidation never
//! join a fill that started before it.
//!
//! ```rust
//! use employee_gateway_cache::CollectionCache;
//!
//! # async fn example() -> Result<(), std::io::Error> {
//! let cache: CollectionCache<Vec<String>, std::io::Error> =
//!     CollectionCache::builder().name("all-employees").build();
//!
//! let names = cache
//!     .get_or_fill(|| async { Ok(vec!["Alice".to_string()]) })
//!     .await?;
//! assert_eq!(names.len(), 1);
//!
//! cache.invalidate();
//! assert!(cache.get().is_none());
//! # Ok(())
//! # }
//! ```
//!
//! [`get`]: CollectionCache::get
//! [`put`]: CollectionCache::put
//! [`invalidate`]: CollectionCache::invalidate
//! [`get_or_fill`]: CollectionCache::get_or_fill

use parking_lot::Mutex;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::broadcast;

#[cfg(feature = "metrics")]
use metrics::counter;

pub use config::{CacheConfig, CacheConfigBuilder};
pub use events::CacheEvent;

mod config;
mod events;

type FillResult<T, E> = Result<Arc<T>, E>;

struct InFlight<T, E> {
    id: u64,
    sender: broadcast::Sender<FillResult<T, E>>,
}

struct Slot<T, E> {
    generation: u64,
    value: Option<Arc<T>>,
    in_flight: Option<InFlight<T, E>>,
    next_fill_id: u64,
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    invalidations: AtomicU64,
    failed_fills: AtomicU64,
    discarded_fills: AtomicU64,
}

/// Point-in-time counters of a [`CollectionCache`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Reads answered from the populated slot.
    pub hits: u64,
    /// Reads that found the slot empty and ran a fill.
    pub misses: u64,
    /// Reads that waited on another caller's fill.
    pub coalesced: u64,
    /// Calls to `invalidate`.
    pub invalidations: u64,
    /// Fills that returned an error.
    pub failed_fills: u64,
    /// Successful fills not stored because the slot was invalidated meanwhile.
    pub discarded_fills: u64,
}

struct Inner<T, E> {
    slot: Mutex<Slot<T, E>>,
    counters: Counters,
    config: CacheConfig,
}

/// A process-wide, single-entry cache.
///
/// Cloning is cheap and every clone shares the same slot.
pub struct CollectionCache<T, E> {
    inner: Arc<Inner<T, E>>,
}

impl<T, E> Clone for CollectionCache<T, E> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, E> Default for CollectionCache<T, E> {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl<T, E> CollectionCache<T, E> {
    /// Creates a new builder.
    pub fn builder() -> CacheConfigBuilder<T, E> {
        CacheConfigBuilder::new()
    }

    pub(crate) fn with_config(config: CacheConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                slot: Mutex::new(Slot {
                    generation: 0,
                    value: None,
                    in_flight: None,
                    next_fill_id: 0,
                }),
                counters: Counters::default(),
                config,
            }),
        }
    }

    /// The cache's configured name.
    pub fn name(&self) -> &str {
        &self.inner.config.name
    }

    /// Returns the current value, or `None` when the slot is empty.
    pub fn get(&self) -> Option<Arc<T>> {
        self.inner.slot.lock().value.clone()
    }

    /// Replaces the slot's content.
    pub fn put(&self, value: T) -> Arc<T> {
        let value = Arc::new(value);
        self.inner.slot.lock().value = Some(Arc::clone(&value));
        value
    }

    /// Empties the slot and detaches any fill in flight from it.
    ///
    /// Returns the new generation.
    pub fn invalidate(&self) -> u64 {
        let generation = {
            let mut slot = self.inner.slot.lock();
            slot.generation += 1;
            slot.value = None;
            slot.in_flight = None;
            slot.generation
        };
        self.inner.counters.invalidations.fetch_add(1, Ordering::Relaxed);

        self.emit(CacheEvent::Invalidated {
            pattern_name: self.inner.config.name.clone(),
            timestamp: Instant::now(),
            generation,
        });

        #[cfg(feature = "tracing")]
        tracing::debug!(cache = %self.inner.config.name, generation, "cache invalidated");

        #[cfg(feature = "metrics")]
        counter!("collection_cache_invalidations_total", "cache" => self.inner.config.name.clone())
            .increment(1);

        generation
    }

    /// Returns `true` when the slot holds a value.
    pub fn is_populated(&self) -> bool {
        self.inner.slot.lock().value.is_some()
    }

    /// The current generation; bumped by every [`invalidate`](Self::invalidate).
    pub fn generation(&self) -> u64 {
        self.inner.slot.lock().generation
    }

    /// Snapshot of the cache's counters.
    pub fn stats(&self) -> CacheStats {
        let c = &self.inner.counters;
        CacheStats {
            hits: c.hits.load(Ordering::Relaxed),
            misses: c.misses.load(Ordering::Relaxed),
            coalesced: c.coalesced.load(Ordering::Relaxed),
            invalidations: c.invalidations.load(Ordering::Relaxed),
            failed_fills: c.failed_fills.load(Ordering::Relaxed),
            discarded_fills: c.discarded_fills.load(Ordering::Relaxed),
        }
    }

    fn emit(&self, event: CacheEvent) {
        if !self.inner.config.event_listeners.is_empty() {
            self.inner.config.event_listeners.emit(&event);
        }
    }

    #[cfg(feature = "metrics")]
    fn record_request(&self, outcome: &'static str) {
        counter!(
            "collection_cache_requests_total",
            "cache" => self.inner.config.name.clone(),
            "outcome" => outcome
        )
        .increment(1);
    }
}

enum Role<T, E> {
    Hit(Arc<T>),
    Wait(broadcast::Receiver<FillResult<T, E>>),
    Lead {
        id: u64,
        generation: u64,
        sender: broadcast::Sender<FillResult<T, E>>,
    },
}

/// Clears the in-flight marker if the leading caller goes away mid-fill, so
/// that its waiters can take over.
struct LeaderGuard<'a, T, E> {
    slot: &'a Mutex<Slot<T, E>>,
    id: u64,
    armed: bool,
}

impl<T, E> Drop for LeaderGuard<'_, T, E> {
    fn drop(&mut self) {
        if self.armed {
            let mut slot = self.slot.lock();
            if slot.in_flight.as_ref().is_some_and(|f| f.id == self.id) {
                slot.in_flight = None;
            }
        }
    }
}

impl<T, E> CollectionCache<T, E>
where
    T: Send + Sync,
    E: Clone + Send,
{
    /// Returns the cached value, filling the slot with `fill` on a miss.
    ///
    /// At most one fill runs at a time. Callers that miss while a fill is in
    /// flight wait for it and receive the same `Arc` (or the same error).
    /// Errors are never cached. If the caller running the fill is cancelled,
    /// one of the waiters runs its own `fill` instead.
    pub async fn get_or_fill<F, Fut>(&self, fill: F) -> Result<Arc<T>, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let (id, generation, sender) = loop {
            match self.join() {
                Role::Hit(value) => return Ok(value),
                Role::Wait(mut receiver) => match receiver.recv().await {
                    Ok(result) => return result,
                    // Leader cancelled; race to replace it.
                    Err(_) => continue,
                },
                Role::Lead {
                    id,
                    generation,
                    sender,
                } => break (id, generation, sender),
            }
        };

        let mut guard = LeaderGuard {
            slot: &self.inner.slot,
            id,
            armed: true,
        };

        let result = fill().await.map(Arc::new);

        let stored = {
            let mut slot = self.inner.slot.lock();
            if slot.in_flight.as_ref().is_some_and(|f| f.id == id) {
                slot.in_flight = None;
            }
            match &result {
                Ok(value) if slot.generation == generation => {
                    slot.value = Some(Arc::clone(value));
                    true
                }
                _ => false,
            }
        };
        guard.armed = false;

        match &result {
            Ok(_) if !stored => {
                self.inner
                    .counters
                    .discarded_fills
                    .fetch_add(1, Ordering::Relaxed);

                #[cfg(feature = "tracing")]
                tracing::debug!(
                    cache = %self.inner.config.name,
                    generation,
                    "fill finished after invalidation; result not stored"
                );
            }
            Err(_) => {
                self.inner.counters.failed_fills.fetch_add(1, Ordering::Relaxed);
            }
            Ok(_) => {}
        }

        self.emit(CacheEvent::FillCompleted {
            pattern_name: self.inner.config.name.clone(),
            timestamp: Instant::now(),
            stored,
        });

        // No receivers is fine: nobody joined this fill.
        let _ = sender.send(result.clone());
        result
    }

    fn join(&self) -> Role<T, E> {
        let role = {
            let mut slot = self.inner.slot.lock();
            if let Some(value) = &slot.value {
                Role::Hit(Arc::clone(value))
            } else if let Some(in_flight) = &slot.in_flight {
                Role::Wait(in_flight.sender.subscribe())
            } else {
                let (sender, _) = broadcast::channel(1);
                let id = slot.next_fill_id;
                slot.next_fill_id += 1;
                slot.in_flight = Some(InFlight {
                    id,
                    sender: sender.clone(),
                });
                Role::Lead {
                    id,
                    generation: slot.generation,
                    sender,
                }
            }
        };

        let name = &self.inner.config.name;
        match &role {
            Role::Hit(_) => {
                self.inner.counters.hits.fetch_add(1, Ordering::Relaxed);
                self.emit(CacheEvent::Hit {
                    pattern_name: name.clone(),
                    timestamp: Instant::now(),
                });
                #[cfg(feature = "metrics")]
                self.record_request("hit");
            }
            Role::Wait(_) => {
                self.inner.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                self.emit(CacheEvent::Coalesced {
                    pattern_name: name.clone(),
                    timestamp: Instant::now(),
                });
                #[cfg(feature = "tracing")]
                tracing::trace!(cache = %name, "joined in-flight fill");
                #[cfg(feature = "metrics")]
                self.record_request("coalesced");
            }
            #[cfg_attr(not(feature = "tracing"), allow(unused_variables))]
            Role::Lead { generation, .. } => {
                self.inner.counters.misses.fetch_add(1, Ordering::Relaxed);
                self.emit(CacheEvent::Miss {
                    pattern_name: name.clone(),
                    timestamp: Instant::now(),
                });
                #[cfg(feature = "tracing")]
                tracing::debug!(cache = %name, generation, "cache miss, filling");
                #[cfg(feature = "metrics")]
                self.record_request("miss");
            }
        }
        role
    }
}
