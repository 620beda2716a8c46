//! Cache and event side effects. These run after the data change has been
//! committed and can never fail the operation that triggered them.
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};
use tripmatch_core::cache::Cache;
use tripmatch_core::events::EventSink;
use tripmatch_shared::DomainEvent;

/// Every eviction bumps `generation` before deleting. A view read from the
/// store is written back only if no eviction happened since the read began,
/// so a read racing a commit cannot re-cache the pre-commit view. Evictions
/// made by other processes are not observed here; the TTL bounds those.
#[derive(Clone)]
pub struct SideEffects {
    cache: Arc<dyn Cache>,
    events: Arc<dyn EventSink>,
    generation: Arc<AtomicU64>,
}

impl SideEffects {
    pub fn new(cache: Arc<dyn Cache>, events: Arc<dyn EventSink>) -> Self {
        Self {
            cache,
            events,
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Take before reading the store; pass to [`SideEffects::remember`]
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub async fn invalidate(&self, prefixes: &[&str]) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for prefix in prefixes {
            match self.cache.delete_by_prefix(prefix).await {
                Ok(removed) => debug!("Invalidated {} keys under {}", removed, prefix),
                Err(e) => warn!("Cache invalidation of {} failed: {}", prefix, e),
            }
        }
    }

    pub async fn evict(&self, keys: &[String]) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        for key in keys {
            if let Err(e) = self.cache.delete(key).await {
                warn!("Cache eviction of {} failed: {}", key, e);
            }
        }
    }

    /// Cached value for `key`. Unreachable or unreadable entries are misses.
    pub async fn cached<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = match self.cache.get(key).await {
            Ok(Some(value)) => value,
            Ok(None) => {
                debug!("Cache miss {}", key);
                return None;
            }
            Err(e) => {
                warn!("Cache read of {} failed: {}", key, e);
                return None;
            }
        };

        match serde_json::from_value(value) {
            Ok(hit) => {
                debug!("Cache hit {}", key);
                Some(hit)
            }
            Err(e) => {
                warn!("Ignoring cache entry {} with unexpected shape: {}", key, e);
                None
            }
        }
    }

    pub async fn remember<T: Serialize>(&self, key: &str, value: &T, ttl_seconds: u64, read_at: u64) {
        if self.generation() != read_at {
            debug!("Not caching {}: invalidated while it was read", key);
            return;
        }
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(e) => {
                warn!("Could not serialize cache entry {}: {}", key, e);
                return;
            }
        };
        if let Err(e) = self.cache.set(key, &value, ttl_seconds).await {
            warn!("Cache write of {} failed: {}", key, e);
        }
    }

    pub async fn emit(&self, event: DomainEvent) {
        if let Err(e) = self.events.emit(&event).await {
            warn!("Dropping {} event {}: {}", event.event_type.as_str(), event.event_id, e);
        }
    }
}
