//! Query cache storage.
//!
//! Holds CMS query results keyed by [`CacheKey`] with a fixed TTL and a set of
//! invalidation tags per entry. Expired entries are recomputed synchronously on
//! the next access; failures are never cached.

use std::any::Any;
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};

use lru::LruCache;
use metrics::counter;
use time::OffsetDateTime;
use tracing::{debug, warn};

use super::clock::{Clock, SystemClock};
use super::config::CacheConfig;
use super::keys::{CacheKey, InvalidationTag, QueryDescriptor};
use super::lock::mutex_lock;
use super::registry::CacheRegistry;

const SOURCE: &str = "cache::store";

pub const METRIC_CACHE_HIT: &str = "folio_cache_hit_total";
pub const METRIC_CACHE_MISS: &str = "folio_cache_miss_total";
pub const METRIC_CACHE_EVICT: &str = "folio_cache_evict_total";
pub const METRIC_CACHE_FETCH_ERROR: &str = "folio_cache_fetch_error_total";
pub const METRIC_CACHE_INVALIDATED: &str = "folio_cache_invalidated_total";

struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    /// `None` when the TTL reaches past the representable calendar.
    expires_at: Option<OffsetDateTime>,
}

impl CacheEntry {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_none_or(|expires_at| now < expires_at)
    }
}

enum Lookup<T> {
    Hit(T),
    Miss,
}

/// Process-wide cache for read-only CMS queries.
pub struct QueryCache {
    config: CacheConfig,
    clock: Arc<dyn Clock>,
    entries: Mutex<LruCache<CacheKey, CacheEntry>>,
    registry: CacheRegistry,
}

impl QueryCache {
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let capacity = config.max_entries_non_zero();
        Self {
            config,
            clock,
            entries: Mutex::new(LruCache::new(capacity)),
            registry: CacheRegistry::new(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Return the cached value for `descriptor` while fresh, otherwise run
    /// `fetch`, store its successful result under `tags`, and return it.
    ///
    /// Racing callers on a cold key may both fetch; the last write wins.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        descriptor: &QueryDescriptor,
        tags: impl IntoIterator<Item = InvalidationTag>,
        fetch: F,
    ) -> Result<T, E>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        if !self.config.enabled {
            return fetch().await;
        }

        let key = descriptor.key();
        let tags: HashSet<InvalidationTag> = tags.into_iter().collect();
        if let Lookup::Hit(value) = self.lookup::<T>(&key) {
            counter!(METRIC_CACHE_HIT, "query" => descriptor.name().to_string()).increment(1);
            debug!(target: "folio::cache", key = %key, "cache hit");
            return Ok(value);
        }

        counter!(METRIC_CACHE_MISS, "query" => descriptor.name().to_string()).increment(1);
        debug!(target: "folio::cache", key = %key, "cache miss");

        match fetch().await {
            Ok(value) => {
                self.store(key, value.clone(), tags);
                Ok(value)
            }
            Err(err) => {
                counter!(METRIC_CACHE_FETCH_ERROR, "query" => descriptor.name().to_string())
                    .increment(1);
                Err(err)
            }
        }
    }

    fn lookup<T: Clone + 'static>(&self, key: &CacheKey) -> Lookup<T> {
        let now = self.clock.now();
        let mut entries = mutex_lock(&self.entries, SOURCE, "lookup");

        match entries.get(key) {
            None => return Lookup::Miss,
            Some(entry) if entry.is_fresh(now) => {
                if let Some(value) = entry.value.downcast_ref::<T>() {
                    return Lookup::Hit(value.clone());
                }
                warn!(
                    target: "folio::cache",
                    key = %key,
                    "cached value has an unexpected type; refetching"
                );
            }
            Some(_) => {}
        }

        entries.pop(key);
        self.registry.unregister(key);
        Lookup::Miss
    }

    fn store<T: Send + Sync + 'static>(
        &self,
        key: CacheKey,
        value: T,
        tags: HashSet<InvalidationTag>,
    ) {
        let expires_at = time::Duration::try_from(self.config.ttl())
            .ok()
            .and_then(|ttl| self.clock.now().checked_add(ttl));
        let entry = CacheEntry {
            value: Arc::new(value),
            expires_at,
        };

        let mut entries = mutex_lock(&self.entries, SOURCE, "store");
        if let Some((evicted, _)) = entries.push(key.clone(), entry)
            && evicted != key
        {
            counter!(METRIC_CACHE_EVICT).increment(1);
            self.registry.unregister(&evicted);
        }
        self.registry.register(key, tags);
    }

    /// Evict every entry carrying `tag`. Returns the number of entries removed.
    pub fn invalidate_tag(&self, tag: &InvalidationTag) -> usize {
        let mut entries = mutex_lock(&self.entries, SOURCE, "invalidate_tag");
        let removed = self
            .registry
            .take_tag(tag)
            .into_iter()
            .filter(|key| entries.pop(key).is_some())
            .count();
        drop(entries);

        counter!(METRIC_CACHE_INVALIDATED).increment(removed as u64);
        debug!(target: "folio::cache", tag = %tag, removed, "invalidated tag");
        removed
    }

    pub fn len(&self) -> usize {
        mutex_lock(&self.entries, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
