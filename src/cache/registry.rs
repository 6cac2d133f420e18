//! Bidirectional tag registry.
//!
//! Tracks which cache entries carry which invalidation tags, so a tag can be
//! evicted across every query descriptor that registered it.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::keys::{CacheKey, InvalidationTag};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

/// Tracks tag → cache_keys and cache_key → tags mappings.
pub struct CacheRegistry {
    tag_to_keys: RwLock<HashMap<InvalidationTag, HashSet<CacheKey>>>,
    key_to_tags: RwLock<HashMap<CacheKey, HashSet<InvalidationTag>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            tag_to_keys: RwLock::new(HashMap::new()),
            key_to_tags: RwLock::new(HashMap::new()),
        }
    }

    /// Register a cache entry with its tags, replacing any previous tag set.
    pub fn register(&self, cache_key: CacheKey, tags: HashSet<InvalidationTag>) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "register.tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "register.key_to_tags");

        if let Some(previous) = k2t.remove(&cache_key) {
            detach(&mut t2k, &cache_key, previous);
        }

        for tag in &tags {
            t2k.entry(tag.clone()).or_default().insert(cache_key.clone());
        }
        k2t.insert(cache_key, tags);
    }

    /// Get all cache keys carrying a tag.
    pub fn keys_for_tag(&self, tag: &InvalidationTag) -> HashSet<CacheKey> {
        rw_read(&self.tag_to_keys, SOURCE, "keys_for_tag")
            .get(tag)
            .cloned()
            .unwrap_or_default()
    }

    /// Get all tags attached to a cache key.
    pub fn tags_for_key(&self, cache_key: &CacheKey) -> HashSet<InvalidationTag> {
        rw_read(&self.key_to_tags, SOURCE, "tags_for_key")
            .get(cache_key)
            .cloned()
            .unwrap_or_default()
    }

    /// Remove a cache key and clean up its tag mappings.
    pub fn unregister(&self, cache_key: &CacheKey) {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "unregister.tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "unregister.key_to_tags");

        if let Some(tags) = k2t.remove(cache_key) {
            detach(&mut t2k, cache_key, tags);
        }
    }

    /// Remove every key carrying `tag`, returning them for eviction.
    ///
    /// The returned keys are fully unregistered, including their other tags.
    pub fn take_tag(&self, tag: &InvalidationTag) -> HashSet<CacheKey> {
        let mut t2k = rw_write(&self.tag_to_keys, SOURCE, "take_tag.tag_to_keys");
        let mut k2t = rw_write(&self.key_to_tags, SOURCE, "take_tag.key_to_tags");

        let affected = t2k.remove(tag).unwrap_or_default();
        for cache_key in &affected {
            if let Some(tags) = k2t.remove(cache_key) {
                detach(&mut t2k, cache_key, tags);
            }
        }

        affected
    }

    pub fn tag_count(&self) -> usize {
        rw_read(&self.tag_to_keys, SOURCE, "tag_count").len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.key_to_tags, SOURCE, "key_count").len()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn detach(
    t2k: &mut HashMap<InvalidationTag, HashSet<CacheKey>>,
    cache_key: &CacheKey,
    tags: HashSet<InvalidationTag>,
) {
    for tag in tags {
        if let Some(keys) = t2k.get_mut(&tag) {
            keys.remove(cache_key);
            if keys.is_empty() {
                t2k.remove(&tag);
            }
        }
    }
}
