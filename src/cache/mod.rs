//! Folio query cache.
//!
//! Wraps read-only CMS queries in a process-wide cache keyed by query
//! identity, with a fixed time-to-live and explicit invalidation tags.
//!
//! ## Configuration
//!
//! Cache behavior is controlled via `folio.toml`:
//!
//! ```toml
//! [cache]
//! enabled = true
//! ttl_seconds = 300
//! max_entries = 1024
//! ```
//!
//! List queries with arbitrary filters are deliberately not cached here;
//! those rely on HTTP `Cache-Control` headers instead.

mod clock;
mod config;
mod keys;
mod lock;
mod registry;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::CacheConfig;
pub use keys::{CacheKey, InvalidationTag, QueryDescriptor};
pub use registry::CacheRegistry;
pub use store::{
    METRIC_CACHE_EVICT, METRIC_CACHE_FETCH_ERROR, METRIC_CACHE_HIT, METRIC_CACHE_INVALIDATED,
    METRIC_CACHE_MISS, QueryCache,
};
