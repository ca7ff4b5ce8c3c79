//! Recognition caching.
//!
//! [`RecognitionCache`] memoizes recognizer results per URL so that repeated
//! navigations to the same location (back/forward, refreshes, redirect
//! re-resolution) skip segment matching. It is gated behind the `cache`
//! feature and uses the [`lru`] crate internally.
//!
//! The cache is owned by a recognizer and cleared whenever a route is added,
//! so a hit is always consistent with the current route table.
//!
//! [`CacheStats`] tracks hits, misses and invalidations.
//!
//! # Examples
//!
//! ```
//! use navigator_pipeline::cache::RecognitionCache;
//!
//! let mut cache = RecognitionCache::new();
//! assert!(cache.get("users/1").is_none());
//! cache.insert("users/1".to_string(), Vec::new());
//! assert!(cache.get("users/1").is_some());
//! assert_eq!(cache.stats().hits, 1);
//! assert_eq!(cache.stats().misses, 1);
//! ```

use crate::recognizer::RecognizedRoute;
use crate::{debug_log, trace_log};
use lru::LruCache;
use std::num::NonZeroUsize;

/// Counters tracking cache effectiveness.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
    /// Number of full invalidations (route table changes).
    pub invalidations: usize,
}

impl CacheStats {
    /// Hit rate in `0.0..=1.0`; `0.0` before any lookup.
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// LRU cache from URL to recognized routes.
#[derive(Debug)]
pub struct RecognitionCache {
    entries: LruCache<String, Vec<RecognizedRoute>>,
    stats: CacheStats,
}

impl RecognitionCache {
    const DEFAULT_CAPACITY: usize = 256;

    pub fn new() -> Self {
        Self::with_capacity(Self::DEFAULT_CAPACITY)
    }

    /// Create a cache holding up to `capacity` URLs (at least one).
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
            stats: CacheStats::default(),
        }
    }

    /// Look up a URL, updating hit/miss counters.
    pub fn get(&mut self, url: &str) -> Option<Vec<RecognizedRoute>> {
        match self.entries.get(url) {
            Some(hit) => {
                self.stats.hits += 1;
                trace_log!("Recognition cache hit for '{}'", url);
                Some(hit.clone())
            }
            None => {
                self.stats.misses += 1;
                trace_log!("Recognition cache miss for '{}'", url);
                None
            }
        }
    }

    pub fn insert(&mut self, url: String, routes: Vec<RecognizedRoute>) {
        self.entries.push(url, routes);
    }

    /// Drop every entry and count an invalidation.
    pub fn clear(&mut self) {
        let dropped = self.entries.len();
        self.entries.clear();
        self.stats.invalidations += 1;
        debug_log!(
            "Recognition cache cleared: {} entries dropped ({} invalidations, hit rate {:.1}%)",
            dropped,
            self.stats.invalidations,
            self.stats.hit_rate() * 100.0
        );
    }

    pub const fn stats(&self) -> &CacheStats {
        &self.stats
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for RecognitionCache {
    fn default() -> Self {
        Self::new()
    }
}
