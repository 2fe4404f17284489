//! In-memory LRU cache for search results.
//!
//! Memoizes final, date-filtered paper lists keyed by the normalized
//! request. Uses [`moka`] for async-friendly caching with TTL and
//! automatic eviction. Each client owns its own cache instance.

use std::time::Duration;

use moka::future::Cache;

use crate::types::{Paper, SearchRequest};

/// Maximum number of cached search result sets.
const MAX_CACHE_ENTRIES: u64 = 100;

/// Composite cache key: normalized query plus request bounds.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Lowercased, trimmed query string.
    query: String,
    max_results: usize,
    days_back: u32,
}

impl CacheKey {
    /// Build a deterministic cache key from a request.
    ///
    /// The query is lowercased and trimmed so that cosmetic variations
    /// of the same search share an entry.
    pub fn new(request: &SearchRequest) -> Self {
        Self {
            query: request.query.trim().to_lowercase(),
            max_results: request.max_results,
            days_back: request.days_back,
        }
    }
}

/// Search result memoization. Disabled when built with a zero TTL.
#[derive(Clone)]
pub struct SearchCache {
    inner: Option<Cache<CacheKey, Vec<Paper>>>,
}

impl SearchCache {
    /// Create a cache whose entries live for `ttl_seconds`.
    pub fn new(ttl_seconds: u64) -> Self {
        let inner = (ttl_seconds > 0).then(|| {
            Cache::builder()
                .max_capacity(MAX_CACHE_ENTRIES)
                .time_to_live(Duration::from_secs(ttl_seconds))
                .build()
        });
        Self { inner }
    }

    /// Look up cached results for the given key.
    pub async fn get(&self, key: &CacheKey) -> Option<Vec<Paper>> {
        match &self.inner {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    /// Insert search results into the cache.
    pub async fn insert(&self, key: CacheKey, papers: Vec<Paper>) {
        if let Some(cache) = &self.inner {
            cache.insert(key, papers).await;
        }
    }
}
