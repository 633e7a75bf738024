//! TTL response cache for provider lookups.
//!
//! POI and weather answers change slowly relative to how often a reasoning
//! loop asks for them, so the handlers front their upstream calls with a
//! [`moka`] cache keyed by request parameters.  Hit/miss counters are kept
//! for observability.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use moka::future::Cache;
use serde_json::Value;

/// Hit/miss snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

/// A TTL-bounded cache of JSON payloads keyed by request string.
pub struct ResponseCache {
    inner: Cache<String, Value>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ResponseCache {
    /// Create a cache holding up to `capacity` entries for `ttl` each.
    pub fn new(capacity: u64, ttl: Duration) -> Self {
        Self {
            inner: Cache::builder()
                .max_capacity(capacity)
                .time_to_live(ttl)
                .build(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Fetch a cached payload, recording the hit or miss.
    pub async fn get(&self, key: &str) -> Option<Value> {
        let value = self.inner.get(key).await;
        match &value {
            Some(_) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%key, "cache hit");
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(%key, "cache miss");
            }
        }
        value
    }

    /// Store a payload.
    pub async fn insert(&self, key: String, value: Value) {
        self.inner.insert(key, value).await;
    }

    /// Counter snapshot.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
