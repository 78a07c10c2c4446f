//! Read-through cache with per-entry expiry
//!
//! This module provides a `TtlCache<V>` keyed by [`CacheKey`]. Entries carry an
//! absolute expiry instant and are simply ignored once it passes; nothing is
//! evicted or invalidated explicitly. Computation on a miss happens with no
//! lock held, so concurrent misses on the same key may both recompute and the
//! last writer wins. Entries for different keys never block each other beyond
//! the map's short critical sections.

use parking_lot::RwLock;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Key space shared by every cache in the catalog layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// The full `(id, name)` catalog index
    Index,
    /// Resolved display label for a category (or entity) id
    CategoryLabel(u32),
    /// Ascending member entity ids of a category
    CategoryMembers(u32),
    /// Deduplicated `(id, label)` list of every category
    CategoryList,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheKey::Index => write!(f, "index:all"),
            CacheKey::CategoryLabel(id) => write!(f, "category:label:{id}"),
            CacheKey::CategoryMembers(id) => write!(f, "category:members:{id}"),
            CacheKey::CategoryList => write!(f, "category:list"),
        }
    }
}

#[derive(Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent map of cached values with absolute expiry.
///
/// Values should be cheap to clone (`Arc<[T]>`, `Arc<str>`); a stored value is
/// never mutated, only replaced wholesale by a later insert.
pub struct TtlCache<V> {
    entries: Arc<RwLock<HashMap<CacheKey, Entry<V>>>>,
}

impl<V: Clone> TtlCache<V> {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Get an unexpired value from the cache
    pub fn get(&self, key: &CacheKey) -> Option<V> {
        let guard = self.entries.read();
        guard
            .get(key)
            .filter(|entry| entry.expires_at > Instant::now())
            .map(|entry| entry.value.clone())
    }

    /// Insert a value that stays fresh for `ttl`, replacing any previous entry
    pub fn insert(&self, key: CacheKey, value: V, ttl: Duration) {
        let entry = Entry {
            value,
            expires_at: Instant::now() + ttl,
        };
        self.entries.write().insert(key, entry);
    }

    /// Check if the cache holds a key, fresh or not
    #[cfg(test)]
    fn contains(&self, key: &CacheKey) -> bool {
        self.entries.read().contains_key(key)
    }

    /// Return the cached value for `key`, computing and storing it on a miss.
    ///
    /// Only successful computations are stored. A failed computation leaves
    /// whatever entry was there before untouched, so an expired last-good
    /// value is never replaced by an error or a partial result.
    pub async fn get_or_try_insert_with<F, Fut, E>(
        &self,
        key: CacheKey,
        ttl: Duration,
        compute: F,
    ) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        if let Some(value) = self.get(&key) {
            debug!(key = %key, "cache hit");
            return Ok(value);
        }

        debug!(key = %key, "cache miss");
        let value = compute().await?;
        self.insert(key, value.clone(), ttl);
        Ok(value)
    }
}

impl<V: Clone> Default for TtlCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Clone for TtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: Arc::clone(&self.entries),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_key_space() {
        assert_eq!(CacheKey::Index.to_string(), "index:all");
        assert_eq!(CacheKey::CategoryLabel(7).to_string(), "category:label:7");
        assert_eq!(
            CacheKey::CategoryMembers(12).to_string(),
            "category:members:12"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire() {
        let cache = TtlCache::new();
        cache.insert(CacheKey::CategoryLabel(1), "Seed", Duration::from_secs(10));
        assert_eq!(cache.get(&CacheKey::CategoryLabel(1)), Some("Seed"));

        tokio::time::advance(Duration::from_secs(11)).await;
        assert_eq!(cache.get(&CacheKey::CategoryLabel(1)), None);
        assert!(cache.contains(&CacheKey::CategoryLabel(1)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_computes_once_while_fresh() {
        let cache: TtlCache<u32> = TtlCache::new();
        let calls = AtomicUsize::new(0);
        let ttl = Duration::from_secs(60);

        for _ in 0..3 {
            let value = cache
                .get_or_try_insert_with(CacheKey::Index, ttl, || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(42)
                })
                .await;
            assert_eq!(value, Ok(42));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        let _ = cache
            .get_or_try_insert_with(CacheKey::Index, ttl, || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(43)
            })
            .await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.get(&CacheKey::Index), Some(43));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_compute_keeps_previous_entry() {
        let cache: TtlCache<&str> = TtlCache::new();
        let ttl = Duration::from_secs(60);
        cache.insert(CacheKey::Index, "good", ttl);

        tokio::time::advance(Duration::from_secs(61)).await;
        let result = cache
            .get_or_try_insert_with(CacheKey::Index, ttl, || async { Err::<&str, _>("boom") })
            .await;
        assert_eq!(result, Err("boom"));

        // The stale entry is still the stored one; nothing empty replaced it.
        let guard = cache.entries.read();
        assert_eq!(guard.get(&CacheKey::Index).map(|e| e.value), Some("good"));
    }

    #[tokio::test]
    async fn test_keys_are_independent() {
        let cache: TtlCache<u32> = TtlCache::new();
        let ttl = Duration::from_secs(60);
        cache.insert(CacheKey::CategoryMembers(1), 1, ttl);
        cache.insert(CacheKey::CategoryMembers(2), 2, ttl);

        assert_eq!(cache.get(&CacheKey::CategoryMembers(1)), Some(1));
        assert_eq!(cache.get(&CacheKey::CategoryMembers(2)), Some(2));
        assert_eq!(cache.get(&CacheKey::CategoryLabel(1)), None);
    }
}
