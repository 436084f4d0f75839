//! Process-local, size-capped, short-TTL cache.
//!
//! Backs the L1 tier of `SessionStore`, `RoleCache`, and `PermissionCache`.
//! Deliberately dumb: a `DashMap` keyed by string with an expiry `Instant`
//! per entry and a hard cap on entry count. No LRU bookkeeping — at this
//! TTL (seconds, not minutes) and cap (100k), eviction-on-insert of an
//! arbitrary stale-looking entry is enough to bound memory.

use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Bounded, TTL-expiring in-memory cache shared behind an `Arc`.
pub struct BoundedTtlCache<V: Clone> {
    entries: Arc<DashMap<String, Entry<V>>>,
    ttl: Duration,
    max_entries: usize,
}

impl<V: Clone> BoundedTtlCache<V> {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Fetch a live value, removing and returning `None` if it has expired.
    pub fn get(&self, key: &str) -> Option<V> {
        let expired = match self.entries.get(key) {
            Some(entry) => entry.expires_at <= Instant::now(),
            None => return None,
        };
        if expired {
            self.entries.remove(key);
            return None;
        }
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Insert or refresh a value with this cache's configured TTL.
    ///
    /// If at capacity and `key` is new, evicts one arbitrary entry first —
    /// good enough at this TTL/cap combination; see module docs.
    pub fn insert(&self, key: impl Into<String>, value: V) {
        let key = key.into();
        if self.entries.len() >= self.max_entries && !self.entries.contains_key(&key) {
            if let Some(evict_key) = self.entries.iter().next().map(|e| e.key().clone()) {
                self.entries.remove(&evict_key);
            }
        }
        self.entries.insert(
            key,
            Entry {
                value,
                expires_at: Instant::now() + self.ttl,
            },
        );
    }

    /// Remove an entry regardless of TTL, used on invalidation/refresh.
    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<V: Clone> Clone for BoundedTtlCache<V> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            ttl: self.ttl,
            max_entries: self.max_entries,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_and_get_round_trips() {
        let cache: BoundedTtlCache<String> = BoundedTtlCache::new(Duration::from_secs(60), 10);
        cache.insert("k1", "v1".to_string());
        assert_eq!(cache.get("k1"), Some("v1".to_string()));
    }

    #[test]
    fn expired_entries_are_treated_as_absent() {
        let cache: BoundedTtlCache<String> = BoundedTtlCache::new(Duration::from_millis(1), 10);
        cache.insert("k1", "v1".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(cache.get("k1"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_removes_regardless_of_ttl() {
        let cache: BoundedTtlCache<String> = BoundedTtlCache::new(Duration::from_secs(60), 10);
        cache.insert("k1", "v1".to_string());
        cache.invalidate("k1");
        assert_eq!(cache.get("k1"), None);
    }

    #[test]
    fn capacity_cap_is_enforced() {
        let cache: BoundedTtlCache<u32> = BoundedTtlCache::new(Duration::from_secs(60), 3);
        for i in 0..10 {
            cache.insert(format!("k{i}"), i);
        }
        assert!(cache.len() <= 3);
    }
}
