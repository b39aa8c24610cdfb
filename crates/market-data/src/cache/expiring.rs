use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use log::debug;

use super::clock::{Clock, SystemClock};

#[derive(Debug)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
}

/// Concurrent key/value cache with per-entry absolute expiry.
///
/// An entry is valid while `now < expires_at`. Expired entries are dropped
/// lazily when read, or in bulk by [`purge_expired`](Self::purge_expired).
/// Writes are last-writer-wins with no version check.
pub struct ExpiringCache<V> {
    entries: DashMap<String, Entry<V>>,
    clock: Arc<dyn Clock>,
}

impl<V: Clone> ExpiringCache<V> {
    /// Create a cache driven by the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Returns the stored value if present and not expired.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_with_remaining(key).map(|(value, _)| value)
    }

    /// Like [`get`](Self::get), also returning how long the entry stays valid.
    pub fn get_with_remaining(&self, key: &str) -> Option<(V, Duration)> {
        let now = self.clock.now();

        match self.entries.get(key) {
            Some(entry) if now < entry.expires_at => {
                return Some((entry.value.clone(), entry.expires_at - now))
            }
            Some(_) => {}
            None => return None,
        }

        // Re-check under the write lock: another writer may have refreshed it.
        if self
            .entries
            .remove_if(key, |_, entry| now >= entry.expires_at)
            .is_some()
        {
            debug!("Cache: evicted expired entry '{}'", key);
        }
        None
    }

    /// Store `value` under `key` until `now + ttl`, replacing any prior entry.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        let expires_at = self.clock.now() + ttl;
        self.entries.insert(key.into(), Entry { value, expires_at });
    }

    pub fn invalidate(&self, key: &str) {
        self.entries.remove(key);
    }

    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of stored entries, including expired ones not yet evicted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop every expired entry. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.expires_at);
        let removed = before.saturating_sub(self.entries.len());
        if removed > 0 {
            debug!("Cache: purged {} expired entries", removed);
        }
        removed
    }
}

impl<V: Clone> Default for ExpiringCache<V> {
    fn default() -> Self {
        Self::new()
    }
}
