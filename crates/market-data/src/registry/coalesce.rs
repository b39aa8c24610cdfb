//! Per-key request coalescing.
//!
//! Concurrent cache misses for the same key queue on one async lock; the
//! first caller walks the sources and fills the cache, the others re-check
//! the cache once they get the lock.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use log::warn;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Holders of a slot: the map entry, the guard's handle and the owned lock.
const HOLDERS_WHEN_UNCONTENDED: usize = 3;

#[derive(Default)]
pub(crate) struct RequestCoalescer {
    slots: Mutex<HashMap<String, Arc<AsyncMutex<()>>>>,
}

impl RequestCoalescer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<String, Arc<AsyncMutex<()>>>> {
        self.slots.lock().unwrap_or_else(|poisoned| {
            warn!("Request coalescer mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Wait until no other caller holds `key`.
    pub(crate) async fn acquire(&self, key: &str) -> CoalesceGuard<'_> {
        let slot = {
            let mut slots = self.lock_slots();
            slots
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let held = slot.clone().lock_owned().await;
        CoalesceGuard {
            owner: self,
            key: key.to_string(),
            slot,
            _held: held,
        }
    }

    #[cfg(test)]
    fn slot_count(&self) -> usize {
        self.lock_slots().len()
    }
}

/// Held while a caller fills the cache for one key.
pub(crate) struct CoalesceGuard<'a> {
    owner: &'a RequestCoalescer,
    key: String,
    slot: Arc<AsyncMutex<()>>,
    _held: OwnedMutexGuard<()>,
}

impl Drop for CoalesceGuard<'_> {
    fn drop(&mut self) {
        // Waiters hold their own handle, so the count only drops to the
        // uncontended value once nobody is queued.
        let mut slots = self.owner.lock_slots();
        if Arc::strong_count(&self.slot) <= HOLDERS_WHEN_UNCONTENDED {
            slots.remove(&self.key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_slot_removed_after_release() {
        let coalescer = RequestCoalescer::new();
        {
            let _guard = coalescer.acquire("quotes:VALE3").await;
            assert_eq!(coalescer.slot_count(), 1);
        }
        assert_eq!(coalescer.slot_count(), 0);
    }

    #[tokio::test]
    async fn test_same_key_is_serialized() {
        let coalescer = Arc::new(RequestCoalescer::new());
        let active = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..4 {
            let coalescer = coalescer.clone();
            let active = active.clone();
            let peak = peak.clone();
            handles.push(tokio::spawn(async move {
                let _guard = coalescer.acquire("movers:top").await;
                let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(5)).await;
                active.fetch_sub(1, Ordering::SeqCst);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(peak.load(Ordering::SeqCst), 1);
        assert_eq!(coalescer.slot_count(), 0);
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block() {
        let coalescer = RequestCoalescer::new();
        let _a = coalescer.acquire("quotes:A").await;
        let _b = coalescer.acquire("quotes:B").await;
        assert_eq!(coalescer.slot_count(), 2);
    }
}
