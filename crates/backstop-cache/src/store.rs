use crate::entry::CacheEntry;
use crate::storage::CacheStorage;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// The two-tier cache store.
///
/// The memory tier is a bounded LRU mirror of the persistent tier: any
/// entry present in memory is value-identical to the corresponding
/// persistent entry (writes go to both, reads promote the persisted
/// value). Invalid entries are evicted from whichever tier they were
/// found in.
pub struct CacheStore {
    memory: Mutex<LruCache<String, CacheEntry>>,
    persistent: Arc<dyn CacheStorage>,
}

impl CacheStore {
    /// `memory_capacity` bounds the in-memory tier (entries, not bytes).
    pub fn new(memory_capacity: usize, persistent: Arc<dyn CacheStorage>) -> Self {
        let capacity = NonZeroUsize::new(memory_capacity.max(1)).unwrap();
        Self {
            memory: Mutex::new(LruCache::new(capacity)),
            persistent,
        }
    }

    /// Returns the valid entry for `key`, if any.
    ///
    /// Memory is consulted first; a stale memory entry is evicted before
    /// the persistent tier is tried. A valid persistent entry is promoted
    /// into memory. Persistent read errors and undecodable envelopes are
    /// treated as misses.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        {
            let mut memory = self.memory.lock().unwrap();
            if let Some(entry) = memory.get(key) {
                if entry.is_valid() {
                    return Some(entry.clone());
                }
                memory.pop(key);
            }
        }

        let bytes = match self.persistent.read(key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return None,
            Err(e) => {
                tracing::debug!(key, error = %e, "persistent cache read failed");
                return None;
            }
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::debug!(key, error = %e, "discarding undecodable cache entry");
                self.delete_persistent(key);
                return None;
            }
        };

        if entry.is_valid() {
            self.memory
                .lock()
                .unwrap()
                .put(key.to_string(), entry.clone());
            Some(entry)
        } else {
            self.delete_persistent(key);
            None
        }
    }

    /// Writes `payload` to both tiers, overwriting any previous entry.
    ///
    /// A persistent-tier write failure is logged and swallowed; it must
    /// never fail the request the write is attached to.
    pub fn put(&self, key: &str, payload: Vec<u8>, max_age: Duration) {
        let entry = CacheEntry::new(payload, max_age);
        match serde_json::to_vec(&entry) {
            Ok(bytes) => {
                if let Err(e) = self.persistent.write(key, &bytes) {
                    tracing::warn!(key, error = %e, "persistent cache write failed");
                }
            }
            Err(e) => {
                tracing::warn!(key, error = %e, "cache entry serialization failed");
            }
        }
        self.memory.lock().unwrap().put(key.to_string(), entry);
    }

    /// Removes `key` from both tiers.
    pub fn remove(&self, key: &str) {
        self.memory.lock().unwrap().pop(key);
        self.delete_persistent(key);
    }

    /// Empties both tiers.
    pub fn clear(&self) {
        self.memory.lock().unwrap().clear();
        if let Err(e) = self.persistent.clear() {
            tracing::warn!(error = %e, "persistent cache clear failed");
        }
    }

    /// Entries currently held by the memory tier.
    pub fn memory_len(&self) -> usize {
        self.memory.lock().unwrap().len()
    }

    fn delete_persistent(&self, key: &str) {
        if let Err(e) = self.persistent.delete(key) {
            tracing::warn!(key, error = %e, "persistent cache delete failed");
        }
    }
}
