//! Two-tier request-result cache for backstop.
//!
//! Results are memoized under a deterministic key derived from the full
//! URL and the sorted request parameters, so semantically identical
//! requests collide no matter how their parameter maps were built.
//!
//! Entries live in a bounded in-memory tier (an LRU mirror) and an
//! unbounded persistent tier behind the [`CacheStorage`] collaborator.
//! The memory tier is strictly a cache of the persistent tier: reads
//! promote, writes go to both.
//!
//! A cache write failure must never fail the request it is attached to:
//! storage errors on write are logged and swallowed, and storage errors on
//! read are treated as misses.
//!
//! ```
//! use backstop_cache::{CacheStore, MemoryStorage};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let store = CacheStore::new(64, Arc::new(MemoryStorage::default()));
//! store.put("key", b"payload".to_vec(), Duration::ZERO); // 0 = never expires
//! assert_eq!(store.get("key").unwrap().payload, b"payload");
//! ```

mod entry;
mod key;
mod storage;
mod store;

pub use entry::CacheEntry;
pub use key::cache_key;
pub use storage::{CacheStorage, DirStorage, MemoryStorage};
pub use store::CacheStore;
