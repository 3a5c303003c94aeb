//! Sharded Key-Value Store with Expiry Support
//!
//! This module implements the storage core of vitalgrid: a concurrency-safe,
//! in-memory map with TTL (Time-To-Live) support, partitioned into
//! independently-locked shards.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: One global lock serializes every writer regardless of
//!    key independence; N shard locks bound contention to 1/N of the keyspace.
//! 2. **Stable Routing**: A key's shard is a pure function of the key (FNV-1a
//!    hash, masked), fixed for the process lifetime.
//! 3. **Lazy Expiry**: Entries are checked for expiry on access; the
//!    [`Reaper`](crate::store::Reaper) reclaims the rest in the background.
//! 4. **Immutable Values**: Values are `Bytes`: callers get a cheap handle to
//!    shared immutable data, and mutation only happens by replacing the entry
//!    wholesale via `set`.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                         Store                               │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads take a shard's read lock; inserts and removals take its write lock.
//! Operations on keys in different shards never contend.

use bytes::Bytes;
use fnv::FnvHasher;
use std::collections::HashMap;
use std::hash::Hasher;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Default number of shards when none is configured.
/// More shards = less lock contention, but more memory overhead.
pub const DEFAULT_SHARD_COUNT: usize = 64;

/// Errors produced by store operations.
///
/// The store has exactly one rejectable input: an empty key. Missing keys,
/// expired keys, and idempotent deletes are not errors.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The caller passed an empty key.
    #[error("key must not be empty")]
    EmptyKey,
}

/// A stored value together with its expiry metadata.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The stored payload.
    pub value: Bytes,
    /// When this entry expires (None = never expires).
    pub expires_at: Option<Instant>,
    /// When this entry was created.
    pub created_at: Instant,
}

impl Entry {
    /// Creates a new entry without expiry.
    pub fn new(value: Bytes) -> Self {
        Self {
            value,
            expires_at: None,
            created_at: Instant::now(),
        }
    }

    /// Creates a new entry that expires `ttl` from now.
    pub fn with_ttl(value: Bytes, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value,
            expires_at: Some(now + ttl),
            created_at: now,
        }
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.expires_at
            .map(|exp| Instant::now() >= exp)
            .unwrap_or(false)
    }

    /// Returns the remaining TTL, or None if the entry never expires.
    pub fn ttl_remaining(&self) -> Option<Duration> {
        self.expires_at.map(|exp| {
            let now = Instant::now();
            if now >= exp {
                Duration::ZERO
            } else {
                exp - now
            }
        })
    }
}

/// A single shard owning a partition of the keyspace.
#[derive(Debug, Default)]
struct Shard {
    entries: RwLock<HashMap<String, Entry>>,
}

/// The sharded in-memory store.
///
/// This is the passive core of the engine: it holds all entries and is
/// invoked from many concurrent callers (pipeline workers, direct readers,
/// the reaper). Wrap it in an `Arc` and share it freely.
///
/// # Example
///
/// ```
/// use vitalgrid::store::Store;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let store = Store::new(4);
///
/// store.set("patient:42", Bytes::from("vitals")).unwrap();
/// assert_eq!(store.get("patient:42"), Some(Bytes::from("vitals")));
///
/// // Values can carry a TTL
/// store
///     .set_with_ttl("session:abc", Bytes::from("token"), Duration::from_secs(60))
///     .unwrap();
/// ```
pub struct Store {
    /// Sharded storage for reduced lock contention.
    shards: Vec<Shard>,

    /// Bitmask for routing (shard count is a power of two).
    shard_mask: usize,

    /// Statistics: number of keys currently stored (approximate).
    key_count: AtomicU64,

    /// Statistics: total get operations.
    get_count: AtomicU64,

    /// Statistics: total set operations.
    set_count: AtomicU64,

    /// Statistics: total delete operations.
    del_count: AtomicU64,

    /// Statistics: expired entries removed (lazily or by the reaper).
    expired_count: AtomicU64,
}

impl std::fmt::Debug for Store {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Store")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for Store {
    fn default() -> Self {
        Self::new(DEFAULT_SHARD_COUNT)
    }
}

impl Store {
    /// Creates a new store with the requested number of shards.
    ///
    /// The count is clamped to at least 1 and rounded up to the next power of
    /// two so routing can use a mask instead of a modulo. The shard count is
    /// fixed for the lifetime of the store; resizing would require rehashing
    /// every key and is deliberately unsupported.
    pub fn new(shard_count: usize) -> Self {
        let shard_count = shard_count.max(1).next_power_of_two();
        let shards = (0..shard_count).map(|_| Shard::default()).collect();

        Self {
            shards,
            shard_mask: shard_count - 1,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    /// Returns the number of shards (always a power of two).
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Determines which shard a key belongs to.
    ///
    /// FNV-1a over the key bytes, masked down to the shard range. Pure
    /// function of the key: the same key always routes to the same shard.
    #[inline]
    pub fn shard_index(&self, key: &str) -> usize {
        let mut hasher = FnvHasher::default();
        hasher.write(key.as_bytes());
        (hasher.finish() as usize) & self.shard_mask
    }

    /// Gets the shard for a given key.
    #[inline]
    fn shard_for(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Stores a value under a key without expiry.
    ///
    /// Overwrites any existing entry for the key.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if a new key was created, `Ok(false)` if an existing key
    /// was overwritten. Fails only on an empty key.
    pub fn set(&self, key: impl Into<String>, value: Bytes) -> Result<bool, StoreError> {
        self.insert_entry(key.into(), Entry::new(value))
    }

    /// Stores a value under a key with a TTL.
    ///
    /// A zero TTL means "never expires", matching `set`.
    ///
    /// # Returns
    ///
    /// `Ok(true)` if a new key was created, `Ok(false)` if an existing key
    /// was overwritten. Fails only on an empty key.
    pub fn set_with_ttl(
        &self,
        key: impl Into<String>,
        value: Bytes,
        ttl: Duration,
    ) -> Result<bool, StoreError> {
        let entry = if ttl.is_zero() {
            Entry::new(value)
        } else {
            Entry::with_ttl(value, ttl)
        };
        self.insert_entry(key.into(), entry)
    }

    fn insert_entry(&self, key: String, entry: Entry) -> Result<bool, StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyKey);
        }

        self.set_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard_for(&key);
        let mut entries = shard.entries.write().unwrap();

        let is_new = !entries.contains_key(&key);
        entries.insert(key, entry);

        if is_new {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        Ok(is_new)
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. Expired
    /// entries are removed on access ("lazy eviction"), so an expired value
    /// is never observable even before the reaper has swept it.
    pub fn get(&self, key: &str) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard_for(key);

        // Fast path: read lock for live entries.
        {
            let entries = shard.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        // Key exists but is expired - upgrade to a write lock to remove it.
        let mut entries = shard.entries.write().unwrap();
        if let Some(entry) = entries.get(key) {
            if entry.is_expired() {
                entries.remove(key);
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            // Race: another caller replaced the key between the two locks.
            return Some(entry.value.clone());
        }

        None
    }

    /// Gets the full entry for a key, including expiry metadata.
    ///
    /// Useful for callers that need the remaining TTL rather than just the
    /// value. Subject to the same lazy eviction as `get`.
    pub fn get_entry(&self, key: &str) -> Option<Entry> {
        let shard = self.shard_for(key);

        {
            let entries = shard.entries.read().unwrap();
            match entries.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = shard.entries.write().unwrap();
        if let Some(entry) = entries.get(key) {
            if entry.is_expired() {
                entries.remove(key);
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            return Some(entry.clone());
        }

        None
    }

    /// Deletes a key.
    ///
    /// Idempotent: deleting a missing key is not an error.
    ///
    /// # Returns
    ///
    /// `true` if the key was present, `false` otherwise.
    pub fn delete(&self, key: &str) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.shard_for(key);
        let mut entries = shard.entries.write().unwrap();

        if entries.remove(key).is_some() {
            self.key_count.fetch_sub(1, Ordering::Relaxed);
            true
        } else {
            false
        }
    }

    /// Checks if a key exists and is not expired.
    pub fn exists(&self, key: &str) -> bool {
        let shard = self.shard_for(key);
        let entries = shard.entries.read().unwrap();

        entries.get(key).map(|e| !e.is_expired()).unwrap_or(false)
    }

    /// Removes all entries from every shard.
    pub fn clear(&self) {
        for shard in &self.shards {
            let mut entries = shard.entries.write().unwrap();
            entries.clear();
        }
        self.key_count.store(0, Ordering::Relaxed);
    }

    /// Returns the approximate number of keys currently stored.
    ///
    /// Approximate because the counter uses relaxed atomic ordering.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    /// Returns true if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns operation statistics.
    pub fn stats(&self) -> StoreStats {
        StoreStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Removes expired entries from every shard.
    ///
    /// This is the reaper's entry point; lazy eviction alone never reclaims a
    /// key that is written once and never read again.
    ///
    /// Each shard is swept in isolation: a panic while sweeping one shard is
    /// caught and reported so the remaining shards still get swept.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    pub fn sweep_expired(&self) -> u64 {
        let mut cleaned = 0u64;

        for (index, shard) in self.shards.iter().enumerate() {
            let swept = panic::catch_unwind(AssertUnwindSafe(|| {
                let mut entries = shard.entries.write().unwrap();
                let before = entries.len();
                entries.retain(|_, entry| !entry.is_expired());
                (before - entries.len()) as u64
            }));

            match swept {
                Ok(removed) => cleaned += removed,
                Err(_) => {
                    tracing::error!(shard = index, "Sweep of shard panicked; skipping it");
                }
            }
        }

        if cleaned > 0 {
            self.key_count.fetch_sub(cleaned, Ordering::Relaxed);
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }

        cleaned
    }
}

/// Store operation statistics.
#[derive(Debug, Clone, Copy)]
pub struct StoreStats {
    /// Number of keys currently stored.
    pub keys: u64,
    /// Total get operations.
    pub get_ops: u64,
    /// Total set operations.
    pub set_ops: u64,
    /// Total delete operations.
    pub del_ops: u64,
    /// Total expired entries removed.
    pub expired: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_and_get() {
        let store = Store::new(4);

        store.set("key", Bytes::from("value")).unwrap();
        assert_eq!(store.get("key"), Some(Bytes::from("value")));
    }

    #[test]
    fn test_get_nonexistent() {
        let store = Store::new(4);
        assert_eq!(store.get("nonexistent"), None);
    }

    #[test]
    fn test_empty_key_rejected() {
        let store = Store::new(4);
        assert_eq!(
            store.set("", Bytes::from("value")),
            Err(StoreError::EmptyKey)
        );
        assert_eq!(
            store.set_with_ttl("", Bytes::from("value"), Duration::from_secs(1)),
            Err(StoreError::EmptyKey)
        );
    }

    #[test]
    fn test_overwrite_reports_existing() {
        let store = Store::new(4);

        assert!(store.set("key", Bytes::from("v1")).unwrap());
        assert!(!store.set("key", Bytes::from("v2")).unwrap());
        assert_eq!(store.get("key"), Some(Bytes::from("v2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_delete_is_idempotent() {
        let store = Store::new(4);

        store.set("key", Bytes::from("value")).unwrap();
        assert!(store.delete("key"));
        assert_eq!(store.get("key"), None);
        assert!(!store.delete("key")); // Already gone
    }

    #[test]
    fn test_exists() {
        let store = Store::new(4);

        assert!(!store.exists("key"));
        store.set("key", Bytes::from("value")).unwrap();
        assert!(store.exists("key"));
    }

    #[test]
    fn test_shard_count_rounds_to_power_of_two() {
        assert_eq!(Store::new(1).shard_count(), 1);
        assert_eq!(Store::new(3).shard_count(), 4);
        assert_eq!(Store::new(4).shard_count(), 4);
        assert_eq!(Store::new(60).shard_count(), 64);
        assert_eq!(Store::new(0).shard_count(), 1);
    }

    #[test]
    fn test_shard_index_is_stable() {
        let store = Store::new(8);

        for key in ["a", "b", "patient:42", "a-much-longer-key-for-routing"] {
            let first = store.shard_index(key);
            for _ in 0..100 {
                assert_eq!(store.shard_index(key), first);
            }
            assert!(first < store.shard_count());
        }
    }

    #[test]
    fn test_expired_entry_never_returned() {
        let store = Store::new(4);

        store
            .set_with_ttl("key", Bytes::from("value"), Duration::from_millis(50))
            .unwrap();

        // Live immediately after the set
        assert_eq!(store.get("key"), Some(Bytes::from("value")));

        std::thread::sleep(Duration::from_millis(80));

        // Gone even though no reaper is running: lazy eviction
        assert_eq!(store.get("key"), None);
        assert!(!store.exists("key"));
    }

    #[test]
    fn test_zero_ttl_means_no_expiry() {
        let store = Store::new(4);

        store
            .set_with_ttl("key", Bytes::from("value"), Duration::ZERO)
            .unwrap();

        let entry = store.get_entry("key").unwrap();
        assert!(entry.expires_at.is_none());
        assert!(entry.ttl_remaining().is_none());
    }

    #[test]
    fn test_ttl_remaining() {
        let store = Store::new(4);

        store
            .set_with_ttl("key", Bytes::from("value"), Duration::from_secs(100))
            .unwrap();

        let remaining = store.get_entry("key").unwrap().ttl_remaining().unwrap();
        assert!(remaining > Duration::from_secs(90));
        assert!(remaining <= Duration::from_secs(100));
    }

    #[test]
    fn test_overwrite_replaces_ttl() {
        let store = Store::new(4);

        store
            .set_with_ttl("key", Bytes::from("old"), Duration::from_millis(30))
            .unwrap();
        store.set("key", Bytes::from("new")).unwrap();

        std::thread::sleep(Duration::from_millis(60));

        // The overwrite dropped the old expiry along with the old value
        assert_eq!(store.get("key"), Some(Bytes::from("new")));
    }

    #[test]
    fn test_sweep_expired() {
        let store = Store::new(4);

        store
            .set_with_ttl("key1", Bytes::from("v1"), Duration::from_millis(10))
            .unwrap();
        store
            .set_with_ttl("key2", Bytes::from("v2"), Duration::from_millis(10))
            .unwrap();
        store.set("key3", Bytes::from("v3")).unwrap(); // No expiry

        std::thread::sleep(Duration::from_millis(50));

        let cleaned = store.sweep_expired();
        assert_eq!(cleaned, 2);
        assert_eq!(store.len(), 1);
        assert!(store.exists("key3"));
    }

    #[test]
    fn test_sweep_survives_poisoned_shard() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(Store::new(4));

        // One expired key per shard
        let mut keys: Vec<Option<String>> = vec![None; store.shard_count()];
        let mut i = 0;
        while keys.iter().any(|k| k.is_none()) {
            let key = format!("key{}", i);
            let idx = store.shard_index(&key);
            if keys[idx].is_none() {
                store
                    .set_with_ttl(&*key, Bytes::from("value"), Duration::from_millis(10))
                    .unwrap();
                keys[idx] = Some(key);
            }
            i += 1;
        }

        std::thread::sleep(Duration::from_millis(40));

        // Poison shard 0's lock: panic while holding its write guard
        {
            let store = Arc::clone(&store);
            let _ = thread::spawn(move || {
                let _guard = store.shards[0].entries.write().unwrap();
                panic!("shard 0 writer died");
            })
            .join();
        }

        // Sweeping the poisoned shard panics; the sweep catches it and
        // still reclaims the expired entries in every other shard.
        let cleaned = store.sweep_expired();
        assert_eq!(cleaned, store.shard_count() as u64 - 1);

        // Shards other than the poisoned one stay fully usable
        let key = keys[1].take().unwrap();
        store.set(&*key, Bytes::from("fresh")).unwrap();
        assert_eq!(store.get(&key), Some(Bytes::from("fresh")));
    }

    #[test]
    fn test_clear() {
        let store = Store::new(4);

        store.set("key1", Bytes::from("v1")).unwrap();
        store.set("key2", Bytes::from("v2")).unwrap();
        assert_eq!(store.len(), 2);

        store.clear();

        assert_eq!(store.len(), 0);
        assert!(store.is_empty());
    }

    #[test]
    fn test_stats() {
        let store = Store::new(4);

        store.set("key", Bytes::from("value")).unwrap();
        store.get("key");
        store.get("missing");
        store.delete("key");

        let stats = store.stats();
        assert_eq!(stats.set_ops, 1);
        assert_eq!(stats.get_ops, 2);
        assert_eq!(stats.del_ops, 1);
        assert_eq!(stats.keys, 0);
    }

    #[test]
    fn test_concurrent_writes_across_shards() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(Store::new(4));
        let mut handles = vec![];

        // One writer per key, all running at once
        for key in ["a", "b", "c", "d"] {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                store
                    .set(key, Bytes::from(format!("value-{}", key)))
                    .unwrap();
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        for key in ["a", "b", "c", "d"] {
            assert_eq!(store.get(key), Some(Bytes::from(format!("value-{}", key))));
        }
    }

    #[test]
    fn test_concurrent_access() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(Store::new(16));
        let mut handles = vec![];

        for i in 0..10 {
            let store = Arc::clone(&store);
            handles.push(thread::spawn(move || {
                for j in 0..100 {
                    let key = format!("key-{}-{}", i, j);
                    store.set(key.clone(), Bytes::from("value")).unwrap();
                    store.get(&key);
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 1000);
    }
}
