//! Thread-Safe Storage Engine with Expiry Support
//!
//! A concurrent map from key to value with an optional absolute expiry time.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Instead of one big lock, we use multiple shards to reduce contention.
//! 2. **Lazy Expiry**: Every read re-checks the deadline, plus background cleanup.
//! 3. **RwLock**: Allows multiple concurrent readers with exclusive writers.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ HashMap │ │ HashMap │ │ HashMap │ │ HashMap │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A key always maps to the same shard, so every operation on one key is
//! serialized by that shard's lock. Operations on different keys are not
//! coordinated with each other.

use bytes::Bytes;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// A stored value with optional expiry time.
#[derive(Debug, Clone)]
pub struct Entry {
    /// The actual value stored
    pub value: Bytes,
    /// When this entry expires (None = never expires)
    pub expires_at: Option<Instant>,
}

impl Entry {
    /// Creates an entry that expires `ttl` from now, or never if `ttl` is `None`.
    ///
    /// A deadline too far away to represent is treated as no deadline.
    pub fn new(value: Bytes, ttl: Option<Duration>) -> Self {
        Self {
            value,
            expires_at: ttl.and_then(|ttl| Instant::now().checked_add(ttl)),
        }
    }

    /// Checks if this entry has expired as of `now`.
    #[inline]
    pub fn is_expired_at(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|exp| exp <= now)
    }

    /// Checks if this entry has expired.
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Instant::now())
    }
}

/// A single shard containing a portion of the key-value pairs.
#[derive(Debug, Default)]
struct Shard {
    data: RwLock<HashMap<Bytes, Entry>>,
}

/// Snapshot of the engine's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageStats {
    /// Number of keys currently stored (including expired, unswept ones)
    pub keys: u64,
    /// Total GET operations
    pub get_ops: u64,
    /// Total SET operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
    /// Total expired keys removed, lazily or by the sweeper
    pub expired: u64,
}

/// The key-value store shared by every connection and the sweeper.
///
/// # Thread Safety
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all client handler tasks. All operations are thread-safe.
///
/// # Example
///
/// ```
/// use respkv::storage::StorageEngine;
/// use bytes::Bytes;
/// use std::time::Duration;
///
/// let engine = StorageEngine::new();
///
/// engine.set(Bytes::from("name"), Bytes::from("Ariz"), None);
/// assert_eq!(engine.get(&Bytes::from("name")), Some(Bytes::from("Ariz")));
///
/// engine.set(Bytes::from("session"), Bytes::from("abc123"), Some(Duration::from_secs(60)));
/// assert!(engine.get(&Bytes::from("session")).is_some());
/// ```
pub struct StorageEngine {
    shards: Vec<Shard>,
    key_count: AtomicU64,
    get_count: AtomicU64,
    set_count: AtomicU64,
    del_count: AtomicU64,
    expired_count: AtomicU64,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
            .field("key_count", &self.key_count.load(Ordering::Relaxed))
            .field("get_count", &self.get_count.load(Ordering::Relaxed))
            .field("set_count", &self.set_count.load(Ordering::Relaxed))
            .finish()
    }
}

impl Default for StorageEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl StorageEngine {
    /// Creates a new, empty storage engine.
    pub fn new() -> Self {
        let shards = (0..NUM_SHARDS).map(|_| Shard::default()).collect();

        Self {
            shards,
            key_count: AtomicU64::new(0),
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
        }
    }

    #[inline]
    fn shard_index(&self, key: &[u8]) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    #[inline]
    fn get_shard(&self, key: &[u8]) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Inserts or overwrites `key`.
    ///
    /// Any previous value and deadline are replaced, never merged. With
    /// `ttl = None` the entry never expires.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&self, key: Bytes, value: Bytes, ttl: Option<Duration>) -> bool {
        self.set_count.fetch_add(1, Ordering::Relaxed);

        let entry = Entry::new(value, ttl);
        let shard = self.get_shard(&key);
        let mut data = shard.data.write().unwrap();

        let is_new = data.insert(key, entry).is_none();
        if is_new {
            self.key_count.fetch_add(1, Ordering::Relaxed);
        }

        is_new
    }

    /// Gets the value for a key.
    ///
    /// Returns `None` if the key doesn't exist or has expired. An expired
    /// entry is removed before this returns.
    pub fn get(&self, key: &Bytes) -> Option<Bytes> {
        self.get_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);

        // Fast path: read lock for live keys and misses
        {
            let data = shard.data.read().unwrap();
            match data.get(key) {
                Some(entry) if !entry.is_expired() => return Some(entry.value.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut data = shard.data.write().unwrap();
        if let Some(entry) = data.get(key) {
            if entry.is_expired() {
                data.remove(key);
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                self.expired_count.fetch_add(1, Ordering::Relaxed);
                return None;
            }
            // Another writer replaced the entry between the two locks
            return Some(entry.value.clone());
        }

        None
    }

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if a live key was deleted, `false` if it didn't exist
    /// or had already expired.
    pub fn delete(&self, key: &Bytes) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);

        let shard = self.get_shard(key);
        let mut data = shard.data.write().unwrap();

        match data.remove(key) {
            Some(entry) => {
                self.key_count.fetch_sub(1, Ordering::Relaxed);
                if entry.is_expired() {
                    self.expired_count.fetch_add(1, Ordering::Relaxed);
                    false
                } else {
                    true
                }
            }
            None => false,
        }
    }

    /// Removes every entry whose deadline has passed.
    ///
    /// Shards are locked one at a time, so readers and writers on other
    /// shards keep running while a sweep is in progress.
    ///
    /// # Returns
    ///
    /// The number of entries removed.
    pub fn sweep_expired(&self) -> u64 {
        let mut cleaned = 0u64;

        for shard in &self.shards {
            let mut data = shard.data.write().unwrap();
            let before = data.len();

            let now = Instant::now();
            data.retain(|_, entry| !entry.is_expired_at(now));

            cleaned += (before - data.len()) as u64;
        }

        if cleaned > 0 {
            self.key_count.fetch_sub(cleaned, Ordering::Relaxed);
            self.expired_count.fetch_add(cleaned, Ordering::Relaxed);
        }

        cleaned
    }

    /// Number of stored entries, including expired ones not yet removed.
    pub fn len(&self) -> u64 {
        self.key_count.load(Ordering::Relaxed)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.key_count.load(Ordering::Relaxed),
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
        }
    }

    /// Returns a copy of the raw entry, without any expiry check.
    ///
    /// Used to observe whether the sweeper has physically removed a key.
    pub fn peek_entry(&self, key: &Bytes) -> Option<Entry> {
        let shard = self.get_shard(key);
        let data = shard.data.read().unwrap();
        data.get(key).cloned()
    }
}
