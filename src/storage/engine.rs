//! Thread-Safe Storage Engine with TTL Buckets
//!
//! This module implements the core storage engine for gache.
//! It holds scalar, list and dictionary items and expires them through a
//! reverse index from expiry second to the keys expiring in that second.
//!
//! ## Design Decisions
//!
//! 1. **Sharded Locks**: Keys are spread over 64 partitions, each with its own lock.
//! 2. **One Lock Per Partition**: A partition's primary index and its TTL bucket
//!    index sit behind the same `RwLock`, so they can never disagree.
//! 3. **Bucketed Expiry**: Each finite `expire_at` registers the key in exactly one
//!    bucket. The sweeper pops whole buckets instead of scanning every key.
//! 4. **First Writer Wins**: `set`, `lset` and `dset` only create; `update`,
//!    `lpush` and `dadd` only modify.
//!
//! ## Concurrency Model
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     StorageEngine                           │
//! │  ┌─────────┐ ┌─────────┐ ┌─────────┐ ┌─────────┐           │
//! │  │ Shard 0 │ │ Shard 1 │ │ Shard 2 │ │ Shard N │           │
//! │  │ RwLock  │ │ RwLock  │ │ RwLock  │ │ RwLock  │           │
//! │  │ items   │ │ items   │ │ items   │ │ items   │           │
//! │  │ buckets │ │ buckets │ │ buckets │ │ buckets │           │
//! │  └─────────┘ └─────────┘ └─────────┘ └─────────┘           │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! Reads take the shared lock, every mutation (the sweeper included) takes the
//! exclusive lock for the whole operation.

use crate::storage::item::{make_ttl_stamp, now_epoch, DictSeed, Item, Value};
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use thiserror::Error;
use tracing::{debug, Span};

/// Number of shards for the storage engine.
const NUM_SHARDS: usize = 64;

/// Errors returned by storage operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StorageError {
    /// A create-only operation hit an existing key
    #[error("Key already exists")]
    AlreadyExists,

    /// The key (or dictionary sub-key, or list element) is absent
    #[error("Key not found")]
    NotFound,

    /// A list operation hit a non-list value
    #[error("Key not list")]
    NotList,

    /// A dictionary operation hit a non-dictionary value
    #[error("Key not dict")]
    NotDict,

    /// An expiry query on a key that never expires
    #[error("Key has no expire")]
    NoExpire,

    /// Malformed dictionary arguments
    #[error("Bad argument(s) for hash")]
    BadMap,
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Primary index plus TTL bucket index of one partition.
#[derive(Debug, Default)]
struct ShardState {
    items: HashMap<String, Item>,
    /// expire second -> keys expiring in that second
    buckets: BTreeMap<i64, HashSet<String>>,
}

impl ShardState {
    /// Inserts a new item and registers it in its TTL bucket.
    fn insert(&mut self, item: Item) {
        let key = item.key().to_string();
        if let Some(exp) = item.expire_at() {
            self.buckets.entry(exp).or_default().insert(key.clone());
        }
        self.items.insert(key, item);
    }

    /// Removes a key from both indices.
    fn remove(&mut self, key: &str) -> Option<Item> {
        let item = self.items.remove(key)?;
        if let Some(exp) = item.expire_at() {
            self.unlink(exp, key);
        }
        Some(item)
    }

    fn unlink(&mut self, exp: i64, key: &str) {
        if let Some(bucket) = self.buckets.get_mut(&exp) {
            bucket.remove(key);
            if bucket.is_empty() {
                self.buckets.remove(&exp);
            }
        }
    }

    /// Moves an existing key to the bucket for `expire_at`.
    fn relocate(&mut self, key: &str, expire_at: i64) -> StorageResult<()> {
        let (old, new) = {
            let item = self.items.get_mut(key).ok_or(StorageError::NotFound)?;
            let old = item.expire_at();
            item.set_expire_at(expire_at);
            (old, item.expire_at())
        };

        if old != new {
            if let Some(old) = old {
                self.unlink(old, key);
            }
            if let Some(new) = new {
                self.buckets.entry(new).or_default().insert(key.to_string());
            }
        }
        Ok(())
    }

    /// Drops `key` if its expiry second has been reached.
    fn purge_if_expired(&mut self, key: &str, now: i64) -> bool {
        if self.items.get(key).is_some_and(|item| item.is_expired(now)) {
            self.remove(key);
            true
        } else {
            false
        }
    }

    /// True if the earliest bucket is due at `now`.
    fn has_due(&self, now: i64) -> bool {
        self.buckets
            .first_key_value()
            .is_some_and(|(exp, _)| *exp <= now)
    }

    fn live(&self, key: &str, now: i64) -> Option<&Item> {
        self.items.get(key).filter(|item| !item.is_expired(now))
    }

    /// Removes every key whose bucket second is `<= now`.
    fn expire_due(&mut self, now: i64) -> u64 {
        let due: Vec<i64> = self.buckets.range(..=now).map(|(exp, _)| *exp).collect();
        let mut removed = 0;

        for exp in due {
            let keys: Vec<String> = match self.buckets.get(&exp) {
                Some(bucket) => bucket.iter().cloned().collect(),
                None => continue,
            };
            for key in keys {
                if self.remove(&key).is_some() {
                    removed += 1;
                }
            }
        }

        removed
    }

    fn clear(&mut self) {
        self.items.clear();
        self.buckets.clear();
    }
}

/// A single shard containing a portion of the keys.
#[derive(Debug, Default)]
struct Shard {
    state: RwLock<ShardState>,
}

impl Shard {
    // A panic inside an operation cannot leave the indices half-updated: every
    // mutation completes its map edits before returning, so poisoned state is
    // still consistent.
    fn read(&self) -> RwLockReadGuard<'_, ShardState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, ShardState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The main storage engine for gache.
///
/// This struct is designed to be wrapped in an `Arc` and shared across
/// all connection tasks and the expiry sweeper. All operations are thread-safe
/// and each one holds its partition lock from start to finish.
///
/// # Example
///
/// ```
/// use gache::storage::{StorageEngine, StorageError};
///
/// let engine = StorageEngine::new();
///
/// engine.set("name", "gache", 60).unwrap();
/// assert_eq!(engine.get("name").unwrap().to_string(), "gache");
///
/// // Keys are create-once
/// assert_eq!(engine.set("name", "other", 60), Err(StorageError::AlreadyExists));
/// ```
pub struct StorageEngine {
    /// Sharded storage for reduced lock contention
    shards: Vec<Shard>,

    /// Statistics: total read operations
    get_count: AtomicU64,

    /// Statistics: total successful create/update operations
    set_count: AtomicU64,

    /// Statistics: total delete operations
    del_count: AtomicU64,

    /// Statistics: number of keys removed because they expired
    expired_count: AtomicU64,

    /// Statistics: number of `expire_due` passes
    sweep_count: AtomicU64,

    span: Span,
}

impl std::fmt::Debug for StorageEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageEngine")
            .field("shards", &self.shards.len())
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
            get_count: AtomicU64::new(0),
            set_count: AtomicU64::new(0),
            del_count: AtomicU64::new(0),
            expired_count: AtomicU64::new(0),
            sweep_count: AtomicU64::new(0),
            span: tracing::info_span!("storage"),
        }
    }

    /// Determines which shard a key belongs to.
    #[inline]
    fn shard_index(&self, key: &str) -> usize {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        (hasher.finish() as usize) % NUM_SHARDS
    }

    /// Gets the shard for a given key.
    #[inline]
    fn get_shard(&self, key: &str) -> &Shard {
        &self.shards[self.shard_index(key)]
    }

    /// Runs `op` against the live item for `key` under the exclusive lock.
    ///
    /// An item whose expiry second has passed is purged first and reported
    /// as `NotFound`.
    fn with_live_item<T>(
        &self,
        key: &str,
        op: impl FnOnce(&mut Item) -> StorageResult<T>,
    ) -> StorageResult<T> {
        let now = now_epoch();
        let mut state = self.get_shard(key).write();
        if state.purge_if_expired(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        let item = state.items.get_mut(key).ok_or(StorageError::NotFound)?;
        op(item)
    }

    /// Creates `key` under the exclusive lock unless a live item already exists.
    fn create(
        &self,
        key: &str,
        ttl: i64,
        build: impl FnOnce() -> StorageResult<Value>,
    ) -> StorageResult<()> {
        let now = now_epoch();
        let mut state = self.get_shard(key).write();
        if state.purge_if_expired(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        if state.items.contains_key(key) {
            return Err(StorageError::AlreadyExists);
        }

        let value = build()?;
        state.insert(Item::new(key.to_string(), value, make_ttl_stamp(now, ttl)));
        self.set_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Runs `op` against the live item for `key` under the shared lock.
    fn read_live<T>(
        &self,
        key: &str,
        op: impl FnOnce(&Item) -> StorageResult<T>,
    ) -> StorageResult<T> {
        self.get_count.fetch_add(1, Ordering::Relaxed);
        let now = now_epoch();
        let state = self.get_shard(key).read();
        let item = state.live(key, now).ok_or(StorageError::NotFound)?;
        op(item)
    }

    // ========================================================================
    // SCALAR OPERATIONS
    // ========================================================================

    /// Creates a key with the given value and TTL in seconds.
    ///
    /// A TTL of zero or less means the key never expires.
    /// Fails with `AlreadyExists` if the key is present; the stored value and
    /// TTL are left untouched in that case.
    pub fn set(&self, key: &str, value: impl Into<Value>, ttl: i64) -> StorageResult<()> {
        self.create(key, ttl, || Ok(value.into()))
    }

    /// Overwrites the value and TTL of an existing key.
    pub fn update(&self, key: &str, value: impl Into<Value>, ttl: i64) -> StorageResult<()> {
        let now = now_epoch();
        let mut state = self.get_shard(key).write();
        if state.purge_if_expired(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }

        match state.items.get_mut(key) {
            Some(item) => item.set_value(value.into()),
            None => return Err(StorageError::NotFound),
        }
        state.relocate(key, make_ttl_stamp(now, ttl))?;
        self.set_count.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Returns a copy of the value stored under `key`.
    pub fn get(&self, key: &str) -> StorageResult<Value> {
        self.read_live(key, |item| Ok(item.value().clone()))
    }

    /// Deletes a key from both indices.
    ///
    /// Deleting an absent key is a no-op.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn delete(&self, key: &str) -> bool {
        self.del_count.fetch_add(1, Ordering::Relaxed);
        self.get_shard(key).write().remove(key).is_some()
    }

    // ========================================================================
    // LIST OPERATIONS
    // ========================================================================

    /// Creates a list seeded with `items`, pushed in the given order.
    ///
    /// The last item ends up on top, so it is the first one `lpop` returns.
    pub fn lset<I, V>(&self, key: &str, items: I, ttl: i64) -> StorageResult<()>
    where
        I: IntoIterator<Item = V>,
        V: Into<Bytes>,
    {
        self.create(key, ttl, || {
            Ok(Value::List(items.into_iter().map(Into::into).collect()))
        })
    }

    /// Pushes a value on top of an existing list.
    pub fn lpush(&self, key: &str, value: impl Into<Bytes>) -> StorageResult<()> {
        self.with_live_item(key, |item| match item.value_mut() {
            Value::List(list) => {
                list.push(value.into());
                Ok(())
            }
            other => {
                debug!(parent: &self.span, key, kind = other.type_name(), "LPUSH on non-list");
                Err(StorageError::NotList)
            }
        })
    }

    /// Removes and returns the most recently pushed value.
    ///
    /// An empty list reports `NotFound` and stays in place.
    pub fn lpop(&self, key: &str) -> StorageResult<Bytes> {
        self.with_live_item(key, |item| match item.value_mut() {
            Value::List(list) => list.pop().ok_or(StorageError::NotFound),
            _ => Err(StorageError::NotList),
        })
    }

    /// Returns a copy of the whole list, bottom first.
    pub fn lget(&self, key: &str) -> StorageResult<Vec<Bytes>> {
        self.read_live(key, |item| match item.value() {
            Value::List(list) => Ok(list.clone()),
            _ => Err(StorageError::NotList),
        })
    }

    // ========================================================================
    // DICTIONARY OPERATIONS
    // ========================================================================

    /// Creates a dictionary from a complete mapping or alternating pair tokens.
    ///
    /// `AlreadyExists` is checked before the seed is validated.
    pub fn dset(&self, key: &str, seed: impl Into<DictSeed>, ttl: i64) -> StorageResult<()> {
        let seed: DictSeed = seed.into();
        self.create(key, ttl, || seed.into_map().map(Value::Dict))
    }

    /// Returns the value stored under `subkey` of a dictionary.
    pub fn dget(&self, key: &str, subkey: &str) -> StorageResult<Bytes> {
        let result = self.read_live(key, |item| match item.value() {
            Value::Dict(map) => map.get(subkey).cloned().ok_or(StorageError::NotFound),
            _ => Err(StorageError::NotDict),
        });
        if let Err(e) = &result {
            debug!(parent: &self.span, key, subkey, error = %e, "DGET miss");
        }
        result
    }

    /// Inserts or overwrites `subkey` of an existing dictionary.
    pub fn dadd(&self, key: &str, subkey: &str, value: impl Into<Bytes>) -> StorageResult<()> {
        self.with_live_item(key, |item| match item.value_mut() {
            Value::Dict(map) => {
                map.insert(subkey.to_string(), value.into());
                Ok(())
            }
            other => {
                debug!(parent: &self.span, key, kind = other.type_name(), "DADD on non-dict");
                Err(StorageError::NotDict)
            }
        })
    }

    /// Removes `subkey` from a dictionary.
    ///
    /// Missing keys, missing sub-keys and non-dictionary values are all no-ops.
    ///
    /// # Returns
    ///
    /// Returns `true` if a sub-key was removed.
    pub fn ddel(&self, key: &str, subkey: &str) -> bool {
        self.with_live_item(key, |item| match item.value_mut() {
            Value::Dict(map) => Ok(map.remove(subkey).is_some()),
            _ => Ok(false),
        })
        .unwrap_or(false)
    }

    // ========================================================================
    // TTL OPERATIONS
    // ========================================================================

    /// Resets the TTL of an existing key, moving it to its new bucket.
    pub fn set_ttl(&self, key: &str, ttl: i64) -> StorageResult<()> {
        let now = now_epoch();
        let mut state = self.get_shard(key).write();
        if state.purge_if_expired(key, now) {
            self.expired_count.fetch_add(1, Ordering::Relaxed);
        }
        state.relocate(key, make_ttl_stamp(now, ttl))
    }

    /// Returns the absolute epoch second at which `key` expires.
    pub fn get_expire(&self, key: &str) -> StorageResult<i64> {
        self.read_live(key, |item| item.expire_at().ok_or(StorageError::NoExpire))
    }

    /// Removes every key whose expiry second is `<= now`.
    ///
    /// This is called by the background expiry sweeper once per tick. Passing
    /// the current second also catches up on buckets from ticks that ran late.
    ///
    /// # Returns
    ///
    /// Returns the number of keys that were removed.
    pub fn expire_due(&self, now: i64) -> u64 {
        self.sweep_count.fetch_add(1, Ordering::Relaxed);
        let mut removed = 0;
        for shard in &self.shards {
            // Most ticks find nothing due; only then is the write lock needed
            let due = shard.read().has_due(now);
            if due {
                removed += shard.write().expire_due(now);
            }
        }

        if removed > 0 {
            self.expired_count.fetch_add(removed, Ordering::Relaxed);
            debug!(parent: &self.span, removed, now, "Expired keys removed");
        }
        removed
    }

    // ========================================================================
    // WHOLE-CACHE OPERATIONS
    // ========================================================================

    /// Removes all keys and all TTL buckets.
    pub fn flush(&self) {
        for shard in &self.shards {
            shard.write().clear();
        }
        debug!(parent: &self.span, "Storage flushed");
    }

    /// Returns the number of stored keys, including expired keys the sweeper
    /// has not reached yet.
    pub fn len(&self) -> usize {
        self.shards.iter().map(|s| s.read().items.len()).sum()
    }

    /// Returns true if no keys are stored.
    pub fn is_empty(&self) -> bool {
        self.shards.iter().all(|s| s.read().items.is_empty())
    }

    /// Returns storage statistics.
    pub fn stats(&self) -> StorageStats {
        StorageStats {
            keys: self.len() as u64,
            get_ops: self.get_count.load(Ordering::Relaxed),
            set_ops: self.set_count.load(Ordering::Relaxed),
            del_ops: self.del_count.load(Ordering::Relaxed),
            expired: self.expired_count.load(Ordering::Relaxed),
            sweeps: self.sweep_count.load(Ordering::Relaxed),
        }
    }

    /// Counts keys registered in TTL buckets. Used to check index consistency.
    #[cfg(test)]
    fn bucketed_keys(&self) -> usize {
        self.shards
            .iter()
            .map(|s| s.read().buckets.values().map(HashSet::len).sum::<usize>())
            .sum()
    }
}

/// Storage statistics.
#[derive(Debug, Clone, Copy)]
pub struct StorageStats {
    /// Number of keys currently stored
    pub keys: u64,
    /// Total read operations
    pub get_ops: u64,
    /// Total successful create/update operations
    pub set_ops: u64,
    /// Total DEL operations
    pub del_ops: u64,
    /// Total keys removed by expiry
    pub expired: u64,
    /// Total sweeper passes
    pub sweeps: u64,
}
