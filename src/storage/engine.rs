//! Bounded LRU Cache with Lazy Expiry
//!
//! This module implements the storage engine behind every command: a
//! byte-bounded key-value map with recency-ordered eviction, lazy expiration
//! and a cache-wide cas counter.
//!
//! ## Design Decisions
//!
//! 1. **One Lock**: All state sits behind a single `Mutex`. LRU order and the
//!    cas counter are global properties, so every operation is linearized.
//! 2. **Recency Stamps**: Each entry carries a monotonically increasing stamp;
//!    a `BTreeMap<stamp, key>` gives the LRU end in `O(log n)`.
//! 3. **Lazy Expiry**: A sweep only runs when the earliest known expiration has
//!    passed, and only as part of some other cache access.
//! 4. **Evict on Write**: Capacity is enforced after every value write by
//!    dropping LRU entries until the used bytes fit again.
//!
//! ## Layout
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Mutex<CacheState>                      │
//! │                                                             │
//! │  entries:  HashMap<key, Entry{value, flags, exp, cas, ..}>  │
//! │  recency:  BTreeMap<stamp, key>   LRU ──────────────> MRU   │
//! │  deadline: earliest expiration    cas_counter: u64          │
//! │  used_bytes / capacity                                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use crate::config::CacheConfig;
use crate::storage::clock::{Clock, SystemClock};
use crate::storage::expiry::{Deadline, Expiration};
use bytes::{Bytes, BytesMut};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Errors reported by cache operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// A single value is larger than the per-value limit
    #[error("value of {size} bytes exceeds the maximum of {max} bytes")]
    ValueTooLarge { size: usize, max: usize },

    /// The key is not stored
    #[error("key not found")]
    NotFound,

    /// incr/decr on a value that is not a decimal integer
    #[error("cannot increment or decrement non-numeric value")]
    NonNumeric,

    /// incr/decr result does not fit in 64 bits
    #[error("increment or decrement overflow")]
    Overflow,
}

/// How a compound store treats existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreMode {
    /// Unconditional upsert
    Set,
    /// Only if the key is absent
    Add,
    /// Only if the key is present
    Replace,
    /// Old value followed by the new one; flags and exptime untouched
    Append,
    /// New value followed by the old one; flags and exptime untouched
    Prepend,
    /// Only if the entry's cas token equals the given one; replaces the
    /// value only
    Cas(u64),
}

/// Result of [`Cache::store`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    Stored,
    NotStored,
    Exists,
    NotFound,
}

/// A stored record.
#[derive(Debug, Clone)]
struct Entry {
    /// `None` until a value is written (e.g. an entry created by touch alone)
    value: Option<Bytes>,
    flags: u32,
    expiration: Expiration,
    cas: u64,
    /// Cached `value.len()`, the unit of capacity accounting
    size: usize,
    /// Position in the recency order
    stamp: u64,
}

/// A snapshot of an entry, returned by [`Cache::get`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryView {
    pub value: Bytes,
    pub flags: u32,
    pub expiration: Expiration,
    pub cas: u64,
    pub size: usize,
}

/// Cache statistics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of keys currently stored
    pub keys: usize,
    /// Sum of stored value sizes
    pub used_bytes: usize,
    pub capacity: usize,
    pub max_value_size: usize,
    /// Lookups that found a live entry
    pub hits: u64,
    /// Lookups that found nothing
    pub misses: u64,
    /// Entries dropped to make room
    pub evictions: u64,
    /// Entries dropped by the expiry sweep
    pub expired: u64,
    /// Last cas token handed out
    pub cas: u64,
}

struct CacheState {
    entries: HashMap<Bytes, Entry>,
    recency: BTreeMap<u64, Bytes>,
    next_stamp: u64,
    cas_counter: u64,
    used_bytes: usize,
    capacity: usize,
    max_value_size: usize,
    deadline: Deadline,
    hits: u64,
    misses: u64,
    evictions: u64,
    expired: u64,
}

impl CacheState {
    fn new(config: CacheConfig) -> Self {
        Self {
            entries: HashMap::new(),
            recency: BTreeMap::new(),
            next_stamp: 0,
            cas_counter: 0,
            used_bytes: 0,
            capacity: config.capacity(),
            max_value_size: config.max_value_size(),
            deadline: Deadline::new(),
            hits: 0,
            misses: 0,
            evictions: 0,
            expired: 0,
        }
    }

    fn check_size(&self, size: usize) -> Result<(), CacheError> {
        if size > self.max_value_size {
            return Err(CacheError::ValueTooLarge {
                size,
                max: self.max_value_size,
            });
        }
        Ok(())
    }

    /// Removes every expired entry, but only once the deadline has passed.
    fn sweep_expired(&mut self, now: i64) {
        if !self.deadline.is_due(now) {
            return;
        }

        let mut next = Deadline::new();
        let mut expired = Vec::new();
        for (key, entry) in &self.entries {
            if entry.expiration.is_expired(now) {
                expired.push(key.clone());
            } else {
                next.consider(entry.expiration);
            }
        }
        self.deadline = next;

        for key in expired {
            if self.remove(&key).is_some() {
                self.expired += 1;
            }
        }
    }

    fn take_stamp(&mut self) -> u64 {
        let stamp = self.next_stamp;
        self.next_stamp += 1;
        stamp
    }

    /// Moves `key` to the most-recently-used end.
    fn promote(&mut self, key: &[u8]) {
        let stamp = self.take_stamp();
        if let Some(entry) = self.entries.get_mut(key) {
            if let Some(owned) = self.recency.remove(&entry.stamp) {
                entry.stamp = stamp;
                self.recency.insert(stamp, owned);
            }
        }
    }

    fn remove(&mut self, key: &[u8]) -> Option<Entry> {
        let entry = self.entries.remove(key)?;
        self.recency.remove(&entry.stamp);
        self.used_bytes -= entry.size;
        Some(entry)
    }

    /// Creates or updates `key`, promoting it and bumping the cas counter.
    ///
    /// Only the supplied fields change. The caller has already checked the
    /// value size.
    fn write(
        &mut self,
        key: Bytes,
        value: Option<Bytes>,
        flags: Option<u32>,
        expiration: Option<Expiration>,
    ) -> u64 {
        let stamp = self.take_stamp();
        self.cas_counter += 1;
        let cas = self.cas_counter;

        let entry = self.entries.entry(key.clone()).or_insert(Entry {
            value: None,
            flags: 0,
            expiration: Expiration::Never,
            cas,
            size: 0,
            stamp,
        });
        self.recency.remove(&entry.stamp);

        entry.stamp = stamp;
        entry.cas = cas;
        if let Some(flags) = flags {
            entry.flags = flags;
        }
        if let Some(expiration) = expiration {
            entry.expiration = expiration;
            self.deadline.consider(expiration);
        }

        let wrote_value = value.is_some();
        if let Some(value) = value {
            self.used_bytes = self.used_bytes - entry.size + value.len();
            entry.size = value.len();
            entry.value = Some(value);
        }

        self.recency.insert(stamp, key);

        if wrote_value {
            self.evict_to_capacity();
        }

        cas
    }

    /// Drops least-recently-used entries until the used bytes fit.
    fn evict_to_capacity(&mut self) {
        while self.used_bytes > self.capacity {
            let Some((_, key)) = self.recency.pop_first() else {
                break;
            };
            if let Some(entry) = self.entries.remove(&key) {
                self.used_bytes -= entry.size;
                self.evictions += 1;
            }
        }
    }

    fn view(entry: &Entry) -> EntryView {
        EntryView {
            value: entry.value.clone().unwrap_or_default(),
            flags: entry.flags,
            expiration: entry.expiration,
            cas: entry.cas,
            size: entry.size,
        }
    }
}

/// The shared cache.
///
/// Wrap it in an `Arc` and hand a clone to every connection. All operations
/// are thread-safe and atomic with respect to each other.
///
/// # Example
///
/// ```
/// use flashcached::storage::Cache;
/// use bytes::Bytes;
///
/// let cache = Cache::with_capacity(1024);
///
/// cache.set(Bytes::from("name"), Some(Bytes::from("Ariz")), None, None).unwrap();
///
/// let entry = cache.get(b"name").unwrap();
/// assert_eq!(entry.value, Bytes::from("Ariz"));
/// assert_eq!(entry.size, 4);
/// ```
pub struct Cache {
    state: Mutex<CacheState>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for Cache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let stats = self.stats();
        f.debug_struct("Cache")
            .field("keys", &stats.keys)
            .field("used_bytes", &stats.used_bytes)
            .field("capacity", &stats.capacity)
            .field("cas", &stats.cas)
            .finish()
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new(CacheConfig::default())
    }
}

impl Cache {
    /// Creates a cache reading the system clock.
    pub fn new(config: CacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a cache of `capacity` bytes whose largest value may fill it.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::new(CacheConfig::with_capacity(capacity))
    }

    /// Creates a cache with an explicit time source.
    pub fn with_clock(config: CacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Mutex::new(CacheState::new(config)),
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheState> {
        // Every mutation leaves the state consistent before it can panic, so a
        // poisoned lock is still usable.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Locks the state and runs the expiry sweep if it is due.
    fn access(&self) -> MutexGuard<'_, CacheState> {
        let now = self.clock.now();
        let mut state = self.lock();
        state.sweep_expired(now);
        state
    }

    /// The current time according to the cache's clock.
    pub fn now(&self) -> i64 {
        self.clock.now()
    }

    /// Converts a wire `exptime` using the cache's clock.
    pub fn expiration(&self, exptime: i64) -> Expiration {
        Expiration::from_exptime(exptime, self.clock.now())
    }

    /// Looks up a key, promoting it to most recently used.
    pub fn get(&self, key: &[u8]) -> Option<EntryView> {
        let mut state = self.access();

        if !state.entries.contains_key(key) {
            state.misses += 1;
            return None;
        }

        state.promote(key);
        state.hits += 1;
        state.entries.get(key).map(CacheState::view)
    }

    /// Creates or updates a key.
    ///
    /// Absent fields keep their current value (or the defaults, flags 0 and
    /// never-expires, for a new entry). The entry is promoted and receives a
    /// new cas token, which is returned. Writing a value may evict other
    /// entries.
    pub fn set(
        &self,
        key: Bytes,
        value: Option<Bytes>,
        flags: Option<u32>,
        expiration: Option<Expiration>,
    ) -> Result<u64, CacheError> {
        let mut state = self.access();
        if let Some(value) = &value {
            state.check_size(value.len())?;
        }
        Ok(state.write(key, value, flags, expiration))
    }

    /// Returns true if the key is stored and not expired.
    pub fn exists(&self, key: &[u8]) -> bool {
        self.access().entries.contains_key(key)
    }

    /// Removes a key. Returns false if it was not stored.
    pub fn delete(&self, key: &[u8]) -> bool {
        self.access().remove(key).is_some()
    }

    /// Changes only the expiration of a stored key.
    ///
    /// Like any write this promotes the entry and bumps its cas token.
    /// Returns false, changing nothing, when the key is absent.
    pub fn touch(&self, key: &[u8], expiration: Expiration) -> bool {
        let mut state = self.access();
        let Some(owned) = state.entries.get_key_value(key).map(|(k, _)| k.clone()) else {
            return false;
        };
        state.write(owned, None, None, Some(expiration));
        true
    }

    /// Runs a conditional store as one atomic step.
    ///
    /// This is what the update commands use; the precondition of each
    /// [`StoreMode`] is checked under the same lock as the write.
    pub fn store(
        &self,
        mode: StoreMode,
        key: Bytes,
        value: Bytes,
        flags: u32,
        expiration: Expiration,
    ) -> Result<StoreOutcome, CacheError> {
        let mut state = self.access();
        let current = state.entries.get(&key);

        match mode {
            StoreMode::Set => {}
            StoreMode::Add => {
                if current.is_some() {
                    return Ok(StoreOutcome::NotStored);
                }
            }
            StoreMode::Replace => {
                if current.is_none() {
                    return Ok(StoreOutcome::NotStored);
                }
            }
            StoreMode::Append | StoreMode::Prepend => {
                let Some(entry) = current else {
                    return Ok(StoreOutcome::NotStored);
                };
                let old = entry.value.clone().unwrap_or_default();
                state.check_size(old.len() + value.len())?;

                let mut joined = BytesMut::with_capacity(old.len() + value.len());
                if mode == StoreMode::Append {
                    joined.extend_from_slice(&old);
                    joined.extend_from_slice(&value);
                } else {
                    joined.extend_from_slice(&value);
                    joined.extend_from_slice(&old);
                }
                state.write(key, Some(joined.freeze()), None, None);
                return Ok(StoreOutcome::Stored);
            }
            StoreMode::Cas(token) => {
                match current {
                    None => return Ok(StoreOutcome::NotFound),
                    Some(entry) if entry.cas != token => return Ok(StoreOutcome::Exists),
                    Some(_) => {}
                }
                // Only the value changes; flags and expiration stay
                state.check_size(value.len())?;
                state.write(key, Some(value), None, None);
                return Ok(StoreOutcome::Stored);
            }
        }

        state.check_size(value.len())?;
        state.write(key, Some(value), Some(flags), Some(expiration));
        Ok(StoreOutcome::Stored)
    }

    /// Adds `delta` to a stored decimal integer and returns the new value.
    ///
    /// Flags and expiration are kept. Negative results are allowed.
    pub fn incr(&self, key: &[u8], delta: i64) -> Result<i64, CacheError> {
        let mut state = self.access();
        let (owned, entry) = state
            .entries
            .get_key_value(key)
            .ok_or(CacheError::NotFound)?;

        let current = entry
            .value
            .as_deref()
            .and_then(|v| std::str::from_utf8(v).ok())
            .and_then(|s| s.parse::<i64>().ok())
            .ok_or(CacheError::NonNumeric)?;

        let updated = current.checked_add(delta).ok_or(CacheError::Overflow)?;
        let value = Bytes::from(updated.to_string());
        let owned = owned.clone();

        state.check_size(value.len())?;
        state.write(owned, Some(value), None, None);
        Ok(updated)
    }

    /// Stored keys, least recently used first.
    pub fn keys(&self) -> Vec<Bytes> {
        self.access().recency.values().cloned().collect()
    }

    /// Number of stored keys (expired entries not yet swept included).
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of the sizes of all stored values.
    pub fn used_bytes(&self) -> usize {
        self.lock().used_bytes
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    pub fn max_value_size(&self) -> usize {
        self.lock().max_value_size
    }

    /// Changes the capacity, evicting immediately if it shrank.
    ///
    /// The per-value limit is clamped to the new capacity.
    pub fn set_capacity(&self, capacity: usize) {
        let mut state = self.lock();
        state.capacity = capacity;
        state.max_value_size = state.max_value_size.min(capacity);
        state.evict_to_capacity();
    }

    /// Returns a statistics snapshot.
    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            keys: state.entries.len(),
            used_bytes: state.used_bytes,
            capacity: state.capacity,
            max_value_size: state.max_value_size,
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            expired: state.expired,
            cas: state.cas_counter,
        }
    }
}
