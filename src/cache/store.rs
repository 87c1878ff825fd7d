//! Cache Store Module
//!
//! Concurrency-safe map from request target to cached body with lazy TTL
//! expiration.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use axum::body::Bytes;
use chrono::{DateTime, Utc};

use crate::cache::{CacheEntry, CacheStats, StatsRecorder};

// == Cache Store ==
/// Process-wide response cache.
///
/// All locking happens inside the store; callers share it through an `Arc`
/// and never coordinate access themselves. Expired entries stay in the map
/// until they are overwritten or swept, but are never returned by [`get`].
///
/// [`get`]: CacheStore::get
#[derive(Debug)]
pub struct CacheStore {
    /// Key-value storage
    entries: RwLock<HashMap<String, CacheEntry>>,
    /// Performance statistics
    stats: StatsRecorder,
    /// TTL applied by the proxy pipeline
    default_ttl: Duration,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty store.
    pub fn new(default_ttl: Duration) -> Self {
        Self::from_entries(default_ttl, HashMap::new())
    }

    /// Creates a store pre-populated with entries, e.g. from a snapshot.
    ///
    /// Entries are taken as-is; expired ones are not filtered out.
    pub fn from_entries(default_ttl: Duration, entries: HashMap<String, CacheEntry>) -> Self {
        Self {
            entries: RwLock::new(entries),
            stats: StatsRecorder::new(),
            default_ttl,
        }
    }

    // == Default TTL ==
    pub fn default_ttl(&self) -> Duration {
        self.default_ttl
    }

    // == Get ==
    /// Returns the entry for `key` if present and unexpired.
    ///
    /// Lookups never extend an entry's lifetime.
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.get_at(key, Utc::now())
    }

    /// Same as [`get`](CacheStore::get) with an explicit clock reading.
    pub fn get_at(&self, key: &str, now: DateTime<Utc>) -> Option<CacheEntry> {
        let found = self
            .read()
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .cloned();

        match found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    /// Like [`get`](CacheStore::get) but not counted in the statistics.
    pub fn peek(&self, key: &str) -> Option<CacheEntry> {
        let now = Utc::now();
        self.read()
            .get(key)
            .filter(|entry| !entry.is_expired_at(now))
            .cloned()
    }

    // == Set ==
    /// Inserts or replaces the entry for `key`, expiring `ttl` from now.
    ///
    /// The overwrite is unconditional: a live entry for the same key is
    /// replaced, and the last writer wins.
    pub fn set(&self, key: impl Into<String>, value: Bytes, ttl: Duration) {
        self.insert(key, CacheEntry::new(value, ttl));
    }

    /// Inserts using the store's default TTL.
    pub fn set_default(&self, key: impl Into<String>, value: Bytes) {
        self.set(key, value, self.default_ttl);
    }

    /// Inserts a fully-formed entry.
    pub fn insert(&self, key: impl Into<String>, entry: CacheEntry) {
        self.write().insert(key.into(), entry);
    }

    // == All Entries ==
    /// Point-in-time copy of every entry, expired or not.
    pub fn all_entries(&self) -> Vec<(String, CacheEntry)> {
        self.read()
            .iter()
            .map(|(key, entry)| (key.clone(), entry.clone()))
            .collect()
    }

    // == Count ==
    /// Number of entries held, including expired ones not yet purged.
    pub fn count(&self) -> usize {
        self.read().len()
    }

    // == Is Empty ==
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the cache.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&self) -> usize {
        let now = Utc::now();
        let removed = {
            let mut entries = self.write();
            let before = entries.len();
            entries.retain(|_, entry| !entry.is_expired_at(now));
            before - entries.len()
        };

        self.stats.record_purged(removed);
        removed
    }

    // == Stats ==
    /// Returns current cache statistics.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot(self.count())
    }

    // A panic while holding the lock cannot leave the map half-updated:
    // every critical section is a single map operation.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
