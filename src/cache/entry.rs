//! Cache Entry Module
//!
//! Defines a single cached response body with its absolute expiration.

use std::time::Duration;

use axum::body::Bytes;
use chrono::{DateTime, TimeDelta, Utc};

// == Cache Entry ==
/// A cached response body and the instant it stops being served.
///
/// Entries are never mutated in place: a re-fetch replaces the whole entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// The stored (possibly normalized) body
    pub value: Bytes,
    /// Absolute expiration time
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates an entry that expires `ttl` from now.
    pub fn new(value: Bytes, ttl: Duration) -> Self {
        Self::new_at(value, ttl, Utc::now())
    }

    /// Creates an entry that expires `ttl` after `now`.
    pub fn new_at(value: Bytes, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            value,
            expires_at: expiration_after(now, ttl),
        }
    }

    /// Creates an entry with an explicit expiration, as read back from a snapshot.
    pub fn with_expiration(value: Bytes, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks expiration against a clock reading.
    ///
    /// An entry is expired once `now` is greater than or equal to its
    /// expiration time.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

// == Utility Functions ==
/// Adds `ttl` to `now`, saturating at the largest representable instant.
pub fn expiration_after(now: DateTime<Utc>, ttl: Duration) -> DateTime<Utc> {
    TimeDelta::from_std(ttl)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
