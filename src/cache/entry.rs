//! Cache Entry Module
//!
//! Defines the structure for individual cache entries with expiration support.

use chrono::{DateTime, Utc};

// == Cache Entry ==
/// Represents a single cache entry with its value and expiration instant.
///
/// Entries are never mutated in place: a SET on an existing key replaces the
/// whole entry.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Instant at which the entry stops being served
    pub expires_at: DateTime<Utc>,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    pub fn new(value: V, expires_at: DateTime<Utc>) -> Self {
        Self { value, expires_at }
    }

    // == Is Expired ==
    /// Checks if the entry has expired as of `now`.
    ///
    /// Boundary condition: an entry is expired when `now >= expires_at`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Checks if the entry has expired as of the current wall clock.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}
