//! Cache Module
//!
//! In-memory key/value caches with per-entry expiration. Every cache keeps a
//! [`Records`] index of its keys bucketed by expiration time, which the
//! background janitor uses to sweep expired keys without scanning the whole map.

mod entry;
mod main_cache;
mod manager;
mod records;
mod set;
mod stats;
mod sync_cache;


use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

use chrono::{DateTime, Utc};

// Re-export public types
pub use entry::CacheEntry;
pub use main_cache::MainCache;
pub use manager::CacheManager;
pub use records::{BucketKey, Records};
pub use set::KeySet;
pub use stats::{CacheStats, StatsRecorder};
pub use sync_cache::SyncCache;

// == Public Constants ==
/// Smallest accepted bucket width for a [`Records`] index
pub const MIN_PRECISION: Duration = Duration::from_secs(1);

/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;

/// Bounds every cache key type must satisfy.
pub trait CacheKey: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

impl<T> CacheKey for T where T: Eq + Hash + Clone + Debug + Send + Sync + 'static {}

/// Bounds every cache value type must satisfy.
pub trait CacheValue: Clone + Send + Sync + 'static {}

impl<T> CacheValue for T where T: Clone + Send + Sync + 'static {}

// == Cache Trait ==
/// Capability set shared by the main and the frequent-access cache.
///
/// Per-key runtime conditions never surface as errors: misses, double
/// deletes and past expirations are logged and turned into `None`/`false`/no-op.
pub trait Cache<K: CacheKey, V: CacheValue>: Send + Sync {
    /// Returns a clone of the value if present and not expired.
    fn get(&self, key: &K) -> Option<V>;

    /// Stores `value` until `expires_at`. Ignored unless `expires_at` is in the future.
    fn set(&self, key: K, value: V, expires_at: DateTime<Utc>);

    /// Removes `key`, returning whether it was present.
    fn delete(&self, key: &K) -> bool;

    /// Applies [`Cache::delete`] to each key; not atomic as a batch.
    fn delete_many(&self, keys: &[K]) -> usize {
        keys.iter().filter(|key| self.delete(key)).count()
    }

    /// Removes every key whose expiration is at or before `now`.
    fn clear_expired_at(&self, now: DateTime<Utc>) -> usize;

    /// Removes every key that has expired as of the current wall clock.
    fn clear_expired(&self) -> usize {
        self.clear_expired_at(Utc::now())
    }

    /// Empties the data map and the expiration index.
    fn clear(&self);

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn stats(&self) -> CacheStats;

    /// Human readable cache name used in logs.
    fn name(&self) -> &'static str;
}
