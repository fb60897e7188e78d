//! Sync Cache Module
//!
//! Frequent-access cache variant backed by a sharded `DashMap`. Each key's
//! data and index registration are updated while its shard lock is held, so
//! per-key operations stay atomic without a global lock.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheEntry, CacheKey, CacheStats, CacheValue, Records, StatsRecorder};
use crate::error::Result;

const NAME: &str = "Sync Cache";

// == Sync Cache ==
/// Striped-lock cache for hot keys under heavy parallel access.
///
/// There is no snapshot guarantee across unrelated keys.
pub struct SyncCache<K, V> {
    data: DashMap<K, CacheEntry<V>>,
    records: Records<K>,
    stats: StatsRecorder,
}

impl<K: CacheKey, V> fmt::Debug for SyncCache<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCache")
            .field("len", &self.data.len())
            .field("records", &self.records)
            .finish_non_exhaustive()
    }
}

impl<K: CacheKey, V: CacheValue> SyncCache<K, V> {
    // == Constructor ==
    pub fn new(precision: Duration) -> Result<Self> {
        let records = Records::new(precision)?;
        Ok(Self {
            data: DashMap::new(),
            records,
            stats: StatsRecorder::new(),
        })
    }

    pub fn records(&self) -> &Records<K> {
        &self.records
    }

    // Same contract as the main cache's sweep helper, one shard lock per key.
    fn remove_due(&self, keys: Vec<K>, now: DateTime<Utc>) -> usize {
        let mut removed = 0;
        for key in keys {
            if let Entry::Occupied(entry) = self.data.entry(key) {
                if entry.get().is_expired_at(now) {
                    entry.remove();
                    removed += 1;
                } else {
                    self.records.add(entry.key().clone(), entry.get().expires_at);
                }
            }
        }
        removed
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for SyncCache<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        match self.data.get(key) {
            Some(entry) if entry.is_expired() => {
                warn!("[SYNC_CACHE_EVENT] value with key {:?} exists after expired!", key);
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                debug!("[SYNC_CACHE_EVENT] Key not found: {:?}", key);
                self.stats.record_miss();
                None
            }
        }
    }

    fn set(&self, key: K, value: V, expires_at: DateTime<Utc>) {
        if expires_at <= Utc::now() {
            warn!(
                "[SYNC_CACHE_EVENT] Attempted to set key {:?} with past expiration time",
                key
            );
            return;
        }

        let new_entry = CacheEntry::new(value, expires_at);
        match self.data.entry(key) {
            Entry::Occupied(mut entry) => {
                let old = entry.insert(new_entry);
                self.records.delete(entry.key(), old.expires_at);
                self.records.add(entry.key().clone(), expires_at);
            }
            Entry::Vacant(entry) => {
                self.records.add(entry.key().clone(), expires_at);
                entry.insert(new_entry);
            }
        }
    }

    fn delete(&self, key: &K) -> bool {
        match self.data.entry(key.clone()) {
            Entry::Occupied(entry) => {
                self.records.delete(entry.key(), entry.get().expires_at);
                entry.remove();
                true
            }
            Entry::Vacant(_) => {
                info!("[SYNC_CACHE_EVENT] tried to delete inexistant key: {:?}", key);
                false
            }
        }
    }

    fn clear_expired_at(&self, now: DateTime<Utc>) -> usize {
        debug!("[SYNC_CACHE_EVENT] clearing expired keys...");
        let mut removed = 0;
        self.records.delete_before(now, |keys| {
            removed += self.remove_due(keys, now);
        });
        self.stats.record_expired(removed);

        if removed > 0 {
            info!("[SYNC_CACHE_EVENT] clearing expired keys done: cleared {} keys", removed);
        } else {
            debug!("[SYNC_CACHE_EVENT] clearing expired keys done: nothing to clear");
        }
        removed
    }

    fn clear(&self) {
        info!("[SYNC_CACHE_EVENT] clearing all...");
        // Index first: a concurrent set can then at worst leave an orphan
        // registration, which the next sweep discards.
        self.records.clear();
        self.data.clear();
        info!("[SYNC_CACHE_EVENT] clearing all done");
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot(NAME, self.len())
    }

    fn name(&self) -> &'static str {
        NAME
    }
}
