//! Expiration Records Module
//!
//! Time-bucketed index of keys by expiration instant. Each cache owns one
//! `Records` and consults it on every mutation so that sweeps only touch keys
//! that are actually due instead of scanning the whole data map.

use std::collections::BTreeMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use crate::cache::{KeySet, MIN_PRECISION};
use crate::error::{CacheError, Result};

/// Unix timestamp (seconds) identifying the start of a bucket.
pub type BucketKey = i64;

// == Records ==
/// Ordered mapping `BucketKey -> KeySet`.
///
/// Buckets are created on first insertion and dropped as soon as they become
/// empty. The map is sorted by bucket key, so range sweeps are correct no
/// matter in which order buckets were created.
#[derive(Debug)]
pub struct Records<K> {
    data: Mutex<BTreeMap<BucketKey, KeySet<K>>>,
    precision_ms: i64,
}

impl<K> Records<K>
where
    K: Eq + Hash + Clone + std::fmt::Debug,
{
    // == Constructor ==
    /// Creates an empty index.
    ///
    /// Fails with [`CacheError::InvalidPrecision`] if `precision` is shorter
    /// than [`MIN_PRECISION`].
    pub fn new(precision: Duration) -> Result<Self> {
        if precision < MIN_PRECISION {
            let err = CacheError::InvalidPrecision {
                precision,
                min: MIN_PRECISION,
            };
            error!("[RECORDS_EVENT] {}", err);
            return Err(err);
        }

        info!("[RECORDS_EVENT] Initializing records with precision: {:?}", precision);
        Ok(Self {
            data: Mutex::new(BTreeMap::new()),
            precision_ms: i64::try_from(precision.as_millis()).unwrap_or(i64::MAX),
        })
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<BucketKey, KeySet<K>>> {
        self.data.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // == Bucket Key ==
    /// Truncates `t` to a multiple of the precision and returns it as Unix seconds.
    pub fn bucket_key(&self, t: DateTime<Utc>) -> BucketKey {
        let truncated_ms = t.timestamp_millis().div_euclid(self.precision_ms) * self.precision_ms;
        truncated_ms.div_euclid(1000)
    }

    // == Get ==
    /// Returns the keys registered in the bucket containing `t`.
    pub fn get(&self, t: DateTime<Utc>) -> Vec<K> {
        let bucket = self.bucket_key(t);
        match self.lock().get(&bucket) {
            Some(set) => set.items(),
            None => {
                debug!("[RECORDS_EVENT] No record found for bucket {}", bucket);
                Vec::new()
            }
        }
    }

    /// Checks whether `key` is registered in the bucket containing `t`.
    pub fn contains(&self, key: &K, t: DateTime<Utc>) -> bool {
        let bucket = self.bucket_key(t);
        self.lock()
            .get(&bucket)
            .map(|set| set.contains(key))
            .unwrap_or(false)
    }

    // == Add ==
    pub fn add(&self, key: K, t: DateTime<Utc>) {
        let bucket = self.bucket_key(t);
        self.lock().entry(bucket).or_default().add(key);
    }

    pub fn add_many(&self, keys: Vec<K>, t: DateTime<Utc>) {
        let bucket = self.bucket_key(t);
        self.lock().entry(bucket).or_default().add_many(keys);
    }

    // == Delete ==
    /// Deregisters `key` from the bucket containing `t`, dropping the bucket
    /// once it is empty. Returns whether the key was registered there.
    pub fn delete(&self, key: &K, t: DateTime<Utc>) -> bool {
        let bucket = self.bucket_key(t);
        let mut data = self.lock();
        let Some(set) = data.get(&bucket) else {
            warn!(
                "[RECORDS_EVENT] Attempted to delete key {:?} from non-existent record {}",
                key, bucket
            );
            return false;
        };
        let removed = set.remove(key);
        if set.is_empty() {
            data.remove(&bucket);
        }
        removed
    }

    // == Delete Before ==
    /// Removes every bucket at or before the bucket of `now`, newest first,
    /// handing each bucket's keys to `on_deleted`.
    ///
    /// The index lock is released while `on_deleted` runs, so the callback may
    /// call back into this index. Returns the number of keys visited.
    pub fn delete_before<F>(&self, now: DateTime<Utc>, mut on_deleted: F) -> usize
    where
        F: FnMut(Vec<K>),
    {
        let bound = self.bucket_key(now);
        debug!("[RECORDS_EVENT] Deleting records before {}", bound);

        let buckets: Vec<BucketKey> = self.lock().range(..=bound).rev().map(|(k, _)| *k).collect();
        let visited = self.drain_buckets(buckets, &mut on_deleted);

        debug!("[RECORDS_EVENT] Visited {} keys before {}", visited, bound);
        visited
    }

    // == Delete After ==
    /// Symmetric to [`Records::delete_before`]: removes every bucket at or
    /// after the bucket of `now`, oldest first.
    pub fn delete_after<F>(&self, now: DateTime<Utc>, mut on_deleted: F) -> usize
    where
        F: FnMut(Vec<K>),
    {
        let bound = self.bucket_key(now);
        debug!("[RECORDS_EVENT] Deleting records after {}", bound);

        let buckets: Vec<BucketKey> = self.lock().range(bound..).map(|(k, _)| *k).collect();
        let visited = self.drain_buckets(buckets, &mut on_deleted);

        debug!("[RECORDS_EVENT] Visited {} keys after {}", visited, bound);
        visited
    }

    // Buckets are removed one lock acquisition at a time. Only the buckets
    // selected up front are visited; anything re-registered by `on_deleted`
    // stays in the index for a later sweep.
    fn drain_buckets<F>(&self, buckets: Vec<BucketKey>, on_deleted: &mut F) -> usize
    where
        F: FnMut(Vec<K>),
    {
        let mut visited = 0;
        for bucket in buckets {
            let Some(set) = self.lock().remove(&bucket) else {
                continue;
            };
            let keys = set.items();
            visited += keys.len();
            on_deleted(keys);
        }
        visited
    }

    // == Clear ==
    pub fn clear(&self) {
        self.lock().clear();
        info!("[RECORDS_EVENT] All records cleared");
    }

    /// Number of live buckets.
    pub fn bucket_count(&self) -> usize {
        self.lock().len()
    }

    /// Total number of registered keys across all buckets.
    pub fn key_count(&self) -> usize {
        self.lock().values().map(KeySet::len).sum()
    }
}
