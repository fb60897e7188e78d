//! Main Cache Module
//!
//! Default cache variant: a single reader/writer lock over a `HashMap`, kept
//! consistent with its expiration [`Records`] inside the same critical section.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::cache::{Cache, CacheEntry, CacheKey, CacheStats, CacheValue, Records, StatsRecorder};
use crate::error::Result;

const NAME: &str = "Main Cache";

// == Main Cache ==
/// Lock-based cache with predictable latency under low contention.
///
/// Lock order is always cache lock first, then the records' internal lock.
#[derive(Debug)]
pub struct MainCache<K, V> {
    data: RwLock<HashMap<K, CacheEntry<V>>>,
    records: Records<K>,
    stats: StatsRecorder,
}

impl<K: CacheKey, V: CacheValue> MainCache<K, V> {
    // == Constructor ==
    /// Creates an empty cache whose expiration buckets are `precision` wide.
    pub fn new(precision: Duration) -> Result<Self> {
        let records = Records::new(precision)?;
        Ok(Self {
            data: RwLock::new(HashMap::new()),
            records,
            stats: StatsRecorder::new(),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, CacheEntry<V>>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn records(&self) -> &Records<K> {
        &self.records
    }

    /// Removes the keys of one swept bucket that are due as of `now`.
    ///
    /// Keys that are no longer due (renewed, or expiring later inside the
    /// swept bucket) are registered again instead of dropped.
    fn remove_due(&self, keys: Vec<K>, now: DateTime<Utc>) -> usize {
        let mut data = self.write();
        let mut removed = 0;
        for key in keys {
            match data.get(&key) {
                Some(entry) if entry.is_expired_at(now) => {
                    data.remove(&key);
                    removed += 1;
                }
                Some(entry) => {
                    let expires_at = entry.expires_at;
                    self.records.add(key, expires_at);
                }
                None => {}
            }
        }
        removed
    }
}

impl<K: CacheKey, V: CacheValue> Cache<K, V> for MainCache<K, V> {
    fn get(&self, key: &K) -> Option<V> {
        let data = self.read();
        match data.get(key) {
            Some(entry) if entry.is_expired() => {
                warn!("[MAIN_CACHE_EVENT] value with key {:?} exists after expired!", key);
                self.stats.record_miss();
                None
            }
            Some(entry) => {
                self.stats.record_hit();
                Some(entry.value.clone())
            }
            None => {
                debug!("[MAIN_CACHE_EVENT] Key not found: {:?}", key);
                self.stats.record_miss();
                None
            }
        }
    }

    fn set(&self, key: K, value: V, expires_at: DateTime<Utc>) {
        if expires_at <= Utc::now() {
            warn!(
                "[MAIN_CACHE_EVENT] Attempted to set key {:?} with past expiration time",
                key
            );
            return;
        }

        let mut data = self.write();
        if let Some(old) = data.insert(key.clone(), CacheEntry::new(value, expires_at)) {
            self.records.delete(&key, old.expires_at);
        }
        self.records.add(key, expires_at);
    }

    fn delete(&self, key: &K) -> bool {
        let mut data = self.write();
        match data.remove(key) {
            Some(old) => {
                self.records.delete(key, old.expires_at);
                true
            }
            None => {
                info!("[MAIN_CACHE_EVENT] tried to delete inexistant key: {:?}", key);
                false
            }
        }
    }

    fn clear_expired_at(&self, now: DateTime<Utc>) -> usize {
        debug!("[MAIN_CACHE_EVENT] clearing expired keys...");
        let mut removed = 0;
        self.records.delete_before(now, |keys| {
            removed += self.remove_due(keys, now);
        });
        self.stats.record_expired(removed);

        if removed > 0 {
            info!("[MAIN_CACHE_EVENT] clearing expired keys done: cleared {} keys", removed);
        } else {
            debug!("[MAIN_CACHE_EVENT] clearing expired keys done: nothing to clear");
        }
        removed
    }

    fn clear(&self) {
        info!("[MAIN_CACHE_EVENT] clearing all...");
        let mut data = self.write();
        data.clear();
        self.records.clear();
        info!("[MAIN_CACHE_EVENT] clearing all done");
    }

    fn len(&self) -> usize {
        self.read().len()
    }

    fn stats(&self) -> CacheStats {
        self.stats.snapshot(NAME, self.len())
    }

    fn name(&self) -> &'static str {
        NAME
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;
    use std::sync::Arc;
    use std::thread;

    fn cache() -> MainCache<String, String> {
        MainCache::new(Duration::from_secs(1)).unwrap()
    }

    fn in_secs(secs: i64) -> DateTime<Utc> {
        Utc::now() + ChronoDuration::seconds(secs)
    }

    #[test]
    fn test_cache_new_rejects_bad_precision() {
        let result = MainCache::<String, String>::new(Duration::from_millis(10));
        assert!(result.is_err());
    }

    #[test]
    fn test_cache_set_and_get() {
        let cache = cache();

        cache.set("key1".to_string(), "value1".to_string(), in_secs(60));

        assert_eq!(cache.get(&"key1".to_string()), Some("value1".to_string()));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.records().key_count(), 1);
    }

    #[test]
    fn test_cache_get_nonexistent() {
        let cache = cache();
        assert_eq!(cache.get(&"nonexistent".to_string()), None);
    }

    #[test]
    fn test_cache_set_past_expiration_is_noop() {
        let cache = cache();
        cache.set("key1".to_string(), "value1".to_string(), in_secs(60));

        cache.set("key1".to_string(), "stale".to_string(), in_secs(-1));
        cache.set("key2".to_string(), "stale".to_string(), Utc::now());

        assert_eq!(cache.get(&"key1".to_string()), Some("value1".to_string()));
        assert_eq!(cache.get(&"key2".to_string()), None);
        assert_eq!(cache.records().key_count(), 1);
    }

    #[test]
    fn test_cache_delete() {
        let cache = cache();
        cache.set("key1".to_string(), "value1".to_string(), in_secs(60));

        assert!(cache.delete(&"key1".to_string()));
        assert!(cache.is_empty());
        assert_eq!(cache.records().bucket_count(), 0);
        assert_eq!(cache.get(&"key1".to_string()), None);
    }

    #[test]
    fn test_cache_delete_nonexistent() {
        let cache = cache();
        assert!(!cache.delete(&"nonexistent".to_string()));
    }

    #[test]
    fn test_cache_delete_many() {
        let cache = cache();
        cache.set("a".to_string(), "1".to_string(), in_secs(60));
        cache.set("b".to_string(), "2".to_string(), in_secs(60));

        let removed = cache.delete_many(&["a".to_string(), "b".to_string(), "c".to_string()]);
        assert_eq!(removed, 2);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_overwrite_moves_registration() {
        let cache = cache();
        let first = in_secs(5);
        let second = in_secs(100);

        cache.set("key1".to_string(), "value1".to_string(), first);
        cache.set("key1".to_string(), "value2".to_string(), second);

        assert_eq!(cache.get(&"key1".to_string()), Some("value2".to_string()));
        assert_eq!(cache.len(), 1);
        assert!(!cache.records().contains(&"key1".to_string(), first));
        assert!(cache.records().contains(&"key1".to_string(), second));

        // A sweep past the first deadline must not drop the renewed key
        assert_eq!(cache.clear_expired_at(first + ChronoDuration::seconds(1)), 0);
        assert_eq!(cache.get(&"key1".to_string()), Some("value2".to_string()));
    }

    #[test]
    fn test_cache_clear_expired() {
        let cache = cache();
        let now = Utc::now();
        cache.set("k1".to_string(), "v1".to_string(), now + ChronoDuration::seconds(2));
        cache.set("k2".to_string(), "v2".to_string(), now + ChronoDuration::seconds(10));

        assert_eq!(cache.clear_expired_at(now + ChronoDuration::seconds(3)), 1);
        assert_eq!(cache.get(&"k1".to_string()), None);
        assert_eq!(cache.get(&"k2".to_string()), Some("v2".to_string()));

        assert_eq!(cache.clear_expired_at(now + ChronoDuration::seconds(11)), 1);
        assert_eq!(cache.clear_expired_at(now + ChronoDuration::seconds(11)), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.stats().expired, 2);
    }

    #[test]
    fn test_cache_sweep_keeps_not_yet_due_key_in_same_bucket() {
        let cache: MainCache<String, String> = MainCache::new(Duration::from_secs(60)).unwrap();
        let bucket = cache.records().bucket_key(in_secs(120));
        let bucket_start = DateTime::from_timestamp(bucket, 0).unwrap();
        let expires_at = bucket_start + ChronoDuration::seconds(50);
        cache.set("key".to_string(), "value".to_string(), expires_at);

        // Sweep inside the key's bucket but before its deadline
        let sweep_at = bucket_start + ChronoDuration::seconds(10);
        assert_eq!(cache.clear_expired_at(sweep_at), 0);

        assert_eq!(cache.get(&"key".to_string()), Some("value".to_string()));
        assert!(cache.records().contains(&"key".to_string(), expires_at));
        assert_eq!(cache.clear_expired_at(expires_at), 1);
    }

    #[test]
    fn test_cache_clear() {
        let cache = cache();
        let now = Utc::now();
        cache.set("a".to_string(), "1".to_string(), now + ChronoDuration::seconds(5));
        cache.set("b".to_string(), "2".to_string(), now + ChronoDuration::seconds(50));

        cache.clear();

        assert!(cache.is_empty());
        assert_eq!(cache.records().bucket_count(), 0);
        assert_eq!(cache.get(&"a".to_string()), None);
        assert_eq!(cache.clear_expired_at(now + ChronoDuration::seconds(100)), 0);
    }

    #[test]
    fn test_cache_stats() {
        let cache = cache();
        cache.set("key1".to_string(), "value1".to_string(), in_secs(60));
        cache.get(&"key1".to_string()); // hit
        cache.get(&"nonexistent".to_string()); // miss

        let stats = cache.stats();
        assert_eq!(stats.name, "Main Cache");
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.total_entries, 1);
    }

    #[test]
    fn test_cache_parallel_set_then_get() {
        let cache = Arc::new(cache());
        let expires_at = in_secs(300);

        let writers: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..250 {
                        let key = format!("key-{}-{}", t, i);
                        cache.set(key.clone(), format!("value-{}", key), expires_at);
                    }
                })
            })
            .collect();
        for handle in writers {
            handle.join().unwrap();
        }

        let readers: Vec<_> = (0..8)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..250 {
                        let key = format!("key-{}-{}", t, i);
                        assert_eq!(cache.get(&key), Some(format!("value-{}", key)));
                    }
                })
            })
            .collect();
        for handle in readers {
            handle.join().unwrap();
        }

        assert_eq!(cache.len(), 2000);
        assert_eq!(cache.records().key_count(), 2000);
    }

    #[test]
    fn test_cache_renewal_races_sweep() {
        let base = in_secs(3600);
        let due = base + ChronoDuration::seconds(1);
        let renewed = base + ChronoDuration::seconds(100);
        let keys: Vec<String> = (0..50).map(|i| format!("key-{}", i)).collect();

        for _ in 0..50 {
            let cache = Arc::new(cache());
            for key in &keys {
                cache.set(key.clone(), "old".to_string(), due);
            }

            let renewer = {
                let cache = Arc::clone(&cache);
                let keys = keys.clone();
                thread::spawn(move || {
                    for key in keys {
                        cache.set(key, "new".to_string(), renewed);
                    }
                })
            };
            let sweeper = {
                let cache = Arc::clone(&cache);
                thread::spawn(move || cache.clear_expired_at(base + ChronoDuration::seconds(2)))
            };
            renewer.join().unwrap();
            sweeper.join().unwrap();

            // Whether a key was swept before or after its renewal, the renewal wins.
            for key in &keys {
                assert_eq!(cache.get(key), Some("new".to_string()), "lost {}", key);
            }
            assert_eq!(cache.len(), keys.len());
            assert_eq!(cache.records().key_count(), cache.len());
        }
    }
}
