//! Key Set Module
//!
//! Thread-safe unordered key collection used as the payload of an expiration bucket.

use std::collections::HashSet;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

// == Key Set ==
/// A mutex-guarded set of keys.
#[derive(Debug)]
pub struct KeySet<K> {
    items: Mutex<HashSet<K>>,
}

impl<K> Default for KeySet<K> {
    fn default() -> Self {
        Self {
            items: Mutex::new(HashSet::new()),
        }
    }
}

impl<K> KeySet<K>
where
    K: Eq + Hash + Clone,
{
    // == Constructor ==
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<K>> {
        // A panicking holder cannot leave a HashSet half-written
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn add(&self, key: K) {
        self.lock().insert(key);
    }

    pub fn add_many<I>(&self, keys: I)
    where
        I: IntoIterator<Item = K>,
    {
        self.lock().extend(keys);
    }

    /// Removes a key, returning whether it was present.
    pub fn remove(&self, key: &K) -> bool {
        self.lock().remove(key)
    }

    pub fn contains(&self, key: &K) -> bool {
        self.lock().contains(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    // == Snapshot ==
    /// Copies the current members into a Vec. Order is unspecified.
    pub fn items(&self) -> Vec<K> {
        self.lock().iter().cloned().collect()
    }
}
