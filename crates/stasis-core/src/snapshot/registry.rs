//! Identity-deduplicating registry
//!
//! Assigns dense `u32` indices to distinct keys, in first-seen order, and
//! stores one payload per index.

use rustc_hash::FxHashMap;
use std::hash::Hash;

/// Ordered `(key, payload)` table with a reverse key lookup
#[derive(Debug, Clone)]
pub struct Registry<K, V> {
    entries: Vec<(K, V)>,
    lookup: FxHashMap<K, u32>,
}

impl<K, V> Default for Registry<K, V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            lookup: FxHashMap::default(),
        }
    }
}

impl<K: Copy + Eq + Hash, V> Registry<K, V> {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the index of `key`, inserting it with `make()` if unseen
    ///
    /// The flag is `true` when the key was inserted by this call.
    pub fn insert_or_get(&mut self, key: K, make: impl FnOnce() -> V) -> (u32, bool) {
        if let Some(&index) = self.lookup.get(&key) {
            return (index, false);
        }
        let index = self.entries.len() as u32;
        self.entries.push((key, make()));
        self.lookup.insert(key, index);
        (index, true)
    }

    /// Index of a key, if registered
    pub fn index_of(&self, key: &K) -> Option<u32> {
        self.lookup.get(key).copied()
    }

    /// Check if a key is registered
    pub fn contains(&self, key: &K) -> bool {
        self.lookup.contains_key(key)
    }

    /// Key stored at an index
    pub fn key(&self, index: u32) -> Option<&K> {
        self.entries.get(index as usize).map(|(k, _)| k)
    }

    /// Payload stored at an index
    pub fn get(&self, index: u32) -> Option<&V> {
        self.entries.get(index as usize).map(|(_, v)| v)
    }

    /// Mutable payload stored at an index
    pub fn get_mut(&mut self, index: u32) -> Option<&mut V> {
        self.entries.get_mut(index as usize).map(|(_, v)| v)
    }

    /// Number of registered keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over entries in index order
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter().map(|(k, v)| (k, v))
    }

    /// Consume the registry, yielding payloads in index order
    pub fn into_values(self) -> impl Iterator<Item = V> {
        self.entries.into_iter().map(|(_, v)| v)
    }
}
