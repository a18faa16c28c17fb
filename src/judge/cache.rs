use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::{Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub document_id: String,
    pub subtopic: String,
}

impl CacheKey {
    pub fn new(document_id: &str, subtopic: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            subtopic: subtopic.to_string(),
        }
    }
}

/// Write-once memo of oracle outcomes per (document, subtopic).
///
/// The first value stored for a key is kept for the life of the cache.
/// Share it between workers behind an `Arc`.
#[derive(Debug)]
pub struct JudgmentCache<V> {
    entries: Mutex<HashMap<CacheKey, V>>,
}

impl<V> Default for JudgmentCache<V> {
    fn default() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl<V: Clone> JudgmentCache<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &CacheKey) -> Option<V> {
        self.lock().get(key).cloned()
    }

    /// Store `value` unless the key already holds one; return whichever is stored.
    pub fn insert_first(&self, key: CacheKey, value: V) -> V {
        match self.lock().entry(key) {
            Entry::Occupied(existing) => existing.get().clone(),
            Entry::Vacant(slot) => slot.insert(value).clone(),
        }
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<CacheKey, V>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
