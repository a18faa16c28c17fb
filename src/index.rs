//! Ranked lookups against the local corpus, memoized per term set.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, warn};

use crate::model::DocumentRecord;
use crate::query::{build_match_query, normalize_terms};
use crate::storage::Database;

pub const DEFAULT_CACHE_CAPACITY: usize = 50;

type SearchKey = (Vec<String>, usize);

pub struct CorpusIndex {
    db: Arc<Database>,
    cache: Mutex<HashMap<SearchKey, Vec<DocumentRecord>>>,
    capacity: usize,
}

impl CorpusIndex {
    pub fn new(db: Arc<Database>) -> Self {
        Self::with_capacity(db, DEFAULT_CACHE_CAPACITY)
    }

    /// `capacity` is the entry count past which the whole cache is dropped.
    pub fn with_capacity(db: Arc<Database>, capacity: usize) -> Self {
        Self {
            db,
            cache: Mutex::new(HashMap::new()),
            capacity,
        }
    }

    pub fn database(&self) -> &Arc<Database> {
        &self.db
    }

    /// Search the corpus for `terms`, returning at most `limit` records.
    ///
    /// Storage failures are logged and yield an empty list.
    pub fn search<S: AsRef<str>>(&self, terms: &[S], limit: usize) -> Vec<DocumentRecord> {
        let mut key_terms = normalize_terms(terms);
        key_terms.sort();
        let key = (key_terms, limit);

        if let Some(hit) = self.lock_cache().get(&key) {
            debug!(terms = ?key.0, "local search cache hit");
            return hit.clone();
        }

        let match_query = build_match_query(terms);
        if match_query.is_empty() {
            return Vec::new();
        }

        let results = match self.db.search_documents(&match_query, limit) {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, query = %match_query, "local search failed");
                return Vec::new();
            }
        };
        debug!(query = %match_query, hits = results.len(), "local search");

        let mut cache = self.lock_cache();
        if cache.len() >= self.capacity {
            debug!(entries = cache.len(), "clearing local search cache");
            cache.clear();
        }
        cache.insert(key, results.clone());
        results
    }

    pub fn cached_entries(&self) -> usize {
        self.lock_cache().len()
    }

    fn lock_cache(&self) -> std::sync::MutexGuard<'_, HashMap<SearchKey, Vec<DocumentRecord>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
