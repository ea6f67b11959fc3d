//! Compiled-query cache
//!
//! - Bounded LRU keyed by (schema version, collection, document layout,
//!   canonical selector)
//! - Create on miss, evict least recently used at capacity
//! - Entries are immutable once inserted and shared through `Arc`
//! - Cleared explicitly on schema migration
//!
//! Including the schema version in the key means a compile against a newer
//! schema never sees an entry built for an older one, even before `clear`.
//! The layout is in the key because compilers with different layouts may
//! share one cache and produce different SQL for the same selector.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use parking_lot::Mutex;

use crate::sql::{CompiledQuery, DocumentLayout};

/// Default number of compiled queries kept
pub const DEFAULT_QUERY_CACHE_CAPACITY: usize = 1000;

/// Explicit cache key
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey {
    pub schema_version: u64,
    pub collection: String,
    pub layout: DocumentLayout,
    /// Canonical selector text (sorted keys)
    pub selector: String,
}

impl QueryKey {
    /// Key for the default layout; see `with_layout`
    pub fn new(schema_version: u64, collection: impl Into<String>, selector: impl Into<String>) -> Self {
        Self {
            schema_version,
            collection: collection.into(),
            layout: DocumentLayout::default(),
            selector: selector.into(),
        }
    }

    pub fn with_layout(mut self, layout: &DocumentLayout) -> Self {
        self.layout = layout.clone();
        self
    }
}

/// Bounded LRU of compiled queries shared by concurrent callers
pub struct QueryCache {
    entries: Option<Mutex<LruCache<QueryKey, Arc<CompiledQuery>>>>,
    capacity: usize,
}

impl QueryCache {
    /// Creates a cache; capacity 0 disables caching
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: NonZeroUsize::new(capacity).map(|cap| Mutex::new(LruCache::new(cap))),
            capacity,
        }
    }

    pub fn disabled() -> Self {
        Self::new(0)
    }

    pub fn is_enabled(&self) -> bool {
        self.entries.is_some()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Looks up an entry and marks it most recently used
    pub fn get(&self, key: &QueryKey) -> Option<Arc<CompiledQuery>> {
        self.entries.as_ref()?.lock().get(key).cloned()
    }

    pub fn insert(&self, key: QueryKey, query: Arc<CompiledQuery>) {
        if let Some(entries) = &self.entries {
            entries.lock().put(key, query);
        }
    }

    /// Returns the cached entry, or builds and inserts one.
    ///
    /// The lock is not held while `build` runs; two callers missing on the
    /// same key both build, and the later insert wins. Both results are
    /// identical because compilation is deterministic.
    ///
    /// The boolean is true on a cache hit.
    pub fn get_or_insert_with<F>(&self, key: QueryKey, build: F) -> (Arc<CompiledQuery>, bool)
    where
        F: FnOnce() -> CompiledQuery,
    {
        if let Some(hit) = self.get(&key) {
            return (hit, true);
        }
        let query = Arc::new(build());
        self.insert(key, Arc::clone(&query));
        (query, false)
    }

    pub fn len(&self) -> usize {
        self.entries.as_ref().map_or(0, |e| e.lock().len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.lock().clear();
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new(DEFAULT_QUERY_CACHE_CAPACITY)
    }
}

impl std::fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryCache")
            .field("capacity", &self.capacity)
            .field("len", &self.len())
            .finish()
    }
}
