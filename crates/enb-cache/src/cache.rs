//! Per-invocation cache view.

use std::sync::Arc;

use serde_json::Value;

use crate::storage::CacheStorage;

/// A prefix-scoped view over a [`CacheStorage`].
///
/// The build driver creates one per build/clean invocation, rooted at the
/// project name; nodes derive nested views via [`Cache::sub_cache`]. All
/// views share the same underlying storage, so dropped state disappears for
/// every holder at once.
#[derive(Clone, Debug)]
pub struct Cache {
    storage: Arc<CacheStorage>,
    prefix: String,
}

impl Cache {
    /// Create a view rooted at `prefix`.
    pub fn new(storage: Arc<CacheStorage>, prefix: impl Into<String>) -> Self {
        Self {
            storage,
            prefix: prefix.into(),
        }
    }

    /// The full namespace prefix of this view.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The shared storage behind this view.
    pub fn storage(&self) -> &Arc<CacheStorage> {
        &self.storage
    }

    /// Derive a nested view (`prefix/name`).
    #[must_use]
    pub fn sub_cache(&self, name: &str) -> Cache {
        Self {
            storage: Arc::clone(&self.storage),
            prefix: format!("{}/{}", self.prefix, name),
        }
    }

    /// Read a value from this namespace.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.storage.get(&self.prefix, key)
    }

    /// Write a value into this namespace.
    pub fn set(&self, key: &str, value: Value) {
        self.storage.set(&self.prefix, key, value);
    }

    /// Remove a single key from this namespace.
    pub fn invalidate(&self, key: &str) -> Option<Value> {
        self.storage.remove(&self.prefix, key)
    }

    /// Drop this namespace and everything nested under it.
    pub fn drop_all(&self) {
        self.storage.drop_prefix(&self.prefix);
    }
}
