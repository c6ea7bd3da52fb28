//! Persistent key-namespaced storage.
//!
//! One JSON document on disk maps prefix → key → value. Loading is
//! fail-safe: a missing file or a parse failure leaves the store empty
//! (incremental state is an optimization, never a correctness input).
//! Saving is explicit; nothing is flushed implicitly.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde_json::Value;
use tracing::warn;

use crate::errors::CacheError;

type StoreData = HashMap<String, HashMap<String, Value>>;

/// Key-namespaced persistent dictionary.
#[derive(Debug)]
pub struct CacheStorage {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl CacheStorage {
    /// Create an empty store bound to a file path. Nothing touches disk
    /// until [`load`](Self::load) or [`save`](Self::save).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            data: RwLock::new(HashMap::new()),
        }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the store from disk, replacing in-memory contents.
    ///
    /// A missing file or unparseable content yields an empty store.
    pub async fn load(&self) {
        let loaded = match tokio::fs::read_to_string(&self.path).await {
            Ok(raw) => match serde_json::from_str::<StoreData>(&raw) {
                Ok(data) => data,
                Err(e) => {
                    warn!(path = %self.path.display(), "discarding unparseable cache file: {e}");
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => {
                warn!(path = %self.path.display(), "failed to read cache file: {e}");
                HashMap::new()
            }
        };
        *self.data.write() = loaded;
    }

    /// Persist the store to disk, creating parent directories as needed.
    pub async fn save(&self) -> Result<(), CacheError> {
        let json = {
            let data = self.data.read();
            serde_json::to_string_pretty(&*data)?
        };
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| CacheError::Write {
                    path: self.path.clone(),
                    source,
                })?;
        }
        tokio::fs::write(&self.path, json)
            .await
            .map_err(|source| CacheError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Wipe the store unconditionally (in memory; the file is only
    /// rewritten by the next [`save`](Self::save)).
    pub fn drop_all(&self) {
        self.data.write().clear();
    }

    /// Read a value.
    pub fn get(&self, prefix: &str, key: &str) -> Option<Value> {
        self.data.read().get(prefix)?.get(key).cloned()
    }

    /// Write a value.
    pub fn set(&self, prefix: &str, key: &str, value: Value) {
        self.data
            .write()
            .entry(prefix.to_owned())
            .or_default()
            .insert(key.to_owned(), value);
    }

    /// Remove a single key. Returns the removed value if present.
    pub fn remove(&self, prefix: &str, key: &str) -> Option<Value> {
        self.data.write().get_mut(prefix)?.remove(key)
    }

    /// Drop a whole namespace and every namespace nested under it
    /// (`"p"` also drops `"p/sub"`).
    pub fn drop_prefix(&self, prefix: &str) {
        let nested = format!("{prefix}/");
        self.data
            .write()
            .retain(|existing, _| existing != prefix && !existing.starts_with(&nested));
    }

    /// Whether the store holds no values at all.
    pub fn is_empty(&self) -> bool {
        self.data.read().values().all(HashMap::is_empty)
    }

    /// All namespace names currently present.
    pub fn prefixes(&self) -> Vec<String> {
        self.data.read().keys().cloned().collect()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
