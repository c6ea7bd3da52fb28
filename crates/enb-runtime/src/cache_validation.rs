//! Cache validity bookkeeping.
//!
//! The platform stamps the persistent store with the build mode, the tool
//! version, and an mtime snapshot of every rule file under the reserved
//! `:make` namespace. On load, any difference between the stamp and the
//! current state invalidates the whole store.
//!
//! Only rule files that currently exist on disk participate in the
//! snapshot, so deleting a makefile does not by itself invalidate the
//! cache.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::UNIX_EPOCH;

use enb_cache::CacheStorage;
use serde_json::Value;

/// Namespace reserved for the platform's own bookkeeping.
pub const MAKE_NAMESPACE: &str = ":make";

const MODE_KEY: &str = "mode";
const VERSION_KEY: &str = "version";
const MAKEFILES_KEY: &str = "makefiles";

/// Snapshot `path → mtime(ms)` for the rule files that exist on disk.
pub(crate) fn makefile_mtimes(paths: &[PathBuf]) -> HashMap<String, u64> {
    let mut mtimes = HashMap::new();
    for path in paths {
        let Ok(metadata) = std::fs::metadata(path) else {
            continue;
        };
        let Ok(modified) = metadata.modified() else {
            continue;
        };
        let millis = modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        mtimes.insert(path.to_string_lossy().into_owned(), millis);
    }
    mtimes
}

/// Whether the stored stamp disagrees with the current state.
pub(crate) fn is_stale(
    storage: &CacheStorage,
    mode: &str,
    version: &str,
    mtimes: &HashMap<String, u64>,
) -> bool {
    if storage.get(MAKE_NAMESPACE, MODE_KEY) != Some(Value::from(mode)) {
        return true;
    }
    if storage.get(MAKE_NAMESPACE, VERSION_KEY) != Some(Value::from(version)) {
        return true;
    }

    let stored = storage.get(MAKE_NAMESPACE, MAKEFILES_KEY);
    let stored = stored.as_ref().and_then(Value::as_object);
    for (path, mtime) in mtimes {
        let stored_mtime = stored.and_then(|m| m.get(path)).and_then(Value::as_u64);
        if stored_mtime != Some(*mtime) {
            return true;
        }
    }
    false
}

/// Write the current stamp into the reserved namespace.
pub(crate) fn write_stamp(
    storage: &CacheStorage,
    mode: &str,
    version: &str,
    mtimes: &HashMap<String, u64>,
) {
    storage.set(MAKE_NAMESPACE, MODE_KEY, Value::from(mode));
    storage.set(MAKE_NAMESPACE, VERSION_KEY, Value::from(version));
    storage.set(
        MAKE_NAMESPACE,
        MAKEFILES_KEY,
        serde_json::to_value(mtimes).unwrap_or_default(),
    );
}
