//! Cache error types.

use std::path::PathBuf;

/// Errors raised while persisting the cache store.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Store file could not be written.
    #[error("failed to write cache file {}: {source}", path.display())]
    Write {
        /// Cache file path.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Store content could not be serialized.
    #[error("failed to serialize cache store: {0}")]
    Serialize(#[from] serde_json::Error),
}
