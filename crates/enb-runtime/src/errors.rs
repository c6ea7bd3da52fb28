//! Orchestrator error types.

use std::path::PathBuf;

use enb_cache::CacheError;
use enb_core::ConfigError;

use crate::node::NodeError;

/// Errors surfaced by the make platform.
#[derive(Debug, thiserror::Error)]
pub enum MakeError {
    /// Neither `.enb` nor `.bem` exists under the project dir.
    #[error("config dir not found in {}", project_dir.display())]
    ConfigDirNotFound {
        /// The project directory that was probed.
        project_dir: PathBuf,
    },

    /// The required primary rule file is missing.
    #[error("make file not found in {}", config_dir.display())]
    MakefileNotFound {
        /// The config directory that was probed.
        config_dir: PathBuf,
    },

    /// A rule file failed to load or apply; forwarded verbatim.
    #[error(transparent)]
    RuleEvaluation(#[from] ConfigError),

    /// A requested target matches no registered node.
    #[error("target not found: {0}")]
    TargetNotFound(String),

    /// Node initialization failed. Every waiter on the memoized init
    /// future observes the same failure.
    #[error("node {path} failed to initialize: {message}")]
    NodeInit {
        /// Node path.
        path: String,
        /// Flattened cause.
        message: String,
    },

    /// A node's build failed.
    #[error("node {path} failed to build: {message}")]
    NodeBuild {
        /// Node path.
        path: String,
        /// Flattened cause.
        message: String,
    },

    /// A node's clean failed.
    #[error("node {path} failed to clean: {message}")]
    NodeClean {
        /// Node path.
        path: String,
        /// Flattened cause.
        message: String,
    },

    /// A node operation failed outside the init/build/clean pipelines.
    #[error(transparent)]
    Node(#[from] NodeError),

    /// No task registered under the given name.
    #[error("task not found: {0}")]
    TaskNotFound(String),

    /// A task ran and failed.
    #[error("task {name} failed: {message}")]
    Task {
        /// Task name.
        name: String,
        /// Flattened cause.
        message: String,
    },

    /// Cache persistence error.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// The platform was destructed; no further operations are possible.
    #[error("platform has been destructed")]
    Destroyed,

    /// Internal invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}
