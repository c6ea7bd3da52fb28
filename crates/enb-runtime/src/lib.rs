//! # enb-runtime
//!
//! The build orchestrator core. [`MakePlatform`] coordinates one project:
//!
//! - rule-file discovery and evaluation into a project config
//! - longest-prefix routing of target strings to build nodes
//! - at-most-once (memoized) asynchronous node initialization
//! - concurrent build/clean fan-out with first-error propagation
//! - persistent incremental-build cache keyed by tool version, build
//!   mode, and rule-file mtimes
//! - named tasks as an alternative entry point to target builds

#![deny(unsafe_code)]

pub mod cache_validation;
pub mod discovery;
pub mod errors;
pub mod node;
pub mod platform;
pub mod resolver;
pub mod tasks;

pub use discovery::MakeFileKind;
pub use errors::MakeError;
pub use node::{LocalNode, LocalNodeFactory, Node, NodeBuildResult, NodeError, NodeFactory};
pub use platform::{BuildOutcome, BuildResult, MakePlatform, NodeInitFailure};
pub use resolver::{resolve_targets, ResolvedTarget, WILDCARD};
pub use tasks::{CleanTask, CommandTask, Task, TaskError};
