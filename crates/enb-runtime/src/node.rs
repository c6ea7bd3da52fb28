//! Build nodes.
//!
//! A node is one build unit rooted at a directory under the project. The
//! orchestrator only depends on the [`Node`] trait: it constructs nodes
//! through a [`NodeFactory`], configures them from the effective node
//! config, and asks them to build or clean sub-targets. [`LocalNode`] is
//! the shipped implementation; tests substitute their own factories.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::json;

use enb_cache::Cache;
use enb_core::{BuildGraph, BuildState, Logger, TechConfig};

use crate::resolver::WILDCARD;

/// Errors raised inside a node.
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    /// Two techs with the same name were configured on one node.
    #[error("tech `{tech}` is registered twice on node {node}")]
    TechConflict {
        /// Node path.
        node: String,
        /// Conflicting tech name.
        tech: String,
    },

    /// A required source is not produced by the node.
    #[error("node {node} does not provide source `{source_target}`")]
    UnknownSource {
        /// Node path.
        node: String,
        /// The missing source target.
        source_target: String,
    },

    /// Filesystem error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Targets produced by one node build.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct NodeBuildResult {
    /// Built target paths, qualified with the node path.
    pub built_targets: Vec<String>,
}

/// The node interface the orchestrator consumes.
#[async_trait]
pub trait Node: Send + Sync {
    /// Node path relative to the project dir.
    fn path(&self) -> &str;

    /// The node's sub-logger.
    fn logger(&self) -> Logger;

    /// Attach the node's sub-logger.
    fn set_logger(&self, logger: Logger);

    /// Attach the shared build graph.
    fn set_build_graph(&self, graph: Arc<BuildGraph>);

    /// Set the effective language list.
    fn set_languages(&self, languages: Vec<String>);

    /// Set the targets a wildcard build produces.
    fn set_targets_to_build(&self, targets: Vec<String>);

    /// Set the additional targets a clean removes.
    fn set_targets_to_clean(&self, targets: Vec<String>);

    /// Set the configured techs.
    fn set_techs(&self, techs: Vec<TechConfig>);

    /// Attach the shared build state.
    fn set_build_state(&self, state: Arc<BuildState>);

    /// Load and validate the configured techs.
    async fn load_techs(&self) -> Result<(), NodeError>;

    /// Build the given sub-targets (`"*"` expands to the configured list).
    async fn build(&self, targets: &[String]) -> Result<NodeBuildResult, NodeError>;

    /// Remove artifacts for the given sub-targets. Returns what was removed.
    async fn clean(&self, targets: &[String]) -> Result<Vec<String>, NodeError>;

    /// Assert that the given source targets are available from this node.
    async fn require_sources(&self, sources: &[String]) -> Result<(), NodeError>;

    /// Release per-node resources. Called once by the platform.
    fn destruct(&self);
}

/// Constructs nodes on behalf of the platform.
pub trait NodeFactory: Send + Sync {
    /// Create a node for `node_path`, with its scoped cache view.
    fn create(&self, node_path: &str, project_dir: &Path, cache: Cache) -> Arc<dyn Node>;
}

/// Factory producing [`LocalNode`]s.
#[derive(Debug, Default)]
pub struct LocalNodeFactory;

impl NodeFactory for LocalNodeFactory {
    fn create(&self, node_path: &str, project_dir: &Path, cache: Cache) -> Arc<dyn Node> {
        Arc::new(LocalNode::new(node_path, project_dir, cache))
    }
}

/// Default node implementation.
///
/// Techs are opaque configuration here; the node materialises wildcard
/// requests from its configured target list, records results in the build
/// graph and its cache namespace, and removes artifact files on clean.
pub struct LocalNode {
    path: String,
    dir: PathBuf,
    cache: Cache,
    logger: RwLock<Logger>,
    graph: RwLock<Option<Arc<BuildGraph>>>,
    languages: RwLock<Vec<String>>,
    targets_to_build: RwLock<Vec<String>>,
    targets_to_clean: RwLock<Vec<String>>,
    techs: RwLock<Vec<TechConfig>>,
    build_state: RwLock<Option<Arc<BuildState>>>,
    techs_loaded: AtomicBool,
}

impl LocalNode {
    /// Create a node rooted at `{project_dir}/{node_path}`.
    pub fn new(node_path: &str, project_dir: &Path, cache: Cache) -> Self {
        Self {
            path: node_path.to_owned(),
            dir: project_dir.join(node_path),
            cache,
            logger: RwLock::new(Logger::with_scope(node_path)),
            graph: RwLock::new(None),
            languages: RwLock::new(Vec::new()),
            targets_to_build: RwLock::new(Vec::new()),
            targets_to_clean: RwLock::new(Vec::new()),
            techs: RwLock::new(Vec::new()),
            build_state: RwLock::new(None),
            techs_loaded: AtomicBool::new(false),
        }
    }

    /// Node directory on disk.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Effective language list.
    pub fn languages(&self) -> Vec<String> {
        self.languages.read().clone()
    }

    /// Whether `load_techs` has completed.
    pub fn techs_loaded(&self) -> bool {
        self.techs_loaded.load(Ordering::Relaxed)
    }

    fn qualify(&self, target: &str) -> String {
        format!("{}/{}", self.path, target)
    }

    /// Expand requested sub-targets, replacing the wildcard with the
    /// configured lists. First-seen order, deduplicated.
    fn expand(&self, requested: &[String], include_clean_targets: bool) -> Vec<String> {
        let mut expanded: Vec<String> = Vec::new();
        let mut push = |target: &str| {
            if !expanded.iter().any(|existing| existing == target) {
                expanded.push(target.to_owned());
            }
        };
        for target in requested {
            if target == WILDCARD {
                for configured in self.targets_to_build.read().iter() {
                    push(configured);
                }
                if include_clean_targets {
                    for configured in self.targets_to_clean.read().iter() {
                        push(configured);
                    }
                }
            } else {
                push(target);
            }
        }
        expanded
    }
}

#[async_trait]
impl Node for LocalNode {
    fn path(&self) -> &str {
        &self.path
    }

    fn logger(&self) -> Logger {
        self.logger.read().clone()
    }

    fn set_logger(&self, logger: Logger) {
        *self.logger.write() = logger;
    }

    fn set_build_graph(&self, graph: Arc<BuildGraph>) {
        *self.graph.write() = Some(graph);
    }

    fn set_languages(&self, languages: Vec<String>) {
        *self.languages.write() = languages;
    }

    fn set_targets_to_build(&self, targets: Vec<String>) {
        *self.targets_to_build.write() = targets;
    }

    fn set_targets_to_clean(&self, targets: Vec<String>) {
        *self.targets_to_clean.write() = targets;
    }

    fn set_techs(&self, techs: Vec<TechConfig>) {
        *self.techs.write() = techs;
    }

    fn set_build_state(&self, state: Arc<BuildState>) {
        *self.build_state.write() = Some(state);
    }

    async fn load_techs(&self) -> Result<(), NodeError> {
        let techs = self.techs.read().clone();
        for (idx, tech) in techs.iter().enumerate() {
            if techs[..idx].iter().any(|t| t.tech == tech.tech) {
                return Err(NodeError::TechConflict {
                    node: self.path.clone(),
                    tech: tech.tech.clone(),
                });
            }
        }
        self.techs_loaded.store(true, Ordering::Relaxed);
        Ok(())
    }

    async fn build(&self, targets: &[String]) -> Result<NodeBuildResult, NodeError> {
        let logger = self.logger();
        let expanded = self.expand(targets, false);
        let mut built_targets = Vec::with_capacity(expanded.len());

        for target in &expanded {
            let qualified = self.qualify(target);
            if let Some(graph) = self.graph.read().clone() {
                graph.register_target(&qualified);
            }
            let action = if self.cache.get(target).is_some() {
                "rebuild"
            } else {
                "build"
            };
            logger.log_action(action, &qualified);
            self.cache.set(target, json!({ "builtAt": now_millis() }));
            built_targets.push(qualified);
        }

        Ok(NodeBuildResult { built_targets })
    }

    async fn clean(&self, targets: &[String]) -> Result<Vec<String>, NodeError> {
        let logger = self.logger();
        let expanded = self.expand(targets, true);
        let mut removed = Vec::new();

        for target in &expanded {
            let qualified = self.qualify(target);
            match tokio::fs::remove_file(self.dir.join(target)).await {
                Ok(()) => {
                    logger.log_action("clean", &qualified);
                    removed.push(qualified);
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => return Err(NodeError::Io(e)),
            }
            self.cache.invalidate(target);
        }

        Ok(removed)
    }

    async fn require_sources(&self, sources: &[String]) -> Result<(), NodeError> {
        let targets = self.targets_to_build.read().clone();
        for source in sources {
            if source != WILDCARD && !targets.iter().any(|t| t == source) {
                return Err(NodeError::UnknownSource {
                    node: self.path.clone(),
                    source_target: source.clone(),
                });
            }
        }
        Ok(())
    }

    fn destruct(&self) {
        self.logger.read().set_enabled(false);
        *self.graph.write() = None;
        *self.build_state.write() = None;
        self.targets_to_build.write().clear();
        self.targets_to_clean.write().clear();
        self.techs.write().clear();
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use enb_cache::CacheStorage;
    use tempfile::TempDir;

    fn make_node(tmp: &TempDir) -> LocalNode {
        let cache = Cache::new(Arc::new(CacheStorage::new("/unused")), "project");
        let node = LocalNode::new("bundles/page", tmp.path(), cache.sub_cache("bundles/page"));
        node.set_targets_to_build(vec!["page.js".into(), "page.css".into()]);
        node.set_targets_to_clean(vec!["page.js.map".into()]);
        node
    }

    #[tokio::test]
    async fn wildcard_build_materialises_configured_targets() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        let result = node.build(&["*".to_owned()]).await.unwrap();
        assert_eq!(
            result.built_targets,
            vec!["bundles/page/page.js", "bundles/page/page.css"]
        );
    }

    #[tokio::test]
    async fn specific_targets_build_as_requested() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        let result = node.build(&["page.css".to_owned()]).await.unwrap();
        assert_eq!(result.built_targets, vec!["bundles/page/page.css"]);
    }

    #[tokio::test]
    async fn build_deduplicates_wildcard_and_specific() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        let result = node
            .build(&["*".to_owned(), "page.js".to_owned()])
            .await
            .unwrap();
        assert_eq!(
            result.built_targets,
            vec!["bundles/page/page.js", "bundles/page/page.css"]
        );
    }

    #[tokio::test]
    async fn build_records_targets_in_graph_and_cache() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        let graph = Arc::new(BuildGraph::new("project"));
        node.set_build_graph(Arc::clone(&graph));

        node.build(&["page.js".to_owned()]).await.unwrap();
        assert_eq!(graph.targets(), vec!["bundles/page/page.js"]);
        assert!(node.cache.get("page.js").is_some());
    }

    #[tokio::test]
    async fn clean_removes_artifacts_and_cache_entries() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        std::fs::create_dir_all(node.dir()).unwrap();
        std::fs::write(node.dir().join("page.js"), "js").unwrap();
        std::fs::write(node.dir().join("page.js.map"), "map").unwrap();
        node.cache.set("page.js", json!({"builtAt": 1}));

        let removed = node.clean(&["*".to_owned()]).await.unwrap();
        assert_eq!(
            removed,
            vec!["bundles/page/page.js", "bundles/page/page.js.map"]
        );
        assert!(!node.dir().join("page.js").exists());
        assert!(node.cache.get("page.js").is_none());
    }

    #[tokio::test]
    async fn clean_of_absent_artifacts_is_quiet() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        let removed = node.clean(&["*".to_owned()]).await.unwrap();
        assert!(removed.is_empty());
    }

    #[tokio::test]
    async fn load_techs_rejects_duplicates() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        node.set_techs(vec![
            TechConfig {
                tech: "copy".into(),
                options: serde_json::Value::Null,
            },
            TechConfig {
                tech: "copy".into(),
                options: serde_json::Value::Null,
            },
        ]);
        let err = node.load_techs().await.unwrap_err();
        assert!(matches!(err, NodeError::TechConflict { .. }));
        assert!(!node.techs_loaded());
    }

    #[tokio::test]
    async fn load_techs_accepts_distinct_names() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        node.set_techs(vec![TechConfig {
            tech: "copy".into(),
            options: serde_json::Value::Null,
        }]);
        node.load_techs().await.unwrap();
        assert!(node.techs_loaded());
    }

    #[tokio::test]
    async fn require_sources_checks_configured_targets() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        node.require_sources(&["page.js".to_owned()]).await.unwrap();
        let err = node
            .require_sources(&["missing.js".to_owned()])
            .await
            .unwrap_err();
        assert!(matches!(err, NodeError::UnknownSource { .. }));
    }

    #[tokio::test]
    async fn destruct_disables_the_logger() {
        let tmp = TempDir::new().unwrap();
        let node = make_node(&tmp);
        let logger = node.logger();
        node.destruct();
        assert!(!logger.is_enabled());
    }
}
