//! The make platform — top-level build coordinator.
//!
//! One platform instance owns a project for its lifetime: it evaluates the
//! project's rule files into a [`ProjectConfig`], routes requested targets
//! to nodes, initializes every node at most once, fans build/clean out over
//! the resolved set, and keeps the incremental-build store valid against
//! tool version, build mode, and rule-file edits.
//!
//! The platform is constructed behind `Arc` (via [`Arc::new_cyclic`]) and
//! keeps a `Weak` handle to itself: the memoized node-init futures are
//! `'static` and must carry a platform handle without keeping the platform
//! alive on their own.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Instant;

use dashmap::DashMap;
use futures::future::{join_all, BoxFuture, Shared};
use futures::FutureExt;
use parking_lot::RwLock;
use serde_json::Value;
use tracing::debug;

use enb_cache::{Cache, CacheStorage};
use enb_core::{
    evaluate_mode, evaluate_rule_file, BuildGraph, BuildState, LevelNamingScheme, Logger,
    NodeConfig, ProjectConfig,
};

use crate::cache_validation;
use crate::discovery::{self, MakeFileKind};
use crate::errors::MakeError;
use crate::node::{LocalNodeFactory, Node, NodeFactory};
use crate::resolver::{self, ResolvedTarget};
use crate::tasks::{CleanTask, CommandTask, Task};

/// Mode used when neither an argument nor `YENV` supplies one.
const DEFAULT_MODE: &str = "development";

/// Environment variable consulted for the build mode.
const MODE_ENV_VAR: &str = "YENV";

/// Tool version participating in cache validity.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Cloneable failure delivered to every waiter of a memoized node init.
#[derive(Clone, Debug)]
pub struct NodeInitFailure {
    /// Node path.
    pub node_path: String,
    /// Flattened cause.
    pub message: String,
}

impl From<NodeInitFailure> for MakeError {
    fn from(failure: NodeInitFailure) -> Self {
        MakeError::NodeInit {
            path: failure.node_path,
            message: failure.message,
        }
    }
}

/// Memoized node-init future. All callers share one outcome.
pub type InitFuture = Shared<BoxFuture<'static, Result<(), NodeInitFailure>>>;

/// Result of building targets.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuildResult {
    /// Flat list of built targets across all nodes.
    pub built_targets: Vec<String>,
}

/// What a [`MakePlatform::build`] invocation ended up doing.
#[derive(Clone, Debug, PartialEq)]
pub enum BuildOutcome {
    /// The inputs were target paths.
    Targets(BuildResult),
    /// The first input named a registered task; its value is forwarded.
    Task(Value),
}

/// Top-level build coordinator.
pub struct MakePlatform {
    me: Weak<MakePlatform>,
    project_dir: PathBuf,
    project_name: String,
    mode: String,
    config_dir: PathBuf,
    makefile_paths: Vec<PathBuf>,
    project_config: ProjectConfig,
    env: RwLock<HashMap<String, String>>,
    languages: RwLock<Option<Vec<String>>>,
    level_naming_schemes: RwLock<HashMap<String, LevelNamingScheme>>,
    logger: RwLock<Logger>,
    build_graph: Arc<BuildGraph>,
    cache_storage: RwLock<Arc<CacheStorage>>,
    cache: RwLock<Option<Cache>>,
    build_state: Arc<BuildState>,
    nodes: DashMap<String, Arc<dyn Node>>,
    node_init_futures: DashMap<String, InitFuture>,
    tasks: RwLock<HashMap<String, Arc<dyn Task>>>,
    node_factory: Box<dyn NodeFactory>,
    destroyed: AtomicBool,
}

impl std::fmt::Debug for MakePlatform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MakePlatform")
            .field("project_dir", &self.project_dir)
            .field("project_name", &self.project_name)
            .field("mode", &self.mode)
            .finish_non_exhaustive()
    }
}

impl MakePlatform {
    /// Initialize a platform for a project directory.
    ///
    /// Discovers the config dir, evaluates the primary (and, if present,
    /// personal) rule file plus includes, applies the active mode's
    /// overlay, and prepares the cache storage under `{configDir}/tmp`.
    /// Rule files are re-read on every init.
    pub async fn init(
        project_dir: impl Into<PathBuf>,
        mode: Option<&str>,
    ) -> Result<Arc<Self>, MakeError> {
        Self::init_with_factory(project_dir, mode, Box::new(LocalNodeFactory)).await
    }

    /// [`init`](Self::init) with a custom node factory.
    pub async fn init_with_factory(
        project_dir: impl Into<PathBuf>,
        mode: Option<&str>,
        node_factory: Box<dyn NodeFactory>,
    ) -> Result<Arc<Self>, MakeError> {
        let project_dir = project_dir.into();
        let mode = resolve_mode(mode);
        let config_dir = discovery::find_config_dir(&project_dir)?;

        let primary = discovery::find_make_file(&config_dir, MakeFileKind::Make).ok_or_else(
            || MakeError::MakefileNotFound {
                config_dir: config_dir.clone(),
            },
        )?;
        let personal = discovery::find_make_file(&config_dir, MakeFileKind::Personal);

        let mut project_config = ProjectConfig::new(&project_dir);
        evaluate_rule_file(&mut project_config, &config_dir, &primary)?;
        if let Some(personal) = &personal {
            evaluate_rule_file(&mut project_config, &config_dir, personal)?;
        }

        let mut makefile_paths = vec![primary];
        makefile_paths.extend(personal);
        makefile_paths.extend(project_config.included_config_filenames().iter().cloned());

        evaluate_mode(&mut project_config, &mode);

        let project_name = project_dir
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        let tmp_dir = config_dir.join("tmp");
        tokio::fs::create_dir_all(&tmp_dir).await?;
        let cache_storage = Arc::new(CacheStorage::new(tmp_dir.join("cache.js")));

        let mut tasks: HashMap<String, Arc<dyn Task>> = HashMap::new();
        for (name, task_config) in project_config.task_configs() {
            tasks.insert(name.clone(), Arc::new(CommandTask::new(name, task_config)));
        }
        tasks.insert("clean".to_owned(), Arc::new(CleanTask));

        let env = project_config.env().clone();
        let languages = project_config.languages().map(<[String]>::to_vec);
        let level_naming_schemes = project_config.level_naming_schemes().clone();

        debug!(
            project = %project_name,
            mode = %mode,
            makefiles = makefile_paths.len(),
            "platform initialized"
        );

        Ok(Arc::new_cyclic(|me| Self {
            me: me.clone(),
            build_graph: Arc::new(BuildGraph::new(&project_name)),
            project_dir,
            project_name,
            mode,
            config_dir,
            makefile_paths,
            project_config,
            env: RwLock::new(env),
            languages: RwLock::new(languages),
            level_naming_schemes: RwLock::new(level_naming_schemes),
            logger: RwLock::new(Logger::new()),
            cache_storage: RwLock::new(cache_storage),
            cache: RwLock::new(None),
            build_state: Arc::new(BuildState::new()),
            nodes: DashMap::new(),
            node_init_futures: DashMap::new(),
            tasks: RwLock::new(tasks),
            node_factory,
            destroyed: AtomicBool::new(false),
        }))
    }

    // ── Cache lifecycle ────────────────────────────────────────────────

    /// Load the persistent store, dropping it when stale.
    ///
    /// The store is stale when the saved mode, tool version, or any
    /// currently existing rule file's mtime differs from the stamp under
    /// the `:make` namespace.
    pub async fn load_cache(&self) {
        let storage = self.cache_storage.read().clone();
        storage.load().await;
        let mtimes = cache_validation::makefile_mtimes(&self.makefile_paths);
        if cache_validation::is_stale(&storage, &self.mode, VERSION, &mtimes) {
            debug!("cache is stale, dropping");
            storage.drop_all();
        }
    }

    /// Stamp the store with the current mode, version, and rule-file
    /// mtimes, then persist it.
    pub async fn save_cache(&self) -> Result<(), MakeError> {
        let storage = self.cache_storage.read().clone();
        let mtimes = cache_validation::makefile_mtimes(&self.makefile_paths);
        cache_validation::write_stamp(&storage, &self.mode, VERSION, &mtimes);
        storage.save().await?;
        Ok(())
    }

    /// Wipe the persistent store unconditionally.
    pub fn drop_cache(&self) {
        self.cache_storage.read().drop_all();
    }

    // ── Node initialization ────────────────────────────────────────────

    /// Initialize a node, at most once per platform lifetime.
    ///
    /// The first call registers a shared future before its first suspension
    /// point; every later call (concurrent or not) receives that same
    /// future, so the init pipeline runs exactly once and all waiters
    /// observe one outcome.
    pub fn init_node(&self, node_path: &str) -> InitFuture {
        if let Some(existing) = self.node_init_futures.get(node_path) {
            return existing.clone();
        }

        let me = self.me.clone();
        let path = node_path.to_owned();
        let future = async move {
            let Some(platform) = me.upgrade() else {
                return Err(NodeInitFailure {
                    node_path: path,
                    message: "platform released".to_owned(),
                });
            };
            platform
                .run_node_init(&path)
                .await
                .map_err(|e| NodeInitFailure {
                    node_path: path,
                    message: e.to_string(),
                })
        }
        .boxed()
        .shared();

        // entry() arbitrates racing callers: only one future survives.
        self.node_init_futures
            .entry(node_path.to_owned())
            .or_insert(future)
            .clone()
    }

    async fn run_node_init(&self, node_path: &str) -> Result<(), MakeError> {
        tokio::fs::create_dir_all(self.project_dir.join(node_path)).await?;

        let cache = self.current_cache();
        let node = self
            .node_factory
            .create(node_path, &self.project_dir, cache.sub_cache(node_path));
        node.set_logger(self.logger.read().sub_logger(node_path));
        node.set_build_graph(Arc::clone(&self.build_graph));
        self.nodes.insert(node_path.to_owned(), Arc::clone(&node));

        // Effective config: base, then matching masks in registration
        // order, then the node's overlay for the active mode.
        let mut effective = self
            .project_config
            .node_config(node_path)
            .cloned()
            .unwrap_or_else(|| NodeConfig {
                path: node_path.to_owned(),
                ..Default::default()
            });
        for patch in self.project_config.mask_patches_for(node_path) {
            effective.apply(patch);
        }
        if let Some(patch) = effective.modes.get(&self.mode).cloned() {
            effective.apply(&patch);
        }

        let languages = effective
            .languages
            .clone()
            .or_else(|| self.languages.read().clone())
            .unwrap_or_default();
        node.set_languages(languages);
        node.set_targets_to_build(effective.targets.clone());
        node.set_targets_to_clean(effective.clean_targets.clone());
        node.set_techs(effective.techs.clone());
        node.set_build_state(Arc::clone(&self.build_state));

        node.load_techs().await?;
        debug!(node_path, "node initialized");
        Ok(())
    }

    fn current_cache(&self) -> Cache {
        let mut cache = self.cache.write();
        cache
            .get_or_insert_with(|| {
                Cache::new(self.cache_storage.read().clone(), &self.project_name)
            })
            .clone()
    }

    // ── Build driver ───────────────────────────────────────────────────

    /// Build targets, or run a task when the first input names one.
    ///
    /// Logs `build started` / `build finished - <ms>ms` / `build failed`;
    /// on success every per-node sub-logger is disabled before the call
    /// resolves.
    pub async fn build(&self, targets: &[String]) -> Result<BuildOutcome, MakeError> {
        let started = Instant::now();
        let logger = self.logger.read().clone();
        logger.log("build started");

        let result = self.dispatch(targets).await;
        match &result {
            Ok(_) => {
                for entry in self.nodes.iter() {
                    entry.value().logger().set_enabled(false);
                }
                logger.log(format!(
                    "build finished - {}ms",
                    started.elapsed().as_millis()
                ));
            }
            Err(_) => logger.log("build failed"),
        }
        result
    }

    async fn dispatch(&self, targets: &[String]) -> Result<BuildOutcome, MakeError> {
        if let Some(first) = targets.first() {
            if self.has_task(first) {
                let value = self.build_task(first, &targets[1..]).await?;
                return Ok(BuildOutcome::Task(value));
            }
        }
        self.build_targets(targets).await.map(BuildOutcome::Targets)
    }

    /// Resolve, initialize, and build the given targets.
    pub async fn build_targets(&self, targets: &[String]) -> Result<BuildResult, MakeError> {
        self.ensure_alive()?;
        let resolved = self.prepare(targets)?;
        self.init_resolved(&resolved).await?;

        let builds = resolved.iter().map(|item| {
            let node = self.node(&item.node_path);
            let targets = item.targets.clone();
            async move {
                let node = node?;
                node.build(&targets)
                    .await
                    .map_err(|e| MakeError::NodeBuild {
                        path: node.path().to_owned(),
                        message: e.to_string(),
                    })
            }
        });

        let mut built_targets = Vec::new();
        for result in join_all(builds).await {
            built_targets.extend(result?.built_targets);
        }
        Ok(BuildResult { built_targets })
    }

    /// Resolve, initialize, and clean the given targets.
    pub async fn clean_targets(&self, targets: &[String]) -> Result<(), MakeError> {
        self.ensure_alive()?;
        let resolved = self.prepare(targets)?;
        self.init_resolved(&resolved).await?;

        let cleans = resolved.iter().map(|item| {
            let node = self.node(&item.node_path);
            let targets = item.targets.clone();
            async move {
                let node = node?;
                node.clean(&targets)
                    .await
                    .map_err(|e| MakeError::NodeClean {
                        path: node.path().to_owned(),
                        message: e.to_string(),
                    })
            }
        });

        for result in join_all(cleans).await {
            let _ = result?;
        }
        Ok(())
    }

    /// Run a registered task by name, forwarding its value.
    pub async fn build_task(&self, name: &str, args: &[String]) -> Result<Value, MakeError> {
        self.ensure_alive()?;
        let task = self
            .tasks
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| MakeError::TaskNotFound(name.to_owned()))?;
        let platform = self
            .me
            .upgrade()
            .ok_or_else(|| MakeError::Internal("platform released".to_owned()))?;
        task.run(&platform, args)
            .await
            .map_err(|e| MakeError::Task {
                name: name.to_owned(),
                message: e.to_string(),
            })
    }

    /// Initialize a node and require the given sources from it.
    pub async fn require_node_sources(
        &self,
        node_path: &str,
        sources: &[String],
    ) -> Result<(), MakeError> {
        self.ensure_alive()?;
        self.init_node(node_path).await.map_err(MakeError::from)?;
        let node = self.node(node_path)?;
        node.require_sources(sources).await.map_err(MakeError::from)
    }

    /// Replace the per-invocation cache and resolve the inputs.
    fn prepare(&self, targets: &[String]) -> Result<Vec<ResolvedTarget>, MakeError> {
        *self.cache.write() = Some(Cache::new(
            self.cache_storage.read().clone(),
            &self.project_name,
        ));
        resolver::resolve_targets(&self.project_config.node_paths(), targets)
    }

    /// Initialize every resolved node; all inits complete before return.
    async fn init_resolved(&self, resolved: &[ResolvedTarget]) -> Result<(), MakeError> {
        let futures: Vec<InitFuture> = resolved
            .iter()
            .map(|item| self.init_node(&item.node_path))
            .collect();
        for result in join_all(futures).await {
            result.map_err(MakeError::from)?;
        }
        Ok(())
    }

    fn node(&self, node_path: &str) -> Result<Arc<dyn Node>, MakeError> {
        self.nodes
            .get(node_path)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| MakeError::Internal(format!("node {node_path} vanished after init")))
    }

    fn ensure_alive(&self) -> Result<(), MakeError> {
        if self.destroyed.load(Ordering::SeqCst) {
            return Err(MakeError::Destroyed);
        }
        Ok(())
    }

    // ── Accessors ──────────────────────────────────────────────────────

    /// Project directory.
    pub fn dir(&self) -> &Path {
        &self.project_dir
    }

    /// Project name (base name of the project dir).
    pub fn project_name(&self) -> &str {
        &self.project_name
    }

    /// Active build mode.
    pub fn mode(&self) -> &str {
        &self.mode
    }

    /// Config directory chosen at init.
    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// Rule files in force, includes last.
    pub fn makefile_paths(&self) -> &[PathBuf] {
        &self.makefile_paths
    }

    /// Env values.
    pub fn env(&self) -> HashMap<String, String> {
        self.env.read().clone()
    }

    /// Replace the env values.
    pub fn set_env(&self, env: HashMap<String, String>) {
        *self.env.write() = env;
    }

    /// Read a single env value.
    pub fn env_value(&self, key: &str) -> Option<String> {
        self.env.read().get(key).cloned()
    }

    /// Platform-wide language list.
    #[deprecated(note = "configure languages per node instead")]
    pub fn languages(&self) -> Option<Vec<String>> {
        self.languages.read().clone()
    }

    /// Replace the platform-wide language list.
    #[deprecated(note = "configure languages per node instead")]
    pub fn set_languages(&self, languages: Vec<String>) {
        *self.languages.write() = Some(languages);
    }

    /// Top-level logger.
    pub fn logger(&self) -> Logger {
        self.logger.read().clone()
    }

    /// Replace the top-level logger. Nodes initialized afterwards derive
    /// their sub-loggers from the new one.
    pub fn set_logger(&self, logger: Logger) {
        *self.logger.write() = logger;
    }

    /// The persistent cache storage.
    pub fn cache_storage(&self) -> Arc<CacheStorage> {
        self.cache_storage.read().clone()
    }

    /// Replace the cache storage.
    pub fn set_cache_storage(&self, storage: Arc<CacheStorage>) {
        *self.cache_storage.write() = storage;
    }

    /// The shared build graph.
    pub fn build_graph(&self) -> &Arc<BuildGraph> {
        &self.build_graph
    }

    /// The project configuration assembled at init.
    pub fn project_config(&self) -> &ProjectConfig {
        &self.project_config
    }

    /// The shared build state.
    pub fn build_state(&self) -> &Arc<BuildState> {
        &self.build_state
    }

    /// Naming scheme registered for a level path.
    pub fn level_naming_scheme(&self, level_path: &str) -> Option<LevelNamingScheme> {
        self.level_naming_schemes.read().get(level_path).cloned()
    }

    /// Whether a task is registered under `name`.
    pub fn has_task(&self, name: &str) -> bool {
        self.tasks.read().contains_key(name)
    }

    /// Paths of nodes initialized so far.
    pub fn initialized_nodes(&self) -> Vec<String> {
        self.nodes.iter().map(|entry| entry.key().clone()).collect()
    }

    // ── Teardown ───────────────────────────────────────────────────────

    /// Tear the platform down. Further operations fail with
    /// [`MakeError::Destroyed`]; calling destruct again is a no-op.
    pub fn destruct(&self) {
        if self.destroyed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.build_state.clear();
        for entry in self.nodes.iter() {
            entry.value().destruct();
        }
        self.nodes.clear();
        self.node_init_futures.clear();
        self.tasks.write().clear();
        self.cache_storage.read().drop_all();
        *self.cache.write() = None;
        self.level_naming_schemes.write().clear();
        debug!(project = %self.project_name, "platform destructed");
    }
}

fn resolve_mode(mode: Option<&str>) -> String {
    if let Some(mode) = mode {
        if !mode.is_empty() {
            return mode.to_owned();
        }
    }
    match std::env::var(MODE_ENV_VAR) {
        Ok(value) if !value.is_empty() => value,
        _ => DEFAULT_MODE.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_mode_wins() {
        assert_eq!(resolve_mode(Some("staging")), "staging");
    }

    #[test]
    fn node_init_failure_converts_to_make_error() {
        let failure = NodeInitFailure {
            node_path: "bundles/page".into(),
            message: "boom".into(),
        };
        let err = MakeError::from(failure);
        assert_eq!(
            err.to_string(),
            "node bundles/page failed to initialize: boom"
        );
    }
}
