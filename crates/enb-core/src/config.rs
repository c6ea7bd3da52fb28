//! Project configuration.
//!
//! A fresh [`ProjectConfig`] is produced for every platform init; rule
//! manifests populate it through the registration methods below. After init
//! it is read-only.
//!
//! Node configs keep their registration order: target resolution and
//! empty-input expansion iterate nodes in the order rule files first
//! declared them.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::errors::ConfigError;
use crate::types::{
    LevelNamingScheme, ModeConfig, NodeConfig, NodeMaskConfig, NodePatch, TaskConfig,
};

/// Mutable project configuration assembled from rule files.
#[derive(Debug, Default)]
pub struct ProjectConfig {
    project_dir: PathBuf,
    node_configs: Vec<NodeConfig>,
    node_index: HashMap<String, usize>,
    node_mask_configs: Vec<NodeMaskConfig>,
    mode_configs: HashMap<String, ModeConfig>,
    task_configs: HashMap<String, TaskConfig>,
    languages: Option<Vec<String>>,
    env: HashMap<String, String>,
    level_naming_schemes: HashMap<String, LevelNamingScheme>,
    included_config_filenames: Vec<PathBuf>,
}

impl ProjectConfig {
    /// Create an empty config bound to a project directory.
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            project_dir: project_dir.into(),
            ..Default::default()
        }
    }

    /// The project directory this config is bound to.
    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    // ── Nodes ──────────────────────────────────────────────────────────

    /// Register a node config.
    ///
    /// Re-registering an existing path merges the new config into the old
    /// one (later rule files win); first registration fixes the iteration
    /// position.
    pub fn register_node(&mut self, path: &str, config: NodeConfig) {
        match self.node_index.get(path) {
            Some(&idx) => self.node_configs[idx].merge(&config),
            None => {
                let mut config = config;
                config.path = path.to_owned();
                self.node_index.insert(path.to_owned(), self.node_configs.len());
                self.node_configs.push(config);
            }
        }
    }

    /// Node config for an exact path.
    pub fn node_config(&self, path: &str) -> Option<&NodeConfig> {
        self.node_index.get(path).map(|&idx| &self.node_configs[idx])
    }

    /// Mutable node config for an exact path.
    pub fn node_config_mut(&mut self, path: &str) -> Option<&mut NodeConfig> {
        let idx = *self.node_index.get(path)?;
        Some(&mut self.node_configs[idx])
    }

    /// Registered node paths in registration order.
    pub fn node_paths(&self) -> Vec<String> {
        self.node_configs.iter().map(|n| n.path.clone()).collect()
    }

    /// All node configs in registration order.
    pub fn node_configs(&self) -> &[NodeConfig] {
        &self.node_configs
    }

    // ── Node masks ─────────────────────────────────────────────────────

    /// Register a node-mask patch. The pattern must be a valid regex.
    pub fn register_node_mask(&mut self, pattern: &str, patch: NodePatch) -> Result<(), ConfigError> {
        let mask = NodeMaskConfig::new(pattern, patch)?;
        self.node_mask_configs.push(mask);
        Ok(())
    }

    /// Mask patches whose pattern matches `node_path`, in registration order.
    pub fn mask_patches_for(&self, node_path: &str) -> Vec<&NodePatch> {
        self.node_mask_configs
            .iter()
            .filter(|mask| mask.matches(node_path))
            .map(|mask| &mask.patch)
            .collect()
    }

    // ── Modes ──────────────────────────────────────────────────────────

    /// Register (or merge) a project-level mode overlay.
    pub fn register_mode(&mut self, mode: &str, config: ModeConfig) {
        let entry = self.mode_configs.entry(mode.to_owned()).or_default();
        entry.env.extend(config.env);
        if config.languages.is_some() {
            entry.languages = config.languages;
        }
        entry.nodes.extend(config.nodes);
    }

    /// Mode overlay for a mode name.
    pub fn mode_config(&self, mode: &str) -> Option<&ModeConfig> {
        self.mode_configs.get(mode)
    }

    // ── Tasks ──────────────────────────────────────────────────────────

    /// Register a task declaration. Re-registering replaces.
    pub fn register_task(&mut self, name: &str, config: TaskConfig) {
        self.task_configs.insert(name.to_owned(), config);
    }

    /// Task declaration by name.
    pub fn task_config(&self, name: &str) -> Option<&TaskConfig> {
        self.task_configs.get(name)
    }

    /// All task declarations.
    pub fn task_configs(&self) -> &HashMap<String, TaskConfig> {
        &self.task_configs
    }

    // ── Languages / env / levels ───────────────────────────────────────

    /// Project-wide language list.
    pub fn languages(&self) -> Option<&[String]> {
        self.languages.as_deref()
    }

    /// Replace the project-wide language list.
    pub fn set_languages(&mut self, languages: Vec<String>) {
        self.languages = Some(languages);
    }

    /// Env values.
    pub fn env(&self) -> &HashMap<String, String> {
        &self.env
    }

    /// Merge env values (later wins).
    pub fn merge_env(&mut self, env: HashMap<String, String>) {
        self.env.extend(env);
    }

    /// Set a single env value.
    pub fn set_env_value(&mut self, key: &str, value: &str) {
        self.env.insert(key.to_owned(), value.to_owned());
    }

    /// Register a level naming scheme for a level path.
    pub fn register_level_scheme(&mut self, level_path: &str, scheme: LevelNamingScheme) {
        self.level_naming_schemes.insert(level_path.to_owned(), scheme);
    }

    /// All registered level naming schemes.
    pub fn level_naming_schemes(&self) -> &HashMap<String, LevelNamingScheme> {
        &self.level_naming_schemes
    }

    // ── Included configs ───────────────────────────────────────────────

    /// Record an included rule file.
    pub fn add_included_config(&mut self, path: impl Into<PathBuf>) {
        self.included_config_filenames.push(path.into());
    }

    /// Rule files pulled in via `include`, in evaluation order.
    pub fn included_config_filenames(&self) -> &[PathBuf] {
        &self.included_config_filenames
    }
}
