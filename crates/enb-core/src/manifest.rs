//! Rule-file manifests.
//!
//! Rule files are declarative JSON manifests evaluated against a fresh
//! [`ProjectConfig`]. A manifest may carry env values, languages, level
//! naming schemes, node configs, node-mask patches, mode overlays, task
//! declarations, and `include` references to further manifests.
//!
//! Includes are resolved relative to the config directory and evaluated
//! depth-first, after the declaring file's own sections. A seen-set breaks
//! include cycles. Every included file is recorded on the config so the
//! platform can track its mtime for cache invalidation.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::warn;

use crate::config::ProjectConfig;
use crate::errors::ConfigError;
use crate::types::{LevelNamingScheme, ModeConfig, NodeConfig, NodePatch, TaskConfig};

/// On-disk manifest shape.
///
/// Node entries are kept as a `serde_json::Map` so that registration order
/// follows document order.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct RuleManifest {
    env: HashMap<String, String>,
    languages: Option<Vec<String>>,
    include: Vec<String>,
    levels: HashMap<String, LevelNamingScheme>,
    nodes: serde_json::Map<String, serde_json::Value>,
    node_masks: Vec<NodeMaskEntry>,
    modes: HashMap<String, ModeConfig>,
    tasks: HashMap<String, TaskConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NodeMaskEntry {
    mask: String,
    #[serde(flatten)]
    patch: NodePatch,
}

/// Evaluate a rule file (and its includes) against a project config.
pub fn evaluate_rule_file(
    config: &mut ProjectConfig,
    config_dir: &Path,
    path: &Path,
) -> Result<(), ConfigError> {
    let mut seen = HashSet::new();
    evaluate_inner(config, config_dir, path, &mut seen, false)
}

fn evaluate_inner(
    config: &mut ProjectConfig,
    config_dir: &Path,
    path: &Path,
    seen: &mut HashSet<PathBuf>,
    is_include: bool,
) -> Result<(), ConfigError> {
    if !seen.insert(path.to_path_buf()) {
        warn!(path = %path.display(), "skipping already evaluated rule file");
        return Ok(());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let manifest: RuleManifest =
        serde_json::from_str(&raw).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

    if is_include {
        config.add_included_config(path);
    }

    config.merge_env(manifest.env);
    if let Some(languages) = manifest.languages {
        config.set_languages(languages);
    }
    for (level_path, scheme) in manifest.levels {
        config.register_level_scheme(&level_path, scheme);
    }

    for (node_path, value) in manifest.nodes {
        let node: NodeConfig =
            serde_json::from_value(value).map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: format!("node `{node_path}`: {e}"),
            })?;
        config.register_node(&node_path, node);
    }

    for entry in manifest.node_masks {
        config.register_node_mask(&entry.mask, entry.patch)?;
    }

    for (mode, mode_config) in manifest.modes {
        config.register_mode(&mode, mode_config);
    }

    for (name, task) in manifest.tasks {
        config.register_task(&name, task);
    }

    for include in manifest.include {
        let include_path = config_dir.join(include);
        evaluate_inner(config, config_dir, &include_path, seen, true)?;
    }

    Ok(())
}

/// Apply the project-level overlay for the active mode, if declared.
pub fn evaluate_mode(config: &mut ProjectConfig, mode: &str) {
    let Some(overlay) = config.mode_config(mode).cloned() else {
        return;
    };

    config.merge_env(overlay.env);
    if let Some(languages) = overlay.languages {
        config.set_languages(languages);
    }
    for (node_path, patch) in overlay.nodes {
        match config.node_config_mut(&node_path) {
            Some(node) => node.apply(&patch),
            None => warn!(mode, node_path, "mode overlay names an unregistered node"),
        }
    }
}
