//! Configuration fragment types.
//!
//! These are the building blocks rule manifests register on a
//! [`ProjectConfig`](crate::ProjectConfig): per-node configs, node-mask
//! patches, mode overlays, task declarations, and level naming schemes.

use std::collections::HashMap;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::errors::ConfigError;

/// A build step registered on a node.
///
/// The tech implementation itself is opaque to the orchestrator; only the
/// name and its options travel through configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TechConfig {
    /// Tech name.
    pub tech: String,
    /// Arbitrary tech options.
    #[serde(default)]
    pub options: serde_json::Value,
}

/// Configuration of a single build node.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodeConfig {
    /// Node path relative to the project dir. Filled in at registration.
    #[serde(skip)]
    pub path: String,
    /// Targets produced by a full (`"*"`) build of this node.
    pub targets: Vec<String>,
    /// Additional targets removed by `clean`.
    pub clean_targets: Vec<String>,
    /// Build steps, in declaration order.
    pub techs: Vec<TechConfig>,
    /// Node-specific language list. `None` falls back to the platform list.
    pub languages: Option<Vec<String>>,
    /// Per-mode overlays applied during node initialization.
    pub modes: HashMap<String, NodePatch>,
}

impl NodeConfig {
    /// Apply a patch on top of this config.
    ///
    /// Targets and clean-targets extend (first-seen order, deduplicated),
    /// techs replace-by-name or append, languages replace wholesale.
    pub fn apply(&mut self, patch: &NodePatch) {
        if let Some(targets) = &patch.targets {
            extend_unique(&mut self.targets, targets);
        }
        if let Some(clean_targets) = &patch.clean_targets {
            extend_unique(&mut self.clean_targets, clean_targets);
        }
        if let Some(techs) = &patch.techs {
            for tech in techs {
                if let Some(existing) = self.techs.iter_mut().find(|t| t.tech == tech.tech) {
                    *existing = tech.clone();
                } else {
                    self.techs.push(tech.clone());
                }
            }
        }
        if let Some(languages) = &patch.languages {
            self.languages = Some(languages.clone());
        }
    }

    /// Merge another full config into this one (later rule files win).
    pub fn merge(&mut self, other: &NodeConfig) {
        self.apply(&NodePatch {
            targets: Some(other.targets.clone()),
            clean_targets: Some(other.clean_targets.clone()),
            techs: Some(other.techs.clone()),
            languages: other.languages.clone(),
        });
        for (mode, patch) in &other.modes {
            self.modes.insert(mode.clone(), patch.clone());
        }
    }
}

/// Partial node configuration applied on top of a base [`NodeConfig`].
///
/// Used by node-mask configs and per-mode overlays. `None` fields leave the
/// base untouched.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct NodePatch {
    /// Extra targets.
    pub targets: Option<Vec<String>>,
    /// Extra clean targets.
    pub clean_targets: Option<Vec<String>>,
    /// Extra or replacement techs.
    pub techs: Option<Vec<TechConfig>>,
    /// Replacement language list.
    pub languages: Option<Vec<String>>,
}

/// A patch applied to every node whose path matches a pattern.
#[derive(Clone, Debug)]
pub struct NodeMaskConfig {
    /// The pattern as written in the manifest.
    pub pattern: String,
    /// Compiled matcher.
    regex: Regex,
    /// The patch to apply to matching nodes.
    pub patch: NodePatch,
}

impl NodeMaskConfig {
    /// Compile a mask pattern. Invalid patterns are a configuration error.
    pub fn new(pattern: &str, patch: NodePatch) -> Result<Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| ConfigError::InvalidMask {
            pattern: pattern.to_owned(),
            message: e.to_string(),
        })?;
        Ok(Self {
            pattern: pattern.to_owned(),
            regex,
            patch,
        })
    }

    /// Whether the mask applies to the given node path.
    pub fn matches(&self, node_path: &str) -> bool {
        self.regex.is_match(node_path)
    }
}

/// Project-level overlay selected by the active build mode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ModeConfig {
    /// Env values merged over the project env.
    pub env: HashMap<String, String>,
    /// Replacement language list.
    pub languages: Option<Vec<String>>,
    /// Per-node patches keyed by node path.
    pub nodes: HashMap<String, NodePatch>,
}

/// A named user task: an argv vector run with cwd = project dir.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    /// Command and its fixed arguments; invocation args are appended.
    pub command: Vec<String>,
}

/// File-layout convention for one level directory. Opaque to the
/// orchestrator; nodes interpret the two template strings.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LevelNamingScheme {
    /// Level layout name (e.g. `"nested"`, `"flat"`).
    pub build_level: String,
    /// Template for locating a block file within the level.
    pub build_file_path: String,
}

fn extend_unique(dst: &mut Vec<String>, src: &[String]) {
    for item in src {
        if !dst.iter().any(|existing| existing == item) {
            dst.push(item.clone());
        }
    }
}
