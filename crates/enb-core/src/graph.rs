//! Build graph.
//!
//! A write-only sink every node appends its built targets (and their
//! resolved dependencies) to. The platform shares one graph across all
//! nodes initialized during its lifetime; rendering is a debugging aid.

use std::collections::{BTreeMap, BTreeSet};

use parking_lot::Mutex;

/// Append-model build graph.
#[derive(Debug)]
pub struct BuildGraph {
    name: String,
    targets: Mutex<BTreeMap<String, BTreeSet<String>>>,
}

impl BuildGraph {
    /// Create an empty graph named after the project.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            targets: Mutex::new(BTreeMap::new()),
        }
    }

    /// Graph name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Record a target. Idempotent.
    pub fn register_target(&self, target: &str) {
        self.targets.lock().entry(target.to_owned()).or_default();
    }

    /// Record a dependency edge; both endpoints are registered.
    pub fn add_dep(&self, target: &str, dep: &str) {
        let mut targets = self.targets.lock();
        targets.entry(dep.to_owned()).or_default();
        targets
            .entry(target.to_owned())
            .or_default()
            .insert(dep.to_owned());
    }

    /// Number of recorded targets.
    pub fn target_count(&self) -> usize {
        self.targets.lock().len()
    }

    /// Recorded targets, sorted.
    pub fn targets(&self) -> Vec<String> {
        self.targets.lock().keys().cloned().collect()
    }

    /// Deterministic tree dump of the graph.
    pub fn render(&self) -> String {
        let targets = self.targets.lock();
        let mut out = self.name.clone();
        out.push('\n');
        for (target, deps) in targets.iter() {
            out.push_str("  ");
            out.push_str(target);
            out.push('\n');
            for dep in deps {
                out.push_str("    <- ");
                out.push_str(dep);
                out.push('\n');
            }
        }
        out
    }
}
