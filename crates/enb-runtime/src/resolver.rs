//! Target resolution.
//!
//! Maps user-supplied target strings to `(node, sub-targets)` pairs. A
//! target addresses the node whose path is its longest registered prefix:
//! `bundles/page/bundles/header/styles.css` goes to
//! `bundles/page/bundles/header` when that node exists, not to
//! `bundles/page`. A target equal to a node path means "everything that
//! node builds", expressed as the `"*"` wildcard sub-target.

use std::collections::HashMap;

use crate::errors::MakeError;

/// Wildcard sub-target meaning "all targets of the node".
pub const WILDCARD: &str = "*";

/// One node with the sub-targets requested of it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ResolvedTarget {
    /// Node path.
    pub node_path: String,
    /// Requested sub-targets, deduplicated, in first-seen order.
    pub targets: Vec<String>,
}

/// Resolve input targets against the registered node paths.
///
/// `node_paths` must be in registration order; an empty input expands to
/// every node with the wildcard. Distinct nodes appear in the order they
/// were first matched.
pub fn resolve_targets(
    node_paths: &[String],
    inputs: &[String],
) -> Result<Vec<ResolvedTarget>, MakeError> {
    if inputs.is_empty() {
        return Ok(node_paths
            .iter()
            .map(|path| ResolvedTarget {
                node_path: path.clone(),
                targets: vec![WILDCARD.to_owned()],
            })
            .collect());
    }

    // Longest path first so nested nodes win; the sort is stable, so
    // equal-length paths keep registration order.
    let mut by_length: Vec<&String> = node_paths.iter().collect();
    by_length.sort_by(|a, b| b.len().cmp(&a.len()));

    let mut order: Vec<String> = Vec::new();
    let mut sub_targets: HashMap<String, Vec<String>> = HashMap::new();

    for input in inputs {
        let target = strip_leading_dots(input);
        let matched = by_length
            .iter()
            .find_map(|node| match_node(node, target).map(|sub| (node.as_str(), sub)));
        let Some((node_path, sub)) = matched else {
            return Err(MakeError::TargetNotFound(target.to_owned()));
        };

        let entry = match sub_targets.get_mut(node_path) {
            Some(entry) => entry,
            None => {
                order.push(node_path.to_owned());
                sub_targets.entry(node_path.to_owned()).or_default()
            }
        };
        if !entry.iter().any(|existing| existing == &sub) {
            entry.push(sub);
        }
    }

    Ok(order
        .into_iter()
        .map(|node_path| {
            let targets = sub_targets.remove(&node_path).unwrap_or_default();
            ResolvedTarget { node_path, targets }
        })
        .collect())
}

/// Strip any number of leading `./` segments.
fn strip_leading_dots(target: &str) -> &str {
    let mut target = target;
    while let Some(rest) = target.strip_prefix("./") {
        target = rest;
    }
    target
}

/// Sub-target of `target` relative to `node`, if the node owns it.
fn match_node(node: &str, target: &str) -> Option<String> {
    if target == node {
        return Some(WILDCARD.to_owned());
    }
    if target.len() > node.len() && target.starts_with(node) {
        let sep = target.as_bytes()[node.len()];
        if sep == b'/' || sep == b'\\' {
            return Some(target[node.len() + 1..].to_owned());
        }
    }
    None
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    fn resolved(node: &str, targets: &[&str]) -> ResolvedTarget {
        ResolvedTarget {
            node_path: node.to_owned(),
            targets: targets.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    #[test]
    fn nested_node_wins_over_its_parent() {
        let nodes = paths(&["bundles/page", "bundles/page/bundles/header"]);
        let result = resolve_targets(
            &nodes,
            &["bundles/page/bundles/header/styles.css".to_owned()],
        )
        .unwrap();
        assert_eq!(
            result,
            vec![resolved("bundles/page/bundles/header", &["styles.css"])]
        );
    }

    #[test]
    fn duplicate_inputs_dedup_per_node() {
        let nodes = paths(&["bundles/page", "bundles/page/bundles/header"]);
        let result = resolve_targets(
            &nodes,
            &[
                "bundles/page/a.js".to_owned(),
                "bundles/page/a.js".to_owned(),
                "bundles/page/b.js".to_owned(),
            ],
        )
        .unwrap();
        assert_eq!(result, vec![resolved("bundles/page", &["a.js", "b.js"])]);
    }

    #[test]
    fn leading_dot_segments_are_stripped() {
        let nodes = paths(&["bundles/page"]);
        let result = resolve_targets(&nodes, &["./././bundles/page".to_owned()]).unwrap();
        assert_eq!(result, vec![resolved("bundles/page", &["*"])]);
    }

    #[test]
    fn unmatched_target_is_an_error() {
        let nodes = paths(&["bundles/page"]);
        let err = resolve_targets(&nodes, &["nonexistent".to_owned()]).unwrap_err();
        assert_eq!(err.to_string(), "target not found: nonexistent");
    }

    #[test]
    fn node_name_prefix_without_separator_does_not_match() {
        let nodes = paths(&["bundles/page"]);
        let err = resolve_targets(&nodes, &["bundles/page2".to_owned()]).unwrap_err();
        assert!(matches!(err, MakeError::TargetNotFound(_)));
    }

    #[test]
    fn backslash_separator_matches() {
        let nodes = paths(&["bundles/page"]);
        let result = resolve_targets(&nodes, &["bundles/page\\styles.css".to_owned()]).unwrap();
        assert_eq!(result, vec![resolved("bundles/page", &["styles.css"])]);
    }

    #[test]
    fn empty_input_expands_every_node_in_registration_order() {
        let nodes = paths(&["bundles/page", "bundles/index", "pages/about"]);
        let result = resolve_targets(&nodes, &[]).unwrap();
        assert_eq!(
            result,
            vec![
                resolved("bundles/page", &["*"]),
                resolved("bundles/index", &["*"]),
                resolved("pages/about", &["*"]),
            ]
        );
    }

    #[test]
    fn nodes_keep_first_seen_order_across_inputs() {
        let nodes = paths(&["a", "b"]);
        let result = resolve_targets(
            &nodes,
            &[
                "b/x.js".to_owned(),
                "a/y.js".to_owned(),
                "b/z.js".to_owned(),
            ],
        )
        .unwrap();
        assert_eq!(
            result,
            vec![resolved("b", &["x.js", "z.js"]), resolved("a", &["y.js"])]
        );
    }

    #[test]
    fn wildcard_and_specific_targets_coexist() {
        let nodes = paths(&["bundles/page"]);
        let result = resolve_targets(
            &nodes,
            &["bundles/page".to_owned(), "bundles/page/a.js".to_owned()],
        )
        .unwrap();
        assert_eq!(result, vec![resolved("bundles/page", &["*", "a.js"])]);
    }

    #[test]
    fn resolution_is_deterministic() {
        let nodes = paths(&["bundles/page", "bundles/page/bundles/header"]);
        let inputs = vec![
            "bundles/page/a.js".to_owned(),
            "bundles/page/bundles/header".to_owned(),
        ];
        let first = resolve_targets(&nodes, &inputs).unwrap();
        let second = resolve_targets(&nodes, &inputs).unwrap();
        assert_eq!(first, second);
    }
}
