//! Shared build state.

use dashmap::DashMap;

/// Free-form scratch map shared among nodes for one platform lifetime.
///
/// Values are arbitrary JSON; the orchestrator only ever clears the map at
/// destruct time.
#[derive(Debug, Default)]
pub struct BuildState {
    values: DashMap<String, serde_json::Value>,
}

impl BuildState {
    /// Create an empty state map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Read a value.
    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.values.get(key).map(|v| v.clone())
    }

    /// Store a value.
    pub fn set(&self, key: &str, value: serde_json::Value) {
        self.values.insert(key.to_owned(), value);
    }

    /// Remove a value, returning it if present.
    pub fn remove(&self, key: &str) -> Option<serde_json::Value> {
        self.values.remove(key).map(|(_, v)| v)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the map is empty.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Drop all values.
    pub fn clear(&self) {
        self.values.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn set_get_remove() {
        let state = BuildState::new();
        state.set("deps", json!(["a", "b"]));
        assert_eq!(state.get("deps"), Some(json!(["a", "b"])));
        assert_eq!(state.remove("deps"), Some(json!(["a", "b"])));
        assert!(state.get("deps").is_none());
    }

    #[test]
    fn clear_empties_the_map() {
        let state = BuildState::new();
        state.set("a", json!(1));
        state.set("b", json!(2));
        assert_eq!(state.len(), 2);
        state.clear();
        assert!(state.is_empty());
    }
}
