//! Blackboard - session-scoped KV state shared across plan executions

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Weakly-typed key/value state for one conversation.
///
/// Written by the projector after each completed step and by callers before
/// or after a run; read by the placeholder resolver. Keys keep insertion order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blackboard {
    data: Map<String, Value>,
}

impl Blackboard {
    /// Create a new empty blackboard
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries currently stored.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Insert or overwrite a value
    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.data.insert(key.into(), value);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Merge entries, overwriting existing keys
    pub fn update<I>(&mut self, entries: I)
    where
        I: IntoIterator<Item = (String, Value)>,
    {
        for (key, value) in entries {
            self.set(key, value);
        }
    }

    /// Remove every entry. There is no per-key deletion.
    pub fn clear(&mut self) {
        self.data.clear();
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.data.keys().map(String::as_str)
    }

    /// Borrow the underlying mapping (resolver traversal root)
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.data
    }
}

impl From<Map<String, Value>> for Blackboard {
    fn from(data: Map<String, Value>) -> Self {
        Self { data }
    }
}

impl FromIterator<(String, Value)> for Blackboard {
    fn from_iter<T: IntoIterator<Item = (String, Value)>>(iter: T) -> Self {
        Self {
            data: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_blackboard_overwrites_and_clears() {
        let mut bb = Blackboard::new();
        bb.set("sheet_url", json!("https://a"));
        bb.set("sheet_url", json!("https://b"));
        assert_eq!(bb.len(), 1);
        assert_eq!(bb.get("sheet_url"), Some(&json!("https://b")));

        bb.clear();
        assert!(bb.is_empty());
    }

    #[test]
    fn test_blackboard_keeps_insertion_order() {
        let mut bb = Blackboard::new();
        bb.set("zeta", json!(1));
        bb.set("alpha", json!(2));
        assert_eq!(bb.keys().collect::<Vec<_>>(), vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_blackboard_serializes_as_plain_mapping() {
        let bb: Blackboard = [("k".to_string(), json!("v"))].into_iter().collect();
        assert_eq!(serde_json::to_value(&bb).expect("json"), json!({"k": "v"}));
    }
}
