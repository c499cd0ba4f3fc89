//! Configuration and state trees.
//!
//! The engine reads user configuration through [`ConfigAccessor`] and writes
//! canonical state through [`StateWriter`]. Paths are dotted, with numeric
//! segments indexing lists (`widget.0.note_definition.0.content`).
//! [`ConfigTree`] is the in-memory implementation of both.

use serde_json::{Map, Value};

use crate::error::{EngineError, Result};
use crate::mapping::path;

/// Typed read access to a user configuration.
pub trait ConfigAccessor: Send + Sync {
    /// Returns the value at `path`, or `None` when absent.
    fn get(&self, path: &str) -> Option<Value>;

    /// Number of elements of the list at `path`. A bare object counts as one.
    fn count(&self, path: &str) -> usize {
        match self.get(path) {
            Some(Value::Array(items)) => items.len(),
            Some(Value::Object(_)) => 1,
            _ => 0,
        }
    }

    /// Convenience accessor for string leaves.
    fn get_str(&self, path: &str) -> Option<String> {
        match self.get(path)? {
            Value::String(s) => Some(s),
            Value::Null => None,
            other => Some(other.to_string()),
        }
    }
}

/// Write access to persisted state.
pub trait StateWriter: Send {
    fn set(&mut self, path: &str, value: Value);
}

/// A mapping/list/scalar tree addressed by dotted paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigTree {
    root: Value,
}

impl Default for ConfigTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigTree {
    /// Creates an empty tree.
    pub fn new() -> Self {
        Self {
            root: Value::Object(Map::new()),
        }
    }

    /// Wraps an existing JSON object.
    pub fn from_value(root: Value) -> Result<Self> {
        if !root.is_object() {
            return Err(EngineError::Configuration(
                "configuration root must be a mapping".to_string(),
            ));
        }
        Ok(Self { root })
    }

    /// Wraps a JSON map.
    pub fn from_map(map: Map<String, Value>) -> Self {
        Self {
            root: Value::Object(map),
        }
    }

    /// Parses a YAML document into a tree.
    pub fn from_yaml(source: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(source)?;
        Self::from_value(value)
    }

    pub fn as_value(&self) -> &Value {
        &self.root
    }

    pub fn into_value(self) -> Value {
        self.root
    }

    /// The root mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        match &self.root {
            Value::Object(map) => map,
            _ => empty_map(),
        }
    }

    /// Removes a top-level key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        match &mut self.root {
            Value::Object(map) => map.remove(key),
            _ => None,
        }
    }

    /// Server-assigned id, if any.
    pub fn id(&self) -> Option<&str> {
        self.as_map()
            .get("id")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }
}

fn empty_map() -> &'static Map<String, Value> {
    static EMPTY: std::sync::LazyLock<Map<String, Value>> = std::sync::LazyLock::new(Map::new);
    &EMPTY
}

impl ConfigAccessor for ConfigTree {
    fn get(&self, p: &str) -> Option<Value> {
        path::lookup(&self.root, p)
            .filter(|v| !v.is_null())
            .cloned()
    }
}

impl StateWriter for ConfigTree {
    fn set(&mut self, p: &str, value: Value) {
        path::assign(&mut self.root, p, value);
    }
}

impl From<Map<String, Value>> for ConfigTree {
    fn from(map: Map<String, Value>) -> Self {
        Self::from_map(map)
    }
}
