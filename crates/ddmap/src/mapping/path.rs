//! Dotted-path helpers over JSON maps.

use serde_json::{Map, Value};

/// Sets `value` at a dotted path, creating intermediate objects.
///
/// Siblings sharing a root segment are fused: writing `time.live_span` into a
/// map that already holds `{"time": {"type": "live"}}` keeps both keys.
pub fn set_at_json_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            if let Value::Object(sub) = entry {
                set_at_json_path(sub, rest, value);
            }
        }
    }
}

/// Reads the value at a dotted path. `null` and missing values both yield `None`.
pub fn get_at_json_path<'a>(map: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    match path.split_once('.') {
        None => map.get(path).filter(|v| !v.is_null()),
        Some((head, rest)) => match map.get(head) {
            Some(Value::Object(sub)) => get_at_json_path(sub, rest),
            _ => None,
        },
    }
}

/// Joins a configuration prefix and a key: `join("widget.0", "title")`.
pub fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", prefix, key)
    }
}

/// Joins a configuration prefix and a list index: `index("widget", 2)`.
pub fn index(prefix: &str, i: usize) -> String {
    format!("{}.{}", prefix, i)
}

/// Resolves a dotted configuration path (numeric segments index lists) inside a value.
pub fn lookup<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for segment in path.split('.') {
        current = match current {
            Value::Object(map) => map.get(segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Writes `value` at a dotted configuration path, creating objects and padding lists.
pub fn assign(root: &mut Value, path: &str, value: Value) {
    if path.is_empty() {
        *root = value;
        return;
    }
    let (head, rest) = match path.split_once('.') {
        Some((h, r)) => (h, Some(r)),
        None => (path, None),
    };

    if let Ok(i) = head.parse::<usize>() {
        if !root.is_array() {
            *root = Value::Array(Vec::new());
        }
        if let Value::Array(items) = root {
            while items.len() <= i {
                items.push(Value::Null);
            }
            match rest {
                Some(r) => assign(&mut items[i], r, value),
                None => items[i] = value,
            }
        }
        return;
    }

    if !root.is_object() {
        *root = Value::Object(Map::new());
    }
    if let Value::Object(map) = root {
        match rest {
            Some(r) => {
                let child = map.entry(head.to_string()).or_insert(Value::Null);
                assign(child, r, value);
            }
            None => {
                map.insert(head.to_string(), value);
            }
        }
    }
}
