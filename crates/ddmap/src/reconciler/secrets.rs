//! Write-only secrets.
//!
//! The API never echoes these fields back. State keeps the value the user
//! configured, or a mask when there is none, so a read only shows drift once
//! the user clears the field.

use serde_json::{Map, Value};

use crate::config_tree::ConfigAccessor;

/// Fills secret fields missing from a flattened response.
///
/// A value returned by the server wins; otherwise the configured value is
/// kept when non-empty, else `mask` is written.
pub fn preserve_secrets(
    state: &mut Map<String, Value>,
    fields: &[&'static str],
    cfg: &dyn ConfigAccessor,
    mask: &str,
) {
    for field in fields {
        let returned = state
            .get(*field)
            .and_then(Value::as_str)
            .is_some_and(|s| !s.is_empty());
        if returned {
            continue;
        }
        let value = cfg
            .get_str(field)
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| mask.to_string());
        state.insert(field.to_string(), Value::String(value));
    }
}

/// Equality for a secret field: a mask in state matches any non-empty value.
pub fn secret_matches(desired: Option<&Value>, current: Option<&Value>, mask: &str) -> bool {
    if desired == current {
        return true;
    }
    let desired_set = desired
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty());
    current.and_then(Value::as_str) == Some(mask) && desired_set
}
