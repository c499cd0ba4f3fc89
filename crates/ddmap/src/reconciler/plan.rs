//! Diff between desired configuration and recorded state.

use std::collections::BTreeSet;

use serde_json::Value;

use super::secrets::secret_matches;
use crate::config_tree::{ConfigAccessor, ConfigTree};
use crate::error::Result;
use crate::kinds::KindHandler;

/// What reconciling a configuration against state requires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    NoOp,
    /// In-place update; `keys` are the drifted top-level keys.
    Update { keys: Vec<String> },
    /// Destroy and create; `keys` are the force-new keys that changed.
    Replace { keys: Vec<String> },
}

impl Plan {
    pub fn is_noop(&self) -> bool {
        matches!(self, Plan::NoOp)
    }
}

/// Compares the canonical forms of `cfg` and `state`.
///
/// Secret fields compare equal when state holds the mask and the
/// configuration a non-empty value.
pub fn plan(handler: &dyn KindHandler, cfg: &dyn ConfigAccessor, state: &ConfigTree, mask: &str) -> Result<Plan> {
    let desired = handler.canonicalize(cfg)?;
    let current = handler.canonicalize(state)?;
    let secrets = handler.secret_fields(cfg);

    let keys: BTreeSet<&String> = desired.keys().chain(current.keys()).collect();
    let drifted: Vec<String> = keys
        .into_iter()
        .filter(|key| {
            let want = desired.get(key.as_str());
            let have = current.get(key.as_str());
            if secrets.iter().any(|s| *s == key.as_str()) {
                !secret_matches(want, have, mask)
            } else {
                !same(want, have)
            }
        })
        .cloned()
        .collect();

    if drifted.is_empty() {
        return Ok(Plan::NoOp);
    }

    let replace = handler.replacement_keys(&desired, &current);
    if !replace.is_empty() {
        log::debug!("{} requires replacement on {:?}", handler.kind(), replace);
        return Ok(Plan::Replace { keys: replace });
    }
    log::debug!("{} drifted on {:?}", handler.kind(), drifted);
    Ok(Plan::Update { keys: drifted })
}

// Integers and floats of equal value compare equal.
fn same(a: Option<&Value>, b: Option<&Value>) -> bool {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
