//! Build (configuration → JSON) and Flatten (JSON → configuration).
//!
//! Both directions walk the same `[FieldSpec]` tree. Blocks live in
//! configuration as one-element lists and in JSON as plain objects. The law
//! tying the two together is `flatten(build(cfg)) == canonicalize(cfg)`.

use std::collections::HashSet;

use serde_json::{Map, Number, Value};

use super::field_spec::{FieldSpec, FieldType};
use super::path::{get_at_json_path, index, join, set_at_json_path};
use crate::config_tree::ConfigAccessor;

/// A non-fatal notice raised while building a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advisory {
    /// Configuration path the notice refers to.
    pub path: String,
    pub message: String,
}

/// Mutable state threaded through a build.
#[derive(Debug, Default)]
pub struct BuildContext {
    pub advisories: Vec<Advisory>,
}

impl BuildContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advise(&mut self, path: impl Into<String>, message: impl Into<String>) {
        let advisory = Advisory {
            path: path.into(),
            message: message.into(),
        };
        log::debug!("advisory at {}: {}", advisory.path, advisory.message);
        self.advisories.push(advisory);
    }
}

// ============================================================================
// Build
// ============================================================================

/// Builds the JSON object for `fields` rooted at `prefix` in `cfg`.
pub fn build(
    cfg: &dyn ConfigAccessor,
    prefix: &str,
    fields: &[FieldSpec],
    ctx: &mut BuildContext,
) -> Map<String, Value> {
    let mut result = Map::new();
    for f in fields {
        if f.schema_only || f.computed {
            continue;
        }
        let cfg_path = join(prefix, f.cfg_key);

        if is_configured(cfg, &cfg_path, f) {
            if let Some(canonical) = f.alias_of {
                if is_configured_sibling(cfg, prefix, fields, canonical) {
                    ctx.advise(
                        cfg_path.clone(),
                        format!(
                            "both '{}' and deprecated '{}' are set; using '{}'",
                            canonical, f.cfg_key, canonical
                        ),
                    );
                    continue;
                }
            }
            if let Some(message) = f.deprecated {
                ctx.advise(cfg_path.clone(), message);
            }
        }

        if let Some(value) = build_field(cfg, &cfg_path, f, ctx) {
            write_value(&mut result, f, value);
        }
    }
    result
}

fn build_field(
    cfg: &dyn ConfigAccessor,
    cfg_path: &str,
    f: &FieldSpec,
    ctx: &mut BuildContext,
) -> Option<Value> {
    let raw = cfg.get(cfg_path).or_else(|| f.default.clone());

    match f.field_type {
        FieldType::String => {
            let s = match raw {
                Some(v) => value_to_string(&v),
                None if f.omit_empty => return None,
                None => String::new(),
            };
            if f.omit_empty && s.is_empty() {
                return None;
            }
            Some(Value::String(s))
        }
        FieldType::Bool => {
            let b = raw.as_ref().and_then(Value::as_bool).unwrap_or(false);
            if f.omit_empty && !b {
                return None;
            }
            Some(Value::Bool(b))
        }
        FieldType::Int => {
            let i = raw.as_ref().and_then(value_to_i64).unwrap_or(0);
            if f.omit_empty && i == 0 {
                return None;
            }
            Some(Value::from(i))
        }
        FieldType::Float => {
            let x = raw.as_ref().and_then(Value::as_f64).unwrap_or(0.0);
            if f.omit_empty && x == 0.0 {
                return None;
            }
            Some(float_value(x))
        }
        FieldType::StringList => {
            let items = raw.as_ref().map(to_string_list).unwrap_or_default();
            if f.omit_empty && items.is_empty() {
                return None;
            }
            Some(Value::Array(items.into_iter().map(Value::String).collect()))
        }
        FieldType::IntList => {
            let items = raw.as_ref().map(to_int_list).unwrap_or_default();
            if f.omit_empty && items.is_empty() {
                return None;
            }
            Some(Value::Array(items.into_iter().map(Value::from).collect()))
        }
        FieldType::Block => {
            let elem = first_element_path(cfg, cfg_path)?;
            let nested = build(cfg, &elem, &f.children, ctx);
            if nested.is_empty() && f.omit_empty {
                return None;
            }
            Some(Value::Object(nested))
        }
        FieldType::BlockList => {
            let items: Vec<Value> = element_paths(cfg, cfg_path)
                .into_iter()
                .map(|elem| Value::Object(build(cfg, &elem, &f.children, ctx)))
                .collect();
            if f.omit_empty && items.is_empty() {
                return None;
            }
            Some(Value::Array(items))
        }
        FieldType::OneOf => {
            let elem = first_element_path(cfg, cfg_path)?;
            match build_variant(cfg, &elem, f, ctx) {
                Some(obj) => Some(Value::Object(obj)),
                None if f.omit_empty => None,
                None => Some(Value::Object(Map::new())),
            }
        }
        FieldType::OneOfList => {
            let items: Vec<Value> = element_paths(cfg, cfg_path)
                .into_iter()
                .map(|elem| Value::Object(build_variant(cfg, &elem, f, ctx).unwrap_or_default()))
                .collect();
            if f.omit_empty && items.is_empty() {
                return None;
            }
            Some(Value::Array(items))
        }
    }
}

/// Builds the first populated variant of a `OneOf` element, injecting its tag.
fn build_variant(
    cfg: &dyn ConfigAccessor,
    elem: &str,
    parent: &FieldSpec,
    ctx: &mut BuildContext,
) -> Option<Map<String, Value>> {
    let variant = populated_variant(cfg, elem, parent)?;
    let variant_elem = first_element_path(cfg, &join(elem, variant.cfg_key))?;
    let mut built = build(cfg, &variant_elem, &variant.children, ctx);
    if let (Some(key), Some(tag)) = (
        parent.discriminator_json_key(),
        variant.discriminator.as_ref().and_then(|d| d.value),
    ) {
        built.insert(key.to_string(), Value::String(tag.to_string()));
    }
    Some(built)
}

/// The first variant of `parent` with a populated block under `elem`.
pub fn populated_variant<'a>(
    cfg: &dyn ConfigAccessor,
    elem: &str,
    parent: &'a FieldSpec,
) -> Option<&'a FieldSpec> {
    parent
        .children
        .iter()
        .find(|v| cfg.count(&join(elem, v.cfg_key)) > 0)
}

/// Writes a built value at the field's JSON path. Objects merge into an
/// existing object at the same path so fused siblings keep each other's keys.
fn write_value(result: &mut Map<String, Value>, f: &FieldSpec, value: Value) {
    let path = f.json_write_path();
    if let Value::Object(incoming) = value {
        if let Some(Value::Object(existing)) = get_at_json_path(result, path) {
            let mut merged = existing.clone();
            merged.extend(incoming);
            set_at_json_path(result, path, Value::Object(merged));
        } else {
            set_at_json_path(result, path, Value::Object(incoming));
        }
        return;
    }
    set_at_json_path(result, path, value);
}

// ============================================================================
// Flatten
// ============================================================================

/// Where to look for the user's previous configuration during flatten.
#[derive(Clone, Copy)]
pub struct Prior<'a> {
    pub cfg: &'a dyn ConfigAccessor,
    pub prefix: &'a str,
}

/// Flattens a JSON object into a configuration map.
pub fn flatten(fields: &[FieldSpec], data: &Map<String, Value>) -> Map<String, Value> {
    flatten_with_prior(fields, data, None)
}

/// Flattens a JSON object, keeping a deprecated alias in state only when the
/// prior configuration used it as the sole form.
pub fn flatten_with_prior(
    fields: &[FieldSpec],
    data: &Map<String, Value>,
    prior: Option<Prior<'_>>,
) -> Map<String, Value> {
    let kept_aliases = kept_aliases(fields, prior);
    let mut result = Map::new();

    for f in fields {
        if f.schema_only {
            continue;
        }
        match f.alias_of {
            Some(_) if !kept_aliases.contains(f.cfg_key) => continue,
            None if kept_aliases.iter().any(|a| alias_target(fields, a) == Some(f.cfg_key)) => {
                continue
            }
            _ => {}
        }

        let Some(json_val) = get_at_json_path(data, f.json_write_path()) else {
            // Missing lists read back as empty, matching Build and canonicalize.
            let scalar_list = matches!(f.field_type, FieldType::StringList | FieldType::IntList);
            if scalar_list && !f.omit_empty && !f.computed {
                result.insert(f.cfg_key.to_string(), Value::Array(Vec::new()));
            }
            continue;
        };

        match f.field_type {
            FieldType::String => {
                let s = value_to_string(json_val);
                if f.omit_empty && s.is_empty() {
                    continue;
                }
                result.insert(f.cfg_key.to_string(), Value::String(s));
            }
            FieldType::Bool => {
                if let Some(b) = json_val.as_bool() {
                    result.insert(f.cfg_key.to_string(), Value::Bool(b));
                }
            }
            FieldType::Int => {
                if let Some(i) = value_to_i64(json_val) {
                    result.insert(f.cfg_key.to_string(), Value::from(i));
                }
            }
            FieldType::Float => {
                if let Some(x) = json_val.as_f64() {
                    result.insert(f.cfg_key.to_string(), float_value(x));
                }
            }
            FieldType::StringList => {
                let items = to_string_list(json_val);
                if f.omit_empty && items.is_empty() {
                    continue;
                }
                result.insert(
                    f.cfg_key.to_string(),
                    Value::Array(items.into_iter().map(Value::String).collect()),
                );
            }
            FieldType::IntList => {
                let items = to_int_list(json_val);
                if f.omit_empty && items.is_empty() {
                    continue;
                }
                result.insert(
                    f.cfg_key.to_string(),
                    Value::Array(items.into_iter().map(Value::from).collect()),
                );
            }
            FieldType::Block => {
                if let Value::Object(obj) = json_val {
                    let nested = flatten_nested(&f.children, obj, prior, &index(f.cfg_key, 0));
                    result.insert(
                        f.cfg_key.to_string(),
                        Value::Array(vec![Value::Object(nested)]),
                    );
                }
            }
            FieldType::BlockList => {
                if let Value::Array(items) = json_val {
                    let list = items
                        .iter()
                        .enumerate()
                        .map(|(i, item)| match item {
                            Value::Object(obj) => Value::Object(flatten_nested(
                                &f.children,
                                obj,
                                prior,
                                &index(f.cfg_key, i),
                            )),
                            _ => Value::Object(Map::new()),
                        })
                        .collect();
                    result.insert(f.cfg_key.to_string(), Value::Array(list));
                }
            }
            FieldType::OneOf => {
                if let Value::Object(obj) = json_val {
                    if let Some(state) = flatten_variant(f, obj) {
                        result.insert(
                            f.cfg_key.to_string(),
                            Value::Array(vec![Value::Object(state)]),
                        );
                    }
                }
            }
            FieldType::OneOfList => {
                if let Value::Array(items) = json_val {
                    let list = items
                        .iter()
                        .map(|item| {
                            let state = item
                                .as_object()
                                .and_then(|obj| flatten_variant(f, obj))
                                .unwrap_or_default();
                            Value::Object(state)
                        })
                        .collect();
                    result.insert(f.cfg_key.to_string(), Value::Array(list));
                }
            }
        }
    }
    result
}

fn flatten_nested(
    children: &[FieldSpec],
    obj: &Map<String, Value>,
    prior: Option<Prior<'_>>,
    suffix: &str,
) -> Map<String, Value> {
    match prior {
        Some(p) => {
            let prefix = join(p.prefix, suffix);
            flatten_with_prior(
                children,
                obj,
                Some(Prior {
                    cfg: p.cfg,
                    prefix: &prefix,
                }),
            )
        }
        None => flatten(children, obj),
    }
}

/// Resolves the variant of a `OneOf` JSON object and flattens it as
/// `{variant_key: [state]}`. Unknown tags without a default variant yield `None`.
fn flatten_variant(parent: &FieldSpec, obj: &Map<String, Value>) -> Option<Map<String, Value>> {
    let variant = match_variant(parent, obj)?;
    let mut state = Map::new();
    state.insert(
        variant.cfg_key.to_string(),
        Value::Array(vec![Value::Object(flatten(&variant.children, obj))]),
    );
    Some(state)
}

/// Picks the variant whose tag matches the object's discriminator, falling back
/// to the default variant.
pub fn match_variant<'a>(parent: &'a FieldSpec, obj: &Map<String, Value>) -> Option<&'a FieldSpec> {
    let observed = parent
        .discriminator_json_key()
        .and_then(|key| obj.get(key))
        .and_then(Value::as_str);

    if let Some(tag) = observed {
        let matched = parent.children.iter().find(|v| {
            v.discriminator
                .as_ref()
                .map(|d| d.matches(tag))
                .unwrap_or(false)
        });
        if matched.is_some() {
            return matched;
        }
    }
    parent.children.iter().find(|v| {
        v.discriminator
            .as_ref()
            .map(|d| d.default_variant)
            .unwrap_or(false)
    })
}

/// Alias fields the prior configuration used as the sole form.
fn kept_aliases(fields: &[FieldSpec], prior: Option<Prior<'_>>) -> HashSet<&'static str> {
    let mut kept = HashSet::new();
    let Some(prior) = prior else {
        return kept;
    };
    for f in fields {
        let Some(canonical) = f.alias_of else {
            continue;
        };
        let alias_path = join(prior.prefix, f.cfg_key);
        if is_configured(prior.cfg, &alias_path, f)
            && !is_configured_sibling(prior.cfg, prior.prefix, fields, canonical)
        {
            kept.insert(f.cfg_key);
        }
    }
    kept
}

fn alias_target(fields: &[FieldSpec], alias: &str) -> Option<&'static str> {
    fields
        .iter()
        .find(|f| f.cfg_key == alias)
        .and_then(|f| f.alias_of)
}

// ============================================================================
// Canonicalize
// ============================================================================

/// Normalizes a configuration to the shape flatten produces for its build.
///
/// Missing and zero values are treated alike according to `omit_empty`,
/// deprecated aliases are rewritten to their canonical sibling, blocks become
/// one-element lists and computed fields are dropped.
pub fn canonicalize(
    cfg: &dyn ConfigAccessor,
    prefix: &str,
    fields: &[FieldSpec],
) -> Map<String, Value> {
    let mut result = Map::new();
    for f in fields {
        if f.schema_only || f.computed {
            continue;
        }
        let cfg_path = join(prefix, f.cfg_key);

        if let Some(canonical) = f.alias_of {
            if !is_configured(cfg, &cfg_path, f)
                || is_configured_sibling(cfg, prefix, fields, canonical)
            {
                continue;
            }
            // Rewrite the legacy form through the wire representation.
            if let Some(target) = fields.iter().find(|s| s.cfg_key == canonical) {
                let mut scratch = BuildContext::new();
                let wire = build(cfg, prefix, std::slice::from_ref(f), &mut scratch);
                result.extend(flatten(std::slice::from_ref(target), &wire));
            }
            continue;
        }

        if let Some(value) = canonical_field(cfg, &cfg_path, f) {
            result.insert(f.cfg_key.to_string(), value);
        }
    }
    result
}

fn canonical_field(cfg: &dyn ConfigAccessor, cfg_path: &str, f: &FieldSpec) -> Option<Value> {
    let raw = cfg.get(cfg_path).or_else(|| f.default.clone());
    match f.field_type {
        FieldType::String => {
            let s = raw.as_ref().map(value_to_string);
            match s {
                None if f.omit_empty => None,
                Some(s) if f.omit_empty && s.is_empty() => None,
                s => Some(Value::String(s.unwrap_or_default())),
            }
        }
        FieldType::Bool => {
            let b = raw.as_ref().and_then(Value::as_bool).unwrap_or(false);
            (!(f.omit_empty && !b)).then_some(Value::Bool(b))
        }
        FieldType::Int => {
            let i = raw.as_ref().and_then(value_to_i64).unwrap_or(0);
            (!(f.omit_empty && i == 0)).then(|| Value::from(i))
        }
        FieldType::Float => {
            let x = raw.as_ref().and_then(Value::as_f64).unwrap_or(0.0);
            (!(f.omit_empty && x == 0.0)).then(|| float_value(x))
        }
        FieldType::StringList => {
            let items = raw.as_ref().map(to_string_list).unwrap_or_default();
            (!(f.omit_empty && items.is_empty()))
                .then(|| Value::Array(items.into_iter().map(Value::String).collect()))
        }
        FieldType::IntList => {
            let items = raw.as_ref().map(to_int_list).unwrap_or_default();
            (!(f.omit_empty && items.is_empty()))
                .then(|| Value::Array(items.into_iter().map(Value::from).collect()))
        }
        FieldType::Block => {
            let elem = first_element_path(cfg, cfg_path)?;
            let mut scratch = BuildContext::new();
            if f.omit_empty && build(cfg, &elem, &f.children, &mut scratch).is_empty() {
                return None;
            }
            Some(Value::Array(vec![Value::Object(canonicalize(
                cfg,
                &elem,
                &f.children,
            ))]))
        }
        FieldType::BlockList => {
            let items: Vec<Value> = element_paths(cfg, cfg_path)
                .into_iter()
                .map(|elem| Value::Object(canonicalize(cfg, &elem, &f.children)))
                .collect();
            (!(f.omit_empty && items.is_empty())).then_some(Value::Array(items))
        }
        FieldType::OneOf => {
            let elem = first_element_path(cfg, cfg_path)?;
            let state = canonical_variant(cfg, &elem, f)?;
            Some(Value::Array(vec![Value::Object(state)]))
        }
        FieldType::OneOfList => {
            let items: Vec<Value> = element_paths(cfg, cfg_path)
                .into_iter()
                .map(|elem| Value::Object(canonical_variant(cfg, &elem, f).unwrap_or_default()))
                .collect();
            (!(f.omit_empty && items.is_empty())).then_some(Value::Array(items))
        }
    }
}

fn canonical_variant(
    cfg: &dyn ConfigAccessor,
    elem: &str,
    parent: &FieldSpec,
) -> Option<Map<String, Value>> {
    let variant = populated_variant(cfg, elem, parent)?;
    let variant_elem = first_element_path(cfg, &join(elem, variant.cfg_key))?;
    let mut state = Map::new();
    state.insert(
        variant.cfg_key.to_string(),
        Value::Array(vec![Value::Object(canonicalize(
            cfg,
            &variant_elem,
            &variant.children,
        ))]),
    );
    Some(state)
}

// ============================================================================
// Helpers
// ============================================================================

/// Path of the first element of a block: `path.0` for lists, `path` for a bare object.
pub fn first_element_path(cfg: &dyn ConfigAccessor, path: &str) -> Option<String> {
    match cfg.get(path)? {
        Value::Array(items) if !items.is_empty() => Some(index(path, 0)),
        Value::Object(_) => Some(path.to_string()),
        _ => None,
    }
}

/// Paths of every element of a block list.
pub fn element_paths(cfg: &dyn ConfigAccessor, path: &str) -> Vec<String> {
    match cfg.get(path) {
        Some(Value::Array(items)) => (0..items.len()).map(|i| index(path, i)).collect(),
        Some(Value::Object(_)) => vec![path.to_string()],
        _ => Vec::new(),
    }
}

/// Whether a field carries a non-zero value in the configuration.
pub fn is_configured(cfg: &dyn ConfigAccessor, path: &str, f: &FieldSpec) -> bool {
    match cfg.get(path) {
        Some(v) => !f.field_type.is_zero(&v),
        None => false,
    }
}

fn is_configured_sibling(
    cfg: &dyn ConfigAccessor,
    prefix: &str,
    fields: &[FieldSpec],
    cfg_key: &str,
) -> bool {
    fields
        .iter()
        .find(|s| s.cfg_key == cfg_key)
        .map(|s| is_configured(cfg, &join(prefix, s.cfg_key), s))
        .unwrap_or(false)
}

/// Renders a scalar the way the wire expects strings: numbers and booleans in
/// their JSON text, strings verbatim.
pub fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Accepts integers and floats (truncated) and numeric strings.
pub fn value_to_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn float_value(x: f64) -> Value {
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}

fn to_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().map(value_to_string).collect(),
        _ => Vec::new(),
    }
}

fn to_int_list(value: &Value) -> Vec<i64> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_to_i64).collect(),
        _ => Vec::new(),
    }
}
