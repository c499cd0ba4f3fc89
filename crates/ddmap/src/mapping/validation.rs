//! Declarative validation over `[FieldSpec]` trees.

use std::collections::HashSet;
use std::fmt;

use serde_json::Value;

use super::codec::{element_paths, is_configured, value_to_i64};
use super::field_spec::{FieldSpec, FieldType, WidgetSpec};
use super::path::join;
use crate::config_tree::ConfigAccessor;
use crate::error::{EngineError, Result};

/// One validation problem, located by configuration path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub path: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Converts diagnostics into a single configuration error.
pub fn into_result(diagnostics: &[Diagnostic]) -> Result<()> {
    if diagnostics.is_empty() {
        return Ok(());
    }
    let joined: Vec<String> = diagnostics.iter().map(|d| d.to_string()).collect();
    Err(EngineError::Configuration(joined.join("; ")))
}

/// Validator for user configuration against a field tree.
pub struct FieldValidator {
    /// Collected diagnostics.
    diagnostics: Vec<Diagnostic>,
}

impl Default for FieldValidator {
    fn default() -> Self {
        Self::new()
    }
}

impl FieldValidator {
    pub fn new() -> Self {
        Self {
            diagnostics: Vec::new(),
        }
    }

    /// Validates `fields` rooted at `prefix` and returns the collected diagnostics.
    pub fn validate(
        mut self,
        cfg: &dyn ConfigAccessor,
        prefix: &str,
        fields: &[FieldSpec],
    ) -> Vec<Diagnostic> {
        self.check_fields(cfg, prefix, fields);
        self.diagnostics
    }

    /// Validates every item of a union list: each item must populate exactly
    /// one variant block, and the populated block is validated against its
    /// variant's fields plus the shared fields.
    pub fn validate_union_list(
        mut self,
        cfg: &dyn ConfigAccessor,
        list_path: &str,
        shared: &[FieldSpec],
        variants: &[WidgetSpec],
    ) -> Vec<Diagnostic> {
        for item in element_paths(cfg, list_path) {
            self.check_union_item(cfg, &item, shared, variants);
        }
        self.diagnostics
    }

    pub(crate) fn check_union_item(
        &mut self,
        cfg: &dyn ConfigAccessor,
        item: &str,
        shared: &[FieldSpec],
        variants: &[WidgetSpec],
    ) {
        self.check_fields(cfg, item, shared);

        let populated: Vec<&WidgetSpec> = variants
            .iter()
            .filter(|v| cfg.count(&join(item, v.cfg_block_key)) > 0)
            .collect();
        match populated.as_slice() {
            [] => self.push(item, "exactly one definition block is required"),
            [variant] => {
                let block = join(item, variant.cfg_block_key);
                self.check_single(cfg, &block);
                for elem in element_paths(cfg, &block).into_iter().take(1) {
                    self.check_fields(cfg, &elem, &variant.fields);
                }
            }
            many => {
                let keys: Vec<&str> = many.iter().map(|v| v.cfg_block_key).collect();
                self.push(
                    item,
                    format!("multiple variants set ({}); only one is allowed", keys.join(", ")),
                );
            }
        }
    }

    fn push(&mut self, path: &str, message: impl Into<String>) {
        self.diagnostics.push(Diagnostic::new(path, message));
    }

    fn check_fields(&mut self, cfg: &dyn ConfigAccessor, prefix: &str, fields: &[FieldSpec]) {
        for f in fields {
            let path = join(prefix, f.cfg_key);
            let value = cfg.get(&path);

            if f.required && !f.computed {
                let missing = match &value {
                    None => f.default.is_none(),
                    // A zero number or `false` is a value; an empty string or list is not.
                    Some(v) => match f.field_type {
                        FieldType::Bool | FieldType::Int | FieldType::Float => {
                            v.is_null() && f.default.is_none()
                        }
                        _ => f.field_type.is_zero(v),
                    },
                };
                if missing {
                    self.push(&path, "is required");
                    continue;
                }
            }
            let Some(value) = value else {
                continue;
            };

            if f.computed && !f.field_type.is_zero(&value) {
                self.push(&path, "is computed by the server and cannot be set");
                continue;
            }

            if is_configured(cfg, &path, f) {
                for other in f.conflicts_with {
                    let other_path = join(prefix, other);
                    let configured = fields
                        .iter()
                        .find(|s| s.cfg_key == *other)
                        .map(|s| is_configured(cfg, &other_path, s))
                        .unwrap_or(false);
                    if configured {
                        self.push(&path, format!("conflicts with '{}'", other));
                    }
                }
            }

            self.check_value(cfg, &path, f, &value);
        }
    }

    fn check_value(&mut self, cfg: &dyn ConfigAccessor, path: &str, f: &FieldSpec, value: &Value) {
        match f.field_type {
            FieldType::String => match value {
                Value::String(s) => self.check_enum(path, f, s),
                Value::Number(_) | Value::Bool(_) => {}
                _ => self.push(path, "expected a string"),
            },
            FieldType::Bool => {
                if !value.is_boolean() {
                    self.push(path, "expected a boolean");
                }
            }
            FieldType::Int => {
                if value_to_i64(value).is_none() {
                    self.push(path, "expected an integer");
                }
            }
            FieldType::Float => {
                if value.as_f64().is_none() {
                    self.push(path, "expected a number");
                }
            }
            FieldType::StringList | FieldType::IntList => {
                let Value::Array(items) = value else {
                    self.push(path, "expected a list");
                    return;
                };
                self.check_max_items(path, f, items.len());
                if f.field_type == FieldType::StringList {
                    for item in items {
                        if let Value::String(s) = item {
                            self.check_enum(path, f, s);
                        }
                    }
                } else if items.iter().any(|i| value_to_i64(i).is_none()) {
                    self.push(path, "expected a list of integers");
                }
                if f.use_set {
                    let mut seen = HashSet::new();
                    if items.iter().any(|i| !seen.insert(i.to_string())) {
                        self.push(path, "contains duplicate elements");
                    }
                }
            }
            FieldType::Block => {
                if !self.check_single(cfg, path) {
                    return;
                }
                for elem in element_paths(cfg, path).into_iter().take(1) {
                    self.check_fields(cfg, &elem, &f.children);
                }
            }
            FieldType::BlockList => {
                let elems = element_paths(cfg, path);
                if !value.is_array() && !value.is_object() {
                    self.push(path, "expected a list of blocks");
                    return;
                }
                self.check_max_items(path, f, elems.len());
                for elem in elems {
                    self.check_fields(cfg, &elem, &f.children);
                }
            }
            FieldType::OneOf => {
                if !self.check_single(cfg, path) {
                    return;
                }
                for elem in element_paths(cfg, path).into_iter().take(1) {
                    self.check_variants(cfg, &elem, f);
                }
            }
            FieldType::OneOfList => {
                let elems = element_paths(cfg, path);
                self.check_max_items(path, f, elems.len());
                for elem in elems {
                    self.check_variants(cfg, &elem, f);
                }
            }
        }
    }

    /// A block holds at most one element.
    fn check_single(&mut self, cfg: &dyn ConfigAccessor, path: &str) -> bool {
        match cfg.get(path) {
            Some(Value::Array(items)) if items.len() > 1 => {
                self.push(path, "at most one block is allowed");
                false
            }
            Some(Value::Array(_)) | Some(Value::Object(_)) | None => true,
            Some(_) => {
                self.push(path, "expected a block");
                false
            }
        }
    }

    fn check_variants(&mut self, cfg: &dyn ConfigAccessor, elem: &str, parent: &FieldSpec) {
        let populated: Vec<&FieldSpec> = parent
            .children
            .iter()
            .filter(|v| cfg.count(&join(elem, v.cfg_key)) > 0)
            .collect();
        match populated.as_slice() {
            [] => {
                if parent.required {
                    let keys: Vec<&str> = parent.children.iter().map(|v| v.cfg_key).collect();
                    self.push(elem, format!("exactly one of ({}) is required", keys.join(", ")));
                }
            }
            [variant] => {
                let path = join(elem, variant.cfg_key);
                self.check_value(cfg, &path, variant, &cfg.get(&path).unwrap_or(Value::Null));
            }
            many => {
                let keys: Vec<&str> = many.iter().map(|v| v.cfg_key).collect();
                self.push(
                    elem,
                    format!("multiple variants set ({}); only one is allowed", keys.join(", ")),
                );
            }
        }
    }

    fn check_enum(&mut self, path: &str, f: &FieldSpec, value: &str) {
        if f.valid_values.is_empty() || value.is_empty() {
            return;
        }
        if !f.valid_values.contains(&value) {
            self.push(
                path,
                format!(
                    "unsupported value '{}', expected one of: {}",
                    value,
                    f.valid_values.join(", ")
                ),
            );
        }
    }

    fn check_max_items(&mut self, path: &str, f: &FieldSpec, len: usize) {
        if f.max_items > 0 && len > f.max_items {
            self.push(
                path,
                format!("at most {} items allowed, got {}", f.max_items, len),
            );
        }
    }
}

// ============================================================================
// Schema closure
// ============================================================================

/// Checks the structural invariants of a field tree and returns every violation.
///
/// Within one sibling list, `cfg_key`s are unique and JSON write paths are
/// unique except between a deprecated alias and its canonical field. Fields
/// never set both `json_key` and `json_path`. Nested types carry children,
/// scalar types do not, and `OneOf` variants are blocks.
pub fn check_closure(fields: &[FieldSpec]) -> Vec<String> {
    let mut errors = Vec::new();
    check_closure_at("", fields, &mut errors);
    errors
}

fn check_closure_at(prefix: &str, fields: &[FieldSpec], errors: &mut Vec<String>) {
    let mut cfg_keys = HashSet::new();
    let mut write_paths: Vec<(&str, &FieldSpec)> = Vec::new();

    for f in fields {
        let path = join(prefix, f.cfg_key);
        if !cfg_keys.insert(f.cfg_key) {
            errors.push(format!("{}: duplicate configuration key", path));
        }
        if f.json_key.is_some() && f.json_path.is_some() {
            errors.push(format!("{}: json_key and json_path are both set", path));
        }
        if f.field_type.is_nested() != !f.children.is_empty() {
            errors.push(format!(
                "{}: {} field has {} children",
                path,
                f.field_type,
                f.children.len()
            ));
        }
        if let Some(canonical) = f.alias_of {
            if !fields.iter().any(|s| s.cfg_key == canonical) {
                errors.push(format!("{}: alias target '{}' not found", path, canonical));
            }
        }

        if !f.schema_only {
            let write_path = f.json_write_path();
            let clash = write_paths.iter().find(|(p, other)| {
                overlaps(p, write_path) && !is_alias_pair(f, other)
            });
            if let Some((_, other)) = clash {
                errors.push(format!(
                    "{}: JSON path '{}' collides with '{}'",
                    path, write_path, other.cfg_key
                ));
            }
            write_paths.push((write_path, f));
        }

        match f.field_type {
            FieldType::OneOf | FieldType::OneOfList => {
                for variant in &f.children {
                    if variant.field_type != FieldType::Block {
                        errors.push(format!(
                            "{}.{}: variant must be a block",
                            path, variant.cfg_key
                        ));
                    }
                    check_closure_at(&join(&path, variant.cfg_key), &variant.children, errors);
                }
            }
            _ => check_closure_at(&path, &f.children, errors),
        }
    }
}

/// Two write paths collide when equal or when one is a prefix object of the other.
fn overlaps(a: &str, b: &str) -> bool {
    a == b || b.starts_with(&format!("{}.", a)) || a.starts_with(&format!("{}.", b))
}

fn is_alias_pair(a: &FieldSpec, b: &FieldSpec) -> bool {
    a.alias_of == Some(b.cfg_key) || b.alias_of == Some(a.cfg_key)
}

/// Closure check for a union registry: every variant's fields merged with the
/// shared fields, plus unique block keys and type tags.
pub fn check_union_closure(shared: &[FieldSpec], variants: &[WidgetSpec]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut block_keys = HashSet::new();
    let mut tags = HashSet::new();
    for v in variants {
        if !block_keys.insert(v.cfg_block_key) {
            errors.push(format!("duplicate variant block '{}'", v.cfg_block_key));
        }
        if !tags.insert(v.json_type_tag) {
            errors.push(format!("duplicate type tag '{}'", v.json_type_tag));
        }
        let merged: Vec<FieldSpec> = shared.iter().chain(v.fields.iter()).cloned().collect();
        for e in check_closure(&merged) {
            errors.push(format!("{}: {}", v.cfg_block_key, e));
        }
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_tree::ConfigTree;
    use serde_json::json;

    fn tree(v: Value) -> ConfigTree {
        ConfigTree::from_value(v).unwrap()
    }

    #[test]
    fn test_required_and_enum() {
        let fields = vec![
            FieldSpec::string("name").required(),
            FieldSpec::string("encode_as").valid_values(&["json", "form"]),
        ];
        let diags = FieldValidator::new().validate(&tree(json!({"encode_as": "xml"})), "", &fields);
        assert_eq!(diags.len(), 2);
        assert_eq!(diags[0].to_string(), "name: is required");
        assert!(diags[1].message.contains("unsupported value 'xml'"));
    }

    #[test]
    fn test_required_satisfied_by_default() {
        let fields = vec![FieldSpec::string("sort").required().default_value(json!("desc"))];
        assert!(FieldValidator::new().validate(&tree(json!({})), "", &fields).is_empty());
    }

    #[test]
    fn test_required_number_accepts_zero() {
        let fields = vec![FieldSpec::int("x").required(), FieldSpec::float("value").required()];
        let cfg = tree(json!({"x": 0, "value": 0.0}));
        assert!(FieldValidator::new().validate(&cfg, "", &fields).is_empty());
        let diags = FieldValidator::new().validate(&tree(json!({"value": 1.5})), "", &fields);
        assert_eq!(diags, vec![Diagnostic::new("x", "is required")]);
    }

    #[test]
    fn test_conflicts() {
        let fields = vec![
            FieldSpec::string("default").conflicts_with(&["defaults"]),
            FieldSpec::string_list("defaults").conflicts_with(&["default"]),
        ];
        let cfg = tree(json!({"default": "a", "defaults": ["b"]}));
        let diags = FieldValidator::new().validate(&cfg, "", &fields);
        assert_eq!(diags.len(), 2);
        assert!(into_result(&diags).unwrap_err().to_string().contains("; "));
    }

    #[test]
    fn test_max_items_and_single_block() {
        let fields = vec![
            FieldSpec::string_list("cross_org_uuids").max_items(1),
            FieldSpec::block("style", vec![FieldSpec::string("palette")]),
        ];
        let cfg = tree(json!({"cross_org_uuids": ["a", "b"], "style": [{}, {}]}));
        let diags = FieldValidator::new().validate(&cfg, "", &fields);
        assert_eq!(diags.len(), 2);
    }

    #[test]
    fn test_nested_required_reports_full_path() {
        let fields = vec![FieldSpec::block_list(
            "marker",
            vec![FieldSpec::string("value").required()],
        )];
        let cfg = tree(json!({"marker": [{"value": "y = 1"}, {"label": "x"}]}));
        let diags = FieldValidator::new().validate(&cfg, "", &fields);
        assert_eq!(diags, vec![Diagnostic::new("marker.1.value", "is required")]);
    }

    #[test]
    fn test_multiple_one_of_variants() {
        let fields = vec![FieldSpec::one_of(
            "unit",
            vec![
                FieldSpec::block("canonical", vec![FieldSpec::string("unit_name")]),
                FieldSpec::block("custom", vec![FieldSpec::string("label")]),
            ],
        )];
        let cfg = tree(json!({"unit": [{"canonical": [{}], "custom": [{}]}]}));
        let diags = FieldValidator::new().validate(&cfg, "", &fields);
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.starts_with("multiple variants"));
    }

    #[test]
    fn test_union_list_items() {
        let variants = vec![
            WidgetSpec::new("note_definition", "note", vec![FieldSpec::string("content").required()]),
            WidgetSpec::new("iframe_definition", "iframe", vec![FieldSpec::string("url").required()]),
        ];
        let cfg = tree(json!({"widget": [
            {"note_definition": [{"content": "hi"}]},
            {},
            {"note_definition": [{"content": "a"}], "iframe_definition": [{"url": "b"}]},
            {"iframe_definition": [{}]}
        ]}));
        let diags = FieldValidator::new().validate_union_list(&cfg, "widget", &[], &variants);
        let rendered: Vec<String> = diags.iter().map(|d| d.to_string()).collect();
        assert_eq!(rendered.len(), 3);
        assert_eq!(rendered[0], "widget.1: exactly one definition block is required");
        assert!(rendered[1].starts_with("widget.2: multiple variants"));
        assert_eq!(rendered[2], "widget.3.iframe_definition.0.url: is required");
    }

    #[test]
    fn test_closure_accepts_fused_paths_and_aliases() {
        let fields = vec![
            FieldSpec::string("search_query").json_path("search.query"),
            FieldSpec::string("search_mode").json_path("search.mode"),
            FieldSpec::string("live_span").json_path("time.live_span"),
            FieldSpec::block("time", vec![FieldSpec::string("live_span")]).alias_of("live_span"),
        ];
        assert!(check_closure(&fields).is_empty());
    }

    #[test]
    fn test_closure_rejects_collisions() {
        let fields = vec![
            FieldSpec::string("a").json_key("x"),
            FieldSpec::string("b").json_key("x"),
            FieldSpec::string("c").json_key("c").json_path("c.d"),
            FieldSpec::block("empty", vec![]),
        ];
        let errors = check_closure(&fields);
        assert_eq!(errors.len(), 3);
    }
}
