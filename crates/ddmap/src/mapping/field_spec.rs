//! Declarative field descriptors.
//!
//! A `FieldSpec` describes one field in both directions: where it lives in the
//! user configuration (`cfg_key`) and where it lives in the JSON payload
//! (`json_key` or the dotted `json_path`). The codec, the schema deriver and the
//! validator all walk the same trees.

use serde_json::Value;

/// Semantic type of a field. Drives serialization in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    String,
    Bool,
    Int,
    Float,
    StringList,
    IntList,
    /// Single nested object, at most one occurrence.
    Block,
    /// Ordered sequence of nested objects.
    BlockList,
    /// Single polymorphic block: exactly one child variant is populated.
    OneOf,
    /// Sequence of polymorphic elements, each resolved like `OneOf`.
    OneOfList,
}

impl FieldType {
    /// Whether the type carries nested children.
    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            FieldType::Block | FieldType::BlockList | FieldType::OneOf | FieldType::OneOfList
        )
    }

    /// Whether the type is a list in configuration space.
    pub fn is_list(&self) -> bool {
        matches!(
            self,
            FieldType::StringList | FieldType::IntList | FieldType::BlockList | FieldType::OneOfList
        )
    }

    /// The zero value of this type, as stored in configuration.
    pub fn zero_value(&self) -> Value {
        match self {
            FieldType::String => Value::String(String::new()),
            FieldType::Bool => Value::Bool(false),
            FieldType::Int => Value::from(0i64),
            FieldType::Float => Value::from(0.0f64),
            _ => Value::Array(Vec::new()),
        }
    }

    /// Returns true when `value` is the zero value of this type.
    pub fn is_zero(&self, value: &Value) -> bool {
        match (self, value) {
            (_, Value::Null) => true,
            (FieldType::String, Value::String(s)) => s.is_empty(),
            (FieldType::Bool, Value::Bool(b)) => !b,
            (FieldType::Int, Value::Number(n)) | (FieldType::Float, Value::Number(n)) => {
                n.as_f64().map(|f| f == 0.0).unwrap_or(false)
            }
            (_, Value::Array(items)) => items.is_empty(),
            (_, Value::Object(map)) => map.is_empty(),
            _ => false,
        }
    }
}

impl std::fmt::Display for FieldType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            FieldType::String => "string",
            FieldType::Bool => "bool",
            FieldType::Int => "int",
            FieldType::Float => "float",
            FieldType::StringList => "string-list",
            FieldType::IntList => "int-list",
            FieldType::Block => "block",
            FieldType::BlockList => "block-list",
            FieldType::OneOf => "one-of",
            FieldType::OneOfList => "one-of-list",
        };
        write!(f, "{}", name)
    }
}

/// Discriminator configuration for `OneOf` fields.
///
/// On the parent field only `json_key` is meaningful. On each variant child,
/// `value` is injected on build and matched on flatten, `values` are matched on
/// flatten only, and `default_variant` marks the fallback.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Discriminator {
    pub json_key: Option<&'static str>,
    pub value: Option<&'static str>,
    pub values: &'static [&'static str],
    pub default_variant: bool,
}

impl Discriminator {
    /// Whether a JSON discriminator value selects this variant.
    pub fn matches(&self, observed: &str) -> bool {
        self.value == Some(observed) || self.values.contains(&observed)
    }
}

/// Declarative mapping for one field.
#[derive(Debug, Clone)]
pub struct FieldSpec {
    /// Configuration-side identifier.
    pub cfg_key: &'static str,
    /// JSON identifier when it differs from `cfg_key`.
    pub json_key: Option<&'static str>,
    /// Dotted JSON path for flat configuration fields that nest in JSON.
    pub json_path: Option<&'static str>,
    pub field_type: FieldType,
    /// Exclude the zero value from built JSON.
    pub omit_empty: bool,
    pub children: Vec<FieldSpec>,

    pub description: &'static str,
    pub required: bool,
    /// Set by the server, never sent.
    pub computed: bool,
    /// Value used when the configuration leaves the field unset.
    pub default: Option<Value>,
    /// Upper bound on list length; 0 means unbounded.
    pub max_items: usize,
    /// Mask in logs and plan output.
    pub sensitive: bool,
    pub deprecated: Option<&'static str>,
    /// For a legacy field, the `cfg_key` of the canonical sibling it shadows.
    pub alias_of: Option<&'static str>,
    pub valid_values: &'static [&'static str],
    pub conflicts_with: &'static [&'static str],
    /// List has set semantics.
    pub use_set: bool,
    /// Changing the field requires destroy-create.
    pub force_new: bool,
    /// Registered in the schema but never serialized.
    pub schema_only: bool,
    pub discriminator: Option<Discriminator>,
}

impl FieldSpec {
    pub fn new(cfg_key: &'static str, field_type: FieldType) -> Self {
        Self {
            cfg_key,
            json_key: None,
            json_path: None,
            field_type,
            omit_empty: false,
            children: Vec::new(),
            description: "",
            required: false,
            computed: false,
            default: None,
            max_items: 0,
            sensitive: false,
            deprecated: None,
            alias_of: None,
            valid_values: &[],
            conflicts_with: &[],
            use_set: false,
            force_new: false,
            schema_only: false,
            discriminator: None,
        }
    }

    pub fn string(cfg_key: &'static str) -> Self {
        Self::new(cfg_key, FieldType::String)
    }

    pub fn bool(cfg_key: &'static str) -> Self {
        Self::new(cfg_key, FieldType::Bool)
    }

    pub fn int(cfg_key: &'static str) -> Self {
        Self::new(cfg_key, FieldType::Int)
    }

    pub fn float(cfg_key: &'static str) -> Self {
        Self::new(cfg_key, FieldType::Float)
    }

    pub fn string_list(cfg_key: &'static str) -> Self {
        Self::new(cfg_key, FieldType::StringList)
    }

    pub fn int_list(cfg_key: &'static str) -> Self {
        Self::new(cfg_key, FieldType::IntList)
    }

    pub fn block(cfg_key: &'static str, children: Vec<FieldSpec>) -> Self {
        Self::new(cfg_key, FieldType::Block).with_children(children)
    }

    pub fn block_list(cfg_key: &'static str, children: Vec<FieldSpec>) -> Self {
        Self::new(cfg_key, FieldType::BlockList).with_children(children)
    }

    /// A polymorphic block whose variants are the `children`, each a `Block`.
    pub fn one_of(cfg_key: &'static str, variants: Vec<FieldSpec>) -> Self {
        Self::new(cfg_key, FieldType::OneOf).with_children(variants)
    }

    /// A list of polymorphic elements whose variants are the `children`.
    pub fn one_of_list(cfg_key: &'static str, variants: Vec<FieldSpec>) -> Self {
        Self::new(cfg_key, FieldType::OneOfList).with_children(variants)
    }

    fn with_children(mut self, children: Vec<FieldSpec>) -> Self {
        self.children = children;
        self
    }

    pub fn json_key(mut self, key: &'static str) -> Self {
        self.json_key = Some(key);
        self
    }

    pub fn json_path(mut self, path: &'static str) -> Self {
        self.json_path = Some(path);
        self
    }

    pub fn omit_empty(mut self) -> Self {
        self.omit_empty = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn computed(mut self) -> Self {
        self.computed = true;
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn max_items(mut self, n: usize) -> Self {
        self.max_items = n;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn deprecated(mut self, message: &'static str) -> Self {
        self.deprecated = Some(message);
        self
    }

    /// Marks this field as the legacy form of `canonical`.
    pub fn alias_of(mut self, canonical: &'static str) -> Self {
        self.alias_of = Some(canonical);
        self
    }

    pub fn valid_values(mut self, values: &'static [&'static str]) -> Self {
        self.valid_values = values;
        self
    }

    pub fn conflicts_with(mut self, keys: &'static [&'static str]) -> Self {
        self.conflicts_with = keys;
        self
    }

    pub fn use_set(mut self) -> Self {
        self.use_set = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn schema_only(mut self) -> Self {
        self.schema_only = true;
        self
    }

    pub fn describe(mut self, text: &'static str) -> Self {
        self.description = text;
        self
    }

    /// On a `OneOf` parent: the JSON key carrying the variant tag.
    pub fn discriminator_key(mut self, key: &'static str) -> Self {
        self.discriminator.get_or_insert_with(Default::default).json_key = Some(key);
        self
    }

    /// On a variant: the tag injected on build and matched on flatten.
    pub fn variant_value(mut self, value: &'static str) -> Self {
        self.discriminator.get_or_insert_with(Default::default).value = Some(value);
        self
    }

    /// On a variant: extra tags matched on flatten only.
    pub fn variant_values(mut self, values: &'static [&'static str]) -> Self {
        self.discriminator.get_or_insert_with(Default::default).values = values;
        self
    }

    /// On a variant: selected when no tag matches.
    pub fn default_variant(mut self) -> Self {
        self.discriminator
            .get_or_insert_with(Default::default)
            .default_variant = true;
        self
    }

    /// First segment of `json_path`, else `json_key`, else `cfg_key`.
    pub fn root_json_segment(&self) -> &'static str {
        if let Some(path) = self.json_path {
            return path.split('.').next().unwrap_or(path);
        }
        self.json_key.unwrap_or(self.cfg_key)
    }

    /// `json_path` when set, else the root segment.
    pub fn json_write_path(&self) -> &'static str {
        self.json_path.unwrap_or_else(|| self.root_json_segment())
    }

    /// The JSON key carrying the variant tag of a `OneOf` parent.
    pub fn discriminator_json_key(&self) -> Option<&'static str> {
        self.discriminator.as_ref().and_then(|d| d.json_key)
    }
}

/// Variant descriptor for one polymorphic widget type.
#[derive(Debug, Clone)]
pub struct WidgetSpec {
    /// Configuration block key, e.g. `timeseries_definition`.
    pub cfg_block_key: &'static str,
    /// JSON `type` tag, e.g. `timeseries`.
    pub json_type_tag: &'static str,
    pub description: &'static str,
    /// Variant-specific fields; shared widget fields are merged in by the dashboard codec.
    pub fields: Vec<FieldSpec>,
}

impl WidgetSpec {
    pub fn new(cfg_block_key: &'static str, json_type_tag: &'static str, fields: Vec<FieldSpec>) -> Self {
        Self {
            cfg_block_key,
            json_type_tag,
            description: "",
            fields,
        }
    }

    pub fn describe(mut self, text: &'static str) -> Self {
        self.description = text;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_root_segment_prefers_json_path() {
        let f = FieldSpec::string("live_span").json_path("time.live_span");
        assert_eq!(f.root_json_segment(), "time");
        assert_eq!(f.json_write_path(), "time.live_span");
    }

    #[test]
    fn test_root_segment_uses_json_key() {
        let f = FieldSpec::block_list("marker", vec![FieldSpec::string("value")]).json_key("markers");
        assert_eq!(f.root_json_segment(), "markers");
        assert_eq!(f.json_write_path(), "markers");
    }

    #[test]
    fn test_root_segment_falls_back_to_cfg_key() {
        let f = FieldSpec::string("title");
        assert_eq!(f.root_json_segment(), "title");
        assert_eq!(f.json_write_path(), "title");
    }

    #[test]
    fn test_zero_values() {
        assert!(FieldType::String.is_zero(&json!("")));
        assert!(!FieldType::String.is_zero(&json!("x")));
        assert!(FieldType::Bool.is_zero(&json!(false)));
        assert!(FieldType::Int.is_zero(&json!(0)));
        assert!(FieldType::Float.is_zero(&json!(0.0)));
        assert!(!FieldType::Float.is_zero(&json!(0.5)));
        assert!(FieldType::StringList.is_zero(&json!([])));
        assert!(FieldType::Block.is_zero(&Value::Null));
    }

    #[test]
    fn test_discriminator_matching() {
        let variant = FieldSpec::block("table", vec![])
            .variant_value("table")
            .variant_values(&["none"]);
        let disc = variant.discriminator.unwrap();
        assert!(disc.matches("table"));
        assert!(disc.matches("none"));
        assert!(!disc.matches("inline"));
    }
}
