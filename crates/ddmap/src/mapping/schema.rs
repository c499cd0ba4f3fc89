//! Schema Deriver.
//!
//! Turns a `[FieldSpec]` tree into a framework-agnostic descriptor tree that
//! hosts register for validation, diffing and documentation.

use serde::Serialize;
use serde_json::Value;

use super::field_spec::{FieldSpec, FieldType, WidgetSpec};

/// Scalar element types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarType {
    String,
    Bool,
    Int,
    Float,
}

/// Shape of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "shape", content = "of", rename_all = "snake_case")]
pub enum SchemaType {
    Scalar(ScalarType),
    Sequence(ScalarType),
    /// Nested mapping. Occurrence limits live in `max_items`.
    Mapping,
    /// Ordered sequence of nested mappings.
    MappingList,
}

/// One node of a derived schema.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SchemaNode {
    pub name: String,
    #[serde(rename = "type")]
    pub node_type: SchemaType,
    pub required: bool,
    pub optional: bool,
    pub computed: bool,
    /// 0 means unbounded.
    pub max_items: usize,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deprecated: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub sensitive: bool,
    pub force_new: bool,
    pub use_set: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub valid_values: Vec<String>,
    /// Sibling keys that may not be set alongside this one. Union variants list
    /// every other variant here.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub conflicts_with: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<SchemaNode>,
}

impl SchemaNode {
    fn leaf(name: &str, node_type: SchemaType) -> Self {
        Self {
            name: name.to_string(),
            node_type,
            required: false,
            optional: true,
            computed: false,
            max_items: 0,
            description: String::new(),
            deprecated: None,
            default: None,
            sensitive: false,
            force_new: false,
            use_set: false,
            valid_values: Vec::new(),
            conflicts_with: Vec::new(),
            children: Vec::new(),
        }
    }

    /// An optional single-occurrence mapping.
    pub fn block(name: &str, children: Vec<SchemaNode>) -> Self {
        let mut node = Self::leaf(name, SchemaType::Mapping);
        node.max_items = 1;
        node.children = children;
        node
    }

    /// Child lookup by name.
    pub fn child(&self, name: &str) -> Option<&SchemaNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut SchemaNode> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Depth of mapping nesting below this node. Scalars have depth 0.
    pub fn depth(&self) -> usize {
        self.children
            .iter()
            .map(|c| 1 + c.depth())
            .max()
            .unwrap_or(0)
    }
}

fn scalar_of(field_type: FieldType) -> Option<ScalarType> {
    match field_type {
        FieldType::String | FieldType::StringList => Some(ScalarType::String),
        FieldType::Bool => Some(ScalarType::Bool),
        FieldType::Int | FieldType::IntList => Some(ScalarType::Int),
        FieldType::Float => Some(ScalarType::Float),
        _ => None,
    }
}

/// Derives schema nodes for a field list.
pub fn derive(fields: &[FieldSpec]) -> Vec<SchemaNode> {
    fields.iter().map(derive_field).collect()
}

fn derive_field(f: &FieldSpec) -> SchemaNode {
    let node_type = match f.field_type {
        FieldType::String | FieldType::Bool | FieldType::Int | FieldType::Float => {
            SchemaType::Scalar(scalar_of(f.field_type).unwrap_or(ScalarType::String))
        }
        FieldType::StringList | FieldType::IntList => {
            SchemaType::Sequence(scalar_of(f.field_type).unwrap_or(ScalarType::String))
        }
        FieldType::Block | FieldType::OneOf => SchemaType::Mapping,
        FieldType::BlockList | FieldType::OneOfList => SchemaType::MappingList,
    };

    let mut node = SchemaNode::leaf(f.cfg_key, node_type);
    node.required = f.required;
    node.optional = !f.required || f.omit_empty;
    node.computed = f.computed;
    node.description = f.description.to_string();
    node.deprecated = f.deprecated.map(str::to_string);
    node.default = f.default.clone();
    node.sensitive = f.sensitive;
    node.force_new = f.force_new;
    node.use_set = f.use_set;
    node.valid_values = f.valid_values.iter().map(|s| s.to_string()).collect();
    node.conflicts_with = f.conflicts_with.iter().map(|s| s.to_string()).collect();
    node.max_items = match f.field_type {
        FieldType::Block | FieldType::OneOf => 1,
        _ => f.max_items,
    };

    node.children = match f.field_type {
        FieldType::OneOf | FieldType::OneOfList => exclusive_variants(derive(&f.children)),
        _ => derive(&f.children),
    };
    node
}

/// Marks every node as an optional single block conflicting with its siblings.
fn exclusive_variants(mut variants: Vec<SchemaNode>) -> Vec<SchemaNode> {
    let names: Vec<String> = variants.iter().map(|v| v.name.clone()).collect();
    for variant in &mut variants {
        variant.required = false;
        variant.optional = true;
        variant.max_items = 1;
        variant.conflicts_with = names.iter().filter(|n| **n != variant.name).cloned().collect();
    }
    variants
}

/// Derives the schema of one union list item: the shared fields plus one
/// optional block per registered variant, at most one of which may be set.
pub fn derive_union(shared: &[FieldSpec], variants: &[WidgetSpec]) -> Vec<SchemaNode> {
    let mut nodes = derive(shared);
    let blocks = variants
        .iter()
        .map(|v| {
            let mut node = SchemaNode::block(v.cfg_block_key, derive(&v.fields));
            node.description = v.description.to_string();
            node
        })
        .collect();
    nodes.extend(exclusive_variants(blocks));
    nodes
}

/// Injects `item_schema` as the children of `list_key` inside the variant block
/// `container`. Used to give the group widget its nested widget list.
pub fn inject_nested_items(
    nodes: &mut [SchemaNode],
    container: &str,
    list_key: &str,
    item_schema: Vec<SchemaNode>,
) -> bool {
    let Some(block) = nodes.iter_mut().find(|n| n.name == container) else {
        return false;
    };
    match block.child_mut(list_key) {
        Some(list) => {
            list.children = item_schema;
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalars_and_lists() {
        let nodes = derive(&[
            FieldSpec::string("title").required(),
            FieldSpec::string("reflow_type").omit_empty().valid_values(&["auto", "fixed"]),
            FieldSpec::int_list("ids"),
        ]);
        assert_eq!(nodes[0].node_type, SchemaType::Scalar(ScalarType::String));
        assert!(nodes[0].required && !nodes[0].optional);
        assert!(nodes[1].optional);
        assert_eq!(nodes[1].valid_values, vec!["auto", "fixed"]);
        assert_eq!(nodes[2].node_type, SchemaType::Sequence(ScalarType::Int));
    }

    #[test]
    fn test_block_has_max_one() {
        let nodes = derive(&[FieldSpec::block("style", vec![FieldSpec::string("palette")]).max_items(5)]);
        assert_eq!(nodes[0].node_type, SchemaType::Mapping);
        assert_eq!(nodes[0].max_items, 1);
        assert_eq!(nodes[0].children.len(), 1);
    }

    #[test]
    fn test_one_of_variants_conflict() {
        let nodes = derive(&[FieldSpec::one_of(
            "unit",
            vec![
                FieldSpec::block("canonical", vec![FieldSpec::string("unit_name")]),
                FieldSpec::block("custom", vec![FieldSpec::string("label")]),
            ],
        )]);
        let unit = &nodes[0];
        assert_eq!(unit.child("canonical").unwrap().conflicts_with, vec!["custom"]);
        assert_eq!(unit.child("custom").unwrap().max_items, 1);
    }

    #[test]
    fn test_union_and_injection() {
        let variants = vec![
            WidgetSpec::new("note_definition", "note", vec![FieldSpec::string("content")]),
            WidgetSpec::new(
                "group_definition",
                "group",
                vec![FieldSpec::block_list("widget", vec![])],
            ),
        ];
        let shared = vec![FieldSpec::int("id").computed()];
        let mut nodes = derive_union(&shared, &variants);
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[1].conflicts_with, vec!["group_definition"]);

        let inner = derive_union(&shared, &variants[..1]);
        assert!(inject_nested_items(&mut nodes, "group_definition", "widget", inner));
        let group = nodes.iter().find(|n| n.name == "group_definition").unwrap();
        assert!(group.child("widget").unwrap().child("note_definition").is_some());
        assert!(group.child("widget").unwrap().child("group_definition").is_none());
    }

    #[test]
    fn test_serializes_to_json() {
        let nodes = derive(&[FieldSpec::string("title").describe("Dashboard title")]);
        let value = serde_json::to_value(&nodes).unwrap();
        assert_eq!(value[0]["type"], json!({"shape": "scalar", "of": "string"}));
        assert_eq!(value[0]["description"], json!("Dashboard title"));
    }
}
