//! Tag-dispatched unions of variant blocks.
//!
//! A union list item carries shared fields plus exactly one variant block
//! (`note_definition`, `timeseries_definition`, ...). On the wire the variant
//! becomes a plain object tagged with its `type`. The registry maps both
//! directions: block key to spec on build, tag to spec on flatten.

use std::collections::HashMap;

use serde_json::{Map, Value};

use super::codec::{self, BuildContext, Prior};
use super::field_spec::{FieldSpec, WidgetSpec};
use super::path::join;
use super::schema::{self, SchemaNode};
use super::validation::{check_union_closure, Diagnostic, FieldValidator};
use crate::config_tree::ConfigAccessor;

/// Dispatch table over a set of variants sharing one tag key.
#[derive(Debug, Clone)]
pub struct UnionRegistry {
    tag_key: &'static str,
    variants: Vec<WidgetSpec>,
    by_tag: HashMap<&'static str, usize>,
}

impl UnionRegistry {
    pub fn new(tag_key: &'static str, variants: Vec<WidgetSpec>) -> Self {
        let by_tag = variants
            .iter()
            .enumerate()
            .map(|(i, v)| (v.json_type_tag, i))
            .collect();
        Self {
            tag_key,
            variants,
            by_tag,
        }
    }

    pub fn tag_key(&self) -> &'static str {
        self.tag_key
    }

    pub fn variants(&self) -> &[WidgetSpec] {
        &self.variants
    }

    /// A copy of the registry without the variants whose tag is listed.
    pub fn without(&self, tags: &[&str]) -> Self {
        let kept = self
            .variants
            .iter()
            .filter(|v| !tags.contains(&v.json_type_tag))
            .cloned()
            .collect();
        Self::new(self.tag_key, kept)
    }

    pub fn by_tag(&self, tag: &str) -> Option<&WidgetSpec> {
        self.by_tag.get(tag).map(|&i| &self.variants[i])
    }

    pub fn by_block(&self, cfg_block_key: &str) -> Option<&WidgetSpec> {
        self.variants.iter().find(|v| v.cfg_block_key == cfg_block_key)
    }

    /// The first variant whose block is populated under `item`.
    pub fn populated(&self, cfg: &dyn ConfigAccessor, item: &str) -> Option<&WidgetSpec> {
        self.variants
            .iter()
            .find(|v| cfg.count(&join(item, v.cfg_block_key)) > 0)
    }

    /// Path of the populated variant block's element under `item`.
    pub fn variant_path(
        &self,
        cfg: &dyn ConfigAccessor,
        item: &str,
    ) -> Option<(&WidgetSpec, String)> {
        let spec = self.populated(cfg, item)?;
        let elem = codec::first_element_path(cfg, &join(item, spec.cfg_block_key))?;
        Some((spec, elem))
    }

    /// Builds the variant object of `item` and injects its tag.
    pub fn build_item(
        &self,
        cfg: &dyn ConfigAccessor,
        item: &str,
        ctx: &mut BuildContext,
    ) -> Option<(&WidgetSpec, Map<String, Value>)> {
        let (spec, elem) = self.variant_path(cfg, item)?;
        let mut built = codec::build(cfg, &elem, &spec.fields, ctx);
        built.insert(
            self.tag_key.to_string(),
            Value::String(spec.json_type_tag.to_string()),
        );
        Some((spec, built))
    }

    /// Flattens a tagged object into the state of its variant block. Unknown
    /// tags yield `None` so callers can keep their prior state.
    pub fn flatten_item(
        &self,
        data: &Map<String, Value>,
        prior: Option<Prior<'_>>,
    ) -> Option<(&WidgetSpec, Map<String, Value>)> {
        let tag = data.get(self.tag_key).and_then(Value::as_str)?;
        let spec = self.by_tag(tag)?;
        let state = match prior {
            Some(p) => {
                let prefix = join(p.prefix, &format!("{}.0", spec.cfg_block_key));
                codec::flatten_with_prior(
                    &spec.fields,
                    data,
                    Some(Prior {
                        cfg: p.cfg,
                        prefix: &prefix,
                    }),
                )
            }
            None => codec::flatten(&spec.fields, data),
        };
        Some((spec, state))
    }

    /// Canonical state of the populated variant block of `item`.
    pub fn canonicalize_item(
        &self,
        cfg: &dyn ConfigAccessor,
        item: &str,
    ) -> Option<(&WidgetSpec, Map<String, Value>)> {
        let (spec, elem) = self.variant_path(cfg, item)?;
        Some((spec, codec::canonicalize(cfg, &elem, &spec.fields)))
    }

    /// Schema of one item: shared fields plus mutually exclusive variant blocks.
    pub fn schema(&self, shared: &[FieldSpec]) -> Vec<SchemaNode> {
        schema::derive_union(shared, &self.variants)
    }

    pub fn validate(
        &self,
        cfg: &dyn ConfigAccessor,
        list_path: &str,
        shared: &[FieldSpec],
    ) -> Vec<Diagnostic> {
        FieldValidator::new().validate_union_list(cfg, list_path, shared, &self.variants)
    }

    pub fn closure(&self, shared: &[FieldSpec]) -> Vec<String> {
        check_union_closure(shared, &self.variants)
    }
}
