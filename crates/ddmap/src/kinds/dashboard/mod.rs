//! Dashboard kind.
//!
//! The top-level dashboard fields go through the generic codec. Widgets are a
//! tag-dispatched union (see [`widgets`]); the group widget nests a second
//! widget list that may not contain further groups.

pub mod field_groups;
pub mod widgets;

use std::collections::HashSet;

use serde_json::{Map, Value};

use self::field_groups::{dashboard_fields, widget_item_fields};
use self::widgets::{
    formula_response_format, is_formula_capable, text_format_rule_fields, GROUP_MEMBER_WIDGETS,
    WIDGETS,
};
use super::{expect_object, Capabilities, KindHandler, ResourceKind};
use crate::config_tree::ConfigAccessor;
use crate::error::Result;
use crate::mapping::codec::{self, element_paths, value_to_i64, BuildContext, Prior};
use crate::mapping::path::{index, join};
use crate::mapping::schema::{self, inject_nested_items, SchemaNode};
use crate::mapping::validation::{Diagnostic, FieldValidator};
use crate::mapping::{FieldSpec, FieldType, UnionRegistry};

const WIDGET_LIST: &str = "widget";

pub struct DashboardHandler {
    /// Top-level fields plus the schema-only widget list.
    fields: Vec<FieldSpec>,
    top_fields: Vec<FieldSpec>,
    item_fields: Vec<FieldSpec>,
}

impl Default for DashboardHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl DashboardHandler {
    pub fn new() -> Self {
        let top_fields = dashboard_fields();
        let item_fields = widget_item_fields();
        let mut fields = top_fields.clone();
        fields.push(
            FieldSpec::block_list(WIDGET_LIST, item_fields.clone())
                .json_key("widgets")
                .schema_only()
                .describe("The list of widgets to display on the dashboard."),
        );
        Self {
            fields,
            top_fields,
            item_fields,
        }
    }

    // ========================================================================
    // Widgets: build
    // ========================================================================

    fn build_widgets(
        &self,
        cfg: &dyn ConfigAccessor,
        list_path: &str,
        registry: &UnionRegistry,
        ctx: &mut BuildContext,
    ) -> Vec<Value> {
        let mut widgets = Vec::new();
        for item in element_paths(cfg, list_path) {
            let Some((spec, elem)) = registry.variant_path(cfg, &item) else {
                ctx.advise(item.as_str(), "widget has no definition block and was skipped");
                continue;
            };
            let tag = spec.json_type_tag;
            let Some((_, mut definition)) = registry.build_item(cfg, &item, ctx) else {
                continue;
            };
            self.post_build(tag, cfg, &elem, &mut definition, ctx);

            let mut widget = codec::build(cfg, &item, &self.item_fields, ctx);
            widget.insert("definition".to_string(), Value::Object(definition));
            widgets.push(Value::Object(widget));
        }
        widgets
    }

    fn post_build(
        &self,
        tag: &str,
        cfg: &dyn ConfigAccessor,
        elem: &str,
        definition: &mut Map<String, Value>,
        ctx: &mut BuildContext,
    ) {
        match tag {
            "group" => {
                let nested = self.build_widgets(
                    cfg,
                    &join(elem, WIDGET_LIST),
                    &GROUP_MEMBER_WIDGETS,
                    ctx,
                );
                definition.insert("widgets".to_string(), Value::Array(nested));
            }
            "toplist" => set_stacked_legend(definition),
            "scatterplot" => {
                if let Some(table) = definition
                    .get_mut("requests")
                    .and_then(|r| r.get_mut("table"))
                    .and_then(Value::as_object_mut)
                {
                    if has_formula_queries(table) {
                        table.insert(
                            "response_format".to_string(),
                            Value::String("scalar".to_string()),
                        );
                    }
                }
            }
            "query_table" => build_text_formats(cfg, elem, definition, ctx),
            _ => {}
        }
        if is_formula_capable(tag) {
            add_response_format(tag, definition);
        }
    }

    // ========================================================================
    // Widgets: flatten
    // ========================================================================

    fn flatten_widgets(
        &self,
        items: &[Value],
        prior: &dyn ConfigAccessor,
        list_path: &str,
        registry: &UnionRegistry,
    ) -> Vec<Value> {
        let mut widgets = Vec::new();
        for (i, item) in items.iter().enumerate() {
            let item_path = index(list_path, i);
            let Some(item_obj) = item.as_object() else {
                continue;
            };
            let definition = item_obj.get("definition").and_then(Value::as_object);
            let item_prior = Prior {
                cfg: prior,
                prefix: &item_path,
            };

            let flattened = definition.and_then(|d| registry.flatten_item(d, Some(item_prior)));
            let (Some(definition), Some((spec, mut state))) = (definition, flattened) else {
                // Unknown widget type: keep whatever the configuration had.
                let tag = definition
                    .and_then(|d| d.get("type"))
                    .and_then(Value::as_str)
                    .unwrap_or("<missing>");
                log::warn!("Unsupported widget type '{}' at {}; keeping prior state", tag, item_path);
                if let Some(previous) = prior.get(&item_path) {
                    widgets.push(previous);
                }
                continue;
            };

            let def_prefix = join(&item_path, &format!("{}.0", spec.cfg_block_key));
            self.post_flatten(spec.json_type_tag, definition, &mut state, prior, &def_prefix);

            let mut entry = codec::flatten_with_prior(&self.item_fields, item_obj, Some(item_prior));
            if let Some(id) = definition
                .get("id")
                .or_else(|| item_obj.get("id"))
                .and_then(value_to_i64)
            {
                entry.insert("id".to_string(), Value::from(id));
            }
            entry.insert(
                spec.cfg_block_key.to_string(),
                Value::Array(vec![Value::Object(state)]),
            );
            widgets.push(Value::Object(entry));
        }
        widgets
    }

    fn post_flatten(
        &self,
        tag: &str,
        definition: &Map<String, Value>,
        state: &mut Map<String, Value>,
        prior: &dyn ConfigAccessor,
        def_prefix: &str,
    ) {
        match tag {
            "group" => {
                let items = definition
                    .get("widgets")
                    .and_then(Value::as_array)
                    .map(Vec::as_slice)
                    .unwrap_or_default();
                let nested = self.flatten_widgets(
                    items,
                    prior,
                    &join(def_prefix, WIDGET_LIST),
                    &GROUP_MEMBER_WIDGETS,
                );
                state.insert(WIDGET_LIST.to_string(), Value::Array(nested));
            }
            "query_table" => flatten_text_formats(definition, state),
            _ => {}
        }
    }

    // ========================================================================
    // Widgets: canonicalize
    // ========================================================================

    fn canonical_widgets(
        &self,
        cfg: &dyn ConfigAccessor,
        list_path: &str,
        registry: &UnionRegistry,
    ) -> Vec<Value> {
        let mut widgets = Vec::new();
        for item in element_paths(cfg, list_path) {
            let Some((spec, elem)) = registry.variant_path(cfg, &item) else {
                continue;
            };
            let Some((_, mut state)) = registry.canonicalize_item(cfg, &item) else {
                continue;
            };
            match spec.json_type_tag {
                "group" => {
                    let nested =
                        self.canonical_widgets(cfg, &join(&elem, WIDGET_LIST), &GROUP_MEMBER_WIDGETS);
                    state.insert(WIDGET_LIST.to_string(), Value::Array(nested));
                }
                "query_table" => canonical_text_formats(cfg, &elem, &mut state),
                _ => {}
            }

            let mut entry = codec::canonicalize(cfg, &item, &self.item_fields);
            entry.insert(
                spec.cfg_block_key.to_string(),
                Value::Array(vec![Value::Object(state)]),
            );
            widgets.push(Value::Object(entry));
        }
        widgets
    }

    // ========================================================================
    // Top level
    // ========================================================================

    /// Fixups applied to both read-back state and canonical configuration.
    fn normalize(&self, state: &mut Map<String, Value>) {
        for f in &self.top_fields {
            if f.omit_empty || f.computed || f.schema_only || f.alias_of.is_some() {
                continue;
            }
            if !state.contains_key(f.cfg_key) && f.field_type != FieldType::Block {
                state.insert(f.cfg_key.to_string(), f.field_type.zero_value());
            }
        }

        let has_roles = state
            .get("restricted_roles")
            .and_then(Value::as_array)
            .is_some_and(|roles| !roles.is_empty());
        let read_only = !has_roles
            && state
                .get("is_read_only")
                .and_then(Value::as_bool)
                .unwrap_or(false);
        state.insert("is_read_only".to_string(), Value::Bool(read_only));

        for tv in list_objects_mut(state, "template_variable") {
            prefer_list_form(tv, "default", "defaults");
        }
        for preset in list_objects_mut(state, "template_variable_preset") {
            for tv in list_objects_mut(preset, "template_variable") {
                prefer_list_form(tv, "value", "values");
            }
        }
    }
}

impl KindHandler for DashboardHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Dashboard
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            eventually_consistent: true,
            ..Default::default()
        }
    }

    fn collection_path(&self) -> &'static str {
        "/api/v1/dashboard"
    }

    fn schema(&self) -> Vec<SchemaNode> {
        let mut nodes = schema::derive(&self.top_fields);
        let mut widget_node = schema::derive(&self.fields[self.top_fields.len()..])
            .into_iter()
            .next()
            .unwrap_or_else(|| SchemaNode::block(WIDGET_LIST, Vec::new()));
        widget_node.children = WIDGETS.schema(&self.item_fields);
        inject_nested_items(
            &mut widget_node.children,
            "group_definition",
            WIDGET_LIST,
            GROUP_MEMBER_WIDGETS.schema(&self.item_fields),
        );
        nodes.push(widget_node);
        nodes
    }

    fn validate(&self, cfg: &dyn ConfigAccessor) -> Vec<Diagnostic> {
        let mut diagnostics = FieldValidator::new().validate(cfg, "", &self.top_fields);
        diagnostics.extend(WIDGETS.validate(cfg, WIDGET_LIST, &self.item_fields));

        for item in element_paths(cfg, WIDGET_LIST) {
            if let Some((spec, elem)) = WIDGETS.variant_path(cfg, &item) {
                if spec.json_type_tag == "group" {
                    diagnostics.extend(GROUP_MEMBER_WIDGETS.validate(
                        cfg,
                        &join(&elem, WIDGET_LIST),
                        &self.item_fields,
                    ));
                }
            }
        }

        let mut seen = HashSet::new();
        diagnostics.retain(|d| seen.insert(d.to_string()));
        diagnostics
    }

    fn build(
        &self,
        cfg: &dyn ConfigAccessor,
        id: Option<&str>,
        ctx: &mut BuildContext,
    ) -> Result<Value> {
        let mut body = codec::build(cfg, "", &self.top_fields, ctx);
        body.insert(
            "id".to_string(),
            Value::String(id.unwrap_or_default().to_string()),
        );
        let widgets = self.build_widgets(cfg, WIDGET_LIST, &WIDGETS, ctx);
        body.insert("widgets".to_string(), Value::Array(widgets));
        Ok(Value::Object(body))
    }

    fn flatten(&self, body: &Value, prior: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let obj = expect_object(self.kind(), body)?;
        let mut state = codec::flatten_with_prior(
            &self.top_fields,
            obj,
            Some(Prior {
                cfg: prior,
                prefix: "",
            }),
        );
        self.normalize(&mut state);

        let items = obj
            .get("widgets")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        let widgets = self.flatten_widgets(items, prior, WIDGET_LIST, &WIDGETS);
        state.insert(WIDGET_LIST.to_string(), Value::Array(widgets));
        Ok(state)
    }

    fn canonicalize(&self, cfg: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let mut state = codec::canonicalize(cfg, "", &self.top_fields);
        self.normalize(&mut state);
        let widgets = self.canonical_widgets(cfg, WIDGET_LIST, &WIDGETS);
        state.insert(WIDGET_LIST.to_string(), Value::Array(widgets));
        Ok(state)
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn has_formula_queries(request: &Map<String, Value>) -> bool {
    ["formulas", "queries"].iter().any(|key| {
        request
            .get(*key)
            .and_then(Value::as_array)
            .is_some_and(|items| !items.is_empty())
    })
}

fn add_response_format(tag: &str, definition: &mut Map<String, Value>) {
    let format = formula_response_format(tag);
    if let Some(Value::Array(requests)) = definition.get_mut("requests") {
        for request in requests.iter_mut().filter_map(Value::as_object_mut) {
            if has_formula_queries(request) {
                request.insert(
                    "response_format".to_string(),
                    Value::String(format.to_string()),
                );
            }
        }
    }
}

/// Stacked toplists need an explicit legend mode.
fn set_stacked_legend(definition: &mut Map<String, Value>) {
    let Some(display) = definition
        .get_mut("style")
        .and_then(|s| s.get_mut("display"))
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    if display.get("type").and_then(Value::as_str) == Some("stacked") {
        display.insert("legend".to_string(), Value::String("automatic".to_string()));
    }
}

/// Mutable objects of the list stored under `key`.
fn list_objects_mut<'a>(
    map: &'a mut Map<String, Value>,
    key: &str,
) -> impl Iterator<Item = &'a mut Map<String, Value>> {
    map.get_mut(key)
        .and_then(Value::as_array_mut)
        .into_iter()
        .flat_map(|items| items.iter_mut().filter_map(Value::as_object_mut))
}

/// Drops the scalar form when the list form is populated.
fn prefer_list_form(map: &mut Map<String, Value>, scalar: &str, list: &str) {
    let has_list = map
        .get(list)
        .and_then(Value::as_array)
        .is_some_and(|items| !items.is_empty());
    if has_list {
        map.remove(scalar);
    }
}

// `text_formats` is a list of rule lists on the wire.

fn build_text_formats(
    cfg: &dyn ConfigAccessor,
    elem: &str,
    definition: &mut Map<String, Value>,
    ctx: &mut BuildContext,
) {
    let rule_fields = text_format_rule_fields();
    let request_paths = element_paths(cfg, &join(elem, "request"));
    let Some(Value::Array(requests)) = definition.get_mut("requests") else {
        return;
    };
    for (request_path, request) in request_paths.iter().zip(requests.iter_mut()) {
        let rows: Vec<Value> = element_paths(cfg, &join(request_path, "text_formats"))
            .into_iter()
            .map(|row| {
                let rules = element_paths(cfg, &join(&row, "text_format"))
                    .into_iter()
                    .map(|rule| Value::Object(codec::build(cfg, &rule, &rule_fields, ctx)))
                    .collect();
                Value::Array(rules)
            })
            .collect();
        if let (false, Some(request)) = (rows.is_empty(), request.as_object_mut()) {
            request.insert("text_formats".to_string(), Value::Array(rows));
        }
    }
}

fn flatten_text_formats(definition: &Map<String, Value>, state: &mut Map<String, Value>) {
    let rule_fields = text_format_rule_fields();
    let Some(requests) = definition.get("requests").and_then(Value::as_array) else {
        return;
    };
    let Some(Value::Array(request_states)) = state.get_mut("request") else {
        return;
    };
    for (request, request_state) in requests.iter().zip(request_states.iter_mut()) {
        let Some(rows) = request.get("text_formats").and_then(Value::as_array) else {
            continue;
        };
        let rows: Vec<Value> = rows
            .iter()
            .map(|row| {
                let rules = row
                    .as_array()
                    .map(Vec::as_slice)
                    .unwrap_or_default()
                    .iter()
                    .filter_map(Value::as_object)
                    .map(|rule| Value::Object(codec::flatten(&rule_fields, rule)))
                    .collect();
                text_format_row(rules)
            })
            .collect();
        if let Some(request_state) = request_state.as_object_mut() {
            request_state.insert("text_formats".to_string(), Value::Array(rows));
        }
    }
}

fn canonical_text_formats(cfg: &dyn ConfigAccessor, elem: &str, state: &mut Map<String, Value>) {
    let rule_fields = text_format_rule_fields();
    let request_paths = element_paths(cfg, &join(elem, "request"));
    let Some(Value::Array(request_states)) = state.get_mut("request") else {
        return;
    };
    for (request_path, request_state) in request_paths.iter().zip(request_states.iter_mut()) {
        let rows: Vec<Value> = element_paths(cfg, &join(request_path, "text_formats"))
            .into_iter()
            .map(|row| {
                let rules = element_paths(cfg, &join(&row, "text_format"))
                    .into_iter()
                    .map(|rule| Value::Object(codec::canonicalize(cfg, &rule, &rule_fields)))
                    .collect();
                text_format_row(rules)
            })
            .collect();
        if let (false, Some(request_state)) = (rows.is_empty(), request_state.as_object_mut()) {
            request_state.insert("text_formats".to_string(), Value::Array(rows));
        }
    }
}

fn text_format_row(rules: Vec<Value>) -> Value {
    let mut row = Map::new();
    row.insert("text_format".to_string(), Value::Array(rules));
    Value::Object(row)
}
