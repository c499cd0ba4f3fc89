//! Service definition kind.
//!
//! The whole definition is a single YAML (or JSON) document held under the
//! `service_definition` key. Build sends the parsed document, state holds a
//! canonical re-serialization so cosmetic differences do not show as drift.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::{Capabilities, KindHandler, ResourceKind, UpdateMethod};
use crate::config_tree::ConfigAccessor;
use crate::error::{EngineError, Result};
use crate::mapping::codec::BuildContext;
use crate::mapping::validation::Diagnostic;
use crate::mapping::FieldSpec;

const DEFINITIONS_PATH: &str = "/api/v2/services/definitions";
const DOCUMENT_KEY: &str = "service_definition";

const SCHEMA_VERSIONS: &[&str] = &["v2", "v2.1", "v2.2", "v3", "v3.1"];
const BACKSTAGE_API_VERSION: &str = "backstage.io/v1alpha1";

/// Lists of objects kept sorted by their `name`.
const NAMED_LISTS: &[&str] = &["contacts", "repos", "docs", "links"];
/// Objects dropped when present but empty.
const DROPPED_WHEN_EMPTY: &[&str] = &["team", "extensions", "integrations"];

static INVALID_TAG_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-z0-9_:./\-]+").expect("valid tag regex"));

pub struct ServiceDefinitionHandler {
    fields: Vec<FieldSpec>,
}

impl ServiceDefinitionHandler {
    pub fn new() -> Self {
        Self {
            fields: vec![FieldSpec::string(DOCUMENT_KEY)
                .required()
                .describe("The service definition document, in YAML or JSON.")],
        }
    }
}

impl Default for ServiceDefinitionHandler {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Document handling
// ============================================================================

/// Parses a definition document. JSON is accepted as a YAML subset.
pub fn parse_document(source: &str) -> Result<Map<String, Value>> {
    let value: Value = serde_yaml::from_str(source)
        .map_err(|e| EngineError::Serialization(format!("invalid service definition: {}", e)))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(EngineError::Serialization(
            "service definition must be a mapping".to_string(),
        )),
    }
}

fn is_backstage(doc: &Map<String, Value>) -> bool {
    doc.contains_key("apiVersion")
}

/// Lowercases a tag value and replaces characters Datadog does not keep.
pub fn normalize_tag(raw: &str) -> String {
    let lowered = raw.trim().to_lowercase();
    INVALID_TAG_CHARS
        .replace_all(&lowered, "_")
        .trim_matches('_')
        .to_string()
}

/// Service name a document identifies, normalized.
pub fn service_name(doc: &Map<String, Value>) -> Option<String> {
    if is_backstage(doc) {
        return doc
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string);
    }
    doc.get("dd-service")
        .and_then(Value::as_str)
        .map(normalize_tag)
        .filter(|s| !s.is_empty())
}

/// Brings a document to the shape the server returns it in.
///
/// Backstage documents are left alone.
pub fn normalize_document(mut doc: Map<String, Value>) -> Map<String, Value> {
    if is_backstage(&doc) {
        return doc;
    }

    doc.remove("dd-team");
    if let Some(Value::String(service)) = doc.get_mut("dd-service") {
        *service = normalize_tag(service);
    }
    for key in DROPPED_WHEN_EMPTY {
        let empty = match doc.get(*key) {
            Some(Value::Null) => true,
            Some(Value::String(s)) => s.is_empty(),
            Some(Value::Object(m)) => m.is_empty(),
            _ => false,
        };
        if empty {
            doc.remove(*key);
        }
    }

    let mut tags_empty = false;
    if let Some(Value::Array(tags)) = doc.get_mut("tags") {
        for tag in tags.iter_mut() {
            if let Value::String(raw) = tag {
                *raw = normalize_tag(raw);
            }
        }
        tags.sort_by(|a, b| a.as_str().unwrap_or_default().cmp(b.as_str().unwrap_or_default()));
        tags_empty = tags.is_empty();
    }
    if tags_empty {
        doc.remove("tags");
    }

    for key in NAMED_LISTS {
        let mut empty = false;
        if let Some(Value::Array(items)) = doc.get_mut(*key) {
            items.sort_by(|a, b| name_of(a).cmp(name_of(b)));
            empty = items.is_empty();
        }
        if empty {
            doc.remove(*key);
        }
    }
    doc
}

fn name_of(item: &Value) -> &str {
    item.get("name").and_then(Value::as_str).unwrap_or_default()
}

/// Canonical YAML text of a document.
pub fn canonical_yaml(doc: Map<String, Value>) -> Result<String> {
    serde_yaml::to_string(&Value::Object(normalize_document(doc)))
        .map_err(|e| EngineError::Serialization(e.to_string()))
}

fn validate_document(doc: &Map<String, Value>) -> Vec<String> {
    let mut problems = Vec::new();
    if is_backstage(doc) {
        if doc.get("apiVersion").and_then(Value::as_str) != Some(BACKSTAGE_API_VERSION) {
            problems.push(format!("apiVersion must be {}", BACKSTAGE_API_VERSION));
        }
        if doc.get("kind").and_then(Value::as_str) != Some("Component") {
            problems.push("kind must be Component".to_string());
        }
        if doc
            .get("spec")
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
            .map_or(true, str::is_empty)
        {
            problems.push("spec.type is required".to_string());
        }
        if doc
            .get("metadata")
            .and_then(|m| m.get("name"))
            .and_then(Value::as_str)
            .map_or(true, str::is_empty)
        {
            problems.push("metadata.name is required".to_string());
        }
        return problems;
    }

    let Some(version) = doc.get("schema-version").and_then(Value::as_str) else {
        problems.push("Must be a supported service schema".to_string());
        return problems;
    };
    if !SCHEMA_VERSIONS.contains(&version) {
        problems.push(format!(
            "schema-version '{}' is not supported, expected one of: {}",
            version,
            SCHEMA_VERSIONS.join(", ")
        ));
    }
    match doc.get("dd-service").and_then(Value::as_str) {
        Some(service) if !service.trim().is_empty() => {}
        _ => problems.push("dd-service must be a non-empty string".to_string()),
    }
    problems
}

/// The `schema` object of a create (list) or read (object) response.
fn response_schema(body: &Value) -> Option<&Map<String, Value>> {
    let data = body.get("data")?;
    let data = match data {
        Value::Array(items) => items.first()?,
        other => other,
    };
    data.get("attributes")?.get("schema")?.as_object()
}

impl ServiceDefinitionHandler {
    fn document(&self, cfg: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let source = cfg.get_str(DOCUMENT_KEY).ok_or_else(|| {
            EngineError::Configuration(format!("{} is required", DOCUMENT_KEY))
        })?;
        parse_document(&source)
    }

    fn state_of(&self, doc: Map<String, Value>) -> Result<Map<String, Value>> {
        let mut state = Map::new();
        state.insert(DOCUMENT_KEY.to_string(), Value::String(canonical_yaml(doc)?));
        Ok(state)
    }
}

impl KindHandler for ServiceDefinitionHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ServiceDefinition
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            update_method: UpdateMethod::Post,
            ..Capabilities::default()
        }
    }

    fn collection_path(&self) -> &'static str {
        DEFINITIONS_PATH
    }

    /// Updates re-post the document to the collection.
    fn update_path(&self, _id: &str) -> String {
        DEFINITIONS_PATH.to_string()
    }

    fn validate(&self, cfg: &dyn ConfigAccessor) -> Vec<Diagnostic> {
        let Some(source) = cfg.get_str(DOCUMENT_KEY) else {
            return vec![Diagnostic::new(DOCUMENT_KEY, "is required")];
        };
        match parse_document(&source) {
            Ok(doc) => validate_document(&doc)
                .into_iter()
                .map(|problem| Diagnostic::new(DOCUMENT_KEY, problem))
                .collect(),
            Err(e) => vec![Diagnostic::new(DOCUMENT_KEY, e.to_string())],
        }
    }

    fn build(
        &self,
        cfg: &dyn ConfigAccessor,
        _id: Option<&str>,
        _ctx: &mut BuildContext,
    ) -> Result<Value> {
        Ok(Value::Object(self.document(cfg)?))
    }

    fn flatten(&self, body: &Value, prior: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        // The API translates Backstage documents, so keep the user's text.
        if let Some(doc) = prior
            .get_str(DOCUMENT_KEY)
            .and_then(|s| parse_document(&s).ok())
            .filter(is_backstage)
        {
            return self.state_of(doc);
        }
        let schema = response_schema(body).ok_or_else(|| {
            EngineError::Serialization("service definition response has no schema".to_string())
        })?;
        self.state_of(schema.clone())
    }

    fn canonicalize(&self, cfg: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        self.state_of(self.document(cfg)?)
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        response_schema(body).and_then(service_name)
    }

    fn replacement_keys(&self, desired: &Map<String, Value>, current: &Map<String, Value>) -> Vec<String> {
        let name = |state: &Map<String, Value>| {
            state
                .get(DOCUMENT_KEY)
                .and_then(Value::as_str)
                .and_then(|s| parse_document(s).ok())
                .and_then(|doc| service_name(&doc))
        };
        match (name(desired), name(current)) {
            (Some(d), Some(c)) if d != c => vec![DOCUMENT_KEY.to_string()],
            _ => Vec::new(),
        }
    }
}
