//! Resource Kind Registry.
//!
//! Every managed Datadog resource kind implements [`KindHandler`]: its field
//! tree, its API paths and the hooks the reconciler calls around Build and
//! Flatten. [`KindRegistry`] maps a [`ResourceKind`] to its handler.

pub mod application_key;
pub mod dashboard;
pub mod logs_index;
pub mod opsgenie_service;
pub mod organization_settings;
pub mod pagerduty_service_object;
pub mod security_rule;
pub mod service_definition;
pub mod user;
pub mod webhook;

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config_tree::ConfigAccessor;
use crate::error::{EngineError, Result};
use crate::mapping::codec::{self, BuildContext, Prior};
use crate::mapping::schema::{self, SchemaNode};
use crate::mapping::validation::{Diagnostic, FieldValidator};
use crate::mapping::FieldSpec;

/// The kind of resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Dashboard,
    SecurityMonitoringRule,
    CloudConfigurationRule,
    ServiceDefinition,
    LogsIndex,
    Webhook,
    WebhookCustomVariable,
    OpsgenieService,
    PagerdutyServiceObject,
    ApplicationKey,
    User,
    ServiceAccount,
    OrganizationSettings,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::Dashboard => "dashboard",
            ResourceKind::SecurityMonitoringRule => "security_monitoring_rule",
            ResourceKind::CloudConfigurationRule => "cloud_configuration_rule",
            ResourceKind::ServiceDefinition => "service_definition",
            ResourceKind::LogsIndex => "logs_index",
            ResourceKind::Webhook => "webhook",
            ResourceKind::WebhookCustomVariable => "webhook_custom_variable",
            ResourceKind::OpsgenieService => "opsgenie_service",
            ResourceKind::PagerdutyServiceObject => "pagerduty_service_object",
            ResourceKind::ApplicationKey => "application_key",
            ResourceKind::User => "user",
            ResourceKind::ServiceAccount => "service_account",
            ResourceKind::OrganizationSettings => "organization_settings",
        }
    }

    /// Returns all resource kinds.
    pub fn all() -> &'static [ResourceKind] {
        &[
            ResourceKind::Dashboard,
            ResourceKind::SecurityMonitoringRule,
            ResourceKind::CloudConfigurationRule,
            ResourceKind::ServiceDefinition,
            ResourceKind::LogsIndex,
            ResourceKind::Webhook,
            ResourceKind::WebhookCustomVariable,
            ResourceKind::OpsgenieService,
            ResourceKind::PagerdutyServiceObject,
            ResourceKind::ApplicationKey,
            ResourceKind::User,
            ResourceKind::ServiceAccount,
            ResourceKind::OrganizationSettings,
        ]
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for ResourceKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.to_lowercase().replace('-', "_");
        ResourceKind::all()
            .iter()
            .copied()
            .find(|k| k.as_str() == normalized)
            .ok_or_else(|| format!("Unknown resource kind: {}", s))
    }
}

// ============================================================================
// Capabilities
// ============================================================================

/// How a kind comes into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateMode {
    /// POST to the create path.
    Post,
    /// The API cannot create it; the resource must be adopted by id first.
    RequiresAdoption,
    /// Create looks the existing singleton up and updates it.
    AdoptExisting,
}

/// How a kind goes away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeleteMode {
    Api,
    /// Local state is dropped without calling the API.
    Skip,
    /// Like `Skip`, with an advisory for the caller.
    SkipWithAdvisory(&'static str),
}

/// HTTP method used for updates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMethod {
    Put,
    Patch,
    Post,
}

/// Reconciler-facing traits of a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Reads right after a create may 404 for a while.
    pub eventually_consistent: bool,
    pub create_mode: CreateMode,
    pub delete_mode: DeleteMode,
    pub update_method: UpdateMethod,
    /// Kinds sharing a lock group never mutate concurrently.
    pub lock_group: Option<&'static str>,
    /// A 409 on create switches to adopt-then-update.
    pub adopt_on_conflict: bool,
    /// Write responses are not the resource; state comes from a fresh read.
    pub read_after_write: bool,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self {
            eventually_consistent: false,
            create_mode: CreateMode::Post,
            delete_mode: DeleteMode::Api,
            update_method: UpdateMethod::Put,
            lock_group: None,
            adopt_on_conflict: false,
            read_after_write: false,
        }
    }
}

// ============================================================================
// Handler trait
// ============================================================================

/// Per-kind mapping and API description.
///
/// The defaults cover kinds whose payload is the plain Build of their field
/// tree and whose id sits at `resp["id"]`.
pub trait KindHandler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Top-level field tree.
    fn fields(&self) -> &[FieldSpec];

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    /// Collection endpoint, e.g. `/api/v1/dashboard`.
    fn collection_path(&self) -> &'static str;

    /// Item endpoint. The id is percent-encoded as one path segment.
    fn resource_path(&self, id: &str) -> String {
        format!("{}/{}", self.collection_path(), urlencoding::encode(id))
    }

    fn create_path(&self) -> String {
        self.collection_path().to_string()
    }

    fn update_path(&self, id: &str) -> String {
        self.resource_path(id)
    }

    fn schema(&self) -> Vec<SchemaNode> {
        schema::derive(self.fields())
    }

    fn validate(&self, cfg: &dyn ConfigAccessor) -> Vec<Diagnostic> {
        FieldValidator::new().validate(cfg, "", self.fields())
    }

    /// Request body for create (`id == None`) or update.
    fn build(
        &self,
        cfg: &dyn ConfigAccessor,
        _id: Option<&str>,
        ctx: &mut BuildContext,
    ) -> Result<Value> {
        Ok(Value::Object(codec::build(cfg, "", self.fields(), ctx)))
    }

    /// State for a response body. `prior` is the user's configuration.
    fn flatten(&self, body: &Value, prior: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let obj = expect_object(self.kind(), body)?;
        Ok(codec::flatten_with_prior(
            self.fields(),
            obj,
            Some(Prior {
                cfg: prior,
                prefix: "",
            }),
        ))
    }

    /// The state a configuration should produce once applied.
    fn canonicalize(&self, cfg: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        Ok(codec::canonicalize(cfg, "", self.fields()))
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        body.get("id").and_then(id_string)
    }

    /// Id derivable from configuration alone, for kinds keyed by name.
    fn config_id(&self, _cfg: &dyn ConfigAccessor) -> Option<String> {
        None
    }

    /// Rejects a read whose body cannot be managed under this kind.
    fn check_observed(&self, _id: &str, _body: &Value) -> Result<()> {
        Ok(())
    }

    /// Top-level keys the server never returns.
    fn secret_fields(&self, _cfg: &dyn ConfigAccessor) -> Vec<&'static str> {
        Vec::new()
    }

    /// Keys whose change forces destroy-create.
    fn replacement_keys(&self, desired: &Map<String, Value>, current: &Map<String, Value>) -> Vec<String> {
        self.fields()
            .iter()
            .filter(|f| f.force_new)
            .filter(|f| current.contains_key(f.cfg_key))
            .filter(|f| desired.get(f.cfg_key) != current.get(f.cfg_key))
            .map(|f| f.cfg_key.to_string())
            .collect()
    }

    /// Extra POST issued once after a successful create, as `(path, body)`.
    fn after_create(&self, _cfg: &dyn ConfigAccessor, _id: &str) -> Option<(String, Value)> {
        None
    }

    /// Listing queried to find an existing resource on adopt.
    fn adopt_lookup_path(&self, _cfg: &dyn ConfigAccessor) -> Option<String> {
        None
    }

    /// Id of the resource in `listing` matching the configuration's business key.
    fn adopt_match(&self, _cfg: &dyn ConfigAccessor, _listing: &Value) -> Option<String> {
        None
    }
}

pub(crate) fn expect_object(kind: ResourceKind, body: &Value) -> Result<&Map<String, Value>> {
    body.as_object().ok_or_else(|| {
        EngineError::Serialization(format!("{} response is not a JSON object", kind))
    })
}

/// Ids come back as strings on most endpoints and as integers on a few.
pub(crate) fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

// ============================================================================
// V2 envelope
// ============================================================================

/// Wraps attributes as `{"data": {"type", "id"?, "attributes"}}`.
pub fn wrap_v2(type_name: &str, id: Option<&str>, attributes: Value) -> Value {
    let mut data = Map::new();
    data.insert("type".to_string(), Value::String(type_name.to_string()));
    if let Some(id) = id {
        data.insert("id".to_string(), Value::String(id.to_string()));
    }
    data.insert("attributes".to_string(), attributes);
    let mut root = Map::new();
    root.insert("data".to_string(), Value::Object(data));
    Value::Object(root)
}

/// Attributes and id of a V2 response.
pub fn unwrap_v2(body: &Value) -> Option<(&Map<String, Value>, Option<String>)> {
    let data = body.get("data")?;
    let attributes = data.get("attributes")?.as_object()?;
    let id = data.get("id").and_then(id_string);
    Some((attributes, id))
}

/// Flattens the attributes of a V2 response.
pub(crate) fn flatten_v2(
    kind: ResourceKind,
    fields: &[FieldSpec],
    body: &Value,
    prior: &dyn ConfigAccessor,
) -> Result<Map<String, Value>> {
    let (attributes, _) = unwrap_v2(body).ok_or_else(|| {
        EngineError::Serialization(format!("{} response has no data.attributes", kind))
    })?;
    Ok(codec::flatten_with_prior(
        fields,
        attributes,
        Some(Prior {
            cfg: prior,
            prefix: "",
        }),
    ))
}

// ============================================================================
// Registry
// ============================================================================

/// Kind to handler dispatch.
#[derive(Clone, Default)]
pub struct KindRegistry {
    handlers: HashMap<ResourceKind, Arc<dyn KindHandler>>,
}

impl KindRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry holding every built-in kind.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(dashboard::DashboardHandler::new()));
        registry.register(Arc::new(security_rule::SecurityRuleHandler::standard()));
        registry.register(Arc::new(security_rule::SecurityRuleHandler::cloud_configuration()));
        registry.register(Arc::new(service_definition::ServiceDefinitionHandler::new()));
        registry.register(Arc::new(logs_index::LogsIndexHandler::new()));
        registry.register(Arc::new(webhook::WebhookHandler::new()));
        registry.register(Arc::new(webhook::WebhookCustomVariableHandler::new()));
        registry.register(Arc::new(opsgenie_service::OpsgenieServiceHandler::new()));
        registry.register(Arc::new(pagerduty_service_object::PagerdutyServiceObjectHandler::new()));
        registry.register(Arc::new(application_key::ApplicationKeyHandler::new()));
        registry.register(Arc::new(user::UserHandler::user()));
        registry.register(Arc::new(user::UserHandler::service_account()));
        registry.register(Arc::new(organization_settings::OrganizationSettingsHandler::new()));
        registry
    }

    /// Registers a handler, replacing any previous one for the same kind.
    pub fn register(&mut self, handler: Arc<dyn KindHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    pub fn get(&self, kind: ResourceKind) -> Result<Arc<dyn KindHandler>> {
        self.handlers
            .get(&kind)
            .cloned()
            .ok_or_else(|| EngineError::UnknownKind(kind.to_string()))
    }

    /// Registered kinds, in declaration order.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        let mut kinds: Vec<ResourceKind> = self.handlers.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

impl std::fmt::Debug for KindRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::validation::check_closure;
    use serde_json::json;

    #[test]
    fn test_kind_from_str() {
        assert_eq!("dashboard".parse::<ResourceKind>().unwrap(), ResourceKind::Dashboard);
        assert_eq!(
            "Logs-Index".parse::<ResourceKind>().unwrap(),
            ResourceKind::LogsIndex
        );
        assert!("monitor".parse::<ResourceKind>().is_err());
    }

    #[test]
    fn test_kind_display_round_trip() {
        for kind in ResourceKind::all() {
            assert_eq!(kind.to_string().parse::<ResourceKind>().unwrap(), *kind);
        }
    }

    #[test]
    fn test_defaults_register_every_kind() {
        let registry = KindRegistry::with_defaults();
        assert_eq!(registry.kinds(), ResourceKind::all().to_vec());
        for kind in ResourceKind::all() {
            assert_eq!(registry.get(*kind).unwrap().kind(), *kind);
        }
    }

    #[test]
    fn test_unknown_kind() {
        let registry = KindRegistry::new();
        let err = registry.get(ResourceKind::User).err().unwrap();
        assert!(matches!(err, EngineError::UnknownKind(ref k) if k == "user"));
    }

    #[test]
    fn test_every_kind_tree_is_closed() {
        let registry = KindRegistry::with_defaults();
        for kind in registry.kinds() {
            let handler = registry.get(kind).unwrap();
            let errors = check_closure(handler.fields());
            assert!(errors.is_empty(), "{}: {:?}", kind, errors);
        }
    }

    #[test]
    fn test_v2_envelope() {
        let body = wrap_v2("opsgenie-service", Some("abc"), json!({"name": "ops"}));
        assert_eq!(
            body,
            json!({"data": {"type": "opsgenie-service", "id": "abc", "attributes": {"name": "ops"}}})
        );
        let (attributes, id) = unwrap_v2(&body).unwrap();
        assert_eq!(attributes["name"], json!("ops"));
        assert_eq!(id.as_deref(), Some("abc"));
    }

    #[test]
    fn test_resource_path_escapes_id() {
        let registry = KindRegistry::with_defaults();
        let webhook = registry.get(ResourceKind::Webhook).unwrap();
        assert_eq!(
            webhook.resource_path("deploy hook/prod?x#y"),
            "/api/v1/integration/webhooks/configuration/webhooks/deploy%20hook%2Fprod%3Fx%23y"
        );
        let user = registry.get(ResourceKind::User).unwrap();
        assert_eq!(user.resource_path("a/b"), "/api/v2/users/a%2Fb");
        assert_eq!(
            webhook.resource_path("plain-name_1"),
            format!("{}/plain-name_1", webhook.collection_path())
        );
    }

    #[test]
    fn test_numeric_ids() {
        assert_eq!(id_string(&json!(42)), Some("42".to_string()));
        assert_eq!(id_string(&json!("")), None);
    }
}
