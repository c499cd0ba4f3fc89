//! PagerDuty integration service object kind.
//!
//! Service objects are keyed by service name and mutate the single
//! PagerDuty integration document, so writes are serialized.

use serde_json::Value;

use super::{id_string, Capabilities, KindHandler, ResourceKind};
use crate::config_tree::ConfigAccessor;
use crate::error::Result;
use crate::mapping::codec::{self, BuildContext};
use crate::mapping::FieldSpec;

const SERVICES_PATH: &str = "/api/v1/integration/pagerduty/configuration/services";

pub struct PagerdutyServiceObjectHandler {
    fields: Vec<FieldSpec>,
}

impl PagerdutyServiceObjectHandler {
    pub fn new() -> Self {
        Self {
            fields: vec![
                FieldSpec::string("service_name")
                    .required()
                    .force_new()
                    .describe("Your Service name in PagerDuty."),
                FieldSpec::string("service_key")
                    .required()
                    .sensitive()
                    .describe("The service key associated with the service name. The API never returns it."),
            ],
        }
    }
}

impl Default for PagerdutyServiceObjectHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl KindHandler for PagerdutyServiceObjectHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::PagerdutyServiceObject
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            lock_group: Some("pagerduty"),
            adopt_on_conflict: true,
            read_after_write: true,
            ..Capabilities::default()
        }
    }

    fn collection_path(&self) -> &'static str {
        SERVICES_PATH
    }

    /// Updates only carry the key; the name is the path parameter.
    fn build(
        &self,
        cfg: &dyn ConfigAccessor,
        id: Option<&str>,
        ctx: &mut BuildContext,
    ) -> Result<Value> {
        let mut body = codec::build(cfg, "", &self.fields, ctx);
        if id.is_some() {
            body.remove("service_name");
        }
        Ok(Value::Object(body))
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        body.get("service_name").and_then(id_string)
    }

    fn config_id(&self, cfg: &dyn ConfigAccessor) -> Option<String> {
        cfg.get_str("service_name").filter(|s| !s.is_empty())
    }

    fn secret_fields(&self, _cfg: &dyn ConfigAccessor) -> Vec<&'static str> {
        vec!["service_key"]
    }

    fn adopt_lookup_path(&self, cfg: &dyn ConfigAccessor) -> Option<String> {
        self.config_id(cfg).map(|name| self.resource_path(&name))
    }

    fn adopt_match(&self, cfg: &dyn ConfigAccessor, listing: &Value) -> Option<String> {
        let wanted = self.config_id(cfg)?;
        let found = self.extract_id(listing)?;
        (found == wanted).then_some(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_tree::ConfigTree;
    use serde_json::{json, Map};

    fn service_object_body(service_name: &str) -> Value {
        json!({ "service_name": service_name })
    }

    fn config() -> ConfigTree {
        ConfigTree::from_value(json!({"service_name": "checkout", "service_key": "pd-key"})).unwrap()
    }

    #[test]
    fn test_create_and_update_bodies() {
        let handler = PagerdutyServiceObjectHandler::new();
        let create = handler.build(&config(), None, &mut BuildContext::new()).unwrap();
        assert_eq!(create, json!({"service_name": "checkout", "service_key": "pd-key"}));
        let update = handler
            .build(&config(), Some("checkout"), &mut BuildContext::new())
            .unwrap();
        assert_eq!(update, json!({"service_key": "pd-key"}));
    }

    #[test]
    fn test_adopt_by_service_name() {
        let handler = PagerdutyServiceObjectHandler::new();
        assert_eq!(
            handler.adopt_lookup_path(&config()).as_deref(),
            Some("/api/v1/integration/pagerduty/configuration/services/checkout")
        );
        assert_eq!(
            handler.adopt_match(&config(), &service_object_body("checkout")).as_deref(),
            Some("checkout")
        );
        assert!(handler.adopt_match(&config(), &service_object_body("billing")).is_none());
    }

    #[test]
    fn test_flatten_has_no_key() {
        let handler = PagerdutyServiceObjectHandler::new();
        let flat: Map<String, Value> = handler
            .flatten(&service_object_body("checkout"), &config())
            .unwrap();
        assert_eq!(flat.get("service_name"), Some(&json!("checkout")));
        assert!(flat.get("service_key").is_none());
        assert_eq!(handler.secret_fields(&config()), vec!["service_key"]);
    }
}
