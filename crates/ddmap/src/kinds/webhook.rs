//! Webhook integration kinds.
//!
//! Webhooks and their custom variables live in one integration document on
//! the server side, so both kinds share a lock group.

use serde_json::{Map, Value};

use super::{expect_object, id_string, Capabilities, KindHandler, ResourceKind};
use crate::config_tree::ConfigAccessor;
use crate::error::Result;
use crate::mapping::codec::{self, Prior};
use crate::mapping::FieldSpec;

const WEBHOOKS_PATH: &str = "/api/v1/integration/webhooks/configuration/webhooks";
const CUSTOM_VARIABLES_PATH: &str = "/api/v1/integration/webhooks/configuration/custom-variables";
const LOCK_GROUP: &str = "webhooks";

/// Fields the server fills with defaults when left unset.
const SERVER_DEFAULTED: &[&str] = &["payload", "encode_as"];

pub struct WebhookHandler {
    fields: Vec<FieldSpec>,
}

impl WebhookHandler {
    pub fn new() -> Self {
        Self {
            fields: vec![
                FieldSpec::string("name")
                    .required()
                    .describe("The name of the webhook. It corresponds with `<WEBHOOK_NAME>`."),
                FieldSpec::string("url").required(),
                FieldSpec::string("payload").omit_empty(),
                FieldSpec::string("custom_headers").omit_empty(),
                FieldSpec::string("encode_as")
                    .omit_empty()
                    .valid_values(&["json", "form"]),
            ],
        }
    }
}

impl Default for WebhookHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl KindHandler for WebhookHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::Webhook
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            lock_group: Some(LOCK_GROUP),
            ..Capabilities::default()
        }
    }

    fn collection_path(&self) -> &'static str {
        WEBHOOKS_PATH
    }

    fn flatten(&self, body: &Value, prior: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let obj = expect_object(self.kind(), body)?;
        let mut state = codec::flatten_with_prior(
            &self.fields,
            obj,
            Some(Prior {
                cfg: prior,
                prefix: "",
            }),
        );
        for key in SERVER_DEFAULTED {
            let configured = prior.get_str(key).is_some_and(|s| !s.is_empty());
            if !configured {
                state.remove(*key);
            }
        }
        if state.get("custom_headers").and_then(Value::as_str) == Some("") {
            state.remove("custom_headers");
        }
        Ok(state)
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        body.get("name").and_then(id_string)
    }

    fn config_id(&self, cfg: &dyn ConfigAccessor) -> Option<String> {
        cfg.get_str("name").filter(|s| !s.is_empty())
    }
}

pub struct WebhookCustomVariableHandler {
    fields: Vec<FieldSpec>,
}

impl WebhookCustomVariableHandler {
    pub fn new() -> Self {
        Self {
            fields: vec![
                FieldSpec::string("name")
                    .required()
                    .describe("The name of the variable. It corresponds with `<CUSTOM_VARIABLE_NAME>`."),
                FieldSpec::string("value")
                    .required()
                    .sensitive()
                    .describe("The value of the custom variable."),
                FieldSpec::bool("is_secret").required(),
            ],
        }
    }
}

impl Default for WebhookCustomVariableHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl KindHandler for WebhookCustomVariableHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::WebhookCustomVariable
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            lock_group: Some(LOCK_GROUP),
            ..Capabilities::default()
        }
    }

    fn collection_path(&self) -> &'static str {
        CUSTOM_VARIABLES_PATH
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        body.get("name").and_then(id_string)
    }

    fn config_id(&self, cfg: &dyn ConfigAccessor) -> Option<String> {
        cfg.get_str("name").filter(|s| !s.is_empty())
    }

    fn secret_fields(&self, cfg: &dyn ConfigAccessor) -> Vec<&'static str> {
        match cfg.get("is_secret").and_then(|v| v.as_bool()) {
            Some(true) => vec!["value"],
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_tree::ConfigTree;
    use crate::mapping::codec::BuildContext;
    use serde_json::json;

    #[test]
    fn test_webhook_body_omits_unset_fields() {
        let handler = WebhookHandler::new();
        let cfg = ConfigTree::from_value(json!({
            "name": "w",
            "url": "https://example.com/hook",
            "encode_as": "json"
        }))
        .unwrap();
        let body = handler.build(&cfg, None, &mut BuildContext::new()).unwrap();
        assert_eq!(
            body,
            json!({"name": "w", "url": "https://example.com/hook", "encode_as": "json"})
        );
        assert!(body.get("payload").is_none());
        assert!(body.get("custom_headers").is_none());
    }

    #[test]
    fn test_server_defaults_are_not_drift() {
        let handler = WebhookHandler::new();
        let cfg = ConfigTree::from_value(json!({"name": "w", "url": "https://example.com/hook"})).unwrap();
        let response = json!({
            "name": "w",
            "url": "https://example.com/hook",
            "payload": "{\"body\": \"$EVENT_MSG\"}",
            "encode_as": "json",
            "custom_headers": ""
        });
        let flat = handler.flatten(&response, &cfg).unwrap();
        assert_eq!(flat, handler.canonicalize(&cfg).unwrap());
    }

    #[test]
    fn test_custom_variable_secret_fields() {
        let handler = WebhookCustomVariableHandler::new();
        let secret = ConfigTree::from_value(json!({"name": "TOKEN", "value": "s3cr3t", "is_secret": true})).unwrap();
        assert_eq!(handler.secret_fields(&secret), vec!["value"]);
        let plain = ConfigTree::from_value(json!({"name": "REGION", "value": "eu", "is_secret": false})).unwrap();
        assert!(handler.secret_fields(&plain).is_empty());
    }

    #[test]
    fn test_shared_lock_group() {
        assert_eq!(
            WebhookHandler::new().capabilities().lock_group,
            WebhookCustomVariableHandler::new().capabilities().lock_group
        );
        assert_eq!(
            WebhookCustomVariableHandler::new().resource_path("TOKEN"),
            "/api/v1/integration/webhooks/configuration/custom-variables/TOKEN"
        );
    }
}
