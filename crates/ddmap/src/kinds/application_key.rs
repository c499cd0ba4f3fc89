//! Application key kind for the current user.
//!
//! The key value is only returned by the create call.

use serde_json::{json, Map, Value};

use super::{flatten_v2, unwrap_v2, wrap_v2, Capabilities, KindHandler, ResourceKind, UpdateMethod};
use crate::config_tree::ConfigAccessor;
use crate::error::Result;
use crate::mapping::codec::BuildContext;
use crate::mapping::FieldSpec;

const KEYS_PATH: &str = "/api/v2/current_user/application_keys";
const TYPE_NAME: &str = "application_keys";

pub struct ApplicationKeyHandler {
    fields: Vec<FieldSpec>,
}

impl ApplicationKeyHandler {
    pub fn new() -> Self {
        Self {
            fields: vec![
                FieldSpec::string("name")
                    .required()
                    .describe("Name for Application Key."),
                FieldSpec::string("key")
                    .computed()
                    .sensitive()
                    .describe("The value of the Application Key."),
            ],
        }
    }
}

impl Default for ApplicationKeyHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl KindHandler for ApplicationKeyHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::ApplicationKey
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            update_method: UpdateMethod::Patch,
            ..Capabilities::default()
        }
    }

    fn collection_path(&self) -> &'static str {
        KEYS_PATH
    }

    fn build(
        &self,
        cfg: &dyn ConfigAccessor,
        id: Option<&str>,
        _ctx: &mut BuildContext,
    ) -> Result<Value> {
        let name = cfg.get_str("name").unwrap_or_default();
        Ok(wrap_v2(TYPE_NAME, id, json!({ "name": name })))
    }

    fn flatten(&self, body: &Value, prior: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let mut state = flatten_v2(self.kind(), &self.fields, body, prior)?;
        if state.get("key").and_then(Value::as_str) == Some("") {
            state.remove("key");
        }
        Ok(state)
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        unwrap_v2(body).and_then(|(_, id)| id)
    }

    fn secret_fields(&self, _cfg: &dyn ConfigAccessor) -> Vec<&'static str> {
        vec!["key"]
    }
}
