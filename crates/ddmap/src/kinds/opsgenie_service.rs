//! Opsgenie integration service kind.

use serde_json::{Map, Value};

use super::{flatten_v2, unwrap_v2, wrap_v2, Capabilities, KindHandler, ResourceKind, UpdateMethod};
use crate::config_tree::ConfigAccessor;
use crate::error::Result;
use crate::mapping::codec::{self, BuildContext};
use crate::mapping::validation::{Diagnostic, FieldValidator};
use crate::mapping::FieldSpec;

const SERVICES_PATH: &str = "/api/v2/integration/opsgenie/services";
const TYPE_NAME: &str = "opsgenie-service";

pub struct OpsgenieServiceHandler {
    fields: Vec<FieldSpec>,
}

impl OpsgenieServiceHandler {
    pub fn new() -> Self {
        Self {
            fields: vec![
                FieldSpec::string("name").required(),
                FieldSpec::string("opsgenie_api_key")
                    .required()
                    .sensitive()
                    .describe("The Opsgenie API key. The API never returns it."),
                FieldSpec::string("region")
                    .required()
                    .valid_values(&["us", "eu", "custom"]),
                FieldSpec::string("custom_url")
                    .omit_empty()
                    .describe("The custom url for a custom region."),
            ],
        }
    }
}

impl Default for OpsgenieServiceHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl KindHandler for OpsgenieServiceHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::OpsgenieService
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
        SERVICES_PATH
    }

    fn validate(&self, cfg: &dyn ConfigAccessor) -> Vec<Diagnostic> {
        let mut diagnostics = FieldValidator::new().validate(cfg, "", &self.fields);
        let custom = cfg.get_str("region").as_deref() == Some("custom");
        let has_url = cfg.get_str("custom_url").is_some_and(|s| !s.is_empty());
        if custom && !has_url {
            diagnostics.push(Diagnostic::new(
                "custom_url",
                "is required when region is custom",
            ));
        }
        diagnostics
    }

    fn build(
        &self,
        cfg: &dyn ConfigAccessor,
        id: Option<&str>,
        ctx: &mut BuildContext,
    ) -> Result<Value> {
        let attributes = codec::build(cfg, "", &self.fields, ctx);
        Ok(wrap_v2(TYPE_NAME, id, Value::Object(attributes)))
    }

    fn flatten(&self, body: &Value, prior: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        flatten_v2(self.kind(), &self.fields, body, prior)
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        unwrap_v2(body).and_then(|(_, id)| id)
    }

    fn secret_fields(&self, _cfg: &dyn ConfigAccessor) -> Vec<&'static str> {
        vec!["opsgenie_api_key"]
    }
}
