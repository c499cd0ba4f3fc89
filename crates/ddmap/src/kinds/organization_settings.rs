//! Organization settings kind.
//!
//! There is nothing to create: create adopts the organization owning the
//! credentials and applies the configuration to it. Deleting only forgets it.

use serde_json::{json, Map, Value};

use super::{
    expect_object, id_string, Capabilities, CreateMode, DeleteMode, KindHandler, ResourceKind,
};
use crate::config_tree::ConfigAccessor;
use crate::error::{EngineError, Result};
use crate::mapping::codec::{self, Prior};
use crate::mapping::FieldSpec;

const ORG_PATH: &str = "/api/v1/org";
const ACCESS_ROLES: &[&str] = &["st", "adm", "ro", "ERROR"];

pub const DELETE_ADVISORY: &str =
    "Cannot delete organization settings. Remove organization by contacting support.";

pub struct OrganizationSettingsHandler {
    fields: Vec<FieldSpec>,
}

impl OrganizationSettingsHandler {
    pub fn new() -> Self {
        Self {
            fields: organization_fields(),
        }
    }
}

impl Default for OrganizationSettingsHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn enabled_block(key: &'static str) -> FieldSpec {
    FieldSpec::block(
        key,
        vec![FieldSpec::bool("enabled").default_value(json!(false))],
    )
    .required()
}

fn organization_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("name").omit_empty(),
        FieldSpec::string("public_id").computed(),
        FieldSpec::string("description").computed(),
        FieldSpec::block(
            "settings",
            vec![
                FieldSpec::bool("private_widget_share").default_value(json!(false)),
                enabled_block("saml"),
                FieldSpec::string("saml_autocreate_access_role")
                    .default_value(json!("st"))
                    .valid_values(ACCESS_ROLES),
                FieldSpec::block(
                    "saml_autocreate_users_domains",
                    vec![
                        FieldSpec::string_list("domains"),
                        FieldSpec::bool("enabled").default_value(json!(false)),
                    ],
                )
                .required(),
                enabled_block("saml_idp_initiated_login"),
                enabled_block("saml_strict_mode"),
                FieldSpec::bool("saml_can_be_enabled").computed(),
                FieldSpec::string("saml_idp_endpoint").computed(),
                FieldSpec::bool("saml_idp_metadata_uploaded").computed(),
                FieldSpec::string("saml_login_url").computed(),
            ],
        ),
    ]
}

impl KindHandler for OrganizationSettingsHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::OrganizationSettings
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            create_mode: CreateMode::AdoptExisting,
            delete_mode: DeleteMode::SkipWithAdvisory(DELETE_ADVISORY),
            ..Capabilities::default()
        }
    }

    fn collection_path(&self) -> &'static str {
        ORG_PATH
    }

    fn flatten(&self, body: &Value, prior: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let root = expect_object(self.kind(), body)?;
        let org = root
            .get("org")
            .and_then(Value::as_object)
            .ok_or_else(|| EngineError::Serialization("organization response has no org".to_string()))?;
        let mut state = codec::flatten_with_prior(
            &self.fields,
            org,
            Some(Prior {
                cfg: prior,
                prefix: "",
            }),
        );
        // Settings are always returned; only track them when configured.
        if prior.count("settings") == 0 {
            state.remove("settings");
        }
        if prior.get_str("name").is_none() {
            state.remove("name");
        }
        Ok(state)
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        body.pointer("/org/public_id").and_then(id_string)
    }

    fn adopt_lookup_path(&self, _cfg: &dyn ConfigAccessor) -> Option<String> {
        Some(ORG_PATH.to_string())
    }

    fn adopt_match(&self, _cfg: &dyn ConfigAccessor, listing: &Value) -> Option<String> {
        listing
            .pointer("/orgs/0/public_id")
            .and_then(id_string)
    }
}
