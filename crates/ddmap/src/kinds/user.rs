//! User and service account kinds.
//!
//! Datadog never deletes accounts, it disables them, so a create for a known
//! email answers 409 and the account is adopted by exact email match.

use serde_json::{json, Map, Value};

use super::{id_string, unwrap_v2, Capabilities, KindHandler, ResourceKind, UpdateMethod};
use crate::config_tree::ConfigAccessor;
use crate::error::{EngineError, Result};
use crate::mapping::codec::{self, BuildContext, Prior};
use crate::mapping::FieldSpec;

const USERS_PATH: &str = "/api/v2/users";
const SERVICE_ACCOUNTS_PATH: &str = "/api/v2/service_accounts";
const INVITATIONS_PATH: &str = "/api/v2/user_invitations";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AccountKind {
    User,
    ServiceAccount,
}

pub struct UserHandler {
    account: AccountKind,
    fields: Vec<FieldSpec>,
    /// Fields carried in `data.attributes`.
    attribute_fields: Vec<FieldSpec>,
}

impl UserHandler {
    pub fn user() -> Self {
        let mut fields = account_fields();
        fields.extend([
            FieldSpec::bool("send_user_invitation")
                .default_value(json!(true))
                .schema_only()
                .describe("Whether an invitation email is sent on creation."),
            FieldSpec::bool("verified").computed(),
        ]);
        Self::with_fields(AccountKind::User, fields)
    }

    pub fn service_account() -> Self {
        Self::with_fields(AccountKind::ServiceAccount, account_fields())
    }

    fn with_fields(account: AccountKind, fields: Vec<FieldSpec>) -> Self {
        let attribute_fields = fields
            .iter()
            .filter(|f| f.cfg_key != "roles")
            .cloned()
            .collect();
        Self {
            account,
            fields,
            attribute_fields,
        }
    }

    fn email(cfg: &dyn ConfigAccessor) -> Option<String> {
        cfg.get_str("email").filter(|s| !s.is_empty())
    }

    fn roles(cfg: &dyn ConfigAccessor) -> Vec<String> {
        match cfg.get("roles") {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        }
    }
}

fn account_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("email").required(),
        FieldSpec::string("name").omit_empty(),
        FieldSpec::bool("disabled").default_value(json!(false)),
        FieldSpec::string_list("roles")
            .use_set()
            .describe("Role ids assigned to the account."),
    ]
}

impl KindHandler for UserHandler {
    fn kind(&self) -> ResourceKind {
        match self.account {
            AccountKind::User => ResourceKind::User,
            AccountKind::ServiceAccount => ResourceKind::ServiceAccount,
        }
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            update_method: UpdateMethod::Patch,
            adopt_on_conflict: true,
            ..Capabilities::default()
        }
    }

    fn collection_path(&self) -> &'static str {
        match self.account {
            AccountKind::User => USERS_PATH,
            AccountKind::ServiceAccount => SERVICE_ACCOUNTS_PATH,
        }
    }

    /// Both account kinds are read, updated and disabled through `/users`.
    fn resource_path(&self, id: &str) -> String {
        format!("{}/{}", USERS_PATH, urlencoding::encode(id))
    }

    fn build(
        &self,
        cfg: &dyn ConfigAccessor,
        id: Option<&str>,
        ctx: &mut BuildContext,
    ) -> Result<Value> {
        let mut attributes = codec::build(cfg, "", &self.attribute_fields, ctx);
        if id.is_none() {
            // Accounts are created enabled.
            attributes.remove("disabled");
            if self.account == AccountKind::ServiceAccount {
                attributes.insert("service_account".to_string(), Value::Bool(true));
            }
        }

        let mut data = Map::new();
        data.insert("type".to_string(), json!("users"));
        if let Some(id) = id {
            data.insert("id".to_string(), json!(id));
        }
        data.insert("attributes".to_string(), Value::Object(attributes));
        let roles: Vec<Value> = Self::roles(cfg)
            .into_iter()
            .map(|role| json!({"type": "roles", "id": role}))
            .collect();
        data.insert(
            "relationships".to_string(),
            json!({"roles": {"data": roles}}),
        );
        Ok(json!({ "data": Value::Object(data) }))
    }

    fn flatten(&self, body: &Value, prior: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let (attributes, _) = unwrap_v2(body).ok_or_else(|| {
            EngineError::Serialization(format!("{} response has no data.attributes", self.kind()))
        })?;
        let mut state = codec::flatten_with_prior(
            &self.attribute_fields,
            attributes,
            Some(Prior {
                cfg: prior,
                prefix: "",
            }),
        );
        let mut roles: Vec<String> = body
            .pointer("/data/relationships/roles/data")
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|r| r.get("id").and_then(id_string))
                    .collect()
            })
            .unwrap_or_default();
        roles.sort();
        roles.dedup();
        state.insert(
            "roles".to_string(),
            Value::Array(roles.into_iter().map(Value::String).collect()),
        );
        Ok(state)
    }

    fn canonicalize(&self, cfg: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let mut state = codec::canonicalize(cfg, "", &self.fields);
        let mut roles = Self::roles(cfg);
        roles.sort();
        roles.dedup();
        state.insert(
            "roles".to_string(),
            Value::Array(roles.into_iter().map(Value::String).collect()),
        );
        Ok(state)
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        unwrap_v2(body).and_then(|(_, id)| id)
    }

    fn after_create(&self, cfg: &dyn ConfigAccessor, id: &str) -> Option<(String, Value)> {
        if self.account != AccountKind::User {
            return None;
        }
        let send = cfg
            .get("send_user_invitation")
            .and_then(|v| v.as_bool())
            .unwrap_or(true);
        send.then(|| {
            (
                INVITATIONS_PATH.to_string(),
                json!({
                    "data": [{
                        "type": "user_invitations",
                        "relationships": {"user": {"data": {"type": "users", "id": id}}}
                    }]
                }),
            )
        })
    }

    fn adopt_lookup_path(&self, cfg: &dyn ConfigAccessor) -> Option<String> {
        Self::email(cfg)
            .map(|email| format!("{}?filter={}", USERS_PATH, urlencoding::encode(&email)))
    }

    fn adopt_match(&self, cfg: &dyn ConfigAccessor, listing: &Value) -> Option<String> {
        let email = Self::email(cfg)?;
        let users = listing.get("data")?.as_array()?;
        users
            .iter()
            .find(|user| {
                user.pointer("/attributes/email").and_then(Value::as_str) == Some(email.as_str())
            })
            .and_then(|user| user.get("id"))
            .and_then(id_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config_tree::ConfigTree;

    fn config() -> ConfigTree {
        ConfigTree::from_value(json!({
            "email": "jane+ops@example.com",
            "name": "Jane",
            "roles": ["role-b", "role-a"]
        }))
        .unwrap()
    }

    fn response(id: &str, disabled: bool) -> Value {
        json!({
            "data": {
                "type": "users",
                "id": id,
                "attributes": {
                    "email": "jane+ops@example.com",
                    "name": "Jane",
                    "disabled": disabled,
                    "verified": false
                },
                "relationships": {"roles": {"data": [
                    {"type": "roles", "id": "role-a"},
                    {"type": "roles", "id": "role-b"}
                ]}}
            }
        })
    }

    #[test]
    fn test_create_body() {
        let handler = UserHandler::user();
        let body = handler.build(&config(), None, &mut BuildContext::new()).unwrap();
        assert_eq!(body["data"]["type"], json!("users"));
        assert_eq!(body["data"]["attributes"]["email"], json!("jane+ops@example.com"));
        assert!(body["data"]["attributes"].get("disabled").is_none());
        assert!(body["data"]["attributes"].get("send_user_invitation").is_none());
        assert_eq!(
            body["data"]["relationships"]["roles"]["data"][0],
            json!({"type": "roles", "id": "role-b"})
        );

        let update = handler.build(&config(), Some("u-1"), &mut BuildContext::new()).unwrap();
        assert_eq!(update["data"]["id"], json!("u-1"));
        assert_eq!(update["data"]["attributes"]["disabled"], json!(false));
    }

    #[test]
    fn test_service_account_paths() {
        let handler = UserHandler::service_account();
        assert_eq!(handler.create_path(), "/api/v2/service_accounts");
        assert_eq!(handler.resource_path("sa-1"), "/api/v2/users/sa-1");
        let body = handler.build(&config(), None, &mut BuildContext::new()).unwrap();
        assert_eq!(body["data"]["attributes"]["service_account"], json!(true));
        assert!(handler.after_create(&config(), "sa-1").is_none());
    }

    #[test]
    fn test_round_trip_ignores_role_order() {
        let handler = UserHandler::user();
        let cfg = config();
        let flat = handler.flatten(&response("u-1", false), &cfg).unwrap();
        let mut canonical = handler.canonicalize(&cfg).unwrap();
        canonical.insert("verified".to_string(), json!(false));
        assert_eq!(flat, canonical);
    }

    #[test]
    fn test_adopt_by_exact_email() {
        let handler = UserHandler::user();
        assert_eq!(
            handler.adopt_lookup_path(&config()).as_deref(),
            Some("/api/v2/users?filter=jane%2Bops%40example.com")
        );
        let listing = json!({"data": [
            {"id": "u-0", "attributes": {"email": "jane+ops@example.com.au"}},
            {"id": "u-1", "attributes": {"email": "jane+ops@example.com"}}
        ]});
        assert_eq!(handler.adopt_match(&config(), &listing).as_deref(), Some("u-1"));
        let no_match = json!({"data": [{"id": "u-0", "attributes": {"email": "other@example.com"}}]});
        assert!(handler.adopt_match(&config(), &no_match).is_none());
    }

    #[test]
    fn test_invitation_after_create() {
        let handler = UserHandler::user();
        let (path, body) = handler.after_create(&config(), "u-1").unwrap();
        assert_eq!(path, "/api/v2/user_invitations");
        assert_eq!(body["data"][0]["relationships"]["user"]["data"]["id"], json!("u-1"));

        let quiet = ConfigTree::from_value(json!({"email": "a@b.c", "send_user_invitation": false})).unwrap();
        assert!(handler.after_create(&quiet, "u-1").is_none());
    }
}
