//! Builders and fixtures for resource configurations.
//!
//! These keep the scenario tests focused on reconciler behaviour rather than
//! on the shape of each kind's configuration.

#![allow(dead_code)]

use serde_json::{json, Map, Value};

use ddmap::ConfigTree;

/// Builder for dashboard configurations.
pub struct DashboardBuilder {
    title: String,
    layout_type: String,
    widgets: Vec<Value>,
    extra: Map<String, Value>,
}

impl DashboardBuilder {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            layout_type: "ordered".to_string(),
            widgets: Vec::new(),
            extra: Map::new(),
        }
    }

    pub fn layout(mut self, layout_type: &str) -> Self {
        self.layout_type = layout_type.to_string();
        self
    }

    /// Add a widget given its `<type>_definition` key and definition.
    pub fn widget(mut self, definition_key: &str, definition: Value) -> Self {
        let mut widget = Map::new();
        widget.insert(definition_key.to_string(), json!([definition]));
        self.widgets.push(Value::Object(widget));
        self
    }

    pub fn note(self, content: &str) -> Self {
        self.widget("note_definition", json!({ "content": content }))
    }

    /// Timeseries widget with two markers and a log query.
    pub fn timeseries_with_log_query(self) -> Self {
        self.widget(
            "timeseries_definition",
            json!({
                "live_span": "5m",
                "marker": [
                    {"value": "y = 4", "display_type": "error dashed"},
                    {"value": "10 < y < 999", "label": "warning"}
                ],
                "request": [{
                    "log_query": [{
                        "index": "main",
                        "compute_query": [{"aggregation": "count"}],
                        "group_by": [{
                            "facet": "service",
                            "limit": 10,
                            "sort_query": [{"aggregation": "count", "order": "desc"}]
                        }]
                    }],
                    "style": [{"palette": "dog_classic"}]
                }]
            }),
        )
    }

    pub fn set(mut self, key: &str, value: Value) -> Self {
        self.extra.insert(key.to_string(), value);
        self
    }

    pub fn build(self) -> ConfigTree {
        let mut root = self.extra;
        root.insert("title".to_string(), json!(self.title));
        root.insert("layout_type".to_string(), json!(self.layout_type));
        root.insert("widget".to_string(), Value::Array(self.widgets));
        ConfigTree::from_map(root)
    }
}

/// Builder for logs index configurations.
pub struct LogsIndexBuilder {
    root: Map<String, Value>,
}

impl LogsIndexBuilder {
    pub fn new(name: &str) -> Self {
        let mut root = Map::new();
        root.insert("name".to_string(), json!(name));
        root.insert("filter".to_string(), json!([{"query": "*"}]));
        Self { root }
    }

    pub fn daily_limit(mut self, limit: i64) -> Self {
        self.root.insert("daily_limit".to_string(), json!(limit));
        self
    }

    pub fn retention_days(mut self, days: i64) -> Self {
        self.root.insert("retention_days".to_string(), json!(days));
        self
    }

    pub fn exclusion(mut self, name: &str, query: &str, sample_rate: f64) -> Self {
        let entry = json!({
            "name": name,
            "is_enabled": true,
            "filter": [{"query": query, "sample_rate": sample_rate}]
        });
        match self.root.get_mut("exclusion_filter") {
            Some(Value::Array(items)) => items.push(entry),
            _ => {
                self.root
                    .insert("exclusion_filter".to_string(), json!([entry]));
            }
        }
        self
    }

    pub fn build(self) -> ConfigTree {
        ConfigTree::from_map(self.root)
    }
}

pub fn tree(value: Value) -> ConfigTree {
    ConfigTree::from_value(value).unwrap()
}

pub fn webhook(name: &str, url: &str) -> ConfigTree {
    tree(json!({ "name": name, "url": url }))
}

pub fn custom_variable(name: &str, value: &str, is_secret: bool) -> ConfigTree {
    tree(json!({ "name": name, "value": value, "is_secret": is_secret }))
}

pub fn pagerduty_service(name: &str, key: &str) -> ConfigTree {
    tree(json!({ "service_name": name, "service_key": key }))
}

pub fn user(email: &str, roles: &[&str]) -> ConfigTree {
    tree(json!({ "email": email, "name": "Jane", "roles": roles }))
}

/// V2 user document as the users API returns it.
pub fn user_body(id: &str, email: &str, roles: &[&str]) -> Value {
    let roles: Vec<Value> = roles
        .iter()
        .map(|r| json!({"type": "roles", "id": r}))
        .collect();
    json!({
        "data": {
            "type": "users",
            "id": id,
            "attributes": {"email": email, "name": "Jane", "disabled": false, "verified": true},
            "relationships": {"roles": {"data": roles}}
        }
    })
}

pub fn cloud_configuration_rule() -> ConfigTree {
    tree(json!({
        "name": "S3 buckets are private",
        "message": "Bucket is public",
        "enabled": true,
        "policy": "package datadog\n",
        "resource_types": ["aws_s3_bucket"],
        "severity": "high",
        "notifications": ["@slack-sec"],
        "group_by": ["@resource"],
        "tags": ["team:sec", "env:prod"]
    }))
}

pub fn organization_settings() -> ConfigTree {
    tree(json!({
        "name": "Acme",
        "settings": [{
            "private_widget_share": false,
            "saml": [{"enabled": false}],
            "saml_autocreate_users_domains": [{"domains": ["acme.com"], "enabled": true}],
            "saml_idp_initiated_login": [{"enabled": false}],
            "saml_strict_mode": [{"enabled": false}]
        }]
    }))
}

pub const SERVICE_DEFINITION: &str = "\
schema-version: v2.2
dd-service: checkout
team: ''
tags:
  - team:platform
  - env:prod
contacts:
  - name: Oncall
    type: email
    contact: oncall@example.com
";
