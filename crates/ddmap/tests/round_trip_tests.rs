//! Table-driven round-trip tests across every registered kind.
//!
//! Each case builds the request body, lets a fake server answer with it in the
//! kind's response envelope, flattens the answer and expects no drift.

mod common;

use serde_json::{json, Value};

use common::*;
use ddmap::kinds::service_definition::normalize_document;
use ddmap::reconciler::plan::plan;
use ddmap::reconciler::secrets::preserve_secrets;
use ddmap::{BuildContext, ConfigTree, KindRegistry, Plan, ResourceKind};

const MASK: &str = "*****";

/// A single round-trip case.
struct RoundTripCase {
    /// Test case name for identification.
    name: &'static str,
    kind: ResourceKind,
    config: fn() -> ConfigTree,
    /// Id passed to build; `None` builds a create body.
    id: Option<&'static str>,
    /// Turns the request body into the server's answer.
    respond: fn(Value) -> Value,
}

fn echo(body: Value) -> Value {
    body
}

fn org_envelope(body: Value) -> Value {
    let mut org = body;
    org["public_id"] = json!("abc123");
    json!({ "org": org })
}

fn service_definition_envelope(body: Value) -> Value {
    let schema = match body {
        Value::Object(doc) => Value::Object(normalize_document(doc)),
        other => other,
    };
    json!({"data": [{"attributes": {"schema": schema}}]})
}

fn timeseries_dashboard() -> ConfigTree {
    DashboardBuilder::new("Ops")
        .timeseries_with_log_query()
        .note("runbook")
        .build()
}

fn free_layout_dashboard() -> ConfigTree {
    DashboardBuilder::new("Free")
        .layout("free")
        .widget(
            "note_definition",
            json!({"content": "hello", "background_color": "yellow"}),
        )
        .set("description", json!("team board"))
        .build()
}

fn standard_rule() -> ConfigTree {
    tree(json!({
        "name": "Brute force",
        "message": "Too many failures",
        "query": [{"query": "@evt.name:authentication", "aggregation": "count", "group_by_fields": ["@usr.id"]}],
        "case": [{"name": "high", "condition": "a > 10", "status": "high", "notifications": ["@pager"]}],
        "options": [{"evaluation_window": 300, "keep_alive": 3600, "max_signal_duration": 86400}],
        "tags": ["env:prod", "team:sec"]
    }))
}

fn service_definition() -> ConfigTree {
    tree(json!({ "service_definition": SERVICE_DEFINITION }))
}

fn logs_index() -> ConfigTree {
    LogsIndexBuilder::new("main")
        .daily_limit(200_000)
        .retention_days(15)
        .exclusion(
            "drop debug",
            "status:debug",
            1.0,
        )
        .build()
}

fn plain_webhook() -> ConfigTree {
    tree(json!({
        "name": "deploys",
        "url": "https://example.com/hook",
        "payload": "{\"text\": \"$EVENT_TITLE\"}",
        "encode_as": "form"
    }))
}

fn secret_variable() -> ConfigTree {
    custom_variable("TOKEN", "s3cr3t", true)
}

fn opsgenie() -> ConfigTree {
    tree(json!({"name": "ops", "opsgenie_api_key": "og-key", "region": "eu"}))
}

fn pagerduty() -> ConfigTree {
    pagerduty_service("checkout", "pd-key")
}

fn application_key() -> ConfigTree {
    tree(json!({"name": "ci"}))
}

fn jane() -> ConfigTree {
    user("jane@example.com", &["role-b", "role-a", "role-b"])
}

fn robot() -> ConfigTree {
    tree(json!({"email": "robot@example.com", "name": "CI robot", "roles": ["role-a"]}))
}

const ROUND_TRIP_CASES: &[RoundTripCase] = &[
    RoundTripCase {
        name: "dashboard_timeseries",
        kind: ResourceKind::Dashboard,
        config: timeseries_dashboard,
        id: None,
        respond: echo,
    },
    RoundTripCase {
        name: "dashboard_free_layout",
        kind: ResourceKind::Dashboard,
        config: free_layout_dashboard,
        id: Some("abc-def"),
        respond: echo,
    },
    RoundTripCase {
        name: "security_rule_standard",
        kind: ResourceKind::SecurityMonitoringRule,
        config: standard_rule,
        id: None,
        respond: echo,
    },
    RoundTripCase {
        name: "security_rule_cloud_configuration",
        kind: ResourceKind::CloudConfigurationRule,
        config: cloud_configuration_rule,
        id: None,
        respond: echo,
    },
    RoundTripCase {
        name: "service_definition",
        kind: ResourceKind::ServiceDefinition,
        config: service_definition,
        id: None,
        respond: service_definition_envelope,
    },
    RoundTripCase {
        name: "logs_index",
        kind: ResourceKind::LogsIndex,
        config: logs_index,
        id: None,
        respond: echo,
    },
    RoundTripCase {
        name: "webhook",
        kind: ResourceKind::Webhook,
        config: plain_webhook,
        id: None,
        respond: echo,
    },
    RoundTripCase {
        name: "webhook_custom_variable_secret",
        kind: ResourceKind::WebhookCustomVariable,
        config: secret_variable,
        id: None,
        respond: echo,
    },
    RoundTripCase {
        name: "opsgenie_service",
        kind: ResourceKind::OpsgenieService,
        config: opsgenie,
        id: None,
        respond: echo,
    },
    RoundTripCase {
        name: "pagerduty_service_object",
        kind: ResourceKind::PagerdutyServiceObject,
        config: pagerduty,
        id: None,
        respond: echo,
    },
    RoundTripCase {
        name: "application_key",
        kind: ResourceKind::ApplicationKey,
        config: application_key,
        id: None,
        respond: echo,
    },
    RoundTripCase {
        name: "user",
        kind: ResourceKind::User,
        config: jane,
        id: Some("u-1"),
        respond: echo,
    },
    RoundTripCase {
        name: "service_account",
        kind: ResourceKind::ServiceAccount,
        config: robot,
        id: Some("sa-1"),
        respond: echo,
    },
    RoundTripCase {
        name: "organization_settings",
        kind: ResourceKind::OrganizationSettings,
        config: organization_settings,
        id: Some("abc123"),
        respond: org_envelope,
    },
];

#[test]
fn test_round_trip_cases() {
    let registry = KindRegistry::with_defaults();

    for case in ROUND_TRIP_CASES {
        let handler = registry.get(case.kind).unwrap();
        let cfg = (case.config)();

        let diagnostics = handler.validate(&cfg);
        assert!(diagnostics.is_empty(), "{}: {:?}", case.name, diagnostics);

        let body = handler
            .build(&cfg, case.id, &mut BuildContext::new())
            .unwrap_or_else(|e| panic!("{}: build failed: {}", case.name, e));
        let response = (case.respond)(body);

        let mut state = handler
            .flatten(&response, &cfg)
            .unwrap_or_else(|e| panic!("{}: flatten failed: {}", case.name, e));
        preserve_secrets(&mut state, &handler.secret_fields(&cfg), &cfg, MASK);
        let state = ConfigTree::from_map(state);

        assert_eq!(
            plan(handler.as_ref(), &cfg, &state, MASK).unwrap(),
            Plan::NoOp,
            "{}: state {:?}",
            case.name,
            state
        );
    }
}

#[test]
fn test_every_kind_has_a_case() {
    for kind in ResourceKind::all() {
        assert!(
            ROUND_TRIP_CASES.iter().any(|c| c.kind == *kind),
            "no round-trip case for {}",
            kind
        );
    }
}

#[test]
fn test_round_trip_is_stable() {
    // Flattening a state's own build reproduces the state.
    let registry = KindRegistry::with_defaults();
    let handler = registry.get(ResourceKind::Dashboard).unwrap();
    let cfg = timeseries_dashboard();

    let first = handler
        .flatten(
            &handler.build(&cfg, None, &mut BuildContext::new()).unwrap(),
            &cfg,
        )
        .unwrap();
    let state = ConfigTree::from_map(first.clone());
    let second = handler
        .flatten(
            &handler.build(&state, None, &mut BuildContext::new()).unwrap(),
            &state,
        )
        .unwrap();
    assert_eq!(first, second);
}
