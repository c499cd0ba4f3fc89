//! Reconciler scenarios against a scripted HTTP double.
//!
//! Tests cover create/read/update/delete, post-create visibility retries,
//! adoption on conflict, secret preservation and per-kind quirks.

mod common;

use std::time::Duration;

use reqwest::Method;
use serde_json::json;
use serial_test::serial;

use common::*;
use ddmap::kinds::organization_settings::DELETE_ADVISORY;
use ddmap::{ConfigAccessor, EngineError, Plan, ReadStatus, ResourceKind};

const DASHBOARDS: &str = "/api/v1/dashboard";
const WEBHOOKS: &str = "/api/v1/integration/webhooks/configuration/webhooks";
const CUSTOM_VARIABLES: &str = "/api/v1/integration/webhooks/configuration/custom-variables";
const PAGERDUTY: &str = "/api/v1/integration/pagerduty/configuration/services";
const USERS: &str = "/api/v2/users";
const RULES: &str = "/api/v2/security_monitoring/rules";

fn dashboard_body(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "title": "Ops",
        "layout_type": "ordered",
        "url": format!("/dashboard/{}/ops", id),
        "widgets": [{"definition": {"type": "note", "content": "hello"}}]
    })
}

// ============================================================================
// Eventual consistency
// ============================================================================

#[tokio::test]
async fn test_dashboard_visible_after_two_misses() {
    let h = TestHarness::with_backoff(1000, 10_000);
    let cfg = DashboardBuilder::new("Ops").note("hello").build();
    let resource = format!("{}/abc", DASHBOARDS);

    h.respond(Method::POST, DASHBOARDS, 200, json!({"id": "abc"}));
    h.not_found(Method::GET, &resource, 2);
    h.respond(Method::GET, &resource, 200, dashboard_body("abc"));

    let applied = h
        .reconciler
        .create_with_timeout(ResourceKind::Dashboard, &cfg, Duration::from_secs(10))
        .await
        .unwrap();

    assert_eq!(applied.id, "abc");
    assert_eq!(h.requests_to(Method::GET, &resource).len(), 3);
    assert_eq!(
        h.clock.sleeps(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
    // State comes from the third GET, not the create response.
    assert_eq!(applied.state.get_str("url").as_deref(), Some("/dashboard/abc/ops"));
    assert_eq!(
        applied.state.get_str("widget.0.note_definition.0.content").as_deref(),
        Some("hello")
    );

    let posted = &h.requests_to(Method::POST, DASHBOARDS)[0];
    assert_eq!(posted.body.as_ref().unwrap()["id"], json!(""));
}

#[tokio::test]
async fn test_visibility_succeeds_iff_misses_fit_deadline() {
    // With a flat backoff, N misses cost exactly N × ceiling.
    let ceiling = Duration::from_secs(2);
    let deadline = Duration::from_secs(10);

    for misses in 0..=7u32 {
        let h = TestHarness::with_backoff(2000, 2000);
        let cfg = DashboardBuilder::new("Ops").note("hello").build();
        let resource = format!("{}/abc", DASHBOARDS);
        h.respond(Method::POST, DASHBOARDS, 200, json!({"id": "abc"}));
        h.not_found(Method::GET, &resource, misses as usize);
        h.respond(Method::GET, &resource, 200, dashboard_body("abc"));

        let result = h
            .reconciler
            .create_with_timeout(ResourceKind::Dashboard, &cfg, deadline)
            .await;

        let fits = ceiling * misses <= deadline;
        assert_eq!(result.is_ok(), fits, "misses = {}", misses);
        if !fits {
            assert!(
                matches!(
                    result,
                    Err(EngineError::EventualConsistencyTimeout { ref id, .. }) if id == "abc"
                ),
                "misses = {}",
                misses
            );
        }
        assert!(h.slept() <= deadline);
    }
}

#[tokio::test]
async fn test_visibility_stops_on_other_errors() {
    let h = TestHarness::new();
    let cfg = DashboardBuilder::new("Ops").note("hello").build();
    let resource = format!("{}/abc", DASHBOARDS);
    h.respond(Method::POST, DASHBOARDS, 200, json!({"id": "abc"}));
    h.respond(Method::GET, &resource, 403, json!({"errors": ["Forbidden"]}));

    let err = h
        .reconciler
        .create(ResourceKind::Dashboard, &cfg)
        .await
        .unwrap_err();
    assert!(
        matches!(err, EngineError::Semantic { status: 403, ref message, .. } if message == "Forbidden"),
        "{}",
        err
    );
    assert!(h.clock.sleeps().is_empty());
}

// ============================================================================
// Read / update / delete
// ============================================================================

#[tokio::test]
async fn test_read_gone_on_404() {
    let h = TestHarness::new();
    h.not_found(Method::GET, &format!("{}/abc", DASHBOARDS), 1);
    let status = h
        .reconciler
        .read(ResourceKind::Dashboard, "abc", &ddmap::ConfigTree::new())
        .await
        .unwrap();
    assert_eq!(status, ReadStatus::Gone);
}

#[tokio::test]
async fn test_read_rule_of_other_kind_is_drift() {
    let h = TestHarness::new();
    h.respond(
        Method::GET,
        &format!("{}/X", RULES),
        200,
        json!({"id": "X", "name": "Brute force", "type": "log_detection", "isEnabled": true}),
    );
    let err = h
        .reconciler
        .read(ResourceKind::CloudConfigurationRule, "X", &cloud_configuration_rule())
        .await
        .unwrap_err();
    match err {
        EngineError::DriftSignal { id, .. } => assert_eq!(id, "X"),
        other => panic!("expected drift signal, got {}", other),
    }
}

#[tokio::test]
async fn test_update_puts_and_flattens_response() {
    let h = TestHarness::new();
    let cfg = DashboardBuilder::new("Ops").note("hello").build();
    let resource = format!("{}/abc", DASHBOARDS);
    h.echo(Method::PUT, &resource);

    let applied = h
        .reconciler
        .update(ResourceKind::Dashboard, "abc", &cfg)
        .await
        .unwrap();
    assert_eq!(applied.id, "abc");
    let sent = &h.requests_to(Method::PUT, &resource)[0];
    assert_eq!(sent.body.as_ref().unwrap()["id"], json!("abc"));
    assert_eq!(h.reconciler.plan(ResourceKind::Dashboard, &cfg, &applied.state).unwrap(), Plan::NoOp);
}

#[tokio::test]
async fn test_update_of_missing_resource_is_not_found() {
    let h = TestHarness::new();
    h.not_found(Method::PUT, &format!("{}/abc", DASHBOARDS), 1);
    let cfg = DashboardBuilder::new("Ops").note("hello").build();
    let err = h
        .reconciler
        .update(ResourceKind::Dashboard, "abc", &cfg)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_treats_404_as_success() {
    let h = TestHarness::new();
    h.not_found(Method::DELETE, &format!("{}/abc", DASHBOARDS), 1);
    let advisories = h
        .reconciler
        .delete(ResourceKind::Dashboard, "abc")
        .await
        .unwrap();
    assert!(advisories.is_empty());
}

#[tokio::test]
async fn test_transport_error_carries_context() {
    let h = TestHarness::new();
    h.respond(Method::DELETE, &format!("{}/abc", DASHBOARDS), 502, json!({"errors": ["Bad gateway"]}));
    let err = h
        .reconciler
        .delete(ResourceKind::Dashboard, "abc")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert_eq!(err.status(), Some(502));
    assert_eq!(err.to_string(), "Transport error for dashboard 'abc' (HTTP 502): Bad gateway");
}

// ============================================================================
// Webhooks and secrets
// ============================================================================

#[tokio::test]
#[serial]
async fn test_webhook_body_is_omit_empty() {
    let h = TestHarness::new();
    let cfg = tree(json!({"name": "w", "url": "https://example.com/hook", "encode_as": "json"}));
    h.respond(
        Method::POST,
        WEBHOOKS,
        200,
        json!({"name": "w", "url": "https://example.com/hook", "encode_as": "json", "payload": null}),
    );

    let applied = h.reconciler.create(ResourceKind::Webhook, &cfg).await.unwrap();
    assert_eq!(applied.id, "w");
    let sent = h.requests_to(Method::POST, WEBHOOKS)[0].body.clone().unwrap();
    assert_eq!(
        sent,
        json!({"name": "w", "url": "https://example.com/hook", "encode_as": "json"})
    );
}

#[tokio::test]
#[serial]
async fn test_secret_survives_repeated_reads() {
    let h = TestHarness::new();
    let cfg = custom_variable("TOKEN", "s3cr3t", true);
    let resource = format!("{}/TOKEN", CUSTOM_VARIABLES);
    h.respond(
        Method::POST,
        CUSTOM_VARIABLES,
        200,
        json!({"name": "TOKEN", "is_secret": true}),
    );
    h.respond(Method::GET, &resource, 200, json!({"name": "TOKEN", "is_secret": true}));

    let applied = h
        .reconciler
        .create(ResourceKind::WebhookCustomVariable, &cfg)
        .await
        .unwrap();
    assert_eq!(applied.state.get_str("value").as_deref(), Some("s3cr3t"));

    let mut state = applied.state;
    for _ in 0..3 {
        let ReadStatus::Present(read) = h
            .reconciler
            .read(ResourceKind::WebhookCustomVariable, "TOKEN", &state)
            .await
            .unwrap()
        else {
            panic!("variable disappeared");
        };
        assert_eq!(
            h.reconciler
                .plan(ResourceKind::WebhookCustomVariable, &cfg, &read)
                .unwrap(),
            Plan::NoOp
        );
        state = read;
    }
}

#[tokio::test]
#[serial]
async fn test_cleared_secret_reads_as_mask() {
    let h = TestHarness::new();
    let prior = pagerduty_service("checkout", "");
    h.respond(
        Method::GET,
        &format!("{}/checkout", PAGERDUTY),
        200,
        json!({"service_name": "checkout"}),
    );
    let ReadStatus::Present(state) = h
        .reconciler
        .read(ResourceKind::PagerdutyServiceObject, "checkout", &prior)
        .await
        .unwrap()
    else {
        panic!("service object disappeared");
    };
    assert_eq!(state.get_str("service_key").as_deref(), Some("*****"));
    assert!(matches!(
        h.reconciler
            .plan(ResourceKind::PagerdutyServiceObject, &prior, &state)
            .unwrap(),
        Plan::Update { .. }
    ));
}

// ============================================================================
// Adoption
// ============================================================================

#[tokio::test]
async fn test_user_conflict_adopts_by_email() {
    let email = "jane@example.com";
    let cfg = user(email, &["role-a"]);
    let lookup = format!("{}?filter=jane%40example.com", USERS);

    let adopted = TestHarness::new();
    adopted.respond(Method::POST, USERS, 409, json!({"errors": ["User already exists"]}));
    adopted.respond(
        Method::GET,
        &lookup,
        200,
        json!({"data": [
            {"id": "u-0", "attributes": {"email": "jane@example.co"}},
            user_body("u-1", email, &["role-a"])["data"].clone()
        ]}),
    );
    adopted.respond(Method::PATCH, &format!("{}/u-1", USERS), 200, user_body("u-1", email, &["role-a"]));
    let via_conflict = adopted
        .reconciler
        .create(ResourceKind::User, &cfg)
        .await
        .unwrap();

    let clean = TestHarness::new();
    clean.respond(Method::PATCH, &format!("{}/u-1", USERS), 200, user_body("u-1", email, &["role-a"]));
    let via_update = clean
        .reconciler
        .update(ResourceKind::User, "u-1", &cfg)
        .await
        .unwrap();

    assert_eq!(via_conflict.id, "u-1");
    assert_eq!(via_conflict.state, via_update.state);
    assert!(adopted
        .requests_to(Method::POST, "/api/v2/user_invitations")
        .is_empty());
}

#[tokio::test]
async fn test_conflict_without_match_is_surfaced() {
    let h = TestHarness::new();
    let cfg = user("jane@example.com", &[]);
    h.respond(Method::POST, USERS, 409, json!({"errors": ["User already exists"]}));
    h.respond(
        Method::GET,
        &format!("{}?filter=jane%40example.com", USERS),
        200,
        json!({"data": []}),
    );
    let err = h.reconciler.create(ResourceKind::User, &cfg).await.unwrap_err();
    assert!(matches!(err, EngineError::AlreadyExists { status: 409, .. }), "{}", err);
}

#[tokio::test]
async fn test_failed_invitation_is_advisory() {
    let h = TestHarness::new();
    let cfg = user("jane@example.com", &["role-a"]);
    h.respond(Method::POST, USERS, 201, user_body("u-1", "jane@example.com", &["role-a"]));
    h.respond(Method::POST, "/api/v2/user_invitations", 400, json!({"errors": ["Bad invite"]}));

    let applied = h.reconciler.create(ResourceKind::User, &cfg).await.unwrap();
    assert_eq!(applied.id, "u-1");
    assert_eq!(applied.advisories.len(), 1);
    assert!(applied.advisories[0].message.contains("Bad invite"));
}

#[tokio::test]
#[serial]
async fn test_pagerduty_conflict_adopts_and_reads_back() {
    let h = TestHarness::new();
    let cfg = pagerduty_service("checkout", "pd-key");
    let resource = format!("{}/checkout", PAGERDUTY);
    h.respond(Method::POST, PAGERDUTY, 409, json!({"errors": ["Service already exists"]}));
    h.respond(Method::GET, &resource, 200, json!({"service_name": "checkout"}));
    h.respond(Method::PUT, &resource, 204, serde_json::Value::Null);

    let applied = h
        .reconciler
        .create(ResourceKind::PagerdutyServiceObject, &cfg)
        .await
        .unwrap();
    assert_eq!(applied.id, "checkout");
    assert_eq!(applied.state.get_str("service_key").as_deref(), Some("pd-key"));
    let put = &h.requests_to(Method::PUT, &resource)[0];
    assert_eq!(put.body, Some(json!({"service_key": "pd-key"})));
    assert!(h
        .reconciler
        .plan(ResourceKind::PagerdutyServiceObject, &cfg, &applied.state)
        .unwrap()
        .is_noop());
}

// ============================================================================
// Kinds without a create or delete endpoint
// ============================================================================

#[tokio::test]
#[serial]
async fn test_logs_index_requires_adoption() {
    let h = TestHarness::new();
    let cfg = LogsIndexBuilder::new("main").daily_limit(1000).build();

    let err = h.reconciler.create(ResourceKind::LogsIndex, &cfg).await.unwrap_err();
    assert!(matches!(err, EngineError::Configuration(_)), "{}", err);
    assert!(h.requests().is_empty());

    let resource = "/api/v1/logs/config/indexes/main";
    let server = json!({
        "name": "main",
        "daily_limit": 1000,
        "num_retention_days": 15,
        "filter": {"query": "*"},
        "exclusion_filters": []
    });
    h.respond(Method::GET, resource, 200, server.clone());
    h.respond(Method::PUT, resource, 200, server);
    let applied = h
        .reconciler
        .adopt(ResourceKind::LogsIndex, "main", &cfg)
        .await
        .unwrap();
    assert_eq!(applied.id, "main");
    let put = h.requests_to(Method::PUT, resource)[0].body.clone().unwrap();
    assert!(put.get("name").is_none());
    assert_eq!(put["daily_limit"], json!(1000));

    assert!(h.reconciler.delete(ResourceKind::LogsIndex, "main").await.unwrap().is_empty());
    assert!(h.requests_to(Method::DELETE, resource).is_empty());
}

#[tokio::test]
async fn test_adopt_missing_resource_fails() {
    let h = TestHarness::new();
    let cfg = LogsIndexBuilder::new("main").build();
    h.not_found(Method::GET, "/api/v1/logs/config/indexes/main", 1);
    let err = h
        .reconciler
        .adopt(ResourceKind::LogsIndex, "main", &cfg)
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_organization_create_adopts_current_org() {
    let h = TestHarness::new();
    let cfg = organization_settings();
    h.respond(
        Method::GET,
        "/api/v1/org",
        200,
        json!({"orgs": [{"public_id": "abc123", "name": "Acme"}]}),
    );
    let mut org = json!({
        "public_id": "abc123",
        "name": "Acme",
        "settings": {
            "private_widget_share": false,
            "saml": {"enabled": false},
            "saml_autocreate_access_role": "st",
            "saml_autocreate_users_domains": {"domains": ["acme.com"], "enabled": true},
            "saml_idp_initiated_login": {"enabled": false},
            "saml_strict_mode": {"enabled": false}
        }
    });
    org["settings"]["saml_login_url"] = json!("https://app.datadoghq.com/account/login/id/abc123");
    h.respond(Method::PUT, "/api/v1/org/abc123", 200, json!({ "org": org }));

    let applied = h
        .reconciler
        .create(ResourceKind::OrganizationSettings, &cfg)
        .await
        .unwrap();
    assert_eq!(applied.id, "abc123");
    assert!(h.requests_to(Method::POST, "/api/v1/org").is_empty());
    assert!(h
        .reconciler
        .plan(ResourceKind::OrganizationSettings, &cfg, &applied.state)
        .unwrap()
        .is_noop());

    let advisories = h
        .reconciler
        .delete(ResourceKind::OrganizationSettings, "abc123")
        .await
        .unwrap();
    assert_eq!(advisories[0].message, DELETE_ADVISORY);
}

#[tokio::test]
async fn test_service_definition_posts_for_create_and_update() {
    let h = TestHarness::new();
    let cfg = tree(json!({ "service_definition": SERVICE_DEFINITION }));
    let collection = "/api/v2/services/definitions";
    let schema = json!({
        "schema-version": "v2.2",
        "dd-service": "checkout",
        "tags": ["env:prod", "team:platform"],
        "contacts": [{"name": "Oncall", "type": "email", "contact": "oncall@example.com"}]
    });
    h.respond(
        Method::POST,
        collection,
        200,
        json!({"data": [{"attributes": {"schema": schema.clone()}}]}),
    );

    let created = h
        .reconciler
        .create(ResourceKind::ServiceDefinition, &cfg)
        .await
        .unwrap();
    assert_eq!(created.id, "checkout");
    let document = created.state.get_str("service_definition").unwrap();
    let parsed: serde_json::Value = serde_yaml::from_str(&document).unwrap();
    assert_eq!(parsed["tags"], json!(["env:prod", "team:platform"]));
    assert!(parsed.get("team").is_none());

    let updated = h
        .reconciler
        .update(ResourceKind::ServiceDefinition, "checkout", &cfg)
        .await
        .unwrap();
    assert_eq!(updated.state, created.state);
    assert_eq!(h.requests_to(Method::POST, collection).len(), 2);
}
