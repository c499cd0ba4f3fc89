//! Security monitoring rule kinds.
//!
//! Standard rules (log detection, application security, workload security,
//! signal correlation) and cloud-configuration rules share one endpoint and
//! are told apart by the wire `type`.

use serde_json::{json, Map, Value};

use super::{expect_object, KindHandler, ResourceKind};
use crate::config_tree::ConfigAccessor;
use crate::error::{EngineError, Result};
use crate::mapping::codec::{self, element_paths, value_to_i64, BuildContext, Prior};
use crate::mapping::path::join;
use crate::mapping::validation::{Diagnostic, FieldValidator};
use crate::mapping::FieldSpec;

const RULES_PATH: &str = "/api/v2/security_monitoring/rules";
const CLOUD_CONFIGURATION_TYPE: &str = "cloud_configuration";

const SEVERITIES: &[&str] = &["info", "low", "medium", "high", "critical"];
const STANDARD_RULE_TYPES: &[&str] = &[
    "log_detection",
    "application_security",
    "workload_security",
    "signal_correlation",
];
/// Seconds accepted by `evaluation_window`, `keep_alive` and `max_signal_duration`.
const EVALUATION_WINDOWS: &[i64] = &[
    0, 60, 300, 600, 900, 1800, 3600, 7200, 10800, 21600, 43200, 86400,
];
const LEARNING_DURATIONS: &[i64] = &[0, 1, 7];
const FORGET_AFTER_DAYS: &[i64] = &[1, 2, 7, 14, 21, 28];

/// Which rule family a handler manages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleVariant {
    Standard,
    CloudConfiguration,
}

impl RuleVariant {
    fn label(&self) -> &'static str {
        match self {
            RuleVariant::Standard => "security monitoring",
            RuleVariant::CloudConfiguration => "cloud configuration",
        }
    }

    /// Whether an observed wire `type` belongs to this family.
    fn accepts(&self, observed: &str) -> bool {
        match self {
            RuleVariant::Standard => observed != CLOUD_CONFIGURATION_TYPE,
            RuleVariant::CloudConfiguration => observed == CLOUD_CONFIGURATION_TYPE,
        }
    }
}

pub struct SecurityRuleHandler {
    variant: RuleVariant,
    fields: Vec<FieldSpec>,
    /// Fields mapped by the codec; the rest are handled by hand.
    wire_fields: Vec<FieldSpec>,
}

impl SecurityRuleHandler {
    pub fn standard() -> Self {
        let fields = standard_rule_fields();
        Self {
            variant: RuleVariant::Standard,
            wire_fields: fields.clone(),
            fields,
        }
    }

    pub fn cloud_configuration() -> Self {
        let fields = cloud_configuration_rule_fields();
        let wire_fields = fields
            .iter()
            .filter(|f| !matches!(f.cfg_key, "severity" | "notifications"))
            .cloned()
            .collect();
        Self {
            variant: RuleVariant::CloudConfiguration,
            fields,
            wire_fields,
        }
    }

    pub fn variant(&self) -> RuleVariant {
        self.variant
    }

    fn check_options(&self, cfg: &dyn ConfigAccessor, diagnostics: &mut Vec<Diagnostic>) {
        for options in element_paths(cfg, "options") {
            for key in ["evaluation_window", "keep_alive", "max_signal_duration"] {
                check_closed_set(cfg, &join(&options, key), EVALUATION_WINDOWS, diagnostics);
            }
            for nv in element_paths(cfg, &join(&options, "new_value_options")) {
                check_closed_set(cfg, &join(&nv, "learning_duration"), LEARNING_DURATIONS, diagnostics);
                check_closed_set(cfg, &join(&nv, "forget_after"), FORGET_AFTER_DAYS, diagnostics);
            }
        }
    }
}

fn check_closed_set(
    cfg: &dyn ConfigAccessor,
    path: &str,
    allowed: &[i64],
    diagnostics: &mut Vec<Diagnostic>,
) {
    let Some(value) = cfg.get(path).as_ref().and_then(value_to_i64) else {
        return;
    };
    if !allowed.contains(&value) {
        let listed: Vec<String> = allowed.iter().map(i64::to_string).collect();
        diagnostics.push(Diagnostic::new(
            path,
            format!("unsupported value {}, expected one of: {}", value, listed.join(", ")),
        ));
    }
}

impl KindHandler for SecurityRuleHandler {
    fn kind(&self) -> ResourceKind {
        match self.variant {
            RuleVariant::Standard => ResourceKind::SecurityMonitoringRule,
            RuleVariant::CloudConfiguration => ResourceKind::CloudConfigurationRule,
        }
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn collection_path(&self) -> &'static str {
        RULES_PATH
    }

    fn validate(&self, cfg: &dyn ConfigAccessor) -> Vec<Diagnostic> {
        let mut diagnostics = FieldValidator::new().validate(cfg, "", &self.fields);
        match self.variant {
            RuleVariant::Standard => self.check_options(cfg, &mut diagnostics),
            RuleVariant::CloudConfiguration => {
                if cfg.count("resource_types") == 0 && !diagnostics.iter().any(|d| d.path == "resource_types") {
                    diagnostics.push(Diagnostic::new(
                        "resource_types",
                        "must have at least one element",
                    ));
                }
            }
        }
        diagnostics
    }

    fn build(
        &self,
        cfg: &dyn ConfigAccessor,
        id: Option<&str>,
        ctx: &mut BuildContext,
    ) -> Result<Value> {
        let mut body = codec::build(cfg, "", &self.wire_fields, ctx);
        if self.variant == RuleVariant::CloudConfiguration {
            let resource_types = cfg.count("resource_types");
            let group_by = cfg.count("group_by");
            let notifications = body_list(cfg, "notifications");

            if let Some(rule_options) = body
                .get_mut("options")
                .and_then(|o| o.get_mut("complianceRuleOptions"))
                .and_then(Value::as_object_mut)
            {
                rule_options.insert("complexRule".to_string(), Value::Bool(resource_types > 1));
            }
            if let Some(signal_options) = body
                .get_mut("complianceSignalOptions")
                .and_then(Value::as_object_mut)
            {
                signal_options.insert("userActivationStatus".to_string(), Value::Bool(group_by > 1));
            }
            body.insert(
                "cases".to_string(),
                json!([{
                    "status": cfg.get_str("severity").unwrap_or_default(),
                    "notifications": notifications,
                }]),
            );
            body.insert(
                "type".to_string(),
                Value::String(CLOUD_CONFIGURATION_TYPE.to_string()),
            );
        }
        // Update payloads do not carry the rule type.
        if id.is_some() {
            body.remove("type");
        }
        Ok(Value::Object(body))
    }

    fn flatten(&self, body: &Value, prior: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let obj = expect_object(self.kind(), body)?;
        let mut state = codec::flatten_with_prior(
            &self.wire_fields,
            obj,
            Some(Prior {
                cfg: prior,
                prefix: "",
            }),
        );
        if self.variant == RuleVariant::CloudConfiguration {
            let first_case = obj
                .get("cases")
                .and_then(Value::as_array)
                .and_then(|cases| cases.first());
            let severity = first_case
                .and_then(|c| c.get("status"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            let notifications = first_case
                .and_then(|c| c.get("notifications"))
                .cloned()
                .unwrap_or_else(|| json!([]));
            state.insert("severity".to_string(), Value::String(severity.to_string()));
            state.insert("notifications".to_string(), notifications);
        }
        Ok(state)
    }

    fn check_observed(&self, id: &str, body: &Value) -> Result<()> {
        let observed = body
            .get("type")
            .and_then(Value::as_str)
            .unwrap_or("log_detection");
        if self.variant.accepts(observed) {
            return Ok(());
        }
        Err(EngineError::DriftSignal {
            kind: self.kind().to_string(),
            id: id.to_string(),
            message: format!("Rule with id {} is not a {} rule", id, self.variant.label()),
        })
    }
}

fn body_list(cfg: &dyn ConfigAccessor, path: &str) -> Value {
    match cfg.get(path) {
        Some(Value::Array(items)) => Value::Array(items),
        _ => Value::Array(Vec::new()),
    }
}

// ============================================================================
// Field trees
// ============================================================================

fn case_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("name").omit_empty(),
        FieldSpec::string("condition").omit_empty(),
        FieldSpec::string_list("notifications").omit_empty(),
        FieldSpec::string("status").required().valid_values(SEVERITIES),
        FieldSpec::block_list(
            "action",
            vec![
                FieldSpec::string("type")
                    .required()
                    .valid_values(&["block_ip", "block_user", "user_behavior", "flag_ip"]),
                FieldSpec::block("options", vec![FieldSpec::int("duration").omit_empty()])
                    .omit_empty(),
            ],
        )
        .json_key("actions")
        .omit_empty(),
    ]
}

fn options_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("detection_method")
            .json_key("detectionMethod")
            .omit_empty()
            .valid_values(&[
                "threshold",
                "new_value",
                "anomaly_detection",
                "impossible_travel",
                "hardcoded",
                "third_party",
                "anomaly_threshold",
                "sequence_detection",
            ]),
        FieldSpec::int("evaluation_window")
            .json_key("evaluationWindow")
            .omit_empty(),
        FieldSpec::int("keep_alive").json_key("keepAlive").omit_empty(),
        FieldSpec::int("max_signal_duration")
            .json_key("maxSignalDuration")
            .omit_empty(),
        FieldSpec::bool("decrease_criticality_based_on_env")
            .json_key("decreaseCriticalityBasedOnEnv")
            .omit_empty(),
        FieldSpec::block(
            "new_value_options",
            vec![
                FieldSpec::string("learning_method")
                    .json_key("learningMethod")
                    .omit_empty()
                    .valid_values(&["duration", "threshold"]),
                FieldSpec::int("learning_duration")
                    .json_key("learningDuration")
                    .omit_empty(),
                FieldSpec::int("learning_threshold")
                    .json_key("learningThreshold")
                    .omit_empty(),
                FieldSpec::int("forget_after").json_key("forgetAfter").required(),
            ],
        )
        .json_key("newValueOptions")
        .omit_empty(),
        FieldSpec::block(
            "impossible_travel_options",
            vec![FieldSpec::bool("baseline_user_locations")
                .json_key("baselineUserLocations")
                .omit_empty()],
        )
        .json_key("impossibleTravelOptions")
        .omit_empty(),
    ]
}

fn query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("query").required(),
        FieldSpec::string("name").omit_empty(),
        FieldSpec::string("aggregation").omit_empty().valid_values(&[
            "count",
            "cardinality",
            "sum",
            "max",
            "new_value",
            "geo_data",
            "event_count",
            "none",
        ]),
        FieldSpec::string("data_source")
            .json_key("dataSource")
            .omit_empty()
            .valid_values(&[
                "logs",
                "audit",
                "app_sec_spans",
                "spans",
                "security_runtime",
                "network",
                "events",
            ]),
        FieldSpec::string_list("distinct_fields")
            .json_key("distinctFields")
            .omit_empty(),
        FieldSpec::string_list("group_by_fields")
            .json_key("groupByFields")
            .omit_empty(),
        FieldSpec::bool("has_optional_group_by_fields")
            .json_key("hasOptionalGroupByFields")
            .omit_empty(),
        FieldSpec::string("metric").omit_empty(),
        FieldSpec::string_list("metrics").omit_empty(),
        FieldSpec::string_list("indexes").omit_empty(),
    ]
}

fn signal_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("rule_id").json_key("ruleId").required(),
        FieldSpec::string("aggregation").omit_empty(),
        FieldSpec::string("name").omit_empty(),
        FieldSpec::string_list("correlated_by_fields")
            .json_key("correlatedByFields")
            .omit_empty(),
        FieldSpec::int("correlated_query_index")
            .json_key("correlatedQueryIndex")
            .omit_empty(),
        FieldSpec::string("default_rule_id")
            .json_key("defaultRuleId")
            .omit_empty(),
    ]
}

fn common_rule_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("name").required(),
        FieldSpec::string("message").required(),
        FieldSpec::bool("enabled")
            .json_key("isEnabled")
            .default_value(json!(true)),
        FieldSpec::string_list("tags").describe("Tags for generated signals, in configuration order."),
    ]
}

pub fn standard_rule_fields() -> Vec<FieldSpec> {
    let mut fields = common_rule_fields();
    fields.extend([
        FieldSpec::bool("has_extended_title")
            .json_key("hasExtendedTitle")
            .omit_empty(),
        FieldSpec::string("type")
            .default_value(json!("log_detection"))
            .valid_values(STANDARD_RULE_TYPES),
        FieldSpec::block_list("case", case_fields())
            .json_key("cases")
            .required(),
        FieldSpec::block("options", options_fields()).omit_empty(),
        FieldSpec::block_list("query", query_fields())
            .json_key("queries")
            .omit_empty(),
        FieldSpec::block_list("signal_query", signal_query_fields())
            .json_key("signalQueries")
            .omit_empty(),
        FieldSpec::block_list(
            "filter",
            vec![
                FieldSpec::string("query").required(),
                FieldSpec::string("action")
                    .required()
                    .valid_values(&["require", "suppress"]),
            ],
        )
        .json_key("filters")
        .omit_empty(),
        FieldSpec::string_list("group_signals_by")
            .json_key("groupSignalsBy")
            .omit_empty(),
    ]);
    fields
}

pub fn cloud_configuration_rule_fields() -> Vec<FieldSpec> {
    let mut fields = common_rule_fields();
    fields.extend([
        FieldSpec::string("policy")
            .json_path("options.complianceRuleOptions.regoRule.policy")
            .required()
            .describe("Policy written in rego format."),
        FieldSpec::string_list("resource_types")
            .json_path("options.complianceRuleOptions.regoRule.resourceTypes")
            .required(),
        FieldSpec::string("severity").required().valid_values(SEVERITIES),
        FieldSpec::string_list("notifications"),
        FieldSpec::string_list("group_by")
            .json_path("complianceSignalOptions.userGroupByFields"),
    ]);
    fields
}
