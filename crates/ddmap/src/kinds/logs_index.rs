//! Logs index kind.
//!
//! Indexes cannot be created or deleted through the API. An existing index is
//! adopted by name and only ever updated.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{json, Map, Value};

use super::{expect_object, Capabilities, CreateMode, DeleteMode, KindHandler, ResourceKind};
use crate::config_tree::ConfigAccessor;
use crate::error::Result;
use crate::mapping::codec::{self, element_paths, BuildContext, Prior};
use crate::mapping::path::join;
use crate::mapping::validation::{Diagnostic, FieldValidator};
use crate::mapping::FieldSpec;

const INDEXES_PATH: &str = "/api/v1/logs/config/indexes";

static RESET_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([0-1][0-9]|2[0-3]):00$").expect("valid reset time regex"));
static RESET_UTC_OFFSET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(-(0[0-9]|1[0-2])|\+(0[0-9]|1[0-4])):00$").expect("valid utc offset regex")
});

const WARNING_THRESHOLD_MIN: f64 = 50.0;
const WARNING_THRESHOLD_MAX: f64 = 99.99;

pub struct LogsIndexHandler {
    fields: Vec<FieldSpec>,
    /// Everything but `disable_daily_limit`, which the server never echoes.
    wire_fields: Vec<FieldSpec>,
}

impl LogsIndexHandler {
    pub fn new() -> Self {
        let fields = logs_index_fields();
        let wire_fields = fields
            .iter()
            .filter(|f| f.cfg_key != "disable_daily_limit")
            .cloned()
            .collect();
        Self {
            fields,
            wire_fields,
        }
    }

    fn daily_limit_disabled(cfg: &dyn ConfigAccessor) -> bool {
        cfg.get("disable_daily_limit")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

impl Default for LogsIndexHandler {
    fn default() -> Self {
        Self::new()
    }
}

fn check_pattern(
    cfg: &dyn ConfigAccessor,
    path: &str,
    pattern: &Regex,
    message: &str,
    diagnostics: &mut Vec<Diagnostic>,
) {
    if let Some(value) = cfg.get_str(path) {
        if !pattern.is_match(&value) {
            diagnostics.push(Diagnostic::new(path, message));
        }
    }
}

impl KindHandler for LogsIndexHandler {
    fn kind(&self) -> ResourceKind {
        ResourceKind::LogsIndex
    }

    fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            create_mode: CreateMode::RequiresAdoption,
            delete_mode: DeleteMode::Skip,
            lock_group: Some("logs_indexes"),
            ..Capabilities::default()
        }
    }

    fn collection_path(&self) -> &'static str {
        INDEXES_PATH
    }

    fn validate(&self, cfg: &dyn ConfigAccessor) -> Vec<Diagnostic> {
        let mut diagnostics = FieldValidator::new().validate(cfg, "", &self.fields);

        for reset in element_paths(cfg, "daily_limit_reset") {
            check_pattern(
                cfg,
                &join(&reset, "reset_time"),
                &RESET_TIME,
                "must be in HH:00 format with the hours (HH) between 00 and 23 (inclusive)",
                &mut diagnostics,
            );
            check_pattern(
                cfg,
                &join(&reset, "reset_utc_offset"),
                &RESET_UTC_OFFSET,
                "must be in +HH:00 or -HH:00 format with the hours (HH) between -12 and +14 (inclusive)",
                &mut diagnostics,
            );
        }

        if let Some(threshold) = cfg
            .get("daily_limit_warning_threshold_percentage")
            .and_then(|v| v.as_f64())
        {
            if !(WARNING_THRESHOLD_MIN..=WARNING_THRESHOLD_MAX).contains(&threshold) {
                diagnostics.push(Diagnostic::new(
                    "daily_limit_warning_threshold_percentage",
                    format!(
                        "expected to be in the range ({} - {}), got {}",
                        WARNING_THRESHOLD_MIN, WARNING_THRESHOLD_MAX, threshold
                    ),
                ));
            }
        }

        if let Some(limit) = cfg.get("daily_limit").and_then(|v| v.as_i64()) {
            if limit < 1 {
                diagnostics.push(Diagnostic::new(
                    "daily_limit",
                    format!("expected to be at least (1), got {}", limit),
                ));
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
        if Self::daily_limit_disabled(cfg) {
            body.insert("disable_daily_limit".to_string(), Value::Bool(true));
            body.remove("daily_limit");
        }
        // A null retention is rejected alongside flex retention.
        if body.contains_key("num_flex_logs_retention_days")
            && !body.contains_key("num_retention_days")
        {
            body.insert("num_retention_days".to_string(), json!(0));
        }
        // The index name is the path parameter on update.
        if id.is_some() {
            body.remove("name");
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
        let has_limit = obj.get("daily_limit").is_some_and(|v| !v.is_null());
        if has_limit {
            state.insert("disable_daily_limit".to_string(), Value::Bool(false));
        } else {
            state.insert("disable_daily_limit".to_string(), Value::Bool(true));
            state.remove("daily_limit");
        }
        if state.get("retention_days") == Some(&json!(0)) {
            state.remove("retention_days");
        }
        Ok(state)
    }

    fn canonicalize(&self, cfg: &dyn ConfigAccessor) -> Result<Map<String, Value>> {
        let mut state = codec::canonicalize(cfg, "", &self.wire_fields);
        let disabled = Self::daily_limit_disabled(cfg) || !state.contains_key("daily_limit");
        if disabled {
            state.remove("daily_limit");
        }
        state.insert("disable_daily_limit".to_string(), Value::Bool(disabled));
        Ok(state)
    }

    fn extract_id(&self, body: &Value) -> Option<String> {
        body.get("name").and_then(super::id_string)
    }

    fn config_id(&self, cfg: &dyn ConfigAccessor) -> Option<String> {
        cfg.get_str("name").filter(|s| !s.is_empty())
    }
}

// ============================================================================
// Field tree
// ============================================================================

pub fn logs_index_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("name")
            .required()
            .force_new()
            .describe("The name of the index. Index names cannot be modified after creation."),
        FieldSpec::bool("disable_daily_limit")
            .omit_empty()
            .describe("If true, the index is not limited on a daily basis."),
        FieldSpec::int("daily_limit").omit_empty(),
        FieldSpec::block(
            "daily_limit_reset",
            vec![
                FieldSpec::string("reset_time").required(),
                FieldSpec::string("reset_utc_offset").required(),
            ],
        )
        .omit_empty(),
        FieldSpec::float("daily_limit_warning_threshold_percentage").omit_empty(),
        FieldSpec::int("retention_days")
            .json_key("num_retention_days")
            .omit_empty(),
        FieldSpec::int("flex_retention_days")
            .json_key("num_flex_logs_retention_days")
            .omit_empty(),
        FieldSpec::block("filter", vec![FieldSpec::string("query").required()]).required(),
        FieldSpec::block_list(
            "exclusion_filter",
            vec![
                FieldSpec::string("name"),
                FieldSpec::bool("is_enabled"),
                FieldSpec::block(
                    "filter",
                    vec![
                        FieldSpec::string("query"),
                        FieldSpec::float("sample_rate"),
                    ],
                )
                .omit_empty(),
            ],
        )
        .json_key("exclusion_filters"),
    ]
}
