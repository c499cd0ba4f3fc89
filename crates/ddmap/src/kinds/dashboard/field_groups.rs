//! Field groups shared by several widget definitions.

use serde_json::json;

use crate::mapping::FieldSpec;

pub const AGGREGATORS: &[&str] = &["avg", "last", "max", "min", "sum", "percentile"];
pub const SORT_ORDERS: &[&str] = &["asc", "desc"];
pub const TEXT_ALIGNS: &[&str] = &["center", "left", "right"];
pub const LIVE_SPANS: &[&str] = &[
    "1m", "5m", "10m", "15m", "30m", "1h", "4h", "1d", "2d", "1w", "1mo", "3mo", "6mo", "1y",
    "alert",
];

const EVENT_DATA_SOURCES: &[&str] = &[
    "logs",
    "spans",
    "network",
    "rum",
    "security_signals",
    "profiles",
    "audit",
    "events",
    "ci_tests",
    "ci_pipelines",
    "incident_analytics",
    "database_queries",
];

const EVENT_AGGREGATIONS: &[&str] = &[
    "count",
    "cardinality",
    "median",
    "pc75",
    "pc90",
    "pc95",
    "pc98",
    "pc99",
    "sum",
    "min",
    "max",
    "avg",
];

// ============================================================================
// Widget-level groups
// ============================================================================

pub fn custom_link_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("label").omit_empty(),
        FieldSpec::string("link"),
        FieldSpec::bool("is_hidden").omit_empty(),
        FieldSpec::string("override_label").omit_empty(),
    ]
}

/// Fields merged into every widget definition.
pub fn common_widget_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("title").omit_empty(),
        FieldSpec::string("title_size").omit_empty(),
        FieldSpec::string("title_align")
            .omit_empty()
            .valid_values(TEXT_ALIGNS),
        FieldSpec::string("live_span")
            .json_path("time.live_span")
            .omit_empty()
            .valid_values(LIVE_SPANS)
            .describe("The timeframe to use when displaying the widget."),
        FieldSpec::block(
            "time",
            vec![FieldSpec::string("live_span")
                .omit_empty()
                .valid_values(LIVE_SPANS)],
        )
        .omit_empty()
        .deprecated("Define 'live_span' directly in the widget definition instead.")
        .alias_of("live_span"),
        FieldSpec::block_list("custom_link", custom_link_fields())
            .json_key("custom_links")
            .omit_empty(),
    ]
}

pub fn axis_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("label").omit_empty(),
        FieldSpec::string("min").omit_empty(),
        FieldSpec::string("max").omit_empty(),
        FieldSpec::string("scale").omit_empty(),
        FieldSpec::bool("include_zero"),
    ]
}

pub fn marker_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("value").required(),
        FieldSpec::string("display_type").omit_empty(),
        FieldSpec::string("label").omit_empty(),
    ]
}

pub fn event_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("q").required(),
        FieldSpec::string("tags_execution").omit_empty(),
    ]
}

pub fn request_style_fields() -> Vec<FieldSpec> {
    vec![FieldSpec::string("palette").omit_empty()]
}

pub fn conditional_format_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("comparator")
            .required()
            .valid_values(&["<", "<=", ">", ">="]),
        FieldSpec::float("value").required(),
        FieldSpec::string("palette").required().valid_values(&[
            "blue",
            "custom_bg",
            "custom_image",
            "custom_text",
            "gray_on_white",
            "grey",
            "green",
            "orange",
            "red",
            "red_on_white",
            "white_on_gray",
            "white_on_green",
            "green_on_white",
            "white_on_red",
            "white_on_yellow",
            "yellow_on_white",
            "black_on_light_yellow",
            "black_on_light_green",
            "black_on_light_red",
        ]),
        FieldSpec::string("custom_bg_color").omit_empty(),
        FieldSpec::string("custom_fg_color").omit_empty(),
        FieldSpec::string("image_url").omit_empty(),
        FieldSpec::bool("hide_value"),
        FieldSpec::string("timeframe").omit_empty(),
        FieldSpec::string("metric").omit_empty(),
    ]
}

// ============================================================================
// Legacy query definitions
// ============================================================================

fn log_compute_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("aggregation").required(),
        FieldSpec::string("facet").omit_empty(),
        FieldSpec::int("interval").omit_empty(),
    ]
}

/// Log-style query shared by log, APM, RUM, network, security, audit and
/// profile-metrics queries.
pub fn log_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("index").required(),
        FieldSpec::string("search_query").json_path("search.query"),
        FieldSpec::block("compute_query", log_compute_fields())
            .json_key("compute")
            .omit_empty(),
        FieldSpec::block_list("multi_compute", log_compute_fields()).omit_empty(),
        FieldSpec::block_list(
            "group_by",
            vec![
                FieldSpec::string("facet"),
                FieldSpec::int("limit").omit_empty(),
                FieldSpec::block(
                    "sort_query",
                    vec![
                        FieldSpec::string("aggregation").required(),
                        FieldSpec::string("order").required().valid_values(SORT_ORDERS),
                        FieldSpec::string("facet").omit_empty(),
                    ],
                )
                .json_key("sort")
                .omit_empty(),
            ],
        )
        .omit_empty(),
    ]
}

pub fn process_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("metric").required(),
        FieldSpec::string("search_by").omit_empty(),
        FieldSpec::string_list("filter_by").omit_empty(),
        FieldSpec::int("limit").omit_empty(),
    ]
}

// ============================================================================
// Formula and function queries
// ============================================================================

fn cross_org_uuids() -> FieldSpec {
    FieldSpec::string_list("cross_org_uuids").omit_empty().max_items(1)
}

fn metric_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("data_source").default_value(json!("metrics")),
        FieldSpec::string("query").required(),
        FieldSpec::string("aggregator")
            .omit_empty()
            .valid_values(AGGREGATORS),
        FieldSpec::string("name").required(),
        cross_org_uuids(),
        FieldSpec::string("semantic_mode").omit_empty(),
    ]
}

fn event_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("data_source")
            .required()
            .valid_values(EVENT_DATA_SOURCES),
        FieldSpec::string("storage").omit_empty(),
        FieldSpec::block("search", vec![FieldSpec::string("query").required()]).omit_empty(),
        FieldSpec::string_list("indexes").omit_empty(),
        cross_org_uuids(),
        FieldSpec::block_list(
            "compute",
            vec![
                FieldSpec::string("aggregation")
                    .required()
                    .valid_values(EVENT_AGGREGATIONS),
                FieldSpec::int("interval").omit_empty(),
                FieldSpec::string("metric").omit_empty(),
            ],
        )
        .required(),
        FieldSpec::block_list(
            "group_by",
            vec![
                FieldSpec::string("facet").required(),
                FieldSpec::int("limit").omit_empty(),
                FieldSpec::block(
                    "sort",
                    vec![
                        FieldSpec::string("aggregation")
                            .required()
                            .valid_values(EVENT_AGGREGATIONS),
                        FieldSpec::string("metric").omit_empty(),
                        FieldSpec::string("order").omit_empty().valid_values(SORT_ORDERS),
                    ],
                )
                .omit_empty(),
            ],
        )
        .omit_empty(),
        FieldSpec::string("name").required(),
    ]
}

fn formula_process_query_fields() -> Vec<FieldSpec> {
    vec![
        cross_org_uuids(),
        FieldSpec::string("data_source")
            .required()
            .valid_values(&["process", "container"]),
        FieldSpec::string("metric").required(),
        FieldSpec::string("text_filter").omit_empty(),
        FieldSpec::string_list("tag_filters").omit_empty(),
        FieldSpec::int("limit").omit_empty(),
        FieldSpec::string("sort")
            .omit_empty()
            .default_value(json!("desc"))
            .valid_values(SORT_ORDERS),
        FieldSpec::string("aggregator")
            .omit_empty()
            .valid_values(AGGREGATORS),
        FieldSpec::bool("is_normalized_cpu").omit_empty(),
        FieldSpec::string("name").required(),
    ]
}

fn apm_dependency_stats_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("data_source")
            .required()
            .valid_values(&["apm_dependency_stats"]),
        FieldSpec::string("env").required(),
        FieldSpec::string("stat").required().valid_values(&[
            "avg_duration",
            "avg_root_duration",
            "avg_spans_per_trace",
            "error_rate",
            "pct_exec_time",
            "pct_of_traces",
            "total_traces_count",
        ]),
        FieldSpec::string("operation_name").required(),
        FieldSpec::string("resource_name").required(),
        FieldSpec::string("service").required(),
        FieldSpec::string("primary_tag_name").omit_empty(),
        FieldSpec::string("primary_tag_value").omit_empty(),
        FieldSpec::bool("is_upstream"),
        FieldSpec::string("name").required(),
    ]
}

fn apm_resource_stats_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("data_source")
            .required()
            .valid_values(&["apm_resource_stats"]),
        FieldSpec::string("env").required(),
        FieldSpec::string("name").required(),
        FieldSpec::string("stat").required().valid_values(&[
            "errors",
            "error_rate",
            "hits",
            "latency_avg",
            "latency_distribution",
            "latency_max",
            "latency_p50",
            "latency_p75",
            "latency_p90",
            "latency_p95",
            "latency_p99",
        ]),
        FieldSpec::string("operation_name").omit_empty(),
        FieldSpec::string("resource_name").omit_empty(),
        FieldSpec::string("service").required(),
        FieldSpec::string("primary_tag_name").omit_empty(),
        FieldSpec::string("primary_tag_value").omit_empty(),
        FieldSpec::string_list("group_by").omit_empty(),
    ]
}

fn slo_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("data_source").required().valid_values(&["slo"]),
        FieldSpec::string("slo_id").required(),
        FieldSpec::string("measure").required().valid_values(&[
            "good_events",
            "bad_events",
            "good_minutes",
            "bad_minutes",
            "slo_status",
            "error_budget_remaining",
            "burn_rate",
            "error_budget_burndown",
        ]),
        FieldSpec::string("name").omit_empty(),
        FieldSpec::string("group_mode")
            .default_value(json!("overall"))
            .valid_values(&["overall", "components"]),
        FieldSpec::string("slo_query_type")
            .default_value(json!("metric"))
            .valid_values(&["metric", "monitor", "time_slice"]),
        FieldSpec::string("additional_query_filters").omit_empty(),
    ]
}

fn cloud_cost_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("data_source")
            .required()
            .valid_values(&["cloud_cost"]),
        FieldSpec::string("query").required(),
        FieldSpec::string("aggregator")
            .omit_empty()
            .valid_values(&["avg", "last", "max", "min", "sum", "percentile"]),
        FieldSpec::string("name").required(),
    ]
}

/// `query` blocks of formula requests. Each element populates one query
/// variant; on the wire the variant is identified by its `data_source`.
pub fn formula_query_field() -> FieldSpec {
    FieldSpec::one_of_list(
        "query",
        vec![
            FieldSpec::block("metric_query", metric_query_fields()).variant_values(&["metrics"]),
            FieldSpec::block("event_query", event_query_fields())
                .variant_values(EVENT_DATA_SOURCES)
                .default_variant(),
            FieldSpec::block("process_query", formula_process_query_fields())
                .variant_values(&["process", "container"]),
            FieldSpec::block("apm_dependency_stats_query", apm_dependency_stats_query_fields())
                .variant_values(&["apm_dependency_stats"]),
            FieldSpec::block("apm_resource_stats_query", apm_resource_stats_query_fields())
                .variant_values(&["apm_resource_stats"]),
            FieldSpec::block("slo_query", slo_query_fields()).variant_values(&["slo"]),
            FieldSpec::block("cloud_cost_query", cloud_cost_query_fields())
                .variant_values(&["cloud_cost"]),
        ],
    )
    .json_key("queries")
    .discriminator_key("data_source")
    .omit_empty()
}

fn number_format_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::one_of(
            "unit",
            vec![
                FieldSpec::block(
                    "canonical",
                    vec![
                        FieldSpec::string("per_unit_name").omit_empty(),
                        FieldSpec::string("unit_name").required(),
                    ],
                )
                .variant_value("canonical_unit"),
                FieldSpec::block("custom", vec![FieldSpec::string("label").required()])
                    .variant_value("custom_unit_label"),
            ],
        )
        .discriminator_key("type")
        .required(),
        FieldSpec::block("unit_scale", vec![FieldSpec::string("unit_name").required()])
            .omit_empty(),
    ]
}

pub fn formula_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("formula_expression")
            .json_key("formula")
            .required(),
        FieldSpec::string("alias").omit_empty(),
        FieldSpec::block(
            "limit",
            vec![
                FieldSpec::int("count").omit_empty(),
                FieldSpec::string("order").omit_empty().valid_values(SORT_ORDERS),
            ],
        )
        .omit_empty(),
        FieldSpec::string("cell_display_mode")
            .omit_empty()
            .valid_values(&["number", "bar", "trend"]),
        FieldSpec::block(
            "cell_display_mode_options",
            vec![
                FieldSpec::string("trend_type")
                    .omit_empty()
                    .valid_values(&["area", "line", "bars"]),
                FieldSpec::string("y_scale")
                    .omit_empty()
                    .valid_values(&["shared", "independent"]),
            ],
        )
        .omit_empty(),
        FieldSpec::block_list("conditional_formats", conditional_format_fields()).omit_empty(),
        FieldSpec::block(
            "style",
            vec![
                FieldSpec::string("palette").omit_empty(),
                FieldSpec::int("palette_index").omit_empty(),
            ],
        )
        .omit_empty(),
        FieldSpec::block("number_format", number_format_fields()).omit_empty(),
    ]
}

pub fn formula_field() -> FieldSpec {
    FieldSpec::block_list("formula", formula_fields())
        .json_key("formulas")
        .omit_empty()
}

/// Legacy query sources plus formula queries, present on most request types.
pub fn standard_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::block("log_query", log_query_fields()).omit_empty(),
        FieldSpec::block("apm_query", log_query_fields()).omit_empty(),
        FieldSpec::block("rum_query", log_query_fields()).omit_empty(),
        FieldSpec::block("security_query", log_query_fields()).omit_empty(),
        FieldSpec::block("process_query", process_query_fields()).omit_empty(),
        formula_query_field(),
        formula_field(),
    ]
}

/// `fields` followed by the standard query fields.
pub fn with_standard_queries(mut fields: Vec<FieldSpec>) -> Vec<FieldSpec> {
    fields.extend(standard_query_fields());
    fields
}

// ============================================================================
// Dashboard top level
// ============================================================================

pub fn template_variable_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("name"),
        FieldSpec::string("prefix").omit_empty(),
        FieldSpec::string("default").omit_empty(),
        FieldSpec::string_list("defaults").omit_empty(),
        FieldSpec::string_list("available_values").omit_empty(),
    ]
}

pub fn template_variable_preset_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("name").omit_empty(),
        FieldSpec::block_list(
            "template_variable",
            vec![
                FieldSpec::string("name").omit_empty(),
                FieldSpec::string("value").omit_empty(),
                FieldSpec::string_list("values").omit_empty(),
            ],
        )
        .json_key("template_variables"),
    ]
}

pub fn dashboard_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("title").required(),
        FieldSpec::string("description"),
        FieldSpec::string("layout_type")
            .required()
            .valid_values(&["ordered", "free"])
            .force_new(),
        FieldSpec::string("reflow_type")
            .omit_empty()
            .valid_values(&["auto", "fixed"]),
        FieldSpec::string_list("notify_list"),
        FieldSpec::string_list("tags"),
        FieldSpec::block_list("template_variable", template_variable_fields())
            .json_key("template_variables"),
        FieldSpec::block_list("template_variable_preset", template_variable_preset_fields())
            .json_key("template_variable_presets"),
        FieldSpec::string_list("restricted_roles")
            .omit_empty()
            .conflicts_with(&["is_read_only"]),
        FieldSpec::bool("is_read_only")
            .omit_empty()
            .deprecated("Prefer 'restricted_roles' to restrict edit access.")
            .conflicts_with(&["restricted_roles"]),
        FieldSpec::string("url").computed(),
    ]
}

/// Fields stored next to the variant block of every widget item.
pub fn widget_item_fields() -> Vec<FieldSpec> {
    let layout = || {
        vec![
            FieldSpec::int("x").required(),
            FieldSpec::int("y").required(),
            FieldSpec::int("width").required(),
            FieldSpec::int("height").required(),
            FieldSpec::bool("is_column_break").omit_empty(),
        ]
    };
    vec![
        FieldSpec::int("id").computed(),
        FieldSpec::block("widget_layout", layout())
            .json_key("layout")
            .omit_empty(),
        FieldSpec::block("layout", layout())
            .omit_empty()
            .deprecated("Use 'widget_layout' instead.")
            .alias_of("widget_layout"),
    ]
}
