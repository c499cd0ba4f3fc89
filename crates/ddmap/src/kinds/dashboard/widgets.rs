//! Widget catalogue.
//!
//! Each widget type is one `WidgetSpec`: its configuration block key, its JSON
//! `type` tag and its definition fields. The common widget fields (title,
//! live span, custom links) are merged into every definition here.

use std::sync::LazyLock;

use serde_json::json;

use super::field_groups::*;
use crate::mapping::{FieldSpec, UnionRegistry, WidgetSpec};

/// Every widget type, group included.
pub static WIDGETS: LazyLock<UnionRegistry> =
    LazyLock::new(|| UnionRegistry::new("type", all_widget_specs()));

/// Widget types allowed inside a group.
pub static GROUP_MEMBER_WIDGETS: LazyLock<UnionRegistry> =
    LazyLock::new(|| WIDGETS.without(&["group"]));

/// Widget types whose requests accept `formula`/`query` blocks.
const FORMULA_CAPABLE: &[&str] = &[
    "timeseries",
    "heatmap",
    "change",
    "query_value",
    "toplist",
    "sunburst",
    "geomap",
    "treemap",
    "query_table",
];

pub fn is_formula_capable(tag: &str) -> bool {
    FORMULA_CAPABLE.contains(&tag)
}

/// `response_format` sent with formula requests.
pub fn formula_response_format(tag: &str) -> &'static str {
    match tag {
        "timeseries" | "heatmap" => "timeseries",
        _ => "scalar",
    }
}

fn widget(cfg_block_key: &'static str, tag: &'static str, fields: Vec<FieldSpec>) -> WidgetSpec {
    let mut merged = common_widget_fields();
    merged.extend(fields);
    WidgetSpec::new(cfg_block_key, tag, merged)
}

fn requests(children: Vec<FieldSpec>) -> FieldSpec {
    FieldSpec::block_list("request", children).json_key("requests")
}

pub fn all_widget_specs() -> Vec<WidgetSpec> {
    vec![
        timeseries(),
        // Requests-based
        change(),
        distribution(),
        heatmap(),
        hostmap(),
        query_value(),
        toplist(),
        scatterplot(),
        sunburst(),
        geomap(),
        treemap(),
        topology_map(),
        // Simple
        alert_graph(),
        alert_value(),
        free_text(),
        iframe(),
        image(),
        note(),
        event_stream(),
        event_timeline(),
        check_status(),
        log_stream(),
        manage_status(),
        run_workflow(),
        servicemap(),
        trace_service(),
        // Complex
        query_table(),
        list_stream(),
        slo(),
        slo_list(),
        powerpack(),
        group(),
    ]
}

// ============================================================================
// Timeseries
// ============================================================================

fn timeseries() -> WidgetSpec {
    let request = vec![
        FieldSpec::string("q").omit_empty(),
        FieldSpec::string("display_type")
            .omit_empty()
            .valid_values(&["area", "bars", "line", "overlay"]),
        FieldSpec::bool("on_right_yaxis"),
        FieldSpec::block(
            "style",
            vec![
                FieldSpec::string("palette").omit_empty(),
                FieldSpec::string("line_type")
                    .omit_empty()
                    .valid_values(&["dashed", "dotted", "solid"]),
                FieldSpec::string("line_width")
                    .omit_empty()
                    .valid_values(&["normal", "thick", "thin"]),
                FieldSpec::string("order_by")
                    .omit_empty()
                    .valid_values(&["tags", "values"]),
            ],
        )
        .omit_empty(),
        FieldSpec::block_list(
            "metadata",
            vec![
                FieldSpec::string("expression").required(),
                FieldSpec::string("alias_name").omit_empty(),
            ],
        )
        .omit_empty(),
        FieldSpec::block("log_query", log_query_fields()).omit_empty(),
        FieldSpec::block("apm_query", log_query_fields()).omit_empty(),
        FieldSpec::block("rum_query", log_query_fields()).omit_empty(),
        FieldSpec::block("network_query", log_query_fields()).omit_empty(),
        FieldSpec::block("security_query", log_query_fields()).omit_empty(),
        FieldSpec::block("audit_query", log_query_fields()).omit_empty(),
        FieldSpec::block("profile_metrics_query", log_query_fields()).omit_empty(),
        FieldSpec::block("process_query", process_query_fields()).omit_empty(),
        formula_query_field(),
        formula_field(),
    ];

    widget(
        "timeseries_definition",
        "timeseries",
        vec![
            FieldSpec::bool("show_legend"),
            FieldSpec::string("legend_size")
                .omit_empty()
                .valid_values(&["0", "2", "4", "8", "16", "auto"]),
            FieldSpec::string("legend_layout")
                .omit_empty()
                .valid_values(&["auto", "horizontal", "vertical"]),
            FieldSpec::string_list("legend_columns")
                .omit_empty()
                .use_set()
                .valid_values(&["value", "avg", "sum", "min", "max"]),
            FieldSpec::block("yaxis", axis_fields()).omit_empty(),
            FieldSpec::block("right_yaxis", axis_fields()).omit_empty(),
            FieldSpec::block_list("marker", marker_fields())
                .json_key("markers")
                .omit_empty(),
            FieldSpec::block_list("event", event_fields())
                .json_key("events")
                .omit_empty(),
            requests(request),
        ],
    )
    .describe("The definition for a Timeseries widget.")
}

// ============================================================================
// Requests-based widgets
// ============================================================================

fn change() -> WidgetSpec {
    let request = with_standard_queries(vec![
        FieldSpec::string("q").omit_empty(),
        FieldSpec::string("change_type")
            .omit_empty()
            .valid_values(&["absolute", "relative"]),
        FieldSpec::string("compare_to")
            .omit_empty()
            .valid_values(&["hour_before", "day_before", "week_before", "month_before"]),
        FieldSpec::bool("increase_good"),
        FieldSpec::string("order_by")
            .omit_empty()
            .valid_values(&["change", "name", "present", "past"]),
        FieldSpec::string("order_dir")
            .omit_empty()
            .valid_values(SORT_ORDERS),
        FieldSpec::bool("show_present"),
    ]);
    widget("change_definition", "change", vec![requests(request)])
}

fn apm_stats_query_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::string("service").required(),
        FieldSpec::string("name").required(),
        FieldSpec::string("env").required(),
        FieldSpec::string("primary_tag").required(),
        FieldSpec::string("row_type")
            .required()
            .valid_values(&["service", "resource", "span"]),
        FieldSpec::string("resource").omit_empty(),
        FieldSpec::block_list(
            "columns",
            vec![
                FieldSpec::string("name").required(),
                FieldSpec::string("alias").omit_empty(),
                FieldSpec::string("order").omit_empty().valid_values(SORT_ORDERS),
                FieldSpec::string("cell_display_mode")
                    .omit_empty()
                    .valid_values(&["number", "bar", "trend"]),
            ],
        )
        .omit_empty(),
    ]
}

fn distribution() -> WidgetSpec {
    let x_axis = || {
        vec![
            FieldSpec::string("scale").omit_empty(),
            FieldSpec::string("min").omit_empty(),
            FieldSpec::string("max").omit_empty(),
            FieldSpec::bool("include_zero").omit_empty(),
        ]
    };
    let mut y_axis = x_axis();
    y_axis.push(FieldSpec::string("label").omit_empty());

    let request = with_standard_queries(vec![
        FieldSpec::string("q").omit_empty(),
        FieldSpec::block("style", request_style_fields()).omit_empty(),
        FieldSpec::block("apm_stats_query", apm_stats_query_fields()).omit_empty(),
    ]);
    widget(
        "distribution_definition",
        "distribution",
        vec![
            FieldSpec::bool("show_legend"),
            FieldSpec::string("legend_size").omit_empty(),
            FieldSpec::block("xaxis", x_axis()).omit_empty(),
            FieldSpec::block("yaxis", y_axis).omit_empty(),
            requests(request),
        ],
    )
}

fn heatmap() -> WidgetSpec {
    let request = with_standard_queries(vec![
        FieldSpec::string("q").omit_empty(),
        FieldSpec::block("style", request_style_fields()).omit_empty(),
    ]);
    widget(
        "heatmap_definition",
        "heatmap",
        vec![
            FieldSpec::bool("show_legend"),
            FieldSpec::string("legend_size").omit_empty(),
            FieldSpec::block("yaxis", axis_fields()).omit_empty(),
            FieldSpec::block_list("event", event_fields())
                .json_key("events")
                .omit_empty(),
            requests(request),
        ],
    )
}

fn hostmap() -> WidgetSpec {
    let fill_size = || with_standard_queries(vec![FieldSpec::string("q").omit_empty()]);
    widget(
        "hostmap_definition",
        "hostmap",
        vec![
            FieldSpec::block(
                "request",
                vec![
                    FieldSpec::block("fill", fill_size()).omit_empty(),
                    FieldSpec::block("size", fill_size()).omit_empty(),
                ],
            )
            .json_key("requests")
            .omit_empty(),
            FieldSpec::string("node_type")
                .omit_empty()
                .valid_values(&["host", "container"]),
            FieldSpec::bool("no_metric_hosts").omit_empty(),
            FieldSpec::bool("no_group_hosts").omit_empty(),
            FieldSpec::string_list("group").omit_empty(),
            FieldSpec::string_list("scope").omit_empty(),
            FieldSpec::block(
                "style",
                vec![
                    FieldSpec::string("palette").omit_empty(),
                    FieldSpec::bool("palette_flip").omit_empty(),
                    FieldSpec::string("fill_min").omit_empty(),
                    FieldSpec::string("fill_max").omit_empty(),
                ],
            )
            .omit_empty(),
        ],
    )
}

fn query_value() -> WidgetSpec {
    let request = with_standard_queries(vec![
        FieldSpec::string("q").omit_empty(),
        FieldSpec::block("audit_query", log_query_fields()).omit_empty(),
        FieldSpec::string("aggregator")
            .omit_empty()
            .valid_values(AGGREGATORS),
        FieldSpec::block_list("conditional_formats", conditional_format_fields()).omit_empty(),
    ]);
    widget(
        "query_value_definition",
        "query_value",
        vec![
            FieldSpec::bool("autoscale"),
            FieldSpec::string("custom_unit").omit_empty(),
            FieldSpec::int("precision"),
            FieldSpec::string("text_align")
                .omit_empty()
                .valid_values(TEXT_ALIGNS),
            FieldSpec::block(
                "timeseries_background",
                vec![
                    FieldSpec::string("type")
                        .required()
                        .valid_values(&["area", "bars"]),
                    FieldSpec::block("yaxis", axis_fields()).omit_empty(),
                ],
            )
            .omit_empty(),
            requests(request),
        ],
    )
}

fn toplist() -> WidgetSpec {
    let request = with_standard_queries(vec![
        FieldSpec::string("q").omit_empty(),
        FieldSpec::block("audit_query", log_query_fields()).omit_empty(),
        FieldSpec::block_list("conditional_formats", conditional_format_fields()).omit_empty(),
        FieldSpec::block("style", request_style_fields()).omit_empty(),
    ]);
    widget(
        "toplist_definition",
        "toplist",
        vec![
            FieldSpec::block(
                "style",
                vec![
                    FieldSpec::block(
                        "display",
                        vec![FieldSpec::string("type")
                            .required()
                            .valid_values(&["stacked", "flat"])],
                    )
                    .omit_empty(),
                    FieldSpec::string("palette").omit_empty(),
                    FieldSpec::string("scaling")
                        .omit_empty()
                        .valid_values(&["absolute", "relative"]),
                ],
            )
            .omit_empty(),
            requests(request),
        ],
    )
}

fn scatterplot() -> WidgetSpec {
    let xy = || {
        with_standard_queries(vec![
            FieldSpec::string("q").omit_empty(),
            FieldSpec::string("aggregator")
                .omit_empty()
                .valid_values(AGGREGATORS),
        ])
    };
    let table = vec![
        formula_query_field(),
        FieldSpec::block_list(
            "formula",
            vec![
                FieldSpec::string("formula_expression")
                    .json_key("formula")
                    .required(),
                FieldSpec::string("dimension")
                    .required()
                    .valid_values(&["x", "y", "radius", "color"]),
                FieldSpec::string("alias").omit_empty(),
            ],
        )
        .json_key("formulas")
        .omit_empty(),
    ];
    widget(
        "scatterplot_definition",
        "scatterplot",
        vec![
            FieldSpec::block(
                "request",
                vec![
                    FieldSpec::block("x", xy()).omit_empty(),
                    FieldSpec::block("y", xy()).omit_empty(),
                    FieldSpec::block("scatterplot_table", table)
                        .json_key("table")
                        .omit_empty(),
                ],
            )
            .json_key("requests"),
            FieldSpec::block("xaxis", axis_fields()).omit_empty(),
            FieldSpec::block("yaxis", axis_fields()).omit_empty(),
            FieldSpec::string_list("color_by_groups").omit_empty(),
        ],
    )
}

fn sunburst() -> WidgetSpec {
    let request = with_standard_queries(vec![
        FieldSpec::string("q").omit_empty(),
        FieldSpec::block("network_query", log_query_fields()).omit_empty(),
        FieldSpec::block("audit_query", log_query_fields()).omit_empty(),
        FieldSpec::block("style", request_style_fields()).omit_empty(),
    ]);
    widget(
        "sunburst_definition",
        "sunburst",
        vec![
            FieldSpec::bool("hide_total").omit_empty(),
            FieldSpec::one_of(
                "legend",
                vec![
                    FieldSpec::block(
                        "legend_inline",
                        vec![
                            FieldSpec::string("type")
                                .required()
                                .valid_values(&["inline", "automatic"]),
                            FieldSpec::bool("hide_value"),
                            FieldSpec::bool("hide_percent"),
                        ],
                    )
                    .variant_values(&["inline", "automatic"]),
                    FieldSpec::block(
                        "legend_table",
                        vec![FieldSpec::string("type")
                            .required()
                            .valid_values(&["table", "none"])],
                    )
                    .variant_values(&["table", "none"]),
                ],
            )
            .discriminator_key("type")
            .omit_empty(),
            requests(request),
        ],
    )
}

fn geomap() -> WidgetSpec {
    let request = vec![
        FieldSpec::string("q").omit_empty(),
        FieldSpec::block("log_query", log_query_fields()).omit_empty(),
        FieldSpec::block("rum_query", log_query_fields()).omit_empty(),
        formula_query_field(),
        formula_field(),
    ];
    widget(
        "geomap_definition",
        "geomap",
        vec![
            FieldSpec::block(
                "style",
                vec![
                    FieldSpec::string("palette").required(),
                    FieldSpec::bool("palette_flip").required(),
                ],
            )
            .required(),
            FieldSpec::block("view", vec![FieldSpec::string("focus").required()]).required(),
            requests(request),
        ],
    )
}

fn treemap() -> WidgetSpec {
    widget(
        "treemap_definition",
        "treemap",
        vec![requests(vec![formula_query_field(), formula_field()]).omit_empty()],
    )
}

fn topology_map() -> WidgetSpec {
    widget(
        "topology_map_definition",
        "topology_map",
        vec![requests(vec![
            FieldSpec::string("request_type")
                .required()
                .valid_values(&["topology"]),
            FieldSpec::block(
                "query",
                vec![
                    FieldSpec::string("data_source")
                        .required()
                        .valid_values(&["data_streams", "service_map"]),
                    FieldSpec::string("service").required(),
                    FieldSpec::string_list("filters").required(),
                ],
            ),
        ])],
    )
}

// ============================================================================
// Simple widgets
// ============================================================================

fn alert_graph() -> WidgetSpec {
    widget(
        "alert_graph_definition",
        "alert_graph",
        vec![
            FieldSpec::string("alert_id").required(),
            FieldSpec::string("viz_type")
                .required()
                .valid_values(&["timeseries", "toplist"]),
        ],
    )
}

fn alert_value() -> WidgetSpec {
    widget(
        "alert_value_definition",
        "alert_value",
        vec![
            FieldSpec::string("alert_id").required(),
            FieldSpec::int("precision").omit_empty(),
            FieldSpec::string("unit").omit_empty(),
            FieldSpec::string("text_align")
                .omit_empty()
                .valid_values(TEXT_ALIGNS),
        ],
    )
}

fn free_text() -> WidgetSpec {
    widget(
        "free_text_definition",
        "free_text",
        vec![
            FieldSpec::string("text").required(),
            FieldSpec::string("color").omit_empty(),
            FieldSpec::string("font_size").omit_empty(),
            FieldSpec::string("text_align")
                .omit_empty()
                .valid_values(TEXT_ALIGNS),
        ],
    )
}

fn iframe() -> WidgetSpec {
    widget(
        "iframe_definition",
        "iframe",
        vec![FieldSpec::string("url").required()],
    )
}

fn image() -> WidgetSpec {
    widget(
        "image_definition",
        "image",
        vec![
            FieldSpec::string("url").required(),
            FieldSpec::string("url_dark_theme").omit_empty(),
            FieldSpec::string("sizing").omit_empty().valid_values(&[
                "fill",
                "contain",
                "cover",
                "none",
                "scale-down",
                "zoom",
                "fit",
                "center",
            ]),
            FieldSpec::string("margin")
                .omit_empty()
                .valid_values(&["sm", "md", "lg", "small", "large"]),
            FieldSpec::bool("has_background"),
            FieldSpec::bool("has_border"),
            FieldSpec::string("horizontal_align")
                .omit_empty()
                .valid_values(TEXT_ALIGNS),
            FieldSpec::string("vertical_align")
                .omit_empty()
                .valid_values(&["center", "top", "bottom"]),
        ],
    )
}

fn note() -> WidgetSpec {
    widget(
        "note_definition",
        "note",
        vec![
            FieldSpec::string("content").required(),
            FieldSpec::string("background_color").omit_empty(),
            FieldSpec::string("font_size").omit_empty(),
            FieldSpec::string("text_align")
                .omit_empty()
                .valid_values(TEXT_ALIGNS),
            FieldSpec::string("vertical_align")
                .omit_empty()
                .valid_values(&["center", "top", "bottom"]),
            FieldSpec::bool("has_padding").default_value(json!(true)),
            FieldSpec::bool("show_tick"),
            FieldSpec::string("tick_pos").omit_empty(),
            FieldSpec::string("tick_edge")
                .omit_empty()
                .valid_values(&["bottom", "left", "right", "top"]),
        ],
    )
}

fn event_stream() -> WidgetSpec {
    widget(
        "event_stream_definition",
        "event_stream",
        vec![
            FieldSpec::string("query").required(),
            FieldSpec::string("event_size")
                .omit_empty()
                .valid_values(&["s", "l"]),
            FieldSpec::string("tags_execution").omit_empty(),
        ],
    )
}

fn event_timeline() -> WidgetSpec {
    widget(
        "event_timeline_definition",
        "event_timeline",
        vec![
            FieldSpec::string("query").required(),
            FieldSpec::string("tags_execution").omit_empty(),
        ],
    )
}

fn check_status() -> WidgetSpec {
    widget(
        "check_status_definition",
        "check_status",
        vec![
            FieldSpec::string("check").required(),
            FieldSpec::string("grouping")
                .required()
                .valid_values(&["check", "cluster"]),
            FieldSpec::string("group").omit_empty(),
            FieldSpec::string_list("group_by").omit_empty(),
            FieldSpec::string_list("tags").omit_empty(),
        ],
    )
}

fn log_stream() -> WidgetSpec {
    widget(
        "log_stream_definition",
        "log_stream",
        vec![
            FieldSpec::string_list("indexes"),
            FieldSpec::string("query").omit_empty(),
            FieldSpec::string_list("columns"),
            FieldSpec::bool("show_date_column"),
            FieldSpec::bool("show_message_column"),
            FieldSpec::string("message_display")
                .omit_empty()
                .valid_values(&["inline", "expanded-md", "expanded-lg"]),
            FieldSpec::block(
                "sort",
                vec![
                    FieldSpec::string("column").required(),
                    FieldSpec::string("order").required().valid_values(SORT_ORDERS),
                ],
            )
            .omit_empty(),
        ],
    )
}

fn manage_status() -> WidgetSpec {
    widget(
        "manage_status_definition",
        "manage_status",
        vec![
            FieldSpec::string("query").required(),
            FieldSpec::string("summary_type")
                .omit_empty()
                .valid_values(&["monitors", "groups", "combined"]),
            FieldSpec::string("sort").omit_empty().valid_values(&[
                "name",
                "group",
                "status",
                "tags",
                "triggered",
                "group,asc",
                "group,desc",
                "name,asc",
                "name,desc",
                "status,asc",
                "status,desc",
                "tags,asc",
                "tags,desc",
                "triggered,asc",
                "triggered,desc",
                "priority,asc",
                "priority,desc",
            ]),
            FieldSpec::string("display_format")
                .omit_empty()
                .valid_values(&["counts", "countsAndList", "list"]),
            FieldSpec::string("color_preference")
                .omit_empty()
                .valid_values(&["background", "text"]),
            FieldSpec::bool("hide_zero_counts"),
            FieldSpec::bool("show_last_triggered"),
            FieldSpec::bool("show_priority"),
        ],
    )
}

fn run_workflow() -> WidgetSpec {
    widget(
        "run_workflow_definition",
        "run_workflow",
        vec![
            FieldSpec::string("workflow_id").required(),
            FieldSpec::block_list(
                "input",
                vec![
                    FieldSpec::string("name").required(),
                    FieldSpec::string("value").required(),
                ],
            )
            .json_key("inputs")
            .omit_empty(),
        ],
    )
}

fn servicemap() -> WidgetSpec {
    widget(
        "servicemap_definition",
        "servicemap",
        vec![
            FieldSpec::string("service").required(),
            FieldSpec::string_list("filters").required(),
        ],
    )
}

fn trace_service() -> WidgetSpec {
    widget(
        "trace_service_definition",
        "trace_service",
        vec![
            FieldSpec::string("env").required(),
            FieldSpec::string("service").required(),
            FieldSpec::string("span_name").required(),
            FieldSpec::bool("show_hits"),
            FieldSpec::bool("show_errors"),
            FieldSpec::bool("show_latency"),
            FieldSpec::bool("show_breakdown"),
            FieldSpec::bool("show_distribution"),
            FieldSpec::bool("show_resource_list"),
            FieldSpec::string("size_format")
                .omit_empty()
                .valid_values(&["small", "medium", "large"]),
            FieldSpec::string("display_format")
                .omit_empty()
                .valid_values(&["one_column", "two_column", "three_column"]),
        ],
    )
}

// ============================================================================
// Complex widgets
// ============================================================================

/// Rules of one `text_formats` entry. On the wire `text_formats` is a list of
/// lists, which the dashboard codec maps by hand.
pub fn text_format_rule_fields() -> Vec<FieldSpec> {
    vec![
        FieldSpec::block(
            "match",
            vec![
                FieldSpec::string("type").required().valid_values(&[
                    "is",
                    "is_not",
                    "contains",
                    "does_not_contain",
                    "starts_with",
                    "ends_with",
                ]),
                FieldSpec::string("value").required(),
            ],
        )
        .required(),
        FieldSpec::string("palette").omit_empty().valid_values(&[
            "white_on_red",
            "white_on_yellow",
            "white_on_green",
            "black_on_light_red",
            "black_on_light_yellow",
            "black_on_light_green",
            "red_on_white",
            "yellow_on_white",
            "green_on_white",
            "custom_bg",
            "custom_text",
        ]),
        FieldSpec::block(
            "replace",
            vec![
                FieldSpec::string("type")
                    .required()
                    .valid_values(&["all", "substring"]),
                FieldSpec::string("with").required(),
                FieldSpec::string("substring").omit_empty(),
            ],
        )
        .omit_empty(),
        FieldSpec::string("custom_bg_color").omit_empty(),
        FieldSpec::string("custom_fg_color").omit_empty(),
    ]
}

fn query_table() -> WidgetSpec {
    let request = vec![
        FieldSpec::string("q").omit_empty(),
        FieldSpec::block("apm_query", log_query_fields()).omit_empty(),
        FieldSpec::block("log_query", log_query_fields()).omit_empty(),
        FieldSpec::block("process_query", process_query_fields()).omit_empty(),
        FieldSpec::block("rum_query", log_query_fields()).omit_empty(),
        FieldSpec::block("security_query", log_query_fields()).omit_empty(),
        FieldSpec::block("apm_stats_query", apm_stats_query_fields()).omit_empty(),
        FieldSpec::block_list("conditional_formats", conditional_format_fields()).omit_empty(),
        FieldSpec::string("aggregator")
            .omit_empty()
            .valid_values(AGGREGATORS),
        FieldSpec::string("alias").omit_empty(),
        FieldSpec::int("limit").omit_empty(),
        FieldSpec::string("order").omit_empty().valid_values(SORT_ORDERS),
        FieldSpec::string_list("cell_display_mode").omit_empty(),
        FieldSpec::block_list(
            "text_formats",
            vec![FieldSpec::block_list("text_format", text_format_rule_fields()).omit_empty()],
        )
        .omit_empty()
        .schema_only(),
        formula_query_field(),
        formula_field(),
    ];
    widget(
        "query_table_definition",
        "query_table",
        vec![
            FieldSpec::string("has_search_bar")
                .omit_empty()
                .valid_values(&["always", "never", "auto"]),
            requests(request),
        ],
    )
}

fn list_stream() -> WidgetSpec {
    let query = vec![
        FieldSpec::string("data_source").required().valid_values(&[
            "logs_stream",
            "audit_stream",
            "ci_pipeline_stream",
            "ci_test_stream",
            "rum_issue_stream",
            "apm_issue_stream",
            "trace_stream",
            "logs_issue_stream",
            "logs_pattern_stream",
            "logs_transaction_stream",
            "event_stream",
            "rum_stream",
            "llm_observability_stream",
        ]),
        FieldSpec::string("query_string"),
        FieldSpec::string("event_size")
            .omit_empty()
            .valid_values(&["s", "l"]),
        FieldSpec::string("clustering_pattern_field_path").omit_empty(),
        FieldSpec::string("storage").omit_empty(),
        FieldSpec::string_list("indexes").omit_empty(),
        FieldSpec::block_list("group_by", vec![FieldSpec::string("facet").required()]).omit_empty(),
        FieldSpec::block(
            "sort",
            vec![
                FieldSpec::string("column").required(),
                FieldSpec::string("order").required().valid_values(SORT_ORDERS),
            ],
        )
        .omit_empty(),
    ];
    widget(
        "list_stream_definition",
        "list_stream",
        vec![requests(vec![
            FieldSpec::block_list(
                "columns",
                vec![
                    FieldSpec::string("field"),
                    FieldSpec::string("width").valid_values(&["auto", "compact", "full"]),
                ],
            )
            .required(),
            FieldSpec::string("response_format")
                .required()
                .valid_values(&["event_list"]),
            FieldSpec::block("query", query).required(),
        ])
        .required()],
    )
}

fn slo() -> WidgetSpec {
    widget(
        "service_level_objective_definition",
        "slo",
        vec![
            FieldSpec::string("slo_id").required(),
            FieldSpec::string("view_type").required(),
            FieldSpec::string("view_mode")
                .required()
                .valid_values(&["overall", "component", "both"]),
            FieldSpec::string_list("time_windows")
                .required()
                .valid_values(&[
                    "7d",
                    "30d",
                    "90d",
                    "week_to_date",
                    "previous_week",
                    "month_to_date",
                    "previous_month",
                    "global_time",
                ]),
            FieldSpec::bool("show_error_budget").omit_empty(),
            FieldSpec::string("global_time_target").omit_empty(),
            FieldSpec::string("additional_query_filters").omit_empty(),
        ],
    )
}

fn slo_list() -> WidgetSpec {
    widget(
        "slo_list_definition",
        "slo_list",
        vec![requests(vec![
            FieldSpec::string("request_type")
                .required()
                .valid_values(&["slo_list"]),
            FieldSpec::block(
                "query",
                vec![
                    FieldSpec::string("query_string").required(),
                    FieldSpec::int("limit").omit_empty(),
                    FieldSpec::block_list(
                        "sort",
                        vec![
                            FieldSpec::string("column").required(),
                            FieldSpec::string("order").required().valid_values(SORT_ORDERS),
                        ],
                    )
                    .omit_empty()
                    .max_items(1),
                ],
            )
            .required(),
        ])
        .required()
        .max_items(1)],
    )
}

fn powerpack() -> WidgetSpec {
    let tvar = || {
        vec![
            FieldSpec::string("name").required(),
            FieldSpec::string("prefix").omit_empty(),
            FieldSpec::string_list("values").required(),
        ]
    };
    widget(
        "powerpack_definition",
        "powerpack",
        vec![
            FieldSpec::string("powerpack_id").required(),
            FieldSpec::string("background_color").omit_empty(),
            FieldSpec::string("banner_img").omit_empty(),
            FieldSpec::bool("show_title").omit_empty(),
            FieldSpec::block(
                "template_variables",
                vec![
                    FieldSpec::block_list("controlled_externally", tvar()).omit_empty(),
                    FieldSpec::block_list("controlled_by_powerpack", tvar()).omit_empty(),
                ],
            )
            .omit_empty(),
        ],
    )
}

fn group() -> WidgetSpec {
    widget(
        "group_definition",
        "group",
        vec![
            FieldSpec::string("layout_type")
                .required()
                .valid_values(&["ordered"]),
            FieldSpec::string("background_color").omit_empty(),
            FieldSpec::string("banner_img").omit_empty(),
            FieldSpec::bool("show_title").default_value(json!(true)),
            // Nested widgets are mapped by the dashboard codec.
            FieldSpec::block_list("widget", widget_item_fields()).schema_only(),
        ],
    )
    .describe("The definition for a Group widget.")
}
