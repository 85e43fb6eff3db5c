//! Tests for the condition compiler.

use super::*;
use crate::catalog::{FieldCatalog, FieldInfo, FieldType};
use serde_json::{json, Value};

fn catalog() -> FieldCatalog {
    FieldCatalog::from_fields([
        FieldInfo::new("label", FieldType::Text).with_keyword_field("label.keyword"),
        FieldInfo::new("message", FieldType::Text),
        FieldInfo::new("host", FieldType::Keyword),
        FieldInfo::new("service", FieldType::Keyword).with_keyword_field("service.raw"),
        FieldInfo::new("status", FieldType::Integer),
        FieldInfo::new("time", FieldType::Date),
        FieldInfo::new("items.sku", FieldType::Keyword).with_nested_path("items"),
        FieldInfo::new("items.qty", FieldType::Integer).with_nested_path("items"),
        FieldInfo::new("events.kind", FieldType::Keyword).with_nested_path("events"),
    ])
}

fn compile_one(condition: Condition) -> Value {
    let input = CompileInput::new(vec![condition]);
    compile(&input, Some(&catalog())).query.to_value()
}

/// Wrap leaves the way a single-bucket outer bool serializes.
fn outer(bucket: &str, leaves: Value) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(bucket.to_string(), leaves);
    body.insert("adjust_pure_negative".to_string(), json!(true));
    json!({ "bool": Value::Object(body) })
}

fn count_key(value: &Value, key: &str) -> usize {
    match value {
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| usize::from(k == key) + count_key(v, key))
            .sum(),
        Value::Array(items) => items.iter().map(|v| count_key(v, key)).sum(),
        _ => 0,
    }
}

fn assert_no_empty_buckets(value: &Value) {
    match value {
        Value::Object(map) => {
            if let Some(Value::Object(body)) = map.get("bool") {
                for bucket in ["must", "filter", "must_not", "should"] {
                    if let Some(items) = body.get(bucket) {
                        assert!(
                            !items.as_array().unwrap().is_empty(),
                            "empty `{}` bucket in {}",
                            bucket,
                            value
                        );
                    }
                }
            }
            map.values().for_each(assert_no_empty_buckets);
        }
        Value::Array(items) => items.iter().for_each(assert_no_empty_buckets),
        _ => {}
    }
}

#[test]
fn test_empty_input_matches_everything() {
    let request = compile(&CompileInput::default(), None);
    assert_eq!(request.to_value(), json!({ "size": 0, "query": { "match_all": {} } }));
    assert!(request.query.is_match_all());
    assert!(request.aggregations.is_none());
}

#[test]
fn test_size_is_passed_through() {
    let request = compile(&CompileInput::default().with_size(25), None);
    assert_eq!(request.size, 25);
}

#[test]
fn test_blank_contains_values_are_dropped() {
    for value in [Some(json!("")), None, Some(json!("   ")), Some(Value::Null)] {
        let mut condition = Condition::new(Clause::Must, "message", Operator::Contains);
        condition.value = value;
        let request = compile(&CompileInput::new(vec![condition]), Some(&catalog()));
        assert!(request.query.is_match_all());
    }
}

#[test]
fn test_empty_field_is_dropped() {
    let condition = Condition::new(Clause::Must, "  ", Operator::Contains).with_value("x");
    let request = compile(&CompileInput::new(vec![condition]), None);
    assert!(request.query.is_match_all());
}

#[test]
fn test_unknown_operator_is_dropped() {
    let condition = Condition::new(Clause::Must, "message", Operator::Unknown).with_value("x");
    let request = compile(&CompileInput::new(vec![condition]), None);
    assert!(request.query.is_match_all());
}

#[test]
fn test_exists_needs_no_value() {
    let query = compile_one(Condition::new(Clause::Must, "host", Operator::Exists));
    assert_eq!(query, outer("filter", json!([{ "exists": { "field": "host" } }])));
}

#[test]
fn test_exists_honors_must_not_clause() {
    let query = compile_one(Condition::new(Clause::MustNot, "host", Operator::Exists));
    assert_eq!(query, outer("must_not", json!([{ "exists": { "field": "host" } }])));
}

#[test]
fn test_not_exists() {
    let query = compile_one(Condition::new(Clause::Filter, "host", Operator::NotExists));
    assert_eq!(query, outer("must_not", json!([{ "exists": { "field": "host" } }])));
}

#[test]
fn test_contains_uses_given_clause() {
    let query = compile_one(Condition::new(Clause::Should, "message", Operator::Contains).with_value("timeout"));
    assert_eq!(
        query,
        outer("should", json!([{ "match": { "message": { "query": "timeout" } } }]))
    );
}

#[test]
fn test_not_contains_goes_to_must_not() {
    let query = compile_one(Condition::new(Clause::Must, "message", Operator::NotContains).with_value("debug"));
    assert_eq!(
        query,
        outer("must_not", json!([{ "match": { "message": { "query": "debug" } } }]))
    );
}

#[test]
fn test_phrase_slop() {
    let query = compile_one(Condition::new(Clause::Must, "message", Operator::Phrase).with_value("connection reset"));
    assert_eq!(
        query,
        outer(
            "must",
            json!([{ "match_phrase": { "message": { "query": "connection reset", "slop": 0 } } }])
        )
    );

    let query = compile_one(
        Condition::new(Clause::Must, "message", Operator::NotPhrase)
            .with_value("connection reset")
            .with_slop(3),
    );
    assert_eq!(
        query,
        outer(
            "must_not",
            json!([{ "match_phrase": { "message": { "query": "connection reset", "slop": 3 } } }])
        )
    );
}

#[test]
fn test_equals_uses_keyword_companion() {
    let query = compile_one(Condition::new(Clause::Must, "label", Operator::Equals).with_value("x"));
    assert_eq!(
        query,
        outer("filter", json!([{ "term": { "label.keyword": { "value": "x" } } }]))
    );
}

#[test]
fn test_exact_on_keyword_field() {
    let query = compile_one(Condition::new(Clause::Must, "host", Operator::Exact).with_value("web-1"));
    assert_eq!(query, outer("filter", json!([{ "term": { "host": { "value": "web-1" } } }])));

    let query = compile_one(Condition::new(Clause::Must, "service", Operator::Exact).with_value("api"));
    assert_eq!(query, outer("filter", json!([{ "term": { "service.raw": { "value": "api" } } }])));
}

#[test]
fn test_equals_falls_back_to_phrase() {
    // Text without companion
    let query = compile_one(Condition::new(Clause::Must, "message", Operator::Equals).with_value("a b"));
    assert_eq!(
        query,
        outer("filter", json!([{ "match_phrase": { "message": { "query": "a b", "slop": 0 } } }]))
    );

    // Numeric field
    let query = compile_one(Condition::new(Clause::Must, "status", Operator::Equals).with_value(500));
    assert_eq!(
        query,
        outer("filter", json!([{ "match_phrase": { "status": { "query": 500, "slop": 0 } } }]))
    );

    // No catalog at all
    let condition = Condition::new(Clause::Must, "label", Operator::Equals).with_value("x");
    let request = compile(&CompileInput::new(vec![condition]), None);
    assert_eq!(
        request.query.to_value(),
        outer("filter", json!([{ "match_phrase": { "label": { "query": "x", "slop": 0 } } }]))
    );
}

#[test]
fn test_equals_with_must_not_clause() {
    let query = compile_one(Condition::new(Clause::MustNot, "host", Operator::Equals).with_value("web-1"));
    assert_eq!(query, outer("must_not", json!([{ "term": { "host": { "value": "web-1" } } }])));
}

#[test]
fn test_not_exact() {
    let query = compile_one(Condition::new(Clause::Must, "label", Operator::NotExact).with_value("x"));
    assert_eq!(
        query,
        outer("must_not", json!([{ "term": { "label.keyword": { "value": "x" } } }]))
    );
}

#[test]
fn test_in_list_on_companion_field() {
    let query = compile_one(
        Condition::new(Clause::Must, "label", Operator::In).with_value(json!(["a", " ", null, "b "])),
    );
    assert_eq!(query, outer("filter", json!([{ "terms": { "label.keyword": ["a", "b"] } }])));
}

#[test]
fn test_in_string_is_split() {
    let query = compile_one(Condition::new(Clause::Must, "host", Operator::In).with_value("web-1, web-2,\nweb-3,"));
    assert_eq!(
        query,
        outer("filter", json!([{ "terms": { "host": ["web-1", "web-2", "web-3"] } }]))
    );
}

#[test]
fn test_in_keyword_field_uses_itself() {
    let query = compile_one(Condition::new(Clause::Must, "service", Operator::In).with_value(json!(["api"])));
    assert_eq!(query, outer("filter", json!([{ "terms": { "service": ["api"] } }])));
}

#[test]
fn test_in_scalar_becomes_single_member() {
    let query = compile_one(Condition::new(Clause::Must, "status", Operator::In).with_value(404));
    assert_eq!(query, outer("filter", json!([{ "terms": { "status": [404] } }])));
}

#[test]
fn test_in_empty_set_is_dropped() {
    for value in [json!([]), json!(["", "  "]), json!(" , ,")] {
        let condition = Condition::new(Clause::Must, "host", Operator::In).with_value(value);
        let request = compile(&CompileInput::new(vec![condition]), Some(&catalog()));
        assert!(request.query.is_match_all());
    }
}

#[test]
fn test_one_sided_ranges() {
    let cases = [
        (Operator::Gt, "gt"),
        (Operator::Gte, "gte"),
        (Operator::Lt, "lt"),
        (Operator::Lte, "lte"),
    ];
    for (operator, key) in cases {
        let query = compile_one(Condition::new(Clause::Must, "status", operator).with_value(400));
        let mut bounds = serde_json::Map::new();
        bounds.insert(key.to_string(), json!(400));
        assert_eq!(
            query,
            outer("filter", json!([{ "range": { "status": Value::Object(bounds) } }]))
        );
    }
}

#[test]
fn test_eq_is_closed_range() {
    let query = compile_one(Condition::new(Clause::Must, "status", Operator::Eq).with_value(200));
    assert_eq!(
        query,
        outer("filter", json!([{ "range": { "status": { "gte": 200, "lte": 200 } } }]))
    );
}

#[test]
fn test_neq_is_term_even_on_text_field() {
    // Not type-aware, unlike equals: a text field without companion still
    // gets a term leaf.
    let query = compile_one(Condition::new(Clause::Must, "message", Operator::Neq).with_value("ok"));
    assert_eq!(query, outer("must_not", json!([{ "term": { "message": { "value": "ok" } } }])));

    let query = compile_one(Condition::new(Clause::Must, "label", Operator::Neq).with_value("ok"));
    assert_eq!(
        query,
        outer("must_not", json!([{ "term": { "label.keyword": { "value": "ok" } } }]))
    );
}

#[test]
fn test_between_defaults_upper_bound_to_now() {
    let query = compile_one(Condition::new(Clause::Must, "time", Operator::Between).with_value("now-1h"));
    assert_eq!(
        query,
        outer("filter", json!([{ "range": { "time": { "gte": "now-1h", "lte": "now" } } }]))
    );

    let query = compile_one(
        Condition::new(Clause::Must, "time", Operator::Between)
            .with_value("now-1h")
            .with_value2("  "),
    );
    assert_eq!(
        query,
        outer("filter", json!([{ "range": { "time": { "gte": "now-1h", "lte": "now" } } }]))
    );
}

#[test]
fn test_between_explicit_bounds() {
    let query = compile_one(
        Condition::new(Clause::Must, "status", Operator::Between)
            .with_value(500)
            .with_value2(599),
    );
    assert_eq!(
        query,
        outer("filter", json!([{ "range": { "status": { "gte": 500, "lte": 599 } } }]))
    );
}

#[test]
fn test_query_string_coerces_value() {
    let query = compile_one(Condition::new(Clause::Should, "message", Operator::QueryString).with_value(42));
    assert_eq!(
        query,
        outer(
            "should",
            json!([{ "query_string": { "query": "42", "default_field": "message" } }])
        )
    );
}

#[test]
fn test_nested_conditions_share_one_wrapper() {
    let input = CompileInput::new(vec![
        Condition::new(Clause::Must, "items.sku", Operator::Equals).with_value("A-1"),
        Condition::new(Clause::Must, "items.qty", Operator::Gte).with_value(2),
    ]);
    let query = compile(&input, Some(&catalog())).query.to_value();

    assert_eq!(count_key(&query, "nested"), 1);
    assert_eq!(
        query,
        outer(
            "filter",
            json!([{
                "nested": {
                    "path": "items",
                    "query": {
                        "bool": {
                            "filter": [
                                { "term": { "items.sku": { "value": "A-1" } } },
                                { "range": { "items.qty": { "gte": 2 } } }
                            ]
                        }
                    }
                }
            }])
        )
    );
}

#[test]
fn test_nested_group_uses_highest_priority_bucket() {
    let input = CompileInput::new(vec![
        Condition::new(Clause::Must, "items.sku", Operator::NotExact).with_value("B-2"),
        Condition::new(Clause::Must, "items.qty", Operator::Gt).with_value(0),
    ]);
    let request = compile(&input, Some(&catalog()));

    let Query::Bool(root) = &request.query else {
        panic!("expected bool query");
    };
    assert!(root.must_not.is_empty());
    assert_eq!(root.filter.len(), 1);

    let Query::Nested { path, query } = &root.filter[0] else {
        panic!("expected nested wrapper");
    };
    assert_eq!(path, "items");
    let Query::Bool(inner) = query.as_ref() else {
        panic!("expected inner bool");
    };
    assert_eq!(inner.must_not.len(), 1);
    assert_eq!(inner.filter.len(), 1);
    assert!(!inner.adjust_pure_negative);
}

#[test]
fn test_nested_path_override() {
    let input = CompileInput::new(vec![
        Condition::new(Clause::Must, "line.text", Operator::Contains)
            .with_value("oops")
            .with_nested_path("lines"),
        Condition::new(Clause::Must, "items.sku", Operator::Contains)
            .with_value("A")
            .with_nested_path("  "),
    ]);
    let query = compile(&input, Some(&catalog())).query.to_value();

    let must = &query["bool"]["must"];
    assert_eq!(must[0]["nested"]["path"], "lines");
    // Blank override falls back to the catalog path
    assert_eq!(must[1]["nested"]["path"], "items");
}

#[test]
fn test_nested_groups_follow_direct_leaves_in_first_seen_order() {
    let input = CompileInput::new(vec![
        Condition::new(Clause::Must, "events.kind", Operator::Contains).with_value("crash"),
        Condition::new(Clause::Must, "message", Operator::Contains).with_value("panic"),
        Condition::new(Clause::Must, "items.sku", Operator::Contains).with_value("A"),
        Condition::new(Clause::Must, "events.kind", Operator::Contains).with_value("oom"),
    ]);
    let query = compile(&input, Some(&catalog())).query.to_value();

    let must = query["bool"]["must"].as_array().unwrap();
    assert_eq!(must.len(), 3);
    assert!(must[0].get("match").is_some());
    assert_eq!(must[1]["nested"]["path"], "events");
    assert_eq!(must[2]["nested"]["path"], "items");

    let inner = must[1]["nested"]["query"]["bool"]["must"].as_array().unwrap();
    assert_eq!(inner[0]["match"]["events.kind"]["query"], "crash");
    assert_eq!(inner[1]["match"]["events.kind"]["query"], "oom");
}

#[test]
fn test_timeframe_is_last_filter() {
    let input = CompileInput::new(vec![
        Condition::new(Clause::Must, "status", Operator::Gte).with_value(500),
        Condition::new(Clause::Must, "items.qty", Operator::Gt).with_value(1),
    ])
    .with_timeframe(Timeframe::new("time", "now-15m"));
    let query = compile(&input, Some(&catalog())).query.to_value();

    let filter = query["bool"]["filter"].as_array().unwrap();
    assert_eq!(filter.len(), 3);
    assert_eq!(
        filter[2],
        json!({ "range": { "time": { "gte": "now-15m", "lte": "now" } } })
    );
}

#[test]
fn test_timeframe_alone_and_explicit_upper_bound() {
    let input = CompileInput::default()
        .with_timeframe(Timeframe::new("@timestamp", "2024-01-01").until("2024-01-31"));
    let query = compile(&input, None).query.to_value();
    assert_eq!(
        query,
        outer(
            "filter",
            json!([{ "range": { "@timestamp": { "gte": "2024-01-01", "lte": "2024-01-31" } } }])
        )
    );
}

#[test]
fn test_timeframe_without_field_is_ignored() {
    let input = CompileInput::default().with_timeframe(Timeframe::new(" ", "now-1d"));
    assert!(compile(&input, None).query.is_match_all());
}

#[test]
fn test_pure_negative_query_is_flagged() {
    let query = compile_one(Condition::new(Clause::Must, "host", Operator::NotExists));
    assert_eq!(query["bool"]["adjust_pure_negative"], json!(true));
    assert!(query["bool"].get("must").is_none());
    assert!(query["bool"].get("filter").is_none());
}

#[test]
fn test_no_bool_node_has_empty_bucket() {
    let input = CompileInput::new(vec![
        Condition::new(Clause::Should, "message", Operator::Contains).with_value("error"),
        Condition::new(Clause::Must, "items.sku", Operator::NotExact).with_value("X"),
        Condition::new(Clause::Must, "events.kind", Operator::Contains).with_value(""),
        Condition::new(Clause::Filter, "host", Operator::In).with_value(json!([])),
        Condition::new(Clause::Must, "status", Operator::Between).with_value(200),
    ])
    .with_timeframe(Timeframe::new("time", "now-1h"));
    let value = compile(&input, Some(&catalog())).to_value();

    assert_no_empty_buckets(&value);
    assert_eq!(count_key(&value, "nested"), 1);
}

#[test]
fn test_compile_is_deterministic() {
    let input = CompileInput::new(vec![
        Condition::new(Clause::Must, "label", Operator::Equals).with_value("x"),
        Condition::new(Clause::Must, "items.sku", Operator::In).with_value("a,b"),
        Condition::new(Clause::Should, "message", Operator::Phrase).with_value("disk full"),
        Condition::new(Clause::Must, "items.qty", Operator::Lt).with_value(3),
    ])
    .with_timeframe(Timeframe::new("time", "now-1d"))
    .with_size(10);
    let catalog = catalog();

    let first = serde_json::to_string(&compile(&input, Some(&catalog))).unwrap();
    let second = serde_json::to_string(&compile(&input, Some(&catalog))).unwrap();
    assert_eq!(first, second);
    assert!(first.starts_with(r#"{"size":10,"query":{"bool":{"filter":"#));
}

#[test]
fn test_bool_keys_serialize_in_bucket_order() {
    let input = CompileInput::new(vec![
        Condition::new(Clause::Should, "message", Operator::Contains).with_value("a"),
        Condition::new(Clause::Must, "host", Operator::NotExists),
        Condition::new(Clause::Must, "status", Operator::Gt).with_value(1),
        Condition::new(Clause::Must, "message", Operator::Contains).with_value("b"),
    ]);
    let json = serde_json::to_string(&compile(&input, Some(&catalog())).query).unwrap();

    let positions: Vec<usize> = ["\"must\"", "\"filter\"", "\"must_not\"", "\"should\"", "\"adjust_pure_negative\""]
        .iter()
        .map(|key| json.find(key).unwrap())
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]), "{}", json);
}

#[test]
fn test_compile_from_json_input() {
    let input: CompileInput = serde_json::from_value(json!({
        "conditions": [
            { "clause": "must", "field": "label", "operator": "equals", "value": "x" },
            { "clause": "must", "field": "time", "operator": "between", "value": "now-1h" },
            { "clause": "must", "field": "host", "operator": "regex", "value": ".*" }
        ],
        "size": 0
    }))
    .unwrap();

    let value = compile(&input, Some(&catalog())).to_value();
    assert_eq!(
        value,
        json!({
            "size": 0,
            "query": {
                "bool": {
                    "filter": [
                        { "term": { "label.keyword": { "value": "x" } } },
                        { "range": { "time": { "gte": "now-1h", "lte": "now" } } }
                    ],
                    "adjust_pure_negative": true
                }
            }
        })
    );
}

#[test]
fn test_partially_filled_form_still_compiles() {
    let input: CompileInput = serde_json::from_value(json!({
        "conditions": [
            { "clause": null, "field": null, "operator": "contains", "value": "x" },
            { "clause": null, "field": "message", "operator": null, "value": "x" },
            { "clause": null, "field": "message", "operator": "phrase", "value": "disk full", "slop": "2" },
            { "clause": "filter", "field": "host", "operator": "exists" }
        ],
        "timeframe": { "gte": "now-1h" },
        "size": "10"
    }))
    .unwrap();

    let value = compile(&input, Some(&catalog())).to_value();
    assert_eq!(
        value,
        json!({
            "size": 10,
            "query": {
                "bool": {
                    "must": [ { "match_phrase": { "message": { "query": "disk full", "slop": 2 } } } ],
                    "filter": [ { "exists": { "field": "host" } } ],
                    "adjust_pure_negative": true
                }
            }
        })
    );
}

#[test]
fn test_blank_catalog_nested_path_is_not_nested() {
    let catalog = FieldCatalog::from_json_str(
        r#"{ "host": { "type": "keyword", "nestedPath": "" }, "zone": { "type": "keyword", "nestedPath": "  " } }"#,
    )
    .unwrap();
    let input = CompileInput::new(vec![
        Condition::new(Clause::Must, "host", Operator::Exists),
        Condition::new(Clause::Must, "zone", Operator::Exact).with_value("eu"),
    ]);

    let query = compile(&input, Some(&catalog)).query.to_value();
    assert_eq!(count_key(&query, "nested"), 0);
    assert_eq!(
        query,
        outer(
            "filter",
            json!([
                { "exists": { "field": "host" } },
                { "term": { "zone": { "value": "eu" } } }
            ])
        )
    );
}
