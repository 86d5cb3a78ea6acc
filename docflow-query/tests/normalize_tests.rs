use docflow_query::{
    normalize_mango_query, MangoQuery, NormalizedQuery, QueryError, SortDirection, SortField,
};
use docflow_types::CollectionSchema;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

fn schema() -> CollectionSchema {
    CollectionSchema::new("id")
}

fn query(value: Value) -> MangoQuery {
    MangoQuery::from_value(value).unwrap()
}

fn as_map(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("not an object: {other}"),
    }
}

// ── Defaults ─────────────────────────────────────────────────────

#[test]
fn empty_query_gets_defaults() {
    let normalized = normalize_mango_query(&schema(), &MangoQuery::all());
    assert_eq!(
        normalized,
        NormalizedQuery {
            selector: Map::new(),
            sort: vec![SortField::asc("id")],
            skip: 0,
            limit: None,
            index: None,
        }
    );
}

#[test]
fn explicit_primary_key_sort_equals_default() {
    let a = normalize_mango_query(
        &schema(),
        &query(json!({ "selector": { "a": 1 }, "sort": [{ "id": "asc" }] })),
    );
    let b = normalize_mango_query(&schema(), &query(json!({ "selector": { "a": 1 } })));
    assert_eq!(a, b);
    assert_eq!(a.canonical_string(), b.canonical_string());
}

#[test]
fn canonical_string_is_key_sorted() {
    let normalized = normalize_mango_query(&schema(), &MangoQuery::all());
    assert_eq!(
        normalized.canonical_string(),
        r#"{"selector":{},"skip":0,"sort":[{"id":"asc"}]}"#
    );
}

#[test]
fn canonical_string_ignores_selector_key_order() {
    let a = normalize_mango_query(
        &schema(),
        &MangoQuery::from_json(r#"{"selector":{"b":{"$gt":1,"$lt":5},"a":2}}"#).unwrap(),
    );
    let b = normalize_mango_query(
        &schema(),
        &MangoQuery::from_json(r#"{"selector":{"a":2,"b":{"$lt":5,"$gt":1}}}"#).unwrap(),
    );
    assert_eq!(a.canonical_string(), b.canonical_string());
}

#[test]
fn limit_and_skip_are_kept() {
    let normalized = normalize_mango_query(&schema(), &MangoQuery::all().with_skip(5).with_limit(10));
    assert_eq!(normalized.skip, 5);
    assert_eq!(normalized.limit, Some(10));
}

#[test]
fn input_is_not_modified() {
    let raw = query(json!({ "selector": { "a": 1 }, "sort": [{ "age": "desc" }] }));
    let before = raw.clone();
    let _ = normalize_mango_query(&schema(), &raw);
    assert_eq!(raw, before);
}

// ── Sort ─────────────────────────────────────────────────────────

#[test]
fn primary_key_appended_to_sort() {
    let normalized = normalize_mango_query(
        &schema(),
        &MangoQuery::all().with_sort(vec![SortField::desc("age")]),
    );
    assert_eq!(normalized.sort, vec![SortField::desc("age"), SortField::asc("id")]);
}

#[test]
fn terms_after_primary_key_are_dropped() {
    let normalized = normalize_mango_query(
        &schema(),
        &MangoQuery::all().with_sort(vec![
            SortField::asc("age"),
            SortField::desc("id"),
            SortField::asc("name"),
        ]),
    );
    assert_eq!(normalized.sort, vec![SortField::asc("age"), SortField::desc("id")]);
}

#[test]
fn repeated_sort_fields_keep_first() {
    let normalized = normalize_mango_query(
        &schema(),
        &MangoQuery::all().with_sort(vec![SortField::asc("age"), SortField::desc("age")]),
    );
    assert_eq!(normalized.sort, vec![SortField::asc("age"), SortField::asc("id")]);
}

#[test]
fn sort_field_wire_form() {
    let part: SortField = serde_json::from_value(json!({ "age": "desc" })).unwrap();
    assert_eq!(part.field, "age");
    assert_eq!(part.direction, SortDirection::Desc);
    assert_eq!(serde_json::to_value(&part).unwrap(), json!({ "age": "desc" }));
}

// ── Index ────────────────────────────────────────────────────────

#[test]
fn index_hint_gains_primary_key() {
    let normalized = normalize_mango_query(&schema(), &MangoQuery::all().with_index(["age"]));
    assert_eq!(normalized.index, Some(vec!["age".to_string(), "id".to_string()]));

    let normalized = normalize_mango_query(&schema(), &MangoQuery::all().with_index(["id", "age"]));
    assert_eq!(normalized.index, Some(vec!["id".to_string(), "age".to_string()]));
}

// ── Selector ─────────────────────────────────────────────────────

#[test]
fn plain_values_wrapped_in_eq() {
    let normalized = normalize_mango_query(
        &schema(),
        &query(json!({
            "selector": {
                "a": 1,
                "b": { "$gt": 2 },
                "address": { "city": "Berlin" },
                "$or": [{ "c": "x" }, { "d": { "$exists": true } }]
            }
        })),
    );
    assert_eq!(
        normalized.selector,
        as_map(json!({
            "a": { "$eq": 1 },
            "b": { "$gt": 2 },
            "address": { "$eq": { "city": "Berlin" } },
            "$or": [{ "c": { "$eq": "x" } }, { "d": { "$exists": true } }]
        }))
    );
}

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn non_object_query_rejected() {
    assert!(matches!(
        MangoQuery::from_value(json!([1, 2])),
        Err(QueryError::InvalidQuery(_))
    ));
    assert!(matches!(
        MangoQuery::from_json("not json"),
        Err(QueryError::InvalidQuery(_))
    ));
}

#[test]
fn multi_key_sort_part_rejected() {
    let result = MangoQuery::from_value(json!({ "sort": [{ "a": "asc", "b": "desc" }] }));
    assert!(matches!(result, Err(QueryError::InvalidQuery(_))));
}

#[test]
fn normalized_converts_back_to_mango() {
    let normalized = normalize_mango_query(&schema(), &query(json!({ "selector": { "a": 1 } })));
    let back: MangoQuery = normalized.clone().into();
    assert_eq!(normalize_mango_query(&schema(), &back), normalized);
}

// ── Idempotence ──────────────────────────────────────────────────

fn arb_selector_value() -> impl Strategy<Value = Value> {
    prop_oneof![
        any::<i32>().prop_map(|n| json!(n)),
        "[a-z]{0,4}".prop_map(|s| json!(s)),
        any::<bool>().prop_map(|b| json!(b)),
        (0i32..100).prop_map(|n| json!({ "$gt": n })),
        (0i32..100, 100i32..200).prop_map(|(lo, hi)| json!({ "$gte": lo, "$lt": hi })),
        prop::collection::vec(0i32..10, 0..3).prop_map(|v| json!({ "$in": v })),
        "[a-z]{1,3}".prop_map(|s| json!({ "nested": s })),
    ]
}

fn arb_query() -> impl Strategy<Value = MangoQuery> {
    let field = prop::sample::select(vec!["id", "age", "name", "tags"]);
    let selector = prop::option::of(prop::collection::btree_map(
        field.clone(),
        arb_selector_value(),
        0..4,
    ));
    let sort = prop::option::of(prop::collection::vec(
        (field.clone(), any::<bool>()).prop_map(|(f, asc)| {
            if asc {
                SortField::asc(f)
            } else {
                SortField::desc(f)
            }
        }),
        0..4,
    ));
    let index = prop::option::of(prop::collection::vec(field, 0..3));
    (
        selector,
        sort,
        prop::option::of(0u64..50),
        prop::option::of(1u64..50),
        index,
    )
        .prop_map(|(selector, sort, skip, limit, index)| MangoQuery {
            selector: selector.map(|m| {
                m.into_iter()
                    .map(|(k, v)| (k.to_string(), v))
                    .collect::<Map<String, Value>>()
            }),
            sort,
            skip,
            limit,
            index: index.map(|fields| fields.into_iter().map(String::from).collect()),
        })
}

proptest! {
    #[test]
    fn normalization_is_idempotent(raw in arb_query()) {
        let schema = schema();
        let once = normalize_mango_query(&schema, &raw);
        let twice = normalize_mango_query(&schema, &once.clone().into());
        prop_assert_eq!(&once, &twice);
        prop_assert_eq!(once.canonical_string(), twice.canonical_string());
    }

    #[test]
    fn sort_always_ends_with_primary_key(raw in arb_query()) {
        let normalized = normalize_mango_query(&schema(), &raw);
        prop_assert_eq!(normalized.sort.last().map(|p| p.field.as_str()), Some("id"));
        if let Some(index) = &normalized.index {
            prop_assert!(index.iter().any(|f| f == "id"));
        }
    }
}
