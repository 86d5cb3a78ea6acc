use docflow_query::{
    collate, collate_fields, get_query_matcher, get_sort_comparator, normalize_mango_query,
    MangoQuery, QueryError, QueryMatcher, SortField,
};
use docflow_types::CollectionSchema;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use serde_json::{json, Value};
use std::cmp::Ordering;

fn schema() -> CollectionSchema {
    CollectionSchema::new("id")
}

fn matcher(selector: Value) -> Result<QueryMatcher, QueryError> {
    let query = normalize_mango_query(&schema(), &MangoQuery::all().with_selector(selector));
    get_query_matcher(&schema(), &query)
}

fn matches(selector: Value, doc: &Value) -> bool {
    matcher(selector).unwrap().matches(doc)
}

fn person() -> Value {
    json!({
        "id": "x",
        "age": 30,
        "name": "Alice",
        "nil": null,
        "tags": ["a", "b"],
        "grades": [70, 85],
        "scores": [
            { "subject": "math", "score": 90 },
            { "subject": "art", "score": 60 }
        ],
        "nested": { "deep": { "n": 5 } }
    })
}

// ── Soft deletion ────────────────────────────────────────────────

#[test]
fn deleted_documents_never_match() {
    let docs = vec![
        json!({ "id": "a", "v": 1, "_deleted": false }),
        json!({ "id": "b", "v": 2, "_deleted": true }),
    ];
    let m = matcher(json!({ "v": { "$gte": 1 } })).unwrap();
    let ids: Vec<&str> = m.filter(&docs).map(|d| d["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["a"]);
}

#[test]
fn deleted_document_fails_empty_selector() {
    let m = matcher(json!({})).unwrap();
    assert!(m.matches(&json!({ "id": "a" })));
    assert!(!m.matches(&json!({ "id": "a", "_deleted": true })));
}

// ── Equality and comparison ──────────────────────────────────────

#[test]
fn equality() {
    let doc = person();
    assert!(matches(json!({ "age": 30 }), &doc));
    assert!(matches(json!({ "age": 30.0 }), &doc));
    assert!(!matches(json!({ "age": 31 }), &doc));
    assert!(matches(json!({ "tags": "a" }), &doc));
    assert!(matches(json!({ "tags": ["a", "b"] }), &doc));
    assert!(matches(json!({ "nested": { "deep": { "n": 5 } } }), &doc));
    assert!(matches(json!({ "nested.deep.n": 5 }), &doc));
    assert!(matches(json!({ "scores.0.score": 90 }), &doc));
    assert!(!matches(json!({ "missing": null }), &doc));
}

#[test]
fn not_equal_matches_missing_fields() {
    let doc = person();
    assert!(matches(json!({ "age": { "$ne": 31 } }), &doc));
    assert!(!matches(json!({ "age": { "$ne": 30 } }), &doc));
    assert!(matches(json!({ "missing": { "$ne": 1 } }), &doc));
    assert!(!matches(json!({ "tags": { "$ne": "a" } }), &doc));
}

#[test]
fn comparison_operators() {
    let doc = person();
    assert!(matches(json!({ "age": { "$gt": 29, "$lt": 31 } }), &doc));
    assert!(matches(json!({ "age": { "$gte": 30, "$lte": 30 } }), &doc));
    assert!(!matches(json!({ "age": { "$gt": 30 } }), &doc));
    assert!(matches(json!({ "name": { "$gt": "Al", "$lt": "Bob" } }), &doc));
    // Numbers sort before strings.
    assert!(!matches(json!({ "age": { "$gt": "10" } }), &doc));
    assert!(!matches(json!({ "missing": { "$lt": 100 } }), &doc));
}

#[test]
fn membership_operators() {
    let doc = person();
    assert!(matches(json!({ "age": { "$in": [1, 30] } }), &doc));
    assert!(!matches(json!({ "age": { "$in": [] } }), &doc));
    assert!(matches(json!({ "tags": { "$in": ["z", "b"] } }), &doc));
    assert!(!matches(json!({ "age": { "$nin": [30] } }), &doc));
    assert!(matches(json!({ "missing": { "$nin": [30] } }), &doc));
    assert!(matches(json!({ "tags": { "$all": ["b", "a"] } }), &doc));
    assert!(!matches(json!({ "tags": { "$all": ["a", "c"] } }), &doc));
    assert!(!matches(json!({ "tags": { "$all": [] } }), &doc));
}

// ── Element operators ────────────────────────────────────────────

#[test]
fn exists_and_type() {
    let doc = person();
    assert!(matches(json!({ "nil": { "$exists": true } }), &doc));
    assert!(matches(json!({ "missing": { "$exists": false } }), &doc));
    assert!(!matches(json!({ "age": { "$exists": false } }), &doc));
    assert!(matches(json!({ "name": { "$type": "string" } }), &doc));
    assert!(matches(json!({ "nil": { "$type": "null" } }), &doc));
    assert!(matches(json!({ "age": { "$type": "integer" } }), &doc));
    assert!(!matches(json!({ "age": { "$type": "array" } }), &doc));
}

#[test]
fn modulo_and_size() {
    let doc = person();
    assert!(matches(json!({ "age": { "$mod": [4, 2] } }), &doc));
    assert!(!matches(json!({ "age": { "$mod": [4, 0] } }), &doc));
    assert!(matches(json!({ "tags": { "$size": 2 } }), &doc));
    assert!(!matches(json!({ "name": { "$size": 5 } }), &doc));
}

#[test]
fn regex_with_options() {
    let doc = person();
    assert!(matches(json!({ "name": { "$regex": "^al", "$options": "i" } }), &doc));
    assert!(!matches(json!({ "name": { "$regex": "^al" } }), &doc));
    assert!(matches(json!({ "tags": { "$regex": "^b$" } }), &doc));
    assert!(!matches(json!({ "missing": { "$regex": ".*" } }), &doc));
}

#[test]
fn elem_match() {
    let doc = person();
    assert!(matches(
        json!({ "scores": { "$elemMatch": { "subject": "math", "score": { "$gte": 80 } } } }),
        &doc
    ));
    assert!(!matches(
        json!({ "scores": { "$elemMatch": { "subject": "art", "score": { "$gte": 80 } } } }),
        &doc
    ));
    assert!(matches(
        json!({ "grades": { "$elemMatch": { "$gte": 80, "$lt": 90 } } }),
        &doc
    ));
    assert!(!matches(json!({ "age": { "$elemMatch": { "$gt": 1 } } }), &doc));
}

// ── Logical operators ────────────────────────────────────────────

#[test]
fn logical_combinators() {
    let doc = person();
    assert!(matches(json!({ "$or": [{ "age": 1 }, { "name": "Alice" }] }), &doc));
    assert!(!matches(json!({ "$and": [{ "age": 30 }, { "name": "Bob" }] }), &doc));
    assert!(!matches(json!({ "$nor": [{ "age": 30 }] }), &doc));
    assert!(matches(json!({ "$nor": [{ "age": 31 }, { "name": "Bob" }] }), &doc));
    assert!(matches(json!({ "age": { "$not": { "$gt": 40 } } }), &doc));
    assert!(!matches(json!({ "age": { "$not": { "$gt": 20 } } }), &doc));
}

// ── Errors ───────────────────────────────────────────────────────

#[test]
fn unknown_operator_is_named() {
    let err = matcher(json!({ "loc": { "$near": [0, 0] } })).unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedOperator { operator } if operator == "$near"));

    let err = matcher(json!({ "$where": "true" })).unwrap_err();
    assert!(matches!(err, QueryError::UnsupportedOperator { operator } if operator == "$where"));
}

#[test]
fn malformed_arguments_rejected() {
    for selector in [
        json!({ "age": { "$in": 5 } }),
        json!({ "age": { "$mod": [0, 1] } }),
        json!({ "age": { "$exists": "yes" } }),
        json!({ "name": { "$regex": "(" } }),
        json!({ "name": { "$regex": "a", "$options": "q" } }),
        json!({ "$or": [] }),
        json!({ "$and": { "a": 1 } }),
    ] {
        let err = matcher(selector.clone()).unwrap_err();
        assert!(
            matches!(err, QueryError::InvalidSelector { .. }),
            "{selector} gave {err:?}"
        );
    }
}

// ── Collation ────────────────────────────────────────────────────

#[test]
fn collation_type_order() {
    let mut values = vec![
        json!({ "a": 1 }),
        json!([1]),
        json!("a"),
        json!(1),
        json!(true),
        json!(null),
    ];
    values.sort_by(collate);
    assert_eq!(
        values,
        vec![json!(null), json!(true), json!(1), json!("a"), json!([1]), json!({ "a": 1 })]
    );
    assert_eq!(collate_fields(None, Some(&json!(null))), Ordering::Less);
    assert_eq!(collate(&json!(2), &json!(10)), Ordering::Less);
    assert_eq!(collate(&json!([1, 2]), &json!([1, 2, 0])), Ordering::Less);
}

// ── Sorting ──────────────────────────────────────────────────────

fn sorted_ids(sort: Vec<SortField>, mut docs: Vec<Value>) -> Vec<String> {
    let query = normalize_mango_query(&schema(), &MangoQuery::all().with_sort(sort));
    get_sort_comparator(&schema(), &query).sort(&mut docs);
    docs.iter().map(|d| d["id"].as_str().unwrap().to_string()).collect()
}

#[test]
fn equal_sort_keys_tie_break_on_primary_key() {
    let docs = vec![
        json!({ "id": "b", "age": 1 }),
        json!({ "id": "a", "age": 1 }),
        json!({ "id": "c", "age": 0 }),
    ];
    let forward = sorted_ids(vec![SortField::asc("age")], docs.clone());
    let reversed = sorted_ids(vec![SortField::asc("age")], docs.into_iter().rev().collect());
    assert_eq!(forward, vec!["c", "a", "b"]);
    assert_eq!(forward, reversed);
}

#[test]
fn descending_sort_keeps_ascending_tie_break() {
    let docs = vec![
        json!({ "id": "b", "age": 1 }),
        json!({ "id": "a", "age": 1 }),
        json!({ "id": "c", "age": 2 }),
    ];
    assert_eq!(sorted_ids(vec![SortField::desc("age")], docs), vec!["c", "a", "b"]);
}

#[test]
fn missing_sorts_before_null() {
    let docs = vec![
        json!({ "id": "n", "age": 3 }),
        json!({ "id": "z", "age": null }),
        json!({ "id": "m" }),
    ];
    assert_eq!(sorted_ids(vec![SortField::asc("age")], docs), vec!["m", "z", "n"]);
}

proptest! {
    #[test]
    fn sort_is_independent_of_input_order(ages in prop::collection::vec(0u8..4, 1..20)) {
        let docs: Vec<Value> = ages
            .iter()
            .enumerate()
            .map(|(i, age)| json!({ "id": format!("{i:03}"), "age": age }))
            .collect();
        let forward = sorted_ids(vec![SortField::desc("age")], docs.clone());
        let backward = sorted_ids(vec![SortField::desc("age")], docs.into_iter().rev().collect());
        prop_assert_eq!(forward, backward);
    }
}
