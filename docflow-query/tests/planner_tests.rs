use docflow_query::{
    normalize_mango_query, prepare_query, IndexBound, IndexQueryPlanner, MangoQuery,
    NormalizedQuery, QueryError, QueryPlan, QueryPlanner, QueryResult, SortField,
};
use docflow_types::{CollectionSchema, SchemaField};
use pretty_assertions::assert_eq;
use serde_json::{json, Map, Value};

fn human_schema(indexes: &[&[&str]]) -> CollectionSchema {
    let mut schema = CollectionSchema::new("passport_id")
        .with_field(SchemaField::string("first_name"))
        .with_field(SchemaField::string("last_name"))
        .with_field(SchemaField::integer("age"))
        .with_field(SchemaField::boolean("active"));
    for index in indexes {
        schema = schema.with_index(index.iter().copied());
    }
    schema
}

fn plan(schema: &CollectionSchema, query: Value) -> QueryPlan {
    let query = normalize_mango_query(schema, &MangoQuery::from_value(query).unwrap());
    IndexQueryPlanner.plan(schema, &query).unwrap()
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

// ── Index choice ─────────────────────────────────────────────────

#[test]
fn default_index_without_schema_indexes() {
    let schema = human_schema(&[]);
    assert_eq!(plan(&schema, json!({})).index, fields(&["passport_id"]));
}

#[test]
fn index_hint_is_respected() {
    let schema = human_schema(&[&["first_name"]]);
    let plan = plan(&schema, json!({ "index": ["first_name"] }));
    assert_eq!(plan.index, fields(&["first_name", "passport_id"]));
}

#[test]
fn prefers_default_index_over_unrelated_one() {
    let schema = human_schema(&[&["first_name"]]);
    let plan = plan(&schema, json!({ "selector": { "age": { "$eq": 10 } } }));
    assert_eq!(plan.index, fields(&["passport_id"]));
}

#[test]
fn prefers_index_with_bounded_start() {
    let schema = human_schema(&[&["first_name", "age"], &["age", "first_name"]]);
    let plan = plan(&schema, json!({ "selector": { "age": { "$eq": 10 } } }));
    assert_eq!(plan.index, fields(&["age", "first_name", "passport_id"]));
}

#[test]
fn prefers_index_matching_sort() {
    let schema = human_schema(&[&["first_name", "age"], &["age", "first_name"]]);
    let plan = plan(
        &schema,
        json!({ "sort": [{ "age": "asc" }, { "first_name": "asc" }] }),
    );
    assert_eq!(plan.index, fields(&["age", "first_name", "passport_id"]));
    assert!(plan.sort_satisfied_by_index);
}

#[test]
fn prefers_index_matching_sort_with_two_ranges() {
    let schema = human_schema(&[&["first_name", "age"], &["age", "first_name"]]);
    let plan = plan(
        &schema,
        json!({
            "selector": { "age": { "$gt": 20 }, "first_name": { "$gt": "aaa" } },
            "sort": [{ "age": "asc" }, { "first_name": "asc" }]
        }),
    );
    assert_eq!(plan.index, fields(&["age", "first_name", "passport_id"]));
}

#[test]
fn prefers_equality_over_range() {
    let schema = human_schema(&[&["first_name", "age"], &["age", "first_name"]]);
    let plan = plan(
        &schema,
        json!({
            "selector": { "age": { "$gt": 20 }, "first_name": { "$eq": "aaa" } },
            "sort": [{ "age": "asc" }, { "first_name": "asc" }]
        }),
    );
    assert_eq!(plan.index, fields(&["first_name", "age", "passport_id"]));
}

#[test]
fn descending_sort_never_satisfied_by_index() {
    let schema = human_schema(&[&["first_name", "age"], &["age", "first_name"]]);
    let plan = plan(
        &schema,
        json!({ "selector": {}, "sort": [{ "age": "desc" }, { "first_name": "asc" }] }),
    );
    assert_eq!(plan.index, fields(&["passport_id"]));
    assert!(!plan.sort_satisfied_by_index);
}

#[test]
fn boolean_equality_does_not_affect_sort() {
    let schema = human_schema(&[&["active", "age"]]);
    let plan = plan(
        &schema,
        json!({ "selector": { "active": true }, "sort": [{ "age": "asc" }] }),
    );
    assert_eq!(plan.index, fields(&["active", "age", "passport_id"]));
    assert!(plan.sort_satisfied_by_index);
}

// ── Scan bounds ──────────────────────────────────────────────────

#[test]
fn inclusive_lower_bound() {
    let schema = human_schema(&[&["age"]]);
    let plan = plan(&schema, json!({ "selector": { "age": { "$gte": 20 } } }));
    assert_eq!(plan.index, fields(&["age", "passport_id"]));
    assert_eq!(plan.start_keys[0], IndexBound::Value(json!(20)));
    assert_eq!(plan.end_keys[0], IndexBound::Max);
    assert!(plan.inclusive_start);
}

#[test]
fn exclusive_bounds_close_trailing_fields() {
    let schema = human_schema(&[&["age"]]);
    let plan = plan(
        &schema,
        json!({ "selector": { "age": { "$gt": 20, "$lt": 80 } }, "index": ["age"] }),
    );
    assert_eq!(plan.index, fields(&["age", "passport_id"]));
    assert_eq!(
        plan.start_keys,
        vec![IndexBound::Value(json!(20)), IndexBound::Max]
    );
    assert_eq!(
        plan.end_keys,
        vec![IndexBound::Value(json!(80)), IndexBound::Min]
    );
    assert!(!plan.inclusive_start);
    assert!(!plan.inclusive_end);
}

#[test]
fn plain_equality_uses_primary_key() {
    let schema = human_schema(&[]);
    let plan = plan(&schema, json!({ "selector": { "passport_id": "asdf" } }));
    assert_eq!(plan.index, fields(&["passport_id"]));
    assert_eq!(plan.start_keys, vec![IndexBound::Value(json!("asdf"))]);
    assert_eq!(plan.end_keys, vec![IndexBound::Value(json!("asdf"))]);
}

#[test]
fn quality_rewards_equality() {
    let schema = human_schema(&[&["age", "first_name"]]);
    let plan = plan(&schema, json!({ "selector": { "age": 10 } }));
    assert_eq!(plan.index, fields(&["age", "first_name", "passport_id"]));
    assert_eq!(plan.quality(), 35);
}

// ── Selector coverage ────────────────────────────────────────────

#[test]
fn range_on_single_index_field_is_covered() {
    let schema = human_schema(&[&["age"]]);
    let plan = plan(&schema, json!({ "selector": { "age": { "$gt": 10, "$lt": 100 } } }));
    assert!(plan.selector_satisfied_by_index);
}

#[test]
fn non_logical_operator_is_not_covered() {
    let schema = human_schema(&[&["age"]]);
    let plan = plan(
        &schema,
        json!({
            "selector": { "age": { "$gt": 10, "$lt": 100, "$elemMatch": { "foo": "bar" } } }
        }),
    );
    assert!(!plan.selector_satisfied_by_index);
}

#[test]
fn field_outside_index_is_not_covered() {
    let schema = human_schema(&[&["age"]]);
    let plan = plan(
        &schema,
        json!({
            "selector": { "age": { "$gt": 10 }, "last_name": "foo" },
            "index": ["age"]
        }),
    );
    assert!(!plan.selector_satisfied_by_index);
}

#[test]
fn or_is_not_covered() {
    let schema = human_schema(&[&["age"]]);
    let plan = plan(&schema, json!({ "selector": { "$or": [{ "age": 1 }, { "age": 2 }] } }));
    assert!(!plan.selector_satisfied_by_index);
}

// ── prepare_query ────────────────────────────────────────────────

#[test]
fn prepare_pairs_query_with_plan() {
    let schema = human_schema(&[&["age"]]);
    let query = normalize_mango_query(
        &schema,
        &MangoQuery::all().with_selector(json!({ "age": { "$gte": 18 } })),
    );
    let prepared = prepare_query(&schema, query.clone(), &IndexQueryPlanner).unwrap();
    assert_eq!(prepared.query, query);
    assert_eq!(prepared.plan.index, fields(&["age", "passport_id"]));
}

fn unnormalized(sort: Vec<SortField>) -> NormalizedQuery {
    NormalizedQuery {
        selector: Map::new(),
        sort,
        skip: 0,
        limit: None,
        index: None,
    }
}

#[test]
fn prepare_rejects_missing_sort() {
    let schema = human_schema(&[]);
    let err = prepare_query(&schema, unnormalized(vec![]), &IndexQueryPlanner).unwrap_err();
    assert!(matches!(err, QueryError::Internal(_)));
}

#[test]
fn prepare_rejects_sort_without_primary_key_tail() {
    let schema = human_schema(&[]);
    let err = prepare_query(
        &schema,
        unnormalized(vec![SortField::asc("age")]),
        &IndexQueryPlanner,
    )
    .unwrap_err();
    assert!(matches!(err, QueryError::Internal(_)));
}

struct FixedPlanner(QueryPlan);

impl QueryPlanner for FixedPlanner {
    fn plan(&self, _: &CollectionSchema, _: &NormalizedQuery) -> QueryResult<QueryPlan> {
        Ok(self.0.clone())
    }
}

struct FailingPlanner;

impl QueryPlanner for FailingPlanner {
    fn plan(&self, _: &CollectionSchema, _: &NormalizedQuery) -> QueryResult<QueryPlan> {
        Err(QueryError::Internal("planner offline".into()))
    }
}

#[test]
fn prepare_delegates_to_injected_planner() {
    let schema = human_schema(&[]);
    let fixed = QueryPlan {
        index: fields(&["passport_id"]),
        start_keys: vec![IndexBound::Min],
        end_keys: vec![IndexBound::Max],
        inclusive_start: true,
        inclusive_end: true,
        sort_satisfied_by_index: true,
        selector_satisfied_by_index: true,
    };
    let query = normalize_mango_query(&schema, &MangoQuery::all());
    let prepared = prepare_query(&schema, query.clone(), &FixedPlanner(fixed.clone())).unwrap();
    assert_eq!(prepared.plan, fixed);

    let err = prepare_query(&schema, query, &FailingPlanner).unwrap_err();
    assert!(matches!(err, QueryError::Internal(msg) if msg == "planner offline"));
}
