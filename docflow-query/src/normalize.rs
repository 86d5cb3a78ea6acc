//! Query normalization and the canonical cache key.

use crate::mango::{MangoQuery, SortField};
use docflow_types::CollectionSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;

const LOGICAL_COMBINATORS: [&str; 3] = ["$and", "$or", "$nor"];

/// A fully defaulted query.
///
/// - `selector` is always present (empty matches every document) and every
///   plain field value is wrapped into `{"$eq": value}`.
/// - `sort` is never empty and always ends with the primary key.
/// - `index`, when given, always contains the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedQuery {
    pub selector: Map<String, Value>,
    pub sort: Vec<SortField>,
    pub skip: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<Vec<String>>,
}

impl NormalizedQuery {
    /// Deterministic string form used as the query cache key.
    ///
    /// Object keys are sorted at every depth; array order is kept.
    #[must_use]
    pub fn canonical_string(&self) -> String {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        canonicalize(&value).to_string()
    }

    /// Names of the fields the query sorts by, in order.
    pub fn sort_fields(&self) -> impl Iterator<Item = &str> {
        self.sort.iter().map(|part| part.field.as_str())
    }
}

impl From<NormalizedQuery> for MangoQuery {
    fn from(query: NormalizedQuery) -> Self {
        Self {
            selector: Some(query.selector),
            sort: Some(query.sort),
            skip: Some(query.skip),
            limit: query.limit,
            index: query.index,
        }
    }
}

/// Fills in defaults and injects the primary key.
///
/// Pure: the input is not modified, and normalizing an already normalized
/// query returns it unchanged.
#[must_use]
pub fn normalize_mango_query(schema: &CollectionSchema, query: &MangoQuery) -> NormalizedQuery {
    let primary_key = schema.primary_key.as_str();

    let selector = query
        .selector
        .as_ref()
        .map(normalize_selector)
        .unwrap_or_default();

    let mut sort = Vec::new();
    let mut seen = HashSet::new();
    for part in query.sort.iter().flatten() {
        if !seen.insert(part.field.as_str()) {
            continue;
        }
        sort.push(part.clone());
        // The primary key is unique; later terms can never break a tie.
        if part.field == primary_key {
            break;
        }
    }
    if !seen.contains(primary_key) {
        sort.push(SortField::asc(primary_key));
    }

    let index = query.index.as_ref().map(|fields| {
        let mut index: Vec<String> = Vec::with_capacity(fields.len() + 1);
        for field in fields {
            if !index.contains(field) {
                index.push(field.clone());
            }
        }
        if !index.iter().any(|f| f == primary_key) {
            index.push(primary_key.to_string());
        }
        index
    });

    NormalizedQuery {
        selector,
        sort,
        skip: query.skip.unwrap_or(0),
        limit: query.limit,
        index,
    }
}

fn normalize_selector(selector: &Map<String, Value>) -> Map<String, Value> {
    selector
        .iter()
        .map(|(key, value)| {
            let normalized = if LOGICAL_COMBINATORS.contains(&key.as_str()) {
                match value {
                    Value::Array(parts) => Value::Array(
                        parts
                            .iter()
                            .map(|part| match part {
                                Value::Object(map) => Value::Object(normalize_selector(map)),
                                other => other.clone(),
                            })
                            .collect(),
                    ),
                    other => other.clone(),
                }
            } else if key.starts_with('$') || is_operator_object(value) {
                value.clone()
            } else {
                let mut eq = Map::new();
                eq.insert("$eq".into(), value.clone());
                Value::Object(eq)
            };
            (key.clone(), normalized)
        })
        .collect()
}

/// True for a non-empty object whose keys are all operators.
pub(crate) fn is_operator_object(value: &Value) -> bool {
    match value {
        Value::Object(map) => !map.is_empty() && map.keys().all(|k| k.starts_with('$')),
        _ => false,
    }
}

/// Rebuilds `value` with object keys inserted in sorted order.
pub(crate) fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> = map.iter().collect();
            entries.sort_by(|a, b| a.0.cmp(b.0));
            Value::Object(
                entries
                    .into_iter()
                    .map(|(key, value)| (key.clone(), canonicalize(value)))
                    .collect(),
            )
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}
