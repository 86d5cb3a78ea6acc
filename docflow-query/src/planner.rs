//! Index selection and scan bounds.
//!
//! The planner only describes how a storage engine could read the query;
//! matching and sorting never depend on the plan.

use crate::mango::SortDirection;
use crate::normalize::NormalizedQuery;
use crate::{QueryError, QueryResult};
use docflow_types::{CollectionSchema, FieldType};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::debug;

/// Operators that translate into index bounds.
pub const LOGICAL_OPERATORS: [&str; 5] = ["$eq", "$gt", "$gte", "$lt", "$lte"];
const LOWER_BOUND_OPERATORS: [&str; 3] = ["$eq", "$gt", "$gte"];
const UPPER_BOUND_OPERATORS: [&str; 3] = ["$eq", "$lt", "$lte"];

const POINTS_PER_MATCHING_KEY: u32 = 10;
const POINTS_PER_EQUAL_KEY: u32 = 15;
const POINTS_IF_SORT_SATISFIED: u32 = 5;

/// One end of a scan range on a single index field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexBound {
    /// Below every value.
    Min,
    /// Above every value.
    Max,
    Value(Value),
}

impl IndexBound {
    fn is_open(&self) -> bool {
        matches!(self, Self::Min | Self::Max)
    }
}

/// How a storage engine should read a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    /// Index fields, always ending with the primary key.
    pub index: Vec<String>,
    pub start_keys: Vec<IndexBound>,
    pub end_keys: Vec<IndexBound>,
    pub inclusive_start: bool,
    pub inclusive_end: bool,
    /// Documents read in index order are already sorted.
    pub sort_satisfied_by_index: bool,
    /// Every document in the scan range matches; no selector check needed.
    pub selector_satisfied_by_index: bool,
}

impl QueryPlan {
    /// Higher is better.
    #[must_use]
    pub fn quality(&self) -> u32 {
        let bounded_start = count_leading(&self.start_keys, |k| !k.is_open());
        let bounded_end = count_leading(&self.end_keys, |k| !k.is_open());
        let equal = self
            .start_keys
            .iter()
            .zip(&self.end_keys)
            .take_while(|(start, end)| start == end)
            .count() as u32;
        let sort = if self.sort_satisfied_by_index {
            POINTS_IF_SORT_SATISFIED
        } else {
            0
        };
        (bounded_start + bounded_end) * POINTS_PER_MATCHING_KEY + equal * POINTS_PER_EQUAL_KEY + sort
    }
}

fn count_leading(keys: &[IndexBound], pred: impl Fn(&IndexBound) -> bool) -> u32 {
    keys.iter().take_while(|k| pred(k)).count() as u32
}

/// Produces a [`QueryPlan`] for a normalized query.
pub trait QueryPlanner: Send + Sync {
    fn plan(&self, schema: &CollectionSchema, query: &NormalizedQuery) -> QueryResult<QueryPlan>;
}

/// Rates one plan per candidate index and keeps the best.
///
/// Candidates are the query's index hint if present, otherwise every schema
/// index (with the primary key appended) followed by the primary key alone.
/// Ties go to the later candidate.
#[derive(Debug, Clone, Copy, Default)]
pub struct IndexQueryPlanner;

impl QueryPlanner for IndexQueryPlanner {
    fn plan(&self, schema: &CollectionSchema, query: &NormalizedQuery) -> QueryResult<QueryPlan> {
        let selector = &query.selector;
        let candidates = candidate_indexes(schema, query);

        let has_desc_sort = query
            .sort
            .iter()
            .any(|part| part.direction == SortDirection::Desc);

        // Boolean fields pinned by `$eq` hold one value across the whole
        // result, so they do not affect the order.
        let sort_irrelevant: HashSet<&str> = selector
            .iter()
            .filter(|(field, matcher)| {
                schema.field_type(field) == Some(FieldType::Boolean)
                    && matcher.get("$eq").is_some()
            })
            .map(|(field, _)| field.as_str())
            .collect();
        let optimal_sort: Vec<&str> = query
            .sort_fields()
            .filter(|f| !sort_irrelevant.contains(f))
            .collect();

        let mut best: Option<(u32, QueryPlan)> = None;
        for index in candidates {
            let (start_keys, end_keys, inclusive_start, inclusive_end) = scan_bounds(&index, selector);
            let index_order: Vec<&str> = index
                .iter()
                .map(String::as_str)
                .filter(|f| !sort_irrelevant.contains(f))
                .collect();
            let sort_satisfied_by_index = !has_desc_sort && index_order == optimal_sort;
            let selector_satisfied_by_index =
                is_selector_satisfied_by_index(&index, selector, &start_keys, &end_keys);

            let plan = QueryPlan {
                index,
                start_keys,
                end_keys,
                inclusive_start,
                inclusive_end,
                sort_satisfied_by_index,
                selector_satisfied_by_index,
            };
            let quality = plan.quality();
            if best.as_ref().is_none_or(|(q, _)| quality >= *q) {
                best = Some((quality, plan));
            }
        }

        let (quality, plan) = best.ok_or_else(|| {
            QueryError::Internal(format!(
                "no candidate index for query {}",
                query.canonical_string()
            ))
        })?;
        debug!("Chose index {:?} with quality {}", plan.index, quality);
        Ok(plan)
    }
}

fn candidate_indexes(schema: &CollectionSchema, query: &NormalizedQuery) -> Vec<Vec<String>> {
    if let Some(index) = &query.index {
        return vec![index.clone()];
    }
    let primary_key = &schema.primary_key;
    let mut candidates: Vec<Vec<String>> = Vec::with_capacity(schema.indexes.len() + 1);
    for fields in &schema.indexes {
        let mut index = fields.clone();
        if !index.contains(primary_key) {
            index.push(primary_key.clone());
        }
        if !candidates.contains(&index) {
            candidates.push(index);
        }
    }
    let default_index = vec![primary_key.clone()];
    candidates.retain(|index| *index != default_index);
    candidates.push(default_index);
    candidates
}

fn scan_bounds(
    index: &[String],
    selector: &Map<String, Value>,
) -> (Vec<IndexBound>, Vec<IndexBound>, bool, bool) {
    let mut inclusive_start = true;
    let mut inclusive_end = true;
    let mut start_keys = Vec::with_capacity(index.len());
    let mut end_keys = Vec::with_capacity(index.len());

    for field in index {
        let operators = selector
            .get(field)
            .and_then(Value::as_object)
            .filter(|ops| !ops.is_empty());

        let (start, end, field_start_inclusive, field_end_inclusive) = match operators {
            None => {
                // After an exclusive bound the remaining fields must not
                // widen the range again.
                let start = if inclusive_start { IndexBound::Min } else { IndexBound::Max };
                let end = if inclusive_end { IndexBound::Max } else { IndexBound::Min };
                (start, end, true, true)
            }
            Some(ops) => {
                let mut start = IndexBound::Min;
                let mut end = IndexBound::Max;
                let mut start_inclusive = true;
                let mut end_inclusive = true;
                for (op, value) in ops {
                    let value = IndexBound::Value(value.clone());
                    match op.as_str() {
                        "$eq" => {
                            start = value.clone();
                            end = value;
                            start_inclusive = true;
                            end_inclusive = true;
                        }
                        "$gte" => {
                            start = value;
                            start_inclusive = true;
                        }
                        "$gt" => {
                            start = value;
                            start_inclusive = false;
                        }
                        "$lte" => {
                            end = value;
                            end_inclusive = true;
                        }
                        "$lt" => {
                            end = value;
                            end_inclusive = false;
                        }
                        _ => {}
                    }
                }
                (start, end, start_inclusive, end_inclusive)
            }
        };

        inclusive_start &= field_start_inclusive;
        inclusive_end &= field_end_inclusive;
        start_keys.push(start);
        end_keys.push(end);
    }

    (start_keys, end_keys, inclusive_start, inclusive_end)
}

/// True when reading the scan range alone yields exactly the matching
/// documents.
fn is_selector_satisfied_by_index(
    index: &[String],
    selector: &Map<String, Value>,
    start_keys: &[IndexBound],
    end_keys: &[IndexBound],
) -> bool {
    let mut fields = Vec::with_capacity(selector.len());
    for (field, operation) in selector {
        // Also rejects `$and` / `$or` / `$nor`, which are never index fields.
        if !index.contains(field) {
            return false;
        }
        let Value::Object(ops) = operation else {
            return false;
        };
        if ops.keys().any(|op| !LOGICAL_OPERATORS.contains(&op.as_str())) {
            return false;
        }
        fields.push((field.as_str(), ops));
    }

    let Some(mut lower_fields) = bound_fields(&fields, &LOWER_BOUND_OPERATORS) else {
        return false;
    };
    let Some(mut upper_fields) = bound_fields(&fields, &UPPER_BOUND_OPERATORS) else {
        return false;
    };

    // Constrained fields must form a prefix of the index, and only the last
    // of them may be a range.
    for (i, field) in index.iter().enumerate() {
        for set in [&mut lower_fields, &mut upper_fields] {
            if !set.is_empty() && !set.contains(field.as_str()) {
                return false;
            }
            set.remove(field.as_str());
        }
        if start_keys[i] != end_keys[i] && !lower_fields.is_empty() && !upper_fields.is_empty() {
            return false;
        }
    }
    true
}

/// Fields bounded on one side, or `None` when more than one field is a
/// range on that side or a field has two bounds on it.
fn bound_fields<'a>(
    fields: &[(&'a str, &Map<String, Value>)],
    side: &[&str],
) -> Option<HashSet<&'a str>> {
    let mut bounded = HashSet::new();
    let mut has_range = false;
    for (field, ops) in fields {
        let mut on_side = ops.keys().filter(|op| side.contains(&op.as_str()));
        let first = on_side.next();
        if on_side.next().is_some() {
            return None;
        }
        if first.is_some() {
            bounded.insert(*field);
        }
        if first.map(String::as_str) != Some("$eq") {
            if has_range {
                return None;
            }
            has_range = true;
        }
    }
    Some(bounded)
}
