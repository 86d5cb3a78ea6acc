//! Compiled selector predicates.

use crate::collate::{collate, collate_fields};
use crate::normalize::NormalizedQuery;
use crate::selector::{ElemMatch, FieldCondition, Operator, Selector};
use crate::QueryResult;
use docflow_types::{get_path, is_deleted, CollectionSchema};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::trace;

/// Reusable predicate compiled from a normalized selector.
///
/// Soft-deleted documents (`_deleted: true`) never match.
#[derive(Debug, Clone)]
pub struct QueryMatcher {
    selector: Selector,
}

impl QueryMatcher {
    /// Compiles a matcher from a parsed selector.
    #[must_use]
    pub fn new(selector: Selector) -> Self {
        Self { selector }
    }

    #[must_use]
    pub fn matches(&self, doc: &Value) -> bool {
        !is_deleted(doc) && matches_selector(&self.selector, doc)
    }

    /// Keeps the documents that match, preserving their order.
    pub fn filter<'a, I>(&'a self, docs: I) -> impl Iterator<Item = &'a Value> + 'a
    where
        I: IntoIterator<Item = &'a Value>,
        I::IntoIter: 'a,
    {
        docs.into_iter().filter(move |doc| self.matches(doc))
    }
}

/// Compiles the selector of `query` into a [`QueryMatcher`].
pub fn get_query_matcher(
    schema: &CollectionSchema,
    query: &NormalizedQuery,
) -> QueryResult<QueryMatcher> {
    let selector = Selector::parse(&query.selector)?;
    trace!(
        "Compiled matcher with {} conditions for collection keyed by {}",
        selector.conditions.len(),
        schema.primary_key
    );
    Ok(QueryMatcher::new(selector))
}

pub(crate) fn matches_selector(selector: &Selector, doc: &Value) -> bool {
    selector.conditions.iter().all(|condition| match condition {
        FieldCondition::Field { path, operators } => {
            let value = get_path(doc, path);
            operators.iter().all(|op| matches_operator(op, value))
        }
        FieldCondition::And(parts) => parts.iter().all(|s| matches_selector(s, doc)),
        FieldCondition::Or(parts) => parts.iter().any(|s| matches_selector(s, doc)),
        FieldCondition::Nor(parts) => !parts.iter().any(|s| matches_selector(s, doc)),
    })
}

fn equals(a: &Value, b: &Value) -> bool {
    collate(a, b) == Ordering::Equal
}

/// Equality that also holds when `value` is an array containing `target`.
fn equals_or_contains(value: &Value, target: &Value) -> bool {
    equals(value, target)
        || matches!(value, Value::Array(items) if items.iter().any(|item| equals(item, target)))
}

fn compare(value: Option<&Value>, target: &Value, accept: fn(Ordering) -> bool) -> bool {
    value.is_some() && accept(collate_fields(value, Some(target)))
}

fn matches_operator(op: &Operator, value: Option<&Value>) -> bool {
    match op {
        Operator::Eq(target) => value.is_some_and(|v| equals_or_contains(v, target)),
        Operator::Ne(target) => !value.is_some_and(|v| equals_or_contains(v, target)),
        Operator::Gt(target) => compare(value, target, Ordering::is_gt),
        Operator::Gte(target) => compare(value, target, Ordering::is_ge),
        Operator::Lt(target) => compare(value, target, Ordering::is_lt),
        Operator::Lte(target) => compare(value, target, Ordering::is_le),
        Operator::In(targets) => {
            value.is_some_and(|v| targets.iter().any(|t| equals_or_contains(v, t)))
        }
        Operator::Nin(targets) => {
            !value.is_some_and(|v| targets.iter().any(|t| equals_or_contains(v, t)))
        }
        Operator::Exists(expected) => value.is_some() == *expected,
        Operator::Type(ty) => value.is_some_and(|v| ty.matches(v)),
        Operator::Mod { divisor, remainder } => value
            .and_then(Value::as_f64)
            .is_some_and(|n| (n.trunc() as i64).checked_rem(*divisor) == Some(*remainder)),
        Operator::ElemMatch(elem) => match value {
            Some(Value::Array(items)) => items.iter().any(|item| match elem {
                ElemMatch::Value(ops) => ops.iter().all(|op| matches_operator(op, Some(item))),
                ElemMatch::Document(selector) => {
                    item.is_object() && matches_selector(selector, item)
                }
            }),
            _ => false,
        },
        Operator::Size(size) => matches!(value, Some(Value::Array(items)) if items.len() == *size),
        Operator::Regex(regex) => match value {
            Some(Value::String(s)) => regex.is_match(s),
            Some(Value::Array(items)) => items
                .iter()
                .any(|item| item.as_str().is_some_and(|s| regex.is_match(s))),
            _ => false,
        },
        Operator::All(targets) => match value {
            Some(Value::Array(items)) => {
                !targets.is_empty()
                    && targets
                        .iter()
                        .all(|t| items.iter().any(|item| equals(item, t)))
            }
            _ => false,
        },
        Operator::Not(ops) => !ops.iter().all(|op| matches_operator(op, value)),
    }
}
