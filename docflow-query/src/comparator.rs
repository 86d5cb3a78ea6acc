//! Sort comparators built on the matcher's collation.

use crate::collate::collate_fields;
use crate::mango::{SortDirection, SortField};
use crate::normalize::NormalizedQuery;
use docflow_types::{get_path, CollectionSchema};
use serde_json::Value;
use std::cmp::Ordering;

/// Total order over documents for one normalized sort.
///
/// The primary key is always the last term, so two distinct documents never
/// compare equal.
#[derive(Debug, Clone)]
pub struct SortComparator {
    sort: Vec<SortField>,
}

impl SortComparator {
    #[must_use]
    pub fn compare(&self, a: &Value, b: &Value) -> Ordering {
        for part in &self.sort {
            let ord = collate_fields(get_path(a, &part.field), get_path(b, &part.field));
            let ord = match part.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }

    /// Sorts `docs` in place.
    pub fn sort(&self, docs: &mut [Value]) {
        docs.sort_by(|a, b| self.compare(a, b));
    }

    #[must_use]
    pub fn terms(&self) -> &[SortField] {
        &self.sort
    }
}

/// Builds the comparator for `query`, appending the primary key when the
/// sort does not already end with it.
#[must_use]
pub fn get_sort_comparator(schema: &CollectionSchema, query: &NormalizedQuery) -> SortComparator {
    let mut sort = query.sort.clone();
    if !sort.iter().any(|part| part.field == schema.primary_key) {
        sort.push(SortField::asc(schema.primary_key.as_str()));
    }
    SortComparator { sort }
}
