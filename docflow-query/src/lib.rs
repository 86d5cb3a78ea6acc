//! Query engine for docflow.
//!
//! Gives every query a canonical, deterministic interpretation:
//! - [`normalize_mango_query`] fills in defaults and injects the primary key,
//!   and [`NormalizedQuery::canonical_string`] is the query cache key
//! - [`get_query_matcher`] compiles the selector into a predicate
//! - [`get_sort_comparator`] derives a total order from the sort
//! - [`prepare_query`] pairs the query with a [`QueryPlan`]
//!
//! Matching and sorting share one collation ([`collate`]), so comparison
//! operators and sort order always agree on how values of different types
//! relate.

mod collate;
mod comparator;
mod error;
mod mango;
mod matcher;
mod normalize;
mod planner;
mod prepare;
mod selector;

pub use collate::{collate, collate_fields};
pub use comparator::{get_sort_comparator, SortComparator};
pub use error::{QueryError, QueryResult};
pub use mango::{MangoQuery, SortDirection, SortField};
pub use matcher::{get_query_matcher, QueryMatcher};
pub use normalize::{normalize_mango_query, NormalizedQuery};
pub use planner::{IndexBound, IndexQueryPlanner, QueryPlan, QueryPlanner, LOGICAL_OPERATORS};
pub use prepare::{prepare_query, PreparedQuery};
pub use selector::{ElemMatch, FieldCondition, JsonType, Operator, Selector};
