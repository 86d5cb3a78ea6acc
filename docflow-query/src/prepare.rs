use crate::normalize::NormalizedQuery;
use crate::planner::{QueryPlan, QueryPlanner};
use crate::{QueryError, QueryResult};
use docflow_types::CollectionSchema;
use serde::{Deserialize, Serialize};

/// A normalized query paired with the plan a storage engine reads it by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreparedQuery {
    pub query: NormalizedQuery,
    pub plan: QueryPlan,
}

/// Plans `query` with `planner`.
///
/// The query must have been normalized: a sort that is empty or does not
/// end with the primary key is an internal error.
pub fn prepare_query(
    schema: &CollectionSchema,
    query: NormalizedQuery,
    planner: &dyn QueryPlanner,
) -> QueryResult<PreparedQuery> {
    match query.sort.last() {
        None => {
            return Err(QueryError::Internal(
                "prepared query has no sort; normalize it first".into(),
            ));
        }
        Some(last) if last.field != schema.primary_key => {
            return Err(QueryError::Internal(format!(
                "sort must end with primary key {:?}, ends with {:?}",
                schema.primary_key, last.field
            )));
        }
        Some(_) => {}
    }

    let plan = planner.plan(schema, &query)?;
    if plan.index.is_empty() {
        return Err(QueryError::Internal(format!(
            "planner returned an empty index for {}",
            query.canonical_string()
        )));
    }
    Ok(PreparedQuery { query, plan })
}
