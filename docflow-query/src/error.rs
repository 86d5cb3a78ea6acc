//! Error types for the query engine.

use thiserror::Error;

/// Result type for query operations.
pub type QueryResult<T> = Result<T, QueryError>;

/// Errors that can occur while parsing, planning or preparing a query.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The selector uses an operator the engine does not implement.
    #[error("unsupported query operator: {operator}")]
    UnsupportedOperator { operator: String },

    /// An operator received an argument of the wrong shape.
    #[error("invalid argument for {operator}: {reason}")]
    InvalidSelector { operator: String, reason: String },

    /// The raw query is not a JSON object of the expected shape.
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    /// A precondition the engine relies on was violated. Should not happen.
    #[error("internal invariant violated: {0}")]
    Internal(String),
}

impl QueryError {
    pub(crate) fn invalid(operator: &str, reason: impl Into<String>) -> Self {
        Self::InvalidSelector {
            operator: operator.to_string(),
            reason: reason.into(),
        }
    }
}
