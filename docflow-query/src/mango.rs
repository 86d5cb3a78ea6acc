//! User-facing mango query shape.

use crate::{QueryError, QueryResult};
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Sort direction of one sort term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// One sort term. Serialized as a single-key object, `{"age": "desc"}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SortField {
    pub field: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
        }
    }
}

impl Serialize for SortField {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut part = BTreeMap::new();
        part.insert(&self.field, self.direction);
        part.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SortField {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let part = BTreeMap::<String, SortDirection>::deserialize(deserializer)?;
        let mut entries = part.into_iter();
        match (entries.next(), entries.next()) {
            (Some((field, direction)), None) => Ok(Self { field, direction }),
            _ => Err(D::Error::custom("sort part must have exactly one field")),
        }
    }
}

/// A query as written by application code. Every part is optional;
/// [`crate::normalize_mango_query`] fills in the defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MangoQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortField>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Index hint: the fields of the index the planner must use.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index: Option<Vec<String>>,
}

impl MangoQuery {
    /// A query matching every document.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Parses a query from a JSON value, rejecting non-objects.
    pub fn from_value(value: Value) -> QueryResult<Self> {
        match value {
            Value::Object(_) => {
                serde_json::from_value(value).map_err(|e| QueryError::InvalidQuery(e.to_string()))
            }
            Value::Array(_) => Err(QueryError::InvalidQuery(
                "query must be an object, got an array".into(),
            )),
            other => Err(QueryError::InvalidQuery(format!(
                "query must be an object, got {other}"
            ))),
        }
    }

    /// Parses a query from its JSON string form.
    pub fn from_json(json: &str) -> QueryResult<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| QueryError::InvalidQuery(e.to_string()))?;
        Self::from_value(value)
    }

    /// Sets the selector. Non-object values are ignored.
    #[must_use]
    pub fn with_selector(mut self, selector: Value) -> Self {
        if let Value::Object(map) = selector {
            self.selector = Some(map);
        }
        self
    }

    #[must_use]
    pub fn with_sort(mut self, sort: Vec<SortField>) -> Self {
        self.sort = Some(sort);
        self
    }

    #[must_use]
    pub fn with_skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn with_index<I, S>(mut self, index: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.index = Some(index.into_iter().map(Into::into).collect());
        self
    }
}
