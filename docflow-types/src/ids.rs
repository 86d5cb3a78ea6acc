//! Identifier types used throughout docflow.
//!
//! Every open database instance gets a random [`InstanceToken`]. Sibling
//! processes sharing the same storage compare tokens to tell their own
//! broadcasts apart from genuinely remote ones.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Opaque per-process token identifying the instance that produced an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InstanceToken(Uuid);

impl InstanceToken {
    /// Creates a new random token.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a token from an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }

    /// Parses a token from a string.
    pub fn parse(s: &str) -> std::result::Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for InstanceToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InstanceToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for InstanceToken {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// The identity of one open database instance: its logical name plus the
/// token of the process that opened it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DatabaseIdentity {
    name: String,
    token: InstanceToken,
}

impl DatabaseIdentity {
    /// Creates an identity with a fresh token.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        Self::with_token(name, InstanceToken::new())
    }

    /// Creates an identity with an explicit token.
    pub fn with_token(name: impl Into<String>, token: InstanceToken) -> Result<Self> {
        let name = name.into();
        validate_collection_name(&name, false)?;
        Ok(Self { name, token })
    }

    /// The logical database name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The token of this instance.
    #[must_use]
    pub const fn token(&self) -> InstanceToken {
        self.token
    }
}

/// Validates a database or collection name.
///
/// Names start with a lowercase ASCII letter and continue with lowercase
/// letters, digits, `_`, `$` or `-`. Framework bookkeeping collections start
/// with `_`; those are only accepted when `allow_internal` is set.
pub fn validate_collection_name(name: &str, allow_internal: bool) -> Result<()> {
    let body = match name.strip_prefix('_') {
        Some(rest) if allow_internal => rest,
        _ => name,
    };

    let mut chars = body.chars();
    let valid = match chars.next() {
        Some(first) if first.is_ascii_lowercase() => chars.all(|c| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '$' | '-')
        }),
        _ => false,
    };

    if valid {
        Ok(())
    } else {
        Err(Error::InvalidCollectionName(name.to_string()))
    }
}
