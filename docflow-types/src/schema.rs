use crate::{get_path, set_path};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The part of a collection schema the core consumes: the primary key,
/// declared field types, indexes, default values and encrypted paths.
///
/// Full JSON-schema validation lives outside the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Field that uniquely identifies a document.
    pub primary_key: String,
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub fields: Vec<SchemaField>,
    /// Compound indexes, each a list of dot-paths.
    #[serde(default)]
    pub indexes: Vec<Vec<String>>,
    /// Dot-paths whose values are encrypted at rest.
    #[serde(default)]
    pub encrypted: Vec<String>,
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaField {
    /// Dot-path of the field (e.g. `"address.city"`).
    pub path: String,
    pub field_type: FieldType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

impl SchemaField {
    fn simple(path: &str, field_type: FieldType) -> Self {
        Self {
            path: path.into(),
            field_type,
            default: None,
        }
    }

    pub fn string(path: &str) -> Self {
        Self::simple(path, FieldType::String)
    }

    pub fn number(path: &str) -> Self {
        Self::simple(path, FieldType::Number)
    }

    pub fn integer(path: &str) -> Self {
        Self::simple(path, FieldType::Integer)
    }

    pub fn boolean(path: &str) -> Self {
        Self::simple(path, FieldType::Boolean)
    }

    pub fn array(path: &str) -> Self {
        Self::simple(path, FieldType::Array)
    }

    pub fn object(path: &str) -> Self {
        Self::simple(path, FieldType::Object)
    }

    /// Sets the value filled in when a document lacks this field.
    #[must_use]
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }
}

/// JSON type of a declared field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldType {
    String,
    Number,
    Integer,
    Boolean,
    Array,
    Object,
}

impl CollectionSchema {
    /// Creates a schema with only a primary key.
    pub fn new(primary_key: impl Into<String>) -> Self {
        let primary_key = primary_key.into();
        Self {
            fields: vec![SchemaField::string(&primary_key)],
            primary_key,
            version: 0,
            indexes: Vec::new(),
            encrypted: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_field(mut self, field: SchemaField) -> Self {
        self.fields.retain(|f| f.path != field.path);
        self.fields.push(field);
        self
    }

    #[must_use]
    pub fn with_index<I, S>(mut self, index: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indexes.push(index.into_iter().map(Into::into).collect());
        self
    }

    #[must_use]
    pub fn with_encrypted(mut self, path: impl Into<String>) -> Self {
        self.encrypted.push(path.into());
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    /// Declared type of the field at `path`.
    #[must_use]
    pub fn field_type(&self, path: &str) -> Option<FieldType> {
        self.fields
            .iter()
            .find(|f| f.path == path)
            .map(|f| f.field_type)
    }

    /// Paths whose values are encrypted at rest.
    #[must_use]
    pub fn encrypted_paths(&self) -> &[String] {
        &self.encrypted
    }

    /// Returns a copy of `doc` with declared defaults filled in for every
    /// missing field.
    #[must_use]
    pub fn fill_defaults(&self, doc: &Value) -> Value {
        let mut filled = doc.clone();
        for field in &self.fields {
            if let Some(default) = &field.default {
                if get_path(&filled, &field.path).is_none() {
                    set_path(&mut filled, &field.path, default.clone());
                }
            }
        }
        filled
    }
}
