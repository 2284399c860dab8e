//! Field-level schema models returned by the metadata endpoint.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Broad classification of a field's declared data type.
///
/// Schemas keep the declared type as a plain string; this classification is a
/// convenience for callers building typed filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Numeric,
    Text,
    Boolean,
    Temporal,
    Other,
}

impl FieldKind {
    /// Classify a declared type string, case-insensitively.
    #[must_use]
    pub fn classify(data_type: &str) -> Self {
        match data_type.to_ascii_lowercase().as_str() {
            "int" | "integer" | "bigint" | "float" | "double" | "decimal" | "numeric" => {
                Self::Numeric
            }
            "string" | "varchar" | "text" => Self::Text,
            "boolean" | "bool" => Self::Boolean,
            "date" | "datetime" | "timestamp" | "time" => Self::Temporal,
            _ => Self::Other,
        }
    }
}

/// Schema of one field in an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldMetadata {
    pub field_name: String,

    /// Declared data type, as the gateway reports it (`Int`, `String`, ...).
    #[serde(rename = "type")]
    pub data_type: String,

    #[serde(default)]
    pub is_primary_key: bool,

    #[serde(default)]
    pub is_auto_increment: bool,

    /// The wire name uses a lowercase 'b': `fieldCanbeNull`.
    #[serde(default = "default_true", rename = "fieldCanbeNull")]
    pub is_nullable: bool,

    #[serde(default)]
    pub is_unique: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_value: Option<Value>,
}

fn default_true() -> bool {
    true
}

impl FieldMetadata {
    /// A field is required when it is non-nullable and has no default.
    #[must_use]
    pub fn is_required(&self) -> bool {
        !self.is_nullable && self.default_value.is_none()
    }

    /// Broad classification of the declared type.
    #[must_use]
    pub fn kind(&self) -> FieldKind {
        FieldKind::classify(&self.data_type)
    }
}

/// Complete field schema for one entity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntitySchema {
    #[serde(default)]
    pub fields: Vec<FieldMetadata>,
}

impl EntitySchema {
    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Names of the primary key fields, in declaration order.
    #[must_use]
    pub fn primary_keys(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is_primary_key)
            .map(|f| f.field_name.as_str())
            .collect()
    }

    /// Names of the required fields, in declaration order.
    #[must_use]
    pub fn required_fields(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.is_required())
            .map(|f| f.field_name.as_str())
            .collect()
    }

    /// Look up one field's schema by name.
    #[must_use]
    pub fn field(&self, name: &str) -> Option<&FieldMetadata> {
        self.fields.iter().find(|f| f.field_name == name)
    }

    #[must_use]
    pub fn has_field(&self, name: &str) -> bool {
        self.field(name).is_some()
    }

    /// All field names, in declaration order.
    #[must_use]
    pub fn field_names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.field_name.as_str()).collect()
    }

    /// Partition `names` into those present in this schema and those not.
    #[must_use]
    pub fn validate_fields<'a>(&self, names: &'a [&'a str]) -> (Vec<&'a str>, Vec<&'a str>) {
        names.iter().copied().partition(|name| self.has_field(name))
    }
}
