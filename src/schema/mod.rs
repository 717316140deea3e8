//! Resource metadata: column definitions, validation rules and associations.

mod association;
mod validation;

pub use association::{Association, AssociationKind, AssociationMap};
pub use validation::{
    FieldValidator, RuleCheck, RuleFn, RuleParam, RuleScope, ValidationRule, ValidationSet,
};

use serde::Serialize;
use serde_json::Value;

/// Abstract column type, derived from the configured database type name.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Integer,
    BigInteger,
    Float,
    Decimal,
    Boolean,
    String,
    Text,
    Uuid,
    Date,
    DateTime,
    Timestamp,
    Json,
    #[serde(untagged)]
    Other(String),
}

impl ColumnType {
    pub fn from_db_type(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("uuid") {
            ColumnType::Uuid
        } else if lower.contains("bigserial") || lower.contains("bigint") || lower == "int8" {
            ColumnType::BigInteger
        } else if lower.contains("serial")
            || matches!(lower.as_str(), "integer" | "int" | "int2" | "int4" | "smallint")
        {
            ColumnType::Integer
        } else if lower.starts_with("bool") {
            ColumnType::Boolean
        } else if lower == "real" || lower.starts_with("double") || lower.starts_with("float") {
            ColumnType::Float
        } else if lower.starts_with("numeric") || lower.starts_with("decimal") {
            ColumnType::Decimal
        } else if lower == "timestamptz" || lower == "timestamp with time zone" {
            ColumnType::Timestamp
        } else if lower.starts_with("timestamp") {
            ColumnType::DateTime
        } else if lower == "date" {
            ColumnType::Date
        } else if lower.starts_with("json") {
            ColumnType::Json
        } else if lower == "text" {
            ColumnType::Text
        } else if lower.starts_with("varchar") || lower.starts_with("character") || lower == "char" || lower == "string" {
            ColumnType::String
        } else {
            ColumnType::Other(name.to_string())
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, ColumnType::Integer | ColumnType::BigInteger)
    }
}

/// One column of a resource, serialized as the `schema.columns` entry of a describe document.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ColumnDef {
    #[serde(skip)]
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ColumnType,
    pub length: Option<u32>,
    pub precision: Option<u32>,
    pub null: bool,
    /// Literal default, or the expression text when `generated` is set.
    pub default: Option<Value>,
    pub comment: Option<String>,
    /// Value produced by the storage engine (e.g. `gen_random_uuid()`, `now()`).
    #[serde(skip)]
    pub generated: bool,
    /// Type name as configured, e.g. `varchar` or `sample.order_status`.
    #[serde(skip)]
    pub db_type: Option<String>,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, kind: ColumnType) -> Self {
        ColumnDef {
            name: name.into(),
            kind,
            length: None,
            precision: None,
            null: true,
            default: None,
            comment: None,
            generated: false,
            db_type: None,
        }
    }

    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.null = false;
        self
    }

    pub fn has_default(&self) -> bool {
        self.default.is_some() || self.generated
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TableSchema {
    columns: Vec<ColumnDef>,
}

impl TableSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        TableSchema { columns }
    }

    pub fn columns(&self) -> &[ColumnDef] {
        &self.columns
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column(name).is_some()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|c| c.name.as_str())
    }
}
