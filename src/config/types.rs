//! Raw config types matching the JSON documents (schemas, tables, columns, relationships, api_entities).

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaConfig {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKeyConfig {
    Single(String),
    Composite(Vec<String>),
}

impl PrimaryKeyConfig {
    pub fn columns(&self) -> Vec<String> {
        match self {
            PrimaryKeyConfig::Single(s) => vec![s.clone()],
            PrimaryKeyConfig::Composite(v) => v.clone(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TableConfig {
    pub id: String,
    #[serde(default)]
    pub schema_id: Option<String>,
    pub name: String,
    /// Display name; defaults to the camelized table name.
    #[serde(default)]
    pub alias: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
    pub primary_key: PrimaryKeyConfig,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnTypeConfig {
    Simple(String),
    Parameterized { name: String, params: Option<Vec<u32>> },
}

impl ColumnTypeConfig {
    pub fn name(&self) -> &str {
        match self {
            ColumnTypeConfig::Simple(s) => s,
            ColumnTypeConfig::Parameterized { name, .. } => name,
        }
    }

    pub fn params(&self) -> &[u32] {
        match self {
            ColumnTypeConfig::Parameterized { params: Some(p), .. } => p,
            _ => &[],
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub enum ColumnDefaultConfig {
    Literal(Value),
    Expression { expression: String },
}

impl<'de> Deserialize<'de> for ColumnDefaultConfig {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let v = Value::deserialize(deserializer)?;
        match v {
            Value::Object(mut obj) => {
                if let Some(Value::String(s)) = obj.remove("expression") {
                    return Ok(ColumnDefaultConfig::Expression { expression: s });
                }
                if let Some(lit) = obj.remove("value").or_else(|| obj.remove("literal")) {
                    return Ok(ColumnDefaultConfig::Literal(lit));
                }
                Err(serde::de::Error::custom(format!(
                    "column default must be a literal, {{ \"expression\": \"...\" }}, or {{ \"value\": ... }}; got object with keys: {:?}",
                    obj.keys().collect::<Vec<_>>()
                )))
            }
            Value::Array(_) | Value::Null => Err(serde::de::Error::custom(
                "column default must be a literal or { \"expression\": \"...\" }",
            )),
            literal => Ok(ColumnDefaultConfig::Literal(literal)),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ColumnConfig {
    pub id: String,
    pub table_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub type_: ColumnTypeConfig,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default: Option<ColumnDefaultConfig>,
    #[serde(default)]
    pub comment: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    /// `from` holds the foreign key: BelongsTo on `from`, HasMany on `to`.
    #[default]
    BelongsTo,
    /// Like BelongsTo, but `to` has at most one `from` row: HasOne on `to`.
    HasOne,
    /// Join through another table: BelongsToMany on both sides.
    BelongsToMany,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelationshipConfig {
    pub id: String,
    pub from_table_id: String,
    pub from_column_id: String,
    pub to_table_id: String,
    pub to_column_id: String,
    #[serde(default)]
    pub kind: RelationshipKind,
    /// Join table id, required for `belongs_to_many`.
    #[serde(default)]
    pub through_table_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
}

/// Explicit rule entry: `{ "name": "slug", "rule": "custom", "params": ["^[a-z-]+$"], "on": "create" }`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RuleConfig {
    pub name: String,
    /// Built-in rule identifier; defaults to `name`.
    #[serde(default)]
    pub rule: Option<String>,
    #[serde(default)]
    pub params: Vec<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub on: Option<String>,
    #[serde(default)]
    pub last: bool,
}

/// Per-column validation shorthand plus explicit rules.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ValidationConfig {
    #[serde(default)]
    pub required: Option<bool>,
    #[serde(default)]
    pub format: Option<String>,
    #[serde(default)]
    pub max_length: Option<u32>,
    #[serde(default)]
    pub min_length: Option<u32>,
    #[serde(default)]
    pub pattern: Option<String>,
    #[serde(default)]
    pub allowed: Option<Vec<Value>>,
    #[serde(default)]
    pub minimum: Option<f64>,
    #[serde(default)]
    pub maximum: Option<f64>,
    #[serde(default)]
    pub rules: Vec<RuleConfig>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiEntityConfig {
    pub entity_id: String,
    pub path_segment: String,
    pub operations: Vec<String>,
    /// Column names that must never be exposed in API responses (e.g. password hashes, secrets).
    #[serde(default)]
    pub sensitive_columns: Vec<String>,
    /// Keyed by column name; kept in document order.
    #[serde(default)]
    pub validation: serde_json::Map<String, Value>,
}

/// All config types in one struct for in-memory loading.
#[derive(Clone, Debug, Default)]
pub struct FullConfig {
    pub schemas: Vec<SchemaConfig>,
    pub tables: Vec<TableConfig>,
    pub columns: Vec<ColumnConfig>,
    pub relationships: Vec<RelationshipConfig>,
    pub api_entities: Vec<ApiEntityConfig>,
}
