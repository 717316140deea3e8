//! Table abstraction: the storage seam actions run against.

mod memory;
mod postgres;

pub use memory::MemoryTable;
pub use postgres::PgTable;

use crate::entity::Entity;
use crate::error::ApiError;
use crate::schema::{AssociationMap, TableSchema, ValidationSet};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Equality condition. `field` may be qualified with the table alias (`Articles.id`).
#[derive(Clone, Debug, PartialEq)]
pub struct Condition {
    pub field: String,
    pub value: Value,
}

impl Condition {
    /// Column name without any alias qualifier.
    pub fn column(&self) -> &str {
        self.field
            .rsplit_once('.')
            .map_or(self.field.as_str(), |(_, col)| col)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Query description handed to `Table::find`; hooks may rewrite it before it runs.
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
    pub alias: String,
    pub conditions: Vec<Condition>,
    pub order: Vec<(String, SortOrder)>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

impl Query {
    pub fn new(alias: impl Into<String>) -> Self {
        Query {
            alias: alias.into(),
            conditions: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    #[must_use]
    pub fn where_eq(mut self, field: impl Into<String>, value: Value) -> Self {
        self.conditions.push(Condition {
            field: field.into(),
            value,
        });
        self
    }

    #[must_use]
    pub fn order_by(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.order.push((field.into(), order));
        self
    }

    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    #[must_use]
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// `Alias.field`.
    pub fn qualify(&self, field: &str) -> String {
        format!("{}.{}", self.alias, field)
    }
}

#[async_trait]
pub trait Table: Send + Sync {
    /// Storage name, used in not-found messages.
    fn table_name(&self) -> &str;
    /// Display name, used to qualify conditions and in validation failures.
    fn alias(&self) -> &str;
    fn primary_key(&self) -> &[String];
    fn schema(&self) -> &TableSchema;
    fn validator(&self) -> &ValidationSet;
    fn associations(&self) -> &AssociationMap;

    fn hidden_fields(&self) -> &[String] {
        &[]
    }

    fn query(&self) -> Query {
        Query::new(self.alias())
    }

    fn new_entity(&self) -> Entity {
        Entity::new(self.hidden_fields().to_vec())
    }

    /// Validate `data` and assign the fields that passed. Unknown columns are ignored and the
    /// primary key of a persisted entity is never reassigned.
    fn patch_entity(&self, mut entity: Entity, data: &Map<String, Value>) -> Entity {
        let errors = self.validator().validate(data, entity.is_new());
        let pk = self.primary_key();
        for (field, value) in data {
            if !self.schema().has_column(field) {
                tracing::trace!(table = %self.table_name(), field = %field, "ignoring unknown field");
                continue;
            }
            if !entity.is_new() && pk.iter().any(|k| k == field) {
                continue;
            }
            if errors.get(field).is_some() {
                continue;
            }
            entity.set(field.clone(), value.clone());
        }
        entity.set_errors(errors);
        entity
    }

    async fn find(&self, query: &Query) -> Result<Vec<Entity>, ApiError>;

    /// Single entity by primary key values, in key column order.
    async fn get(&self, key: &[Value]) -> Result<Entity, ApiError> {
        let pk = self.primary_key();
        if key.len() != pk.len() {
            return Err(self.not_found(key));
        }
        let query = pk
            .iter()
            .zip(key)
            .fold(self.query(), |q, (col, v)| {
                let field = q.qualify(col);
                q.where_eq(field, v.clone())
            })
            .limit(1);
        self.find(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| self.not_found(key))
    }

    /// Persist the entity. `Ok(false)` means it was rejected and carries errors.
    async fn save(&self, entity: &mut Entity) -> Result<bool, ApiError>;

    async fn delete(&self, entity: &Entity) -> Result<bool, ApiError>;

    fn not_found(&self, key: &[Value]) -> ApiError {
        ApiError::RecordNotFound {
            table: self.table_name().to_string(),
            key: render_key(key),
        }
    }
}

impl fmt::Debug for dyn Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("table", &self.table_name())
            .field("alias", &self.alias())
            .finish()
    }
}

/// Literal rendering of key values: strings quoted, null as `NULL`. No values renders as `NULL`.
pub fn render_key(values: &[Value]) -> String {
    if values.is_empty() {
        return "NULL".into();
    }
    values
        .iter()
        .map(|v| match v {
            Value::Null => "NULL".to_string(),
            Value::String(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            Value::Bool(true) => "true".into(),
            Value::Bool(false) => "false".into(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Tables by name: the locator actions use when configured with a table name.
#[derive(Clone, Default)]
pub struct TableRegistry {
    tables: HashMap<String, Arc<dyn Table>>,
}

impl TableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: impl Into<String>, table: Arc<dyn Table>) {
        self.tables.insert(name.into(), table);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Table>> {
        self.tables.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tables.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }
}

impl fmt::Debug for TableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.names().collect();
        names.sort_unstable();
        f.debug_struct("TableRegistry").field("tables", &names).finish()
    }
}
