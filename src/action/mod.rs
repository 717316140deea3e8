//! Generic CRUD action: one request's operation against a resource's table.

mod describe;

pub use describe::{
    describe, DescribeDocument, EntityDescription, FieldDescription, Keyed, Relations,
    RuleDescription, SchemaDescription,
};

use crate::entity::Entity;
use crate::error::ApiError;
use crate::hooks::HookRegistry;
use crate::response::ActionResult;
use crate::routing::{ReverseRouter, RouteOwner, RouteResolver};
use crate::schema::ColumnType;
use crate::service::Service;
use crate::table::{render_key, Query, Table};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_ID_NAME: &str = "id";

/// Table an action runs against: looked up by name, or handed in directly.
#[derive(Clone)]
pub enum TableRef {
    Name(String),
    Table(Arc<dyn Table>),
}

impl fmt::Debug for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TableRef::Name(name) => f.debug_tuple("Name").field(name).finish(),
            TableRef::Table(t) => f.debug_tuple("Table").field(&t.table_name()).finish(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct ActionConfig {
    /// Path segment of the resource; hooks and links are looked up by it.
    pub resource: String,
    pub table: Option<TableRef>,
    /// Primary identifier as it appears in the path; composite keys are comma separated.
    pub id: Option<String>,
    pub id_name: String,
    pub parent: Option<String>,
    pub parent_id: Option<String>,
    pub parent_id_name: Option<String>,
}

impl ActionConfig {
    pub fn new(resource: impl Into<String>) -> Self {
        ActionConfig {
            resource: resource.into(),
            table: None,
            id: None,
            id_name: DEFAULT_ID_NAME.into(),
            parent: None,
            parent_id: None,
            parent_id_name: None,
        }
    }

    #[must_use]
    pub fn table(mut self, table: TableRef) -> Self {
        self.table = Some(table);
        self
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn id_name(mut self, name: impl Into<String>) -> Self {
        self.id_name = name.into();
        self
    }

    /// Scope the action to one parent record; `field` is the column holding the parent id.
    #[must_use]
    pub fn parent(
        mut self,
        resource: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.parent = Some(resource.into());
        self.parent_id = Some(id.into());
        self.parent_id_name = Some(field.into());
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    Index,
    View,
    Add,
    Edit,
    Delete,
    Describe,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Index => "index",
            ActionKind::View => "view",
            ActionKind::Add => "add",
            ActionKind::Edit => "edit",
            ActionKind::Delete => "delete",
            ActionKind::Describe => "describe",
        };
        f.write_str(name)
    }
}

pub struct CrudAction {
    resource: String,
    table: Arc<dyn Table>,
    hooks: HookRegistry,
    routes: Arc<dyn RouteResolver>,
    id: Option<String>,
    id_name: String,
    parent: Option<String>,
    parent_id: Option<String>,
    parent_id_name: Option<String>,
}

impl CrudAction {
    pub fn new(service: &Service, config: ActionConfig) -> Result<Self, ApiError> {
        let table = match config.table {
            Some(TableRef::Table(t)) => t,
            Some(TableRef::Name(name)) => service
                .table(&name)
                .ok_or(ApiError::MissingTable(name))?,
            None => service
                .default_table()
                .ok_or_else(|| ApiError::MissingTable(config.resource.clone()))?,
        };
        Ok(CrudAction {
            hooks: service.hooks_for(&config.resource),
            routes: service.routes(),
            resource: config.resource,
            table,
            id: config.id,
            id_name: config.id_name,
            parent: config.parent,
            parent_id: config.parent_id,
            parent_id_name: config.parent_id_name,
        })
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn id_name(&self) -> &str {
        &self.id_name
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    pub fn parent_id_name(&self) -> Option<&str> {
        self.parent_id_name.as_deref()
    }

    pub fn table(&self) -> &Arc<dyn Table> {
        &self.table
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    /// Parent column and typed parent id, when the action is nested.
    fn parent_condition(&self) -> Option<(&str, Value)> {
        let name = self.parent_id_name.as_deref()?;
        let id = self.parent_id.as_deref()?;
        Some((name, typed_value(self.column_kind(name), id)))
    }

    fn column_kind(&self, column: &str) -> Option<&ColumnType> {
        self.table.schema().column(column).map(|c| &c.kind)
    }

    fn scoped(&self, query: Query) -> Query {
        match self.parent_condition() {
            Some((name, value)) => {
                let field = query.qualify(name);
                query.where_eq(field, value)
            }
            None => query,
        }
    }

    /// The configured id split into primary key components, typed by column.
    pub fn key(&self) -> Vec<Value> {
        let Some(id) = self.id.as_deref() else {
            return Vec::new();
        };
        let pk = self.table.primary_key();
        id.split(',')
            .enumerate()
            .map(|(i, part)| {
                let kind = pk.get(i).and_then(|col| self.column_kind(col));
                typed_value(kind, part.trim())
            })
            .collect()
    }

    pub async fn list(&self) -> Result<Vec<Entity>, ApiError> {
        let query = self.scoped(self.table.query());
        let query = self.hooks.run_before_query(query);
        let records = self.table.find(&query).await?;
        Ok(self.hooks.run_after_find(records))
    }

    /// Single record by primary key values. Arity and value types are checked before the
    /// table is queried.
    pub async fn fetch_one(&self, key: &[Value]) -> Result<Entity, ApiError> {
        let pk = self.table.primary_key();
        let fits = pk
            .iter()
            .zip(key)
            .all(|(col, v)| key_fits(self.column_kind(col), v));
        if key.len() != pk.len() || !fits {
            return Err(ApiError::RecordNotFound {
                table: self.table.table_name().to_string(),
                key: render_key(key),
            });
        }
        let query = pk.iter().zip(key).fold(self.table.query(), |q, (col, v)| {
            let field = q.qualify(col);
            q.where_eq(field, v.clone())
        });
        let query = self.hooks.run_before_find_one(self.scoped(query).limit(1));
        self.table
            .find(&query)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::RecordNotFound {
                table: self.table.table_name().to_string(),
                key: render_key(key),
            })
    }

    pub fn patch(&self, entity: Entity, data: Map<String, Value>) -> Entity {
        let mut data = self.hooks.run_before_patch(data);
        // a nested record always stays under the parent it is addressed by
        if let Some((name, value)) = self.parent_condition() {
            data.insert(name.to_string(), value);
        }
        let patched = self.table.patch_entity(entity, &data);
        self.hooks.run_after_patch(patched)
    }

    /// Persist; a rejected entity becomes `ValidationFailed` with the entity's own errors.
    pub async fn save(&self, mut entity: Entity) -> Result<Entity, ApiError> {
        if self.table.save(&mut entity).await? {
            return Ok(entity);
        }
        Err(ApiError::ValidationFailed {
            alias: self.table.alias().to_string(),
            errors: entity.errors().clone(),
        })
    }

    pub async fn delete(&self) -> Result<bool, ApiError> {
        let entity = self.fetch_one(&self.key()).await?;
        if self.table.delete(&entity).await? {
            return Ok(true);
        }
        Err(ApiError::api(
            500,
            format!("Could not delete record from table \"{}\"", self.table.table_name()),
        ))
    }

    pub fn describe(&self) -> DescribeDocument {
        let mut owner = RouteOwner::new(self.resource.clone());
        if let (Some(parent), Some(id)) = (&self.parent, &self.parent_id) {
            owner = owner.nested(parent.clone(), id.clone());
        }
        describe(self.table.as_ref(), &ReverseRouter::new(self.routes.clone()), &owner)
    }

    pub async fn execute(&self, kind: ActionKind, data: Option<Map<String, Value>>) -> Result<ActionResult, ApiError> {
        tracing::debug!(resource = %self.resource, action = %kind, id = ?self.id, "executing action");
        match kind {
            ActionKind::Index => {
                let records = self.list().await?;
                Ok(ActionResult::ok(Value::Array(
                    records.iter().map(Entity::to_value).collect(),
                )))
            }
            ActionKind::View => {
                let entity = self.fetch_one(&self.key()).await?;
                Ok(ActionResult::ok(entity.to_value()))
            }
            ActionKind::Add => {
                let entity = self.patch(self.table.new_entity(), data.unwrap_or_default());
                let saved = self.save(entity).await?;
                Ok(ActionResult::created(saved.to_value()))
            }
            ActionKind::Edit => {
                let entity = self.fetch_one(&self.key()).await?;
                let entity = self.patch(entity, data.unwrap_or_default());
                let saved = self.save(entity).await?;
                Ok(ActionResult::ok(saved.to_value()))
            }
            ActionKind::Delete => Ok(ActionResult::ok(Value::Bool(self.delete().await?))),
            ActionKind::Describe => Ok(ActionResult::ok(self.describe().to_value())),
        }
    }
}

impl fmt::Debug for CrudAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CrudAction")
            .field("resource", &self.resource)
            .field("table", &self.table.table_name())
            .field("id", &self.id)
            .field("parent_id", &self.parent_id)
            .finish()
    }
}

/// Whether a key value can match a column of `kind`. Values that cannot are never sent
/// to the table.
fn key_fits(kind: Option<&ColumnType>, value: &Value) -> bool {
    match (kind, value) {
        (_, Value::Null) | (None, _) => true,
        (Some(k), v) if k.is_integer() => v.is_i64() || v.is_u64(),
        (Some(ColumnType::Boolean), v) => v.is_boolean(),
        (Some(ColumnType::Uuid), v) => v.as_str().is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
        _ => true,
    }
}

/// Path text converted to the column's JSON type; integers that do not parse stay strings.
fn typed_value(kind: Option<&ColumnType>, raw: &str) -> Value {
    match kind {
        Some(k) if k.is_integer() => raw
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(raw.to_string())),
        Some(ColumnType::Boolean) => match raw {
            "true" | "1" => Value::Bool(true),
            "false" | "0" => Value::Bool(false),
            _ => Value::String(raw.to_string()),
        },
        _ => Value::String(raw.to_string()),
    }
}
