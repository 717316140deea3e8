use super::memory::DUPLICATE_KEY_MESSAGE;
use super::{Query, Table};
use crate::config::ResolvedResource;
use crate::entity::Entity;
use crate::error::ApiError;
use crate::schema::{AssociationMap, ColumnDef, ColumnType, TableSchema, ValidationSet};
use crate::sql::{self, PgBindValue, QueryBuf};
use async_trait::async_trait;
use serde_json::{Map, Value};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;

/// Table backed by a PostgreSQL relation. Identifiers come from config; values are bound.
#[derive(Debug, Clone)]
pub struct PgTable {
    pool: PgPool,
    resource: ResolvedResource,
}

impl PgTable {
    pub fn new(pool: PgPool, resource: ResolvedResource) -> Self {
        PgTable { pool, resource }
    }

    pub fn resource(&self) -> &ResolvedResource {
        &self.resource
    }

    async fn fetch_all(&self, q: QueryBuf) -> Result<Vec<Map<String, Value>>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let rows = query.fetch_all(&self.pool).await?;
        Ok(rows.iter().map(|r| self.row_to_map(r)).collect())
    }

    async fn fetch_optional(&self, q: QueryBuf) -> Result<Option<Map<String, Value>>, ApiError> {
        tracing::debug!(sql = %q.sql, params = ?q.params, "query");
        let mut query = sqlx::query(&q.sql);
        for p in &q.params {
            query = query.bind(PgBindValue::from(p));
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.map(|r| self.row_to_map(&r)))
    }

    fn row_to_map(&self, row: &PgRow) -> Map<String, Value> {
        self.resource
            .schema
            .columns()
            .iter()
            .map(|c| (c.name.clone(), cell_to_value(row, c)))
            .collect()
    }
}

#[async_trait]
impl Table for PgTable {
    fn table_name(&self) -> &str {
        &self.resource.table_name
    }

    fn alias(&self) -> &str {
        &self.resource.alias
    }

    fn primary_key(&self) -> &[String] {
        &self.resource.primary_key
    }

    fn schema(&self) -> &TableSchema {
        &self.resource.schema
    }

    fn validator(&self) -> &ValidationSet {
        &self.resource.validator
    }

    fn associations(&self) -> &AssociationMap {
        &self.resource.associations
    }

    fn hidden_fields(&self) -> &[String] {
        &self.resource.hidden
    }

    async fn find(&self, query: &Query) -> Result<Vec<Entity>, ApiError> {
        let q = sql::select(&self.resource, query)?;
        Ok(self
            .fetch_all(q)
            .await?
            .into_iter()
            .map(|row| Entity::hydrate(row, self.resource.hidden.clone()))
            .collect())
    }

    async fn save(&self, entity: &mut Entity) -> Result<bool, ApiError> {
        if entity.has_errors() {
            return Ok(false);
        }
        let result = if entity.is_new() {
            let q = sql::insert(&self.resource, entity.fields())?;
            self.fetch_optional(q).await
        } else {
            let key = entity.extract(&self.resource.primary_key);
            let changes: Map<String, Value> = entity
                .dirty_fields()
                .filter_map(|f| entity.get(f).map(|v| (f.to_string(), v.clone())))
                .collect();
            let q = sql::update(&self.resource, &key, &changes)?;
            match self.fetch_optional(q).await {
                Ok(None) => return Err(self.not_found(&key)),
                other => other,
            }
        };
        match result {
            Ok(Some(stored)) => {
                entity.mark_persisted(stored);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(ApiError::Db(sqlx::Error::Database(db))) if db.is_unique_violation() => {
                tracing::debug!(table = %self.resource.table_name, error = %db, "unique violation");
                let field = self.resource.primary_key.first().cloned().unwrap_or_default();
                entity.add_error(field, DUPLICATE_KEY_MESSAGE);
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, entity: &Entity) -> Result<bool, ApiError> {
        let key = entity.extract(&self.resource.primary_key);
        let q = sql::delete(&self.resource, &key)?;
        Ok(self.fetch_optional(q).await?.is_some())
    }
}

/// Decode one cell by the column's abstract type. Custom types and numerics are selected as text.
fn cell_to_value(row: &PgRow, col: &ColumnDef) -> Value {
    let name = col.name.as_str();
    let decoded = match col.kind {
        ColumnType::Integer => row
            .try_get::<Option<i32>, _>(name)
            .map(|v| v.map(Value::from))
            .or_else(|_| row.try_get::<Option<i16>, _>(name).map(|v| v.map(Value::from))),
        ColumnType::BigInteger => row.try_get::<Option<i64>, _>(name).map(|v| v.map(Value::from)),
        ColumnType::Float => row
            .try_get::<Option<f64>, _>(name)
            .or_else(|_| row.try_get::<Option<f32>, _>(name).map(|v| v.map(f64::from)))
            .map(|v| v.and_then(serde_json::Number::from_f64).map(Value::Number)),
        ColumnType::Boolean => row.try_get::<Option<bool>, _>(name).map(|v| v.map(Value::Bool)),
        ColumnType::Uuid => row
            .try_get::<Option<uuid::Uuid>, _>(name)
            .map(|v| v.map(|u| Value::String(u.to_string()))),
        ColumnType::Timestamp => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(name)
            .map(|v| v.map(|d| Value::String(d.to_rfc3339()))),
        ColumnType::DateTime => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(name)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%dT%H:%M:%S%.f").to_string()))),
        ColumnType::Date => row
            .try_get::<Option<chrono::NaiveDate>, _>(name)
            .map(|v| v.map(|d| Value::String(d.format("%Y-%m-%d").to_string()))),
        ColumnType::Json => row.try_get::<Option<Value>, _>(name),
        ColumnType::String | ColumnType::Text | ColumnType::Decimal | ColumnType::Other(_) => {
            row.try_get::<Option<String>, _>(name).map(|v| v.map(Value::String))
        }
    };
    match decoded {
        Ok(v) => v.unwrap_or(Value::Null),
        Err(e) => {
            tracing::warn!(column = %name, error = %e, "could not decode column");
            Value::Null
        }
    }
}
