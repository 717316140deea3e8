//! Builds parameterized SELECT, INSERT, UPDATE, DELETE for a resolved resource.

use crate::config::ResolvedResource;
use crate::error::ApiError;
use crate::schema::{ColumnDef, ColumnType};
use crate::table::{Query, SortOrder};
use serde_json::{Map, Value};

/// Quote identifier for PostgreSQL (safe: only from config).
fn quoted(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

/// Full qualified table name.
fn qualified_table(schema: &str, table: &str) -> String {
    format!("{}.{}", quoted(schema), quoted(table))
}

#[derive(Debug)]
pub struct QueryBuf {
    pub sql: String,
    pub params: Vec<Value>,
}

impl QueryBuf {
    fn new() -> Self {
        QueryBuf {
            sql: String::new(),
            params: Vec::new(),
        }
    }

    /// Push a value and return its placeholder, cast to the column's type.
    fn placeholder(&mut self, col: &ColumnDef, v: Value) -> String {
        self.params.push(v);
        format!("${}::{}", self.params.len(), sql_type(col))
    }
}

/// SQL type a placeholder is cast to.
fn sql_type(col: &ColumnDef) -> String {
    match &col.kind {
        ColumnType::Integer => "integer".into(),
        ColumnType::BigInteger => "bigint".into(),
        ColumnType::Float => "double precision".into(),
        ColumnType::Decimal => "numeric".into(),
        ColumnType::Boolean => "boolean".into(),
        ColumnType::String | ColumnType::Text => "text".into(),
        ColumnType::Uuid => "uuid".into(),
        ColumnType::Date => "date".into(),
        ColumnType::DateTime => "timestamp".into(),
        ColumnType::Timestamp => "timestamptz".into(),
        ColumnType::Json => "jsonb".into(),
        ColumnType::Other(name) => col.db_type.clone().unwrap_or_else(|| name.clone()),
    }
}

/// SELECT list: each column as-is, except custom types (enums) and numeric as col::text
/// so they decode as strings.
fn select_column_list(resource: &ResolvedResource) -> String {
    resource
        .schema
        .columns()
        .iter()
        .map(|c| {
            let q = quoted(&c.name);
            match c.kind {
                ColumnType::Other(_) | ColumnType::Decimal => format!("{}::text AS {}", q, q),
                _ => q,
            }
        })
        .collect::<Vec<_>>()
        .join(", ")
}

fn column<'a>(resource: &'a ResolvedResource, name: &str) -> Result<&'a ColumnDef, ApiError> {
    resource
        .schema
        .column(name)
        .ok_or_else(|| ApiError::BadRequest(format!("unknown column '{}' on {}", name, resource.name)))
}

fn key_clause(q: &mut QueryBuf, resource: &ResolvedResource, key: &[Value]) -> Result<String, ApiError> {
    let mut parts = Vec::with_capacity(key.len());
    for (name, v) in resource.primary_key.iter().zip(key) {
        let col = column(resource, name)?;
        let ph = q.placeholder(col, v.clone());
        parts.push(format!("{} = {}", quoted(name), ph));
    }
    Ok(parts.join(" AND "))
}

/// SELECT with equality conditions, ordering and paging. Falls back to ordering by primary key.
pub fn select(resource: &ResolvedResource, query: &Query) -> Result<QueryBuf, ApiError> {
    let mut q = QueryBuf::new();
    let table = qualified_table(&resource.schema_name, &resource.table_name);

    let mut where_parts = Vec::new();
    for cond in &query.conditions {
        let col = column(resource, cond.column())?;
        if cond.value.is_null() {
            where_parts.push(format!("{} IS NULL", quoted(&col.name)));
            continue;
        }
        let ph = q.placeholder(col, cond.value.clone());
        where_parts.push(format!("{} = {}", quoted(&col.name), ph));
    }
    let where_clause = if where_parts.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", where_parts.join(" AND "))
    };

    let mut order_parts = Vec::new();
    for (field, dir) in &query.order {
        let name = field.rsplit_once('.').map_or(field.as_str(), |(_, c)| c);
        let col = column(resource, name)?;
        let dir = match dir {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        };
        order_parts.push(format!("{} {}", quoted(&col.name), dir));
    }
    if order_parts.is_empty() {
        order_parts = resource.primary_key.iter().map(|k| quoted(k)).collect();
    }
    let order_clause = if order_parts.is_empty() {
        String::new()
    } else {
        format!(" ORDER BY {}", order_parts.join(", "))
    };
    let limit_clause = query.limit.map(|n| format!(" LIMIT {}", n)).unwrap_or_default();
    let offset_clause = query.offset.map(|n| format!(" OFFSET {}", n)).unwrap_or_default();

    q.sql = format!(
        "SELECT {} FROM {}{}{}{}{}",
        select_column_list(resource),
        table,
        where_clause,
        order_clause,
        limit_clause,
        offset_clause
    );
    Ok(q)
}

/// INSERT of the given fields. Columns the body omits are left to database defaults.
pub fn insert(resource: &ResolvedResource, fields: &Map<String, Value>) -> Result<QueryBuf, ApiError> {
    let mut q = QueryBuf::new();
    let table = qualified_table(&resource.schema_name, &resource.table_name);
    let mut cols = Vec::new();
    let mut placeholders = Vec::new();
    for c in resource.schema.columns() {
        let Some(v) = fields.get(&c.name) else { continue };
        if v.is_null() && c.has_default() {
            continue;
        }
        placeholders.push(q.placeholder(c, v.clone()));
        cols.push(quoted(&c.name));
    }
    let returning = select_column_list(resource);
    q.sql = if cols.is_empty() {
        format!("INSERT INTO {} DEFAULT VALUES RETURNING {}", table, returning)
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) RETURNING {}",
            table,
            cols.join(", "),
            placeholders.join(", "),
            returning
        )
    };
    Ok(q)
}

/// UPDATE by primary key: SET only the given columns. Primary key columns are never set.
/// With nothing to change this degrades to a SELECT of the row.
pub fn update(
    resource: &ResolvedResource,
    key: &[Value],
    changes: &Map<String, Value>,
) -> Result<QueryBuf, ApiError> {
    let mut q = QueryBuf::new();
    let table = qualified_table(&resource.schema_name, &resource.table_name);
    let mut sets = Vec::new();
    for c in resource.schema.columns() {
        if resource.primary_key.contains(&c.name) {
            continue;
        }
        let Some(v) = changes.get(&c.name) else { continue };
        let ph = q.placeholder(c, v.clone());
        sets.push(format!("{} = {}", quoted(&c.name), ph));
    }
    let returning = select_column_list(resource);
    let where_clause = key_clause(&mut q, resource, key)?;
    q.sql = if sets.is_empty() {
        format!("SELECT {} FROM {} WHERE {}", returning, table, where_clause)
    } else {
        format!(
            "UPDATE {} SET {} WHERE {} RETURNING {}",
            table,
            sets.join(", "),
            where_clause,
            returning
        )
    };
    Ok(q)
}

/// DELETE by primary key.
pub fn delete(resource: &ResolvedResource, key: &[Value]) -> Result<QueryBuf, ApiError> {
    let mut q = QueryBuf::new();
    let table = qualified_table(&resource.schema_name, &resource.table_name);
    let where_clause = key_clause(&mut q, resource, key)?;
    let pk = resource
        .primary_key
        .iter()
        .map(|k| quoted(k))
        .collect::<Vec<_>>()
        .join(", ");
    q.sql = format!("DELETE FROM {} WHERE {} RETURNING {}", table, where_clause, pk);
    Ok(q)
}
