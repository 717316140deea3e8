use super::{Query, SortOrder, Table};
use crate::config::ResolvedResource;
use crate::entity::Entity;
use crate::error::ApiError;
use crate::schema::{AssociationMap, ColumnType, TableSchema, ValidationSet};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub const DUPLICATE_KEY_MESSAGE: &str = "This value is already in use";

/// Table kept in process memory. Rows are stored in insertion order.
#[derive(Debug)]
pub struct MemoryTable {
    resource: ResolvedResource,
    rows: RwLock<Vec<Map<String, Value>>>,
}

impl MemoryTable {
    pub fn new(resource: ResolvedResource) -> Self {
        MemoryTable {
            resource,
            rows: RwLock::new(Vec::new()),
        }
    }

    #[must_use]
    pub fn with_rows(self, rows: Vec<Value>) -> Self {
        {
            let mut guard = self.write();
            guard.extend(rows.into_iter().filter_map(|r| match r {
                Value::Object(m) => Some(m),
                _ => None,
            }));
        }
        self
    }

    pub fn resource(&self) -> &ResolvedResource {
        &self.resource
    }

    /// Copy of the stored rows.
    pub fn rows(&self) -> Vec<Map<String, Value>> {
        self.read().clone()
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<Map<String, Value>>> {
        self.rows.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<Map<String, Value>>> {
        self.rows.write().unwrap_or_else(|e| e.into_inner())
    }

    fn key_of(&self, row: &Map<String, Value>) -> Vec<Value> {
        self.resource
            .primary_key
            .iter()
            .map(|k| row.get(k).cloned().unwrap_or(Value::Null))
            .collect()
    }

    fn same_key(a: &[Value], b: &[Value]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| loose_eq(x, y))
    }

    fn next_id(&self, rows: &[Map<String, Value>], column: &str) -> i64 {
        rows.iter()
            .filter_map(|r| r.get(column).and_then(Value::as_i64))
            .max()
            .unwrap_or(0)
            + 1
    }

    /// Fill missing columns from generated values and literal defaults.
    fn apply_defaults(&self, row: &mut Map<String, Value>, rows: &[Map<String, Value>]) {
        let single_pk = match self.resource.primary_key.as_slice() {
            [only] => Some(only.as_str()),
            _ => None,
        };
        for col in self.resource.schema.columns() {
            if row.get(&col.name).is_some_and(|v| !v.is_null()) {
                continue;
            }
            let value = if single_pk == Some(col.name.as_str()) && col.kind.is_integer() {
                Some(Value::from(self.next_id(rows, &col.name)))
            } else if col.generated {
                match col.kind {
                    ColumnType::Uuid => Some(Value::String(uuid::Uuid::new_v4().to_string())),
                    ColumnType::Timestamp | ColumnType::DateTime => {
                        Some(Value::String(chrono::Utc::now().to_rfc3339()))
                    }
                    ColumnType::Date => Some(Value::String(chrono::Utc::now().date_naive().to_string())),
                    _ => None,
                }
            } else {
                col.default.clone()
            };
            if let Some(v) = value {
                row.insert(col.name.clone(), v);
            }
        }
    }
}

#[async_trait]
impl Table for MemoryTable {
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
        let rows = self.read();
        let mut matched: Vec<&Map<String, Value>> = rows
            .iter()
            .filter(|row| {
                query.conditions.iter().all(|c| {
                    row.get(c.column())
                        .is_some_and(|v| loose_eq(v, &c.value))
                })
            })
            .collect();
        if !query.order.is_empty() {
            matched.sort_by(|a, b| {
                query
                    .order
                    .iter()
                    .map(|(field, dir)| {
                        let col = field.rsplit_once('.').map_or(field.as_str(), |(_, c)| c);
                        let ord = compare(a.get(col), b.get(col));
                        match dir {
                            SortOrder::Asc => ord,
                            SortOrder::Desc => ord.reverse(),
                        }
                    })
                    .find(|o| *o != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }
        let offset = usize::try_from(query.offset.unwrap_or(0)).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX));
        Ok(matched
            .into_iter()
            .skip(offset)
            .take(limit)
            .map(|row| Entity::hydrate(row.clone(), self.resource.hidden.clone()))
            .collect())
    }

    async fn save(&self, entity: &mut Entity) -> Result<bool, ApiError> {
        if entity.has_errors() {
            return Ok(false);
        }
        let mut rows = self.write();
        if entity.is_new() {
            let mut row = entity.fields().clone();
            self.apply_defaults(&mut row, &rows);
            let key = self.key_of(&row);
            if rows.iter().any(|r| Self::same_key(&self.key_of(r), &key)) {
                let field = self.resource.primary_key.first().cloned().unwrap_or_default();
                entity.add_error(field, DUPLICATE_KEY_MESSAGE);
                return Ok(false);
            }
            rows.push(row.clone());
            tracing::debug!(table = %self.resource.table_name, "inserted row");
            entity.mark_persisted(row);
            return Ok(true);
        }
        let key = entity.extract(&self.resource.primary_key);
        let Some(stored) = rows.iter_mut().find(|r| Self::same_key(&self.key_of(r), &key)) else {
            return Err(self.not_found(&key));
        };
        for field in entity.dirty_fields() {
            if let Some(v) = entity.get(field) {
                stored.insert(field.to_string(), v.clone());
            }
        }
        let snapshot = stored.clone();
        tracing::debug!(table = %self.resource.table_name, "updated row");
        entity.mark_persisted(snapshot);
        Ok(true)
    }

    async fn delete(&self, entity: &Entity) -> Result<bool, ApiError> {
        let key = entity.extract(&self.resource.primary_key);
        let mut rows = self.write();
        let before = rows.len();
        rows.retain(|r| !Self::same_key(&self.key_of(r), &key));
        Ok(rows.len() < before)
    }
}

/// Equality that treats `1` and `"1"` as the same key value.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        (Value::Number(n), Value::String(s)) | (Value::String(s), Value::Number(n)) => {
            s.trim().parse::<f64>().ok() == n.as_f64()
        }
        _ => a == b,
    }
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (None | Some(Value::Null), None | Some(Value::Null)) => Ordering::Equal,
        (None | Some(Value::Null), _) => Ordering::Less,
        (_, None | Some(Value::Null)) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ColumnDef, FieldValidator, ValidationRule};
    use serde_json::json;

    fn articles() -> MemoryTable {
        let resource = ResolvedResource::new("articles", &["id"])
            .columns(vec![
                ColumnDef::new("id", ColumnType::Integer).not_null(),
                ColumnDef::new("title", ColumnType::String),
                {
                    let mut c = ColumnDef::new("status", ColumnType::String);
                    c.default = Some(json!("draft"));
                    c
                },
            ])
            .validate(
                FieldValidator::new("title")
                    .require_presence()
                    .rule(ValidationRule::named("maxLength", "maxLength").param(json!(5))),
            );
        MemoryTable::new(resource).with_rows(vec![
            json!({"id": 1, "title": "one", "status": "published"}),
            json!({"id": 2, "title": "two", "status": "draft"}),
        ])
    }

    fn data(v: Value) -> Map<String, Value> {
        v.as_object().cloned().unwrap_or_default()
    }

    #[tokio::test]
    async fn finds_with_conditions_and_paging() {
        let table = articles();
        let q = table.query().where_eq("Articles.status", json!("draft"));
        let found = table.find(&q).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].get("id"), Some(&json!(2)));

        let q = table.query().order_by("id", SortOrder::Desc).limit(1);
        let found = table.find(&q).await.unwrap();
        assert_eq!(found[0].get("id"), Some(&json!(2)));

        let q = table.query().offset(1);
        assert_eq!(table.find(&q).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_matches_string_keys_against_numbers() {
        let table = articles();
        let entity = table.get(&[json!("1")]).await.unwrap();
        assert_eq!(entity.get("title"), Some(&json!("one")));
        assert!(!entity.is_new());
    }

    #[tokio::test]
    async fn get_reports_missing_rows_and_bad_arity() {
        let table = articles();
        let err = table.get(&[json!(99)]).await.unwrap_err();
        assert_eq!(err.message(), "Record not found in table \"articles\" with primary key [99]");
        let err = table.get(&[json!(1), json!("x")]).await.unwrap_err();
        assert_eq!(err.message(), "Record not found in table \"articles\" with primary key [1, 'x']");
    }

    #[tokio::test]
    async fn insert_assigns_id_and_defaults() {
        let table = articles();
        let mut entity = table.patch_entity(table.new_entity(), &data(json!({"title": "three", "bogus": 1})));
        assert!(table.save(&mut entity).await.unwrap());
        assert_eq!(entity.get("id"), Some(&json!(3)));
        assert_eq!(entity.get("status"), Some(&json!("draft")));
        assert!(!entity.has("bogus"));
        assert!(!entity.is_new());
        assert_eq!(table.rows().len(), 3);
    }

    #[tokio::test]
    async fn invalid_entities_are_not_saved() {
        let table = articles();
        let mut entity = table.patch_entity(table.new_entity(), &data(json!({"title": "far too long"})));
        assert!(entity.has_errors());
        assert!(!entity.has("title"));
        assert!(!table.save(&mut entity).await.unwrap());
        assert_eq!(table.rows().len(), 2);
    }

    #[tokio::test]
    async fn duplicate_keys_are_rejected() {
        let table = articles();
        let mut entity = table.patch_entity(table.new_entity(), &data(json!({"id": 1, "title": "dup"})));
        assert!(!table.save(&mut entity).await.unwrap());
        assert_eq!(entity.errors().get("id").unwrap(), [DUPLICATE_KEY_MESSAGE]);
    }

    #[tokio::test]
    async fn update_keeps_primary_key() {
        let table = articles();
        let entity = table.get(&[json!(1)]).await.unwrap();
        let mut entity = table.patch_entity(entity, &data(json!({"id": 50, "title": "uno"})));
        assert!(table.save(&mut entity).await.unwrap());
        assert_eq!(entity.get("id"), Some(&json!(1)));
        assert_eq!(table.get(&[json!(1)]).await.unwrap().get("title"), Some(&json!("uno")));
    }

    #[tokio::test]
    async fn delete_reports_whether_a_row_went_away() {
        let table = articles();
        let entity = table.get(&[json!(2)]).await.unwrap();
        assert!(table.delete(&entity).await.unwrap());
        assert!(!table.delete(&entity).await.unwrap());
    }
}
