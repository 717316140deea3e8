//! Load config from JSON documents and resolve it into the runtime resource model.

use crate::case::camelize;
use crate::config::resolved::{Operation, ResolvedModel, ResolvedResource};
use crate::config::types::*;
use crate::config::{default_schema_id, validate, FullConfig};
use crate::error::ConfigError;
use crate::schema::{
    Association, AssociationKind, AssociationMap, ColumnDef, ColumnType, FieldValidator,
    RuleScope, TableSchema, ValidationRule, ValidationSet,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::path::Path;

/// Build resolved model from full config (validates first).
pub fn resolve(config: &FullConfig) -> Result<ResolvedModel, ConfigError> {
    validate(config)?;
    let default_sid = default_schema_id(config)?;

    let schemas_by_id: HashMap<_, _> = config.schemas.iter().map(|s| (s.id.as_str(), s)).collect();
    let tables_by_id: HashMap<_, _> = config.tables.iter().map(|t| (t.id.as_str(), t)).collect();
    let columns_by_table: HashMap<_, Vec<&ColumnConfig>> = config
        .columns
        .iter()
        .fold(HashMap::new(), |mut m, c| {
            m.entry(c.table_id.as_str()).or_default().push(c);
            m
        });
    let column_id_to_name: HashMap<&str, &str> = config.columns.iter().map(|c| (c.id.as_str(), c.name.as_str())).collect();
    let table_id_to_path: HashMap<&str, &str> = config
        .api_entities
        .iter()
        .map(|api| (api.entity_id.as_str(), api.path_segment.as_str()))
        .collect();
    let lookup = TableLookup {
        tables_by_id: &tables_by_id,
        column_id_to_name: &column_id_to_name,
        table_id_to_path: &table_id_to_path,
    };

    let mut resources = Vec::new();
    for api in &config.api_entities {
        let table = tables_by_id
            .get(api.entity_id.as_str())
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            })?;
        let table_sid = table.schema_id.as_deref().unwrap_or(default_sid);
        let schema = schemas_by_id
            .get(table_sid)
            .ok_or_else(|| ConfigError::MissingReference {
                kind: "schema",
                id: table_sid.to_string(),
            })?;
        let table_columns = columns_by_table
            .get(table.id.as_str())
            .map(|v| v.as_slice())
            .unwrap_or(&[]);

        let operations = api
            .operations
            .iter()
            .filter_map(|o| Operation::parse(o))
            .collect();

        resources.push(ResolvedResource {
            name: api.path_segment.clone(),
            schema_name: schema.name.clone(),
            table_name: table.name.clone(),
            alias: table.alias.clone().unwrap_or_else(|| camelize(&table.name)),
            primary_key: table.primary_key.columns(),
            schema: TableSchema::new(table_columns.iter().map(|c| column_def(c)).collect()),
            validator: compile_validation(&api.path_segment, &api.validation)?,
            associations: build_associations_for_table(&table.id, &config.relationships, &lookup),
            hidden: api.sensitive_columns.clone(),
            operations,
        });
    }

    tracing::debug!(resources = resources.len(), "resolved resource model");
    Ok(ResolvedModel::new(resources))
}

struct TableLookup<'a> {
    tables_by_id: &'a HashMap<&'a str, &'a TableConfig>,
    column_id_to_name: &'a HashMap<&'a str, &'a str>,
    table_id_to_path: &'a HashMap<&'a str, &'a str>,
}

impl TableLookup<'_> {
    fn association(&self, kind: AssociationKind, table_id: &str, foreign_key: Option<&str>, through: Option<&str>) -> Option<Association> {
        let table = self.tables_by_id.get(table_id)?;
        let name = self
            .table_id_to_path
            .get(table_id)
            .map_or_else(|| table.name.clone(), |p| (*p).to_string());
        Some(Association {
            kind,
            name,
            target_table: table.name.clone(),
            foreign_key: foreign_key
                .and_then(|id| self.column_id_to_name.get(id))
                .map(|s| (*s).to_string()),
            through: through
                .and_then(|id| self.tables_by_id.get(id))
                .map(|t| t.name.clone()),
        })
    }
}

fn build_associations_for_table(
    our_table_id: &str,
    relationships: &[RelationshipConfig],
    lookup: &TableLookup<'_>,
) -> AssociationMap {
    let mut out = AssociationMap::default();
    for rel in relationships {
        let fk = Some(rel.from_column_id.as_str());
        let through = rel.through_table_id.as_deref();
        let found = match rel.kind {
            RelationshipKind::BelongsTo | RelationshipKind::HasOne if rel.from_table_id == our_table_id => {
                lookup.association(AssociationKind::BelongsTo, &rel.to_table_id, fk, None)
            }
            RelationshipKind::BelongsTo if rel.to_table_id == our_table_id => {
                lookup.association(AssociationKind::HasMany, &rel.from_table_id, fk, None)
            }
            RelationshipKind::HasOne if rel.to_table_id == our_table_id => {
                lookup.association(AssociationKind::HasOne, &rel.from_table_id, fk, None)
            }
            RelationshipKind::BelongsToMany if rel.from_table_id == our_table_id => {
                lookup.association(AssociationKind::BelongsToMany, &rel.to_table_id, fk, through)
            }
            RelationshipKind::BelongsToMany if rel.to_table_id == our_table_id => {
                let their_fk = Some(rel.to_column_id.as_str());
                lookup.association(AssociationKind::BelongsToMany, &rel.from_table_id, their_fk, through)
            }
            _ => None,
        };
        if let Some(association) = found {
            out.push(association);
        }
    }
    out
}

fn column_def(c: &ColumnConfig) -> ColumnDef {
    let mut col = ColumnDef::new(c.name.clone(), ColumnType::from_db_type(c.type_.name()));
    let params = c.type_.params();
    match col.kind {
        ColumnType::Decimal => {
            col.precision = params.first().copied();
            col.length = params.get(1).copied();
        }
        _ => col.length = params.first().copied(),
    }
    col.null = c.nullable;
    col.comment = c.comment.clone();
    col.db_type = Some(c.type_.name().to_string());
    match &c.default {
        Some(ColumnDefaultConfig::Literal(v)) => col.default = Some(v.clone()),
        Some(ColumnDefaultConfig::Expression { expression }) => {
            col.default = Some(Value::String(expression.clone()));
            col.generated = true;
        }
        None => {}
    }
    // serial columns are filled by the database
    if c.type_.name().to_lowercase().contains("serial") {
        col.generated = true;
    }
    col
}

/// Turn per-column validation config into ordered field validators.
fn compile_validation(
    resource: &str,
    config: &serde_json::Map<String, Value>,
) -> Result<ValidationSet, ConfigError> {
    let mut set = ValidationSet::default();
    for (column, raw) in config {
        let rule: ValidationConfig = serde_json::from_value(raw.clone())
            .map_err(|e| ConfigError::Validation(format!("{}.{}: {}", resource, column, e)))?;
        let mut field = FieldValidator::new(column.clone());
        if rule.required == Some(true) {
            field = field.require_presence().not_empty();
        }
        if let Some(format) = &rule.format {
            match format.to_lowercase().as_str() {
                "email" => field = field.rule(ValidationRule::named("email", "email").message(format!("{} must be a valid email", column))),
                "uuid" => field = field.rule(ValidationRule::named("uuid", "uuid").message(format!("{} must be a valid UUID", column))),
                other => tracing::warn!(column = %column, format = %other, "unknown validation format ignored"),
            }
        }
        if let Some(max) = rule.max_length {
            field = field.rule(
                ValidationRule::named("maxLength", "maxLength")
                    .param(json!(max))
                    .message(format!("{} must be at most {} characters", column, max)),
            );
        }
        if let Some(min) = rule.min_length {
            field = field.rule(
                ValidationRule::named("minLength", "minLength")
                    .param(json!(min))
                    .message(format!("{} must be at least {} characters", column, min)),
            );
        }
        if let Some(pattern) = &rule.pattern {
            regex::Regex::new(pattern)
                .map_err(|e| ConfigError::Validation(format!("invalid pattern for {}.{}: {}", resource, column, e)))?;
            field = field.rule(
                ValidationRule::named("pattern", "custom")
                    .param(json!(pattern))
                    .message(format!("{} does not match required pattern", column)),
            );
        }
        if let Some(allowed) = &rule.allowed {
            field = field.rule(
                ValidationRule::named("inList", "inList")
                    .param(Value::Array(allowed.clone()))
                    .message(format!("{} must be one of the allowed values", column)),
            );
        }
        if let Some(min) = rule.minimum {
            field = field.rule(
                ValidationRule::named("minimum", "greaterThanOrEqual")
                    .param(json!(min))
                    .message(format!("{} must be at least {}", column, min)),
            );
        }
        if let Some(max) = rule.maximum {
            field = field.rule(
                ValidationRule::named("maximum", "lessThanOrEqual")
                    .param(json!(max))
                    .message(format!("{} must be at most {}", column, max)),
            );
        }
        for explicit in &rule.rules {
            let mut r = ValidationRule::named(
                explicit.name.clone(),
                explicit.rule.clone().unwrap_or_else(|| explicit.name.clone()),
            );
            for p in &explicit.params {
                r = r.param(p.clone());
            }
            if let Some(message) = &explicit.message {
                r = r.message(message.clone());
            }
            if let Some(on) = &explicit.on {
                let scope = RuleScope::parse(on).ok_or_else(|| {
                    ConfigError::Validation(format!("{}.{}: invalid rule scope '{}'", resource, column, on))
                })?;
                r = r.on(scope);
            }
            if explicit.last {
                r = r.last();
            }
            field = field.rule(r);
        }
        set.add(field);
    }
    Ok(set)
}

/// Read `schemas.json`, `tables.json`, `columns.json`, `relationships.json` and
/// `api_entities.json` from a directory. Missing files count as empty lists.
pub async fn load_from_dir(dir: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let dir = dir.as_ref();
    let mut config = FullConfig {
        schemas: read_list(dir, "schemas.json").await?,
        tables: read_list(dir, "tables.json").await?,
        columns: read_list(dir, "columns.json").await?,
        relationships: read_list(dir, "relationships.json").await?,
        api_entities: read_list(dir, "api_entities.json").await?,
    };
    if config.schemas.is_empty() {
        config.schemas = vec![SchemaConfig {
            id: "default".into(),
            name: "public".into(),
            comment: None,
        }];
    }
    Ok(config)
}

async fn read_list<T>(dir: &Path, file: &str) -> Result<Vec<T>, ConfigError>
where
    T: for<'de> serde::Deserialize<'de>,
{
    let path = dir.join(file);
    let text = match tokio::fs::read_to_string(&path).await {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!(path = %path.display(), "config file absent");
            return Ok(Vec::new());
        }
        Err(e) => return Err(ConfigError::Load(format!("{}: {}", path.display(), e))),
    };
    serde_json::from_str(&text).map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))
}
