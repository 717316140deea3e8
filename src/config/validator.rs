//! Config validation: referential integrity and API consistency.

use crate::config::{FullConfig, Operation, RelationshipKind};
use crate::error::ConfigError;
use std::collections::HashSet;

/// Default schema id when configs omit schema_id.
pub fn default_schema_id(config: &FullConfig) -> Result<&str, ConfigError> {
    config
        .schemas
        .first()
        .map(|s| s.id.as_str())
        .ok_or_else(|| ConfigError::Validation("at least one schema required".into()))
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let default_sid = default_schema_id(config)?;
    let schema_ids: HashSet<&str> = config.schemas.iter().map(|s| s.id.as_str()).collect();
    let table_ids: HashSet<&str> = config.tables.iter().map(|t| t.id.as_str()).collect();
    let column_ids: HashSet<&str> = config.columns.iter().map(|c| c.id.as_str()).collect();

    for t in &config.tables {
        let sid = t.schema_id.as_deref().unwrap_or(default_sid);
        if !schema_ids.contains(sid) {
            return Err(ConfigError::MissingReference {
                kind: "schema",
                id: sid.to_string(),
            });
        }
        let table_columns: HashSet<&str> = config
            .columns
            .iter()
            .filter(|c| c.table_id == t.id)
            .map(|c| c.name.as_str())
            .collect();
        for pk in t.primary_key.columns() {
            if !table_columns.contains(pk.as_str()) {
                return Err(ConfigError::InvalidPrimaryKey {
                    table_id: t.id.clone(),
                    column: pk,
                });
            }
        }
    }

    for c in &config.columns {
        if !table_ids.contains(c.table_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: c.table_id.clone(),
            });
        }
    }

    for r in &config.relationships {
        if !table_ids.contains(r.from_table_id.as_str())
            || !table_ids.contains(r.to_table_id.as_str())
            || !column_ids.contains(r.from_column_id.as_str())
            || !column_ids.contains(r.to_column_id.as_str())
        {
            return Err(ConfigError::MissingReference {
                kind: "relationship",
                id: r.id.clone(),
            });
        }
        if r.kind == RelationshipKind::BelongsToMany {
            match r.through_table_id.as_deref() {
                Some(through) if table_ids.contains(through) => {}
                Some(through) => {
                    return Err(ConfigError::MissingReference {
                        kind: "table",
                        id: through.to_string(),
                    })
                }
                None => {
                    return Err(ConfigError::Validation(format!(
                        "relationship {} is belongs_to_many but has no through_table_id",
                        r.id
                    )))
                }
            }
        }
    }

    let mut path_segments = HashSet::new();
    for api in &config.api_entities {
        if !table_ids.contains(api.entity_id.as_str()) {
            return Err(ConfigError::MissingReference {
                kind: "table",
                id: api.entity_id.clone(),
            });
        }
        if !path_segments.insert(api.path_segment.as_str()) {
            return Err(ConfigError::DuplicatePathSegment(api.path_segment.clone()));
        }
        for op in &api.operations {
            if Operation::parse(op).is_none() {
                return Err(ConfigError::Validation(format!(
                    "unknown operation '{}' on {}",
                    op, api.path_segment
                )));
            }
        }
        let table_columns: HashSet<&str> = config
            .columns
            .iter()
            .filter(|c| c.table_id == api.entity_id)
            .map(|c| c.name.as_str())
            .collect();
        for col in api.validation.keys().chain(api.sensitive_columns.iter()) {
            if !table_columns.contains(col.as_str()) {
                return Err(ConfigError::MissingReference {
                    kind: "column",
                    id: format!("{}.{}", api.path_segment, col),
                });
            }
        }
    }

    Ok(())
}
