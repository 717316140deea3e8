//! Resolved resource model: config validated and flattened for runtime use.

use crate::case::camelize;
use crate::schema::{
    Association, AssociationMap, ColumnDef, FieldValidator, TableSchema, ValidationSet,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Operation a resource exposes. Each HTTP verb maps to exactly one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Describe,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Create,
        Operation::Read,
        Operation::Update,
        Operation::Delete,
        Operation::Describe,
    ];

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(Operation::Create),
            "read" => Some(Operation::Read),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            "describe" => Some(Operation::Describe),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedResource {
    /// Path segment the resource is addressed by.
    pub name: String,
    pub schema_name: String,
    pub table_name: String,
    pub alias: String,
    pub primary_key: Vec<String>,
    pub schema: TableSchema,
    pub validator: ValidationSet,
    pub associations: AssociationMap,
    /// Fields stripped from every response.
    pub hidden: Vec<String>,
    pub operations: Vec<Operation>,
}

impl ResolvedResource {
    /// Resource named after its table in the `public` schema, all operations enabled.
    pub fn new(table_name: impl Into<String>, primary_key: &[&str]) -> Self {
        let table_name = table_name.into();
        ResolvedResource {
            name: table_name.clone(),
            schema_name: "public".into(),
            alias: camelize(&table_name),
            table_name,
            primary_key: primary_key.iter().map(|s| (*s).to_string()).collect(),
            schema: TableSchema::default(),
            validator: ValidationSet::default(),
            associations: AssociationMap::default(),
            hidden: Vec::new(),
            operations: Operation::ALL.to_vec(),
        }
    }

    #[must_use]
    pub fn path(mut self, segment: impl Into<String>) -> Self {
        self.name = segment.into();
        self
    }

    #[must_use]
    pub fn columns(mut self, columns: Vec<ColumnDef>) -> Self {
        self.schema = TableSchema::new(columns);
        self
    }

    #[must_use]
    pub fn validate(mut self, validator: FieldValidator) -> Self {
        self.validator.add(validator);
        self
    }

    #[must_use]
    pub fn associate(mut self, association: Association) -> Self {
        self.associations.push(association);
        self
    }

    #[must_use]
    pub fn hide(mut self, field: impl Into<String>) -> Self {
        self.hidden.push(field.into());
        self
    }

    #[must_use]
    pub fn operations(mut self, operations: &[Operation]) -> Self {
        self.operations = operations.to_vec();
        self
    }

    pub fn allows(&self, op: Operation) -> bool {
        self.operations.contains(&op)
    }
}

#[derive(Clone, Debug, Default)]
pub struct ResolvedModel {
    pub resources: Vec<ResolvedResource>,
    pub resource_by_path: HashMap<String, ResolvedResource>,
}

impl ResolvedModel {
    pub fn new(resources: Vec<ResolvedResource>) -> Self {
        let resource_by_path = resources
            .iter()
            .map(|r| (r.name.clone(), r.clone()))
            .collect();
        ResolvedModel {
            resources,
            resource_by_path,
        }
    }

    pub fn resource_by_path(&self, path: &str) -> Option<&ResolvedResource> {
        self.resource_by_path.get(path)
    }
}
