//! Describe document: schema, labels, validators, relations and action links of a resource.

use crate::case::column_label;
use crate::routing::{LinkDescriptor, ReverseRouter, RouteOwner};
use crate::schema::{AssociationKind, ColumnDef, FieldValidator, RuleScope, ValidationRule};
use crate::table::Table;
use axum::http::Method;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

/// Ordered string-keyed entries, serialized as a map.
#[derive(Clone, Debug, PartialEq)]
pub struct Keyed<V>(pub Vec<(String, V)>);

impl<V> Keyed<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }
}

impl<V> Default for Keyed<V> {
    fn default() -> Self {
        Keyed(Vec::new())
    }
}

impl<V: Serialize> Serialize for Keyed<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (k, v) in &self.0 {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct EntityDescription {
    pub hidden: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SchemaDescription {
    pub columns: Keyed<ColumnDef>,
    pub labels: Keyed<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct RuleDescription {
    pub message: Option<String>,
    pub on: Option<RuleScope>,
    /// `None` when the rule or one of its parameters is code.
    pub rule: Option<String>,
    pub params: Option<Vec<Value>>,
    pub last: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescription {
    pub validate_presence: bool,
    pub empty_allowed: bool,
    pub rules: Keyed<RuleDescription>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct Relations {
    #[serde(rename = "BelongsTo")]
    pub belongs_to: Vec<String>,
    #[serde(rename = "HasOne")]
    pub has_one: Vec<String>,
    #[serde(rename = "HasMany")]
    pub has_many: Vec<String>,
    #[serde(rename = "BelongsToMany")]
    pub belongs_to_many: Vec<String>,
}

impl Relations {
    pub fn of_kind(&self, kind: AssociationKind) -> &[String] {
        match kind {
            AssociationKind::BelongsTo => &self.belongs_to,
            AssociationKind::HasOne => &self.has_one,
            AssociationKind::HasMany => &self.has_many,
            AssociationKind::BelongsToMany => &self.belongs_to_many,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DescribeDocument {
    pub entity: EntityDescription,
    pub schema: SchemaDescription,
    pub validators: Keyed<FieldDescription>,
    pub relations: Relations,
    pub actions: Keyed<LinkDescriptor>,
}

impl DescribeDocument {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).expect("describe document is always serializable")
    }
}

pub fn describe(table: &dyn Table, router: &ReverseRouter, owner: &RouteOwner) -> DescribeDocument {
    let entity = table.new_entity();
    let columns = table.schema().columns();
    DescribeDocument {
        entity: EntityDescription {
            hidden: entity.hidden_fields().to_vec(),
        },
        schema: SchemaDescription {
            columns: Keyed(columns.iter().map(|c| (c.name.clone(), c.clone())).collect()),
            labels: Keyed(
                columns
                    .iter()
                    .map(|c| (c.name.clone(), column_label(&c.name)))
                    .collect(),
            ),
        },
        validators: Keyed(
            table
                .validator()
                .iter()
                .map(|f| (f.field.clone(), describe_field(f)))
                .collect(),
        ),
        relations: relations(table),
        actions: action_links(router, owner),
    }
}

fn describe_field(field: &FieldValidator) -> FieldDescription {
    FieldDescription {
        validate_presence: field.presence_required,
        empty_allowed: field.empty_allowed,
        rules: Keyed(
            field
                .rules
                .iter()
                .map(|r| (r.name.clone(), describe_rule(r)))
                .collect(),
        ),
    }
}

fn describe_rule(rule: &ValidationRule) -> RuleDescription {
    let opaque = rule.is_opaque();
    RuleDescription {
        message: rule.message.clone(),
        on: rule.on,
        rule: if opaque { None } else { rule.rule_name().map(str::to_string) },
        params: if opaque { None } else { rule.plain_params() },
        last: rule.last,
    }
}

fn relations(table: &dyn Table) -> Relations {
    let names = |kind: AssociationKind| -> Vec<String> {
        table
            .associations()
            .of_kind(kind)
            .map(|a| a.target_table.clone())
            .collect()
    };
    Relations {
        belongs_to: names(AssociationKind::BelongsTo),
        has_one: names(AssociationKind::HasOne),
        has_many: names(AssociationKind::HasMany),
        belongs_to_many: names(AssociationKind::BelongsToMany),
    }
}

fn action_links(router: &ReverseRouter, owner: &RouteOwner) -> Keyed<LinkDescriptor> {
    let wanted = [
        ("self", "", Method::GET),
        ("add", "", Method::POST),
        ("edit", "{id}", Method::PUT),
        ("delete", "{id}", Method::DELETE),
    ];
    let mut links = Vec::with_capacity(wanted.len());
    for (name, suffix, method) in wanted {
        match router.link(owner, name, suffix, method) {
            Ok(link) => links.push((name.to_string(), link)),
            Err(e) => {
                tracing::warn!(resource = %owner.resource, action = name, error = %e, "omitting unresolvable link")
            }
        }
    }
    Keyed(links)
}
