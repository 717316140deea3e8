//! Entity: one record of a resource with its transient validation state.

use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Field name -> ordered validation messages.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ErrorBag(BTreeMap<String, Vec<String>>);

impl ErrorBag {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn merge(&mut self, other: ErrorBag) {
        for (field, messages) in other.0 {
            self.0.entry(field).or_default().extend(messages);
        }
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    pub fn to_value(&self) -> Value {
        serde_json::to_value(&self.0).expect("error bag is always serializable")
    }
}

#[derive(Clone, Debug, Default)]
pub struct Entity {
    fields: Map<String, Value>,
    errors: ErrorBag,
    new: bool,
    dirty: BTreeSet<String>,
    hidden: Vec<String>,
}

impl Entity {
    /// Empty, unsaved entity.
    pub fn new(hidden: Vec<String>) -> Self {
        Entity {
            new: true,
            hidden,
            ..Default::default()
        }
    }

    /// Entity loaded from storage: not new, nothing dirty.
    pub fn hydrate(fields: Map<String, Value>, hidden: Vec<String>) -> Self {
        Entity {
            fields,
            new: false,
            hidden,
            ..Default::default()
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn set(&mut self, field: impl Into<String>, value: Value) {
        let field = field.into();
        self.dirty.insert(field.clone());
        self.fields.insert(field, value);
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Values of `keys` in order; missing fields are `Null`.
    pub fn extract(&self, keys: &[String]) -> Vec<Value> {
        keys.iter()
            .map(|k| self.fields.get(k).cloned().unwrap_or(Value::Null))
            .collect()
    }

    pub fn is_new(&self) -> bool {
        self.new
    }

    pub fn set_new(&mut self, new: bool) {
        self.new = new;
    }

    pub fn is_dirty(&self, field: &str) -> bool {
        self.dirty.contains(field)
    }

    pub fn dirty_fields(&self) -> impl Iterator<Item = &str> {
        self.dirty.iter().map(String::as_str)
    }

    /// Marks the entity as persisted with the given stored values.
    pub fn mark_persisted(&mut self, stored: Map<String, Value>) {
        for (k, v) in stored {
            self.fields.insert(k, v);
        }
        self.dirty.clear();
        self.new = false;
    }

    pub fn errors(&self) -> &ErrorBag {
        &self.errors
    }

    pub fn set_errors(&mut self, errors: ErrorBag) {
        self.errors = errors;
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.add(field, message);
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn hidden_fields(&self) -> &[String] {
        &self.hidden
    }

    /// Visible fields as a JSON object (hidden fields removed).
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .filter(|(k, _)| !self.hidden.iter().any(|h| h == *k))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let visible: Vec<_> = self
            .fields
            .iter()
            .filter(|(k, _)| !self.hidden.iter().any(|h| h == *k))
            .collect();
        let mut map = serializer.serialize_map(Some(visible.len()))?;
        for (k, v) in visible {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
