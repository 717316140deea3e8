//! Per-resource extension points. A hook sees the in-flight value and may replace it.

use crate::entity::Entity;
use crate::table::Query;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// `Some` replaces the value, `None` keeps it.
pub type Hook<T> = Arc<dyn Fn(&T) -> Option<T> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HookPoint {
    BeforeQuery,
    BeforeFindOne,
    AfterFind,
    BeforePatch,
    AfterPatch,
}

impl HookPoint {
    pub fn as_str(self) -> &'static str {
        match self {
            HookPoint::BeforeQuery => "before-query",
            HookPoint::BeforeFindOne => "before-find-one",
            HookPoint::AfterFind => "after-find",
            HookPoint::BeforePatch => "before-patch",
            HookPoint::AfterPatch => "after-patch",
        }
    }
}

impl fmt::Display for HookPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered hooks of one resource, grouped by point.
#[derive(Clone, Default)]
pub struct HookRegistry {
    before_query: Vec<Hook<Query>>,
    before_find_one: Vec<Hook<Query>>,
    after_find: Vec<Hook<Vec<Entity>>>,
    before_patch: Vec<Hook<Map<String, Value>>>,
    after_patch: Vec<Hook<Entity>>,
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_before_query<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Query) -> Option<Query> + Send + Sync + 'static,
    {
        self.before_query.push(Arc::new(f));
        self
    }

    pub fn on_before_find_one<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Query) -> Option<Query> + Send + Sync + 'static,
    {
        self.before_find_one.push(Arc::new(f));
        self
    }

    pub fn on_after_find<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Vec<Entity>) -> Option<Vec<Entity>> + Send + Sync + 'static,
    {
        self.after_find.push(Arc::new(f));
        self
    }

    pub fn on_before_patch<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Map<String, Value>) -> Option<Map<String, Value>> + Send + Sync + 'static,
    {
        self.before_patch.push(Arc::new(f));
        self
    }

    pub fn on_after_patch<F>(&mut self, f: F) -> &mut Self
    where
        F: Fn(&Entity) -> Option<Entity> + Send + Sync + 'static,
    {
        self.after_patch.push(Arc::new(f));
        self
    }

    pub fn run_before_query(&self, query: Query) -> Query {
        fold(HookPoint::BeforeQuery, &self.before_query, query)
    }

    pub fn run_before_find_one(&self, query: Query) -> Query {
        fold(HookPoint::BeforeFindOne, &self.before_find_one, query)
    }

    pub fn run_after_find(&self, records: Vec<Entity>) -> Vec<Entity> {
        fold(HookPoint::AfterFind, &self.after_find, records)
    }

    pub fn run_before_patch(&self, data: Map<String, Value>) -> Map<String, Value> {
        fold(HookPoint::BeforePatch, &self.before_patch, data)
    }

    pub fn run_after_patch(&self, entity: Entity) -> Entity {
        fold(HookPoint::AfterPatch, &self.after_patch, entity)
    }

    pub fn len(&self, point: HookPoint) -> usize {
        match point {
            HookPoint::BeforeQuery => self.before_query.len(),
            HookPoint::BeforeFindOne => self.before_find_one.len(),
            HookPoint::AfterFind => self.after_find.len(),
            HookPoint::BeforePatch => self.before_patch.len(),
            HookPoint::AfterPatch => self.after_patch.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.before_query.is_empty()
            && self.before_find_one.is_empty()
            && self.after_find.is_empty()
            && self.before_patch.is_empty()
            && self.after_patch.is_empty()
    }
}

fn fold<T>(point: HookPoint, hooks: &[Hook<T>], initial: T) -> T {
    hooks.iter().enumerate().fold(initial, |value, (i, hook)| match hook(&value) {
        Some(replaced) => {
            tracing::trace!(point = %point, hook = i, "hook replaced value");
            replaced
        }
        None => value,
    })
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HookRegistry")
            .field("before_query", &self.before_query.len())
            .field("before_find_one", &self.before_find_one.len())
            .field("after_find", &self.after_find.len())
            .field("before_patch", &self.before_patch.len())
            .field("after_patch", &self.after_patch.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn hooks_run_in_registration_order() {
        let mut hooks = HookRegistry::new();
        hooks
            .on_before_query(|q| Some(q.clone().limit(5)))
            .on_before_query(|_| None)
            .on_before_query(|q| Some(q.clone().where_eq("Articles.status", json!("published"))));
        let q = hooks.run_before_query(Query::new("Articles"));
        assert_eq!(q.limit, Some(5));
        assert_eq!(q.conditions.len(), 1);
        assert_eq!(hooks.len(HookPoint::BeforeQuery), 3);
    }

    #[test]
    fn empty_registry_keeps_values() {
        let hooks = HookRegistry::default();
        assert!(hooks.is_empty());
        let mut data = Map::new();
        data.insert("title".into(), json!("x"));
        assert_eq!(hooks.run_before_patch(data.clone()), data);
    }

    #[test]
    fn point_names() {
        assert_eq!(HookPoint::BeforeFindOne.to_string(), "before-find-one");
        assert_eq!(HookPoint::AfterPatch.as_str(), "after-patch");
    }
}
