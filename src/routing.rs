//! Reverse routing: resource + verb to a URL path.

use crate::config::{Operation, ResolvedModel};
use crate::error::ApiError;
use axum::http::Method;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct LinkDescriptor {
    pub name: String,
    pub method: String,
    pub href: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParentRoute {
    pub resource: String,
    pub id: String,
}

/// What a route is resolved for: a resource, optionally nested under a parent record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RouteOwner {
    pub resource: String,
    pub parent: Option<ParentRoute>,
}

impl RouteOwner {
    pub fn new(resource: impl Into<String>) -> Self {
        RouteOwner {
            resource: resource.into(),
            parent: None,
        }
    }

    #[must_use]
    pub fn nested(mut self, parent: impl Into<String>, id: impl Into<String>) -> Self {
        self.parent = Some(ParentRoute {
            resource: parent.into(),
            id: id.into(),
        });
        self
    }
}

pub trait RouteResolver: Send + Sync {
    /// Path for `method` on `owner`, with `suffix` appended as further segments.
    fn resolve(&self, owner: &RouteOwner, method: &Method, suffix: &str) -> Result<String, ApiError>;
}

impl fmt::Debug for dyn RouteResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RouteResolver")
    }
}

/// Operation an HTTP verb invokes on a resource.
pub fn operation_for(method: &Method) -> Option<Operation> {
    if method == Method::GET || method == Method::HEAD {
        Some(Operation::Read)
    } else if method == Method::POST {
        Some(Operation::Create)
    } else if method == Method::PUT || method == Method::PATCH {
        Some(Operation::Update)
    } else if method == Method::DELETE {
        Some(Operation::Delete)
    } else if method == Method::OPTIONS {
        Some(Operation::Describe)
    } else {
        None
    }
}

/// Route table of the resolved model, mounted under `base_path`.
#[derive(Clone, Debug, Default)]
pub struct RouteTable {
    base_path: String,
    routes: HashMap<String, Vec<Operation>>,
}

impl RouteTable {
    pub fn new(base_path: impl Into<String>) -> Self {
        RouteTable {
            base_path: base_path.into().trim_end_matches('/').to_string(),
            routes: HashMap::new(),
        }
    }

    pub fn from_model(base_path: impl Into<String>, model: &ResolvedModel) -> Self {
        let mut table = RouteTable::new(base_path);
        for r in &model.resources {
            table.add(r.name.clone(), r.operations.clone());
        }
        table
    }

    pub fn add(&mut self, resource: impl Into<String>, operations: Vec<Operation>) {
        self.routes.insert(resource.into(), operations);
    }

    pub fn base_path(&self) -> &str {
        &self.base_path
    }
}

impl RouteResolver for RouteTable {
    fn resolve(&self, owner: &RouteOwner, method: &Method, suffix: &str) -> Result<String, ApiError> {
        let unresolved = || ApiError::RouteResolution {
            resource: owner.resource.clone(),
            method: method.to_string(),
        };
        let ops = self.routes.get(&owner.resource).ok_or_else(unresolved)?;
        let op = operation_for(method).ok_or_else(unresolved)?;
        if !ops.contains(&op) {
            return Err(unresolved());
        }
        let mut path = self.base_path.clone();
        if let Some(parent) = &owner.parent {
            if !self.routes.contains_key(&parent.resource) {
                return Err(unresolved());
            }
            path.push('/');
            path.push_str(&parent.resource);
            path.push('/');
            path.push_str(&parent.id);
        }
        path.push('/');
        path.push_str(&owner.resource);
        let suffix = suffix.trim_matches('/');
        if !suffix.is_empty() {
            path.push('/');
            path.push_str(suffix);
        }
        Ok(path)
    }
}

/// Builds links through a resolver.
#[derive(Clone)]
pub struct ReverseRouter {
    resolver: Arc<dyn RouteResolver>,
}

impl ReverseRouter {
    pub fn new(resolver: Arc<dyn RouteResolver>) -> Self {
        ReverseRouter { resolver }
    }

    pub fn index_path(&self, owner: &RouteOwner) -> Result<String, ApiError> {
        self.resolver.resolve(owner, &Method::GET, "")
    }

    pub fn link(
        &self,
        owner: &RouteOwner,
        name: &str,
        suffix: &str,
        method: Method,
    ) -> Result<LinkDescriptor, ApiError> {
        let href = self.resolver.resolve(owner, &method, suffix)?;
        Ok(LinkDescriptor {
            name: name.to_string(),
            method: method.to_string(),
            href,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> RouteTable {
        let mut t = RouteTable::new("/api/");
        t.add("articles", Operation::ALL.to_vec());
        t.add("authors", vec![Operation::Read]);
        t
    }

    #[test]
    fn resolves_plain_and_nested_paths() {
        let t = table();
        let owner = RouteOwner::new("articles");
        assert_eq!(t.resolve(&owner, &Method::GET, "").unwrap(), "/api/articles");
        assert_eq!(t.resolve(&owner, &Method::PUT, "{id}").unwrap(), "/api/articles/{id}");
        let nested = RouteOwner::new("articles").nested("authors", "7");
        assert_eq!(t.resolve(&nested, &Method::POST, "").unwrap(), "/api/authors/7/articles");
    }

    #[test]
    fn unknown_resource_or_verb_fails() {
        let t = table();
        assert!(matches!(
            t.resolve(&RouteOwner::new("tags"), &Method::GET, ""),
            Err(ApiError::RouteResolution { .. })
        ));
        assert!(matches!(
            t.resolve(&RouteOwner::new("authors"), &Method::DELETE, "{id}"),
            Err(ApiError::RouteResolution { .. })
        ));
    }

    #[test]
    fn router_builds_links() {
        let router = ReverseRouter::new(Arc::new(table()));
        let owner = RouteOwner::new("articles");
        let link = router.link(&owner, "delete", "{id}", Method::DELETE).unwrap();
        assert_eq!(
            link,
            LinkDescriptor {
                name: "delete".into(),
                method: "DELETE".into(),
                href: "/api/articles/{id}".into(),
            }
        );
        assert_eq!(router.index_path(&owner).unwrap(), "/api/articles");
    }
}
