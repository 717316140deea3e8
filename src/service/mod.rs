//! Service: owns tables, hooks, routes and renderers, and turns requests into rendered responses.

use crate::action::{ActionConfig, ActionKind, CrudAction, TableRef};
use crate::config::{Operation, ResolvedModel, ResolvedResource, Settings};
use crate::error::ApiError;
use crate::hooks::HookRegistry;
use crate::renderer::{Renderer, RendererRegistry};
use crate::response::{ActionResult, ResponseSink};
use crate::routing::{RouteResolver, RouteTable};
use crate::schema::AssociationKind;
use crate::table::{MemoryTable, PgTable, Table, TableRegistry};
use axum::http::Method;
use serde_json::{Map, Value};
use sqlx::PgPool;
use std::collections::HashMap;
use std::sync::Arc;

/// One API call, already split out of the transport request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub method: Method,
    /// Path segment of the addressed resource.
    pub resource: String,
    pub id: Option<String>,
    /// Parent path segment and parent id for nested routes.
    pub parent: Option<(String, String)>,
    pub describe: bool,
    pub body: Option<Value>,
    pub accept: Option<String>,
    /// Format suffix of the last path segment (`xml`, `json`).
    pub extension: Option<String>,
}

impl ApiRequest {
    pub fn new(method: Method, resource: impl Into<String>) -> Self {
        ApiRequest {
            method,
            resource: resource.into(),
            id: None,
            parent: None,
            describe: false,
            body: None,
            accept: None,
            extension: None,
        }
    }

    #[must_use]
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    #[must_use]
    pub fn parent(mut self, resource: impl Into<String>, id: impl Into<String>) -> Self {
        self.parent = Some((resource.into(), id.into()));
        self
    }

    #[must_use]
    pub fn describe(mut self) -> Self {
        self.describe = true;
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn accept(mut self, accept: impl Into<String>) -> Self {
        self.accept = Some(accept.into());
        self
    }

    #[must_use]
    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = Some(ext.into());
        self
    }
}

#[derive(Debug)]
pub struct Service {
    model: ResolvedModel,
    tables: TableRegistry,
    routes: Arc<dyn RouteResolver>,
    renderers: RendererRegistry,
    hooks: HashMap<String, HookRegistry>,
    settings: Settings,
}

impl Service {
    pub fn new(model: ResolvedModel, tables: TableRegistry, settings: Settings) -> Self {
        let mut renderers = RendererRegistry::new(settings.debug);
        if !renderers.set_default(&settings.renderer) {
            tracing::warn!(renderer = %settings.renderer, "unknown default renderer, using json");
        }
        Service {
            routes: Arc::new(RouteTable::from_model(settings.base_path.clone(), &model)),
            model,
            tables,
            renderers,
            hooks: HashMap::new(),
            settings,
        }
    }

    /// Every resource backed by an empty `MemoryTable`.
    pub fn in_memory(model: ResolvedModel, settings: Settings) -> Self {
        let tables = Self::registry(&model, |r| Arc::new(MemoryTable::new(r.clone())));
        Service::new(model, tables, settings)
    }

    /// Every resource backed by a `PgTable` on the shared pool.
    pub fn with_postgres(pool: PgPool, model: ResolvedModel, settings: Settings) -> Self {
        let tables = Self::registry(&model, |r| Arc::new(PgTable::new(pool.clone(), r.clone())));
        Service::new(model, tables, settings)
    }

    fn registry<F>(model: &ResolvedModel, make: F) -> TableRegistry
    where
        F: Fn(&ResolvedResource) -> Arc<dyn Table>,
    {
        let mut tables = TableRegistry::new();
        for r in &model.resources {
            tables.register(r.name.clone(), make(r));
        }
        tables
    }

    #[must_use]
    pub fn with_routes(mut self, routes: Arc<dyn RouteResolver>) -> Self {
        self.routes = routes;
        self
    }

    /// Replace (or add) the table behind a resource name.
    pub fn register_table(&mut self, name: impl Into<String>, table: Arc<dyn Table>) {
        self.tables.register(name, table);
    }

    pub fn hooks_mut(&mut self, resource: &str) -> &mut HookRegistry {
        self.hooks.entry(resource.to_string()).or_default()
    }

    /// Copy of the hooks registered for a resource.
    pub fn hooks_for(&self, resource: &str) -> HookRegistry {
        self.hooks.get(resource).cloned().unwrap_or_default()
    }

    pub fn table(&self, name: &str) -> Option<Arc<dyn Table>> {
        self.tables.get(name)
    }

    pub fn default_table(&self) -> Option<Arc<dyn Table>> {
        self.settings
            .default_resource
            .as_deref()
            .and_then(|name| self.tables.get(name))
    }

    pub fn resource(&self, name: &str) -> Option<&ResolvedResource> {
        self.model.resource_by_path(name)
    }

    pub fn model(&self) -> &ResolvedModel {
        &self.model
    }

    pub fn routes(&self) -> Arc<dyn RouteResolver> {
        self.routes.clone()
    }

    pub fn renderers(&self) -> &RendererRegistry {
        &self.renderers
    }

    pub fn renderers_mut(&mut self) -> &mut RendererRegistry {
        &mut self.renderers
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Run the action a request addresses.
    pub async fn dispatch(&self, req: &ApiRequest) -> Result<ActionResult, ApiError> {
        let resource = self
            .resource(&req.resource)
            .ok_or_else(|| ApiError::NotFound(format!("resource '{}'", req.resource)))?;
        let kind = action_kind(req)?;
        let operation = match kind {
            ActionKind::Index | ActionKind::View => Operation::Read,
            ActionKind::Add => Operation::Create,
            ActionKind::Edit => Operation::Update,
            ActionKind::Delete => Operation::Delete,
            ActionKind::Describe => Operation::Describe,
        };
        if !resource.allows(operation) {
            return Err(ApiError::MethodNotAllowed(format!(
                "{} on {}",
                req.method, resource.name
            )));
        }
        let data = match (kind, &req.body) {
            (ActionKind::Add | ActionKind::Edit, Some(Value::Object(map))) => Some(map.clone()),
            (ActionKind::Add | ActionKind::Edit, None) => Some(Map::new()),
            (ActionKind::Add | ActionKind::Edit, Some(_)) => {
                return Err(ApiError::BadRequest("body must be a JSON object".into()))
            }
            _ => None,
        };

        let mut config = ActionConfig::new(resource.name.clone())
            .table(TableRef::Name(resource.name.clone()));
        if let Some(id) = &req.id {
            config = config.id(id.clone());
        }
        if let Some((parent, parent_id)) = &req.parent {
            let field = self.parent_field(resource, parent)?;
            config = config.parent(parent.clone(), parent_id.clone(), field);
        }
        tracing::debug!(method = %req.method, resource = %resource.name, action = %kind, "dispatch");
        CrudAction::new(self, config)?.execute(kind, data).await
    }

    /// Foreign key on `resource` that points at the parent resource's table.
    fn parent_field(&self, resource: &ResolvedResource, parent: &str) -> Result<String, ApiError> {
        let parent_resource = self
            .resource(parent)
            .ok_or_else(|| ApiError::NotFound(format!("resource '{}'", parent)))?;
        resource
            .associations
            .of_kind(AssociationKind::BelongsTo)
            .find(|a| a.target_table == parent_resource.table_name)
            .and_then(|a| a.foreign_key.clone())
            .ok_or_else(|| {
                ApiError::NotFound(format!("{} is not nested under {}", resource.name, parent))
            })
    }

    /// Dispatch and render into `out` with the negotiated renderer.
    pub async fn handle<S>(&self, req: &ApiRequest, out: &mut S)
    where
        S: ResponseSink + Send,
    {
        let renderer = self
            .renderers
            .negotiate(req.accept.as_deref(), req.extension.as_deref());
        match self.dispatch(req).await {
            Ok(result) => renderer.respond(&result, out),
            Err(e) => {
                if e.code() >= 500 {
                    tracing::error!(resource = %req.resource, error = %e, "request failed");
                } else {
                    tracing::debug!(resource = %req.resource, error = %e, "request rejected");
                }
                renderer.respond_error(&e, out);
            }
        }
    }

    pub fn renderer_for(&self, req: &ApiRequest) -> Arc<dyn Renderer> {
        self.renderers
            .negotiate(req.accept.as_deref(), req.extension.as_deref())
    }
}

fn action_kind(req: &ApiRequest) -> Result<ActionKind, ApiError> {
    // HEAD is answered like GET; axum drops the body
    let m = if req.method == Method::HEAD {
        Method::GET
    } else {
        req.method.clone()
    };
    if req.describe || m == Method::OPTIONS {
        if m == Method::GET || m == Method::OPTIONS {
            return Ok(ActionKind::Describe);
        }
    } else if req.id.is_none() {
        if m == Method::GET {
            return Ok(ActionKind::Index);
        }
        if m == Method::POST {
            return Ok(ActionKind::Add);
        }
    } else if m == Method::GET {
        return Ok(ActionKind::View);
    } else if m == Method::PUT || m == Method::PATCH {
        return Ok(ActionKind::Edit);
    } else if m == Method::DELETE {
        return Ok(ActionKind::Delete);
    }
    Err(ApiError::MethodNotAllowed(format!("{} on {}", req.method, req.resource)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::HttpResponse;
    use crate::schema::{ColumnDef, ColumnType};
    use serde_json::json;

    fn service() -> Service {
        let model = ResolvedModel::new(vec![
            ResolvedResource::new("notes", &["id"])
                .columns(vec![
                    ColumnDef::new("id", ColumnType::Integer),
                    ColumnDef::new("body", ColumnType::Text),
                ])
                .operations(&[Operation::Read, Operation::Create]),
        ]);
        Service::in_memory(model, Settings::default())
    }

    #[test]
    fn maps_methods_to_actions() {
        let get = ApiRequest::new(Method::GET, "notes");
        assert_eq!(action_kind(&get).unwrap(), ActionKind::Index);
        assert_eq!(action_kind(&get.clone().id("1")).unwrap(), ActionKind::View);
        assert_eq!(action_kind(&get.clone().describe()).unwrap(), ActionKind::Describe);
        assert_eq!(action_kind(&ApiRequest::new(Method::OPTIONS, "notes")).unwrap(), ActionKind::Describe);
        assert_eq!(action_kind(&ApiRequest::new(Method::PATCH, "notes").id("1")).unwrap(), ActionKind::Edit);
        assert!(action_kind(&ApiRequest::new(Method::DELETE, "notes")).is_err());
        assert_eq!(action_kind(&ApiRequest::new(Method::HEAD, "notes").id("1")).unwrap(), ActionKind::View);
        assert_eq!(action_kind(&ApiRequest::new(Method::HEAD, "notes")).unwrap(), ActionKind::Index);
    }

    #[tokio::test]
    async fn rejects_operations_the_resource_does_not_allow() {
        let svc = service();
        let err = svc
            .dispatch(&ApiRequest::new(Method::DELETE, "notes").id("1"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 405);
        let err = svc.dispatch(&ApiRequest::new(Method::GET, "nope")).await.unwrap_err();
        assert_eq!(err.code(), 404);
    }

    #[tokio::test]
    async fn rejects_non_object_bodies() {
        let svc = service();
        let err = svc
            .dispatch(&ApiRequest::new(Method::POST, "notes").body(json!([1])))
            .await
            .unwrap_err();
        assert_eq!(err.code(), 400);
    }

    #[tokio::test]
    async fn handle_renders_with_negotiated_renderer() {
        let svc = service();
        let mut out = HttpResponse::default();
        svc.handle(
            &ApiRequest::new(Method::POST, "notes").body(json!({"body": "hi"})).extension("xml"),
            &mut out,
        )
        .await;
        assert_eq!(out.status, 201);
        assert_eq!(out.content_type.as_deref(), Some("application/xml"));
        assert_eq!(
            out.body,
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<data><body>hi</body><id>1</id></data>\n"
        );
    }
}
