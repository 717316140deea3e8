//! Resource SDK: generic REST resources over pluggable tables, with describe and
//! content-negotiated rendering.

pub mod action;
pub mod case;
pub mod config;
pub mod entity;
pub mod error;
pub mod handlers;
pub mod hooks;
pub mod renderer;
pub mod response;
pub mod routes;
pub mod routing;
pub mod schema;
pub mod service;
pub mod sql;
pub mod state;
pub mod table;

pub use action::{ActionConfig, ActionKind, CrudAction, DescribeDocument, TableRef};
pub use config::{load_from_dir, resolve, FullConfig, ResolvedModel, ResolvedResource, Settings};
pub use entity::{Entity, ErrorBag};
pub use error::{ApiError, ConfigError};
pub use hooks::{HookPoint, HookRegistry};
pub use renderer::{JsonRenderer, Renderer, RendererRegistry, XmlRenderer};
pub use response::{ActionResult, HttpResponse, ResponseSink};
pub use routes::{api_router, common_routes, resource_routes};
pub use routing::{LinkDescriptor, ReverseRouter, RouteOwner, RouteResolver, RouteTable};
pub use service::{ApiRequest, Service};
pub use state::AppState;
pub use table::{MemoryTable, PgTable, Query, Table, TableRegistry};
