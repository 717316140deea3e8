//! Resource routes. Every verb is routed to the handlers; the service decides what is allowed.

use crate::handlers::resource::{collection, member, nested_collection, nested_member};
use crate::state::AppState;
use axum::{routing::any, Router};
use tower_http::limit::RequestBodyLimitLayer;

pub fn resource_routes(state: AppState) -> Router {
    let limit = state.service.settings().body_limit;
    Router::new()
        .route("/:resource", any(collection))
        .route("/:resource/:id", any(member))
        .route("/:parent/:parent_id/:resource", any(nested_collection))
        .route("/:parent/:parent_id/:resource/:id", any(nested_member))
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}

/// Resource routes mounted under the configured base path, plus the common routes at the root.
pub fn api_router(state: AppState) -> Router {
    let base = state.service.settings().base_path.clone();
    let resources = resource_routes(state);
    let app = Router::new().merge(super::common_routes());
    if base.is_empty() || base == "/" {
        app.merge(resources)
    } else {
        app.nest(&base, resources)
    }
}
