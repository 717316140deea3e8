//! Resource handlers: turn axum requests into `ApiRequest`s and render through the service.

use crate::error::ApiError;
use crate::response::HttpResponse;
use crate::service::{ApiRequest, Service};
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{header, HeaderMap, Method},
    response::{IntoResponse, Response},
};
use serde_json::Value;

pub const DESCRIBE_SEGMENT: &str = "describe";

/// Split a known format suffix off the last path segment: `articles.xml` -> (`articles`, `xml`).
fn split_extension(service: &Service, segment: &str) -> (String, Option<String>) {
    if let Some((stem, ext)) = segment.rsplit_once('.') {
        if !stem.is_empty() && service.renderers().by_name(ext).is_some() {
            return (stem.to_string(), Some(ext.to_lowercase()));
        }
    }
    (segment.to_string(), None)
}

fn base_request(method: Method, resource: String, headers: &HeaderMap) -> ApiRequest {
    let mut req = ApiRequest::new(method, resource);
    req.accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    req
}

/// Describe is addressed as `GET {resource}/describe`.
fn member_request(service: &Service, method: Method, resource: String, id: &str, headers: &HeaderMap) -> ApiRequest {
    let (id, extension) = split_extension(service, id);
    let mut req = base_request(method, resource, headers);
    req.extension = extension;
    if id == DESCRIBE_SEGMENT && (req.method == Method::GET || req.method == Method::HEAD) {
        req.describe = true;
    } else {
        req.id = Some(id);
    }
    req
}

async fn respond(service: &Service, mut req: ApiRequest, body: Bytes) -> Response {
    if !body.is_empty() {
        match serde_json::from_slice::<Value>(&body) {
            Ok(v) => req.body = Some(v),
            Err(e) => {
                let mut out = HttpResponse::default();
                service
                    .renderer_for(&req)
                    .respond_error(&ApiError::BadRequest(format!("invalid JSON body: {}", e)), &mut out);
                return out.into_response();
            }
        }
    }
    let mut out = HttpResponse::default();
    service.handle(&req, &mut out).await;
    out.into_response()
}

/// `/{resource}`
pub async fn collection(
    State(state): State<AppState>,
    method: Method,
    Path(resource): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let service = state.service.as_ref();
    let (resource, extension) = split_extension(service, &resource);
    let mut req = base_request(method, resource, &headers);
    req.extension = extension;
    respond(service, req, body).await
}

/// `/{resource}/{id}` and `/{resource}/describe`
pub async fn member(
    State(state): State<AppState>,
    method: Method,
    Path((resource, id)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let service = state.service.as_ref();
    let req = member_request(service, method, resource, &id, &headers);
    respond(service, req, body).await
}

/// `/{parent}/{parent_id}/{resource}`
pub async fn nested_collection(
    State(state): State<AppState>,
    method: Method,
    Path((parent, parent_id, resource)): Path<(String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let service = state.service.as_ref();
    let (resource, extension) = split_extension(service, &resource);
    let mut req = base_request(method, resource, &headers).parent(parent, parent_id);
    req.extension = extension;
    respond(service, req, body).await
}

/// `/{parent}/{parent_id}/{resource}/{id}`
pub async fn nested_member(
    State(state): State<AppState>,
    method: Method,
    Path((parent, parent_id, resource, id)): Path<(String, String, String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let service = state.service.as_ref();
    let req = member_request(service, method, resource, &id, &headers).parent(parent, parent_id);
    respond(service, req, body).await
}
