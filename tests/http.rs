mod common;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    Router,
};
use resource_sdk::config::Settings;
use resource_sdk::{api_router, AppState};
use serde_json::{json, Value};
use tower::ServiceExt;

fn app() -> Router {
    api_router(AppState::new(common::service()))
}

fn request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder().method(method).uri(uri);
    match body {
        Some(b) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(b.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, req).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn health_is_served_at_the_root() {
    let (status, body) = send_json(&app(), request("GET", "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({"status": "ok"}));
}

#[tokio::test]
async fn lists_and_views_records() {
    let app = app();
    let (status, body) = send_json(&app, request("GET", "/api/articles", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("success"));
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (status, body) = send_json(&app, request("GET", "/api/authors/2", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({"id": 2, "name": "Linus", "email": "linus@example.com"})
    );
}

#[tokio::test]
async fn create_update_delete_round() {
    let app = app();
    let (status, body) = send_json(
        &app,
        request("POST", "/api/articles", Some(json!({"title": "Fourth", "author_id": 2}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["id"], json!(4));

    let (status, body) = send_json(
        &app,
        request("PUT", "/api/articles/4", Some(json!({"status": "published"}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], json!("published"));
    assert_eq!(body["data"]["title"], json!("Fourth"));

    let (status, body) = send_json(&app, request("DELETE", "/api/articles/4", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!(true));

    let (status, body) = send_json(&app, request("GET", "/api/articles/4", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body,
        json!({
            "status": "error",
            "code": 404,
            "message": "Record not found in table \"articles\" with primary key [4]",
        })
    );
}

#[tokio::test]
async fn format_suffix_selects_xml() {
    let (status, content_type, body) = send(&app(), request("GET", "/api/tags.xml", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/xml"));
    assert_eq!(
        body,
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<data><item><id>1</id><label>rust</label></item></data>\n"
    );

    let (_, content_type, _) = send(&app(), request("GET", "/api/tags/1.xml", None)).await;
    assert_eq!(content_type.as_deref(), Some("application/xml"));
}

#[tokio::test]
async fn describe_route() {
    let (status, body) = send_json(&app(), request("GET", "/api/articles/describe", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["relations"]["BelongsTo"], json!(["authors"]));
    assert_eq!(body["data"]["actions"]["add"]["href"], json!("/api/articles"));
}

#[tokio::test]
async fn nested_routes_are_scoped_to_the_parent() {
    let app = app();
    let (status, body) = send_json(&app, request("GET", "/api/authors/1/articles", None)).await;
    assert_eq!(status, StatusCode::OK);
    let titles: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["title"].clone())
        .collect();
    assert_eq!(titles, [json!("First"), json!("Second")]);

    let (status, _) = send_json(&app, request("GET", "/api/authors/1/articles/3", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send_json(
        &app,
        request("POST", "/api/authors/2/articles", Some(json!({"title": "Nested"}))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["author_id"], json!(2));

    let (status, _) = send_json(&app, request("GET", "/api/tags/1/articles", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn error_statuses() {
    let app = app();
    let (status, body) = send_json(&app, request("GET", "/api/nothing", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], json!(404));

    let (status, body) = send_json(&app, request("DELETE", "/api/tags/1", None)).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["code"], json!(405));

    let malformed = Request::builder()
        .method("POST")
        .uri("/api/articles")
        .body(Body::from("{not json"))
        .unwrap();
    let (status, body) = send_json(&app, malformed).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], json!("error"));

    let (status, body) = send_json(
        &app,
        request("POST", "/api/articles", Some(json!({"title": ""}))),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["errors"]["title"], json!(["This field cannot be left empty"]));
}

#[tokio::test]
async fn empty_base_path_mounts_resources_at_the_root() {
    let app = api_router(AppState::new(common::service_with(
        Settings::default().with_base_path(""),
    )));
    let (status, body) = send_json(&app, request("GET", "/tags", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["label"], json!("rust"));
    let (status, _) = send_json(&app, request("GET", "/health", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn head_is_answered_like_get() {
    let app = app();
    let (status, content_type, _) = send(&app, request("HEAD", "/api/articles/1", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(content_type.as_deref(), Some("application/json"));
    let (status, _, _) = send(&app, request("HEAD", "/api/articles/99", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn nested_put_keeps_the_record_under_its_parent() {
    let app = app();
    let (status, body) = send_json(
        &app,
        request("PUT", "/api/authors/1/articles/1", Some(json!({"author_id": 2}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["author_id"], json!(1));
    let (status, _) = send_json(&app, request("GET", "/api/authors/1/articles/1", None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn non_numeric_ids_are_not_found() {
    let (status, body) = send_json(&app(), request("GET", "/api/articles/abc", None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(
        body["message"],
        json!("Record not found in table \"articles\" with primary key ['abc']")
    );
}
