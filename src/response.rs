//! Action results and the transport sink renderers write to.

use axum::{
    http::{header, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use serde_json::Value;

/// Successful outcome of an action: status, payload and extra headers.
#[derive(Clone, Debug, PartialEq)]
pub struct ActionResult {
    status: u16,
    payload: Value,
    headers: Vec<(String, String)>,
}

impl ActionResult {
    pub fn ok(payload: Value) -> Self {
        ActionResult {
            status: 200,
            payload,
            headers: Vec::new(),
        }
    }

    pub fn created(payload: Value) -> Self {
        ActionResult::ok(payload).with_status(201)
    }

    #[must_use]
    pub fn with_status(mut self, status: u16) -> Self {
        self.status = status;
        self
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn status(&self) -> u16 {
        self.status
    }

    pub fn payload(&self) -> &Value {
        &self.payload
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }
}

/// Transport response a renderer writes into.
pub trait ResponseSink {
    fn status_code(&mut self, code: u16);
    fn content_type(&mut self, mime: &str);
    fn body(&mut self, body: String);
    fn header(&mut self, _name: &str, _value: &str) {}
}

/// Sink that buffers everything and converts into an axum response.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ResponseSink for HttpResponse {
    fn status_code(&mut self, code: u16) {
        self.status = code;
    }

    fn content_type(&mut self, mime: &str) {
        self.content_type = Some(mime.to_string());
    }

    fn body(&mut self, body: String) {
        self.body = body;
    }

    fn header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }
}

impl IntoResponse for HttpResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let mut response = (status, self.body).into_response();
        let headers = response.headers_mut();
        if let Some(mime) = self.content_type.as_deref().and_then(|m| HeaderValue::from_str(m).ok()) {
            headers.insert(header::CONTENT_TYPE, mime);
        }
        for (name, value) in &self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::from_str(value)) {
                (Ok(n), Ok(v)) => {
                    headers.append(n, v);
                }
                _ => tracing::warn!(header = %name, "dropping invalid response header"),
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn builds_results() {
        let r = ActionResult::created(json!({"id": 1})).with_header("Location", "/api/articles/1");
        assert_eq!(r.status(), 201);
        assert_eq!(r.headers(), [("Location".to_string(), "/api/articles/1".to_string())]);
        assert_eq!(ActionResult::ok(json!(true)).status(), 200);
    }

    #[test]
    fn http_response_sets_headers() {
        let mut out = HttpResponse::default();
        out.status_code(404);
        out.content_type("application/xml");
        out.header("X-Resource", "articles");
        out.body("<error/>".into());
        let resp = out.into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        assert_eq!(resp.headers()[header::CONTENT_TYPE], "application/xml");
        assert_eq!(resp.headers()["x-resource"], "articles");
    }
}
