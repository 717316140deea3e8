//! Renderers: turn results and errors into wire bodies, and pick one per request.

mod json;
mod xml;

pub use json::JsonRenderer;
pub use xml::XmlRenderer;

use crate::error::ApiError;
use crate::response::{ActionResult, ResponseSink};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

pub trait Renderer: Send + Sync {
    /// Short lowercase name, also the format suffix (`json`, `xml`).
    fn name(&self) -> &'static str;
    fn mime_type(&self) -> &'static str;
    fn encode(&self, payload: &Value) -> String;
    fn encode_error(&self, error: &ApiError) -> String;

    fn respond(&self, result: &ActionResult, out: &mut dyn ResponseSink) {
        out.status_code(result.status());
        for (name, value) in result.headers() {
            out.header(name, value);
        }
        out.content_type(self.mime_type());
        out.body(self.encode(result.payload()));
    }

    fn respond_error(&self, error: &ApiError, out: &mut dyn ResponseSink) {
        out.status_code(error.status().as_u16());
        out.content_type(self.mime_type());
        out.body(self.encode_error(error));
    }
}

/// Renderers by name, with content negotiation.
#[derive(Clone)]
pub struct RendererRegistry {
    renderers: HashMap<&'static str, Arc<dyn Renderer>>,
    default: &'static str,
}

impl RendererRegistry {
    /// JSON and XML, JSON as default.
    pub fn new(debug: bool) -> Self {
        let mut registry = RendererRegistry {
            renderers: HashMap::new(),
            default: "json",
        };
        registry.register(Arc::new(JsonRenderer::new(debug)));
        registry.register(Arc::new(XmlRenderer::new(debug)));
        registry
    }

    pub fn register(&mut self, renderer: Arc<dyn Renderer>) {
        self.renderers.insert(renderer.name(), renderer);
    }

    /// Sets the fallback renderer; unknown names keep the current one.
    pub fn set_default(&mut self, name: &str) -> bool {
        match self.by_name(name) {
            Some(r) => {
                self.default = r.name();
                true
            }
            None => false,
        }
    }

    pub fn default_renderer(&self) -> Arc<dyn Renderer> {
        self.renderers
            .get(self.default)
            .cloned()
            .unwrap_or_else(|| Arc::new(JsonRenderer::default()))
    }

    /// Case-insensitive; qualified names like `Api.Xml` or `vendor/Api.Xml` match by last segment.
    pub fn by_name(&self, name: &str) -> Option<Arc<dyn Renderer>> {
        let last = name.rsplit(['.', '/']).next().unwrap_or(name).to_lowercase();
        self.renderers.get(last.as_str()).cloned()
    }

    pub fn by_mime(&self, mime: &str) -> Option<Arc<dyn Renderer>> {
        let mime = mime.trim().to_lowercase();
        if mime == "text/xml" {
            return self.by_name("xml");
        }
        self.renderers.values().find(|r| r.mime_type() == mime).cloned()
    }

    /// Format suffix first, then the `Accept` header by q-value, then the default.
    pub fn negotiate(&self, accept: Option<&str>, extension: Option<&str>) -> Arc<dyn Renderer> {
        if let Some(r) = extension.and_then(|ext| self.by_name(ext)) {
            return r;
        }
        let Some(accept) = accept else {
            return self.default_renderer();
        };
        let mut ranges: Vec<(&str, f32)> = accept
            .split(',')
            .filter_map(|part| {
                let mut pieces = part.split(';');
                let mime = pieces.next()?.trim();
                let q = pieces
                    .filter_map(|p| p.trim().strip_prefix("q="))
                    .find_map(|q| q.trim().parse::<f32>().ok())
                    .unwrap_or(1.0);
                (!mime.is_empty() && q > 0.0).then_some((mime, q))
            })
            .collect();
        // stable sort keeps header order for equal weights
        ranges.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        for (mime, _) in ranges {
            if mime == "*/*" || mime == "application/*" {
                return self.default_renderer();
            }
            if let Some(r) = self.by_mime(mime) {
                return r;
            }
        }
        self.default_renderer()
    }
}

impl Default for RendererRegistry {
    fn default() -> Self {
        RendererRegistry::new(false)
    }
}

impl fmt::Debug for RendererRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<_> = self.renderers.keys().collect();
        names.sort_unstable();
        f.debug_struct("RendererRegistry")
            .field("renderers", &names)
            .field("default", &self.default)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_by_qualified_name() {
        let registry = RendererRegistry::default();
        assert_eq!(registry.by_name("CakeDC/Api.Xml").unwrap().name(), "xml");
        assert_eq!(registry.by_name("JSON").unwrap().name(), "json");
        assert!(registry.by_name("yaml").is_none());
    }

    #[test]
    fn negotiates_extension_then_accept() {
        let registry = RendererRegistry::default();
        assert_eq!(registry.negotiate(Some("application/json"), Some("xml")).name(), "xml");
        assert_eq!(
            registry
                .negotiate(Some("application/json;q=0.5, application/xml;q=0.9"), None)
                .name(),
            "xml"
        );
        assert_eq!(registry.negotiate(Some("text/xml"), None).name(), "xml");
        assert_eq!(registry.negotiate(Some("*/*"), None).name(), "json");
        assert_eq!(registry.negotiate(Some("text/html"), None).name(), "json");
        assert_eq!(registry.negotiate(None, None).name(), "json");
    }

    #[test]
    fn default_can_be_switched() {
        let mut registry = RendererRegistry::default();
        assert!(registry.set_default("xml"));
        assert!(!registry.set_default("yaml"));
        assert_eq!(registry.negotiate(Some("*/*"), None).name(), "xml");
    }
}
