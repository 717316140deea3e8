use super::Renderer;
use crate::error::ApiError;
use serde_json::{Map, Value};
use std::fmt::Write;

const PROLOG: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";

/// `application/xml` renderer. Results are rooted at `<data>`, errors at `<error>`.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlRenderer {
    debug: bool,
}

impl XmlRenderer {
    pub fn new(debug: bool) -> Self {
        XmlRenderer { debug }
    }

    fn document(root: &str, content: &Map<String, Value>) -> String {
        let mut out = String::from(PROLOG);
        write_map(&mut out, root, content);
        out.push('\n');
        out
    }

    fn error_map(&self, error: &ApiError) -> Map<String, Value> {
        let mut map = Map::new();
        map.insert("code".into(), Value::from(error.code()));
        map.insert("message".into(), Value::String(error.message()));
        if let Some(errors) = error.validation_errors().filter(|e| !e.is_empty()) {
            map.insert("errors".into(), errors.to_value());
        }
        if self.debug {
            if let Some(cause) = error.cause() {
                map.insert("cause".into(), Value::Object(self.error_map(cause)));
            }
        }
        map
    }
}

impl Renderer for XmlRenderer {
    fn name(&self) -> &'static str {
        "xml"
    }

    fn mime_type(&self) -> &'static str {
        "application/xml"
    }

    fn encode(&self, payload: &Value) -> String {
        match payload {
            Value::Object(map) => Self::document("data", map),
            Value::Array(items) if !items.is_empty() => {
                let mut out = String::from(PROLOG);
                write_list(&mut out, "data", payload);
                out.push('\n');
                out
            }
            other => {
                let mut map = Map::new();
                map.insert("value".into(), other.clone());
                Self::document("data", &map)
            }
        }
    }

    fn encode_error(&self, error: &ApiError) -> String {
        Self::document("error", &self.error_map(error))
    }
}

fn write_map(out: &mut String, name: &str, map: &Map<String, Value>) {
    if map.is_empty() {
        let _ = write!(out, "<{}/>", name);
        return;
    }
    let _ = write!(out, "<{}>", name);
    for (key, value) in map {
        write_value(out, &element_name(key), value);
    }
    let _ = write!(out, "</{}>", name);
}

/// Arrays under a key repeat that key; arrays inside arrays become `<item>` lists.
fn write_value(out: &mut String, name: &str, value: &Value) {
    match value {
        Value::Null => {
            let _ = write!(out, "<{}/>", name);
        }
        Value::Bool(b) => {
            let _ = write!(out, "<{0}>{1}</{0}>", name, b);
        }
        Value::Number(n) => {
            let _ = write!(out, "<{0}>{1}</{0}>", name, n);
        }
        Value::String(s) => {
            let _ = write!(out, "<{0}>{1}</{0}>", name, escape(s));
        }
        Value::Object(map) => write_map(out, name, map),
        Value::Array(items) if items.is_empty() => {
            let _ = write!(out, "<{}/>", name);
        }
        Value::Array(items) => {
            for item in items {
                match item {
                    Value::Array(_) => write_list(out, name, item),
                    _ => write_value(out, name, item),
                }
            }
        }
    }
}

fn write_list(out: &mut String, name: &str, list: &Value) {
    let _ = write!(out, "<{}>", name);
    if let Value::Array(items) = list {
        for item in items {
            match item {
                Value::Array(_) => write_list(out, "item", item),
                _ => write_value(out, "item", item),
            }
        }
    }
    let _ = write!(out, "</{}>", name);
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c => out.push(c),
        }
    }
    out
}

/// Valid XML element name for a map key.
fn element_name(key: &str) -> String {
    let mut name: String = key
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, '_' | '-' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let starts_ok = name
        .chars()
        .next()
        .is_some_and(|c| c.is_alphabetic() || c == '_');
    if !starts_ok || name.to_lowercase().starts_with("xml") {
        name.insert(0, '_');
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(body: &str) -> String {
        format!("{}{}\n", PROLOG, body)
    }

    #[test]
    fn scalar_payload_is_wrapped_in_value() {
        let r = XmlRenderer::default();
        assert_eq!(r.encode(&json!("Updated!")), doc("<data><value>Updated!</value></data>"));
        assert_eq!(r.encode(&json!({"value": "Updated!"})), doc("<data><value>Updated!</value></data>"));
    }

    #[test]
    fn lists_and_nulls() {
        let r = XmlRenderer::default();
        let body = r.encode(&json!({
            "id": 1,
            "tags": ["a", "b"],
            "author": null,
            "flags": [],
            "grid": [[1, 2]],
            "published": true
        }));
        assert_eq!(
            body,
            doc("<data><id>1</id><tags>a</tags><tags>b</tags><author/><flags/>\
                 <grid><item>1</item><item>2</item></grid><published>true</published></data>")
        );
    }

    #[test]
    fn top_level_list_uses_items() {
        let r = XmlRenderer::default();
        assert_eq!(
            r.encode(&json!([{"id": 1}, {"id": 2}])),
            doc("<data><item><id>1</id></item><item><id>2</id></item></data>")
        );
    }

    #[test]
    fn escapes_text_and_names() {
        let r = XmlRenderer::default();
        assert_eq!(
            r.encode(&json!({"1st key": "<b>&</b>"})),
            doc("<data><_1st_key>&lt;b&gt;&amp;&lt;/b&gt;</_1st_key></data>")
        );
    }

    #[test]
    fn unauthorized_error() {
        let r = XmlRenderer::default();
        assert_eq!(
            r.encode_error(&ApiError::Unauthorized),
            doc("<error><code>401</code><message>Unauthorized</message></error>")
        );
    }

    #[test]
    fn validation_errors_repeat_messages() {
        let mut errors = crate::entity::ErrorBag::default();
        errors.add("title", "too short");
        errors.add("title", "bad");
        let err = ApiError::ValidationFailed {
            alias: "Articles".into(),
            errors,
        };
        assert_eq!(
            XmlRenderer::default().encode_error(&err),
            doc("<error><code>422</code><message>Validation on Articles failed</message>\
                 <errors><title>too short</title><title>bad</title></errors></error>")
        );
    }
}
