use super::Renderer;
use crate::error::ApiError;
use serde_json::{json, Value};

/// `{"status":"success","data":..}` and `{"status":"error","code":..,"message":..}` envelopes.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonRenderer {
    debug: bool,
}

impl JsonRenderer {
    pub fn new(debug: bool) -> Self {
        JsonRenderer { debug }
    }

    fn error_value(&self, error: &ApiError) -> Value {
        let mut body = json!({
            "status": "error",
            "code": error.code(),
            "message": error.message(),
        });
        if let Some(errors) = error.validation_errors().filter(|e| !e.is_empty()) {
            body["errors"] = errors.to_value();
        }
        if self.debug {
            if let Some(cause) = error.cause() {
                body["cause"] = self.error_value(cause);
            }
        }
        body
    }
}

impl Renderer for JsonRenderer {
    fn name(&self) -> &'static str {
        "json"
    }

    fn mime_type(&self) -> &'static str {
        "application/json"
    }

    fn encode(&self, payload: &Value) -> String {
        json!({ "status": "success", "data": payload }).to_string()
    }

    fn encode_error(&self, error: &ApiError) -> String {
        self.error_value(error).to_string()
    }
}
