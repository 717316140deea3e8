//! Typed errors and HTTP mapping.

use crate::entity::ErrorBag;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("missing reference: {kind} id '{id}'")]
    MissingReference { kind: &'static str, id: String },
    #[error("invalid primary key: table {table_id} column {column}")]
    InvalidPrimaryKey { table_id: String, column: String },
    #[error("duplicate path segment: {0}")]
    DuplicatePathSegment(String),
    #[error("config load: {0}")]
    Load(String),
    #[error("validation: {0}")]
    Validation(String),
}

/// Every failure an action, the service or a renderer can surface to a client.
#[derive(Error, Debug)]
pub enum ApiError {
    /// Primary key arity mismatch or no matching row. `key` is the literal rendering of the
    /// supplied key values, e.g. `1, 'abc'`.
    #[error("Record not found in table \"{table}\" with primary key [{key}]")]
    RecordNotFound { table: String, key: String },
    #[error("Validation on {alias} failed")]
    ValidationFailed { alias: String, errors: ErrorBag },
    #[error("no route for {method} on resource '{resource}'")]
    RouteResolution { resource: String, method: String },
    #[error("Unauthorized")]
    Unauthorized,
    #[error("Forbidden")]
    Forbidden,
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Method Not Allowed: {0}")]
    MethodNotAllowed(String),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("table '{0}' could not be resolved")]
    MissingTable(String),
    /// Generic error carrying its own code, optionally wrapping the error that caused it.
    #[error("{message}")]
    Api {
        code: u16,
        message: String,
        #[source]
        cause: Option<Box<ApiError>>,
    },
    #[error("database: {0}")]
    Db(#[from] sqlx::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl ApiError {
    pub fn api(code: u16, message: impl Into<String>) -> Self {
        ApiError::Api {
            code,
            message: message.into(),
            cause: None,
        }
    }

    #[must_use]
    pub fn caused_by(self, cause: ApiError) -> Self {
        match self {
            ApiError::Api { code, message, .. } => ApiError::Api {
                code,
                message,
                cause: Some(Box::new(cause)),
            },
            other => ApiError::Api {
                code: other.code(),
                message: other.to_string(),
                cause: Some(Box::new(cause)),
            },
        }
    }

    /// Numeric code rendered in error bodies. Equals the HTTP status except for generic
    /// errors carrying a non-HTTP code, which render as 500.
    pub fn code(&self) -> u16 {
        match self {
            ApiError::RecordNotFound { .. } | ApiError::NotFound(_) => 404,
            ApiError::ValidationFailed { .. } => 422,
            ApiError::Unauthorized => 401,
            ApiError::Forbidden => 403,
            ApiError::MethodNotAllowed(_) => 405,
            ApiError::BadRequest(_) => 400,
            ApiError::Api { code, .. } => *code,
            ApiError::RouteResolution { .. }
            | ApiError::MissingTable(_)
            | ApiError::Config(_) => 500,
            ApiError::Db(e) => {
                if let sqlx::Error::RowNotFound = e {
                    404
                } else {
                    500
                }
            }
        }
    }

    pub fn status(&self) -> StatusCode {
        StatusCode::from_u16(self.code())
            .ok()
            .filter(|s| s.is_client_error() || s.is_server_error())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Field-level validation messages, present only for `ValidationFailed`.
    pub fn validation_errors(&self) -> Option<&ErrorBag> {
        match self {
            ApiError::ValidationFailed { errors, .. } => Some(errors),
            _ => None,
        }
    }

    pub fn cause(&self) -> Option<&ApiError> {
        match self {
            ApiError::Api { cause, .. } => cause.as_deref(),
            _ => None,
        }
    }
}

/// Fallback for failures raised before a renderer has been selected.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        use crate::renderer::Renderer;
        let mut out = crate::response::HttpResponse::default();
        crate::renderer::JsonRenderer::default().respond_error(&self, &mut out);
        out.into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_status() {
        let not_found = ApiError::RecordNotFound {
            table: "articles".into(),
            key: "1".into(),
        };
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            not_found.message(),
            "Record not found in table \"articles\" with primary key [1]"
        );
        let invalid = ApiError::ValidationFailed {
            alias: "Articles".into(),
            errors: ErrorBag::default(),
        };
        assert_eq!(invalid.code(), 422);
        assert_eq!(invalid.message(), "Validation on Articles failed");
        assert_eq!(ApiError::Unauthorized.code(), 401);
        assert_eq!(ApiError::Unauthorized.message(), "Unauthorized");
    }

    #[test]
    fn generic_error_passes_code_through() {
        let err = ApiError::api(409, "duplicate slug");
        assert_eq!(err.code(), 409);
        assert_eq!(err.status(), StatusCode::CONFLICT);

        let odd = ApiError::api(7, "custom");
        assert_eq!(odd.code(), 7);
        assert_eq!(odd.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn keeps_nested_cause() {
        let err = ApiError::api(500, "save failed").caused_by(ApiError::Forbidden);
        assert_eq!(err.message(), "save failed");
        assert!(matches!(err.cause(), Some(ApiError::Forbidden)));
    }
}
