//! Runtime settings read from the environment (and `.env` via dotenvy).

use crate::error::ConfigError;

pub const DEFAULT_BASE_PATH: &str = "/api";
pub const DEFAULT_RENDERER: &str = "json";
pub const DEFAULT_BODY_LIMIT: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// Prefix every resource route is mounted under.
    pub base_path: String,
    /// Renderer used when negotiation finds no match.
    pub renderer: String,
    /// Include nested causes in error bodies.
    pub debug: bool,
    /// Table used by actions configured without one.
    pub default_resource: Option<String>,
    pub body_limit: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            base_path: DEFAULT_BASE_PATH.into(),
            renderer: DEFAULT_RENDERER.into(),
            debug: false,
            default_resource: None,
            body_limit: DEFAULT_BODY_LIMIT,
        }
    }
}

impl Settings {
    /// `API_BASE_PATH`, `API_RENDERER`, `API_DEBUG`, `API_DEFAULT_RESOURCE`, `API_BODY_LIMIT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut settings = Settings::default();
        if let Some(path) = get("API_BASE_PATH") {
            settings.base_path = normalize_base_path(&path);
        }
        if let Some(renderer) = get("API_RENDERER").filter(|r| !r.trim().is_empty()) {
            settings.renderer = renderer.trim().to_lowercase();
        }
        if let Some(debug) = get("API_DEBUG") {
            settings.debug = matches!(debug.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on");
        }
        settings.default_resource = get("API_DEFAULT_RESOURCE").filter(|r| !r.trim().is_empty());
        if let Some(limit) = get("API_BODY_LIMIT") {
            settings.body_limit = limit
                .trim()
                .parse()
                .map_err(|_| ConfigError::Load(format!("API_BODY_LIMIT is not a byte count: {}", limit)))?;
        }
        Ok(settings)
    }

    #[must_use]
    pub fn with_base_path(mut self, path: &str) -> Self {
        self.base_path = normalize_base_path(path);
        self
    }

    #[must_use]
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }
}

/// Leading slash, no trailing slash; empty stays empty.
fn normalize_base_path(path: &str) -> String {
    let trimmed = path.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let s = Settings::from_lookup(lookup(&[])).unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.base_path, "/api");
    }

    #[test]
    fn reads_overrides() {
        let s = Settings::from_lookup(lookup(&[
            ("API_BASE_PATH", "v2/"),
            ("API_RENDERER", "XML"),
            ("API_DEBUG", "true"),
            ("API_DEFAULT_RESOURCE", "articles"),
            ("API_BODY_LIMIT", "2048"),
        ]))
        .unwrap();
        assert_eq!(s.base_path, "/v2");
        assert_eq!(s.renderer, "xml");
        assert!(s.debug);
        assert_eq!(s.default_resource.as_deref(), Some("articles"));
        assert_eq!(s.body_limit, 2048);
    }

    #[test]
    fn rejects_bad_body_limit() {
        assert!(Settings::from_lookup(lookup(&[("API_BODY_LIMIT", "lots")])).is_err());
    }

    #[test]
    fn root_base_path_is_empty() {
        assert_eq!(Settings::default().with_base_path("/").base_path, "");
    }
}
