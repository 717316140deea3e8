//! Field validation rules: declared per resource, executed when entities are patched.

use crate::entity::ErrorBag;
use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

pub const DEFAULT_RULE_MESSAGE: &str = "The provided value is invalid";
pub const REQUIRED_MESSAGE: &str = "This field is required";
pub const NOT_EMPTY_MESSAGE: &str = "This field cannot be left empty";

/// Custom rule: receives the field value and the whole input map.
pub type RuleFn = Arc<dyn Fn(&Value, &Map<String, Value>) -> bool + Send + Sync>;

/// What a rule runs: a built-in rule by name, or opaque code that is never described.
#[derive(Clone)]
pub enum RuleCheck {
    Named(String),
    Callable(RuleFn),
}

#[derive(Clone)]
pub enum RuleParam {
    Value(Value),
    Callable(Arc<dyn Fn() -> Value + Send + Sync>),
}

impl RuleParam {
    fn resolve(&self) -> Value {
        match self {
            RuleParam::Value(v) => v.clone(),
            RuleParam::Callable(f) => f(),
        }
    }
}

impl fmt::Debug for RuleCheck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleCheck::Named(name) => f.debug_tuple("Named").field(name).finish(),
            RuleCheck::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

impl fmt::Debug for RuleParam {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleParam::Value(v) => f.debug_tuple("Value").field(v).finish(),
            RuleParam::Callable(_) => f.write_str("Callable(..)"),
        }
    }
}

/// When a rule applies: only on create, only on update, or always (`None`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuleScope {
    Create,
    Update,
}

impl RuleScope {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "create" => Some(RuleScope::Create),
            "update" => Some(RuleScope::Update),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub struct ValidationRule {
    pub name: String,
    pub check: RuleCheck,
    pub params: Vec<RuleParam>,
    pub message: Option<String>,
    pub on: Option<RuleScope>,
    /// Stop checking the field's remaining rules when this one fails.
    pub last: bool,
}

impl ValidationRule {
    /// Built-in rule; `name` is the key it is listed under, `rule` the built-in identifier.
    pub fn named(name: impl Into<String>, rule: impl Into<String>) -> Self {
        ValidationRule {
            name: name.into(),
            check: RuleCheck::Named(rule.into()),
            params: Vec::new(),
            message: None,
            on: None,
            last: false,
        }
    }

    pub fn callable<F>(name: impl Into<String>, f: F) -> Self
    where
        F: Fn(&Value, &Map<String, Value>) -> bool + Send + Sync + 'static,
    {
        ValidationRule {
            name: name.into(),
            check: RuleCheck::Callable(Arc::new(f)),
            params: Vec::new(),
            message: None,
            on: None,
            last: false,
        }
    }

    #[must_use]
    pub fn param(mut self, value: Value) -> Self {
        self.params.push(RuleParam::Value(value));
        self
    }

    #[must_use]
    pub fn lazy_param<F>(mut self, f: F) -> Self
    where
        F: Fn() -> Value + Send + Sync + 'static,
    {
        self.params.push(RuleParam::Callable(Arc::new(f)));
        self
    }

    #[must_use]
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    #[must_use]
    pub fn on(mut self, scope: RuleScope) -> Self {
        self.on = Some(scope);
        self
    }

    #[must_use]
    pub fn last(mut self) -> Self {
        self.last = true;
        self
    }

    pub fn applies(&self, is_new: bool) -> bool {
        match self.on {
            None => true,
            Some(RuleScope::Create) => is_new,
            Some(RuleScope::Update) => !is_new,
        }
    }

    /// True when the rule or any of its parameters is code rather than a plain value.
    pub fn is_opaque(&self) -> bool {
        matches!(self.check, RuleCheck::Callable(_))
            || self.params.iter().any(|p| matches!(p, RuleParam::Callable(_)))
    }

    pub fn rule_name(&self) -> Option<&str> {
        match &self.check {
            RuleCheck::Named(n) => Some(n),
            RuleCheck::Callable(_) => None,
        }
    }

    /// Plain parameter values; `None` if any parameter is a callable.
    pub fn plain_params(&self) -> Option<Vec<Value>> {
        self.params
            .iter()
            .map(|p| match p {
                RuleParam::Value(v) => Some(v.clone()),
                RuleParam::Callable(_) => None,
            })
            .collect()
    }

    fn passes(&self, value: &Value, data: &Map<String, Value>) -> bool {
        match &self.check {
            RuleCheck::Callable(f) => f(value, data),
            RuleCheck::Named(rule) => {
                let params: Vec<Value> = self.params.iter().map(RuleParam::resolve).collect();
                check_builtin(rule, value, &params)
            }
        }
    }
}

#[derive(Clone, Debug)]
pub struct FieldValidator {
    pub field: String,
    pub presence_required: bool,
    pub empty_allowed: bool,
    pub rules: Vec<ValidationRule>,
}

impl FieldValidator {
    pub fn new(field: impl Into<String>) -> Self {
        FieldValidator {
            field: field.into(),
            presence_required: false,
            empty_allowed: true,
            rules: Vec::new(),
        }
    }

    #[must_use]
    pub fn require_presence(mut self) -> Self {
        self.presence_required = true;
        self
    }

    #[must_use]
    pub fn not_empty(mut self) -> Self {
        self.empty_allowed = false;
        self
    }

    #[must_use]
    pub fn rule(mut self, rule: ValidationRule) -> Self {
        self.rules.push(rule);
        self
    }

    fn validate(&self, data: &Map<String, Value>, is_new: bool, errors: &mut ErrorBag) {
        let Some(value) = data.get(&self.field) else {
            if self.presence_required && is_new {
                errors.add(&self.field, REQUIRED_MESSAGE);
            }
            return;
        };
        if is_empty(value) {
            if !self.empty_allowed {
                errors.add(&self.field, NOT_EMPTY_MESSAGE);
            }
            return;
        }
        for rule in self.rules.iter().filter(|r| r.applies(is_new)) {
            if rule.passes(value, data) {
                continue;
            }
            errors.add(
                &self.field,
                rule.message.as_deref().unwrap_or(DEFAULT_RULE_MESSAGE),
            );
            if rule.last {
                break;
            }
        }
    }
}

/// Ordered field validators of one resource.
#[derive(Clone, Debug, Default)]
pub struct ValidationSet {
    fields: Vec<FieldValidator>,
}

impl ValidationSet {
    pub fn new(fields: Vec<FieldValidator>) -> Self {
        ValidationSet { fields }
    }

    /// Adds a validator, replacing an existing one for the same field.
    pub fn add(&mut self, validator: FieldValidator) {
        if let Some(existing) = self.fields.iter_mut().find(|f| f.field == validator.field) {
            *existing = validator;
        } else {
            self.fields.push(validator);
        }
    }

    pub fn field(&self, name: &str) -> Option<&FieldValidator> {
        self.fields.iter().find(|f| f.field == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldValidator> {
        self.fields.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Validate input data. Presence is only enforced for new entities.
    pub fn validate(&self, data: &Map<String, Value>, is_new: bool) -> ErrorBag {
        let mut errors = ErrorBag::default();
        for field in &self.fields {
            field.validate(data, is_new, &mut errors);
        }
        errors
    }
}

fn is_empty(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}

fn value_eq(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(s), Value::String(t)) => s == t,
        (Value::Number(n), Value::Number(m)) => n.as_f64() == m.as_f64(),
        (Value::String(s), Value::Number(n)) | (Value::Number(n), Value::String(s)) => {
            s.parse::<f64>().ok() == n.as_f64()
        }
        _ => a == b,
    }
}

fn as_number(v: &Value) -> Option<f64> {
    match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn param_usize(params: &[Value], idx: usize) -> Option<usize> {
    params
        .get(idx)
        .and_then(as_number)
        .filter(|n| *n >= 0.0)
        .map(|n| n as usize)
}

fn check_builtin(rule: &str, v: &Value, params: &[Value]) -> bool {
    let text = v.as_str();
    match rule {
        "notBlank" => text.map_or(true, |s| !s.trim().is_empty()),
        "email" => text.is_some_and(|s| {
            s.len() >= 3
                && s.split_once('@')
                    .is_some_and(|(local, domain)| !local.is_empty() && !domain.is_empty())
        }),
        "uuid" => text.is_some_and(|s| uuid::Uuid::parse_str(s).is_ok()),
        "maxLength" => match (text, param_usize(params, 0)) {
            (Some(s), Some(max)) => s.chars().count() <= max,
            _ => true,
        },
        "minLength" => match (text, param_usize(params, 0)) {
            (Some(s), Some(min)) => s.chars().count() >= min,
            _ => true,
        },
        "lengthBetween" => match (text, param_usize(params, 0), param_usize(params, 1)) {
            (Some(s), Some(min), Some(max)) => (min..=max).contains(&s.chars().count()),
            _ => true,
        },
        "custom" => {
            let Some(pattern) = params.first().and_then(Value::as_str) else {
                return true;
            };
            match Regex::new(pattern) {
                Ok(re) => text.is_some_and(|s| re.is_match(s)),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "invalid validation pattern");
                    false
                }
            }
        }
        "inList" => {
            let allowed: Vec<&Value> = match params {
                [Value::Array(list)] => list.iter().collect(),
                other => other.iter().collect(),
            };
            allowed.iter().any(|a| value_eq(v, a))
        }
        "range" => match (as_number(v), params.first().and_then(as_number), params.get(1).and_then(as_number)) {
            (Some(n), Some(min), Some(max)) => n >= min && n <= max,
            (None, _, _) => false,
            _ => true,
        },
        "greaterThanOrEqual" => match (as_number(v), params.first().and_then(as_number)) {
            (Some(n), Some(min)) => n >= min,
            (None, _) => false,
            _ => true,
        },
        "lessThanOrEqual" => match (as_number(v), params.first().and_then(as_number)) {
            (Some(n), Some(max)) => n <= max,
            (None, _) => false,
            _ => true,
        },
        "numeric" => as_number(v).is_some(),
        "integer" => match v {
            Value::Number(n) => n.is_i64() || n.is_u64(),
            Value::String(s) => s.trim().parse::<i64>().is_ok(),
            _ => false,
        },
        "boolean" => matches!(v, Value::Bool(_))
            || matches!(v.as_i64(), Some(0 | 1))
            || matches!(text, Some("0" | "1" | "true" | "false")),
        other => {
            tracing::warn!(rule = %other, "unknown validation rule, treated as passing");
            true
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(v: Value) -> Map<String, Value> {
        match v {
            Value::Object(m) => m,
            _ => Map::new(),
        }
    }

    fn articles_validator() -> ValidationSet {
        ValidationSet::new(vec![
            FieldValidator::new("title")
                .require_presence()
                .not_empty()
                .rule(ValidationRule::named("minLength", "minLength").param(json!(3)).message("too short").last())
                .rule(ValidationRule::named("maxLength", "maxLength").param(json!(10))),
            FieldValidator::new("email").rule(ValidationRule::named("email", "email").message("bad email")),
        ])
    }

    #[test]
    fn presence_is_only_required_on_create() {
        let v = articles_validator();
        let errors = v.validate(&data(json!({})), true);
        assert_eq!(errors.get("title").unwrap(), [REQUIRED_MESSAGE]);
        assert!(v.validate(&data(json!({})), false).is_empty());
    }

    #[test]
    fn empty_values_are_rejected_when_not_allowed() {
        let v = articles_validator();
        let errors = v.validate(&data(json!({"title": ""})), false);
        assert_eq!(errors.get("title").unwrap(), [NOT_EMPTY_MESSAGE]);
    }

    #[test]
    fn last_rule_stops_the_chain() {
        let v = articles_validator();
        let errors = v.validate(&data(json!({"title": "ab"})), true);
        assert_eq!(errors.get("title").unwrap(), ["too short"]);
        let errors = v.validate(&data(json!({"title": "a very long title", "email": "nope"})), true);
        assert_eq!(errors.get("title").unwrap(), [DEFAULT_RULE_MESSAGE]);
        assert_eq!(errors.get("email").unwrap(), ["bad email"]);
    }

    #[test]
    fn scoped_rules_apply_only_to_their_operation() {
        let v = ValidationSet::new(vec![FieldValidator::new("slug").rule(
            ValidationRule::named("custom", "custom")
                .param(json!("^[a-z-]+$"))
                .on(RuleScope::Create),
        )]);
        assert!(!v.validate(&data(json!({"slug": "Bad Slug"})), true).is_empty());
        assert!(v.validate(&data(json!({"slug": "Bad Slug"})), false).is_empty());
    }

    #[test]
    fn callable_rules_see_the_whole_input() {
        let v = ValidationSet::new(vec![FieldValidator::new("confirm").rule(ValidationRule::callable(
            "matches",
            |value, data| data.get("password") == Some(value),
        ))]);
        assert!(v.validate(&data(json!({"password": "x", "confirm": "x"})), true).is_empty());
        assert!(!v.validate(&data(json!({"password": "x", "confirm": "y"})), true).is_empty());
    }

    #[test]
    fn builtin_rules() {
        assert!(check_builtin("inList", &json!("draft"), &[json!(["draft", "published"])]));
        assert!(!check_builtin("inList", &json!("deleted"), &[json!("draft"), json!("published")]));
        assert!(check_builtin("range", &json!(5), &[json!(1), json!(10)]));
        assert!(!check_builtin("greaterThanOrEqual", &json!("-1"), &[json!(0)]));
        assert!(check_builtin("uuid", &json!("67e55044-10b1-426f-9247-bb680e5fe0c8"), &[]));
        assert!(!check_builtin("integer", &json!(1.5), &[]));
        assert!(check_builtin("boolean", &json!("1"), &[]));
        assert!(check_builtin("lengthBetween", &json!("abcd"), &[json!(2), json!(4)]));
        assert!(check_builtin("somethingUnknown", &json!(1), &[]));
    }

    #[test]
    fn opaque_rules_are_detected() {
        let plain = ValidationRule::named("maxLength", "maxLength").param(json!(5));
        assert!(!plain.is_opaque());
        assert_eq!(plain.plain_params(), Some(vec![json!(5)]));
        let lazy = ValidationRule::named("maxLength", "maxLength").lazy_param(|| json!(5));
        assert!(lazy.is_opaque());
        assert_eq!(lazy.plain_params(), None);
        assert!(ValidationRule::callable("c", |_, _| true).is_opaque());
    }
}
