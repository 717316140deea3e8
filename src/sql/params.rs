//! Convert serde_json::Value to types that sqlx can bind.

use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value that can be bound to a PostgreSQL query. Placeholders are always cast to the
/// column type in SQL, so each variant only has to describe its own wire type.
#[derive(Clone, Debug, PartialEq)]
pub enum PgBindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
}

impl From<&Value> for PgBindValue {
    fn from(v: &Value) -> Self {
        match v {
            Value::Null => PgBindValue::Null,
            Value::Bool(b) => PgBindValue::Bool(*b),
            Value::Number(n) => n
                .as_i64()
                .map(PgBindValue::I64)
                .or_else(|| n.as_f64().map(PgBindValue::F64))
                .unwrap_or_else(|| PgBindValue::String(n.to_string())),
            Value::String(s) => PgBindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => PgBindValue::Json(v.clone()),
        }
    }
}

impl<'q> Encode<'q, Postgres> for PgBindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            PgBindValue::Null => IsNull::Yes,
            PgBindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            PgBindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            PgBindValue::String(s) => <&str as Encode<Postgres>>::encode_by_ref(&s.as_str(), buf)?,
            PgBindValue::Json(v) => <Value as Encode<Postgres>>::encode_by_ref(v, buf)?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        match self {
            PgBindValue::Null => None,
            PgBindValue::Bool(_) => Some(PgTypeInfo::with_name("BOOL")),
            PgBindValue::I64(_) => Some(PgTypeInfo::with_name("INT8")),
            PgBindValue::F64(_) => Some(PgTypeInfo::with_name("FLOAT8")),
            PgBindValue::String(_) => Some(PgTypeInfo::with_name("TEXT")),
            PgBindValue::Json(_) => Some(PgTypeInfo::with_name("JSONB")),
        }
    }
}

impl sqlx::Type<Postgres> for PgBindValue {
    fn type_info() -> PgTypeInfo {
        PgTypeInfo::with_name("TEXT")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn converts_json_values() {
        assert_eq!(PgBindValue::from(&json!(3)), PgBindValue::I64(3));
        assert_eq!(PgBindValue::from(&json!(1.5)), PgBindValue::F64(1.5));
        assert_eq!(PgBindValue::from(&json!("x")), PgBindValue::String("x".into()));
        assert_eq!(PgBindValue::from(&Value::Null), PgBindValue::Null);
        assert_eq!(PgBindValue::from(&json!({"a": 1})), PgBindValue::Json(json!({"a": 1})));
    }
}
