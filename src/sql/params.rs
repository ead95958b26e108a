//! Convert serde_json::Value to values sqlx can bind, typed by the target column.

use crate::config::ColumnType;
use serde::Serialize;
use serde_json::Value;
use sqlx::encode::{Encode, IsNull};
use sqlx::postgres::{PgTypeInfo, Postgres};
use sqlx::Database;

/// A value bound to a PostgreSQL placeholder. Placeholders carry an explicit
/// cast to the column type, so the wire type only has to be castable.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum BindValue {
    Null,
    Bool(bool),
    I64(i64),
    F64(f64),
    String(String),
    Json(Value),
}

impl BindValue {
    pub fn for_column(v: &Value, type_: ColumnType) -> Self {
        if type_ == ColumnType::Json {
            return if v.is_null() { BindValue::Null } else { BindValue::Json(v.clone()) };
        }
        match v {
            Value::Null => BindValue::Null,
            Value::Bool(b) => BindValue::Bool(*b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    BindValue::I64(i)
                } else {
                    BindValue::F64(n.as_f64().unwrap_or_default())
                }
            }
            Value::String(s) => BindValue::String(s.clone()),
            Value::Array(_) | Value::Object(_) => BindValue::Json(v.clone()),
        }
    }

    pub fn text(s: impl Into<String>) -> Self {
        BindValue::String(s.into())
    }
}

impl<'q> Encode<'q, Postgres> for BindValue {
    fn encode_by_ref(
        &self,
        buf: &mut <Postgres as Database>::ArgumentBuffer<'q>,
    ) -> Result<IsNull, Box<dyn std::error::Error + Send + Sync>> {
        Ok(match self {
            BindValue::Null => IsNull::Yes,
            BindValue::Bool(b) => <bool as Encode<Postgres>>::encode_by_ref(b, buf)?,
            BindValue::I64(n) => <i64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::F64(n) => <f64 as Encode<Postgres>>::encode_by_ref(n, buf)?,
            BindValue::String(s) => {
                let s_ref: &str = s.as_str();
                <&str as Encode<Postgres>>::encode_by_ref(&s_ref, buf)?
            }
            BindValue::Json(v) => <sqlx::types::Json<&Value> as Encode<Postgres>>::encode_by_ref(
                &sqlx::types::Json(v),
                buf,
            )?,
        })
    }

    fn produces(&self) -> Option<PgTypeInfo> {
        Some(match self {
            BindValue::Null | BindValue::String(_) => <String as sqlx::Type<Postgres>>::type_info(),
            BindValue::Bool(_) => <bool as sqlx::Type<Postgres>>::type_info(),
            BindValue::I64(_) => <i64 as sqlx::Type<Postgres>>::type_info(),
            BindValue::F64(_) => <f64 as sqlx::Type<Postgres>>::type_info(),
            BindValue::Json(_) => <sqlx::types::Json<Value> as sqlx::Type<Postgres>>::type_info(),
        })
    }
}

impl sqlx::Type<Postgres> for BindValue {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<Postgres>>::type_info()
    }

    fn compatible(_ty: &PgTypeInfo) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_columns_always_bind_as_json() {
        assert_eq!(BindValue::for_column(&json!("x"), ColumnType::Json), BindValue::Json(json!("x")));
        assert_eq!(BindValue::for_column(&json!(1), ColumnType::Integer), BindValue::I64(1));
        assert_eq!(BindValue::for_column(&json!(1.5), ColumnType::Float), BindValue::F64(1.5));
        assert_eq!(BindValue::for_column(&Value::Null, ColumnType::Json), BindValue::Null);
    }
}
