//! Scalar values exchanged with the database.

use crate::error::{OrmError, OrmResult};
use crate::escape;
use chrono::{DateTime, TimeZone};
use std::fmt;

/// A reference to a persisted row, rendered as the row's id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RowRef {
    pub table: &'static str,
    pub id: i64,
}

impl RowRef {
    pub fn new(table: &'static str, id: i64) -> Self {
        Self { table, id }
    }
}

/// A scalar SQL value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Another row; resolved to its primary key when rendered.
    Row(RowRef),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer view of the value.
    ///
    /// Text-protocol drivers hand numbers back as strings, so numeric text is parsed.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Bool(b) => Some(i64::from(*b)),
            Value::Row(r) => Some(r.id),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Float(f) if f.fract() == 0.0 && f.is_finite() => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Int(v) => Some(*v as f64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Render as a SQL literal.
    ///
    /// Strings are quoted and escaped; numbers, booleans and row references are emitted bare.
    pub fn to_sql_literal(&self) -> OrmResult<String> {
        match self {
            Value::Null => Ok("NULL".to_string()),
            Value::Bool(b) => Ok(if *b { "1" } else { "0" }.to_string()),
            Value::Int(v) => Ok(v.to_string()),
            Value::Float(f) if f.is_finite() => Ok(f.to_string()),
            Value::Float(f) => Err(OrmError::malformed(format!(
                "Non-finite float {f} has no SQL literal"
            ))),
            Value::Text(s) => Ok(escape::quote(s)),
            Value::Row(r) => Ok(r.id.to_string()),
        }
    }

    /// Convert a JSON scalar. Arrays and objects have no scalar form.
    pub fn from_json(value: &serde_json::Value) -> OrmResult<Self> {
        match value {
            serde_json::Value::Null => Ok(Value::Null),
            serde_json::Value::Bool(b) => Ok(Value::Bool(*b)),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(v) => Ok(Value::Int(v)),
                None => n
                    .as_f64()
                    .map(Value::Float)
                    .ok_or_else(|| OrmError::malformed(format!("Unsupported number {n}"))),
            },
            serde_json::Value::String(s) => Ok(Value::Text(s.clone())),
            other => Err(OrmError::malformed(format!(
                "Expected a JSON scalar, got {other}"
            ))),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Text(s) => write!(f, "{s:?}"),
            Value::Row(r) => write!(f, "{}#{}", r.table, r.id),
        }
    }
}

macro_rules! impl_from_int {
    ($($t:ty),*) => {
        $(
            impl From<$t> for Value {
                fn from(v: $t) -> Self {
                    Value::Int(i64::from(v))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Value::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<&String> for Value {
    fn from(v: &String) -> Self {
        Value::Text(v.clone())
    }
}

impl From<RowRef> for Value {
    fn from(v: RowRef) -> Self {
        Value::Row(v)
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for Value {
    fn from(v: DateTime<Tz>) -> Self {
        Value::Int(v.timestamp())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn literals() {
        assert_eq!(Value::Null.to_sql_literal().unwrap(), "NULL");
        assert_eq!(Value::from(true).to_sql_literal().unwrap(), "1");
        assert_eq!(Value::from(false).to_sql_literal().unwrap(), "0");
        assert_eq!(Value::from(-42).to_sql_literal().unwrap(), "-42");
        assert_eq!(Value::from(1.5).to_sql_literal().unwrap(), "1.5");
        assert_eq!(Value::from("it's").to_sql_literal().unwrap(), "'it\\'s'");
        assert_eq!(
            Value::from(RowRef::new("users", 7)).to_sql_literal().unwrap(),
            "7"
        );
    }

    #[test]
    fn non_finite_float_is_malformed() {
        let err = Value::from(f64::NAN).to_sql_literal().unwrap_err();
        assert!(matches!(err, OrmError::MalformedInput(_)));
        assert!(Value::from(f64::INFINITY).to_sql_literal().is_err());
    }

    #[test]
    fn numeric_text_reads_as_integer() {
        assert_eq!(Value::from("15").as_i64(), Some(15));
        assert_eq!(Value::from("x").as_i64(), None);
        assert_eq!(Value::Null.as_i64(), None);
    }

    #[test]
    fn options_and_dates() {
        assert_eq!(Value::from(None::<i32>), Value::Null);
        assert_eq!(Value::from(Some("a")), Value::Text("a".into()));
        let at = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert_eq!(Value::from(at), Value::Int(1_700_000_000));
    }

    #[test]
    fn json_scalars() {
        assert_eq!(
            Value::from_json(&serde_json::json!(3)).unwrap(),
            Value::Int(3)
        );
        assert_eq!(
            Value::from_json(&serde_json::json!("x")).unwrap(),
            Value::Text("x".into())
        );
        assert!(Value::from_json(&serde_json::json!([1])).is_err());
    }
}
