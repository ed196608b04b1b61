//! Fetched records and typed column access.

use crate::error::{OrmError, OrmResult};
use crate::value::Value;

/// One fetched row: an ordered mapping from column name to value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    columns: Vec<(String, Value)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style column append.
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// Set a column, replacing an existing value in place.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) {
        let column = column.into();
        let value = value.into();
        match self.columns.iter_mut().find(|(name, _)| *name == column) {
            Some((_, slot)) => *slot = value,
            None => self.columns.push((column, value)),
        }
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        self.columns
            .iter()
            .find(|(name, _)| name == column)
            .map(|(_, value)| value)
    }

    /// Value of the first column (e.g. `COUNT(*)`).
    pub fn first_value(&self) -> Option<&Value> {
        self.columns.first().map(|(_, value)| value)
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.columns.iter().map(|(name, value)| (name.as_str(), value))
    }

    /// Build a record from a JSON object.
    pub fn from_json(value: serde_json::Value) -> OrmResult<Self> {
        let serde_json::Value::Object(map) = value else {
            return Err(OrmError::malformed("Record JSON must be an object"));
        };
        map.into_iter()
            .map(|(column, value)| Ok((column, Value::from_json(&value)?)))
            .collect()
    }

    fn require(&self, column: &str) -> OrmResult<&Value> {
        self.get(column)
            .ok_or_else(|| OrmError::decode(column, "column missing from record"))
    }

    pub fn get_i64(&self, column: &str) -> OrmResult<i64> {
        let value = self.require(column)?;
        value
            .as_i64()
            .ok_or_else(|| OrmError::decode(column, format!("expected integer, got {value}")))
    }

    pub fn get_opt_i64(&self, column: &str) -> OrmResult<Option<i64>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            _ => self.get_i64(column).map(Some),
        }
    }

    pub fn get_f64(&self, column: &str) -> OrmResult<f64> {
        let value = self.require(column)?;
        value
            .as_f64()
            .ok_or_else(|| OrmError::decode(column, format!("expected number, got {value}")))
    }

    pub fn get_opt_f64(&self, column: &str) -> OrmResult<Option<f64>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            _ => self.get_f64(column).map(Some),
        }
    }

    pub fn get_string(&self, column: &str) -> OrmResult<String> {
        match self.require(column)? {
            Value::Text(s) => Ok(s.clone()),
            Value::Null => Err(OrmError::decode(column, "unexpected NULL")),
            Value::Bool(b) => Ok(i64::from(*b).to_string()),
            other => Ok(other.to_string()),
        }
    }

    pub fn get_opt_string(&self, column: &str) -> OrmResult<Option<String>> {
        match self.require(column)? {
            Value::Null => Ok(None),
            _ => self.get_string(column).map(Some),
        }
    }

    /// Boolean stored as an integer: any non-zero value is `true`.
    pub fn get_bool(&self, column: &str) -> OrmResult<bool> {
        self.get_i64(column).map(|v| v != 0)
    }

    pub fn get_opt_bool(&self, column: &str) -> OrmResult<Option<bool>> {
        Ok(self.get_opt_i64(column)?.map(|v| v != 0))
    }
}

impl FromIterator<(String, Value)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut record = Record::new();
        for (column, value) in iter {
            record.set(column, value);
        }
        record
    }
}
