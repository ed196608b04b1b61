//! Filter and update descriptors.
//!
//! [`Filters`] is an ordered list of predicate entries; [`Assignments`] is an ordered list of
//! column updates. Both mix typed entries with positional raw fragments, and both are turned
//! into SQL by [`crate::render`].
//!
//! # Example
//! ```ignore
//! use rowmap::{Filters, FilterValue};
//!
//! let filters = Filters::new()
//!     .eq("status", "active")
//!     .in_set("role", ["admin", "owner"])
//!     .not_null("email_confirmed_at")
//!     .raw("`balance` > 100");
//! ```

use crate::render;
use crate::value::Value;
use std::fmt;

/// Boolean operator joining the predicates of one [`Filters`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum BoolOp {
    #[default]
    And,
    Or,
}

impl BoolOp {
    pub fn as_sql(self) -> &'static str {
        match self {
            BoolOp::And => "AND",
            BoolOp::Or => "OR",
        }
    }
}

/// The value side of a named filter entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Trusted SQL inserted verbatim: `` `column` = <raw> ``.
    Raw(String),
    /// `` `column` = <literal> ``; a `Null` scalar drops the entry.
    Scalar(Value),
    IsNull,
    NotNull,
    /// Membership; nulls are ignored and an empty set drops the entry.
    InSet(Vec<Value>),
    NotInSet(Vec<Value>),
}

impl FilterValue {
    /// `Some(true)` → `IS NULL`, `Some(false)` → `IS NOT NULL`, `None` → no constraint.
    pub fn null_check(is_null: Option<bool>) -> Option<Self> {
        is_null.map(|is_null| if is_null { Self::IsNull } else { Self::NotNull })
    }

    /// `NOT IN` over `values`, or no constraint when there are none.
    pub fn not_in_set_opt(values: Option<Vec<Value>>) -> Option<Self> {
        values
            .filter(|values| !values.is_empty())
            .map(Self::NotInSet)
    }
}

impl From<Value> for FilterValue {
    fn from(v: Value) -> Self {
        FilterValue::Scalar(v)
    }
}

/// One predicate entry.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterEntry {
    /// A caller-trusted fragment emitted unchanged.
    Positional(String),
    Named { column: String, value: FilterValue },
}

/// An ordered set of predicates joined by one [`BoolOp`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filters {
    entries: Vec<FilterEntry>,
    op: BoolOp,
}

impl Filters {
    /// Empty filters joined with `AND`.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty filters joined with `OR`.
    pub fn any() -> Self {
        Self {
            entries: Vec::new(),
            op: BoolOp::Or,
        }
    }

    pub fn with_op(mut self, op: BoolOp) -> Self {
        self.op = op;
        self
    }

    pub fn op(&self) -> BoolOp {
        self.op
    }

    /// Append a named entry.
    pub fn filter(mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> Self {
        self.push(column, value);
        self
    }

    /// Append a named entry in place.
    pub fn push(&mut self, column: impl Into<String>, value: impl Into<FilterValue>) -> &mut Self {
        self.entries.push(FilterEntry::Named {
            column: column.into(),
            value: value.into(),
        });
        self
    }

    /// Append a named entry only when `value` is present.
    pub fn filter_opt(self, column: impl Into<String>, value: Option<FilterValue>) -> Self {
        match value {
            Some(value) => self.filter(column, value),
            None => self,
        }
    }

    pub fn eq(self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(column, FilterValue::Scalar(value.into()))
    }

    pub fn is_null(self, column: impl Into<String>) -> Self {
        self.filter(column, FilterValue::IsNull)
    }

    pub fn not_null(self, column: impl Into<String>) -> Self {
        self.filter(column, FilterValue::NotNull)
    }

    pub fn in_set<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(column, FilterValue::InSet(values))
    }

    pub fn not_in_set<I, V>(self, column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        let values = values.into_iter().map(Into::into).collect();
        self.filter(column, FilterValue::NotInSet(values))
    }

    /// `` `column` = <sql> `` with `sql` inserted verbatim.
    pub fn eq_raw(self, column: impl Into<String>, sql: impl Into<String>) -> Self {
        self.filter(column, FilterValue::Raw(sql.into()))
    }

    /// Append a positional raw fragment.
    ///
    /// The fragment is trusted SQL; never build it from user input without escaping.
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.entries.push(FilterEntry::Positional(sql.into()));
        self
    }

    pub fn entries(&self) -> &[FilterEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Render with this filter's own operator.
    pub fn to_predicate(&self) -> crate::OrmResult<String> {
        render::render_predicate(self, self.op)
    }
}

impl fmt::Display for Filters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_predicate() {
            Ok(sql) => f.write_str(&sql),
            Err(_) => write!(f, "{:?}", self.entries),
        }
    }
}

/// The value side of a named update entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    /// Trusted SQL: `` `column` = <raw> ``.
    Raw(String),
    Scalar(Value),
}

impl From<Value> for Datum {
    fn from(v: Value) -> Self {
        Datum::Scalar(v)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AssignmentEntry {
    /// A caller-trusted fragment emitted unchanged (e.g. `` `hits` = `hits` + 1 ``).
    Positional(String),
    Named { column: String, value: Datum },
}

/// Ordered update data. Setting a column twice replaces the earlier value in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Assignments {
    entries: Vec<AssignmentEntry>,
}

impl Assignments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Assignments::set`].
    pub fn with(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(column, value);
        self
    }

    /// `` `column` = <literal> ``.
    pub fn set(&mut self, column: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.set_datum(column, Datum::Scalar(value.into()))
    }

    pub fn set_datum(&mut self, column: impl Into<String>, value: Datum) -> &mut Self {
        let column = column.into();
        let existing = self.entries.iter().position(|entry| {
            matches!(entry, AssignmentEntry::Named { column: name, .. } if *name == column)
        });
        let entry = AssignmentEntry::Named { column, value };
        match existing {
            Some(i) => self.entries[i] = entry,
            None => self.entries.push(entry),
        }
        self
    }

    /// `` `column` = <sql> `` with `sql` inserted verbatim.
    pub fn with_raw(mut self, column: impl Into<String>, sql: impl Into<String>) -> Self {
        self.set_datum(column, Datum::Raw(sql.into()));
        self
    }

    /// Append a positional raw fragment.
    pub fn raw(mut self, sql: impl Into<String>) -> Self {
        self.entries.push(AssignmentEntry::Positional(sql.into()));
        self
    }

    /// Pending value of a named column.
    pub fn get(&self, column: &str) -> Option<&Datum> {
        self.entries.iter().find_map(|entry| match entry {
            AssignmentEntry::Named { column: name, value } if name == column => Some(value),
            _ => None,
        })
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn entries(&self) -> &[AssignmentEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
