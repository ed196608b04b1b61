//! Table rows with dirty tracking.
//!
//! A [`Row<T>`] is a cheap handle to the one live instance of a persisted record inside a
//! [`Database`](crate::Database). Field setters record pending edits; [`Row::save`] writes them
//! with a single `UPDATE`, and dropping the last handle does the same.
//!
//! # Example
//! ```ignore
//! struct User {
//!     name: String,
//!     email: Option<String>,
//! }
//!
//! impl Table for User {
//!     const TABLE: &'static str = "users";
//!
//!     fn from_record(record: &Record) -> OrmResult<Self> {
//!         Ok(Self {
//!             name: record.get_string("name")?,
//!             email: record.get_opt_string("email")?,
//!         })
//!     }
//! }
//!
//! let user = db.require_by_id::<User>(7)?;
//! user.set_field("name", |u| &mut u.name, "Ann".to_string());
//! user.save()?;
//! ```

use crate::cache::CachedRow;
use crate::database::Shared;
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::filter::{Assignments, Filters};
use crate::lock;
use crate::record::Record;
use crate::value::{RowRef, Value};
use chrono::{DateTime, TimeZone, Utc};
use std::any::Any;
use std::fmt;
use std::sync::{Arc, MutexGuard, Weak};

/// Primary key column.
pub const COL_ID: &str = "id";

/// Creation timestamp column (unix seconds).
pub const COL_CREATION_DATE: &str = "creation_date";

/// A domain type stored in one table.
///
/// Every table has an integer `id` primary key and a `creation_date` unix timestamp; those two
/// columns are managed by [`RowState`] and need not appear in `Self`.
pub trait Table: Sized + Send + 'static {
    /// Table name, optionally qualified as `db.table`.
    const TABLE: &'static str;

    /// Build the domain value from a fetched record.
    fn from_record(record: &Record) -> OrmResult<Self>;

    /// Name used in error messages; the bare type name by default.
    fn entity_name() -> &'static str {
        let name = std::any::type_name::<Self>();
        name.rsplit("::").next().unwrap_or(name)
    }
}

/// In-memory state of one row: key, creation date, domain data and pending edits.
#[derive(Debug)]
pub struct RowState<T> {
    id: i64,
    creation_date: i64,
    edited: Assignments,
    data: T,
}

impl<T: Table> RowState<T> {
    pub(crate) fn from_record(record: &Record) -> OrmResult<Self> {
        let id = record.get_i64(COL_ID)?;
        if id <= 0 {
            return Err(OrmError::decode(COL_ID, format!("expected a positive id, got {id}")));
        }
        Ok(Self {
            id,
            creation_date: record.get_opt_i64(COL_CREATION_DATE)?.unwrap_or(0),
            edited: Assignments::new(),
            data: T::from_record(record)?,
        })
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn data(&self) -> &T {
        &self.data
    }

    pub fn creation_date(&self) -> i64 {
        self.creation_date
    }

    /// Pending, unsaved edits in the order they were made.
    pub fn edited(&self) -> &Assignments {
        &self.edited
    }

    pub fn is_dirty(&self) -> bool {
        !self.edited.is_empty()
    }

    /// Update a field when `value` differs from its current value.
    ///
    /// `field` selects the struct field backing `column`. Returns whether an edit was recorded.
    /// The `id` and `creation_date` columns are managed and never recorded here.
    pub fn set_field<V>(
        &mut self,
        column: &str,
        field: impl FnOnce(&mut T) -> &mut V,
        value: V,
    ) -> bool
    where
        V: PartialEq + Clone + Into<Value>,
    {
        self.assign(column, field, value, false)
    }

    /// Like [`RowState::set_field`], but records the edit even when the value is unchanged.
    pub fn force_field<V>(&mut self, column: &str, field: impl FnOnce(&mut T) -> &mut V, value: V)
    where
        V: PartialEq + Clone + Into<Value>,
    {
        self.assign(column, field, value, true);
    }

    fn assign<V>(
        &mut self,
        column: &str,
        field: impl FnOnce(&mut T) -> &mut V,
        value: V,
        force: bool,
    ) -> bool
    where
        V: PartialEq + Clone + Into<Value>,
    {
        if column == COL_ID || column == COL_CREATION_DATE {
            tracing::warn!(
                target: "rowmap::row",
                table = T::TABLE,
                id = self.id,
                column,
                "managed column cannot be set as a field"
            );
            return false;
        }
        let slot = field(&mut self.data);
        if !force && *slot == value {
            return false;
        }
        self.edited.set(column, value.clone());
        *slot = value;
        true
    }

    pub fn set_creation_date(&mut self, creation_date: i64) -> bool {
        if self.creation_date == creation_date {
            return false;
        }
        self.creation_date = creation_date;
        self.edited.set(COL_CREATION_DATE, creation_date);
        true
    }

    pub fn creation_datetime(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.creation_date, 0)
    }

    /// Creation date shown in `tz`.
    pub fn creation_datetime_in<Tz: TimeZone>(&self, tz: &Tz) -> Option<DateTime<Tz>> {
        self.creation_datetime()
            .map(|datetime| datetime.with_timezone(tz))
    }

    /// Write pending edits; returns whether an `UPDATE` was sent.
    pub(crate) fn flush(&mut self, executor: &mut Executor) -> OrmResult<bool> {
        if self.edited.is_empty() {
            return Ok(false);
        }
        let by_id = Filters::new().eq(COL_ID, self.id);
        executor.update(T::TABLE, &self.edited, Some(&by_id), Some(1))?;
        self.edited.clear();
        Ok(true)
    }
}

/// The shared, identity-mapped instance behind every [`Row`] handle.
pub(crate) struct RowCell<T: Table> {
    id: i64,
    state: std::sync::Mutex<RowState<T>>,
    db: Weak<Shared>,
}

impl<T: Table> RowCell<T> {
    pub(crate) fn hydrate(record: &Record, db: Weak<Shared>) -> OrmResult<Self> {
        let state = RowState::from_record(record)?;
        Ok(Self {
            id: state.id,
            state: std::sync::Mutex::new(state),
            db,
        })
    }

    pub(crate) fn id(&self) -> i64 {
        self.id
    }

    fn state(&self) -> MutexGuard<'_, RowState<T>> {
        lock(&self.state)
    }
}

impl<T: Table> CachedRow for RowCell<T> {
    fn table(&self) -> &'static str {
        T::TABLE
    }

    fn is_dirty(&self) -> bool {
        self.state().is_dirty()
    }

    fn save(&self, shared: &Shared) -> OrmResult<bool> {
        let mut state = self.state();
        let mut executor = lock(&shared.executor);
        state.flush(&mut executor)
    }

    fn flush_into(&self, executor: &mut Executor) -> OrmResult<bool> {
        self.state().flush(executor)
    }

    fn discard(&self) {
        self.state().edited.clear();
    }

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync> {
        self
    }
}

impl<T: Table> Drop for RowCell<T> {
    fn drop(&mut self) {
        let state = self
            .state
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if !state.is_dirty() {
            return;
        }

        let Some(shared) = self.db.upgrade() else {
            tracing::error!(
                target: "rowmap::cache",
                table = T::TABLE,
                id = self.id,
                pending = state.edited.len(),
                "row released after its database; pending edits are lost"
            );
            return;
        };

        let result = state.flush(&mut lock(&shared.executor));
        if let Err(err) = result {
            tracing::error!(
                target: "rowmap::cache",
                table = T::TABLE,
                id = self.id,
                error = %err,
                "failed to save row on release"
            );
            shared.record_release_failure(err);
        }
    }
}

/// Handle to a live row. Clones share the same instance.
pub struct Row<T: Table> {
    cell: Arc<RowCell<T>>,
}

impl<T: Table> Clone for Row<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
        }
    }
}

impl<T: Table + fmt::Debug> fmt::Debug for Row<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Row")
            .field("table", &T::TABLE)
            .field("state", &*self.cell.state())
            .finish()
    }
}

impl<T: Table> Row<T> {
    pub(crate) fn from_cell(cell: Arc<RowCell<T>>) -> Self {
        Self { cell }
    }

    pub fn id(&self) -> i64 {
        self.cell.id()
    }

    /// Reference to this row for use as a filter or update value.
    pub fn row_ref(&self) -> RowRef {
        RowRef::new(T::TABLE, self.id())
    }

    /// Whether both handles point at the same live instance.
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.cell, &b.cell)
    }

    /// Lock the row state.
    ///
    /// Do not hold the guard across other calls on the same [`Database`](crate::Database).
    pub fn state(&self) -> MutexGuard<'_, RowState<T>> {
        self.cell.state()
    }

    /// Read the domain data.
    pub fn get<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(self.cell.state().data())
    }

    /// See [`RowState::set_field`].
    pub fn set_field<V>(&self, column: &str, field: impl FnOnce(&mut T) -> &mut V, value: V) -> bool
    where
        V: PartialEq + Clone + Into<Value>,
    {
        self.cell.state().set_field(column, field, value)
    }

    /// See [`RowState::force_field`].
    pub fn force_field<V>(&self, column: &str, field: impl FnOnce(&mut T) -> &mut V, value: V)
    where
        V: PartialEq + Clone + Into<Value>,
    {
        self.cell.state().force_field(column, field, value);
    }

    pub fn creation_date(&self) -> i64 {
        self.cell.state().creation_date()
    }

    pub fn set_creation_date(&self, creation_date: i64) -> bool {
        self.cell.state().set_creation_date(creation_date)
    }

    pub fn creation_datetime(&self) -> Option<DateTime<Utc>> {
        self.cell.state().creation_datetime()
    }

    pub fn is_dirty(&self) -> bool {
        self.cell.state().is_dirty()
    }

    /// Write pending edits with one `UPDATE ... WHERE id = ? LIMIT 1`.
    ///
    /// Returns whether anything was written; saving a clean row sends nothing.
    pub fn save(&self) -> OrmResult<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let shared = self.cell.db.upgrade().ok_or_else(|| {
            OrmError::Other(format!(
                "{} #{} outlived its database",
                T::entity_name(),
                self.id()
            ))
        })?;
        self.cell.save(&shared)
    }
}

impl<T: Table> From<&Row<T>> for Value {
    fn from(row: &Row<T>) -> Self {
        Value::Row(row.row_ref())
    }
}

impl<T: Table> From<&Row<T>> for RowRef {
    fn from(row: &Row<T>) -> Self {
        row.row_ref()
    }
}
