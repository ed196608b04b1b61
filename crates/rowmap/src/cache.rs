//! The identity map: table → id → the one live row instance.

use crate::database::Shared;
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::row::{RowCell, Table};
use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

/// Type-erased view of a cached [`RowCell`].
pub(crate) trait CachedRow: Send + Sync {
    fn table(&self) -> &'static str;

    fn is_dirty(&self) -> bool;

    /// Flush through the shared executor, locking row state first.
    fn save(&self, shared: &Shared) -> OrmResult<bool>;

    /// Flush through an executor the caller already has exclusive access to.
    fn flush_into(&self, executor: &mut Executor) -> OrmResult<bool>;

    /// Drop pending edits without writing them.
    fn discard(&self);

    fn into_any(self: Arc<Self>) -> Arc<dyn Any + Send + Sync>;
}

pub(crate) type CachedRows = HashMap<i64, Arc<dyn CachedRow>>;

#[derive(Default)]
pub(crate) struct IdentityMap {
    tables: HashMap<&'static str, CachedRows>,
}

impl IdentityMap {
    pub(crate) fn get<T: Table>(&self, id: i64) -> OrmResult<Option<Arc<RowCell<T>>>> {
        let Some(row) = self.tables.get(T::TABLE).and_then(|rows| rows.get(&id)) else {
            return Ok(None);
        };
        Arc::clone(row)
            .into_any()
            .downcast::<RowCell<T>>()
            .map(Some)
            .map_err(|_| {
                OrmError::Other(format!(
                    "table {} is cached with a row type other than {}",
                    T::TABLE,
                    T::entity_name()
                ))
            })
    }

    pub(crate) fn contains(&self, table: &str, id: i64) -> bool {
        self.tables
            .get(table)
            .is_some_and(|rows| rows.contains_key(&id))
    }

    /// Cache a freshly hydrated row. An existing entry for the same id is kept.
    pub(crate) fn insert<T: Table>(&mut self, cell: Arc<RowCell<T>>) {
        self.tables
            .entry(T::TABLE)
            .or_default()
            .entry(cell.id())
            .or_insert(cell);
    }

    pub(crate) fn remove(&mut self, table: &str, id: i64) -> Option<Arc<dyn CachedRow>> {
        self.tables.get_mut(table)?.remove(&id)
    }

    pub(crate) fn take_table(&mut self, table: &str) -> CachedRows {
        self.tables.remove(table).unwrap_or_default()
    }

    pub(crate) fn take_all(&mut self) -> HashMap<&'static str, CachedRows> {
        std::mem::take(&mut self.tables)
    }

    pub(crate) fn len(&self, table: &str) -> usize {
        self.tables.get(table).map_or(0, HashMap::len)
    }

    /// Every cached row, for flushing outside the map lock.
    pub(crate) fn snapshot(&self) -> Vec<Arc<dyn CachedRow>> {
        self.tables
            .values()
            .flat_map(|rows| rows.values().cloned())
            .collect()
    }

    pub(crate) fn rows(&self) -> impl Iterator<Item = &Arc<dyn CachedRow>> {
        self.tables.values().flat_map(HashMap::values)
    }
}
