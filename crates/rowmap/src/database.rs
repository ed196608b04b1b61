//! The `Database` service: one executor plus the identity map of live rows.

use crate::cache::{CachedRow, IdentityMap};
use crate::conn::Connection;
use crate::error::{OrmError, OrmResult};
use crate::executor::Executor;
use crate::filter::{Assignments, Filters};
use crate::lock;
use crate::record::Record;
use crate::row::{COL_CREATION_DATE, COL_ID, Row, RowCell, Table};
use crate::selection::{SelectParams, Selection, SortDirection};
use chrono::Utc;
use std::sync::{Arc, Mutex};

pub(crate) struct Shared {
    pub(crate) executor: Mutex<Executor>,
    pub(crate) cache: Mutex<IdentityMap>,
    release_failures: Mutex<Vec<OrmError>>,
}

impl Shared {
    pub(crate) fn record_release_failure(&self, err: OrmError) {
        lock(&self.release_failures).push(err);
    }
}

impl Drop for Shared {
    fn drop(&mut self) {
        let executor = self
            .executor
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let cache = self
            .cache
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        for row in cache.rows().filter(|row| row.is_dirty()) {
            if let Err(err) = row.flush_into(executor) {
                tracing::error!(
                    target: "rowmap::cache",
                    table = row.table(),
                    error = %err,
                    "failed to save row while closing the database"
                );
                row.discard();
            }
        }
    }
}

/// Identity-mapped access to table rows over one connection.
///
/// Cloning is cheap and every clone shares the same executor and cache. Two lookups of the
/// same `(table, id)` through any method return handles to the same instance for as long as
/// the row stays cached.
///
/// # Example
/// ```ignore
/// let db = Database::connect(conn);
/// let user = db.require_by_id::<User>(7)?;
/// assert!(Row::ptr_eq(&user, &db.require_by_id::<User>(7)?));
/// ```
#[derive(Clone)]
pub struct Database {
    shared: Arc<Shared>,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("executor", &*lock(&self.shared.executor))
            .finish_non_exhaustive()
    }
}

impl Database {
    pub fn new(executor: Executor) -> Self {
        Self {
            shared: Arc::new(Shared {
                executor: Mutex::new(executor),
                cache: Mutex::new(IdentityMap::default()),
                release_failures: Mutex::new(Vec::new()),
            }),
        }
    }

    /// A database over `conn` with a default [`Executor`].
    pub fn connect(conn: impl Connection + 'static) -> Self {
        Self::new(Executor::new(conn))
    }

    /// Run `f` with exclusive access to the executor.
    ///
    /// Row handles must not be saved or dropped from inside `f`.
    pub fn with_executor<R>(&self, f: impl FnOnce(&mut Executor) -> R) -> R {
        f(&mut *lock(&self.shared.executor))
    }

    pub fn queries_count(&self) -> u64 {
        lock(&self.shared.executor).queries_count()
    }

    /// Errors from rows that failed to save when their last handle was dropped.
    pub fn take_release_failures(&self) -> Vec<OrmError> {
        std::mem::take(&mut *lock(&self.shared.release_failures))
    }

    /// Return the cached row or hydrate it from `record`. Called with the map lock held.
    fn adopt<T: Table>(&self, cache: &mut IdentityMap, record: &Record) -> OrmResult<Row<T>> {
        let id = record.get_i64(COL_ID)?;
        if let Some(cell) = cache.get::<T>(id)? {
            return Ok(Row::from_cell(cell));
        }
        let cell = Arc::new(RowCell::hydrate(record, Arc::downgrade(&self.shared))?);
        cache.insert(Arc::clone(&cell));
        Ok(Row::from_cell(cell))
    }

    /// The row with `id`, from the cache or the database.
    pub fn get_or_fetch<T: Table>(&self, id: i64) -> OrmResult<Option<Row<T>>> {
        let mut cache = lock(&self.shared.cache);
        if let Some(cell) = cache.get::<T>(id)? {
            tracing::trace!(target: "rowmap::cache", table = T::TABLE, id, "cache hit");
            return Ok(Some(Row::from_cell(cell)));
        }
        tracing::trace!(target: "rowmap::cache", table = T::TABLE, id, "cache miss");

        let by_id = Filters::new().eq(COL_ID, id);
        let record = lock(&self.shared.executor).select_one(
            T::TABLE,
            Some(&by_id),
            &SelectParams::new(),
        )?;
        record
            .map(|record| self.adopt(&mut cache, &record))
            .transpose()
    }

    pub fn require_by_id<T: Table>(&self, id: i64) -> OrmResult<Row<T>> {
        self.get_or_fetch(id)?
            .ok_or_else(|| OrmError::not_found(format!("{} #{id}", T::entity_name())))
    }

    /// The first row matching `filters`.
    pub fn get_or_fetch_by_filter<T: Table>(
        &self,
        filters: &Filters,
        order: Option<&str>,
        direction: Option<SortDirection>,
        offset: Option<u64>,
    ) -> OrmResult<Option<Row<T>>> {
        let params = SelectParams {
            offset,
            order_by: order.map(str::to_string),
            direction,
            ..SelectParams::default()
        };
        let mut cache = lock(&self.shared.cache);
        let record = lock(&self.shared.executor).select_one(T::TABLE, Some(filters), &params)?;
        record
            .map(|record| self.adopt(&mut cache, &record))
            .transpose()
    }

    pub fn require_by_filter<T: Table>(
        &self,
        filters: &Filters,
        order: Option<&str>,
        direction: Option<SortDirection>,
        offset: Option<u64>,
    ) -> OrmResult<Row<T>> {
        self.get_or_fetch_by_filter(filters, order, direction, offset)?
            .ok_or_else(|| {
                OrmError::not_found(format!("{} with {filters}", T::entity_name()))
            })
    }

    /// All rows matching `filters` within `selection`, in database order.
    pub fn select_rows<T: Table>(
        &self,
        selection: Option<&Selection>,
        filters: Option<&Filters>,
    ) -> OrmResult<Vec<Row<T>>> {
        let params = selection.map(Selection::params).unwrap_or_default();
        let mut cache = lock(&self.shared.cache);
        let records = lock(&self.shared.executor).select(T::TABLE, filters, &params)?;
        records
            .iter()
            .map(|record| self.adopt(&mut cache, record))
            .collect()
    }

    /// Load every row in `ids` that is not cached yet with one query.
    ///
    /// Rows already cached are left untouched, pending edits included. Returns the number of
    /// rows added to the cache.
    pub fn bulk_cache<T: Table>(&self, ids: &[i64]) -> OrmResult<usize> {
        let mut cache = lock(&self.shared.cache);
        let mut missing: Vec<i64> = ids
            .iter()
            .copied()
            .filter(|&id| !cache.contains(T::TABLE, id))
            .collect();
        missing.sort_unstable();
        missing.dedup();
        if missing.is_empty() {
            return Ok(0);
        }

        let filters = Filters::new().in_set(COL_ID, missing);
        let records = lock(&self.shared.executor).select(
            T::TABLE,
            Some(&filters),
            &SelectParams::new(),
        )?;
        let before = cache.len(T::TABLE);
        for record in &records {
            self.adopt::<T>(&mut cache, record)?;
        }
        Ok(cache.len(T::TABLE) - before)
    }

    pub fn is_cached<T: Table>(&self, id: i64) -> bool {
        lock(&self.shared.cache).contains(T::TABLE, id)
    }

    pub fn cached_len(&self, table: &str) -> usize {
        lock(&self.shared.cache).len(table)
    }

    /// Save the row's pending edits and remove it from the cache.
    ///
    /// If the save fails the row stays cached with its edits. Returns whether the row was cached.
    pub fn evict<T: Table>(&self, id: i64) -> OrmResult<bool> {
        let cell = lock(&self.shared.cache).get::<T>(id)?;
        let Some(cell) = cell else {
            return Ok(false);
        };
        cell.save(&self.shared)?;
        let removed = lock(&self.shared.cache).remove(T::TABLE, id);
        drop(removed);
        tracing::debug!(target: "rowmap::cache", table = T::TABLE, id, "evicted");
        Ok(true)
    }

    /// Drop every cached row of `T`'s table.
    pub fn clear<T: Table>(&self) -> usize {
        self.clear_table(T::TABLE)
    }

    /// Drop every cached row of `table`. Rows without other handles save on release.
    pub fn clear_table(&self, table: &str) -> usize {
        let removed = lock(&self.shared.cache).take_table(table);
        let count = removed.len();
        drop(removed);
        tracing::debug!(target: "rowmap::cache", table, count, "cleared table cache");
        count
    }

    pub fn clear_all(&self) -> usize {
        let removed = lock(&self.shared.cache).take_all();
        let count = removed.values().map(|rows| rows.len()).sum();
        drop(removed);
        tracing::debug!(target: "rowmap::cache", count, "cleared cache");
        count
    }

    /// Save every dirty cached row. Returns the number of `UPDATE`s sent.
    pub fn flush_all(&self) -> OrmResult<usize> {
        let rows = lock(&self.shared.cache).snapshot();
        let mut saved = 0;
        for row in rows {
            if row.save(&self.shared)? {
                saved += 1;
            }
        }
        Ok(saved)
    }

    /// Insert a row and return it hydrated from the database.
    ///
    /// `creation_date` defaults to now. Uniqueness violations surface as
    /// [`OrmError::Duplicate`].
    pub fn create<T: Table>(
        &self,
        id: Option<i64>,
        mut data: Assignments,
        creation_date: Option<i64>,
    ) -> OrmResult<Row<T>> {
        if let Some(id) = id {
            data.set(COL_ID, id);
        }
        data.set(
            COL_CREATION_DATE,
            creation_date.unwrap_or_else(|| Utc::now().timestamp()),
        );

        let inserted = lock(&self.shared.executor).insert(T::TABLE, &data)?;
        let id = match id {
            Some(id) => id,
            None => i64::try_from(inserted)
                .map_err(|_| OrmError::Other(format!("insert id {inserted} out of range")))?,
        };
        self.require_by_id(id)
    }

    /// Fail with [`OrmError::AlreadyExists`] when a row matches `filters`.
    ///
    /// The check and a following insert are not atomic; rely on a unique index for a guarantee.
    pub fn require_unique<T: Table>(&self, filters: &Filters) -> OrmResult<()> {
        if lock(&self.shared.executor).exists(T::TABLE, Some(filters))? {
            return Err(OrmError::AlreadyExists {
                entity: T::entity_name().to_string(),
                fields: filters.clone(),
            });
        }
        Ok(())
    }

    pub fn exists_by_id<T: Table>(&self, id: i64) -> OrmResult<bool> {
        if self.is_cached::<T>(id) {
            return Ok(true);
        }
        let by_id = Filters::new().eq(COL_ID, id);
        lock(&self.shared.executor).exists(T::TABLE, Some(&by_id))
    }

    pub fn count<T: Table>(&self, filters: Option<&Filters>) -> OrmResult<u64> {
        lock(&self.shared.executor).count(T::TABLE, filters)
    }
}
