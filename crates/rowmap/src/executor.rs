//! Statement execution against one [`Connection`].
//!
//! Every statement goes through [`Executor::execute_raw`], which counts it, remembers it and
//! reports it to the installed monitors. The typed helpers only build SQL text.

use crate::config::ExecutorConfig;
use crate::conn::{Connection, DriverError, ResultSet};
use crate::error::{OrmError, OrmResult};
use crate::filter::{Assignments, Filters};
use crate::ident;
use crate::monitor::{
    FileLogMonitor, QueryEntry, QueryMonitor, QueryOutcome, QueryType, TracingMonitor,
};
use crate::record::Record;
use crate::render;
use crate::selection::{SelectParams, SortDirection};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// MySQL has no "no limit" keyword; an offset needs some `LIMIT` in front of it.
const MAX_LIMIT: u64 = u64::MAX;

/// Runs SQL on a connection and keeps per-connection bookkeeping.
pub struct Executor {
    conn: Box<dyn Connection>,
    queries: u64,
    last_query: Option<String>,
    monitors: Vec<Arc<dyn QueryMonitor>>,
    file_log: Option<FileLogMonitor>,
    slow_query_threshold: Option<Duration>,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("queries", &self.queries)
            .field("last_query", &self.last_query)
            .field("monitors", &self.monitors.len())
            .field("file_log", &self.file_log.as_ref().map(FileLogMonitor::path))
            .field("slow_query_threshold", &self.slow_query_threshold)
            .finish_non_exhaustive()
    }
}

impl Executor {
    /// An executor with no logging.
    pub fn new(conn: impl Connection + 'static) -> Self {
        Self {
            conn: Box::new(conn),
            queries: 0,
            last_query: None,
            monitors: Vec::new(),
            file_log: None,
            slow_query_threshold: None,
        }
    }

    pub fn with_config(conn: impl Connection + 'static, config: ExecutorConfig) -> Self {
        let mut executor = Self::new(conn);
        if let Some(path) = &config.log_file {
            executor.enable_logging(path);
        }
        if config.trace_sql {
            let mut monitor = TracingMonitor::new();
            if let Some(len) = config.max_sql_length {
                monitor = monitor.max_sql_length(len);
            }
            executor.add_monitor(Arc::new(monitor));
        }
        executor.slow_query_threshold = config.slow_query_threshold();
        executor
    }

    /// Append every following statement to the file at `path`.
    pub fn enable_logging(&mut self, path: impl Into<PathBuf>) {
        self.file_log = Some(FileLogMonitor::new(path));
    }

    pub fn disable_logging(&mut self) {
        self.file_log = None;
    }

    /// The current statement log file, if logging is enabled.
    pub fn log_path(&self) -> Option<&Path> {
        self.file_log.as_ref().map(FileLogMonitor::path)
    }

    pub fn add_monitor(&mut self, monitor: Arc<dyn QueryMonitor>) {
        self.monitors.push(monitor);
    }

    pub fn set_slow_query_threshold(&mut self, threshold: Option<Duration>) {
        self.slow_query_threshold = threshold;
    }

    /// Statements sent so far, failed ones included.
    pub fn queries_count(&self) -> u64 {
        self.queries
    }

    pub fn last_query(&self) -> Option<&str> {
        self.last_query.as_deref()
    }

    /// Auto-generated key of the last insert on the underlying connection.
    pub fn last_insert_id(&self) -> u64 {
        self.conn.last_insert_id()
    }

    fn is_monitored(&self) -> bool {
        self.file_log.is_some() || !self.monitors.is_empty()
    }

    fn report(&self, entry: &QueryEntry) {
        let slow = self
            .slow_query_threshold
            .is_some_and(|threshold| entry.duration > threshold);
        let file_log = self.file_log.iter().map(|m| m as &dyn QueryMonitor);
        let others = self.monitors.iter().map(|m| m.as_ref());
        for monitor in file_log.chain(others) {
            monitor.on_query_complete(entry);
            if slow {
                monitor.on_slow_query(entry);
            }
        }
    }

    fn run(&mut self, sql: &str) -> Result<ResultSet, DriverError> {
        self.queries += 1;
        self.last_query = Some(sql.to_string());

        let started = self.is_monitored().then(Instant::now);
        let result = self.conn.execute(sql);
        if let Some(started) = started {
            let outcome = match &result {
                Ok(rows) if QueryType::from_sql(sql) == QueryType::Select => {
                    QueryOutcome::Rows(rows.len())
                }
                Ok(rows) => QueryOutcome::Affected(rows.affected_rows()),
                Err(err) => QueryOutcome::error(err.to_string()),
            };
            self.report(&QueryEntry::new(sql, started.elapsed(), outcome));
        }

        result.map_err(|err| err.with_query(sql))
    }

    /// Send `sql` verbatim.
    pub fn execute_raw(&mut self, sql: &str) -> OrmResult<ResultSet> {
        self.run(sql).map_err(OrmError::Driver)
    }

    /// `SELECT` rows from `table`.
    pub fn select(
        &mut self,
        table: &str,
        filters: Option<&Filters>,
        params: &SelectParams,
    ) -> OrmResult<Vec<Record>> {
        let sql = select_sql(table, filters, params)?;
        Ok(self.execute_raw(&sql)?.into_rows())
    }

    /// The first matching row.
    pub fn select_one(
        &mut self,
        table: &str,
        filters: Option<&Filters>,
        params: &SelectParams,
    ) -> OrmResult<Option<Record>> {
        let params = SelectParams {
            limit: Some(1),
            ..params.clone()
        };
        Ok(self.select(table, filters, &params)?.into_iter().next())
    }

    pub fn count(&mut self, table: &str, filters: Option<&Filters>) -> OrmResult<u64> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", ident::table(table)?);
        push_where(&mut sql, filters)?;
        self.scalar_count(&sql)
    }

    pub fn exists(&mut self, table: &str, filters: Option<&Filters>) -> OrmResult<bool> {
        let mut sql = format!("SELECT COUNT(*) FROM {}", ident::table(table)?);
        push_where(&mut sql, filters)?;
        sql.push_str(" LIMIT 1");
        Ok(self.scalar_count(&sql)? > 0)
    }

    fn scalar_count(&mut self, sql: &str) -> OrmResult<u64> {
        let result = self.execute_raw(sql)?;
        let count = result
            .first()
            .and_then(Record::first_value)
            .and_then(|value| value.as_i64())
            .ok_or_else(|| OrmError::decode("COUNT(*)", "expected one integer column"))?;
        u64::try_from(count).map_err(|_| OrmError::decode("COUNT(*)", "negative count"))
    }

    /// `INSERT INTO table SET ...`, returning the generated key.
    ///
    /// Uniqueness violations surface as [`OrmError::Duplicate`].
    pub fn insert(&mut self, table: &str, data: &Assignments) -> OrmResult<u64> {
        let assignments = render::require_assignments(data, "INSERT")?;
        let sql = format!("INSERT INTO {} SET {assignments}", ident::table(table)?);
        self.run(&sql).map_err(OrmError::from_insert_failure)?;
        Ok(self.conn.last_insert_id())
    }

    /// `UPDATE`, returning the number of affected rows.
    pub fn update(
        &mut self,
        table: &str,
        data: &Assignments,
        filters: Option<&Filters>,
        limit: Option<u64>,
    ) -> OrmResult<u64> {
        let assignments = render::require_assignments(data, "UPDATE")?;
        let mut sql = format!("UPDATE {} SET {assignments}", ident::table(table)?);
        push_where(&mut sql, filters)?;
        push_limit(&mut sql, limit);
        Ok(self.execute_raw(&sql)?.affected_rows())
    }

    /// `DELETE`, returning the number of affected rows.
    ///
    /// Without filters every row of the table is deleted.
    pub fn delete(
        &mut self,
        table: &str,
        filters: Option<&Filters>,
        limit: Option<u64>,
    ) -> OrmResult<u64> {
        let mut sql = format!("DELETE FROM {}", ident::table(table)?);
        push_where(&mut sql, filters)?;
        push_limit(&mut sql, limit);
        Ok(self.execute_raw(&sql)?.affected_rows())
    }
}

fn push_where(sql: &mut String, filters: Option<&Filters>) -> OrmResult<()> {
    if let Some(filters) = filters {
        sql.push_str(" WHERE ");
        sql.push_str(&filters.to_predicate()?);
    }
    Ok(())
}

fn push_limit(sql: &mut String, limit: Option<u64>) {
    if let Some(limit) = limit {
        sql.push_str(&format!(" LIMIT {limit}"));
    }
}

pub(crate) fn select_sql(
    table: &str,
    filters: Option<&Filters>,
    params: &SelectParams,
) -> OrmResult<String> {
    let columns = params.columns_raw.as_deref().unwrap_or("*");
    let mut sql = format!("SELECT {columns} FROM {}", ident::table(table)?);
    push_where(&mut sql, filters)?;

    if let Some(order) = &params.order_by_raw {
        sql.push_str(" ORDER BY ");
        sql.push_str(order);
    } else if let Some(column) = &params.order_by {
        let direction = params.direction.unwrap_or(SortDirection::Asc);
        sql.push_str(&format!(" ORDER BY {} {direction}", ident::column(column)?));
    }

    let offset = params.offset.filter(|&offset| offset > 0);
    match (params.limit, offset) {
        (Some(limit), _) => push_limit(&mut sql, Some(limit)),
        (None, Some(_)) => push_limit(&mut sql, Some(MAX_LIMIT)),
        (None, None) => {}
    }
    if let Some(offset) = offset {
        sql.push_str(&format!(" OFFSET {offset}"));
    }
    Ok(sql)
}
