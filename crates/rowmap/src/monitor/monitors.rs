use super::truncate_sql_bytes;
use super::types::{QueryEntry, QueryMonitor, QueryType};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tracing::Level;

/// Appends one line per statement to a file.
///
/// The file is opened in append mode for every entry, so external rotation is safe. Write
/// failures are reported through `tracing` and otherwise ignored.
#[derive(Debug, Clone)]
pub struct FileLogMonitor {
    path: PathBuf,
}

impl FileLogMonitor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, line: &str) -> std::io::Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(line.as_bytes())
    }
}

impl QueryMonitor for FileLogMonitor {
    fn on_query_complete(&self, entry: &QueryEntry) {
        if let Err(err) = self.append(&entry.log_line()) {
            tracing::warn!(
                target: "rowmap::sql",
                path = %self.path.display(),
                error = %err,
                "failed to append to query log"
            );
        }
    }
}

/// Keeps every entry in memory.
///
/// Share it with the executor through an `Arc` and read it back with [`MemoryLog::entries`].
#[derive(Debug, Default)]
pub struct MemoryLog {
    entries: Mutex<Vec<QueryEntry>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the recorded entries, oldest first.
    pub fn entries(&self) -> Vec<QueryEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Recorded statements, oldest first.
    pub fn statements(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .map(|entry| entry.sql.clone())
            .collect()
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl QueryMonitor for MemoryLog {
    fn on_query_complete(&self, entry: &QueryEntry) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
    }
}

/// Emits every statement as a `tracing` event on target `rowmap::sql`.
#[derive(Debug, Clone)]
pub struct TracingMonitor {
    /// Tracing event level to emit at.
    pub level: Level,
    /// Truncate long SQL strings (in bytes). `None` means no truncation.
    pub max_sql_length: Option<usize>,
}

impl Default for TracingMonitor {
    fn default() -> Self {
        Self {
            level: Level::DEBUG,
            max_sql_length: Some(200),
        }
    }
}

impl TracingMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the tracing event level.
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Set maximum SQL length to display.
    pub fn max_sql_length(mut self, len: usize) -> Self {
        self.max_sql_length = Some(len);
        self
    }

    /// Disable SQL truncation.
    pub fn no_truncate(mut self) -> Self {
        self.max_sql_length = None;
        self
    }

    pub(crate) fn truncate_sql(&self, sql: &str) -> String {
        match self.max_sql_length {
            Some(max) if sql.len() > max => format!("{}...", truncate_sql_bytes(sql, max)),
            _ => sql.to_string(),
        }
    }
}

impl QueryMonitor for TracingMonitor {
    fn on_query_complete(&self, entry: &QueryEntry) {
        /// Dispatch a tracing event at a runtime-determined level.
        macro_rules! emit_at_level {
            ($level:expr, $($field:tt)*) => {
                match $level {
                    Level::ERROR => tracing::error!($($field)*),
                    Level::WARN  => tracing::warn!($($field)*),
                    Level::INFO  => tracing::info!($($field)*),
                    Level::DEBUG => tracing::debug!($($field)*),
                    Level::TRACE => tracing::trace!($($field)*),
                }
            };
        }

        let sql = self.truncate_sql(&entry.sql);
        emit_at_level!(
            self.level,
            target: "rowmap::sql",
            query_type = ?entry.query_type,
            duration_ms = entry.duration.as_secs_f64() * 1000.0,
            outcome = %entry.outcome,
            sql = %sql,
        );
    }

    fn on_slow_query(&self, entry: &QueryEntry) {
        let sql = self.truncate_sql(&entry.sql);
        tracing::warn!(
            target: "rowmap::sql",
            query_type = ?entry.query_type,
            duration_ms = entry.duration.as_secs_f64() * 1000.0,
            sql = %sql,
            "slow query"
        );
    }
}

/// A monitor that tracks query statistics.
#[derive(Debug, Default)]
pub struct StatsMonitor {
    total_queries: AtomicU64,
    failed_queries: AtomicU64,
    slow_queries: AtomicU64,
    total_duration_nanos: AtomicU64,
    select_count: AtomicU64,
    insert_count: AtomicU64,
    update_count: AtomicU64,
    delete_count: AtomicU64,
    max_duration_nanos: AtomicU64,
    slowest_query: Mutex<Option<String>>,
}

/// Collected query statistics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryStats {
    /// Total number of statements executed.
    pub total_queries: u64,
    /// Number of statements the driver rejected.
    pub failed_queries: u64,
    /// Number of statements over the slow-query threshold.
    pub slow_queries: u64,
    /// Total execution time.
    pub total_duration: Duration,
    pub select_count: u64,
    pub insert_count: u64,
    pub update_count: u64,
    pub delete_count: u64,
    /// Slowest statement duration.
    pub max_duration: Duration,
    /// Slowest statement SQL.
    pub slowest_query: Option<String>,
}

impl StatsMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a snapshot of current statistics.
    pub fn stats(&self) -> QueryStats {
        QueryStats {
            total_queries: self.total_queries.load(Ordering::Relaxed),
            failed_queries: self.failed_queries.load(Ordering::Relaxed),
            slow_queries: self.slow_queries.load(Ordering::Relaxed),
            total_duration: Duration::from_nanos(self.total_duration_nanos.load(Ordering::Relaxed)),
            select_count: self.select_count.load(Ordering::Relaxed),
            insert_count: self.insert_count.load(Ordering::Relaxed),
            update_count: self.update_count.load(Ordering::Relaxed),
            delete_count: self.delete_count.load(Ordering::Relaxed),
            max_duration: Duration::from_nanos(self.max_duration_nanos.load(Ordering::Relaxed)),
            slowest_query: self
                .slowest_query
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone(),
        }
    }

    /// Reset all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.total_queries,
            &self.failed_queries,
            &self.slow_queries,
            &self.total_duration_nanos,
            &self.select_count,
            &self.insert_count,
            &self.update_count,
            &self.delete_count,
            &self.max_duration_nanos,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        *self
            .slowest_query
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = None;
    }
}

impl QueryMonitor for StatsMonitor {
    fn on_query_complete(&self, entry: &QueryEntry) {
        self.total_queries.fetch_add(1, Ordering::Relaxed);
        if entry.outcome.is_error() {
            self.failed_queries.fetch_add(1, Ordering::Relaxed);
        }

        let nanos = u64::try_from(entry.duration.as_nanos()).unwrap_or(u64::MAX);
        self.total_duration_nanos.fetch_add(nanos, Ordering::Relaxed);

        let counter = match entry.query_type {
            QueryType::Select => Some(&self.select_count),
            QueryType::Insert => Some(&self.insert_count),
            QueryType::Update => Some(&self.update_count),
            QueryType::Delete => Some(&self.delete_count),
            QueryType::Other => None,
        };
        if let Some(counter) = counter {
            counter.fetch_add(1, Ordering::Relaxed);
        }

        let previous_max = self.max_duration_nanos.fetch_max(nanos, Ordering::Relaxed);
        if nanos > previous_max {
            *self
                .slowest_query
                .lock()
                .unwrap_or_else(PoisonError::into_inner) = Some(entry.sql.clone());
        }
    }

    fn on_slow_query(&self, _entry: &QueryEntry) {
        self.slow_queries.fetch_add(1, Ordering::Relaxed);
    }
}
