use chrono::{DateTime, Local};
use std::fmt;
use std::time::Duration;

/// The type of SQL statement being executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Delete,
    /// Other SQL (e.g., DDL, `SET NAMES`)
    Other,
}

impl QueryType {
    /// Detect the statement type from its leading keyword.
    pub fn from_sql(sql: &str) -> Self {
        let trimmed = sql.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if starts_with_keyword(trimmed, "SELECT") {
            QueryType::Select
        } else if starts_with_keyword(trimmed, "INSERT") || starts_with_keyword(trimmed, "REPLACE")
        {
            QueryType::Insert
        } else if starts_with_keyword(trimmed, "UPDATE") {
            QueryType::Update
        } else if starts_with_keyword(trimmed, "DELETE") {
            QueryType::Delete
        } else {
            QueryType::Other
        }
    }
}

fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.get(..keyword.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(keyword))
        && sql[keyword.len()..]
            .chars()
            .next()
            .is_none_or(|c| !c.is_ascii_alphanumeric() && c != '_')
}

/// Maximum length for error messages in `QueryOutcome::Error`.
const MAX_ERROR_LEN: usize = 512;

/// Outcome of a statement, for monitoring purposes.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Statement returned rows.
    Rows(usize),
    /// Statement changed rows.
    Affected(u64),
    /// Statement failed (message truncated to 512 bytes).
    Error(String),
}

impl QueryOutcome {
    /// Create an error outcome, truncating the message to avoid monitoring data explosion.
    pub fn error(msg: String) -> Self {
        if msg.len() > MAX_ERROR_LEN {
            let truncated = super::truncate_sql_bytes(&msg, MAX_ERROR_LEN);
            Self::Error(format!("{truncated}..."))
        } else {
            Self::Error(msg)
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

impl fmt::Display for QueryOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueryOutcome::Rows(n) => write!(f, "{n} rows"),
            QueryOutcome::Affected(n) => write!(f, "{n} affected"),
            QueryOutcome::Error(e) => write!(f, "error: {e}"),
        }
    }
}

/// One executed statement.
#[derive(Debug, Clone)]
pub struct QueryEntry {
    /// When the statement finished.
    pub at: DateTime<Local>,
    pub duration: Duration,
    pub sql: String,
    pub query_type: QueryType,
    pub outcome: QueryOutcome,
}

impl QueryEntry {
    pub fn new(sql: &str, duration: Duration, outcome: QueryOutcome) -> Self {
        Self {
            at: Local::now(),
            duration,
            sql: sql.to_string(),
            query_type: QueryType::from_sql(sql),
            outcome,
        }
    }

    /// `[2024.01.31 12:00:00:123456|1.250] SELECT ...` with newlines flattened.
    pub fn log_line(&self) -> String {
        format!(
            "[{}|{:.3}] {}\n",
            self.at.format("%Y.%m.%d %H:%M:%S:%6f"),
            self.duration.as_secs_f64() * 1000.0,
            self.sql.replace(['\r', '\n'], " ")
        )
    }
}

/// Trait for observing SQL execution.
///
/// Implement this trait to collect metrics, log queries, or integrate with observability
/// systems. Implementations must not panic.
pub trait QueryMonitor: Send + Sync {
    /// Called after every statement, successful or not.
    fn on_query_complete(&self, entry: &QueryEntry);

    /// Called when a statement exceeded the configured slow-query threshold.
    ///
    /// Default implementation does nothing.
    fn on_slow_query(&self, _entry: &QueryEntry) {}
}
