//! The narrow connection contract consumed by the executor.
//!
//! Socket handling, authentication and result decoding belong to the driver. rowmap only
//! needs "run this SQL text, give me rows or an error" plus the id of the last insert.

use crate::record::Record;
use std::fmt;

/// MySQL `ER_DUP_ENTRY`.
pub const ER_DUP_ENTRY: u16 = 1062;

/// MySQL `ER_DUP_ENTRY_WITH_KEY_NAME`.
pub const ER_DUP_ENTRY_WITH_KEY_NAME: u16 = 1586;

/// A database connection able to execute SQL text.
///
/// Implementations wrap a real driver; the executor owns exactly one connection and uses it
/// from one thread at a time.
pub trait Connection: Send {
    /// Execute a statement and return its tabular result.
    fn execute(&mut self, sql: &str) -> Result<ResultSet, DriverError>;

    /// Auto-generated primary key of the last successful insert on this connection.
    fn last_insert_id(&self) -> u64;
}

impl<C: Connection + ?Sized> Connection for Box<C> {
    fn execute(&mut self, sql: &str) -> Result<ResultSet, DriverError> {
        (**self).execute(sql)
    }

    fn last_insert_id(&self) -> u64 {
        (**self).last_insert_id()
    }
}

/// Result of one executed statement.
///
/// Row-returning statements fill `rows`; mutations report `affected_rows`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    rows: Vec<Record>,
    affected_rows: u64,
}

impl ResultSet {
    /// An empty result (no rows, nothing affected).
    pub fn empty() -> Self {
        Self::default()
    }

    /// A row-returning result.
    pub fn from_rows(rows: Vec<Record>) -> Self {
        let affected_rows = rows.len() as u64;
        Self {
            rows,
            affected_rows,
        }
    }

    /// A mutation result.
    pub fn affected(affected_rows: u64) -> Self {
        Self {
            rows: Vec::new(),
            affected_rows,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn affected_rows(&self) -> u64 {
        self.affected_rows
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn first(&self) -> Option<&Record> {
        self.rows.first()
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }
}

impl IntoIterator for ResultSet {
    type Item = Record;
    type IntoIter = std::vec::IntoIter<Record>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.into_iter()
    }
}

/// An execution failure reported by the driver.
///
/// A single response may carry several errors; they are chained through `previous`, with the
/// outermost (last reported) error on top. Only the outermost error carries the query text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DriverError {
    /// Numeric driver error code (e.g. `1062`).
    pub code: u16,
    /// Five-character SQL state (e.g. `23000`).
    pub sqlstate: String,
    pub message: String,
    /// The statement that failed.
    pub query: Option<String>,
    pub previous: Option<Box<DriverError>>,
}

impl DriverError {
    pub fn new(code: u16, sqlstate: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code,
            sqlstate: sqlstate.into(),
            message: message.into(),
            query: None,
            previous: None,
        }
    }

    /// Fold a driver's error list into one chain.
    ///
    /// Each error becomes the `previous` of the one reported after it; returns `None` for an
    /// empty list.
    pub fn chain(errors: impl IntoIterator<Item = DriverError>) -> Option<Self> {
        errors.into_iter().fold(None, |previous, mut err| {
            err.previous = previous.map(Box::new);
            Some(err)
        })
    }

    /// Attach the offending statement to this (outermost) error.
    pub fn with_query(mut self, sql: impl Into<String>) -> Self {
        self.query = Some(sql.into());
        self
    }

    /// Whether any error in the chain is a uniqueness-constraint violation.
    pub fn is_duplicate_entry(&self) -> bool {
        self.iter()
            .any(|err| matches!(err.code, ER_DUP_ENTRY | ER_DUP_ENTRY_WITH_KEY_NAME))
    }

    /// Iterate the chain, outermost first.
    pub fn iter(&self) -> impl Iterator<Item = &DriverError> {
        std::iter::successors(Some(self), |err| err.previous.as_deref())
    }
}

impl fmt::Display for DriverError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} ({}): {}", self.code, self.sqlstate, self.message)?;
        if let Some(query) = &self.query {
            write!(f, " in query {query}")?;
        }
        Ok(())
    }
}

impl std::error::Error for DriverError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.previous
            .as_deref()
            .map(|err| err as &(dyn std::error::Error + 'static))
    }
}
