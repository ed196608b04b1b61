//! Query monitoring for SQL execution.
//!
//! The executor builds a [`QueryEntry`] for every statement when at least one monitor is
//! installed and hands it to each [`QueryMonitor`]. Monitors are a side channel: they can
//! neither change nor fail the query.
//!
//! # Example
//!
//! ```rust,ignore
//! use rowmap::monitor::{MemoryLog, StatsMonitor};
//! use std::sync::Arc;
//!
//! let log = Arc::new(MemoryLog::new());
//! let stats = Arc::new(StatsMonitor::new());
//! executor.add_monitor(log.clone());
//! executor.add_monitor(stats.clone());
//!
//! executor.count("users", None)?;
//! assert_eq!(log.entries().len(), 1);
//! assert_eq!(stats.stats().select_count, 1);
//! ```

mod monitors;
mod types;


pub use monitors::{FileLogMonitor, MemoryLog, QueryStats, StatsMonitor, TracingMonitor};
pub use types::{QueryEntry, QueryMonitor, QueryOutcome, QueryType};

pub(crate) fn truncate_sql_bytes(sql: &str, max_bytes: usize) -> &str {
    if sql.len() <= max_bytes {
        return sql;
    }
    let mut end = max_bytes;
    while end > 0 && !sql.is_char_boundary(end) {
        end -= 1;
    }
    &sql[..end]
}
