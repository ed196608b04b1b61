//! # rowmap
//!
//! A small MySQL-dialect data access layer with an identity-mapped row cache.
//!
//! ## Features
//!
//! - **Descriptor-driven SQL**: filters and updates are plain values rendered into escaped SQL
//! - **Identity map**: one live instance per `(table, id)`, however it was looked up
//! - **Dirty tracking**: field edits are coalesced into a single `UPDATE` on save or release
//! - **Query monitoring**: file log, in-memory log, `tracing` events and statistics
//! - **Pluggable driver**: anything implementing [`Connection`] can execute the SQL
//!
//! ## Filters
//!
//! ```ignore
//! use rowmap::{Filters, Executor, SelectParams, SortDirection};
//!
//! let filters = Filters::new()
//!     .eq("status", "active")
//!     .in_set("role", ["admin", "owner"])
//!     .is_null("deleted_at");
//! let rows = executor.select(
//!     "users",
//!     Some(&filters),
//!     &SelectParams::new().order_by("name", SortDirection::Asc).limit(20),
//! )?;
//! ```
//!
//! ## Rows
//!
//! ```ignore
//! use rowmap::{Assignments, Database, Filters};
//!
//! let db = Database::connect(conn);
//! db.require_unique::<User>(&Filters::new().eq("email", "ann@example.com"))?;
//! let user = db.create::<User>(None, Assignments::new().with("email", "ann@example.com"), None)?;
//! user.set_field("name", |u| &mut u.name, "Ann".to_string());
//! user.save()?;
//! ```

pub mod config;
pub mod conn;
pub mod error;
pub mod escape;
pub mod executor;
pub mod filter;
pub mod ident;
pub mod monitor;
pub mod prelude;
pub mod record;
pub mod render;
pub mod row;
pub mod selection;
pub mod value;

mod cache;
mod database;

pub use config::ExecutorConfig;
pub use conn::{Connection, DriverError, ER_DUP_ENTRY, ER_DUP_ENTRY_WITH_KEY_NAME, ResultSet};
pub use database::Database;
pub use error::{OrmError, OrmResult};
pub use escape::{escape, quote};
pub use executor::Executor;
pub use filter::{AssignmentEntry, Assignments, BoolOp, Datum, FilterEntry, FilterValue, Filters};
pub use ident::Ident;
pub use monitor::{
    FileLogMonitor, MemoryLog, QueryEntry, QueryMonitor, QueryOutcome, QueryStats, QueryType,
    StatsMonitor, TracingMonitor,
};
pub use record::Record;
pub use render::{render_assignment, render_predicate, search_expression, where_in_subquery};
pub use row::{COL_CREATION_DATE, COL_ID, Row, RowState, Table};
pub use selection::{SelectParams, Selection, SortDirection};
pub use value::{RowRef, Value};

use std::sync::{Mutex, MutexGuard, PoisonError};

/// Lock a mutex, recovering the data if a previous holder panicked.
pub(crate) fn lock<T: ?Sized>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
