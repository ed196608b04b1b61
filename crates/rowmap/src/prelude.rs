//! Convenient imports for typical `rowmap` usage.
//!
//! ```ignore
//! use rowmap::prelude::*;
//! ```

pub use crate::{
    Assignments, Connection, Database, Executor, ExecutorConfig, FilterValue, Filters, OrmError,
    OrmResult, Record, Row, RowRef, Selection, SortDirection, Table, Value,
};
