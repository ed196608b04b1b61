//! Error types for rowmap

use crate::conn::DriverError;
use crate::filter::Filters;
use thiserror::Error;

/// Result type alias for rowmap operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for database operations
#[derive(Debug, Error)]
pub enum OrmError {
    /// A filter/update value or identifier that cannot be rendered as SQL.
    ///
    /// Always a programming error; raised before any SQL is sent.
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    /// The connection reported an execution failure.
    #[error("Driver error: {0}")]
    Driver(#[source] DriverError),

    /// Unique constraint violation reported by the driver during an insert.
    #[error("Duplicate entry: {0}")]
    Duplicate(#[source] DriverError),

    /// A row matching the uniqueness guard already exists.
    #[error("{entity} already exists with fields values {fields}")]
    AlreadyExists { entity: String, fields: Filters },

    /// Invalid selection/pagination usage.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Row not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Record decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a malformed input error
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::MalformedInput(message.into())
    }

    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    /// Check if this is a duplicate entry error
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Duplicate(_))
    }

    /// Check if this is an already-exists error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// The driver's numeric error code, if this error came from the connection.
    pub fn driver_code(&self) -> Option<u16> {
        match self {
            Self::Driver(err) | Self::Duplicate(err) => Some(err.code),
            _ => None,
        }
    }

    /// Translate a failed insert: uniqueness violations become [`OrmError::Duplicate`].
    pub(crate) fn from_insert_failure(err: DriverError) -> Self {
        if err.is_duplicate_entry() {
            Self::Duplicate(err)
        } else {
            Self::Driver(err)
        }
    }
}

impl From<DriverError> for OrmError {
    fn from(err: DriverError) -> Self {
        Self::Driver(err)
    }
}
