//! Error types for microrm

use std::time::Duration;
use thiserror::Error;

/// Result type alias for microrm operations
pub type OrmResult<T> = Result<T, OrmError>;

/// Error types for building and running statements
#[derive(Debug, Error)]
pub enum OrmError {
    /// The entity schema does not describe a struct with named fields
    #[error("orm: only a struct with named fields can be registered as an entity, got {0}")]
    InvalidEntityShape(String),

    /// Malformed `#[orm("...")]` field tag
    #[error("orm: invalid tag content: {0}")]
    InvalidTagContent(String),

    /// Two fields of one entity map to the same column
    #[error("orm: duplicate column {0}")]
    DuplicateColumn(String),

    /// Entity field name did not resolve against the model
    #[error("orm: unknown field {0}")]
    UnknownField(String),

    /// Result column did not resolve against the model
    #[error("orm: unknown column {0}")]
    UnknownColumn(String),

    /// Expression used where it cannot be compiled
    #[error("orm: unsupported expression {0}")]
    UnsupportedExpression(String),

    /// Assignable not supported by the dialect's upsert clause
    #[error("orm: unsupported assignable {0}")]
    UnsupportedAssignable(String),

    /// Assignable kind not valid in an UPDATE SET list
    #[error("orm: unsupported assignable type {0}")]
    UnsupportedAssignableType(String),

    /// INSERT built without any entity
    #[error("orm: insert with zero rows")]
    InsertZeroRow,

    /// UPDATE built without any SET column
    #[error("orm: no columns to update")]
    NoUpdatedColumns,

    /// `ON CONFLICT` upsert built without a conflict target
    #[error("orm: upsert needs at least one conflict column")]
    NoConflictColumns,

    /// Single-row read returned nothing
    #[error("orm: no rows in result set")]
    NoRows,

    /// Rollback after a failed transaction body failed as well
    #[error(
        "orm: rollback failed (panicked: {panicked}): cause: {source}, rollback: {rollback}"
    )]
    FailedToRollback {
        source: Box<OrmError>,
        rollback: Box<OrmError>,
        panicked: bool,
    },

    /// Transaction body panicked
    #[error("orm: transaction body panicked: {0}")]
    Panicked(String),

    /// Row decode/mapping error
    #[error("Decode error on column '{column}': {message}")]
    Decode { column: String, message: String },

    /// Raw-memory accessor applied to a model of another type
    #[error("orm: model of {model} cannot be used to access {entity}")]
    ModelMismatch { model: String, entity: String },

    /// Statement issued on a committed or rolled back transaction
    #[error("orm: transaction has already been committed or rolled back")]
    TransactionDone,

    /// Error reported by a `Driver` implementation
    #[error("Driver error: {0}")]
    Driver(String),

    /// Query execution error
    #[cfg(feature = "postgres")]
    #[error("Query error: {0}")]
    Query(#[from] tokio_postgres::Error),

    /// Query timeout error
    #[error("Query timeout after {0:?}")]
    Timeout(Duration),

    /// Other errors
    #[error("{0}")]
    Other(String),
}

impl OrmError {
    /// Create a decode error for a specific column
    pub fn decode(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            column: column.into(),
            message: message.into(),
        }
    }

    /// Create a driver error
    pub fn driver(message: impl Into<String>) -> Self {
        Self::Driver(message.into())
    }

    /// Create an unknown field error
    pub fn unknown_field(name: impl Into<String>) -> Self {
        Self::UnknownField(name.into())
    }

    /// Create an unknown column error
    pub fn unknown_column(name: impl Into<String>) -> Self {
        Self::UnknownColumn(name.into())
    }

    /// Combine a transaction failure with the error of the rollback that followed it.
    pub fn failed_to_rollback(source: OrmError, rollback: OrmError, panicked: bool) -> Self {
        Self::FailedToRollback {
            source: Box::new(source),
            rollback: Box::new(rollback),
            panicked,
        }
    }

    /// Check if this is a no rows error
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::NoRows)
    }

    /// Check if this is a timeout error
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if this is a failed rollback error
    pub fn is_failed_to_rollback(&self) -> bool {
        matches!(self, Self::FailedToRollback { .. })
    }
}
