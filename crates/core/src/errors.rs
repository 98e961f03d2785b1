//! Error types shared by the persistence engine and its storage backends.

use thiserror::Error;

use crate::sync::OperationKind;

/// Result type alias for persistence operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced to callers of the persister.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed input, detected before any statement reaches the store.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Failure raised by the relational store or the connection pool.
    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    /// Malformed connection source or pool settings.
    #[error("Configuration error: {0}")]
    Config(String),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The caller stopped waiting before the batch committed; it was rolled back.
    #[error("Batch abandoned by the caller before commit")]
    Cancelled,

    /// Failure of one operation inside a batch, with its position and target row.
    #[error("Operation #{index} on {table}/{id} failed: {source}")]
    Operation {
        index: usize,
        table: String,
        id: String,
        source: Box<Error>,
    },
}

impl Error {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Attach batch position and target row to an error raised by one operation.
    pub fn in_operation(self, index: usize, table: &str, id: &str) -> Self {
        Self::Operation {
            index,
            table: table.to_string(),
            id: id.to_string(),
            source: Box::new(self),
        }
    }

    /// The error without any per-operation wrapping.
    pub fn root(&self) -> &Error {
        match self {
            Self::Operation { source, .. } => source.root(),
            other => other,
        }
    }

    /// Index of the failing operation, when the error came from a batch.
    pub fn operation_index(&self) -> Option<usize> {
        match self {
            Self::Operation { index, .. } => Some(*index),
            _ => None,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.root(), Self::Validation(_))
    }

    pub fn is_database(&self) -> bool {
        matches!(self.root(), Self::Database(_))
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self.root(), Self::Cancelled)
    }
}

/// Input rejected before touching the store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("batch contains no operations")]
    EmptyBatch,

    #[error("operation is missing a table name")]
    MissingTable,

    #[error("operation is missing a row id")]
    MissingId,

    #[error("{0} operation requires a non-empty field map")]
    MissingFields(OperationKind),

    #[error("no updatable columns for {table}/{id}")]
    NoUpdatableColumns { table: String, id: String },

    #[error("unknown operation kind '{0}'")]
    UnknownKind(String),

    #[error("invalid identifier '{identifier}': {reason}")]
    InvalidIdentifier {
        identifier: String,
        reason: &'static str,
    },

    #[error("table '{0}' is not enabled for sync writes")]
    TableNotAllowed(String),

    #[error("checkpoint key is missing {0}")]
    MissingCheckpointKey(&'static str),
}

/// Store-side failures, classified from the backend driver's errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatabaseError {
    #[error("Failed to connect: {0}")]
    ConnectionFailed(String),

    #[error("Failed to check out a pooled connection: {0}")]
    PoolCheckout(String),

    #[error("Unique constraint violated: {0}")]
    UniqueViolation(String),

    #[error("Foreign key constraint violated: {0}")]
    ForeignKeyViolation(String),

    #[error("Constraint violated: {0}")]
    ConstraintViolation(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Internal error: {0}")]
    Internal(String),
}
