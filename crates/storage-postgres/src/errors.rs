//! Conversion of diesel/r2d2 failures into the engine's error taxonomy.

use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use syncpush_core::errors::{DatabaseError, Error};

#[derive(Debug, Error)]
pub enum StorageError {
    /// Engine error raised inside a transaction closure.
    #[error(transparent)]
    Core(#[from] Error),

    #[error("Query failed: {0}")]
    Query(#[from] DieselError),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

fn classify_query_error(err: DieselError) -> DatabaseError {
    match err {
        DieselError::DatabaseError(kind, info) => {
            let message = match info.constraint_name() {
                Some(constraint) => format!("{} ({})", info.message(), constraint),
                None => info.message().to_string(),
            };
            match kind {
                DatabaseErrorKind::UniqueViolation => DatabaseError::UniqueViolation(message),
                DatabaseErrorKind::ForeignKeyViolation => {
                    DatabaseError::ForeignKeyViolation(message)
                }
                DatabaseErrorKind::NotNullViolation | DatabaseErrorKind::CheckViolation => {
                    DatabaseError::ConstraintViolation(message)
                }
                DatabaseErrorKind::ClosedConnection => DatabaseError::ConnectionFailed(message),
                _ => DatabaseError::Query(message),
            }
        }
        other => DatabaseError::Query(other.to_string()),
    }
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Core(err) => err,
            StorageError::Query(err) => Error::Database(classify_query_error(err)),
            StorageError::Connection(err) => {
                Error::Database(DatabaseError::ConnectionFailed(err.to_string()))
            }
            StorageError::Pool(err) => {
                Error::Database(DatabaseError::PoolCheckout(err.to_string()))
            }
        }
    }
}
