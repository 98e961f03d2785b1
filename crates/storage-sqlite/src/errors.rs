use diesel::result::{DatabaseErrorKind, Error as DieselError};
use thiserror::Error;

use syncpush_core::errors::{DatabaseError, Error};

#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Core(#[from] Error),

    #[error("Query failed: {0}")]
    Query(#[from] DieselError),

    #[error("Connection failed: {0}")]
    Connection(#[from] diesel::ConnectionError),

    #[error("Pool error: {0}")]
    Pool(#[from] diesel::r2d2::PoolError),
}

impl From<StorageError> for Error {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Core(err) => err,
            StorageError::Query(DieselError::DatabaseError(kind, info)) => {
                let message = info.message().to_string();
                let err = match kind {
                    DatabaseErrorKind::UniqueViolation => DatabaseError::UniqueViolation(message),
                    DatabaseErrorKind::ForeignKeyViolation => {
                        DatabaseError::ForeignKeyViolation(message)
                    }
                    DatabaseErrorKind::NotNullViolation | DatabaseErrorKind::CheckViolation => {
                        DatabaseError::ConstraintViolation(message)
                    }
                    _ => DatabaseError::Query(message),
                };
                Error::Database(err)
            }
            StorageError::Query(err) => Error::Database(DatabaseError::Query(err.to_string())),
            StorageError::Connection(err) => {
                Error::Database(DatabaseError::ConnectionFailed(err.to_string()))
            }
            StorageError::Pool(err) => {
                Error::Database(DatabaseError::PoolCheckout(err.to_string()))
            }
        }
    }
}
