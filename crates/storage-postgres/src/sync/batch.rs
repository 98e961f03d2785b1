use std::sync::Arc;

use diesel::pg::PgConnection;
use diesel::Connection;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use syncpush_core::errors::{Error, Result};
use syncpush_core::sync::{Batch, Operation, TablePolicy};

use super::statements::build_statement;
use crate::db::{get_connection, DbPool};
use crate::errors::StorageError;

fn apply_operation(conn: &mut PgConnection, operation: &Operation) -> Result<usize> {
    let statement = build_statement(operation)?;
    debug!(
        "{} {}/{}: {}",
        operation.kind,
        operation.table,
        operation.id,
        statement.sql()
    );
    Ok(statement.execute(conn).map_err(StorageError::from)?)
}

/// Apply each operation in order on `conn`. The caller owns the transaction.
///
/// Stops with [`Error::Cancelled`] once `cancel` fires, including after the
/// last operation, so an abandoned batch never reaches commit.
pub fn apply_operations(
    conn: &mut PgConnection,
    batch: &Batch,
    cancel: &CancellationToken,
) -> Result<()> {
    for (index, operation) in batch.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled.in_operation(index, &operation.table, &operation.id));
        }
        apply_operation(conn, operation)
            .map_err(|err| err.in_operation(index, &operation.table, &operation.id))?;
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

/// Runs whole batches inside a single transaction.
pub struct BatchExecutor {
    pool: Arc<DbPool>,
    policy: TablePolicy,
}

impl BatchExecutor {
    pub fn new(pool: Arc<DbPool>, policy: TablePolicy) -> Self {
        Self { pool, policy }
    }

    pub fn policy(&self) -> &TablePolicy {
        &self.policy
    }

    /// Validate, then commit every operation or none of them.
    ///
    /// Validation runs before a connection is checked out, so a batch that can
    /// never succeed does not hold a pool slot or open a transaction.
    pub fn apply(&self, batch: &Batch, cancel: &CancellationToken) -> Result<()> {
        batch.validate(&self.policy)?;
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        let mut pooled = get_connection(&self.pool)?;
        let conn: &mut PgConnection = &mut pooled;
        let outcome = conn.transaction::<_, StorageError, _>(|tx| {
            apply_operations(tx, batch, cancel).map_err(StorageError::from)
        });

        match outcome {
            Ok(()) => {
                info!("Committed batch of {} operation(s)", batch.len());
                Ok(())
            }
            Err(err) => {
                let err = Error::from(err);
                warn!("Rolled back batch of {} operation(s): {}", batch.len(), err);
                Err(err)
            }
        }
    }
}
