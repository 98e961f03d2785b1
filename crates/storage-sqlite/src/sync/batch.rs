use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use syncpush_core::errors::{Error, Result};
use syncpush_core::sync::{Batch, TablePolicy};

use super::statements::build_statement;
use crate::db::WriteHandle;
use crate::errors::StorageError;

/// Apply each operation in order on `conn`. The caller owns the transaction.
///
/// Returns [`Error::Cancelled`] as soon as `cancel` fires, and once more after
/// the last operation, so an abandoned batch is rolled back rather than committed.
pub fn apply_operations(
    conn: &mut SqliteConnection,
    batch: &Batch,
    cancel: &CancellationToken,
) -> Result<()> {
    for (index, operation) in batch.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled.in_operation(index, &operation.table, &operation.id));
        }
        let applied = build_statement(operation).and_then(|statement| {
            debug!("#{} {} {}/{}", index, operation.kind, operation.table, operation.id);
            Ok(statement.execute(conn).map_err(StorageError::from)?)
        });
        applied.map_err(|err| err.in_operation(index, &operation.table, &operation.id))?;
    }
    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(())
}

pub struct BatchExecutor {
    writer: WriteHandle,
    policy: TablePolicy,
}

impl BatchExecutor {
    pub fn new(writer: WriteHandle, policy: TablePolicy) -> Self {
        Self { writer, policy }
    }

    pub fn policy(&self) -> &TablePolicy {
        &self.policy
    }

    /// Validate, then run the whole batch as one writer job.
    ///
    /// Dropping the returned future before it resolves cancels the job; the
    /// writer then rolls it back.
    pub async fn apply(&self, batch: Batch) -> Result<()> {
        batch.validate(&self.policy)?;

        let count = batch.len();
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();
        let outcome = self
            .writer
            .exec(move |conn| {
                // Foreign keys are checked at commit so a batch may insert a
                // child before its parent. SQLite ignores `foreign_keys`
                // toggles inside a transaction, and clears
                // `defer_foreign_keys` itself at COMMIT or ROLLBACK.
                diesel::sql_query("PRAGMA defer_foreign_keys = ON")
                    .execute(conn)
                    .map_err(StorageError::from)?;
                apply_operations(conn, &batch, &cancel)
            })
            .await;
        guard.disarm();

        match &outcome {
            Ok(()) => info!("Committed batch of {} operation(s)", count),
            Err(err) => warn!("Rolled back batch of {} operation(s): {}", count, err),
        }
        outcome
    }
}
