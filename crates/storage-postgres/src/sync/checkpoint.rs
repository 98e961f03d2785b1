use std::sync::Arc;

use diesel::pg::PgConnection;
use diesel::prelude::*;
use log::debug;

use syncpush_core::errors::Result;
use syncpush_core::sync::validate_checkpoint_key;

use crate::db::{get_connection, DbPool};
use crate::errors::StorageError;
use crate::schema::checkpoints;
use crate::schema::checkpoints::dsl::*;

/// Insert the pair at 1 or increment it, as one atomic upsert.
pub fn bump_checkpoint(conn: &mut PgConnection, user: &str, client: &str) -> QueryResult<i64> {
    diesel::insert_into(checkpoints::table)
        .values((
            user_id.eq(user),
            client_id.eq(client),
            checkpoint.eq(1_i64),
        ))
        .on_conflict((user_id, client_id))
        .do_update()
        .set(checkpoint.eq(checkpoint + 1_i64))
        .returning(checkpoint)
        .get_result::<i64>(conn)
}

/// Per `(user_id, client_id)` monotonic counters.
pub struct CheckpointStore {
    pool: Arc<DbPool>,
}

impl CheckpointStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub fn bump(&self, user: &str, client: &str) -> Result<i64> {
        validate_checkpoint_key(user, client)?;
        let mut conn = get_connection(&self.pool)?;
        let value = bump_checkpoint(&mut conn, user, client).map_err(StorageError::from)?;
        debug!("Checkpoint for {}/{} is now {}", user, client, value);
        Ok(value)
    }

    /// Current value without advancing it; `None` until the first bump.
    pub fn current(&self, user: &str, client: &str) -> Result<Option<i64>> {
        validate_checkpoint_key(user, client)?;
        let mut conn = get_connection(&self.pool)?;
        let value = checkpoints::table
            .find((user, client))
            .select(checkpoint)
            .first::<i64>(&mut conn)
            .optional()
            .map_err(StorageError::from)?;
        Ok(value)
    }
}
