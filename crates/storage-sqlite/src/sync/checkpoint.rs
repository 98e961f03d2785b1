use std::sync::Arc;

use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use log::debug;

use syncpush_core::errors::{DatabaseError, Error, Result};
use syncpush_core::sync::validate_checkpoint_key;

use crate::db::{get_connection, DbPool, WriteHandle};
use crate::errors::StorageError;
use crate::schema::checkpoints;
use crate::schema::checkpoints::dsl::*;

pub fn bump_checkpoint(
    conn: &mut SqliteConnection,
    user: &str,
    client: &str,
) -> QueryResult<i64> {
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

pub struct CheckpointStore {
    pool: Arc<DbPool>,
    writer: WriteHandle,
}

impl CheckpointStore {
    pub fn new(pool: Arc<DbPool>, writer: WriteHandle) -> Self {
        Self { pool, writer }
    }

    pub async fn bump(&self, user: &str, client: &str) -> Result<i64> {
        validate_checkpoint_key(user, client)?;
        let (user, client) = (user.to_string(), client.to_string());
        self.writer
            .exec(move |conn| {
                let value =
                    bump_checkpoint(conn, &user, &client).map_err(StorageError::from)?;
                debug!("Checkpoint for {}/{} is now {}", user, client, value);
                Ok(value)
            })
            .await
    }

    /// `None` until the pair has been bumped once. Reads go through the pool on
    /// the blocking thread pool, never through the writer.
    pub async fn current(&self, user: &str, client: &str) -> Result<Option<i64>> {
        validate_checkpoint_key(user, client)?;
        let pool = self.pool.clone();
        let (user, client) = (user.to_string(), client.to_string());
        tokio::task::spawn_blocking(move || read_checkpoint(&pool, &user, &client))
            .await
            .map_err(|err| {
                Error::Database(DatabaseError::Internal(format!(
                    "checkpoint read did not complete: {}",
                    err
                )))
            })?
    }
}

fn read_checkpoint(pool: &DbPool, user: &str, client: &str) -> Result<Option<i64>> {
    let mut conn = get_connection(pool)?;
    let value = checkpoints::table
        .find((user, client))
        .select(checkpoint)
        .first::<i64>(&mut conn)
        .optional()
        .map_err(StorageError::from)?;
    Ok(value)
}
