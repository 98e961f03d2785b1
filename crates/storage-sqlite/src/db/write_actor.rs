//! All mutations go through one writer thread.
//!
//! SQLite allows a single writer at a time. Funnelling every write job through
//! one thread turns lock contention into queueing, while readers keep using the
//! pool directly. The queue is bounded: once it is full, submitters wait for a
//! free slot instead of piling up payloads in memory.

use std::sync::Arc;

use diesel::sqlite::SqliteConnection;
use log::{debug, error};
use tokio::sync::{mpsc, oneshot};

use syncpush_core::errors::{DatabaseError, Error, Result};

use super::{get_connection, DbPool};
use crate::errors::StorageError;

/// Write jobs that may wait for the writer before submitters are held back.
pub const WRITE_QUEUE_CAPACITY: usize = 256;

type Job = Box<dyn FnOnce(&DbPool) + Send + 'static>;

/// Cloneable handle for submitting write jobs.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::Sender<Job>,
}

impl WriteHandle {
    /// Run `job` on the writer inside an immediate transaction.
    ///
    /// The transaction commits when `job` returns `Ok` and rolls back otherwise.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let wrapped: Job = Box::new(move |pool: &DbPool| {
            let outcome = get_connection(pool).and_then(|mut conn| {
                conn.immediate_transaction::<T, StorageError, _>(|tx| {
                    job(tx).map_err(StorageError::from)
                })
                .map_err(Error::from)
            });
            // The caller may have gone away; the transaction outcome stands.
            let _ = reply_tx.send(outcome);
        });

        self.tx.send(wrapped).await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "SQLite writer has shut down".to_string(),
            ))
        })?;
        reply_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "SQLite writer dropped the job".to_string(),
            ))
        })?
    }
}

/// Start the writer thread. It exits once every [`WriteHandle`] is dropped.
pub fn spawn_writer(pool: Arc<DbPool>) -> Result<WriteHandle> {
    spawn_writer_with_capacity(pool, WRITE_QUEUE_CAPACITY)
}

pub fn spawn_writer_with_capacity(pool: Arc<DbPool>, capacity: usize) -> Result<WriteHandle> {
    let (tx, mut rx) = mpsc::channel::<Job>(capacity.max(1));
    std::thread::Builder::new()
        .name("syncpush-sqlite-writer".to_string())
        .spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                job(&pool);
            }
            debug!("SQLite writer stopped");
        })
        .map_err(|err| {
            error!("Failed to start SQLite writer: {}", err);
            Error::Database(DatabaseError::Internal(format!(
                "failed to start SQLite writer: {}",
                err
            )))
        })?;
    Ok(WriteHandle { tx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::create_pool;
    use diesel::connection::SimpleConnection;
    use diesel::prelude::*;
    use diesel::sql_types::BigInt;
    use syncpush_core::PoolConfig;

    #[derive(QueryableByName)]
    struct Count {
        #[diesel(sql_type = BigInt)]
        total: i64,
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn full_queue_holds_submitters_until_the_writer_catches_up() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("queue.db");
        let pool = create_pool(path.to_str().expect("utf-8 path"), &PoolConfig::default())
            .expect("pool");
        get_connection(&pool)
            .expect("connection")
            .batch_execute("CREATE TABLE events (seq INTEGER NOT NULL)")
            .expect("schema");
        let writer = spawn_writer_with_capacity(pool.clone(), 1).expect("writer");

        let jobs = (0..32_i64)
            .map(|seq| {
                let writer = writer.clone();
                tokio::spawn(async move {
                    writer
                        .exec(move |conn| {
                            diesel::sql_query(format!("INSERT INTO events (seq) VALUES ({seq})"))
                                .execute(conn)
                                .map_err(StorageError::from)?;
                            Ok(())
                        })
                        .await
                })
            })
            .collect::<Vec<_>>();
        for job in jobs {
            job.await.expect("join").expect("write");
        }

        let count = diesel::sql_query("SELECT COUNT(*) AS total FROM events")
            .get_result::<Count>(&mut get_connection(&pool).expect("connection"))
            .expect("count");
        assert_eq!(count.total, 32);
    }

    #[tokio::test]
    async fn failed_job_leaves_nothing_behind() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("rollback.db");
        let pool = create_pool(path.to_str().expect("utf-8 path"), &PoolConfig::default())
            .expect("pool");
        get_connection(&pool)
            .expect("connection")
            .batch_execute("CREATE TABLE events (seq INTEGER NOT NULL)")
            .expect("schema");
        let writer = spawn_writer(pool.clone()).expect("writer");

        let outcome = writer
            .exec(|conn| -> Result<()> {
                diesel::sql_query("INSERT INTO events (seq) VALUES (1)")
                    .execute(conn)
                    .map_err(StorageError::from)?;
                Err(Error::Cancelled)
            })
            .await;
        assert!(matches!(outcome, Err(Error::Cancelled)));

        let count = diesel::sql_query("SELECT COUNT(*) AS total FROM events")
            .get_result::<Count>(&mut get_connection(&pool).expect("connection"))
            .expect("count");
        assert_eq!(count.total, 0);
    }
}
