//! SQLite pool and the single writer that serializes mutations.

mod write_actor;

use std::sync::Arc;
use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::r2d2::{self, ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::sqlite::SqliteConnection;
use log::{error, info};

use syncpush_core::errors::{DatabaseError, Error, Result};
use syncpush_core::PoolConfig;

use crate::errors::StorageError;

pub use write_actor::{
    spawn_writer, spawn_writer_with_capacity, WriteHandle, WRITE_QUEUE_CAPACITY,
};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

/// How long a connection waits on a locked database before failing.
pub const BUSY_TIMEOUT_MS: u64 = 5_000;

const URL_PREFIX: &str = "sqlite://";

/// Per-connection setup applied whenever the pool opens a connection.
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u64,
}

impl CustomizeConnection<SqliteConnection, r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> std::result::Result<(), r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA foreign_keys = ON; \
             PRAGMA busy_timeout = {}; \
             PRAGMA journal_mode = WAL;",
            self.busy_timeout_ms
        ))
        .map_err(r2d2::Error::QueryError)
    }
}

/// Resolve a configured location to a file path. Accepts a bare path or a
/// `sqlite://` URL.
pub fn database_path(location: &str) -> Result<String> {
    let location = location.trim();
    let path = location.strip_prefix(URL_PREFIX).unwrap_or(location);
    if path.is_empty() {
        return Err(Error::config("SQLite database path is empty"));
    }
    // Every pooled connection would open its own private in-memory database.
    if path == ":memory:" {
        return Err(Error::config(
            "in-memory SQLite databases cannot be shared across a pool",
        ));
    }
    Ok(path.to_string())
}

pub fn create_pool(path: &str, settings: &PoolConfig) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<SqliteConnection>::new(path);
    let mut builder = r2d2::Pool::builder()
        .max_size(settings.max_connections)
        .min_idle(settings.min_connections)
        .connection_timeout(Duration::from_millis(settings.connect_timeout_ms))
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout_ms: BUSY_TIMEOUT_MS,
        }));
    if let Some(idle_ms) = settings.idle_timeout_ms {
        builder = builder.idle_timeout(Some(Duration::from_millis(idle_ms)));
    }

    let pool = builder.build(manager).map_err(|err| {
        error!("Failed to open SQLite pool at {}: {}", path, err);
        Error::Database(DatabaseError::ConnectionFailed(err.to_string()))
    })?;
    info!("SQLite pool ready at {}", path);
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    Ok(pool.get().map_err(StorageError::from)?)
}
