//! Connection pool for the PostgreSQL store.

use std::sync::Arc;
use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{self, ConnectionManager, Pool, PooledConnection};
use log::{error, info};

use syncpush_core::errors::{DatabaseError, Error, Result};
use syncpush_core::PoolConfig;

use crate::config::PgConnectionConfig;
use crate::errors::StorageError;

pub type DbPool = Pool<ConnectionManager<PgConnection>>;
pub type DbConnection = PooledConnection<ConnectionManager<PgConnection>>;

/// Build the shared pool. Fails when the store cannot be reached within the
/// configured connect timeout.
pub fn create_pool(
    connection: &PgConnectionConfig,
    settings: &PoolConfig,
) -> Result<Arc<DbPool>> {
    let manager = ConnectionManager::<PgConnection>::new(connection.to_connection_string());
    let mut builder = r2d2::Pool::builder()
        .max_size(settings.max_connections)
        .min_idle(settings.min_connections)
        .connection_timeout(Duration::from_millis(settings.connect_timeout_ms));
    if let Some(idle_ms) = settings.idle_timeout_ms {
        builder = builder.idle_timeout(Some(Duration::from_millis(idle_ms)));
    }

    let pool = builder.build(manager).map_err(|err| {
        error!(
            "Failed to open PostgreSQL pool for {}: {}",
            connection.display_target(),
            err
        );
        Error::Database(DatabaseError::ConnectionFailed(err.to_string()))
    })?;
    info!(
        "PostgreSQL pool ready for {} (max {} connections)",
        connection.display_target(),
        settings.max_connections
    );
    Ok(Arc::new(pool))
}

pub fn get_connection(pool: &DbPool) -> Result<DbConnection> {
    Ok(pool.get().map_err(StorageError::from)?)
}

/// Run blocking pool/store work off the async executor.
pub async fn run_blocking<F, T>(job: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(job).await.map_err(|err| {
        error!("Blocking database task failed: {}", err);
        Error::Database(DatabaseError::Internal(format!(
            "database task did not complete: {}",
            err
        )))
    })?
}
