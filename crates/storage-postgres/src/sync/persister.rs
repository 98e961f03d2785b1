use std::sync::Arc;

use async_trait::async_trait;
use log::info;
use tokio_util::sync::CancellationToken;

use syncpush_core::errors::Result;
use syncpush_core::sync::{Batch, BatchPersisterTrait};
use syncpush_core::PersisterConfig;

use super::batch::BatchExecutor;
use super::checkpoint::CheckpointStore;
use crate::config::PgConnectionConfig;
use crate::db::{create_pool, run_blocking, DbPool};

/// PostgreSQL-backed [`BatchPersisterTrait`].
pub struct PgPersister {
    pool: Arc<DbPool>,
    batches: Arc<BatchExecutor>,
    checkpoints: Arc<CheckpointStore>,
}

impl PgPersister {
    /// Normalize the connection source and open the pool.
    pub fn connect(config: &PersisterConfig) -> Result<Self> {
        config.validate()?;
        let connection = PgConnectionConfig::parse(&config.database_url)?;
        let pool = create_pool(&connection, &config.pool)?;
        let persister = Self::from_pool(pool, config);
        info!(
            "Batch persister connected to {} (table allow-list: {})",
            connection.display_target(),
            persister.batches.policy().is_restricted()
        );
        Ok(persister)
    }

    pub fn from_pool(pool: Arc<DbPool>, config: &PersisterConfig) -> Self {
        Self {
            batches: Arc::new(BatchExecutor::new(pool.clone(), config.table_policy())),
            checkpoints: Arc::new(CheckpointStore::new(pool.clone())),
            pool,
        }
    }

    pub fn pool(&self) -> &Arc<DbPool> {
        &self.pool
    }

    pub async fn current_checkpoint(&self, user_id: &str, client_id: &str) -> Result<Option<i64>> {
        let store = self.checkpoints.clone();
        let (user_id, client_id) = (user_id.to_string(), client_id.to_string());
        run_blocking(move || store.current(&user_id, &client_id)).await
    }
}

#[async_trait]
impl BatchPersisterTrait for PgPersister {
    async fn apply_batch(&self, batch: Batch) -> Result<()> {
        let executor = self.batches.clone();
        let cancel = CancellationToken::new();
        // Dropping this future (deadline, client gone) cancels the job, which
        // then rolls back instead of committing.
        let guard = cancel.clone().drop_guard();
        let outcome = run_blocking(move || executor.apply(&batch, &cancel)).await;
        guard.disarm();
        outcome
    }

    async fn bump(&self, user_id: &str, client_id: &str) -> Result<i64> {
        let store = self.checkpoints.clone();
        let (user_id, client_id) = (user_id.to_string(), client_id.to_string());
        run_blocking(move || store.bump(&user_id, &client_id)).await
    }
}
