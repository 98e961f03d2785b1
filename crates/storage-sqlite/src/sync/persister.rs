use std::sync::Arc;

use async_trait::async_trait;
use log::info;

use syncpush_core::errors::Result;
use syncpush_core::sync::{Batch, BatchPersisterTrait};
use syncpush_core::PersisterConfig;

use super::batch::BatchExecutor;
use super::checkpoint::CheckpointStore;
use crate::db::{create_pool, database_path, spawn_writer, DbPool, WriteHandle};

/// SQLite-backed [`BatchPersisterTrait`].
pub struct SqlitePersister {
    pool: Arc<DbPool>,
    batches: BatchExecutor,
    checkpoints: CheckpointStore,
}

impl SqlitePersister {
    /// Open (or create) the database file and start its writer.
    pub fn open(config: &PersisterConfig) -> Result<Self> {
        config.validate()?;
        let path = database_path(&config.database_url)?;
        let pool = create_pool(&path, &config.pool)?;
        let writer = spawn_writer(pool.clone())?;
        let persister = Self::new(pool, writer, config);
        info!(
            "Batch persister opened {} (table allow-list: {})",
            path,
            persister.batches.policy().is_restricted()
        );
        Ok(persister)
    }

    pub fn new(pool: Arc<DbPool>, writer: WriteHandle, config: &PersisterConfig) -> Self {
        Self {
            batches: BatchExecutor::new(writer.clone(), config.table_policy()),
            checkpoints: CheckpointStore::new(pool.clone(), writer),
            pool,
        }
    }

    pub fn pool(&self) -> &Arc<DbPool> {
        &self.pool
    }

    pub async fn current_checkpoint(&self, user_id: &str, client_id: &str) -> Result<Option<i64>> {
        self.checkpoints.current(user_id, client_id).await
    }
}

#[async_trait]
impl BatchPersisterTrait for SqlitePersister {
    async fn apply_batch(&self, batch: Batch) -> Result<()> {
        self.batches.apply(batch).await
    }

    async fn bump(&self, user_id: &str, client_id: &str) -> Result<i64> {
        self.checkpoints.bump(user_id, client_id).await
    }
}
