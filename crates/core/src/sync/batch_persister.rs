//! Contract the HTTP layer depends on.

use async_trait::async_trait;

use crate::errors::{Result, ValidationError};

use super::operation_model::Batch;

/// Applies uploaded batches and advances per-client checkpoints.
///
/// Implementations are constructed once from a connection source and shared
/// across request handlers. Every call may block on the pool or the store, so
/// implementations run that work off the async executor.
#[async_trait]
pub trait BatchPersisterTrait: Send + Sync {
    /// Apply every operation in order inside one transaction, or none of them.
    async fn apply_batch(&self, batch: Batch) -> Result<()>;

    /// Create the `(user_id, client_id)` checkpoint at 1, or increment it by 1,
    /// returning the new value.
    async fn bump(&self, user_id: &str, client_id: &str) -> Result<i64>;
}

pub fn validate_checkpoint_key(user_id: &str, client_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(ValidationError::MissingCheckpointKey("user_id").into());
    }
    if client_id.is_empty() {
        return Err(ValidationError::MissingCheckpointKey("client_id").into());
    }
    Ok(())
}
