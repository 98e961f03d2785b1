mod batch;
mod checkpoint;
mod persister;
mod statements;

pub use batch::{apply_operations, BatchExecutor};
pub use checkpoint::{bump_checkpoint, CheckpointStore};
pub use persister::SqlitePersister;
pub use statements::{build_delete, build_patch, build_put, build_statement, Statement};
