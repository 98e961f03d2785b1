//! PostgreSQL backend for the batch persister.
//!
//! Application tables are written through `json_populate_record`, so the only
//! table this crate expects to exist on its own is the checkpoint table:
//!
//! ```sql
//! CREATE TABLE checkpoints (
//!     user_id    TEXT   NOT NULL,
//!     client_id  TEXT   NOT NULL,
//!     checkpoint BIGINT NOT NULL,
//!     PRIMARY KEY (user_id, client_id)
//! );
//! ```

pub mod config;
pub mod db;
pub mod errors;
pub mod schema;
pub mod sync;

pub use config::PgConnectionConfig;
pub use db::{create_pool, get_connection, DbConnection, DbPool};
pub use errors::StorageError;
pub use sync::{BatchExecutor, CheckpointStore, PgPersister};
