//! SQLite backend for the batch persister.
//!
//! Writes are serialized through a single writer thread; reads use the pool.
//! The database must already contain the application tables and:
//!
//! ```sql
//! CREATE TABLE checkpoints (
//!     user_id    TEXT    NOT NULL,
//!     client_id  TEXT    NOT NULL,
//!     checkpoint INTEGER NOT NULL,
//!     PRIMARY KEY (user_id, client_id)
//! );
//! ```

pub mod db;
pub mod errors;
pub mod schema;
pub mod sync;

pub use db::{create_pool, get_connection, spawn_writer, DbConnection, DbPool, WriteHandle};
pub use errors::StorageError;
pub use sync::{BatchExecutor, CheckpointStore, SqlitePersister};
