//! Domain model and contracts for the sync upload persistence engine.
//!
//! Client devices upload ordered batches of row operations (`PUT`, `PATCH`,
//! `DELETE`) against arbitrary tables. Storage crates implement
//! [`sync::BatchPersisterTrait`] against a concrete relational store.

pub mod config;
pub mod errors;
pub mod sync;

pub use config::{PersisterConfig, PoolConfig};
pub use errors::{DatabaseError, Error, Result, ValidationError};
