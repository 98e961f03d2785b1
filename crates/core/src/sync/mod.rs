//! Sync upload domain: operations, batches, and the persister contract.

mod batch_persister;
mod identifiers;
mod operation_model;
mod row_payload;

pub use batch_persister::*;
pub use identifiers::*;
pub use operation_model::*;
pub use row_payload::*;
