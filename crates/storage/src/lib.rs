//! approvals-storage: the persistence contract consumed by the approval
//! engine.
//!
//! The engine never touches a database directly. It needs two things from
//! a backend, both expressed by [`WorkflowStorage`]: a way to read an
//! entity's current state, and an atomic unit in which the state update
//! and its audit ledger entry are written together.

pub mod conformance;
mod error;
mod memory;
mod record;
mod traits;

pub use error::StorageError;
pub use memory::{MemorySnapshot, MemoryStorage};
pub use record::{AuditRecord, EntityStateRecord, NewAuditRecord};
pub use traits::WorkflowStorage;
