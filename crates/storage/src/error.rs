/// All errors that can be returned by a WorkflowStorage implementation.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Optimistic concurrency control conflict: another transaction changed
    /// the entity after the caller read it.
    #[error(
        "concurrent conflict on {entity_type}/{entity_id}: expected version {expected_version}"
    )]
    ConcurrentConflict {
        entity_type: String,
        entity_id: String,
        expected_version: i64,
    },

    /// No record with the given (entity_type, entity_id).
    #[error("entity not found: {entity_type}/{entity_id}")]
    EntityNotFound {
        entity_type: String,
        entity_id: String,
    },

    /// A record with this (entity_type, entity_id) already exists.
    #[error("entity already initialized: {entity_type}/{entity_id}")]
    AlreadyInitialized {
        entity_type: String,
        entity_id: String,
    },

    /// An audit record does not chain onto the ledger tail, or disagrees
    /// with the entity's current state.
    #[error("ledger mismatch on {entity_type}/{entity_id}: expected {expected}, found {found}")]
    LedgerMismatch {
        entity_type: String,
        entity_id: String,
        expected: String,
        found: String,
    },

    /// A backend-specific storage error (DB connection, serialization, etc.).
    #[error("storage backend error: {0}")]
    Backend(String),
}
