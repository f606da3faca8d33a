use async_trait::async_trait;

use crate::error::StorageError;
use crate::record::{AuditRecord, EntityStateRecord, NewAuditRecord};

/// The storage trait for approval workflow backends.
///
/// A `WorkflowStorage` implementation provides durable, transactional
/// storage for entity state and the per-entity audit ledger.
///
/// ## Snapshot Semantics
///
/// All mutating operations take `&mut Self::Snapshot`, a type representing an
/// in-progress transaction. The lifecycle is:
///
/// 1. `begin_snapshot()`: start a transaction, returns a `Snapshot`
/// 2. Call mutating methods with `&mut snapshot`
/// 3. `commit_snapshot(snapshot)`: commit and consume the transaction
///    OR `abort_snapshot(snapshot)`: roll back and consume the transaction
///
/// If a `Snapshot` is dropped without committing, the underlying transaction
/// MUST be rolled back.
///
/// ## Atomicity
///
/// A state update and the audit record describing it are written in the
/// same snapshot. Either both become visible at commit or neither does.
///
/// ## OCC Conflict Detection
///
/// `update_entity_state` is conditional on `version = expected_version`.
/// A mismatch returns `Err(StorageError::ConcurrentConflict { .. })` and
/// leaves the entity untouched. Transitions on different entities must
/// never conflict with each other.
///
/// ## Append-only Ledger
///
/// No operation updates or deletes an audit record.
#[async_trait]
pub trait WorkflowStorage: Send + Sync + 'static {
    /// The snapshot (transaction) type used by this storage backend.
    type Snapshot: Send;

    // ── Snapshot lifecycle ────────────────────────────────────────────────────

    /// Begin a new snapshot (transaction).
    async fn begin_snapshot(&self) -> Result<Self::Snapshot, StorageError>;

    /// Commit a snapshot, making all mutations durable.
    async fn commit_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    /// Abort (roll back) a snapshot, discarding all mutations.
    async fn abort_snapshot(&self, snapshot: Self::Snapshot) -> Result<(), StorageError>;

    // ── Entity operations (within snapshot) ──────────────────────────────────

    /// Create an entity at `initial_state` with version 0.
    ///
    /// Returns `Err(StorageError::AlreadyInitialized)` if the entity already exists.
    async fn initialize_entity(
        &self,
        snapshot: &mut Self::Snapshot,
        entity_type: &str,
        entity_id: &str,
        owner_id: &str,
        initial_state: &str,
    ) -> Result<(), StorageError>;

    /// Read an entity's current state, locking it for update.
    ///
    /// Concurrent snapshots touching the same entity wait until this one is
    /// committed or aborted (`SELECT ... FOR UPDATE` semantics).
    ///
    /// Returns `Err(StorageError::EntityNotFound)` if the entity does not exist.
    async fn get_entity_state_for_update(
        &self,
        snapshot: &mut Self::Snapshot,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<EntityStateRecord, StorageError>;

    /// Apply a version-validated update to an entity's state (OCC).
    ///
    /// Returns the new version number on success.
    async fn update_entity_state(
        &self,
        snapshot: &mut Self::Snapshot,
        entity_type: &str,
        entity_id: &str,
        expected_version: i64,
        new_state: &str,
        action: &str,
    ) -> Result<i64, StorageError>;

    /// Append an audit record to the entity's ledger.
    ///
    /// Must be called in the SAME snapshot as the `update_entity_state` it
    /// describes. The record must chain onto the ledger tail
    /// (`previous_state` equals the tail's `new_state`) and its `new_state`
    /// must equal the entity's state in this snapshot; otherwise
    /// `Err(StorageError::LedgerMismatch)`. On an empty ledger,
    /// `previous_state` is either `None` or the state the entity held before
    /// this snapshot first updated it.
    ///
    /// The backend assigns `id`, `sequence` and `created_at`.
    async fn append_audit_record(
        &self,
        snapshot: &mut Self::Snapshot,
        record: NewAuditRecord,
    ) -> Result<AuditRecord, StorageError>;

    // ── Query operations (outside snapshot) ───────────────────────────────────

    /// Read an entity's committed state without locking.
    ///
    /// Returns `Err(StorageError::EntityNotFound)` if the entity does not exist.
    async fn get_entity_state(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<EntityStateRecord, StorageError>;

    /// List all entities of a type, optionally filtered by state.
    async fn list_entity_states(
        &self,
        entity_type: &str,
        state_filter: Option<&str>,
    ) -> Result<Vec<EntityStateRecord>, StorageError>;

    /// The committed ledger of one entity, oldest first.
    ///
    /// Returns an empty list for an entity with no records (or no entity).
    async fn list_audit_records(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>, StorageError>;
}
