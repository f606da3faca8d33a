//! Transition executor.
//!
//! A transition runs inside one storage snapshot:
//!
//! 1. lock-read the entity's current state
//! 2. authorize the submission, note included
//! 3. version-checked state update
//! 4. audit record append
//! 5. commit
//!
//! Any failure aborts the snapshot, so the state update and its audit
//! record land together or not at all. A version conflict restarts the
//! whole sequence from step 1, up to `max_attempts` times. Notifications
//! are sent only after commit.

use std::sync::Arc;

use approvals_core::{
    Action, ApprovedTransition, Catalog, Denial, Role, Status, UnknownStatus, Workflow,
};
use approvals_storage::{EntityStateRecord, NewAuditRecord, StorageError, WorkflowStorage};
use serde::Serialize;

use crate::action_space::{compute_action_space, ActionSpace};
use crate::config::DEFAULT_MAX_ATTEMPTS;
use crate::ledger::{verify_chain, LedgerEntry, LedgerError};
use crate::notification::{self, NoopSink, NotificationPayload, NotificationSink};

/// Errors from executing or inspecting a workflow transition.
#[derive(Debug, thiserror::Error)]
pub enum ExecutorError {
    /// The transition was refused. An ordinary outcome; nothing was written.
    #[error(transparent)]
    Denied(#[from] Denial),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The stored status is not one this workflow knows.
    #[error("entity {entity_id} has unreadable state: {source}")]
    CorruptState {
        entity_id: String,
        #[source]
        source: UnknownStatus,
    },

    #[error(transparent)]
    Catalog(#[from] approvals_core::CatalogError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("transition on {entity_id} abandoned after {attempts} conflicting attempts")]
    RetriesExhausted { entity_id: String, attempts: u32 },
}

/// A caller's request to move an entity along its workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionRequest {
    pub entity_id: String,
    pub role: Role,
    pub action: String,
    pub note: Option<String>,
}

impl TransitionRequest {
    pub fn new(entity_id: impl Into<String>, role: Role, action: impl Into<String>) -> Self {
        TransitionRequest {
            entity_id: entity_id.into(),
            role,
            action: action.into(),
            note: None,
        }
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = Some(note.into());
        self
    }
}

/// Outcome of a committed transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppliedTransition<S> {
    pub entity_id: String,
    pub action: Action,
    pub from: S,
    pub to: S,
    /// Entity version after the update.
    pub version: i64,
    pub entry: LedgerEntry<S>,
    /// The notification handed to the sink, if the action notifies.
    pub notification: Option<NotificationPayload>,
}

/// Executes transitions of workflow `W` against storage `S`.
pub struct WorkflowExecutor<W: Workflow, S: WorkflowStorage> {
    storage: Arc<S>,
    catalog: Arc<Catalog<W>>,
    sink: Arc<dyn NotificationSink>,
    max_attempts: u32,
}

impl<W: Workflow, S: WorkflowStorage> Clone for WorkflowExecutor<W, S> {
    fn clone(&self) -> Self {
        WorkflowExecutor {
            storage: Arc::clone(&self.storage),
            catalog: Arc::clone(&self.catalog),
            sink: Arc::clone(&self.sink),
            max_attempts: self.max_attempts,
        }
    }
}

impl<W: Workflow, S: WorkflowStorage> WorkflowExecutor<W, S> {
    pub fn new(storage: Arc<S>, catalog: Catalog<W>) -> Self {
        WorkflowExecutor {
            storage,
            catalog: Arc::new(catalog),
            sink: Arc::new(NoopSink),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        }
    }

    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = sink;
        self
    }

    /// At least one attempt is always made.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn catalog(&self) -> &Catalog<W> {
        &self.catalog
    }

    /// Create a request in the workflow's initial status, owned by `owner_id`.
    ///
    /// Creation is not a transition and writes no audit record.
    pub async fn open(&self, entity_id: &str, owner_id: &str) -> Result<(), ExecutorError> {
        let mut snap = self.storage.begin_snapshot().await?;
        let initial = W::initial_status();
        if let Err(e) = self
            .storage
            .initialize_entity(&mut snap, W::ENTITY_TYPE, entity_id, owner_id, initial.as_str())
            .await
        {
            self.abort(snap).await;
            return Err(e.into());
        }
        self.storage.commit_snapshot(snap).await?;
        tracing::debug!(workflow = W::NAME, entity_id, status = %initial, "request opened");
        Ok(())
    }

    /// Committed state of an entity.
    pub async fn current_state(&self, entity_id: &str) -> Result<W::Status, ExecutorError> {
        let record = self
            .storage
            .get_entity_state(W::ENTITY_TYPE, entity_id)
            .await?;
        parse_state::<W>(&record)
    }

    /// Visibility check against the committed state. Never looks at a note.
    pub async fn can_attempt(
        &self,
        entity_id: &str,
        role: Role,
        action: &str,
    ) -> Result<Action, ExecutorError> {
        let state = self.current_state(entity_id).await?;
        Ok(self.catalog.can_attempt(role, state, action)?)
    }

    /// Available and blocked actions for `role` on the committed state.
    pub async fn action_space(
        &self,
        entity_id: &str,
        role: Role,
    ) -> Result<ActionSpace<W::Status>, ExecutorError> {
        let state = self.current_state(entity_id).await?;
        Ok(compute_action_space(&self.catalog, role, state))
    }

    /// Authorize and apply one transition, then notify the owner if the
    /// action calls for it.
    #[tracing::instrument(
        name = "validate_and_apply",
        skip_all,
        fields(
            workflow = W::NAME,
            entity_id = %request.entity_id,
            action = %request.action,
            role = %request.role,
        )
    )]
    pub async fn validate_and_apply(
        &self,
        request: &TransitionRequest,
    ) -> Result<AppliedTransition<W::Status>, ExecutorError> {
        let mut attempt = 0;
        let (mut applied, owner_id) = loop {
            attempt += 1;
            match self.try_apply(request).await {
                Ok(done) => break done,
                Err(ExecutorError::Storage(StorageError::ConcurrentConflict { .. })) => {
                    if attempt >= self.max_attempts {
                        tracing::warn!(attempt, "version conflict, giving up");
                        return Err(ExecutorError::RetriesExhausted {
                            entity_id: request.entity_id.clone(),
                            attempts: attempt,
                        });
                    }
                    tracing::warn!(attempt, "version conflict, retrying");
                }
                Err(ExecutorError::Denied(denial)) => {
                    tracing::debug!(kind = ?denial.kind(), "transition denied");
                    return Err(ExecutorError::Denied(denial));
                }
                Err(err) => {
                    tracing::error!(error = %err, "transition failed");
                    return Err(err);
                }
            }
        };

        tracing::info!(
            from = %applied.from,
            to = %applied.to,
            version = applied.version,
            "transition applied"
        );

        applied.notification = self.notify(&applied, &owner_id).await;
        Ok(applied)
    }

    /// Typed ledger of one entity, oldest first.
    pub async fn history(
        &self,
        entity_id: &str,
    ) -> Result<Vec<LedgerEntry<W::Status>>, ExecutorError> {
        let records = self
            .storage
            .list_audit_records(W::ENTITY_TYPE, entity_id)
            .await?;
        records
            .into_iter()
            .map(|r| LedgerEntry::from_record(r).map_err(ExecutorError::from))
            .collect()
    }

    /// Check that the ledger chains from the initial status to the
    /// entity's committed status.
    pub async fn verify_ledger(&self, entity_id: &str) -> Result<(), ExecutorError> {
        let current = self.current_state(entity_id).await?;
        let entries = self.history(entity_id).await?;
        verify_chain(W::initial_status(), &entries, current)?;
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    async fn try_apply(
        &self,
        request: &TransitionRequest,
    ) -> Result<(AppliedTransition<W::Status>, String), ExecutorError> {
        let mut snap = self.storage.begin_snapshot().await?;
        match self.apply_in(&mut snap, request).await {
            Ok(done) => {
                self.storage.commit_snapshot(snap).await?;
                Ok(done)
            }
            Err(err) => {
                self.abort(snap).await;
                Err(err)
            }
        }
    }

    async fn apply_in(
        &self,
        snap: &mut S::Snapshot,
        request: &TransitionRequest,
    ) -> Result<(AppliedTransition<W::Status>, String), ExecutorError> {
        let record = self
            .storage
            .get_entity_state_for_update(snap, W::ENTITY_TYPE, &request.entity_id)
            .await?;
        let from = parse_state::<W>(&record)?;

        let approved: ApprovedTransition<W> = self.catalog.authorize_submission(
            request.role,
            from,
            &request.action,
            request.note.as_deref(),
        )?;

        let version = self
            .storage
            .update_entity_state(
                snap,
                W::ENTITY_TYPE,
                &request.entity_id,
                record.version,
                approved.to().as_str(),
                approved.action().as_str(),
            )
            .await?;

        let stored = self
            .storage
            .append_audit_record(
                snap,
                NewAuditRecord {
                    entity_type: W::ENTITY_TYPE.to_string(),
                    entity_id: request.entity_id.clone(),
                    previous_state: Some(approved.from().as_str().to_string()),
                    new_state: approved.to().as_str().to_string(),
                    actor_role: approved.role().as_str().to_string(),
                    action: approved.action().as_str().to_string(),
                    note: approved.note().map(str::to_string),
                },
            )
            .await?;
        let entry = LedgerEntry::from_record(stored)?;

        let applied = AppliedTransition {
            entity_id: request.entity_id.clone(),
            action: approved.action(),
            from: approved.from(),
            to: approved.to(),
            version,
            entry,
            notification: None,
        };
        Ok((applied, record.owner_id))
    }

    async fn notify(
        &self,
        applied: &AppliedTransition<W::Status>,
        owner_id: &str,
    ) -> Option<NotificationPayload> {
        let payload = notification::build::<W>(
            applied.action,
            owner_id,
            &applied.entity_id,
            applied.entry.note.as_deref(),
        )?;
        if let Err(err) = self.sink.deliver(payload.clone()).await {
            tracing::warn!(
                error = %err,
                category = ?payload.category,
                "notification not delivered"
            );
        }
        Some(payload)
    }

    async fn abort(&self, snap: S::Snapshot) {
        if let Err(err) = self.storage.abort_snapshot(snap).await {
            tracing::warn!(error = %err, "snapshot abort failed");
        }
    }
}

fn parse_state<W: Workflow>(record: &EntityStateRecord) -> Result<W::Status, ExecutorError> {
    record
        .state
        .parse::<W::Status>()
        .map_err(|source| ExecutorError::CorruptState {
            entity_id: record.entity_id.clone(),
            source,
        })
}
