//! approvals-engine: applies authorized transitions to stored requests.
//!
//! The engine ties the pure rules in `approvals-core` to a
//! [`WorkflowStorage`] backend. Every state change goes through
//! [`WorkflowExecutor::validate_and_apply`], which re-reads the state under
//! lock, enforces the note rule, and writes the state update and audit
//! record in one snapshot. Notifications follow the commit and never undo
//! it.

pub mod action_space;
pub mod config;
pub mod executor;
pub mod ledger;
pub mod notification;

use std::sync::Arc;

use approvals_core::{Catalog, Compensation, ExpenseReimbursement};
use approvals_storage::WorkflowStorage;

pub use action_space::{compute_action_space, ActionSpace, AvailableAction, BlockedAction};
pub use config::{ConfigError, EngineConfig, WorkflowConfig};
pub use executor::{AppliedTransition, ExecutorError, TransitionRequest, WorkflowExecutor};
pub use ledger::{verify_chain, LedgerEntry, LedgerError};
pub use notification::{
    ChannelSink, DeliveryError, NoopSink, NotificationCategory, NotificationPayload,
    NotificationSink,
};

/// Both workflows over one storage backend.
pub struct ApprovalEngine<S: WorkflowStorage> {
    compensation: WorkflowExecutor<Compensation, S>,
    expense: WorkflowExecutor<ExpenseReimbursement, S>,
}

impl<S: WorkflowStorage> ApprovalEngine<S> {
    /// Build both catalogs from `config` and wire them to `storage` and `sink`.
    pub fn new(
        storage: Arc<S>,
        config: &EngineConfig,
        sink: Arc<dyn NotificationSink>,
    ) -> Result<Self, ExecutorError> {
        let compensation_catalog =
            Catalog::<Compensation>::with_note_rule(config.compensation.note_rule())?;
        let expense_catalog =
            Catalog::<ExpenseReimbursement>::with_note_rule(config.expense.note_rule())?;

        Ok(ApprovalEngine {
            compensation: WorkflowExecutor::new(Arc::clone(&storage), compensation_catalog)
                .with_sink(Arc::clone(&sink))
                .with_max_attempts(config.max_attempts),
            expense: WorkflowExecutor::new(storage, expense_catalog)
                .with_sink(sink)
                .with_max_attempts(config.max_attempts),
        })
    }

    pub fn compensation(&self) -> &WorkflowExecutor<Compensation, S> {
        &self.compensation
    }

    pub fn expense(&self) -> &WorkflowExecutor<ExpenseReimbursement, S> {
        &self.expense
    }
}
