//! approvals-core: transition rules for the compensation and expense
//! reimbursement approval workflows.
//!
//! Everything in this crate is pure and synchronous. A [`Catalog`] holds a
//! workflow's validated transition table and answers three questions:
//!
//! - may this role attempt this action from this state ([`Catalog::can_attempt`])
//! - may this specific submission go through ([`Catalog::authorize_submission`])
//! - which state does the action lead to ([`Catalog::resolve`])
//!
//! Persistence, notifications and the audit ledger live in the
//! `approvals-storage` and `approvals-engine` crates.

pub mod action;
pub mod authorize;
pub mod catalog;
pub mod error;
pub mod note;
pub mod role;
pub mod status;
pub mod workflow;

// ── Convenience re-exports ───────────────────────────────────────────

pub use action::{Action, UnknownAction};
pub use authorize::{ApprovedTransition, Denial, DenialKind};
pub use catalog::{Catalog, CatalogEntry, TransitionDef};
pub use error::CatalogError;
pub use note::NoteRule;
pub use role::{Role, UnknownRole};
pub use status::{CompensationStatus, ExpenseStatus, Status, UnknownStatus};
pub use workflow::{Compensation, ExpenseReimbursement, TransitionSpec, Workflow};
