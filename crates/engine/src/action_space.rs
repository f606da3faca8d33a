//! Action space: what a role can do to a request in a given state, and why
//! everything else is blocked.
//!
//! Pure function over the catalog. No IO, no note check; this is the
//! visibility side of authorization and never grants a state change.

use approvals_core::{Action, Catalog, Denial, Role, Workflow};
use serde::Serialize;

/// An action the role may attempt now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AvailableAction<S> {
    pub action: Action,
    pub target: S,
    pub requires_note: bool,
    /// Present when `requires_note` is set.
    pub note_requirement: Option<String>,
}

/// An action the workflow knows but the role may not attempt now.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockedAction {
    pub action: Action,
    pub reason: Denial,
}

/// Every catalog action, split into available and blocked.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionSpace<S> {
    pub role: Role,
    pub state: S,
    pub available: Vec<AvailableAction<S>>,
    pub blocked: Vec<BlockedAction>,
}

impl<S> ActionSpace<S> {
    pub fn is_available(&self, action: Action) -> bool {
        self.available.iter().any(|a| a.action == action)
    }
}

/// Compute the action space of `role` for a request in `state`.
pub fn compute_action_space<W: Workflow>(
    catalog: &Catalog<W>,
    role: Role,
    state: W::Status,
) -> ActionSpace<W::Status> {
    let mut available = Vec::new();
    let mut blocked = Vec::new();

    for entry in catalog.entries() {
        match catalog.can_attempt(role, state, entry.action.as_str()) {
            Ok(action) => available.push(AvailableAction {
                action,
                target: entry.target,
                requires_note: entry.def.requires_note,
                note_requirement: entry
                    .def
                    .requires_note
                    .then(|| catalog.note_rule().describe()),
            }),
            Err(reason) => blocked.push(BlockedAction {
                action: entry.action,
                reason,
            }),
        }
    }

    ActionSpace {
        role,
        state,
        available,
        blocked,
    }
}
