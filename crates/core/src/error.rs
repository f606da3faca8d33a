use crate::action::Action;

/// Structural problems found while building a [`Catalog`](crate::Catalog).
///
/// A catalog that fails validation must never be used to authorize
/// anything; these errors are meant to stop the process at start-up.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CatalogError {
    #[error("{workflow}: action '{action}' is declared more than once")]
    DuplicateAction {
        workflow: &'static str,
        action: Action,
    },

    #[error("{workflow}: action '{action}' has no source states")]
    EmptyFromStates {
        workflow: &'static str,
        action: Action,
    },

    #[error("{workflow}: action '{action}' has no allowed roles")]
    EmptyAllowedRoles {
        workflow: &'static str,
        action: Action,
    },

    #[error("{workflow}: action '{action}' starts from terminal state {state}")]
    TerminalSource {
        workflow: &'static str,
        action: Action,
        state: String,
    },

    #[error("{workflow}: non-terminal state {state} has no outgoing action")]
    DeadEndState {
        workflow: &'static str,
        state: String,
    },

    #[error("{workflow}: state {state} is not the target of any action")]
    OrphanState {
        workflow: &'static str,
        state: String,
    },

    #[error("{workflow}: minimum note length must be at least 1, got {min_chars}")]
    InvalidNoteRule {
        workflow: &'static str,
        min_chars: usize,
    },

    /// The state resolver was asked about an action this workflow does not define.
    #[error("{workflow}: action '{action}' is not part of the catalog")]
    UnknownAction {
        workflow: &'static str,
        action: Action,
    },
}
