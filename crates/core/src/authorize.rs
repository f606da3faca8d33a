//! Transition authorizer.
//!
//! Checks run in a fixed order and stop at the first failure:
//!
//! 1. action recognised by this workflow
//! 2. role allowed to invoke it
//! 3. current state among the action's source states
//! 4. justification note long enough (note-requiring actions only)
//!
//! Two entry points share those checks. [`Catalog::can_attempt`] never looks
//! at a note and answers "should this affordance be offered?".
//! [`Catalog::authorize_submission`] always enforces the note rule and is
//! the only way to obtain an [`ApprovedTransition`], which is what the
//! executor needs to change state. [`Catalog::authorize`] keeps the
//! presence-gated form: the note is checked only when one is passed.

use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::catalog::{Catalog, Entry};
use crate::role::Role;
use crate::workflow::Workflow;

/// Why an action was refused. Every variant is an ordinary, expected outcome.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, thiserror::Error)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Denial {
    #[error("azione non riconosciuta: '{action}'")]
    UnknownAction { action: String },

    #[error("il ruolo '{role}' non è autorizzato a eseguire l'azione '{action}'")]
    RoleNotPermitted { role: Role, action: Action },

    #[error("l'azione '{action}' non è consentita dallo stato {state}")]
    InvalidState { action: Action, state: String },

    #[error("nota non valida per l'azione '{action}': {requirement}")]
    NoteTooShort {
        action: Action,
        min_chars: usize,
        requirement: String,
    },
}

/// Discriminant of [`Denial`], for callers that branch on the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DenialKind {
    UnknownAction,
    RoleNotPermitted,
    InvalidState,
    NoteTooShort,
}

impl Denial {
    pub fn kind(&self) -> DenialKind {
        match self {
            Denial::UnknownAction { .. } => DenialKind::UnknownAction,
            Denial::RoleNotPermitted { .. } => DenialKind::RoleNotPermitted,
            Denial::InvalidState { .. } => DenialKind::InvalidState,
            Denial::NoteTooShort { .. } => DenialKind::NoteTooShort,
        }
    }

    /// Caller-facing reason text.
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// Proof that a specific submission passed every check, note included.
///
/// Only [`Catalog::authorize_submission`] builds one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedTransition<W: Workflow> {
    action: Action,
    role: Role,
    from: W::Status,
    to: W::Status,
    note: Option<String>,
}

impl<W: Workflow> ApprovedTransition<W> {
    pub fn action(&self) -> Action {
        self.action
    }

    /// The role as supplied by the caller (not folded), for the ledger label.
    pub fn role(&self) -> Role {
        self.role
    }

    pub fn from(&self) -> W::Status {
        self.from
    }

    pub fn to(&self) -> W::Status {
        self.to
    }

    /// The trimmed note, `None` when absent or blank.
    pub fn note(&self) -> Option<&str> {
        self.note.as_deref()
    }
}

enum NoteCheck<'a> {
    Skip,
    Enforce(&'a str),
}

impl<W: Workflow> Catalog<W> {
    /// Presence-gated authorization: the note rule applies only when
    /// `note` is `Some`.
    pub fn authorize(
        &self,
        role: Role,
        state: W::Status,
        action: &str,
        note: Option<&str>,
    ) -> Result<Action, Denial> {
        let check = match note {
            Some(n) => NoteCheck::Enforce(n),
            None => NoteCheck::Skip,
        };
        self.check(role, state, action, check).map(|(a, _)| a)
    }

    /// Visibility check: is `action` legal to attempt from `state`?
    pub fn can_attempt(
        &self,
        role: Role,
        state: W::Status,
        action: &str,
    ) -> Result<Action, Denial> {
        self.check(role, state, action, NoteCheck::Skip)
            .map(|(a, _)| a)
    }

    /// Enforcement check for an actual state change. A missing note on a
    /// note-requiring action counts as an empty one.
    pub fn authorize_submission(
        &self,
        role: Role,
        state: W::Status,
        action: &str,
        note: Option<&str>,
    ) -> Result<ApprovedTransition<W>, Denial> {
        let (action, entry) = self.check(
            role,
            state,
            action,
            NoteCheck::Enforce(note.unwrap_or("")),
        )?;
        let note = note
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        Ok(ApprovedTransition {
            action,
            role,
            from: state,
            to: entry.target,
            note,
        })
    }

    /// Parse `name` and find it in this workflow's catalog.
    pub fn lookup(&self, name: &str) -> Result<Action, Denial> {
        self.lookup_entry(name).map(|(a, _)| a)
    }

    fn lookup_entry(&self, name: &str) -> Result<(Action, &Entry<W::Status>), Denial> {
        let unknown = || Denial::UnknownAction {
            action: name.to_string(),
        };
        let action: Action = name.parse().map_err(|_| unknown())?;
        let entry = self.entries.get(&action).ok_or_else(unknown)?;
        Ok((action, entry))
    }

    fn check(
        &self,
        role: Role,
        state: W::Status,
        action: &str,
        note: NoteCheck<'_>,
    ) -> Result<(Action, &Entry<W::Status>), Denial> {
        let (action, entry) = self.lookup_entry(action)?;

        if !entry.def.permits(role) {
            return Err(Denial::RoleNotPermitted { role, action });
        }

        if !entry.def.from_states.contains(&state) {
            return Err(Denial::InvalidState {
                action,
                state: state.to_string(),
            });
        }

        if entry.def.requires_note {
            if let NoteCheck::Enforce(text) = note {
                if !self.note_rule.accepts(text) {
                    return Err(Denial::NoteTooShort {
                        action,
                        min_chars: self.note_rule.min_chars,
                        requirement: self.note_rule.describe(),
                    });
                }
            }
        }

        Ok((action, entry))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::CompensationStatus as C;
    use crate::workflow::Compensation;

    fn catalog() -> Catalog<Compensation> {
        Catalog::standard().unwrap()
    }

    #[test]
    fn precedence_role_before_state() {
        // Wrong role and wrong state: the role denial wins.
        let err = catalog()
            .authorize(Role::Collaboratore, C::Pagato, "approve_admin", None)
            .unwrap_err();
        assert_eq!(err.kind(), DenialKind::RoleNotPermitted);
    }

    #[test]
    fn precedence_state_before_note() {
        let err = catalog()
            .authorize(Role::Responsabile, C::Bozza, "request_integration", Some(""))
            .unwrap_err();
        assert_eq!(err.kind(), DenialKind::InvalidState);
    }

    #[test]
    fn unknown_name_and_foreign_action_share_a_kind() {
        let c = catalog();
        let err = c.authorize(Role::Amministrazione, C::Inviato, "archive", None).unwrap_err();
        assert_eq!(err.kind(), DenialKind::UnknownAction);
        assert!(err.reason().contains("non riconosciuta"));
    }

    #[test]
    fn super_admin_can_do_back_office_actions() {
        let action = catalog()
            .authorize(Role::SuperAdmin, C::ApprovatoAdmin, "mark_paid", None)
            .unwrap();
        assert_eq!(action, Action::MarkPaid);
    }

    #[test]
    fn submission_treats_missing_note_as_empty() {
        let c = catalog();
        assert!(c
            .can_attempt(Role::Responsabile, C::Inviato, "reject_manager")
            .is_ok());
        let err = c
            .authorize_submission(Role::Responsabile, C::Inviato, "reject_manager", None)
            .unwrap_err();
        assert_eq!(err.kind(), DenialKind::NoteTooShort);
    }

    #[test]
    fn approved_transition_carries_trimmed_note() {
        let t = catalog()
            .authorize_submission(
                Role::Responsabile,
                C::Inviato,
                "request_integration",
                Some("   manca la ricevuta del treno del 12 marzo  "),
            )
            .unwrap();
        assert_eq!(t.action(), Action::RequestIntegration);
        assert_eq!(t.from(), C::Inviato);
        assert_eq!(t.to(), C::IntegrazioniRichieste);
        assert_eq!(t.note(), Some("manca la ricevuta del treno del 12 marzo"));
    }

    #[test]
    fn blank_optional_note_is_dropped() {
        let t = catalog()
            .authorize_submission(Role::Collaboratore, C::Bozza, "submit", Some("   "))
            .unwrap();
        assert_eq!(t.note(), None);
        assert_eq!(t.role(), Role::Collaboratore);
    }

    #[test]
    fn denial_serializes_with_kind_tag() {
        let err = catalog()
            .authorize(Role::Responsabile, C::ApprovatoAdmin, "mark_paid", None)
            .unwrap_err();
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "role_not_permitted");
        assert_eq!(json["role"], "responsabile");
    }
}
