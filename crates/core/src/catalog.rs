//! Transition catalog and state resolver.
//!
//! A [`Catalog`] is the validated, immutable form of a workflow's
//! transition table. It is built once and handed to whoever needs it;
//! nothing in this crate keeps a global copy.

use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;

use serde::Serialize;

use crate::action::Action;
use crate::error::CatalogError;
use crate::note::NoteRule;
use crate::role::Role;
use crate::status::Status;
use crate::workflow::{TransitionSpec, Workflow};

/// Definition of a single action: where it may start, who may invoke it,
/// and whether it needs a justification note.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransitionDef<S: Ord> {
    pub from_states: BTreeSet<S>,
    pub allowed_roles: BTreeSet<Role>,
    pub requires_note: bool,
}

impl<S: Ord> TransitionDef<S> {
    /// Role check, with the superuser folded into the back office.
    pub fn permits(&self, role: Role) -> bool {
        self.allowed_roles.contains(&role.workflow_role())
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Entry<S: Ord> {
    pub(crate) def: TransitionDef<S>,
    pub(crate) target: S,
}

/// Serializable view of one catalog row, for rendering.
#[derive(Debug, Clone, Serialize)]
pub struct CatalogEntry<S: Ord> {
    pub action: Action,
    #[serde(flatten)]
    pub def: TransitionDef<S>,
    pub target: S,
}

/// Validated transition catalog for workflow `W`.
#[derive(Debug, Clone)]
pub struct Catalog<W: Workflow> {
    pub(crate) entries: BTreeMap<Action, Entry<W::Status>>,
    pub(crate) note_rule: NoteRule,
    _workflow: PhantomData<W>,
}

impl<W: Workflow> Catalog<W> {
    /// The workflow's built-in table with its default note rule.
    pub fn standard() -> Result<Self, CatalogError> {
        Self::with_note_rule(NoteRule::min_chars(W::DEFAULT_MIN_NOTE_CHARS))
    }

    /// The workflow's built-in table with a caller-chosen note rule.
    pub fn with_note_rule(note_rule: NoteRule) -> Result<Self, CatalogError> {
        Self::from_table(W::transition_table(), note_rule)
    }

    /// Build and validate a catalog from an arbitrary table.
    pub fn from_table(
        table: &[TransitionSpec<W::Status>],
        note_rule: NoteRule,
    ) -> Result<Self, CatalogError> {
        if note_rule.min_chars == 0 {
            return Err(CatalogError::InvalidNoteRule {
                workflow: W::NAME,
                min_chars: note_rule.min_chars,
            });
        }

        let mut entries = BTreeMap::new();
        for spec in table {
            if spec.from.is_empty() {
                return Err(CatalogError::EmptyFromStates {
                    workflow: W::NAME,
                    action: spec.action,
                });
            }
            if spec.roles.is_empty() {
                return Err(CatalogError::EmptyAllowedRoles {
                    workflow: W::NAME,
                    action: spec.action,
                });
            }
            if let Some(terminal) = spec.from.iter().find(|s| s.is_terminal()) {
                return Err(CatalogError::TerminalSource {
                    workflow: W::NAME,
                    action: spec.action,
                    state: terminal.to_string(),
                });
            }
            let entry = Entry {
                def: TransitionDef {
                    from_states: spec.from.iter().copied().collect(),
                    allowed_roles: spec.roles.iter().copied().collect(),
                    requires_note: spec.requires_note,
                },
                target: spec.target,
            };
            if entries.insert(spec.action, entry).is_some() {
                return Err(CatalogError::DuplicateAction {
                    workflow: W::NAME,
                    action: spec.action,
                });
            }
        }

        // No orphan states: every live state can be left, every
        // non-initial state can be entered.
        for &state in <W::Status as Status>::ALL {
            if !state.is_terminal()
                && !entries.values().any(|e| e.def.from_states.contains(&state))
            {
                return Err(CatalogError::DeadEndState {
                    workflow: W::NAME,
                    state: state.to_string(),
                });
            }
            if state != W::initial_status() && !entries.values().any(|e| e.target == state) {
                return Err(CatalogError::OrphanState {
                    workflow: W::NAME,
                    state: state.to_string(),
                });
            }
        }

        Ok(Catalog {
            entries,
            note_rule,
            _workflow: PhantomData,
        })
    }

    pub fn note_rule(&self) -> NoteRule {
        self.note_rule
    }

    /// Actions this workflow recognises, in declaration order of the enum.
    pub fn actions(&self) -> impl Iterator<Item = Action> + '_ {
        self.entries.keys().copied()
    }

    pub fn contains(&self, action: Action) -> bool {
        self.entries.contains_key(&action)
    }

    pub fn definition(&self, action: Action) -> Option<&TransitionDef<W::Status>> {
        self.entries.get(&action).map(|e| &e.def)
    }

    /// State resolver: the single target state of `action`.
    pub fn resolve(&self, action: Action) -> Result<W::Status, CatalogError> {
        self.entries
            .get(&action)
            .map(|e| e.target)
            .ok_or(CatalogError::UnknownAction {
                workflow: W::NAME,
                action,
            })
    }

    /// Every `(from, action, to)` edge of the state machine.
    pub fn edges(&self) -> Vec<(W::Status, Action, W::Status)> {
        self.entries
            .iter()
            .flat_map(|(&action, e)| {
                e.def
                    .from_states
                    .iter()
                    .map(move |&from| (from, action, e.target))
            })
            .collect()
    }

    /// Rows for display, one per action.
    pub fn entries(&self) -> Vec<CatalogEntry<W::Status>> {
        self.entries
            .iter()
            .map(|(&action, e)| CatalogEntry {
                action,
                def: e.def.clone(),
                target: e.target,
            })
            .collect()
    }
}
