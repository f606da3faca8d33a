//! Typed view of the audit ledger and its chaining check.

use approvals_core::{Action, Role, Status};
use approvals_storage::AuditRecord;
use serde::Serialize;

/// Why a ledger failed verification or could not be read.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("audit record {id}: unreadable {field} '{value}'")]
    Unreadable {
        id: String,
        field: &'static str,
        value: String,
    },

    #[error("audit record at position {position} has sequence {found}")]
    Sequence { position: usize, found: i64 },

    #[error("ledger broken at sequence {sequence}: expected previous state {expected}, found {found}")]
    BrokenChain {
        sequence: i64,
        expected: String,
        found: String,
    },

    #[error("ledger ends at {tail} but the entity is in {current}")]
    TailMismatch { tail: String, current: String },
}

/// One audit record with its fields parsed into workflow types.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry<S> {
    pub id: String,
    pub sequence: i64,
    pub previous_state: Option<S>,
    pub new_state: S,
    pub actor_role: Role,
    pub action: Action,
    pub note: Option<String>,
    pub created_at: String,
}

impl<S: Status> LedgerEntry<S> {
    pub fn from_record(record: AuditRecord) -> Result<Self, LedgerError> {
        let unreadable = |field: &'static str, value: &str| LedgerError::Unreadable {
            id: record.id.clone(),
            field,
            value: value.to_string(),
        };
        let previous_state = record
            .previous_state
            .as_deref()
            .map(|s| s.parse::<S>().map_err(|_| unreadable("previous_state", s)))
            .transpose()?;
        let new_state = record
            .new_state
            .parse::<S>()
            .map_err(|_| unreadable("new_state", &record.new_state))?;
        let actor_role = record
            .actor_role
            .parse::<Role>()
            .map_err(|_| unreadable("actor_role", &record.actor_role))?;
        let action = record
            .action
            .parse::<Action>()
            .map_err(|_| unreadable("action", &record.action))?;

        Ok(LedgerEntry {
            id: record.id,
            sequence: record.sequence,
            previous_state,
            new_state,
            actor_role,
            action,
            note: record.note,
            created_at: record.created_at,
        })
    }
}

/// Check that `entries` form one unbroken chain from `initial` to `current`.
///
/// Sequences must run 1, 2, 3, ... The first entry may omit its previous
/// state; if it carries one it must be `initial`. An empty ledger is valid
/// only while the entity is still in `initial`.
pub fn verify_chain<S: Status>(
    initial: S,
    entries: &[LedgerEntry<S>],
    current: S,
) -> Result<(), LedgerError> {
    let mut tail = initial;
    for (position, entry) in entries.iter().enumerate() {
        if entry.sequence != position as i64 + 1 {
            return Err(LedgerError::Sequence {
                position,
                found: entry.sequence,
            });
        }
        let chained = match entry.previous_state {
            Some(prev) => prev == tail,
            None => position == 0,
        };
        if !chained {
            return Err(LedgerError::BrokenChain {
                sequence: entry.sequence,
                expected: tail.to_string(),
                found: entry
                    .previous_state
                    .map_or_else(|| "none".to_string(), |s| s.to_string()),
            });
        }
        tail = entry.new_state;
    }

    if tail != current {
        return Err(LedgerError::TailMismatch {
            tail: tail.to_string(),
            current: current.to_string(),
        });
    }
    Ok(())
}
