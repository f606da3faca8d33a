use serde::{Deserialize, Serialize};

/// An entity's current state as stored in the backend.
///
/// This is a cache of the ledger tail: `state` must always equal the
/// `new_state` of the entity's last [`AuditRecord`], when one exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityStateRecord {
    pub entity_type: String,
    pub entity_id: String,
    /// The requester; notifications are addressed to them.
    pub owner_id: String,
    pub state: String,
    pub version: i64,
    /// RFC 3339 timestamp string.
    pub updated_at: String,
    pub last_action: Option<String>,
}

/// An audit entry as handed to the backend, before it is stamped.
///
/// The actor is recorded by role label only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewAuditRecord {
    pub entity_type: String,
    pub entity_id: String,
    pub previous_state: Option<String>,
    pub new_state: String,
    pub actor_role: String,
    pub action: String,
    pub note: Option<String>,
}

/// A stored, immutable audit ledger entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: String,
    pub entity_type: String,
    pub entity_id: String,
    /// 1-based position in the entity's ledger.
    pub sequence: i64,
    /// `None` only on an entity's first record.
    pub previous_state: Option<String>,
    pub new_state: String,
    pub actor_role: String,
    pub action: String,
    pub note: Option<String>,
    /// RFC 3339 timestamp string.
    pub created_at: String,
}

impl AuditRecord {
    /// Stamp a new entry with its id, position and creation time.
    pub fn stamp(record: NewAuditRecord, id: String, sequence: i64, created_at: String) -> Self {
        AuditRecord {
            id,
            entity_type: record.entity_type,
            entity_id: record.entity_id,
            sequence,
            previous_state: record.previous_state,
            new_state: record.new_state,
            actor_role: record.actor_role,
            action: record.action,
            note: record.note,
            created_at,
        }
    }
}

/// Current time as an RFC 3339 string.
pub(crate) fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "unknown".to_string())
}
