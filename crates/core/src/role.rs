//! Actor roles.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// The kind of actor attempting a workflow action.
///
/// Identity is resolved upstream; the engine only ever sees the role, and
/// the role label is what gets written to the audit ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Requester: owns compensation claims and expense reimbursements.
    Collaboratore,
    /// First-line reviewer.
    Responsabile,
    /// Back-office approver.
    Amministrazione,
    /// Superuser. Behaves as `Amministrazione` for every workflow check.
    SuperAdmin,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Collaboratore,
        Role::Responsabile,
        Role::Amministrazione,
        Role::SuperAdmin,
    ];

    /// The role used for transition checks.
    pub fn workflow_role(self) -> Role {
        match self {
            Role::SuperAdmin => Role::Amministrazione,
            other => other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Collaboratore => "collaboratore",
            Role::Responsabile => "responsabile",
            Role::Amministrazione => "amministrazione",
            Role::SuperAdmin => "super_admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a role label is not one of the known roles.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown role '{0}'")]
pub struct UnknownRole(pub String);

impl FromStr for Role {
    type Err = UnknownRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Role::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| UnknownRole(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn super_admin_acts_as_amministrazione() {
        assert_eq!(Role::SuperAdmin.workflow_role(), Role::Amministrazione);
        assert_eq!(Role::Responsabile.workflow_role(), Role::Responsabile);
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for role in Role::ALL {
            assert_eq!(role.as_str().parse::<Role>(), Ok(role));
        }
        assert!("admin".parse::<Role>().is_err());
    }

    #[test]
    fn serde_uses_labels() {
        let json = serde_json::to_string(&Role::SuperAdmin).unwrap();
        assert_eq!(json, "\"super_admin\"");
    }
}
