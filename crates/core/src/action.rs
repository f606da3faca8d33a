//! Workflow actions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// A named operation a role may attempt against a request.
///
/// Both workflows draw from this one set. Each workflow's catalog decides
/// which of these it recognises: expense reimbursements have no `Submit`
/// or `Withdraw`, since submission happens before the record exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Submit,
    Withdraw,
    Resubmit,
    ApproveManager,
    RequestIntegration,
    RejectManager,
    ApproveAdmin,
    Reject,
    MarkPaid,
}

impl Action {
    pub const ALL: [Action; 9] = [
        Action::Submit,
        Action::Withdraw,
        Action::Resubmit,
        Action::ApproveManager,
        Action::RequestIntegration,
        Action::RejectManager,
        Action::ApproveAdmin,
        Action::Reject,
        Action::MarkPaid,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Action::Submit => "submit",
            Action::Withdraw => "withdraw",
            Action::Resubmit => "resubmit",
            Action::ApproveManager => "approve_manager",
            Action::RequestIntegration => "request_integration",
            Action::RejectManager => "reject_manager",
            Action::ApproveAdmin => "approve_admin",
            Action::Reject => "reject",
            Action::MarkPaid => "mark_paid",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when an action name does not match any known action.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown action '{0}'")]
pub struct UnknownAction(pub String);

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|a| a.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        for action in Action::ALL {
            assert_eq!(action.to_string().parse::<Action>(), Ok(action));
        }
    }

    #[test]
    fn unknown_name_is_rejected() {
        assert_eq!(
            "approve".parse::<Action>(),
            Err(UnknownAction("approve".to_string()))
        );
        // Names are case-sensitive.
        assert!("MARK_PAID".parse::<Action>().is_err());
    }
}
