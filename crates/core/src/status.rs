//! Lifecycle statuses for both workflows.
//!
//! ```text
//! compensation:  BOZZA ──▶ INVIATO ──▶ PRE_APPROVATO_RESP ──▶ APPROVATO_ADMIN ──▶ PAGATO
//!                  ▲         │ ▲  │              │
//!                  └─────────┘ │  ▼              ▼
//!                        INTEGRAZIONI_RICHIESTE  RIFIUTATO
//!
//! expense:       same lifecycle without BOZZA; INVIATO is the initial status
//! ```

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Error returned when a status name is not part of a workflow.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {workflow} status '{name}'")]
pub struct UnknownStatus {
    pub workflow: &'static str,
    pub name: String,
}

/// Common surface of the per-workflow status enums.
pub trait Status:
    Copy
    + Eq
    + Ord
    + Hash
    + fmt::Debug
    + fmt::Display
    + FromStr<Err = UnknownStatus>
    + Serialize
    + DeserializeOwned
    + Send
    + Sync
    + 'static
{
    /// Every status, in lifecycle order.
    const ALL: &'static [Self];

    /// The upper-case status name as stored and displayed.
    fn as_str(self) -> &'static str;

    /// Terminal statuses have no outgoing transitions.
    fn is_terminal(self) -> bool;
}

fn parse_status<S: Status>(workflow: &'static str, s: &str) -> Result<S, UnknownStatus> {
    S::ALL
        .iter()
        .copied()
        .find(|st| st.as_str() == s)
        .ok_or_else(|| UnknownStatus {
            workflow,
            name: s.to_string(),
        })
}

// ─── Compensation ────────────────────────────────────────────────────

/// Status of a compensation claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CompensationStatus {
    /// Draft, editable by the requester.
    Bozza,
    Inviato,
    /// Changes requested by the first-line reviewer.
    IntegrazioniRichieste,
    /// Approved by the first-line reviewer.
    PreApprovatoResp,
    /// Approved by the back office.
    ApprovatoAdmin,
    /// Paid (terminal).
    Pagato,
    /// Rejected (terminal).
    Rifiutato,
}

impl Status for CompensationStatus {
    const ALL: &'static [Self] = &[
        Self::Bozza,
        Self::Inviato,
        Self::IntegrazioniRichieste,
        Self::PreApprovatoResp,
        Self::ApprovatoAdmin,
        Self::Pagato,
        Self::Rifiutato,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Bozza => "BOZZA",
            Self::Inviato => "INVIATO",
            Self::IntegrazioniRichieste => "INTEGRAZIONI_RICHIESTE",
            Self::PreApprovatoResp => "PRE_APPROVATO_RESP",
            Self::ApprovatoAdmin => "APPROVATO_ADMIN",
            Self::Pagato => "PAGATO",
            Self::Rifiutato => "RIFIUTATO",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Pagato | Self::Rifiutato)
    }
}

impl fmt::Display for CompensationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompensationStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status("compensation", s)
    }
}

// ─── Expense reimbursement ───────────────────────────────────────────

/// Status of an expense reimbursement. There is no draft status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExpenseStatus {
    Inviato,
    IntegrazioniRichieste,
    PreApprovatoResp,
    ApprovatoAdmin,
    Pagato,
    Rifiutato,
}

impl Status for ExpenseStatus {
    const ALL: &'static [Self] = &[
        Self::Inviato,
        Self::IntegrazioniRichieste,
        Self::PreApprovatoResp,
        Self::ApprovatoAdmin,
        Self::Pagato,
        Self::Rifiutato,
    ];

    fn as_str(self) -> &'static str {
        match self {
            Self::Inviato => "INVIATO",
            Self::IntegrazioniRichieste => "INTEGRAZIONI_RICHIESTE",
            Self::PreApprovatoResp => "PRE_APPROVATO_RESP",
            Self::ApprovatoAdmin => "APPROVATO_ADMIN",
            Self::Pagato => "PAGATO",
            Self::Rifiutato => "RIFIUTATO",
        }
    }

    fn is_terminal(self) -> bool {
        matches!(self, Self::Pagato | Self::Rifiutato)
    }
}

impl fmt::Display for ExpenseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExpenseStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_status("expense", s)
    }
}
