//! The two approval workflows and their declarative transition tables.

use std::fmt;

use crate::action::Action;
use crate::role::Role;
use crate::status::{CompensationStatus, ExpenseStatus, Status};

/// One row of a workflow's transition table.
#[derive(Debug, Clone, Copy)]
pub struct TransitionSpec<S: 'static> {
    pub action: Action,
    pub from: &'static [S],
    pub roles: &'static [Role],
    pub requires_note: bool,
    pub target: S,
}

/// A workflow: its status type, identity labels and transition table.
///
/// Implemented by zero-sized marker types; the table itself is turned into
/// a validated [`Catalog`](crate::Catalog) once, at start-up.
pub trait Workflow: fmt::Debug + Clone + Copy + Default + Send + Sync + 'static {
    type Status: Status;

    /// Short workflow name (`compensation`, `expense`).
    const NAME: &'static str;
    /// Entity type label used for persistence keys and notifications.
    const ENTITY_TYPE: &'static str;
    /// Italian noun for the request, used in notification text.
    const NOUN: &'static str;
    /// Default minimum trimmed length for required notes.
    const DEFAULT_MIN_NOTE_CHARS: usize;

    fn initial_status() -> Self::Status;

    fn transition_table() -> &'static [TransitionSpec<Self::Status>];
}

// ─── Compensation ────────────────────────────────────────────────────

/// Compensation claims: seven statuses, starting from a draft.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Compensation;

const COMPENSATION_TABLE: &[TransitionSpec<CompensationStatus>] = {
    use CompensationStatus::*;
    &[
        TransitionSpec {
            action: Action::Submit,
            from: &[Bozza],
            roles: &[Role::Collaboratore],
            requires_note: false,
            target: Inviato,
        },
        TransitionSpec {
            action: Action::Withdraw,
            from: &[Inviato],
            roles: &[Role::Collaboratore],
            requires_note: false,
            target: Bozza,
        },
        TransitionSpec {
            action: Action::Resubmit,
            from: &[IntegrazioniRichieste],
            roles: &[Role::Collaboratore],
            requires_note: false,
            target: Inviato,
        },
        TransitionSpec {
            action: Action::ApproveManager,
            from: &[Inviato],
            roles: &[Role::Responsabile],
            requires_note: false,
            target: PreApprovatoResp,
        },
        TransitionSpec {
            action: Action::RequestIntegration,
            from: &[Inviato, IntegrazioniRichieste],
            roles: &[Role::Responsabile],
            requires_note: true,
            target: IntegrazioniRichieste,
        },
        TransitionSpec {
            action: Action::RejectManager,
            from: &[Inviato, IntegrazioniRichieste],
            roles: &[Role::Responsabile],
            requires_note: true,
            target: Rifiutato,
        },
        TransitionSpec {
            action: Action::ApproveAdmin,
            from: &[PreApprovatoResp],
            roles: &[Role::Amministrazione],
            requires_note: false,
            target: ApprovatoAdmin,
        },
        TransitionSpec {
            action: Action::Reject,
            from: &[PreApprovatoResp],
            roles: &[Role::Amministrazione],
            requires_note: true,
            target: Rifiutato,
        },
        TransitionSpec {
            action: Action::MarkPaid,
            from: &[ApprovatoAdmin],
            roles: &[Role::Amministrazione],
            requires_note: false,
            target: Pagato,
        },
    ]
};

impl Workflow for Compensation {
    type Status = CompensationStatus;

    const NAME: &'static str = "compensation";
    const ENTITY_TYPE: &'static str = "compensation";
    const NOUN: &'static str = "compenso";
    const DEFAULT_MIN_NOTE_CHARS: usize = 20;

    fn initial_status() -> CompensationStatus {
        CompensationStatus::Bozza
    }

    fn transition_table() -> &'static [TransitionSpec<CompensationStatus>] {
        COMPENSATION_TABLE
    }
}

// ─── Expense reimbursement ───────────────────────────────────────────

/// Expense reimbursements: six statuses, created already submitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExpenseReimbursement;

const EXPENSE_TABLE: &[TransitionSpec<ExpenseStatus>] = {
    use ExpenseStatus::*;
    &[
        TransitionSpec {
            action: Action::Resubmit,
            from: &[IntegrazioniRichieste],
            roles: &[Role::Collaboratore],
            requires_note: false,
            target: Inviato,
        },
        TransitionSpec {
            action: Action::ApproveManager,
            from: &[Inviato],
            roles: &[Role::Responsabile],
            requires_note: false,
            target: PreApprovatoResp,
        },
        TransitionSpec {
            action: Action::RequestIntegration,
            from: &[Inviato, IntegrazioniRichieste],
            roles: &[Role::Responsabile],
            requires_note: true,
            target: IntegrazioniRichieste,
        },
        TransitionSpec {
            action: Action::RejectManager,
            from: &[Inviato, IntegrazioniRichieste],
            roles: &[Role::Responsabile],
            requires_note: true,
            target: Rifiutato,
        },
        TransitionSpec {
            action: Action::ApproveAdmin,
            from: &[PreApprovatoResp],
            roles: &[Role::Amministrazione],
            requires_note: false,
            target: ApprovatoAdmin,
        },
        TransitionSpec {
            action: Action::Reject,
            from: &[PreApprovatoResp],
            roles: &[Role::Amministrazione],
            requires_note: true,
            target: Rifiutato,
        },
        TransitionSpec {
            action: Action::MarkPaid,
            from: &[ApprovatoAdmin],
            roles: &[Role::Amministrazione],
            requires_note: false,
            target: Pagato,
        },
    ]
};

impl Workflow for ExpenseReimbursement {
    type Status = ExpenseStatus;

    const NAME: &'static str = "expense";
    const ENTITY_TYPE: &'static str = "expense_reimbursement";
    const NOUN: &'static str = "rimborso spese";
    const DEFAULT_MIN_NOTE_CHARS: usize = 1;

    fn initial_status() -> ExpenseStatus {
        ExpenseStatus::Inviato
    }

    fn transition_table() -> &'static [TransitionSpec<ExpenseStatus>] {
        EXPENSE_TABLE
    }
}
