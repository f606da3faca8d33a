//! Notification dispatcher.
//!
//! [`build`] turns an applied action into a message for the request's
//! owner. Only four actions notify: a request for more information, the
//! back-office approval, the back-office rejection and the payment. The
//! text names the kind of actor ("il responsabile", "l'amministrazione"),
//! never who they are.
//!
//! Delivery goes through a [`NotificationSink`]. The executor calls it
//! after the transition has committed and only logs a failed delivery.

use approvals_core::{Action, Workflow};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Actions that produce a notification, in either workflow.
pub const NOTIFIED_ACTIONS: [Action; 4] = [
    Action::RequestIntegration,
    Action::ApproveAdmin,
    Action::Reject,
    Action::MarkPaid,
];

/// Business event a notification reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationCategory {
    IntegrationRequested,
    Approved,
    Rejected,
    Paid,
}

/// A message ready for delivery. Not persisted by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationPayload {
    pub recipient_id: String,
    pub category: NotificationCategory,
    pub title: String,
    pub body: String,
    pub related_entity_type: String,
    pub related_entity_id: String,
}

/// Build the notification for `action`, or `None` if the action does not
/// notify.
///
/// A blank note is treated as absent.
pub fn build<W: Workflow>(
    action: Action,
    recipient_id: &str,
    entity_id: &str,
    note: Option<&str>,
) -> Option<NotificationPayload> {
    let note = note.map(str::trim).filter(|n| !n.is_empty());
    let noun = W::NOUN;

    let (category, title, mut body) = match action {
        Action::RequestIntegration => (
            NotificationCategory::IntegrationRequested,
            format!("Integrazioni richieste sul tuo {noun}"),
            format!("Il responsabile ha richiesto integrazioni per il tuo {noun}."),
        ),
        Action::ApproveAdmin => (
            NotificationCategory::Approved,
            format!("Il tuo {noun} è stato approvato"),
            format!("L'amministrazione ha approvato il tuo {noun}."),
        ),
        Action::Reject => (
            NotificationCategory::Rejected,
            format!("Il tuo {noun} è stato rifiutato"),
            format!("L'amministrazione ha rifiutato il tuo {noun}."),
        ),
        Action::MarkPaid => (
            NotificationCategory::Paid,
            format!("Il tuo {noun} è stato pagato"),
            format!("L'amministrazione ha registrato il pagamento del tuo {noun}."),
        ),
        _ => return None,
    };

    if let Some(note) = note {
        let label = match category {
            NotificationCategory::Rejected => "Motivazione",
            _ => "Nota",
        };
        body.push_str(&format!(" {label}: {note}"));
    }

    Some(NotificationPayload {
        recipient_id: recipient_id.to_string(),
        category,
        title,
        body,
        related_entity_type: W::ENTITY_TYPE.to_string(),
        related_entity_id: entity_id.to_string(),
    })
}

// ─── Delivery ────────────────────────────────────────────────────────

/// Errors a [`NotificationSink`] may report.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("notification channel closed")]
    ChannelClosed,

    #[error("notification delivery failed: {0}")]
    Failed(String),
}

/// Delivery collaborator. Fire-and-forget from the engine's side.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, payload: NotificationPayload) -> Result<(), DeliveryError>;
}

/// Sink that drops every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

#[async_trait]
impl NotificationSink for NoopSink {
    async fn deliver(&self, _payload: NotificationPayload) -> Result<(), DeliveryError> {
        Ok(())
    }
}

/// Sink that forwards notifications into a channel drained by a delivery
/// task.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<NotificationPayload>,
}

impl ChannelSink {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<NotificationPayload>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (ChannelSink { tx }, rx)
    }
}

#[async_trait]
impl NotificationSink for ChannelSink {
    async fn deliver(&self, payload: NotificationPayload) -> Result<(), DeliveryError> {
        self.tx
            .send(payload)
            .map_err(|_| DeliveryError::ChannelClosed)
    }
}
