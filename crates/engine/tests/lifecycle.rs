use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use approvals_core::{CompensationStatus, DenialKind, ExpenseStatus, Role};
use approvals_engine::{
    ApprovalEngine, ChannelSink, DeliveryError, EngineConfig, ExecutorError, NoopSink,
    NotificationCategory, NotificationPayload, NotificationSink, TransitionRequest,
};
use approvals_storage::{
    AuditRecord, EntityStateRecord, MemorySnapshot, MemoryStorage, NewAuditRecord, StorageError,
    WorkflowStorage,
};
use async_trait::async_trait;

const NOTE: &str = "Allega il giustificativo della trasferta.";

fn engine_with<S: WorkflowStorage>(
    storage: Arc<S>,
    config: &EngineConfig,
    sink: Arc<dyn NotificationSink>,
) -> ApprovalEngine<S> {
    ApprovalEngine::new(storage, config, sink).expect("engine builds from valid config")
}

fn memory_engine() -> ApprovalEngine<MemoryStorage> {
    engine_with(
        Arc::new(MemoryStorage::new()),
        &EngineConfig::default(),
        Arc::new(NoopSink),
    )
}

// ── Full lifecycle ───────────────────────────────────────────────────

#[tokio::test]
async fn compensation_happy_path_writes_four_chained_records() {
    let engine = memory_engine();
    let exec = engine.compensation();
    exec.open("c-1", "u-1").await.unwrap();

    let steps = [
        (Role::Collaboratore, "submit", CompensationStatus::Inviato),
        (Role::Responsabile, "approve_manager", CompensationStatus::PreApprovatoResp),
        (Role::Amministrazione, "approve_admin", CompensationStatus::ApprovatoAdmin),
        (Role::Amministrazione, "mark_paid", CompensationStatus::Pagato),
    ];
    for (i, (role, action, expected)) in steps.into_iter().enumerate() {
        let applied = exec
            .validate_and_apply(&TransitionRequest::new("c-1", role, action))
            .await
            .unwrap();
        assert_eq!(applied.to, expected);
        assert_eq!(applied.version, i as i64 + 1);
    }

    let history = exec.history("c-1").await.unwrap();
    assert_eq!(history.len(), 4);
    assert_eq!(history[0].previous_state, Some(CompensationStatus::Bozza));
    for pair in history.windows(2) {
        assert_eq!(pair[1].previous_state, Some(pair[0].new_state));
    }
    assert_eq!(
        history.iter().map(|e| e.sequence).collect::<Vec<_>>(),
        vec![1, 2, 3, 4]
    );
    exec.verify_ledger("c-1").await.unwrap();
    assert_eq!(exec.current_state("c-1").await.unwrap(), CompensationStatus::Pagato);
}

#[tokio::test]
async fn expense_integration_loop_then_payment() {
    let engine = memory_engine();
    let exec = engine.expense();
    exec.open("r-1", "u-2").await.unwrap();
    assert_eq!(exec.current_state("r-1").await.unwrap(), ExpenseStatus::Inviato);

    let steps = [
        TransitionRequest::new("r-1", Role::Responsabile, "request_integration").with_note("x"),
        TransitionRequest::new("r-1", Role::Collaboratore, "resubmit"),
        TransitionRequest::new("r-1", Role::Responsabile, "approve_manager"),
        TransitionRequest::new("r-1", Role::SuperAdmin, "approve_admin"),
        TransitionRequest::new("r-1", Role::Amministrazione, "mark_paid"),
    ];
    for request in &steps {
        exec.validate_and_apply(request).await.unwrap();
    }

    let history = exec.history("r-1").await.unwrap();
    assert_eq!(history.len(), 5);
    assert_eq!(history[0].note.as_deref(), Some("x"));
    exec.verify_ledger("r-1").await.unwrap();
}

#[tokio::test]
async fn rejection_is_terminal() {
    let engine = memory_engine();
    let exec = engine.compensation();
    exec.open("c-1", "u-1").await.unwrap();
    exec.validate_and_apply(&TransitionRequest::new("c-1", Role::Collaboratore, "submit"))
        .await
        .unwrap();
    exec.validate_and_apply(
        &TransitionRequest::new("c-1", Role::Responsabile, "reject_manager").with_note(NOTE),
    )
    .await
    .unwrap();

    let space = exec.action_space("c-1", Role::SuperAdmin).await.unwrap();
    assert_eq!(space.state, CompensationStatus::Rifiutato);
    assert!(space.available.is_empty());

    let err = exec
        .validate_and_apply(&TransitionRequest::new("c-1", Role::Collaboratore, "resubmit"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("RIFIUTATO"));
}

#[tokio::test]
async fn collaborator_cannot_self_approve() {
    let engine = memory_engine();
    let exec = engine.compensation();
    exec.open("c-1", "u-1").await.unwrap();
    exec.validate_and_apply(&TransitionRequest::new("c-1", Role::Collaboratore, "submit"))
        .await
        .unwrap();
    for action in ["approve_manager", "approve_admin", "mark_paid"] {
        match exec
            .validate_and_apply(&TransitionRequest::new("c-1", Role::Collaboratore, action))
            .await
        {
            Err(ExecutorError::Denied(d)) => {
                assert_eq!(d.kind(), DenialKind::RoleNotPermitted);
                assert!(d.reason().contains("ruolo"));
            }
            other => panic!("{action}: expected role denial, got {other:?}"),
        }
    }
    assert_eq!(exec.history("c-1").await.unwrap().len(), 1);
}

// ── Notifications ────────────────────────────────────────────────────

#[tokio::test]
async fn notifications_follow_the_notified_subset() {
    let (sink, mut rx) = ChannelSink::channel();
    let engine = engine_with(
        Arc::new(MemoryStorage::new()),
        &EngineConfig::default(),
        Arc::new(sink),
    );
    let exec = engine.compensation();
    exec.open("c-1", "owner-9").await.unwrap();

    let requests = [
        TransitionRequest::new("c-1", Role::Collaboratore, "submit"),
        TransitionRequest::new("c-1", Role::Responsabile, "request_integration").with_note(NOTE),
        TransitionRequest::new("c-1", Role::Collaboratore, "resubmit"),
        TransitionRequest::new("c-1", Role::Responsabile, "approve_manager"),
        TransitionRequest::new("c-1", Role::Amministrazione, "approve_admin"),
        TransitionRequest::new("c-1", Role::Amministrazione, "mark_paid"),
    ];
    let mut returned = Vec::new();
    for request in &requests {
        let applied = exec.validate_and_apply(request).await.unwrap();
        returned.push(applied.notification.map(|n| n.category));
    }
    assert_eq!(
        returned,
        vec![
            None,
            Some(NotificationCategory::IntegrationRequested),
            None,
            None,
            Some(NotificationCategory::Approved),
            Some(NotificationCategory::Paid),
        ]
    );

    let mut delivered = Vec::new();
    while let Ok(payload) = rx.try_recv() {
        delivered.push(payload);
    }
    assert_eq!(delivered.len(), 3);
    assert!(delivered.iter().all(|p| p.recipient_id == "owner-9"));
    assert!(delivered.iter().all(|p| p.related_entity_id == "c-1"));
    assert!(delivered[0].body.contains(NOTE));
}

#[tokio::test]
async fn manager_rejection_does_not_notify_but_admin_rejection_does() {
    let (sink, mut rx) = ChannelSink::channel();
    let engine = engine_with(
        Arc::new(MemoryStorage::new()),
        &EngineConfig::default(),
        Arc::new(sink),
    );
    let exec = engine.expense();

    exec.open("r-1", "u-1").await.unwrap();
    exec.validate_and_apply(
        &TransitionRequest::new("r-1", Role::Responsabile, "reject_manager").with_note("no"),
    )
    .await
    .unwrap();
    assert!(rx.try_recv().is_err());

    exec.open("r-2", "u-1").await.unwrap();
    exec.validate_and_apply(&TransitionRequest::new("r-2", Role::Responsabile, "approve_manager"))
        .await
        .unwrap();
    exec.validate_and_apply(
        &TransitionRequest::new("r-2", Role::Amministrazione, "reject")
            .with_note("Scontrino illeggibile"),
    )
    .await
    .unwrap();
    let payload = rx.try_recv().unwrap();
    assert_eq!(payload.category, NotificationCategory::Rejected);
    assert_eq!(payload.related_entity_type, "expense_reimbursement");
    assert!(payload.body.contains("Scontrino illeggibile"));
}

struct FailingSink;

#[async_trait]
impl NotificationSink for FailingSink {
    async fn deliver(&self, _payload: NotificationPayload) -> Result<(), DeliveryError> {
        Err(DeliveryError::Failed("smtp unreachable".to_string()))
    }
}

#[tokio::test]
async fn delivery_failure_keeps_committed_transition() {
    let engine = engine_with(
        Arc::new(MemoryStorage::new()),
        &EngineConfig::default(),
        Arc::new(FailingSink),
    );
    let exec = engine.expense();
    exec.open("r-1", "u-1").await.unwrap();
    exec.validate_and_apply(&TransitionRequest::new("r-1", Role::Responsabile, "approve_manager"))
        .await
        .unwrap();
    let applied = exec
        .validate_and_apply(&TransitionRequest::new("r-1", Role::Amministrazione, "approve_admin"))
        .await
        .unwrap();
    assert!(applied.notification.is_some());
    assert_eq!(exec.current_state("r-1").await.unwrap(), ExpenseStatus::ApprovatoAdmin);
    assert_eq!(exec.history("r-1").await.unwrap().len(), 2);
}

// ── Configuration ────────────────────────────────────────────────────

#[tokio::test]
async fn configured_note_rule_applies_at_apply_time() {
    let config = EngineConfig::from_toml_str("[expense]\nmin_note_chars = 20\n").unwrap();
    let engine = engine_with(Arc::new(MemoryStorage::new()), &config, Arc::new(NoopSink));
    let exec = engine.expense();
    exec.open("r-1", "u-1").await.unwrap();

    let err = exec
        .validate_and_apply(
            &TransitionRequest::new("r-1", Role::Responsabile, "request_integration")
                .with_note("breve"),
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("20"));

    exec.validate_and_apply(
        &TransitionRequest::new("r-1", Role::Responsabile, "request_integration").with_note(NOTE),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn workflows_share_storage_without_mixing_entities() {
    let engine = memory_engine();
    engine.compensation().open("x-1", "u-1").await.unwrap();
    engine.expense().open("x-1", "u-1").await.unwrap();
    engine
        .compensation()
        .validate_and_apply(&TransitionRequest::new("x-1", Role::Collaboratore, "submit"))
        .await
        .unwrap();

    assert_eq!(
        engine.expense().current_state("x-1").await.unwrap(),
        ExpenseStatus::Inviato
    );
    assert!(engine.expense().history("x-1").await.unwrap().is_empty());
}

// ── Concurrency ──────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_approvals_serialize_and_losers_see_new_state() {
    let engine = Arc::new(memory_engine());
    engine.compensation().open("c-1", "u-1").await.unwrap();
    engine
        .compensation()
        .validate_and_apply(&TransitionRequest::new("c-1", Role::Collaboratore, "submit"))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for _ in 0..8 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .compensation()
                .validate_and_apply(&TransitionRequest::new(
                    "c-1",
                    Role::Responsabile,
                    "approve_manager",
                ))
                .await
        }));
    }

    let mut applied = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => applied += 1,
            Err(ExecutorError::Denied(d)) => {
                assert_eq!(d.kind(), DenialKind::InvalidState);
                assert!(d.reason().contains("PRE_APPROVATO_RESP"));
            }
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
    assert_eq!(applied, 1);
    assert_eq!(engine.compensation().history("c-1").await.unwrap().len(), 2);
    engine.compensation().verify_ledger("c-1").await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn different_entities_proceed_independently() {
    let engine = Arc::new(memory_engine());
    for i in 0..16 {
        engine.expense().open(&format!("r-{i}"), "u-1").await.unwrap();
    }

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = Arc::clone(&engine);
        handles.push(tokio::spawn(async move {
            engine
                .expense()
                .validate_and_apply(&TransitionRequest::new(
                    format!("r-{i}"),
                    Role::Responsabile,
                    "approve_manager",
                ))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }
    for i in 0..16 {
        assert_eq!(
            engine.expense().current_state(&format!("r-{i}")).await.unwrap(),
            ExpenseStatus::PreApprovatoResp
        );
    }
}

/// Memory storage whose first `conflicts` updates report a version conflict.
struct ConflictingStorage {
    inner: MemoryStorage,
    conflicts: AtomicU32,
}

impl ConflictingStorage {
    fn new(conflicts: u32) -> Self {
        ConflictingStorage {
            inner: MemoryStorage::new(),
            conflicts: AtomicU32::new(conflicts),
        }
    }
}

#[async_trait]
impl WorkflowStorage for ConflictingStorage {
    type Snapshot = MemorySnapshot;

    async fn begin_snapshot(&self) -> Result<MemorySnapshot, StorageError> {
        self.inner.begin_snapshot().await
    }

    async fn commit_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        self.inner.commit_snapshot(snapshot).await
    }

    async fn abort_snapshot(&self, snapshot: MemorySnapshot) -> Result<(), StorageError> {
        self.inner.abort_snapshot(snapshot).await
    }

    async fn initialize_entity(
        &self,
        snapshot: &mut MemorySnapshot,
        entity_type: &str,
        entity_id: &str,
        owner_id: &str,
        initial_state: &str,
    ) -> Result<(), StorageError> {
        self.inner
            .initialize_entity(snapshot, entity_type, entity_id, owner_id, initial_state)
            .await
    }

    async fn get_entity_state_for_update(
        &self,
        snapshot: &mut MemorySnapshot,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<EntityStateRecord, StorageError> {
        self.inner
            .get_entity_state_for_update(snapshot, entity_type, entity_id)
            .await
    }

    async fn update_entity_state(
        &self,
        snapshot: &mut MemorySnapshot,
        entity_type: &str,
        entity_id: &str,
        expected_version: i64,
        new_state: &str,
        action: &str,
    ) -> Result<i64, StorageError> {
        let injected = self
            .conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if injected {
            return Err(StorageError::ConcurrentConflict {
                entity_type: entity_type.to_string(),
                entity_id: entity_id.to_string(),
                expected_version,
            });
        }
        self.inner
            .update_entity_state(
                snapshot,
                entity_type,
                entity_id,
                expected_version,
                new_state,
                action,
            )
            .await
    }

    async fn append_audit_record(
        &self,
        snapshot: &mut MemorySnapshot,
        record: NewAuditRecord,
    ) -> Result<AuditRecord, StorageError> {
        self.inner.append_audit_record(snapshot, record).await
    }

    async fn get_entity_state(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<EntityStateRecord, StorageError> {
        self.inner.get_entity_state(entity_type, entity_id).await
    }

    async fn list_entity_states(
        &self,
        entity_type: &str,
        state_filter: Option<&str>,
    ) -> Result<Vec<EntityStateRecord>, StorageError> {
        self.inner.list_entity_states(entity_type, state_filter).await
    }

    async fn list_audit_records(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> Result<Vec<AuditRecord>, StorageError> {
        self.inner.list_audit_records(entity_type, entity_id).await
    }
}

#[tokio::test]
async fn conflicts_are_retried_within_budget() {
    let engine = engine_with(
        Arc::new(ConflictingStorage::new(2)),
        &EngineConfig::default(),
        Arc::new(NoopSink),
    );
    let exec = engine.compensation();
    exec.open("c-1", "u-1").await.unwrap();
    let applied = exec
        .validate_and_apply(&TransitionRequest::new("c-1", Role::Collaboratore, "submit"))
        .await
        .unwrap();
    assert_eq!(applied.version, 1);
    assert_eq!(exec.history("c-1").await.unwrap().len(), 1);
}

#[tokio::test]
async fn exhausted_retries_leave_no_trace() {
    let config = EngineConfig::from_toml_str("max_attempts = 2").unwrap();
    let engine = engine_with(
        Arc::new(ConflictingStorage::new(5)),
        &config,
        Arc::new(NoopSink),
    );
    let exec = engine.compensation();
    exec.open("c-1", "u-1").await.unwrap();
    let err = exec
        .validate_and_apply(&TransitionRequest::new("c-1", Role::Collaboratore, "submit"))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExecutorError::RetriesExhausted { attempts: 2, .. }
    ));
    assert_eq!(exec.current_state("c-1").await.unwrap(), CompensationStatus::Bozza);
    assert!(exec.history("c-1").await.unwrap().is_empty());
}
