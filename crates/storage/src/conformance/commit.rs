use std::future::Future;

use super::{make_audit, seed, transition, TestResult, ENTITY_TYPE};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_commit_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "commit",
        "update_and_audit_visible_together",
        update_and_audit_visible_together(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "failed_append_then_abort_leaves_no_trace",
        failed_append_then_abort_leaves_no_trace(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "multiple_transitions_in_one_snapshot",
        multiple_transitions_in_one_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "commit",
        "last_action_recorded",
        last_action_recorded(factory).await,
    ));

    results
}

// ── 1. Update and audit land together ───────────────────────────────────────

async fn update_and_audit_visible_together<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    let written = transition(&s, "c-1", 0, Some("BOZZA"), "INVIATO", "submit").await?;

    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    let ledger = s
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;

    if rec.state != "INVIATO" || rec.version != 1 {
        return Err(format!("expected INVIATO@1, got {}@{}", rec.state, rec.version));
    }
    if ledger.len() != 1 || ledger[0].id != written.id {
        return Err(format!("expected the written record only, got {ledger:?}"));
    }
    Ok(())
}

// ── 2. Failed append aborts the whole transition ────────────────────────────

async fn failed_append_then_abort_leaves_no_trace<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_entity_state(&mut snap, ENTITY_TYPE, "c-1", 0, "INVIATO", "submit")
        .await
        .map_err(|e| e.to_string())?;
    // new_state disagrees with the entity state written above.
    let result = s
        .append_audit_record(
            &mut snap,
            make_audit("c-1", Some("BOZZA"), "PAGATO", "mark_paid"),
        )
        .await;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if !matches!(result, Err(StorageError::LedgerMismatch { .. })) {
        return Err(format!("expected LedgerMismatch, got {result:?}"));
    }
    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.state != "BOZZA" || rec.version != 0 {
        return Err(format!("entity changed after aborted transition: {rec:?}"));
    }
    Ok(())
}

// ── 3. Several transitions in one snapshot ──────────────────────────────────

async fn multiple_transitions_in_one_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let steps = [
        (0, "BOZZA", "INVIATO", "submit"),
        (1, "INVIATO", "PRE_APPROVATO_RESP", "approve_manager"),
    ];
    for (version, from, to, action) in steps {
        s.update_entity_state(&mut snap, ENTITY_TYPE, "c-1", version, to, action)
            .await
            .map_err(|e| format!("{action}: {e}"))?;
        s.append_audit_record(&mut snap, make_audit("c-1", Some(from), to, action))
            .await
            .map_err(|e| format!("{action}: {e}"))?;
    }
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    let ledger = s
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.version != 2 || rec.state != "PRE_APPROVATO_RESP" {
        return Err(format!("unexpected entity: {rec:?}"));
    }
    if ledger.len() != 2 {
        return Err(format!("expected 2 records, got {}", ledger.len()));
    }
    Ok(())
}

// ── 4. last_action ──────────────────────────────────────────────────────────

async fn last_action_recorded<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    transition(&s, "c-1", 0, Some("BOZZA"), "INVIATO", "submit").await?;

    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.last_action.as_deref() != Some("submit") {
        return Err(format!("expected last_action=submit, got {:?}", rec.last_action));
    }
    Ok(())
}
