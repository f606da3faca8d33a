use std::future::Future;

use super::{make_audit, seed, transition, TestResult, ENTITY_TYPE};
use crate::{NewAuditRecord, StorageError, WorkflowStorage};

pub(super) async fn run_ledger_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "ledger",
        "sequence_contiguous_from_one",
        sequence_contiguous_from_one(factory).await,
    ));
    results.push(TestResult::from_result(
        "ledger",
        "append_must_chain_on_tail",
        append_must_chain_on_tail(factory).await,
    ));
    results.push(TestResult::from_result(
        "ledger",
        "append_must_match_entity_state",
        append_must_match_entity_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "ledger",
        "role_label_and_note_stored",
        role_label_and_note_stored(factory).await,
    ));
    results.push(TestResult::from_result(
        "ledger",
        "first_record_may_have_no_previous_state",
        first_record_may_have_no_previous_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "ledger",
        "first_record_must_chain_on_prior_state",
        first_record_must_chain_on_prior_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "ledger",
        "full_lifecycle_chains",
        full_lifecycle_chains(factory).await,
    ));

    results
}

// ── 1. Sequence numbers ─────────────────────────────────────────────────────

async fn sequence_contiguous_from_one<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    transition(&s, "c-1", 0, Some("BOZZA"), "INVIATO", "submit").await?;
    transition(&s, "c-1", 1, Some("INVIATO"), "BOZZA", "withdraw").await?;
    transition(&s, "c-1", 2, Some("BOZZA"), "INVIATO", "submit").await?;

    let ledger = s
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    let sequences: Vec<i64> = ledger.iter().map(|r| r.sequence).collect();
    if sequences != [1, 2, 3] {
        return Err(format!("expected sequences [1, 2, 3], got {sequences:?}"));
    }
    let mut ids: Vec<&str> = ledger.iter().map(|r| r.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();
    if ids.len() != 3 {
        return Err("audit ids are not unique".to_string());
    }
    Ok(())
}

// ── 2. Chaining ─────────────────────────────────────────────────────────────

async fn append_must_chain_on_tail<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    transition(&s, "c-1", 0, Some("BOZZA"), "INVIATO", "submit").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_entity_state(
        &mut snap,
        ENTITY_TYPE,
        "c-1",
        1,
        "PRE_APPROVATO_RESP",
        "approve_manager",
    )
    .await
    .map_err(|e| e.to_string())?;
    // Tail is INVIATO, not BOZZA.
    let result = s
        .append_audit_record(
            &mut snap,
            make_audit("c-1", Some("BOZZA"), "PRE_APPROVATO_RESP", "approve_manager"),
        )
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::LedgerMismatch { expected, found, .. })
            if expected == "INVIATO" && found == "BOZZA" =>
        {
            Ok(())
        }
        other => Err(format!("expected LedgerMismatch(INVIATO, BOZZA), got {other:?}")),
    }
}

// ── 3. Record matches entity ────────────────────────────────────────────────

async fn append_must_match_entity_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    // No update in this snapshot: the entity is still BOZZA.
    let result = s
        .append_audit_record(&mut snap, make_audit("c-1", Some("BOZZA"), "INVIATO", "submit"))
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::LedgerMismatch { expected, found, .. })
            if expected == "BOZZA" && found == "INVIATO" =>
        {
            Ok(())
        }
        other => Err(format!("expected LedgerMismatch(BOZZA, INVIATO), got {other:?}")),
    }
}

// ── 4. Actor role and note ──────────────────────────────────────────────────

async fn role_label_and_note_stored<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "INVIATO").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_entity_state(
        &mut snap,
        ENTITY_TYPE,
        "c-1",
        0,
        "INTEGRAZIONI_RICHIESTE",
        "request_integration",
    )
    .await
    .map_err(|e| e.to_string())?;
    let written = s
        .append_audit_record(
            &mut snap,
            NewAuditRecord {
                note: Some("Allega il giustificativo della trasferta.".to_string()),
                ..make_audit(
                    "c-1",
                    Some("INVIATO"),
                    "INTEGRAZIONI_RICHIESTE",
                    "request_integration",
                )
            },
        )
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let ledger = s
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    let stored = ledger.first().ok_or("ledger is empty")?;
    if stored.actor_role != "responsabile" || stored.action != "request_integration" {
        return Err(format!("unexpected actor/action: {stored:?}"));
    }
    if stored.note.as_deref() != Some("Allega il giustificativo della trasferta.") {
        return Err(format!("note not stored: {:?}", stored.note));
    }
    if stored.id != written.id || stored.created_at.is_empty() {
        return Err(format!("stored record differs from returned one: {stored:?}"));
    }
    Ok(())
}

// ── 5. First record ─────────────────────────────────────────────────────────

async fn first_record_may_have_no_previous_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    transition(&s, "c-1", 0, None, "INVIATO", "submit").await?;
    // The next record chains on INVIATO.
    transition(&s, "c-1", 1, Some("INVIATO"), "BOZZA", "withdraw").await?;
    Ok(())
}

async fn first_record_must_chain_on_prior_state<S, F, Fut>(factory: &F) -> Result<(), String>
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
    // The entity was BOZZA before this update, never PAGATO.
    let result = s
        .append_audit_record(&mut snap, make_audit("c-1", Some("PAGATO"), "INVIATO", "submit"))
        .await;
    match result {
        Err(StorageError::LedgerMismatch { expected, found, .. })
            if expected == "BOZZA" && found == "PAGATO" => {}
        other => {
            let _ = s.abort_snapshot(snap).await;
            return Err(format!("expected LedgerMismatch(BOZZA, PAGATO), got {other:?}"));
        }
    }

    // The rejected append left nothing behind; the correct one still chains.
    let written = s
        .append_audit_record(&mut snap, make_audit("c-1", Some("BOZZA"), "INVIATO", "submit"))
        .await
        .map_err(|e| format!("append: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    if written.sequence != 1 {
        return Err(format!("expected sequence 1, got {}", written.sequence));
    }
    Ok(())
}

// ── 6. Full lifecycle ───────────────────────────────────────────────────────

async fn full_lifecycle_chains<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    let steps = [
        ("BOZZA", "INVIATO", "submit"),
        ("INVIATO", "PRE_APPROVATO_RESP", "approve_manager"),
        ("PRE_APPROVATO_RESP", "APPROVATO_ADMIN", "approve_admin"),
        ("APPROVATO_ADMIN", "PAGATO", "mark_paid"),
    ];
    for (version, (from, to, action)) in steps.into_iter().enumerate() {
        transition(&s, "c-1", version as i64, Some(from), to, action).await?;
    }

    let ledger = s
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if ledger.len() != 4 {
        return Err(format!("expected 4 records, got {}", ledger.len()));
    }
    for pair in ledger.windows(2) {
        if pair[1].previous_state.as_deref() != Some(pair[0].new_state.as_str()) {
            return Err(format!(
                "chain broken between #{} and #{}",
                pair[0].sequence, pair[1].sequence
            ));
        }
    }
    let entity = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    let tail = ledger.last().ok_or("ledger is empty")?;
    if tail.new_state != entity.state {
        return Err(format!(
            "ledger tail {} disagrees with entity {}",
            tail.new_state, entity.state
        ));
    }
    Ok(())
}
