use std::future::Future;
use std::sync::Arc;

use super::{make_audit, seed, TestResult, ENTITY_TYPE};
use crate::{StorageError, WorkflowStorage};

/// Number of concurrent tasks to spawn in each test.
const N: usize = 10;

pub(super) async fn run_concurrent_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_exactly_one_wins",
        concurrent_updates_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_initialize_exactly_one_wins",
        concurrent_initialize_exactly_one_wins(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "concurrent_updates_different_entities_all_succeed",
        concurrent_updates_different_entities_all_succeed(factory).await,
    ));
    results.push(TestResult::from_result(
        "concurrent",
        "read_for_update_serializes_transitions",
        read_for_update_serializes_transitions(factory).await,
    ));

    results
}

// ── Concurrent update: exactly one wins ─────────────────────────────────────

/// N tasks each open a snapshot and attempt to move the same entity out of
/// BOZZA at version 0. Exactly one commit succeeds; the rest must get
/// ConcurrentConflict.
async fn concurrent_updates_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), "c-1", "BOZZA").await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let result = s
                .update_entity_state(&mut snap, ENTITY_TYPE, "c-1", 0, "INVIATO", "submit")
                .await;
            match result {
                Ok(_new_version) => {
                    s.append_audit_record(
                        &mut snap,
                        make_audit("c-1", Some("BOZZA"), "INVIATO", "submit"),
                    )
                    .await?;
                    s.commit_snapshot(snap).await?;
                    Ok(true)
                }
                Err(StorageError::ConcurrentConflict { .. }) => {
                    s.abort_snapshot(snap).await?;
                    Ok(false)
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            }
        }));
    }

    let mut winners = 0usize;
    let mut losers = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        } else {
            losers += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 winner, got {winners}"));
    }
    if losers != N - 1 {
        return Err(format!("expected {} losers, got {losers}", N - 1));
    }

    let ledger = storage
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if ledger.len() != 1 {
        return Err(format!("expected 1 audit record, got {}", ledger.len()));
    }
    Ok(())
}

// ── Concurrent initialization: exactly one wins ─────────────────────────────

async fn concurrent_initialize_exactly_one_wins<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let owner = format!("owner-{i}");
            let result = s
                .initialize_entity(&mut snap, ENTITY_TYPE, "c-1", &owner, "BOZZA")
                .await;
            match result {
                Ok(()) => {
                    s.commit_snapshot(snap).await?;
                    Ok(true)
                }
                Err(StorageError::AlreadyInitialized { .. }) => {
                    s.abort_snapshot(snap).await?;
                    Ok(false)
                }
                Err(e) => {
                    let _ = s.abort_snapshot(snap).await;
                    Err(e)
                }
            }
        }));
    }

    let mut winners = 0usize;
    for handle in handles {
        let won = handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
        if won {
            winners += 1;
        }
    }

    if winners != 1 {
        return Err(format!("expected exactly 1 initializer, got {winners}"));
    }
    Ok(())
}

// ── Different entities: all succeed ─────────────────────────────────────────

async fn concurrent_updates_different_entities_all_succeed<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    for i in 0..N {
        seed(storage.as_ref(), &format!("c-{i}"), "BOZZA").await?;
    }

    let mut handles = Vec::new();
    for i in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let id = format!("c-{i}");
            let mut snap = s.begin_snapshot().await?;
            s.update_entity_state(&mut snap, ENTITY_TYPE, &id, 0, "INVIATO", "submit")
                .await?;
            s.append_audit_record(&mut snap, make_audit(&id, Some("BOZZA"), "INVIATO", "submit"))
                .await?;
            s.commit_snapshot(snap).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    let submitted = storage
        .list_entity_states(ENTITY_TYPE, Some("INVIATO"))
        .await
        .map_err(|e| e.to_string())?;
    if submitted.len() != N {
        return Err(format!("expected {N} submitted entities, got {}", submitted.len()));
    }
    Ok(())
}

// ── Read-for-update serializes ──────────────────────────────────────────────

/// N tasks each lock the entity, read its current state and version, and
/// apply the transition that state allows. Because the read takes the
/// entity lock, every task sees its predecessor's commit and none conflict.
async fn read_for_update_serializes_transitions<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let storage = Arc::new(factory().await);
    seed(storage.as_ref(), "c-1", "BOZZA").await?;

    let mut handles = Vec::new();
    for _ in 0..N {
        let s = storage.clone();
        handles.push(tokio::spawn(async move {
            let mut snap = s.begin_snapshot().await?;
            let current = s
                .get_entity_state_for_update(&mut snap, ENTITY_TYPE, "c-1")
                .await?;
            let (to, action) = if current.state == "BOZZA" {
                ("INVIATO", "submit")
            } else {
                ("BOZZA", "withdraw")
            };
            s.update_entity_state(&mut snap, ENTITY_TYPE, "c-1", current.version, to, action)
                .await?;
            s.append_audit_record(
                &mut snap,
                make_audit("c-1", Some(current.state.as_str()), to, action),
            )
            .await?;
            s.commit_snapshot(snap).await
        }));
    }

    for handle in handles {
        handle
            .await
            .map_err(|e| format!("task panic: {e}"))?
            .map_err(|e: StorageError| format!("storage error: {e}"))?;
    }

    let entity = storage
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if entity.version != N as i64 {
        return Err(format!("expected version {N}, got {}", entity.version));
    }
    let ledger = storage
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if ledger.len() != N {
        return Err(format!("expected {N} records, got {}", ledger.len()));
    }
    for pair in ledger.windows(2) {
        if pair[1].previous_state.as_deref() != Some(pair[0].new_state.as_str()) {
            return Err(format!("chain broken at #{}", pair[1].sequence));
        }
    }
    Ok(())
}
