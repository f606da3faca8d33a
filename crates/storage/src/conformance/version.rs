use std::future::Future;

use super::{seed, transition, TestResult, ENTITY_TYPE};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_version_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "version",
        "sequential_updates_increment_version",
        sequential_updates_increment_version(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "wrong_version_returns_conflict",
        wrong_version_returns_conflict(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "conflict_does_not_mutate",
        conflict_does_not_mutate(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "stale_version_after_commit_conflicts",
        stale_version_after_commit_conflicts(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "versions_independent_per_entity",
        versions_independent_per_entity(factory).await,
    ));
    results.push(TestResult::from_result(
        "version",
        "for_update_returns_current_version",
        for_update_returns_current_version(factory).await,
    ));

    results
}

// ── 1. Sequential increments ────────────────────────────────────────────────

async fn sequential_updates_increment_version<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.version != 3 {
        return Err(format!("expected version 3, got {}", rec.version));
    }
    Ok(())
}

// ── 2. Wrong version ────────────────────────────────────────────────────────

async fn wrong_version_returns_conflict<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_entity_state(&mut snap, ENTITY_TYPE, "c-1", 7, "INVIATO", "submit")
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::ConcurrentConflict {
            entity_type,
            entity_id,
            expected_version,
        }) if entity_type == ENTITY_TYPE && entity_id == "c-1" && expected_version == 7 => Ok(()),
        other => Err(format!("expected ConcurrentConflict(expected 7), got {other:?}")),
    }
}

// ── 3. Conflict leaves the entity alone ─────────────────────────────────────

async fn conflict_does_not_mutate<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let _ = s
        .update_entity_state(&mut snap, ENTITY_TYPE, "c-1", 1, "INVIATO", "submit")
        .await;
    // Committing after a rejected update must not apply it.
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.state != "BOZZA" || rec.version != 0 {
        return Err(format!("conflict mutated entity: {rec:?}"));
    }
    Ok(())
}

// ── 4. Stale version after an intervening commit ────────────────────────────

async fn stale_version_after_commit_conflicts<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;

    let read = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    transition(&s, "c-1", read.version, Some("BOZZA"), "INVIATO", "submit").await?;

    // A second caller still holding the version it read earlier.
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_entity_state(&mut snap, ENTITY_TYPE, "c-1", read.version, "INVIATO", "submit")
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::ConcurrentConflict { .. }) => Ok(()),
        other => Err(format!("expected ConcurrentConflict, got {other:?}")),
    }
}

// ── 5. Per-entity independence ──────────────────────────────────────────────

async fn versions_independent_per_entity<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    seed(&s, "c-2", "BOZZA").await?;
    transition(&s, "c-1", 0, Some("BOZZA"), "INVIATO", "submit").await?;
    transition(&s, "c-1", 1, Some("INVIATO"), "BOZZA", "withdraw").await?;
    // c-2 is still at version 0.
    transition(&s, "c-2", 0, Some("BOZZA"), "INVIATO", "submit").await?;

    let a = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .get_entity_state(ENTITY_TYPE, "c-2")
        .await
        .map_err(|e| e.to_string())?;
    if a.version != 2 || b.version != 1 {
        return Err(format!("expected versions 2/1, got {}/{}", a.version, b.version));
    }
    Ok(())
}

// ── 6. Read for update ──────────────────────────────────────────────────────

async fn for_update_returns_current_version<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    transition(&s, "c-1", 0, Some("BOZZA"), "INVIATO", "submit").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let rec = s
        .get_entity_state_for_update(&mut snap, ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;
    if rec.version != 1 || rec.state != "INVIATO" {
        return Err(format!("expected INVIATO@1, got {}@{}", rec.state, rec.version));
    }
    Ok(())
}
