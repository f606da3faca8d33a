use std::future::Future;

use super::{seed, TestResult, ENTITY_TYPE};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_init_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "init",
        "initialize_creates_entity_at_version_0",
        initialize_creates_entity_at_version_0(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "initialize_records_owner_and_state",
        initialize_records_owner_and_state(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "initialize_duplicate_returns_already_initialized",
        initialize_duplicate_returns_already_initialized(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "initialize_duplicate_in_same_snapshot",
        initialize_duplicate_in_same_snapshot(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "same_id_different_type_independent",
        same_id_different_type_independent(factory).await,
    ));
    results.push(TestResult::from_result(
        "init",
        "new_entity_has_empty_ledger",
        new_entity_has_empty_ledger(factory).await,
    ));

    results
}

async fn initialize_creates_entity_at_version_0<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.version != 0 {
        return Err(format!("expected version 0, got {}", rec.version));
    }
    if rec.last_action.is_some() {
        return Err(format!("expected no last_action, got {:?}", rec.last_action));
    }
    Ok(())
}

async fn initialize_records_owner_and_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.initialize_entity(&mut snap, ENTITY_TYPE, "c-1", "user-42", "BOZZA")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.owner_id != "user-42" || rec.state != "BOZZA" || rec.entity_type != ENTITY_TYPE {
        return Err(format!("unexpected record: {rec:?}"));
    }
    Ok(())
}

async fn initialize_duplicate_returns_already_initialized<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .initialize_entity(&mut snap, ENTITY_TYPE, "c-1", "owner-1", "BOZZA")
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyInitialized {
            entity_type,
            entity_id,
        }) if entity_type == ENTITY_TYPE && entity_id == "c-1" => Ok(()),
        other => Err(format!("expected AlreadyInitialized, got {other:?}")),
    }
}

async fn initialize_duplicate_in_same_snapshot<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.initialize_entity(&mut snap, ENTITY_TYPE, "c-1", "owner-1", "BOZZA")
        .await
        .map_err(|e| e.to_string())?;
    let result = s
        .initialize_entity(&mut snap, ENTITY_TYPE, "c-1", "owner-1", "BOZZA")
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::AlreadyInitialized { .. }) => Ok(()),
        other => Err(format!("expected AlreadyInitialized, got {other:?}")),
    }
}

async fn same_id_different_type_independent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "r-1", "BOZZA").await?;

    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.initialize_entity(&mut snap, "expense_reimbursement", "r-1", "owner-1", "INVIATO")
        .await
        .map_err(|e| format!("second type should initialize: {e}"))?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    let a = s
        .get_entity_state(ENTITY_TYPE, "r-1")
        .await
        .map_err(|e| e.to_string())?;
    let b = s
        .get_entity_state("expense_reimbursement", "r-1")
        .await
        .map_err(|e| e.to_string())?;
    if a.state != "BOZZA" || b.state != "INVIATO" {
        return Err(format!("states crossed: {} / {}", a.state, b.state));
    }
    Ok(())
}

async fn new_entity_has_empty_ledger<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    let ledger = s
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if !ledger.is_empty() {
        return Err(format!("expected empty ledger, got {} records", ledger.len()));
    }
    Ok(())
}
