use std::future::Future;

use super::{make_audit, seed, TestResult, ENTITY_TYPE};
use crate::{StorageError, WorkflowStorage};

pub(super) async fn run_error_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "error",
        "get_entity_state_not_found_has_correct_fields",
        get_entity_state_not_found_has_correct_fields(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "get_entity_state_for_update_nonexistent",
        get_entity_state_for_update_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "update_entity_state_nonexistent",
        update_entity_state_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "append_audit_record_nonexistent",
        append_audit_record_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_audit_records_empty_for_nonexistent",
        list_audit_records_empty_for_nonexistent(factory).await,
    ));
    results.push(TestResult::from_result(
        "error",
        "list_entity_states_scoped_by_type",
        list_entity_states_scoped_by_type(factory).await,
    ));

    results
}

async fn get_entity_state_not_found_has_correct_fields<S, F, Fut>(
    factory: &F,
) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    match s.get_entity_state(ENTITY_TYPE, "c-999").await {
        Err(StorageError::EntityNotFound {
            entity_type,
            entity_id,
        }) if entity_type == ENTITY_TYPE && entity_id == "c-999" => Ok(()),
        other => Err(format!("expected EntityNotFound(compensation/c-999), got {other:?}")),
    }
}

async fn get_entity_state_for_update_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .get_entity_state_for_update(&mut snap, ENTITY_TYPE, "c-999")
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::EntityNotFound { .. }) => Ok(()),
        other => Err(format!("expected EntityNotFound, got {other:?}")),
    }
}

async fn update_entity_state_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .update_entity_state(&mut snap, ENTITY_TYPE, "c-999", 0, "INVIATO", "submit")
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::EntityNotFound { .. }) => Ok(()),
        other => Err(format!("expected EntityNotFound, got {other:?}")),
    }
}

async fn append_audit_record_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    let result = s
        .append_audit_record(
            &mut snap,
            make_audit("c-999", Some("BOZZA"), "INVIATO", "submit"),
        )
        .await;
    let _ = s.abort_snapshot(snap).await;
    match result {
        Err(StorageError::EntityNotFound { .. }) => Ok(()),
        other => Err(format!("expected EntityNotFound, got {other:?}")),
    }
}

async fn list_audit_records_empty_for_nonexistent<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    let ledger = s
        .list_audit_records(ENTITY_TYPE, "c-999")
        .await
        .map_err(|e| e.to_string())?;
    if !ledger.is_empty() {
        return Err(format!("expected empty ledger, got {}", ledger.len()));
    }
    Ok(())
}

async fn list_entity_states_scoped_by_type<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    let other = s
        .list_entity_states("expense_reimbursement", None)
        .await
        .map_err(|e| e.to_string())?;
    if !other.is_empty() {
        return Err(format!("expected no expense entities, got {}", other.len()));
    }
    Ok(())
}
