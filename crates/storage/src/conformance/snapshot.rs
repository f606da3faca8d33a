use std::future::Future;

use super::{make_audit, seed, TestResult, ENTITY_TYPE};
use crate::WorkflowStorage;

pub(super) async fn run_snapshot_tests<S, F, Fut>(factory: &F) -> Vec<TestResult>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_entity_invisible",
        uncommitted_entity_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "uncommitted_update_and_audit_invisible",
        uncommitted_update_and_audit_invisible(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "abort_discards_writes",
        abort_discards_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "dropped_snapshot_discards_writes",
        dropped_snapshot_discards_writes(factory).await,
    ));
    results.push(TestResult::from_result(
        "snapshot",
        "list_entity_states_filters_by_state",
        list_entity_states_filters_by_state(factory).await,
    ));

    results
}

// ── 1. Uncommitted entity invisible ─────────────────────────────────────────

async fn uncommitted_entity_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
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

    let visible = s.get_entity_state(ENTITY_TYPE, "c-1").await.is_ok();
    let listed = s
        .list_entity_states(ENTITY_TYPE, None)
        .await
        .map_err(|e| e.to_string())?
        .len();
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    if visible || listed != 0 {
        return Err("uncommitted entity was visible outside its snapshot".to_string());
    }
    Ok(())
}

// ── 2. Uncommitted update and audit invisible ───────────────────────────────

async fn uncommitted_update_and_audit_invisible<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.append_audit_record(&mut snap, make_audit("c-1", Some("BOZZA"), "INVIATO", "submit"))
        .await
        .map_err(|e| e.to_string())?;

    let outside = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    let ledger = s
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    s.commit_snapshot(snap).await.map_err(|e| e.to_string())?;

    if outside.state != "BOZZA" || outside.version != 0 {
        return Err(format!(
            "uncommitted update leaked: state={} version={}",
            outside.state, outside.version
        ));
    }
    if !ledger.is_empty() {
        return Err(format!("uncommitted audit leaked: {} records", ledger.len()));
    }
    Ok(())
}

// ── 3. Abort discards writes ────────────────────────────────────────────────

async fn abort_discards_writes<S, F, Fut>(factory: &F) -> Result<(), String>
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
    s.append_audit_record(&mut snap, make_audit("c-1", Some("BOZZA"), "INVIATO", "submit"))
        .await
        .map_err(|e| e.to_string())?;
    s.abort_snapshot(snap).await.map_err(|e| e.to_string())?;

    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.state != "BOZZA" || rec.version != 0 {
        return Err(format!("abort did not roll back: {rec:?}"));
    }
    let ledger = s
        .list_audit_records(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if !ledger.is_empty() {
        return Err("abort left audit records behind".to_string());
    }
    Ok(())
}

// ── 4. Dropped snapshot discards writes ─────────────────────────────────────

async fn dropped_snapshot_discards_writes<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;

    {
        let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
        s.update_entity_state(&mut snap, ENTITY_TYPE, "c-1", 0, "INVIATO", "submit")
            .await
            .map_err(|e| e.to_string())?;
    }

    let rec = s
        .get_entity_state(ENTITY_TYPE, "c-1")
        .await
        .map_err(|e| e.to_string())?;
    if rec.state != "BOZZA" {
        return Err(format!("dropped snapshot was applied: {rec:?}"));
    }

    // A later snapshot must be able to touch the entity again.
    super::transition(&s, "c-1", 0, Some("BOZZA"), "INVIATO", "submit").await?;
    Ok(())
}

// ── 5. State filter ─────────────────────────────────────────────────────────

async fn list_entity_states_filters_by_state<S, F, Fut>(factory: &F) -> Result<(), String>
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let s = factory().await;
    seed(&s, "c-1", "BOZZA").await?;
    seed(&s, "c-2", "BOZZA").await?;
    seed(&s, "c-3", "BOZZA").await?;
    super::transition(&s, "c-2", 0, Some("BOZZA"), "INVIATO", "submit").await?;

    let drafts = s
        .list_entity_states(ENTITY_TYPE, Some("BOZZA"))
        .await
        .map_err(|e| e.to_string())?;
    let submitted = s
        .list_entity_states(ENTITY_TYPE, Some("INVIATO"))
        .await
        .map_err(|e| e.to_string())?;
    let all = s
        .list_entity_states(ENTITY_TYPE, None)
        .await
        .map_err(|e| e.to_string())?;

    if drafts.len() != 2 || submitted.len() != 1 || all.len() != 3 {
        return Err(format!(
            "expected 2/1/3 entities, got {}/{}/{}",
            drafts.len(),
            submitted.len(),
            all.len()
        ));
    }
    if submitted[0].entity_id != "c-2" {
        return Err(format!("wrong entity in filter: {}", submitted[0].entity_id));
    }
    Ok(())
}
