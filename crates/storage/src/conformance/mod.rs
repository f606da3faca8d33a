//! Conformance test suite for `WorkflowStorage` implementations.
//!
//! This module provides a backend-agnostic test suite that any
//! `WorkflowStorage` implementation can run to verify correctness. The
//! suite covers:
//!
//! - **Initialization**: entity creation, duplicate detection
//! - **Errors**: correct error variants and fields for missing entities
//! - **Snapshot isolation**: uncommitted writes invisible, aborted writes discarded
//! - **Atomic commit**: state update and audit record land together or not at all
//! - **Version validation / OCC**: optimistic concurrency conflict detection
//! - **Ledger**: append-only chaining, sequence numbers, role-only actor labels
//! - **Concurrency**: racing transitions on one entity serialize
//!
//! # Usage
//!
//! Backend crates call [`run_conformance_suite`] with a factory function that
//! creates a fresh, empty storage instance for each test:
//!
//! ```ignore
//! use approvals_storage::conformance::run_conformance_suite;
//!
//! #[tokio::test(flavor = "multi_thread")]
//! async fn postgres_conformance() {
//!     let report = run_conformance_suite(|| async {
//!         create_test_postgres_storage().await
//!     }).await;
//!     assert!(report.failed == 0, "{report}");
//! }
//! ```

mod commit;
mod concurrent;
mod error;
mod init;
mod ledger;
mod snapshot;
mod version;

use std::fmt;
use std::future::Future;

use crate::record::{AuditRecord, NewAuditRecord};
use crate::WorkflowStorage;

/// Entity type used throughout the suite.
const ENTITY_TYPE: &str = "compensation";

/// Result of a single conformance test.
#[derive(Debug, Clone)]
pub struct TestResult {
    /// Test category (e.g. "init", "snapshot", "ledger").
    pub category: String,
    /// Test name (e.g. "initialize_creates_entity_at_version_0").
    pub name: String,
    /// Whether the test passed.
    pub passed: bool,
    /// Error message if the test failed.
    pub message: Option<String>,
}

impl TestResult {
    fn pass(category: &str, name: &str) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: true,
            message: None,
        }
    }

    fn fail(category: &str, name: &str, msg: String) -> Self {
        Self {
            category: category.to_string(),
            name: name.to_string(),
            passed: false,
            message: Some(msg),
        }
    }

    fn from_result(category: &str, name: &str, result: Result<(), String>) -> Self {
        match result {
            Ok(()) => Self::pass(category, name),
            Err(msg) => Self::fail(category, name, msg),
        }
    }
}

/// Aggregated report from a full conformance suite run.
#[derive(Debug, Clone)]
pub struct ConformanceReport {
    pub results: Vec<TestResult>,
    pub passed: usize,
    pub failed: usize,
    pub total: usize,
}

impl fmt::Display for ConformanceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Conformance: {}/{} passed ({} failed)",
            self.passed, self.total, self.failed
        )?;
        for r in &self.results {
            if !r.passed {
                writeln!(
                    f,
                    "  FAIL [{}/{}]: {}",
                    r.category,
                    r.name,
                    r.message.as_deref().unwrap_or("(no message)")
                )?;
            }
        }
        Ok(())
    }
}

/// Run the full conformance suite against a storage backend.
///
/// The `factory` function is called once per test to create a fresh, empty
/// storage instance, ensuring test isolation. The concurrency tests spawn
/// tasks, so this must run inside a tokio runtime.
pub async fn run_conformance_suite<S, F, Fut>(factory: F) -> ConformanceReport
where
    S: WorkflowStorage,
    F: Fn() -> Fut,
    Fut: Future<Output = S>,
{
    let mut results = Vec::new();

    results.extend(init::run_init_tests(&factory).await);
    results.extend(error::run_error_tests(&factory).await);
    results.extend(snapshot::run_snapshot_tests(&factory).await);
    results.extend(commit::run_commit_tests(&factory).await);
    results.extend(version::run_version_tests(&factory).await);
    results.extend(ledger::run_ledger_tests(&factory).await);
    results.extend(concurrent::run_concurrent_tests(&factory).await);

    let passed = results.iter().filter(|r| r.passed).count();
    let total = results.len();

    ConformanceReport {
        results,
        passed,
        failed: total - passed,
        total,
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

fn make_audit(entity_id: &str, previous: Option<&str>, new: &str, action: &str) -> NewAuditRecord {
    NewAuditRecord {
        entity_type: ENTITY_TYPE.to_string(),
        entity_id: entity_id.to_string(),
        previous_state: previous.map(str::to_string),
        new_state: new.to_string(),
        actor_role: "responsabile".to_string(),
        action: action.to_string(),
        note: None,
    }
}

/// Initialize an entity and commit.
async fn seed<S: WorkflowStorage>(s: &S, entity_id: &str, state: &str) -> Result<(), String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.initialize_entity(&mut snap, ENTITY_TYPE, entity_id, "owner-1", state)
        .await
        .map_err(|e| format!("init: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit init: {e}"))
}

/// Apply one state change plus its audit record in a single snapshot, and commit.
async fn transition<S: WorkflowStorage>(
    s: &S,
    entity_id: &str,
    expected_version: i64,
    from: Option<&str>,
    to: &str,
    action: &str,
) -> Result<AuditRecord, String> {
    let mut snap = s.begin_snapshot().await.map_err(|e| e.to_string())?;
    s.update_entity_state(&mut snap, ENTITY_TYPE, entity_id, expected_version, to, action)
        .await
        .map_err(|e| format!("update: {e}"))?;
    let rec = s
        .append_audit_record(&mut snap, make_audit(entity_id, from, to, action))
        .await
        .map_err(|e| format!("append: {e}"))?;
    s.commit_snapshot(snap)
        .await
        .map_err(|e| format!("commit: {e}"))?;
    Ok(rec)
}
