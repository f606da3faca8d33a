//! CLI integration tests.
//!
//! Uses `assert_cmd` to spawn the `approvals` binary and verify exit codes,
//! stdout content, and stderr content.

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

const NOTE_41: &str = "Allega il giustificativo della trasferta.";

fn approvals() -> Command {
    cargo_bin_cmd!("approvals")
}

fn stdout_json(args: &[&str]) -> serde_json::Value {
    let output = approvals().args(args).output().unwrap();
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

// ──────────────────────────────────────────────
// 1. Help and usage errors
// ──────────────────────────────────────────────

#[test]
fn help_exits_0_with_description() {
    approvals()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Approval workflow rules"));
}

#[test]
fn unknown_role_is_usage_error() {
    approvals()
        .args([
            "check", "--workflow", "compensation", "--role", "direttore", "--state", "BOZZA",
            "--action", "submit",
        ])
        .assert()
        .code(2);
}

#[test]
fn status_from_other_workflow_is_usage_error() {
    approvals()
        .args([
            "check", "--workflow", "expense", "--role", "collaboratore", "--state", "BOZZA",
            "--action", "resubmit",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("INTEGRAZIONI_RICHIESTE"));
}

// ──────────────────────────────────────────────
// 2. catalog
// ──────────────────────────────────────────────

#[test]
fn catalog_text_lists_edges() {
    approvals()
        .args(["catalog", "--workflow", "compensation"])
        .assert()
        .success()
        .stdout(predicate::str::contains("BOZZA -> INVIATO"))
        .stdout(predicate::str::contains("almeno 20 caratteri"));
}

#[test]
fn expense_catalog_json_has_seven_actions() {
    let v = stdout_json(&["--output", "json", "catalog", "--workflow", "expense"]);
    assert_eq!(v["workflow"], "expense");
    assert_eq!(v["initial_status"], "INVIATO");
    let transitions = v["transitions"].as_array().unwrap();
    assert_eq!(transitions.len(), 7);
    assert!(transitions.iter().all(|t| t["action"] != "submit"));
    let request = transitions
        .iter()
        .find(|t| t["action"] == "request_integration")
        .unwrap();
    assert_eq!(request["requires_note"], true);
    assert_eq!(request["target"], "INTEGRAZIONI_RICHIESTE");
}

// ──────────────────────────────────────────────
// 3. check
// ──────────────────────────────────────────────

#[test]
fn collaborator_submits_draft() {
    approvals()
        .args([
            "check", "--workflow", "compensation", "--role", "collaboratore", "--state", "BOZZA",
            "--action", "submit",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("allowed: submit BOZZA -> INVIATO"));
}

#[test]
fn reviewer_cannot_mark_paid() {
    approvals()
        .args([
            "check", "--workflow", "compensation", "--role", "responsabile", "--state",
            "APPROVATO_ADMIN", "--action", "mark_paid",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ruolo"));
}

#[test]
fn wrong_state_is_named_in_reason() {
    approvals()
        .args([
            "check", "--workflow", "compensation", "--role", "responsabile", "--state", "BOZZA",
            "--action", "approve_manager",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("BOZZA"));
}

#[test]
fn short_note_denied_long_note_allowed() {
    let base = [
        "check", "--workflow", "compensation", "--role", "responsabile", "--state", "INVIATO",
        "--action", "request_integration",
    ];
    approvals()
        .args(base)
        .args(["--note", "breve"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("20"));
    approvals()
        .args(base)
        .args(["--note", NOTE_41])
        .assert()
        .success();
}

#[test]
fn omitted_note_skips_note_rule() {
    approvals()
        .args([
            "check", "--workflow", "compensation", "--role", "responsabile", "--state", "INVIATO",
            "--action", "request_integration",
        ])
        .assert()
        .success();
}

#[test]
fn denial_as_json_carries_kind() {
    let output = approvals()
        .args([
            "--output", "json", "check", "--workflow", "expense", "--role", "responsabile",
            "--state", "APPROVATO_ADMIN", "--action", "mark_paid",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["ok"], false);
    assert_eq!(v["denial"]["kind"], "role_not_permitted");
    assert!(v["reason"].as_str().unwrap().contains("ruolo"));
}

#[test]
fn superadmin_acts_as_back_office() {
    let v = stdout_json(&[
        "--output", "json", "check", "--workflow", "expense", "--role", "super_admin", "--state",
        "APPROVATO_ADMIN", "--action", "mark_paid",
    ]);
    assert_eq!(v["ok"], true);
    assert_eq!(v["target"], "PAGATO");
}

// ──────────────────────────────────────────────
// 4. actions
// ──────────────────────────────────────────────

#[test]
fn actions_json_splits_available_and_blocked() {
    let v = stdout_json(&[
        "--output", "json", "actions", "--workflow", "compensation", "--role", "responsabile",
        "--state", "INVIATO",
    ]);
    let available: Vec<&str> = v["available"]
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["action"].as_str().unwrap())
        .collect();
    assert_eq!(
        available,
        vec!["approve_manager", "request_integration", "reject_manager"]
    );
    assert_eq!(v["blocked"].as_array().unwrap().len(), 6);
}

#[test]
fn actions_text_on_terminal_state() {
    approvals()
        .args([
            "actions", "--workflow", "expense", "--role", "amministrazione", "--state", "PAGATO",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("no actions available"));
}

// ──────────────────────────────────────────────
// 5. config
// ──────────────────────────────────────────────

#[test]
fn config_prints_defaults() {
    approvals()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("max_attempts = 3"))
        .stdout(predicate::str::contains("min_note_chars = 20"));
}

#[test]
fn config_file_changes_note_rule() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("approvals.toml");
    fs::write(&path, "[compensation]\nmin_note_chars = 5\n").unwrap();

    approvals()
        .arg("--config")
        .arg(&path)
        .args([
            "check", "--workflow", "compensation", "--role", "responsabile", "--state", "INVIATO",
            "--action", "reject_manager", "--note", "breve",
        ])
        .assert()
        .success();
}

#[test]
fn invalid_config_file_exits_1() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("approvals.toml");
    fs::write(&path, "max_attempts = 0\n").unwrap();

    approvals()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("max_attempts"));
}
