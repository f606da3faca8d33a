use std::process;

use approvals_core::{Catalog, Compensation, ExpenseReimbursement, Role, Status, Workflow};
use approvals_engine::EngineConfig;
use serde_json::json;

use crate::{build_catalog, parse_state, print_json, report_error, OutputFormat, WorkflowArg};

pub(crate) fn cmd_check(
    workflow: WorkflowArg,
    config: &EngineConfig,
    role: Role,
    state: &str,
    action: &str,
    note: Option<&str>,
    output: OutputFormat,
) {
    match workflow {
        WorkflowArg::Compensation => run_check(
            &build_catalog::<Compensation>(&config.compensation, output),
            role,
            parse_state::<Compensation>(state),
            action,
            note,
            output,
        ),
        WorkflowArg::Expense => run_check(
            &build_catalog::<ExpenseReimbursement>(&config.expense, output),
            role,
            parse_state::<ExpenseReimbursement>(state),
            action,
            note,
            output,
        ),
    }
}

fn run_check<W: Workflow>(
    catalog: &Catalog<W>,
    role: Role,
    state: W::Status,
    action: &str,
    note: Option<&str>,
    output: OutputFormat,
) {
    match catalog.authorize(role, state, action, note) {
        Ok(action) => {
            let target = match catalog.resolve(action) {
                Ok(target) => target,
                Err(e) => {
                    report_error(&e.to_string(), output);
                    process::exit(1);
                }
            };
            match output {
                OutputFormat::Json => print_json(&json!({
                    "ok": true,
                    "workflow": W::NAME,
                    "role": role,
                    "state": state,
                    "action": action,
                    "target": target,
                })),
                OutputFormat::Text => println!(
                    "allowed: {} {} -> {}",
                    action.as_str(),
                    state.as_str(),
                    target.as_str()
                ),
            }
        }
        Err(denial) => {
            match output {
                OutputFormat::Json => print_json(&json!({
                    "ok": false,
                    "workflow": W::NAME,
                    "reason": denial.reason(),
                    "denial": denial,
                })),
                OutputFormat::Text => eprintln!("denied: {denial}"),
            }
            process::exit(1);
        }
    }
}
