use approvals_core::{Catalog, Compensation, ExpenseReimbursement, Role, Status, Workflow};
use approvals_engine::{compute_action_space, EngineConfig};

use crate::{build_catalog, parse_state, print_json, OutputFormat, WorkflowArg};

pub(crate) fn cmd_actions(
    workflow: WorkflowArg,
    config: &EngineConfig,
    role: Role,
    state: &str,
    output: OutputFormat,
) {
    match workflow {
        WorkflowArg::Compensation => print_actions(
            &build_catalog::<Compensation>(&config.compensation, output),
            role,
            parse_state::<Compensation>(state),
            output,
        ),
        WorkflowArg::Expense => print_actions(
            &build_catalog::<ExpenseReimbursement>(&config.expense, output),
            role,
            parse_state::<ExpenseReimbursement>(state),
            output,
        ),
    }
}

fn print_actions<W: Workflow>(
    catalog: &Catalog<W>,
    role: Role,
    state: W::Status,
    output: OutputFormat,
) {
    let space = compute_action_space(catalog, role, state);
    match output {
        OutputFormat::Json => print_json(&space),
        OutputFormat::Text => {
            println!("{} as {} on {}:", W::NAME, role, state.as_str());
            if space.available.is_empty() {
                println!("  no actions available");
            }
            for a in &space.available {
                match &a.note_requirement {
                    Some(req) => println!(
                        "  + {} -> {} ({req})",
                        a.action.as_str(),
                        a.target.as_str()
                    ),
                    None => println!("  + {} -> {}", a.action.as_str(), a.target.as_str()),
                }
            }
            for b in &space.blocked {
                println!("  - {}: {}", b.action.as_str(), b.reason);
            }
        }
    }
}
