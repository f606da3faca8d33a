use approvals_core::{
    Catalog, CatalogEntry, Compensation, ExpenseReimbursement, NoteRule, Status, Workflow,
};
use approvals_engine::EngineConfig;
use serde::Serialize;

use crate::{build_catalog, print_json, OutputFormat, WorkflowArg};

#[derive(Serialize)]
struct CatalogView<S: Ord> {
    workflow: &'static str,
    entity_type: &'static str,
    initial_status: S,
    statuses: Vec<S>,
    note_rule: NoteRule,
    transitions: Vec<CatalogEntry<S>>,
}

pub(crate) fn cmd_catalog(workflow: WorkflowArg, config: &EngineConfig, output: OutputFormat) {
    match workflow {
        WorkflowArg::Compensation => {
            print_catalog(&build_catalog::<Compensation>(&config.compensation, output), output)
        }
        WorkflowArg::Expense => {
            print_catalog(&build_catalog::<ExpenseReimbursement>(&config.expense, output), output)
        }
    }
}

fn print_catalog<W: Workflow>(catalog: &Catalog<W>, output: OutputFormat) {
    match output {
        OutputFormat::Json => print_json(&CatalogView {
            workflow: W::NAME,
            entity_type: W::ENTITY_TYPE,
            initial_status: W::initial_status(),
            statuses: <W::Status as Status>::ALL.to_vec(),
            note_rule: catalog.note_rule(),
            transitions: catalog.entries(),
        }),
        OutputFormat::Text => {
            println!(
                "{} workflow (initial status {})",
                W::NAME,
                W::initial_status().as_str()
            );
            println!("note rule: {}", catalog.note_rule().describe());
            println!();
            for entry in catalog.entries() {
                let from: Vec<&str> = entry.def.from_states.iter().map(|s| s.as_str()).collect();
                let roles: Vec<&str> = entry.def.allowed_roles.iter().map(|r| r.as_str()).collect();
                println!(
                    "  {:<20} {} -> {}  [{}]{}",
                    entry.action.as_str(),
                    from.join(", "),
                    entry.target.as_str(),
                    roles.join(", "),
                    if entry.def.requires_note {
                        "  note required"
                    } else {
                        ""
                    }
                );
            }
        }
    }
}
