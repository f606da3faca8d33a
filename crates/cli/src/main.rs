mod actions;
mod catalog;
mod check;

use std::path::{Path, PathBuf};
use std::process;

use approvals_core::{Catalog, Role, Status, Workflow};
use approvals_engine::{EngineConfig, WorkflowConfig};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

/// Which approval workflow a command applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum WorkflowArg {
    Compensation,
    Expense,
}

/// Approval workflow rules for compensation claims and expense reimbursements.
#[derive(Parser)]
#[command(
    name = "approvals",
    version,
    about = "Approval workflow rules for compensation claims and expense reimbursements"
)]
struct Cli {
    /// Output format (text or json)
    #[arg(long, global = true, default_value = "text", value_enum)]
    output: OutputFormat,

    /// Engine configuration file (TOML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print a workflow's transition table
    Catalog {
        #[arg(long, value_enum)]
        workflow: WorkflowArg,
    },

    /// Decide whether a role may perform an action from a state
    Check {
        #[arg(long, value_enum)]
        workflow: WorkflowArg,
        /// collaboratore, responsabile, amministrazione or super_admin
        #[arg(long)]
        role: Role,
        /// Current status, e.g. INVIATO
        #[arg(long)]
        state: String,
        /// Action name, e.g. approve_manager
        #[arg(long)]
        action: String,
        /// Justification note; when omitted the note rule is not checked
        #[arg(long)]
        note: Option<String>,
    },

    /// List the actions a role can attempt from a state, and why the rest are blocked
    Actions {
        #[arg(long, value_enum)]
        workflow: WorkflowArg,
        #[arg(long)]
        role: Role,
        #[arg(long)]
        state: String,
    },

    /// Print the effective configuration
    Config,
}

fn main() {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref(), cli.output);

    match cli.command {
        Commands::Catalog { workflow } => {
            catalog::cmd_catalog(workflow, &config, cli.output);
        }
        Commands::Check {
            workflow,
            role,
            state,
            action,
            note,
        } => {
            check::cmd_check(
                workflow,
                &config,
                role,
                &state,
                &action,
                note.as_deref(),
                cli.output,
            );
        }
        Commands::Actions {
            workflow,
            role,
            state,
        } => {
            actions::cmd_actions(workflow, &config, role, &state, cli.output);
        }
        Commands::Config => cmd_config(&config, cli.output),
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>, output: OutputFormat) -> EngineConfig {
    let Some(path) = path else {
        return EngineConfig::default();
    };
    match EngineConfig::load(path) {
        Ok(config) => {
            tracing::debug!(path = %path.display(), "configuration loaded");
            config
        }
        Err(e) => {
            report_error(&e.to_string(), output);
            process::exit(1);
        }
    }
}

fn cmd_config(config: &EngineConfig, output: OutputFormat) {
    match output {
        OutputFormat::Json => print_json(config),
        OutputFormat::Text => match toml::to_string_pretty(config) {
            Ok(text) => print!("{text}"),
            Err(e) => {
                report_error(&format!("cannot render configuration: {e}"), output);
                process::exit(1);
            }
        },
    }
}

// ── Shared helpers ──────────────────────────────────────────────────

/// Build a workflow catalog with the configured note rule.
pub(crate) fn build_catalog<W: Workflow>(
    config: &WorkflowConfig,
    output: OutputFormat,
) -> Catalog<W> {
    match Catalog::<W>::with_note_rule(config.note_rule()) {
        Ok(catalog) => catalog,
        Err(e) => {
            report_error(&format!("invalid {} catalog: {e}", W::NAME), output);
            process::exit(1);
        }
    }
}

/// Parse a status name for workflow `W`; an unknown name is a usage error.
pub(crate) fn parse_state<W: Workflow>(name: &str) -> W::Status {
    match name.parse::<W::Status>() {
        Ok(status) => status,
        Err(e) => {
            let expected: Vec<&str> = <W::Status as Status>::ALL
                .iter()
                .map(|s| s.as_str())
                .collect();
            Cli::command()
                .error(
                    ErrorKind::InvalidValue,
                    format!("{e} (expected one of: {})", expected.join(", ")),
                )
                .exit()
        }
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => {
            eprintln!("error: cannot serialize output: {e}");
            process::exit(1);
        }
    }
}

pub(crate) fn report_error(msg: &str, output: OutputFormat) {
    match output {
        OutputFormat::Text => eprintln!("{msg}"),
        OutputFormat::Json => eprintln!("{}", serde_json::json!({ "error": msg })),
    }
}
