//! archlift — legacy-modernization workbench CLI.

mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "archlift",
    version,
    about = "Analyse Java codebases and drive framework migrations"
)]
struct Cli {
    /// Verbose (debug-level) logging.
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyse a project and print the graph inventory.
    Inventory(commands::inventory::InventoryArgs),
    /// Execute a migration plan against an analysed project.
    Apply(commands::apply::ApplyArgs),
    /// Export the graph as CSV.
    ExportCsv(commands::export::ExportArgs),
    /// Export the graph as JSON.
    ExportJson(commands::export::ExportArgs),
    /// Show a plan's phases, tasks, blocks and effective variables.
    PlanInfo(commands::plan_info::PlanInfoArgs),
    /// Show past migration runs from the state file.
    MigrationHistory(commands::history::HistoryArgs),
}

/// Bad invocations exit 2; runtime failures exit 1.
pub enum CliError {
    Usage(String),
    Runtime(anyhow::Error),
}

impl From<anyhow::Error> for CliError {
    fn from(e: anyhow::Error) -> Self {
        CliError::Runtime(e)
    }
}

impl From<archlift_graph::GraphError> for CliError {
    fn from(e: archlift_graph::GraphError) -> Self {
        CliError::Runtime(e.into())
    }
}

impl From<archlift_analysis::AnalysisError> for CliError {
    fn from(e: archlift_analysis::AnalysisError) -> Self {
        CliError::Runtime(e.into())
    }
}

impl From<archlift_migrate::MigrateError> for CliError {
    fn from(e: archlift_migrate::MigrateError) -> Self {
        CliError::Runtime(e.into())
    }
}

impl From<std::io::Error> for CliError {
    fn from(e: std::io::Error) -> Self {
        CliError::Runtime(e.into())
    }
}

impl From<serde_json::Error> for CliError {
    fn from(e: serde_json::Error) -> Self {
        CliError::Runtime(e.into())
    }
}

pub type CliResult = Result<(), CliError>;

/// Conventional location of the graph database, without the store-owned
/// on-disk suffix.
pub fn graph_db_base(project_root: &std::path::Path, database: Option<&PathBuf>) -> PathBuf {
    match database {
        Some(path) => path.clone(),
        None => project_root.join(".analysis").join("graph"),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let result = match cli.command {
        Command::Inventory(args) => commands::inventory::run(args),
        Command::Apply(args) => commands::apply::run(args).await,
        Command::ExportCsv(args) => commands::export::run_csv(args),
        Command::ExportJson(args) => commands::export::run_json(args),
        Command::PlanInfo(args) => commands::plan_info::run(args),
        Command::MigrationHistory(args) => commands::history::run(args),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(CliError::Usage(message)) => {
            eprintln!("error: {}", message);
            ExitCode::from(2)
        }
        Err(CliError::Runtime(e)) => {
            eprintln!("error: {:#}", e);
            ExitCode::from(1)
        }
    }
}
