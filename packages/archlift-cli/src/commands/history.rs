//! `archlift migration-history` — list past runs from the state file.

use crate::CliResult;
use archlift_migrate::MigrationStateStore;
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct HistoryArgs {
    /// Project root whose state file is read.
    #[arg(long)]
    pub project: PathBuf,

    /// Show at most this many entries (newest first).
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

pub fn run(args: HistoryArgs) -> CliResult {
    let store = MigrationStateStore::for_project(&args.project);
    if !store.exists() {
        println!("No migration history at {}", store.path().display());
        return Ok(());
    }
    let state = store.load()?;

    if state.history.is_empty() {
        println!("Migration history is empty");
        return Ok(());
    }

    println!("Migration history (newest first):");
    for record in state.history.iter().take(args.limit) {
        let started = record
            .started_at
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let completed_phases = record
            .phases
            .values()
            .filter(|p| p.status == archlift_migrate::ExecStatus::Completed)
            .count();
        println!(
            "  {:<32} {:<10} started={} phases_completed={}",
            record.plan_key, record.status, started, completed_phases
        );
    }
    Ok(())
}
