//! `archlift apply` — execute a migration plan.

use crate::{graph_db_base, CliError, CliResult};
use archlift_graph::{NodeTypeRegistry, SqliteGraphStore};
use archlift_migrate::{
    load_plan, parse_key_value, AiProviderRegistry, BlockEnv, ConsoleProgressListener,
    EngineOptions, MigrationEngine, MigrationStateStore, PlanLoadOptions, RecipeRegistry,
    StateFileListener, StdinPrompter,
};
use clap::Args;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use tracing::{info, warn};

#[derive(Args)]
pub struct ApplyArgs {
    /// Project root (the migration target).
    #[arg(long)]
    pub project: PathBuf,

    /// Plan file to execute. Required unless --status.
    #[arg(long)]
    pub plan: Option<PathBuf>,

    /// -D key=value overrides (highest precedence).
    #[arg(short = 'D', value_name = "KEY=VALUE")]
    pub defines: Vec<String>,

    /// --variable key=value overrides.
    #[arg(long = "variable", value_name = "KEY=VALUE")]
    pub variables: Vec<String>,

    /// Properties file with additional variables.
    #[arg(long = "variables", value_name = "FILE")]
    pub variables_file: Option<PathBuf>,

    /// Replay a single task, ignoring prior completion state.
    #[arg(long)]
    pub task: Option<String>,

    /// Replay a single phase, ignoring prior completion state.
    #[arg(long)]
    pub phase: Option<String>,

    /// Resume from the last checkpoint.
    #[arg(long, short = 'r')]
    pub resume: bool,

    /// Describe blocks without executing them.
    #[arg(long)]
    pub dry_run: bool,

    /// Step mode: confirm each block interactively.
    #[arg(long, short = 'i')]
    pub interactive: bool,

    /// Print the state file and exit.
    #[arg(long, short = 's')]
    pub status: bool,

    /// AI backend for AI_PROMPT blocks.
    #[arg(long)]
    pub ai_provider: Option<String>,

    /// Graph database base path override.
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Print the effective variables (with sources) and exit.
    #[arg(long)]
    pub list_variables: bool,
}

pub async fn run(args: ApplyArgs) -> CliResult {
    let state_store = MigrationStateStore::for_project(&args.project);

    if args.status {
        return print_status(&state_store);
    }

    let plan_path = args
        .plan
        .as_ref()
        .ok_or_else(|| CliError::Usage("--plan is required unless --status is given".into()))?;

    let defines = parse_pairs(&args.defines)?;
    let variables = parse_pairs(&args.variables)?;
    let load_options = PlanLoadOptions {
        cli_defines: defines.clone(),
        cli_variables: variables.clone(),
        variables_file: args.variables_file.clone(),
        project_root: args.project.clone(),
    };
    let loaded = load_plan(plan_path, &load_options)?;

    if args.list_variables {
        println!("Effective variables for plan '{}':", loaded.plan.name);
        for (key, value) in &loaded.variables {
            let source = loaded.sources.get(key).copied().unwrap_or("?");
            println!("  {:<32} = {:<40} ({})", key, value, source);
        }
        return Ok(());
    }

    let provider = match &args.ai_provider {
        Some(name) => {
            let registry = AiProviderRegistry::with_builtins();
            let provider = registry
                .resolve(name)
                .map_err(|e| CliError::Usage(e.to_string()))?
                .clone();
            if !provider.probe().await {
                warn!(
                    "AI provider '{}' did not answer --version; prompts may fail",
                    provider.name
                );
            }
            Some(provider)
        }
        None => None,
    };

    let db = SqliteGraphStore::open(graph_db_base(&args.project, args.database.as_ref()))?;
    let registry = NodeTypeRegistry::with_defaults();
    let graph = Arc::new(db.load(&registry, &Default::default())?);
    info!(
        "Graph loaded: {} nodes, {} edges",
        graph.node_count(),
        graph.edge_count()
    );

    let env = BlockEnv {
        project_root: args.project.clone(),
        graph: Some(graph),
        recipes: Arc::new(RecipeRegistry::with_builtins()),
        provider,
        prompter: Arc::new(Mutex::new(StdinPrompter)),
        dry_run: args.dry_run,
    };

    let mut cli_overrides = defines;
    cli_overrides.extend(variables);
    let options = EngineOptions {
        dry_run: args.dry_run,
        interactive: args.interactive,
        resume: args.resume,
        only_phase: args.phase.clone(),
        only_task: args.task.clone(),
        cli_overrides,
    };

    let mut engine = MigrationEngine::new(
        loaded.plan,
        &loaded.variables,
        env,
        MigrationStateStore::for_project(&args.project),
        options,
    )?;
    engine.add_listener(Box::new(ConsoleProgressListener));
    if !args.dry_run {
        engine.add_listener(Box::new(StateFileListener::new(state_store, engine.state())));
    }

    // Ctrl-C requests a cooperative cancel at the next block boundary.
    let cancel = engine.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested; stopping at the next block boundary");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let summary = engine.execute().await?;
    info!(
        "Plan finished: {} phases, {} tasks, {} blocks",
        summary.phases_completed, summary.tasks_completed, summary.blocks_executed
    );
    if !summary.success {
        return Err(CliError::Runtime(anyhow::anyhow!("plan failed")));
    }
    Ok(())
}

fn parse_pairs(raw: &[String]) -> Result<Vec<(String, String)>, CliError> {
    raw.iter()
        .map(|entry| parse_key_value(entry).map_err(|e| CliError::Usage(e.to_string())))
        .collect()
}

fn print_status(store: &MigrationStateStore) -> CliResult {
    if !store.exists() {
        println!("No migration state at {}", store.path().display());
        return Ok(());
    }
    let state = store.load()?;
    println!(
        "Current plan: {}",
        state.current_plan_key.as_deref().unwrap_or("-")
    );
    for (plan_key, record) in &state.migrations {
        println!("\n{} [{}]", plan_key, record.status);
        for (phase_id, phase) in &record.phases {
            println!("  phase {:<24} {}", phase_id, phase.status);
            for (task_id, task) in &phase.tasks {
                println!(
                    "    task {:<24} {} {}",
                    task_id,
                    task.status,
                    task.message.as_deref().unwrap_or("")
                );
            }
        }
    }
    Ok(())
}
