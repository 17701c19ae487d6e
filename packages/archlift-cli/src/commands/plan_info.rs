//! `archlift plan-info` — show a plan's structure and effective variables.

use crate::CliResult;
use archlift_migrate::{load_plan, PlanLoadOptions};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct PlanInfoArgs {
    /// Plan file to inspect.
    #[arg(long)]
    pub plan: PathBuf,

    /// Project root used for derived variables.
    #[arg(long, default_value = ".")]
    pub project: PathBuf,
}

pub fn run(args: PlanInfoArgs) -> CliResult {
    let options = PlanLoadOptions {
        project_root: args.project.clone(),
        ..Default::default()
    };
    let loaded = load_plan(&args.plan, &options)?;
    let plan = &loaded.plan;

    println!("Plan:    {} v{}", plan.name, plan.version);
    if let Some(description) = &plan.description {
        println!("About:   {}", description);
    }
    for (key, value) in &plan.metadata {
        println!("Meta:    {} = {}", key, value);
    }

    for phase in &plan.phases {
        println!("\nPhase '{}' — {}", phase.id, phase.name);
        for task in &phase.tasks {
            let deps = if task.depends_on.is_empty() {
                String::new()
            } else {
                format!("  (after {})", task.depends_on.join(", "))
            };
            println!("  Task '{}' — {}{}", task.id, task.name, deps);
            for block in &task.blocks {
                let guard = block
                    .enable_if
                    .as_deref()
                    .map(|p| format!("  [if {}]", p))
                    .unwrap_or_default();
                println!("    [{}] {}{}", block.spec.kind(), block.name, guard);
            }
        }
    }

    println!("\nEffective variables:");
    for (key, value) in &loaded.variables {
        let source = loaded.sources.get(key).copied().unwrap_or("?");
        println!("  {:<32} = {:<40} ({})", key, value, source);
    }
    Ok(())
}
