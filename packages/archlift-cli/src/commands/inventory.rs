//! `archlift inventory` — run analysis and summarise the graph.

use crate::{graph_db_base, CliResult};
use archlift_analysis::{AnalysisEngine, AnalysisOptions};
use archlift_graph::{NodeType, PackageNode, SqliteGraphStore};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct InventoryArgs {
    /// Project root to analyse.
    #[arg(long)]
    pub project: PathBuf,

    /// Graph database base path override.
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Discard any previous analysis and re-scan from scratch.
    #[arg(long)]
    pub rescan: bool,

    /// Re-run collectors even when class nodes already exist.
    #[arg(long)]
    pub no_skip_existing: bool,
}

pub fn run(args: InventoryArgs) -> CliResult {
    let db = SqliteGraphStore::open(graph_db_base(&args.project, args.database.as_ref()))?;
    let options = AnalysisOptions {
        skip_existing_nodes: !args.no_skip_existing,
        ..Default::default()
    };
    let engine = AnalysisEngine::open(&args.project, db, options)?;
    if args.rescan {
        engine.reset()?;
    }
    let report = engine.run()?;

    println!("Analysis phases:");
    for phase in &report.phases {
        println!(
            "  {:<24} processed={:<6} skipped={:<6} errors={:<4} {}ms",
            phase.name, phase.processed, phase.skipped, phase.errors, phase.duration_ms
        );
    }

    let graph = engine.graph();
    println!("\nGraph inventory ({} nodes, {} edges):", graph.node_count(), graph.edge_count());
    for node_type in NodeType::ALL {
        let count = graph.ids_by_type(node_type).len();
        if count > 0 {
            println!("  {:<16} {}", node_type.as_str(), count);
        }
    }

    let packages = graph.find_by_node_type(NodeType::Package);
    if !packages.is_empty() {
        println!("\nPackages:");
        for package in packages {
            let classes = PackageNode(package.clone()).class_ids().len();
            println!("  {:<48} {} classes", package.id, classes);
        }
    }

    Ok(())
}
