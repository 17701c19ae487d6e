//! `archlift export-csv` / `export-json` — dump the graph.

use crate::{graph_db_base, CliResult};
use archlift_graph::{export, NodeTypeRegistry, SqliteGraphStore};
use clap::Args;
use std::path::PathBuf;

#[derive(Args)]
pub struct ExportArgs {
    /// Project root whose graph database is exported.
    #[arg(long)]
    pub project: PathBuf,

    /// Graph database base path override.
    #[arg(long)]
    pub database: Option<PathBuf>,

    /// Output file; stdout when omitted.
    #[arg(long, short = 'o')]
    pub output: Option<PathBuf>,
}

fn load_graph(args: &ExportArgs) -> Result<archlift_graph::GraphStore, archlift_graph::GraphError> {
    let db = SqliteGraphStore::open(graph_db_base(&args.project, args.database.as_ref()))?;
    let registry = NodeTypeRegistry::with_defaults();
    db.load(&registry, &Default::default())
}

pub fn run_csv(args: ExportArgs) -> CliResult {
    let graph = load_graph(&args)?;
    match &args.output {
        Some(path) => {
            let file = std::fs::File::create(path)?;
            export::write_csv_export(&graph, file)?;
            println!("Exported {} nodes to {}", graph.node_count(), path.display());
        }
        None => export::write_csv_export(&graph, std::io::stdout().lock())?,
    }
    Ok(())
}

pub fn run_json(args: ExportArgs) -> CliResult {
    let graph = load_graph(&args)?;
    let document = export::to_json_export(&graph)?;
    let rendered = serde_json::to_string_pretty(&document)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, rendered)?;
            println!("Exported {} nodes to {}", graph.node_count(), path.display());
        }
        None => println!("{}", rendered),
    }
    Ok(())
}
