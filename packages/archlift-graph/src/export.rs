//! Graph exports shared by the CLI `export-json` / `export-csv` commands.

use crate::error::Result;
use crate::graph::GraphStore;
use serde_json::json;
use std::io::Write;

/// Full-graph JSON document: nodes (with split properties/metrics and tag
/// lists) followed by edges.
pub fn to_json_export(graph: &GraphStore) -> Result<serde_json::Value> {
    let nodes: Vec<serde_json::Value> = graph
        .all_nodes()
        .iter()
        .map(|node| {
            json!({
                "id": node.id,
                "nodeType": node.node_type.as_str(),
                "displayLabel": node.display_label,
                "tags": node.tags.iter().collect::<Vec<_>>(),
                "properties": node.properties,
                "metrics": node.metrics,
            })
        })
        .collect();

    let edges: Vec<serde_json::Value> = graph
        .edges()
        .iter()
        .map(|edge| {
            json!({
                "source": edge.source_id,
                "target": edge.target_id,
                "edgeType": edge.edge_type.as_str(),
                "properties": edge.properties,
            })
        })
        .collect();

    Ok(json!({ "nodes": nodes, "edges": edges }))
}

/// CSV projection: one row per node, tags joined with `|`, properties and
/// metrics as embedded JSON columns.
pub fn write_csv_export<W: Write>(graph: &GraphStore, writer: W) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(["id", "node_type", "display_label", "tags", "properties", "metrics"])?;
    for node in graph.all_nodes() {
        let tags: Vec<&str> = node.tags.iter().map(String::as_str).collect();
        csv.write_record([
            node.id.as_str(),
            node.node_type.as_str(),
            node.display_label.as_str(),
            &tags.join("|"),
            &serde_json::to_string(&node.properties)?,
            &serde_json::to_string(&node.metrics)?,
        ])?;
    }
    csv.flush()?;
    Ok(())
}
