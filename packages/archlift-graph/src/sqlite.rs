//! Embedded SQLite persistence for the graph.
//!
//! A single database file holds three primary tables (`nodes`, `edges`,
//! `node_tags`) plus the auxiliary `inspector_runs` tracking table.
//! Properties and metrics are stored as separate JSON columns; tag rows are
//! loaded separately from the main node row at deserialize time.

use crate::error::Result;
use crate::graph::GraphStore;
use crate::node::{keys, GraphNode, NodeType, NodeTypeRegistry};
use crate::value::Value;
use crate::edge::{Edge, EdgeType};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Options for selective reload.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Restrict to these node types; `None` loads everything.
    pub node_types: Option<Vec<NodeType>>,
    /// Skip loading edges (phase-wise reloads that only need nodes).
    pub skip_edges: bool,
}

pub struct SqliteGraphStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl SqliteGraphStore {
    /// Open (or create) the store. Callers pass the base path without the
    /// on-disk suffix; the store owns the `.db` extension.
    pub fn open(base: impl AsRef<Path>) -> Result<Self> {
        let path = base.as_ref().with_extension("db");
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(&path)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: Some(path),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// In-memory store for tests.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "CREATE TABLE IF NOT EXISTS nodes (
                id TEXT PRIMARY KEY,
                node_type TEXT NOT NULL,
                display_label TEXT NOT NULL,
                properties TEXT NOT NULL,
                metrics TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS edges (
                source TEXT NOT NULL,
                target TEXT NOT NULL,
                edge_type TEXT NOT NULL,
                properties TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS node_tags (
                node_id TEXT NOT NULL,
                tag TEXT NOT NULL,
                PRIMARY KEY (node_id, tag)
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS inspector_runs (
                node_id TEXT NOT NULL,
                inspector_id TEXT NOT NULL,
                last_run INTEGER NOT NULL,
                PRIMARY KEY (node_id, inspector_id)
            )",
            [],
        )?;

        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(node_type)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_node_tags_tag ON node_tags(tag)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_node_tags_tag_node ON node_tags(tag, node_id)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_source ON edges(source)",
            [],
        )?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_edges_target ON edges(target)",
            [],
        )?;

        Ok(())
    }

    /// Persist the full graph in one transaction (phase boundary flush).
    pub fn save(&self, graph: &GraphStore) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        for node in graph.all_nodes() {
            let (properties_json, metrics_json) = split_node_json(&node)?;
            tx.execute(
                "INSERT OR REPLACE INTO nodes
                 (id, node_type, display_label, properties, metrics, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    &node.id,
                    node.node_type.as_str(),
                    &node.display_label,
                    properties_json,
                    metrics_json,
                    node.created_at.timestamp(),
                    node.updated_at.timestamp(),
                ],
            )?;

            tx.execute("DELETE FROM node_tags WHERE node_id = ?1", params![&node.id])?;
            for tag in &node.tags {
                tx.execute(
                    "INSERT OR IGNORE INTO node_tags (node_id, tag) VALUES (?1, ?2)",
                    params![&node.id, tag],
                )?;
            }
        }

        tx.execute("DELETE FROM edges", [])?;
        for edge in graph.edges() {
            let properties_json = serde_json::to_string(&edge.properties)?;
            tx.execute(
                "INSERT INTO edges (source, target, edge_type, properties)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    &edge.source_id,
                    &edge.target_id,
                    edge.edge_type.as_str(),
                    properties_json
                ],
            )?;
        }

        tx.commit()?;
        debug!(
            "Graph flushed: {} nodes, {} edges",
            graph.node_count(),
            graph.edge_count()
        );
        Ok(())
    }

    /// Load a graph. A corrupt row is logged and dropped; the load
    /// continues. Tags are applied in a second pass, separate from the main
    /// node row.
    pub fn load(&self, registry: &NodeTypeRegistry, options: &LoadOptions) -> Result<GraphStore> {
        let conn = self.conn.lock().unwrap();
        let graph = GraphStore::new();

        let type_filter: Option<Vec<String>> = options
            .node_types
            .as_ref()
            .map(|types| types.iter().map(|t| t.as_str().to_string()).collect());

        let mut stmt = conn.prepare(
            "SELECT id, node_type, display_label, properties, metrics, created_at, updated_at
             FROM nodes",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, i64>(5)?,
                row.get::<_, i64>(6)?,
            ))
        })?;

        for row in rows {
            let (id, node_type, label, properties_json, metrics_json, created, updated) = row?;
            if let Some(filter) = &type_filter {
                if !filter.contains(&node_type) {
                    continue;
                }
            }
            let properties: BTreeMap<String, Value> = match serde_json::from_str(&properties_json) {
                Ok(p) => p,
                Err(e) => {
                    warn!("Dropping node '{}': corrupt properties JSON ({})", id, e);
                    continue;
                }
            };
            let metrics: BTreeMap<String, f64> = match serde_json::from_str(&metrics_json) {
                Ok(m) => m,
                Err(e) => {
                    warn!("Dropping node '{}': corrupt metrics JSON ({})", id, e);
                    continue;
                }
            };

            let mut node = registry.create(&node_type, id);
            node.display_label = label;
            node.properties = properties;
            node.metrics = metrics;
            node.created_at = timestamp(created);
            node.updated_at = timestamp(updated);
            if let Err(e) = graph.add_node(node) {
                warn!("Dropping duplicate persisted node: {}", e);
            }
        }

        // Tags: loaded separately from the node rows.
        let mut stmt = conn.prepare("SELECT node_id, tag FROM node_tags")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (node_id, tag) = row?;
            if graph.contains(&node_id) {
                graph.enable_tag(&node_id, &tag)?;
            }
        }

        if !options.skip_edges {
            let mut stmt = conn.prepare("SELECT source, target, edge_type, properties FROM edges")?;
            let rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                ))
            })?;
            for row in rows {
                let (source, target, edge_type, properties_json) = row?;
                let edge_type = match EdgeType::parse(&edge_type) {
                    Ok(t) => t,
                    Err(_) => {
                        warn!("Dropping edge {} -> {}: unknown type '{}'", source, target, edge_type);
                        continue;
                    }
                };
                let properties: BTreeMap<String, Value> =
                    match serde_json::from_str(&properties_json) {
                        Ok(p) => p,
                        Err(e) => {
                            warn!(
                                "Dropping edge {} -> {}: corrupt properties JSON ({})",
                                source, target, e
                            );
                            continue;
                        }
                    };
                let mut edge = Edge::new(source, target, edge_type);
                edge.properties = properties;
                graph.add_edge(edge);
            }
        }

        Ok(graph)
    }

    // ─── Inspector tracking ───────────────────────────────────────────────

    pub fn save_inspector_runs(&self, runs: &[(String, String, DateTime<Utc>)]) -> Result<()> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;
        for (node_id, inspector_id, last_run) in runs {
            tx.execute(
                "INSERT OR REPLACE INTO inspector_runs (node_id, inspector_id, last_run)
                 VALUES (?1, ?2, ?3)",
                params![node_id, inspector_id, last_run.timestamp()],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn load_inspector_runs(&self) -> Result<Vec<(String, String, DateTime<Utc>)>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt =
            conn.prepare("SELECT node_id, inspector_id, last_run FROM inspector_runs")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)?,
            ))
        })?;
        let mut runs = Vec::new();
        for row in rows {
            let (node_id, inspector_id, ts) = row?;
            runs.push((node_id, inspector_id, timestamp(ts)));
        }
        Ok(runs)
    }

    pub fn clear_inspector_runs(&self) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute("DELETE FROM inspector_runs", [])?;
        Ok(())
    }
}

fn timestamp(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap_or_default()
}

/// Split a node into (properties JSON, metrics JSON). Any stray property
/// key carrying the reserved `metrics.` prefix moves into the metrics JSON
/// with the prefix stripped; persisted properties never contain it.
fn split_node_json(node: &GraphNode) -> Result<(String, String)> {
    let mut properties = BTreeMap::new();
    let mut metrics = node.metrics.clone();
    for (key, value) in &node.properties {
        match key.strip_prefix(keys::METRICS_PREFIX) {
            Some(metric) => {
                if let Some(f) = value.as_f64() {
                    metrics.insert(metric.to_string(), f);
                }
            }
            None => {
                properties.insert(key.clone(), value.clone());
            }
        }
    }
    Ok((
        serde_json::to_string(&properties)?,
        serde_json::to_string(&metrics)?,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::{ClassType, JavaClassNode, SourceType};

    fn sample_graph() -> GraphStore {
        let graph = GraphStore::new();
        let mut class =
            JavaClassNode::new("a.b.C", ClassType::Class, SourceType::Source).into_node();
        class.set_metric("coupling.ca", 2.0);
        class.enable_tag("ejb.session.stateless");
        graph.add_node(class).unwrap();

        let iface =
            JavaClassNode::new("a.b.I", ClassType::Interface, SourceType::Binary).into_node();
        graph.add_node(iface).unwrap();
        graph.add_edge(Edge::new("a.b.C", "a.b.I", EdgeType::Implements));
        graph
    }

    #[test]
    fn test_save_load_roundtrip() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let graph = sample_graph();
        store.save(&graph).unwrap();

        let registry = NodeTypeRegistry::with_defaults();
        let loaded = store.load(&registry, &LoadOptions::default()).unwrap();

        assert_eq!(loaded.node_count(), 2);
        assert_eq!(loaded.edge_count(), 1);

        let class = loaded.get_node("a.b.C").unwrap();
        assert_eq!(class.node_type, NodeType::JavaClass);
        assert_eq!(class.metric("coupling.ca"), Some(2.0));
        assert!(class.has_tag("ejb.session.stateless"));
        assert_eq!(class.property_str(keys::CLASS_TYPE), Some("class"));
    }

    #[test]
    fn test_metrics_prefix_never_persisted_in_properties() {
        let mut node = GraphNode::new("n", NodeType::Generic);
        // Bypass set_property routing to simulate a stray prefixed key.
        node.properties
            .insert("metrics.stray".to_string(), Value::F64(1.5));
        node.set_metric("direct", 2.0);

        let (props, metrics) = split_node_json(&node).unwrap();
        assert!(!props.contains("metrics."));
        let metrics: BTreeMap<String, f64> = serde_json::from_str(&metrics).unwrap();
        assert_eq!(metrics.get("stray"), Some(&1.5));
        assert_eq!(metrics.get("direct"), Some(&2.0));
    }

    #[test]
    fn test_corrupt_row_is_dropped_not_fatal() {
        let store = SqliteGraphStore::in_memory().unwrap();
        store.save(&sample_graph()).unwrap();
        {
            let conn = store.conn.lock().unwrap();
            conn.execute(
                "UPDATE nodes SET properties = 'not json' WHERE id = 'a.b.C'",
                [],
            )
            .unwrap();
        }
        let registry = NodeTypeRegistry::with_defaults();
        let loaded = store.load(&registry, &LoadOptions::default()).unwrap();
        assert_eq!(loaded.node_count(), 1);
        assert!(loaded.get_node("a.b.I").is_some());
    }

    #[test]
    fn test_selective_load_by_type() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let graph = sample_graph();
        graph.get_or_create_node("a.b", NodeType::Package);
        store.save(&graph).unwrap();

        let registry = NodeTypeRegistry::with_defaults();
        let options = LoadOptions {
            node_types: Some(vec![NodeType::Package]),
            skip_edges: true,
        };
        let loaded = store.load(&registry, &options).unwrap();
        assert_eq!(loaded.node_count(), 1);
        assert!(loaded.get_node("a.b").is_some());
    }

    #[test]
    fn test_store_owns_db_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteGraphStore::open(dir.path().join("graph")).unwrap();
        assert_eq!(
            store.path().unwrap().file_name().unwrap().to_str().unwrap(),
            "graph.db"
        );
    }

    #[test]
    fn test_inspector_runs_roundtrip() {
        let store = SqliteGraphStore::in_memory().unwrap();
        let now = Utc::now();
        store
            .save_inspector_runs(&[("a.b.C".into(), "coupling".into(), now)])
            .unwrap();
        let runs = store.load_inspector_runs().unwrap();
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].0, "a.b.C");
        assert_eq!(runs[0].1, "coupling");

        store.clear_inspector_runs().unwrap();
        assert!(store.load_inspector_runs().unwrap().is_empty());
    }
}
