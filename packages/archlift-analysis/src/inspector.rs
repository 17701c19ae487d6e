//! Inspector contract, per-(node, inspector) run tracking and the
//! capabilities handed to a running inspector.

use crate::error::Result;
use crate::profile::ProfileRecorder;
use crate::resource::ResourceResolver;
use archlift_graph::{Edge, GraphNode, GraphStore, NodeType, Value};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::warn;

/// A pluggable analyzer over one graph node. `run` returns `true` iff the
/// node was actually mutated; those returns drive phase convergence.
pub trait Inspector: Send + Sync {
    fn id(&self) -> &'static str;

    /// Governs per-item skipping. The default never re-runs after a
    /// successful run; inspectors that must react to upstream changes
    /// override this.
    fn can_run(&self, _node: &GraphNode, last_run: Option<DateTime<Utc>>) -> bool {
        last_run.is_none()
    }

    fn run(&self, node: &GraphNode, ctx: &InspectionContext<'_>) -> Result<bool>;
}

/// `(node_id, inspector_id) -> last successful run`. Rows survive restarts
/// through the graph database's `inspector_runs` table.
#[derive(Default)]
pub struct InspectorTracker {
    runs: DashMap<(String, String), DateTime<Utc>>,
}

impl InspectorTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_run(&self, node_id: &str, inspector_id: &str) -> Option<DateTime<Utc>> {
        self.runs
            .get(&(node_id.to_string(), inspector_id.to_string()))
            .map(|t| *t)
    }

    pub fn record(&self, node_id: &str, inspector_id: &str, at: DateTime<Utc>) {
        self.runs
            .insert((node_id.to_string(), inspector_id.to_string()), at);
    }

    /// Full invalidation; only an explicit project re-scan calls this.
    pub fn clear(&self) {
        self.runs.clear();
    }

    pub fn len(&self) -> usize {
        self.runs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    pub fn export_rows(&self) -> Vec<(String, String, DateTime<Utc>)> {
        self.runs
            .iter()
            .map(|entry| {
                let (node_id, inspector_id) = entry.key().clone();
                (node_id, inspector_id, *entry.value())
            })
            .collect()
    }

    pub fn import_rows(&self, rows: Vec<(String, String, DateTime<Utc>)>) {
        for (node_id, inspector_id, at) in rows {
            self.runs.insert((node_id, inspector_id), at);
        }
    }
}

/// Capabilities exposed to a running inspector: mutate the current node,
/// create nodes and edges, query the graph read-only, read project
/// resources, and aggregate class metrics onto the enclosing file.
pub struct InspectionContext<'a> {
    graph: &'a GraphStore,
    resolver: &'a dyn ResourceResolver,
    node_id: String,
}

impl<'a> InspectionContext<'a> {
    pub fn new(graph: &'a GraphStore, resolver: &'a dyn ResourceResolver, node_id: String) -> Self {
        Self {
            graph,
            resolver,
            node_id,
        }
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    // ─── Mutations on the current node ────────────────────────────────────

    pub fn set_property(&self, key: &str, value: impl Into<Value>) -> Result<()> {
        let value = value.into();
        self.graph
            .with_node_mut(&self.node_id, |node| node.set_property(key, value))?;
        Ok(())
    }

    pub fn set_metric(&self, key: &str, value: f64) -> Result<()> {
        self.graph
            .with_node_mut(&self.node_id, |node| node.set_metric(key, value))?;
        Ok(())
    }

    pub fn enable_tag(&self, tag: &str) -> Result<()> {
        self.graph.enable_tag(&self.node_id, tag)?;
        Ok(())
    }

    // ─── Graph access ─────────────────────────────────────────────────────

    pub fn get_or_create_node(&self, id: &str, node_type: NodeType) -> GraphNode {
        self.graph.get_or_create_node(id, node_type)
    }

    pub fn add_edge(&self, edge: Edge) {
        self.graph.add_edge(edge);
    }

    pub fn get_node(&self, id: &str) -> Option<GraphNode> {
        self.graph.get_node(id)
    }

    pub fn find_by_node_type(&self, node_type: NodeType) -> Vec<GraphNode> {
        self.graph.find_by_node_type(node_type)
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<GraphNode> {
        self.graph.find_by_tag(tag)
    }

    pub fn edges_from(&self, id: &str) -> Vec<Edge> {
        self.graph.edges_from(id)
    }

    pub fn edges_to(&self, id: &str) -> Vec<Edge> {
        self.graph.edges_to(id)
    }

    pub fn resolve_resource(&self, path: &str) -> Result<Vec<u8>> {
        self.resolver.resolve(path)
    }

    // ─── File-level aggregation helpers ───────────────────────────────────

    pub fn aggregate_max(&self, file_id: &str, metric: &str, value: f64) -> Result<()> {
        self.aggregate(file_id, metric, value, Headline::Max)
    }

    pub fn aggregate_avg(&self, file_id: &str, metric: &str, value: f64) -> Result<()> {
        self.aggregate(file_id, metric, value, Headline::Avg)
    }

    pub fn aggregate_sum(&self, file_id: &str, metric: &str, value: f64) -> Result<()> {
        self.aggregate(file_id, metric, value, Headline::Sum)
    }

    /// Maintains the `<metric>.{classes_analyzed,sum,min,max,avg}` family
    /// atomically under the file node's lock; the headline statistic is
    /// written to `<metric>` itself.
    fn aggregate(&self, file_id: &str, metric: &str, value: f64, headline: Headline) -> Result<()> {
        self.graph.with_node_mut(file_id, |node| {
            let count_key = format!("{}.classes_analyzed", metric);
            let sum_key = format!("{}.sum", metric);
            let min_key = format!("{}.min", metric);
            let max_key = format!("{}.max", metric);
            let avg_key = format!("{}.avg", metric);

            let count = node.metric(&count_key).unwrap_or(0.0) + 1.0;
            let sum = node.metric(&sum_key).unwrap_or(0.0) + value;
            let min = node.metric(&min_key).map_or(value, |m| m.min(value));
            let max = node.metric(&max_key).map_or(value, |m| m.max(value));
            let avg = sum / count;

            node.set_metric(count_key, count);
            node.set_metric(sum_key, sum);
            node.set_metric(min_key, min);
            node.set_metric(max_key, max);
            node.set_metric(avg_key, avg);
            node.set_metric(
                metric,
                match headline {
                    Headline::Max => max,
                    Headline::Avg => avg,
                    Headline::Sum => sum,
                },
            );
        })?;
        Ok(())
    }
}

#[derive(Clone, Copy)]
enum Headline {
    Max,
    Avg,
    Sum,
}

/// Run every eligible inspector against one node. Returns `true` iff at
/// least one inspector mutated the node. An inspector error invalidates
/// that inspector for this item only.
pub fn run_inspectors(
    graph: &GraphStore,
    resolver: &dyn ResourceResolver,
    tracker: &InspectorTracker,
    inspectors: &[Box<dyn Inspector>],
    node_id: &str,
    pass_start: DateTime<Utc>,
    recorder: &ProfileRecorder,
) -> bool {
    let mut touched = false;
    for inspector in inspectors {
        let Some(snapshot) = graph.get_node(node_id) else {
            return touched;
        };
        let last_run = tracker.last_run(node_id, inspector.id());
        if !inspector.can_run(&snapshot, last_run) {
            continue;
        }
        recorder.record_invocation(inspector.id());
        let ctx = InspectionContext::new(graph, resolver, node_id.to_string());
        match inspector.run(&snapshot, &ctx) {
            Ok(mutated) => {
                tracker.record(node_id, inspector.id(), pass_start);
                if mutated {
                    recorder.record_mutation(inspector.id());
                    touched = true;
                }
            }
            Err(e) => {
                recorder.record_error(inspector.id());
                warn!(
                    "Inspector '{}' failed on '{}': {}",
                    inspector.id(),
                    node_id,
                    e
                );
            }
        }
    }
    touched
}

/// Collect the set of node ids touched by one analyzer invocation.
pub fn touched_set(node_id: &str, touched: bool) -> HashSet<String> {
    let mut set = HashSet::new();
    if touched {
        set.insert(node_id.to_string());
    }
    set
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::FsResourceResolver;
    use archlift_graph::NodeType;

    struct TagOnce {
        tag: &'static str,
    }

    impl Inspector for TagOnce {
        fn id(&self) -> &'static str {
            "tag-once"
        }

        fn run(&self, node: &GraphNode, ctx: &InspectionContext<'_>) -> Result<bool> {
            if node.has_tag(self.tag) {
                return Ok(false);
            }
            ctx.enable_tag(self.tag)?;
            Ok(true)
        }
    }

    struct AlwaysFails;

    impl Inspector for AlwaysFails {
        fn id(&self) -> &'static str {
            "always-fails"
        }

        fn run(&self, _node: &GraphNode, _ctx: &InspectionContext<'_>) -> Result<bool> {
            Err(crate::error::AnalysisError::Parse("boom".into()))
        }
    }

    fn fixture() -> (GraphStore, FsResourceResolver, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsResourceResolver::new(dir.path());
        let graph = GraphStore::new();
        graph.get_or_create_node("n1", NodeType::JavaClass);
        (graph, resolver, dir)
    }

    #[test]
    fn test_successful_run_is_tracked_and_skipped() {
        let (graph, resolver, _dir) = fixture();
        let tracker = InspectorTracker::new();
        let recorder = ProfileRecorder::new();
        let inspectors: Vec<Box<dyn Inspector>> = vec![Box::new(TagOnce { tag: "t" })];

        let now = Utc::now();
        let touched =
            run_inspectors(&graph, &resolver, &tracker, &inspectors, "n1", now, &recorder);
        assert!(touched);
        assert!(tracker.last_run("n1", "tag-once").is_some());

        // Second pass: can_run default declines, no invocation happens.
        let touched =
            run_inspectors(&graph, &resolver, &tracker, &inspectors, "n1", now, &recorder);
        assert!(!touched);
        let stats = recorder.into_stats();
        assert_eq!(stats["tag-once"].invocations, 1);
    }

    #[test]
    fn test_error_does_not_track_and_does_not_touch() {
        let (graph, resolver, _dir) = fixture();
        let tracker = InspectorTracker::new();
        let recorder = ProfileRecorder::new();
        let inspectors: Vec<Box<dyn Inspector>> = vec![Box::new(AlwaysFails)];

        let touched = run_inspectors(
            &graph,
            &resolver,
            &tracker,
            &inspectors,
            "n1",
            Utc::now(),
            &recorder,
        );
        assert!(!touched);
        assert!(tracker.last_run("n1", "always-fails").is_none());
        assert_eq!(recorder.into_stats()["always-fails"].errors, 1);
    }

    #[test]
    fn test_aggregation_family() {
        let (graph, resolver, _dir) = fixture();
        graph.get_or_create_node("file1", NodeType::ProjectFile);
        let ctx = InspectionContext::new(&graph, &resolver, "n1".to_string());

        ctx.aggregate_max("file1", "complexity", 4.0).unwrap();
        ctx.aggregate_max("file1", "complexity", 10.0).unwrap();
        ctx.aggregate_max("file1", "complexity", 7.0).unwrap();

        let file = graph.get_node("file1").unwrap();
        assert_eq!(file.metric("complexity.classes_analyzed"), Some(3.0));
        assert_eq!(file.metric("complexity.sum"), Some(21.0));
        assert_eq!(file.metric("complexity.min"), Some(4.0));
        assert_eq!(file.metric("complexity.max"), Some(10.0));
        assert_eq!(file.metric("complexity.avg"), Some(7.0));
        assert_eq!(file.metric("complexity"), Some(10.0));
    }

    #[test]
    fn test_tracker_roundtrip_rows() {
        let tracker = InspectorTracker::new();
        tracker.record("n1", "a", Utc::now());
        tracker.record("n2", "b", Utc::now());

        let rows = tracker.export_rows();
        assert_eq!(rows.len(), 2);

        let other = InspectorTracker::new();
        other.import_rows(rows);
        assert!(other.last_run("n1", "a").is_some());
        assert!(other.last_run("n2", "b").is_some());

        other.clear();
        assert!(other.is_empty());
    }
}
