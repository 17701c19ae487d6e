//! Afferent/efferent coupling metrics from graph edges.
//!
//! Ce counts distinct classes this node depends on (`uses`, `extends`,
//! `implements` out-edges); Ca counts distinct dependents. Transitive
//! variants follow the same edges to a fixpoint. Instability is
//! Ce / (Ca + Ce), zero when isolated.

use crate::error::Result;
use crate::inspector::{InspectionContext, Inspector};
use archlift_graph::{keys, Edge, EdgeType, GraphNode};
use std::collections::{HashSet, VecDeque};

pub struct CouplingInspector;

impl CouplingInspector {
    pub fn new() -> Self {
        Self
    }

    fn coupling_edge(edge: &Edge) -> bool {
        matches!(
            edge.edge_type,
            EdgeType::Uses | EdgeType::Extends | EdgeType::Implements
        )
    }

    fn transitive_count(
        start: &str,
        next: impl Fn(&str) -> Vec<String>,
    ) -> usize {
        let mut seen: HashSet<String> = HashSet::new();
        let mut queue: VecDeque<String> = VecDeque::new();
        queue.push_back(start.to_string());
        while let Some(current) = queue.pop_front() {
            for neighbor in next(&current) {
                if neighbor != start && seen.insert(neighbor.clone()) {
                    queue.push_back(neighbor);
                }
            }
        }
        seen.len()
    }
}

impl Default for CouplingInspector {
    fn default() -> Self {
        Self::new()
    }
}

impl Inspector for CouplingInspector {
    fn id(&self) -> &'static str {
        "coupling"
    }

    fn run(&self, node: &GraphNode, ctx: &InspectionContext<'_>) -> Result<bool> {
        let efferent: HashSet<String> = ctx
            .edges_from(&node.id)
            .iter()
            .filter(|e| Self::coupling_edge(e))
            .map(|e| e.target_id.clone())
            .collect();
        let afferent: HashSet<String> = ctx
            .edges_to(&node.id)
            .iter()
            .filter(|e| Self::coupling_edge(e))
            .map(|e| e.source_id.clone())
            .collect();

        let ce = efferent.len() as f64;
        let ca = afferent.len() as f64;
        let instability = if ca + ce == 0.0 { 0.0 } else { ce / (ca + ce) };

        let ce_transitive = Self::transitive_count(&node.id, |id| {
            ctx.edges_from(id)
                .iter()
                .filter(|e| Self::coupling_edge(e))
                .map(|e| e.target_id.clone())
                .collect()
        }) as f64;
        let ca_transitive = Self::transitive_count(&node.id, |id| {
            ctx.edges_to(id)
                .iter()
                .filter(|e| Self::coupling_edge(e))
                .map(|e| e.source_id.clone())
                .collect()
        }) as f64;

        let unchanged = node.metric(keys::COUPLING_CA) == Some(ca)
            && node.metric(keys::COUPLING_CE) == Some(ce)
            && node.metric(keys::COUPLING_CA_TRANSITIVE) == Some(ca_transitive)
            && node.metric(keys::COUPLING_CE_TRANSITIVE) == Some(ce_transitive);
        if unchanged {
            return Ok(false);
        }

        ctx.set_metric(keys::COUPLING_CA, ca)?;
        ctx.set_metric(keys::COUPLING_CE, ce)?;
        ctx.set_metric(keys::COUPLING_CA_TRANSITIVE, ca_transitive)?;
        ctx.set_metric(keys::COUPLING_CE_TRANSITIVE, ce_transitive)?;
        ctx.set_metric(keys::COUPLING_INSTABILITY, instability)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::FsResourceResolver;
    use archlift_graph::{ClassType, GraphStore, JavaClassNode, SourceType};

    fn add_class(graph: &GraphStore, fqn: &str) {
        graph
            .add_node(JavaClassNode::new(fqn, ClassType::Class, SourceType::Source).into_node())
            .unwrap();
    }

    #[test]
    fn test_coupling_metrics() {
        // a -> b -> c, and d -> b
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsResourceResolver::new(dir.path());
        let graph = GraphStore::new();
        for fqn in ["p.A", "p.B", "p.C", "p.D"] {
            add_class(&graph, fqn);
        }
        graph.add_edge(Edge::new("p.A", "p.B", EdgeType::Uses));
        graph.add_edge(Edge::new("p.B", "p.C", EdgeType::Extends));
        graph.add_edge(Edge::new("p.D", "p.B", EdgeType::Uses));

        let inspector = CouplingInspector::new();
        let ctx = InspectionContext::new(&graph, &resolver, "p.B".to_string());
        let node = graph.get_node("p.B").unwrap();
        assert!(inspector.run(&node, &ctx).unwrap());

        let node = graph.get_node("p.B").unwrap();
        assert_eq!(node.metric(keys::COUPLING_CE), Some(1.0));
        assert_eq!(node.metric(keys::COUPLING_CA), Some(2.0));
        assert_eq!(node.metric(keys::COUPLING_INSTABILITY), Some(1.0 / 3.0));

        // Second run with no edge changes reports no mutation.
        assert!(!inspector.run(&node, &ctx).unwrap());
    }

    #[test]
    fn test_transitive_closure() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsResourceResolver::new(dir.path());
        let graph = GraphStore::new();
        for fqn in ["p.A", "p.B", "p.C"] {
            add_class(&graph, fqn);
        }
        graph.add_edge(Edge::new("p.A", "p.B", EdgeType::Uses));
        graph.add_edge(Edge::new("p.B", "p.C", EdgeType::Uses));

        let inspector = CouplingInspector::new();
        let ctx = InspectionContext::new(&graph, &resolver, "p.A".to_string());
        let node = graph.get_node("p.A").unwrap();
        inspector.run(&node, &ctx).unwrap();

        let node = graph.get_node("p.A").unwrap();
        assert_eq!(node.metric(keys::COUPLING_CE), Some(1.0));
        assert_eq!(node.metric(keys::COUPLING_CE_TRANSITIVE), Some(2.0));
    }

    #[test]
    fn test_isolated_class_instability_zero() {
        let dir = tempfile::tempdir().unwrap();
        let resolver = FsResourceResolver::new(dir.path());
        let graph = GraphStore::new();
        add_class(&graph, "p.Lone");

        let inspector = CouplingInspector::new();
        let ctx = InspectionContext::new(&graph, &resolver, "p.Lone".to_string());
        let node = graph.get_node("p.Lone").unwrap();
        inspector.run(&node, &ctx).unwrap();

        let node = graph.get_node("p.Lone").unwrap();
        assert_eq!(node.metric(keys::COUPLING_INSTABILITY), Some(0.0));
    }
}
