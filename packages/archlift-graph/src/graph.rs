//! In-memory authoritative graph for the duration of a run.
//!
//! Nodes live in a sharded map keyed by id; mutations on one node are
//! serialised by its shard lock. Type and tag lookups go through secondary
//! indexes so every query is O(index-hit). Edges are owned by the graph,
//! not by either endpoint.

use crate::edge::{Edge, EdgeType};
use crate::error::{GraphError, Result};
use crate::node::{GraphNode, NodeType};
use dashmap::DashMap;
use parking_lot::RwLock;
use std::collections::BTreeSet;

#[derive(Default)]
pub struct GraphStore {
    nodes: DashMap<String, GraphNode>,
    edges: RwLock<Vec<Edge>>,
    by_type: DashMap<NodeType, BTreeSet<String>>,
    by_tag: DashMap<String, BTreeSet<String>>,
}

impl GraphStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.read().len()
    }

    /// Insert a new node. Fails if the id already exists (ids are unique
    /// across all node types).
    pub fn add_node(&self, node: GraphNode) -> Result<()> {
        use dashmap::mapref::entry::Entry;
        match self.nodes.entry(node.id.clone()) {
            Entry::Occupied(_) => Err(GraphError::DuplicateId(node.id)),
            Entry::Vacant(slot) => {
                self.index_node(&node);
                slot.insert(node);
                Ok(())
            }
        }
    }

    /// Fetch a node, creating an empty one of the given type if absent.
    pub fn get_or_create_node(&self, id: &str, node_type: NodeType) -> GraphNode {
        self.nodes
            .entry(id.to_string())
            .or_insert_with(|| {
                let node = GraphNode::new(id, node_type);
                self.by_type
                    .entry(node_type)
                    .or_default()
                    .insert(id.to_string());
                node
            })
            .clone()
    }

    pub fn get_node(&self, id: &str) -> Option<GraphNode> {
        self.nodes.get(id).map(|n| n.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.contains_key(id)
    }

    /// Mutate a node in place under its shard lock. Tag additions made by
    /// the closure are reconciled into the tag index afterwards.
    pub fn with_node_mut<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut GraphNode) -> R,
    ) -> Result<R> {
        let mut entry = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))?;
        let before: BTreeSet<String> = entry.tags.clone();
        let result = f(&mut entry);
        let after = entry.tags.clone();
        drop(entry);
        for tag in after.difference(&before) {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(id.to_string());
        }
        Ok(result)
    }

    pub fn enable_tag(&self, id: &str, tag: &str) -> Result<()> {
        self.with_node_mut(id, |node| node.enable_tag(tag))
    }

    pub fn tags_of(&self, id: &str) -> Result<Vec<String>> {
        self.nodes
            .get(id)
            .map(|n| n.tags.iter().cloned().collect())
            .ok_or_else(|| GraphError::UnknownNode(id.to_string()))
    }

    // ─── Queries ───────────────────────────────────────────────────────────

    pub fn ids_by_type(&self, node_type: NodeType) -> Vec<String> {
        self.by_type
            .get(&node_type)
            .map(|ids| ids.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn find_by_node_type(&self, node_type: NodeType) -> Vec<GraphNode> {
        self.collect(self.ids_by_type(node_type))
    }

    pub fn find_by_tag(&self, tag: &str) -> Vec<GraphNode> {
        let ids = self
            .by_tag
            .get(tag)
            .map(|ids| ids.iter().cloned().collect::<Vec<_>>())
            .unwrap_or_default();
        self.collect(ids)
    }

    pub fn find_by_any_tags(&self, tags: &[String]) -> Vec<GraphNode> {
        let mut ids = BTreeSet::new();
        for tag in tags {
            if let Some(tagged) = self.by_tag.get(tag) {
                ids.extend(tagged.iter().cloned());
            }
        }
        self.collect(ids.into_iter().collect())
    }

    pub fn find_by_all_tags(&self, tags: &[String]) -> Vec<GraphNode> {
        if tags.is_empty() {
            return Vec::new();
        }
        let mut ids: Option<BTreeSet<String>> = None;
        for tag in tags {
            let tagged: BTreeSet<String> = self
                .by_tag
                .get(tag)
                .map(|t| t.iter().cloned().collect())
                .unwrap_or_default();
            ids = Some(match ids {
                None => tagged,
                Some(acc) => acc.intersection(&tagged).cloned().collect(),
            });
            if ids.as_ref().map(BTreeSet::is_empty).unwrap_or(false) {
                return Vec::new();
            }
        }
        self.collect(ids.unwrap_or_default().into_iter().collect())
    }

    pub fn find_by_type_and_any_tags(&self, node_type: NodeType, tags: &[String]) -> Vec<GraphNode> {
        let of_type: BTreeSet<String> = self.ids_by_type(node_type).into_iter().collect();
        self.find_by_any_tags(tags)
            .into_iter()
            .filter(|n| of_type.contains(&n.id))
            .collect()
    }

    pub fn find_by_type_and_all_tags(&self, node_type: NodeType, tags: &[String]) -> Vec<GraphNode> {
        let of_type: BTreeSet<String> = self.ids_by_type(node_type).into_iter().collect();
        self.find_by_all_tags(tags)
            .into_iter()
            .filter(|n| of_type.contains(&n.id))
            .collect()
    }

    fn collect(&self, ids: Vec<String>) -> Vec<GraphNode> {
        ids.iter()
            .filter_map(|id| self.nodes.get(id).map(|n| n.clone()))
            .collect()
    }

    // ─── Edges ─────────────────────────────────────────────────────────────

    pub fn add_edge(&self, edge: Edge) {
        self.edges.write().push(edge);
    }

    pub fn edges(&self) -> Vec<Edge> {
        self.edges.read().clone()
    }

    pub fn edges_from(&self, source_id: &str) -> Vec<Edge> {
        self.edges
            .read()
            .iter()
            .filter(|e| e.source_id == source_id)
            .cloned()
            .collect()
    }

    pub fn edges_to(&self, target_id: &str) -> Vec<Edge> {
        self.edges
            .read()
            .iter()
            .filter(|e| e.target_id == target_id)
            .cloned()
            .collect()
    }

    pub fn edges_by_type(&self, edge_type: EdgeType) -> Vec<Edge> {
        self.edges
            .read()
            .iter()
            .filter(|e| e.edge_type == edge_type)
            .cloned()
            .collect()
    }

    /// End-of-run invariant: every edge endpoint must reference an existing
    /// node id.
    pub fn validate_edges(&self) -> Result<()> {
        for edge in self.edges.read().iter() {
            if !self.nodes.contains_key(&edge.source_id) || !self.nodes.contains_key(&edge.target_id)
            {
                return Err(GraphError::UnknownEdgeEndpoint {
                    source_id: edge.source_id.clone(),
                    target: edge.target_id.clone(),
                    edge_type: edge.edge_type.as_str().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Drop all nodes and edges (explicit project re-scan only).
    pub fn clear(&self) {
        self.nodes.clear();
        self.edges.write().clear();
        self.by_type.clear();
        self.by_tag.clear();
    }

    /// Snapshot of all nodes, ordered by id.
    pub fn all_nodes(&self) -> Vec<GraphNode> {
        let mut nodes: Vec<GraphNode> = self.nodes.iter().map(|n| n.clone()).collect();
        nodes.sort_by(|a, b| a.id.cmp(&b.id));
        nodes
    }

    fn index_node(&self, node: &GraphNode) {
        self.by_type
            .entry(node.node_type)
            .or_default()
            .insert(node.id.clone());
        for tag in &node.tags {
            self.by_tag
                .entry(tag.clone())
                .or_default()
                .insert(node.id.clone());
        }
    }
}
