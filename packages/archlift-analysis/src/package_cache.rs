//! Shared package-node cache.
//!
//! One instance is shared by both collectors; `get_or_create_and_attach` is
//! atomic per package (node shard lock), so concurrent collection of files
//! from the same package cannot lose class ids or counter increments.

use archlift_graph::{attach_class_to_package, normalize_package, ClassType, GraphStore, NodeType};
use std::sync::Arc;

pub struct PackageNodeCache {
    graph: Arc<GraphStore>,
}

impl PackageNodeCache {
    pub fn new(graph: Arc<GraphStore>) -> Self {
        Self { graph }
    }

    /// Ensure the package node exists, append the class id and bump the
    /// category counter. Returns the package node id.
    pub fn get_or_create_and_attach(
        &self,
        package_name: &str,
        class_id: &str,
        category: ClassType,
    ) -> String {
        let id = normalize_package(package_name);
        self.graph.get_or_create_node(&id, NodeType::Package);
        // Node exists at this point, so the mutation cannot fail.
        let _ = self
            .graph
            .with_node_mut(&id, |node| attach_class_to_package(node, class_id, category));
        id
    }
}
