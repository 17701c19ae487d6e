//! archlift-graph — typed architectural knowledge graph
//!
//! The in-memory `GraphStore` is authoritative during a run; the
//! `SqliteGraphStore` persists it to a single embedded database file at
//! phase boundaries and reloads it (fully or selectively) on the next run.
//!
//! Nodes carry properties (structured data), tags (boolean flags) and
//! metrics (scalar measurements) as three strictly separated surfaces.

pub mod edge;
pub mod error;
pub mod export;
pub mod graph;
pub mod node;
pub mod sqlite;
pub mod value;

pub use edge::{edge_keys, Edge, EdgeType};
pub use error::{GraphError, Result};
pub use graph::GraphStore;
pub use node::{
    attach_class_to_package, keys, normalize_package, split_fqn, ClassType, GraphNode,
    JavaClassNode, NodeType, NodeTypeRegistry, PackageNode, ProjectFile, SourceType,
};
pub use sqlite::{LoadOptions, SqliteGraphStore};
pub use value::Value;
