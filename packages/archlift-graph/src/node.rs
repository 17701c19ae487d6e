//! Graph node model
//!
//! Nodes carry three orthogonal attachment surfaces:
//! - `properties`: structured data (`Value`), never booleans
//! - `tags`: boolean flags
//! - `metrics`: scalar measurements (f64)
//!
//! Typed wrappers (`ProjectFile`, `JavaClassNode`, `PackageNode`) give the
//! collectors and inspectors a well-known-key API over the same underlying
//! `GraphNode`.

use crate::error::{GraphError, Result};
use crate::value::Value;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use tracing::warn;

/// Node type identifier. Closed set; unknown persisted identifiers fall back
/// to `Generic` at load time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeType {
    ProjectFile,
    JavaClass,
    Package,
    Generic,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::ProjectFile => "project_file",
            NodeType::JavaClass => "java_class",
            NodeType::Package => "package",
            NodeType::Generic => "generic",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "project_file" => Ok(NodeType::ProjectFile),
            "java_class" => Ok(NodeType::JavaClass),
            "package" => Ok(NodeType::Package),
            "generic" => Ok(NodeType::Generic),
            _ => Err(GraphError::parse(format!("Invalid node type: {}", s))),
        }
    }

    pub const ALL: [NodeType; 4] = [
        NodeType::ProjectFile,
        NodeType::JavaClass,
        NodeType::Package,
        NodeType::Generic,
    ];
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Well-known property and metric keys.
pub mod keys {
    /// Reserved prefix: `set_property("metrics.x", ..)` routes to the
    /// metrics map instead of the properties map.
    pub const METRICS_PREFIX: &str = "metrics.";

    // ProjectFile
    pub const FILE_PATH: &str = "file.path";
    pub const FILE_KIND: &str = "file.kind";
    pub const FILE_EXT: &str = "file.ext";

    // JavaClassNode
    pub const SIMPLE_NAME: &str = "class.simpleName";
    pub const PACKAGE_NAME: &str = "class.packageName";
    pub const SOURCE_FILE_PATH: &str = "class.sourceFilePath";
    pub const CLASS_TYPE: &str = "class.classType";
    pub const SOURCE_TYPE: &str = "class.sourceType";

    // PackageNode
    pub const PACKAGE_CLASSES: &str = "package.classes";

    // Reserved coupling metrics
    pub const COUPLING_CA: &str = "coupling.ca";
    pub const COUPLING_CE: &str = "coupling.ce";
    pub const COUPLING_CA_TRANSITIVE: &str = "coupling.ca_transitive";
    pub const COUPLING_CE_TRANSITIVE: &str = "coupling.ce_transitive";
    pub const COUPLING_INSTABILITY: &str = "coupling.instability";
}

/// Java class category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ClassType {
    Class,
    Interface,
    Enum,
    Annotation,
    Record,
}

impl ClassType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClassType::Class => "class",
            ClassType::Interface => "interface",
            ClassType::Enum => "enum",
            ClassType::Annotation => "annotation",
            ClassType::Record => "record",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "class" => Ok(ClassType::Class),
            "interface" => Ok(ClassType::Interface),
            "enum" => Ok(ClassType::Enum),
            "annotation" => Ok(ClassType::Annotation),
            "record" => Ok(ClassType::Record),
            _ => Err(GraphError::parse(format!("Invalid class type: {}", s))),
        }
    }
}

/// Where a class node came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SourceType {
    Source,
    Binary,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Source => "source",
            SourceType::Binary => "binary",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "source" => Ok(SourceType::Source),
            "binary" => Ok(SourceType::Binary),
            _ => Err(GraphError::parse(format!("Invalid source type: {}", s))),
        }
    }
}

/// A graph node. The `id` is unique across the whole graph regardless of
/// type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub node_type: NodeType,
    pub display_label: String,
    pub properties: BTreeMap<String, Value>,
    pub tags: BTreeSet<String>,
    pub metrics: BTreeMap<String, f64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: NodeType) -> Self {
        let id = id.into();
        let now = Utc::now();
        Self {
            display_label: id.clone(),
            id,
            node_type,
            properties: BTreeMap::new(),
            tags: BTreeSet::new(),
            metrics: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.display_label = label.into();
        self
    }

    /// Set a structured property. Boolean values are rejected (flags are
    /// tags), and `metrics.`-prefixed keys route to the metrics map with the
    /// prefix stripped.
    pub fn set_property(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(metric) = key.strip_prefix(keys::METRICS_PREFIX) {
            if let Some(f) = value.as_f64() {
                self.set_metric(metric.to_string(), f);
                return;
            }
        }
        debug_assert!(
            value.as_bool().is_none(),
            "boolean flags must be tags, not properties"
        );
        self.properties.insert(key, value);
        self.updated_at = Utc::now();
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    pub fn set_metric(&mut self, key: impl Into<String>, value: f64) {
        self.metrics.insert(key.into(), value);
        self.updated_at = Utc::now();
    }

    pub fn metric(&self, key: &str) -> Option<f64> {
        self.metrics.get(key).copied()
    }

    pub fn enable_tag(&mut self, tag: impl Into<String>) {
        self.tags.insert(tag.into());
        self.updated_at = Utc::now();
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }
}

// ─── Typed wrappers ────────────────────────────────────────────────────────

/// Path-addressed artifact: source file, class file, resource, descriptor.
#[derive(Debug, Clone)]
pub struct ProjectFile(pub GraphNode);

impl ProjectFile {
    /// `id` is the project-relative path.
    pub fn new(relative_path: impl Into<String>) -> Self {
        let path = relative_path.into();
        let mut node = GraphNode::new(path.clone(), NodeType::ProjectFile);
        node.set_property(keys::FILE_PATH, path);
        ProjectFile(node)
    }

    pub fn path(&self) -> &str {
        self.0.property_str(keys::FILE_PATH).unwrap_or(&self.0.id)
    }

    pub fn into_node(self) -> GraphNode {
        self.0
    }
}

/// A Java class. `id` is the fully-qualified name.
#[derive(Debug, Clone)]
pub struct JavaClassNode(pub GraphNode);

impl JavaClassNode {
    pub fn new(fqn: impl Into<String>, class_type: ClassType, source_type: SourceType) -> Self {
        let fqn = fqn.into();
        let (package, simple) = split_fqn(&fqn);
        let mut node = GraphNode::new(fqn, NodeType::JavaClass).with_label(simple.clone());
        node.set_property(keys::SIMPLE_NAME, simple);
        node.set_property(keys::PACKAGE_NAME, package);
        node.set_property(keys::CLASS_TYPE, class_type.as_str());
        node.set_property(keys::SOURCE_TYPE, source_type.as_str());
        JavaClassNode(node)
    }

    pub fn fqn(&self) -> &str {
        &self.0.id
    }

    pub fn simple_name(&self) -> &str {
        self.0.property_str(keys::SIMPLE_NAME).unwrap_or(&self.0.id)
    }

    pub fn package_name(&self) -> &str {
        self.0.property_str(keys::PACKAGE_NAME).unwrap_or("")
    }

    pub fn class_type(&self) -> ClassType {
        self.0
            .property_str(keys::CLASS_TYPE)
            .and_then(|s| ClassType::parse(s).ok())
            .unwrap_or(ClassType::Class)
    }

    pub fn source_type(&self) -> SourceType {
        self.0
            .property_str(keys::SOURCE_TYPE)
            .and_then(|s| SourceType::parse(s).ok())
            .unwrap_or(SourceType::Source)
    }

    pub fn set_source_file_path(&mut self, path: impl Into<String>) {
        self.0.set_property(keys::SOURCE_FILE_PATH, path.into());
    }

    pub fn into_node(self) -> GraphNode {
        self.0
    }
}

/// Split a fully-qualified name into (package, simple name).
pub fn split_fqn(fqn: &str) -> (String, String) {
    match fqn.rsplit_once('.') {
        Some((pkg, simple)) => (pkg.to_string(), simple.to_string()),
        None => (String::new(), fqn.to_string()),
    }
}

/// Normalize a package name for use as a node id. Empty means the default
/// package.
pub fn normalize_package(name: &str) -> String {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        "(default)".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Aggregates class ids and per-category counts for one package.
#[derive(Debug, Clone)]
pub struct PackageNode(pub GraphNode);

impl PackageNode {
    pub fn new(package_name: &str) -> Self {
        let id = normalize_package(package_name);
        let mut node = GraphNode::new(id.clone(), NodeType::Package).with_label(id);
        node.set_property(keys::PACKAGE_CLASSES, Value::List(Vec::new()));
        PackageNode(node)
    }

    pub fn class_ids(&self) -> Vec<String> {
        self.0
            .property(keys::PACKAGE_CLASSES)
            .and_then(Value::as_list)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn into_node(self) -> GraphNode {
        self.0
    }
}

/// Append a class id and bump the category counter on a package node.
/// Idempotent per class id.
pub fn attach_class_to_package(package: &mut GraphNode, class_id: &str, category: ClassType) {
    let mut ids = package
        .property(keys::PACKAGE_CLASSES)
        .and_then(Value::as_list)
        .map(|l| l.to_vec())
        .unwrap_or_default();
    if ids.iter().any(|v| v.as_str() == Some(class_id)) {
        return;
    }
    ids.push(Value::Str(class_id.to_string()));
    package.set_property(keys::PACKAGE_CLASSES, Value::List(ids));

    let counter = format!("package.count.{}", category_counter(category));
    let current = package.metric(&counter).unwrap_or(0.0);
    package.set_metric(counter, current + 1.0);
}

fn category_counter(category: ClassType) -> &'static str {
    match category {
        ClassType::Class => "classes",
        ClassType::Interface => "interfaces",
        ClassType::Enum => "enums",
        ClassType::Annotation => "annotations",
        ClassType::Record => "records",
    }
}

// ─── Factory registry ──────────────────────────────────────────────────────

type NodeFactory = fn(String) -> GraphNode;

/// Maps persisted `node_type` identifiers to constructors. Unknown
/// identifiers fall back to a generic node and log once per identifier.
pub struct NodeTypeRegistry {
    factories: BTreeMap<String, NodeFactory>,
}

static UNKNOWN_TYPES_SEEN: Lazy<Mutex<HashSet<String>>> = Lazy::new(|| Mutex::new(HashSet::new()));

impl NodeTypeRegistry {
    pub fn with_defaults() -> Self {
        let mut factories: BTreeMap<String, NodeFactory> = BTreeMap::new();
        for nt in NodeType::ALL {
            factories.insert(nt.as_str().to_string(), match nt {
                NodeType::ProjectFile => |id| GraphNode::new(id, NodeType::ProjectFile),
                NodeType::JavaClass => |id| GraphNode::new(id, NodeType::JavaClass),
                NodeType::Package => |id| GraphNode::new(id, NodeType::Package),
                NodeType::Generic => |id| GraphNode::new(id, NodeType::Generic),
            });
        }
        Self { factories }
    }

    pub fn register(&mut self, type_id: impl Into<String>, factory: NodeFactory) {
        self.factories.insert(type_id.into(), factory);
    }

    /// Construct an empty node for a persisted type identifier.
    pub fn create(&self, type_id: &str, node_id: String) -> GraphNode {
        match self.factories.get(type_id) {
            Some(factory) => factory(node_id),
            None => {
                let mut seen = UNKNOWN_TYPES_SEEN.lock();
                if seen.insert(type_id.to_string()) {
                    warn!("Unknown node type '{}', loading as generic", type_id);
                }
                GraphNode::new(node_id, NodeType::Generic)
            }
        }
    }
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
