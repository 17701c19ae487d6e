//! Directed edges between graph nodes.

use crate::error::{GraphError, Result};
use crate::value::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Extends,
    Implements,
    Uses,
    Contains,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EdgeType::Extends => "extends",
            EdgeType::Implements => "implements",
            EdgeType::Uses => "uses",
            EdgeType::Contains => "contains",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "extends" => Ok(EdgeType::Extends),
            "implements" => Ok(EdgeType::Implements),
            "uses" => Ok(EdgeType::Uses),
            "contains" => Ok(EdgeType::Contains),
            _ => Err(GraphError::parse(format!("Invalid edge type: {}", s))),
        }
    }
}

impl std::fmt::Display for EdgeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Property keys a `uses` edge may carry to preserve generic nesting without
/// widening the edge-type set.
pub mod edge_keys {
    pub const RELATIONSHIP_KIND: &str = "relationshipKind";
    pub const CONTAINER_TYPE: &str = "containerType";
    pub const TYPE_ARGUMENT_INDEX: &str = "typeArgumentIndex";
    pub const WILDCARD_KIND: &str = "wildcardKind";
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub source_id: String,
    pub target_id: String,
    pub edge_type: EdgeType,
    #[serde(default)]
    pub properties: BTreeMap<String, Value>,
}

impl Edge {
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        edge_type: EdgeType,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            target_id: target_id.into(),
            edge_type,
            properties: BTreeMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}
