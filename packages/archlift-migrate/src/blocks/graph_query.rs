//! GRAPH_QUERY blocks: select nodes from the knowledge graph into scope.
//!
//! Three bindings are produced: the projection list under the output
//! variable, `_ids` with the raw id list, and `_summary` with the query
//! shape and count.

use super::BlockOutcome;
use crate::error::{MigrateError, Result};
use crate::plan::model::GraphQueryKind;
use archlift_graph::{GraphNode, GraphStore, NodeType};
use serde_json::{json, Value};

pub fn run(
    query: GraphQueryKind,
    tags: &[String],
    node_type: Option<&str>,
    graph: &GraphStore,
) -> Result<BlockOutcome> {
    let parsed_type = match node_type {
        Some(raw) => Some(
            NodeType::parse(raw)
                .map_err(|e| MigrateError::Config(format!("GRAPH_QUERY: {}", e)))?,
        ),
        None => None,
    };

    let require_type = || {
        parsed_type.ok_or_else(|| {
            MigrateError::Config(format!(
                "GRAPH_QUERY {} requires node-type",
                query.as_str()
            ))
        })
    };

    let nodes: Vec<GraphNode> = match query {
        GraphQueryKind::ByType => graph.find_by_node_type(require_type()?),
        GraphQueryKind::ByAnyTag => graph.find_by_any_tags(tags),
        GraphQueryKind::ByAllTag => graph.find_by_all_tags(tags),
        GraphQueryKind::ByTypeAndAnyTag => graph.find_by_type_and_any_tags(require_type()?, tags),
        GraphQueryKind::ByTypeAndAllTag => graph.find_by_type_and_all_tags(require_type()?, tags),
    };

    let ids: Vec<Value> = nodes.iter().map(|n| Value::String(n.id.clone())).collect();
    let projections: Vec<Value> = nodes.iter().map(project).collect();
    let summary = json!({
        "count": nodes.len(),
        "queryKind": query.as_str(),
        "tags": tags,
        "nodeType": node_type,
    });

    Ok(BlockOutcome {
        primary: Some(Value::Array(projections)),
        extras: vec![
            ("_ids".to_string(), Value::Array(ids)),
            ("_summary".to_string(), summary),
        ],
        message: Some(format!("{} nodes matched", nodes.len())),
    })
}

/// Reduced serialisable view of a node: id, label, tags, the property map
/// flattened to its last key segment, and metrics.
fn project(node: &GraphNode) -> Value {
    let mut map = serde_json::Map::new();
    map.insert("id".to_string(), Value::String(node.id.clone()));
    map.insert(
        "label".to_string(),
        Value::String(node.display_label.clone()),
    );
    map.insert(
        "tags".to_string(),
        Value::Array(
            node.tags
                .iter()
                .map(|t| Value::String(t.clone()))
                .collect(),
        ),
    );
    for (key, value) in &node.properties {
        let short = key.rsplit('.').next().unwrap_or(key);
        map.insert(short.to_string(), value.to_json());
    }
    let metrics: serde_json::Map<String, Value> = node
        .metrics
        .iter()
        .map(|(k, v)| (k.clone(), json!(v)))
        .collect();
    map.insert("metrics".to_string(), Value::Object(metrics));
    Value::Object(map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use archlift_graph::{ClassType, JavaClassNode, SourceType};

    fn sample_graph() -> GraphStore {
        let graph = GraphStore::new();
        for (fqn, tag) in [
            ("shop.CartBean", Some("ejb.session.stateless")),
            ("shop.OrderBean", Some("ejb.session.stateless")),
            ("shop.Util", None),
        ] {
            graph
                .add_node(
                    JavaClassNode::new(fqn, ClassType::Class, SourceType::Source).into_node(),
                )
                .unwrap();
            if let Some(tag) = tag {
                graph.enable_tag(fqn, tag).unwrap();
            }
        }
        graph
    }

    #[test]
    fn test_by_any_tag_bindings() {
        let graph = sample_graph();
        let outcome = run(
            GraphQueryKind::ByAnyTag,
            &["ejb.session.stateless".to_string()],
            None,
            &graph,
        )
        .unwrap();

        let Some(Value::Array(items)) = &outcome.primary else {
            panic!("expected projection list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0]["id"], "shop.CartBean");
        assert_eq!(items[0]["simpleName"], "CartBean");

        let ids = &outcome.extras[0];
        assert_eq!(ids.0, "_ids");
        assert_eq!(ids.1, json!(["shop.CartBean", "shop.OrderBean"]));

        let summary = &outcome.extras[1];
        assert_eq!(summary.0, "_summary");
        assert_eq!(summary.1["count"], 2);
        assert_eq!(summary.1["queryKind"], "byAnyTag");
    }

    #[test]
    fn test_by_type_requires_node_type() {
        let graph = sample_graph();
        assert!(run(GraphQueryKind::ByType, &[], None, &graph).is_err());
        let outcome = run(GraphQueryKind::ByType, &[], Some("java_class"), &graph).unwrap();
        let Some(Value::Array(items)) = &outcome.primary else {
            panic!();
        };
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_unknown_node_type_is_config_error() {
        let graph = sample_graph();
        assert!(run(GraphQueryKind::ByType, &[], Some("martian"), &graph).is_err());
    }
}
