use serde::{Deserialize, Serialize};

use cst_core::{CsTreeError, FlowGraph, GraphEdge, GraphNode};

#[derive(Debug, Serialize, Deserialize)]
struct GraphDocument {
    nodes: Vec<GraphNode>,
    #[serde(default)]
    edges: Vec<GraphEdge>,
}

pub fn parse_json_graph(source: &str) -> Result<FlowGraph, CsTreeError> {
    let document: GraphDocument = serde_json::from_str(source)
        .map_err(|error| CsTreeError::malformed("GRAPH_JSON_PARSE", error.to_string()))?;

    let mut graph = FlowGraph::default();
    for node in document.nodes {
        if graph.nodes.contains_key(&node.id) {
            return Err(CsTreeError::malformed(
                "GRAPH_NODE_DUPLICATE",
                format!("Node {} is declared twice.", node.id),
            )
            .at_node(node.id));
        }
        graph.add_node(node);
    }
    for edge in document.edges {
        for endpoint in [edge.from, edge.to] {
            if !graph.nodes.contains_key(&endpoint) {
                return Err(CsTreeError::malformed(
                    "GRAPH_EDGE_ENDPOINT",
                    format!(
                        "Edge {} -> {} references undeclared node {}.",
                        edge.from, edge.to, endpoint
                    ),
                )
                .at_node(endpoint));
            }
        }
        graph.edges.push(edge);
    }
    Ok(graph)
}

pub fn write_json_graph(graph: &FlowGraph) -> String {
    let document = GraphDocument {
        nodes: graph.nodes.values().cloned().collect(),
        edges: graph.edges.clone(),
    };
    serde_json::to_string_pretty(&document).expect("flow graph should serialize")
}
