use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::CsTreeError;

/// Graph and tree node identifier. Id `0` is the designated start node.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct NodeId(pub u64);

pub const START_NODE: NodeId = NodeId(0);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = CsTreeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        raw.trim().parse::<u64>().map(NodeId).map_err(|_| {
            CsTreeError::malformed(
                "GRAPH_NODE_ID",
                format!("Node id \"{}\" is not a non-negative integer.", raw),
            )
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Start,
    End,
    Text,
    Choice,
    Option,
    Var,
    Label,
    Cond,
    Goto,
    LoopGoto,
    MultiGoto,
    CloseMarker,
    HideMarker,
}

impl NodeKind {
    pub const ALL: [NodeKind; 13] = [
        Self::Start,
        Self::End,
        Self::Text,
        Self::Choice,
        Self::Option,
        Self::Var,
        Self::Label,
        Self::Cond,
        Self::Goto,
        Self::LoopGoto,
        Self::MultiGoto,
        Self::CloseMarker,
        Self::HideMarker,
    ];

    /// Maps the graph tool's shape attribute. `doublecircle` is the start node at
    /// line 0 and the end node at line -1.
    pub fn from_shape(shape: &str, source_line: Option<i64>) -> Option<Self> {
        match shape {
            "box" => Some(Self::Text),
            "point" => Some(Self::Goto),
            "cds" => Some(Self::Label),
            "triangle" => Some(Self::Choice),
            "hexagon" => Some(Self::Var),
            "diamond" => Some(Self::Cond),
            "doublecircle" => match source_line {
                Some(0) => Some(Self::Start),
                Some(-1) => Some(Self::End),
                _ => None,
            },
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::End => "end",
            Self::Text => "text",
            Self::Choice => "choice",
            Self::Option => "option",
            Self::Var => "var",
            Self::Label => "label",
            Self::Cond => "cond",
            Self::Goto => "goto",
            Self::LoopGoto => "loopgoto",
            Self::MultiGoto => "multigoto",
            Self::CloseMarker => "closemarker",
            Self::HideMarker => "hidemarker",
        }
    }

    pub fn is_marker(self) -> bool {
        matches!(self, Self::CloseMarker | Self::HideMarker)
    }

    /// Stand-ins minted by canonicalization for edges that cannot stay tree edges.
    pub fn is_synthetic_goto(self) -> bool {
        matches!(self, Self::LoopGoto | Self::MultiGoto)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for NodeKind {
    type Err = CsTreeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == wanted)
            .ok_or_else(|| {
                CsTreeError::malformed("NODE_KIND_UNKNOWN", format!("Unknown node kind \"{}\".", raw))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: NodeId,
    pub kind: NodeKind,
    #[serde(default)]
    pub source_line: Option<i64>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub tooltip: Option<String>,
    #[serde(default)]
    pub old_goto: Option<i64>,
    /// Id of the real target of a goto stand-in, when known.
    #[serde(default)]
    pub goto_target: Option<NodeId>,
    #[serde(default)]
    pub loop_goto: bool,
    #[serde(default)]
    pub other_parent_lines: Vec<i64>,
    /// Rendering attributes carried through untouched (fillcolor, style, ...).
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl GraphNode {
    pub fn new(id: NodeId, kind: NodeKind) -> Self {
        Self {
            id,
            kind,
            source_line: None,
            label: None,
            tooltip: None,
            old_goto: None,
            goto_target: None,
            loop_goto: false,
            other_parent_lines: Vec::new(),
            attributes: BTreeMap::new(),
        }
    }

    /// The statement text a tree node starts from: text blocks carry their prose
    /// in the tooltip, everything else in the label.
    pub fn statement_text(&self) -> String {
        let text = if self.kind == NodeKind::Text {
            self.tooltip.as_ref().or(self.label.as_ref())
        } else {
            self.label.as_ref()
        };
        text.cloned().unwrap_or_default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub from: NodeId,
    pub to: NodeId,
    #[serde(default)]
    pub label: Option<String>,
}

impl GraphEdge {
    pub fn new(from: NodeId, to: NodeId, label: Option<String>) -> Self {
        Self { from, to, label }
    }
}

/// Directed attributed flow graph as produced by the external graph tool.
/// Edge order is significant: it becomes child order in the tree.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FlowGraph {
    pub nodes: BTreeMap<NodeId, GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl FlowGraph {
    pub fn add_node(&mut self, node: GraphNode) {
        self.nodes.insert(node.id, node);
    }

    pub fn add_edge(&mut self, from: NodeId, to: NodeId, label: Option<String>) {
        self.edges.push(GraphEdge::new(from, to, label));
    }

    pub fn node(&self, id: NodeId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut GraphNode> {
        self.nodes.get_mut(&id)
    }

    /// Removes the first edge `from -> to` and returns it.
    pub fn remove_edge(&mut self, from: NodeId, to: NodeId) -> Option<GraphEdge> {
        let index = self
            .edges
            .iter()
            .position(|edge| edge.from == from && edge.to == to)?;
        Some(self.edges.remove(index))
    }

    pub fn edge(&self, from: NodeId, to: NodeId) -> Option<&GraphEdge> {
        self.edges
            .iter()
            .find(|edge| edge.from == from && edge.to == to)
    }

    /// Predecessors in edge order, one entry per incoming edge.
    pub fn predecessors(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|edge| edge.to == id)
            .map(|edge| edge.from)
            .collect()
    }

    pub fn successors(&self, id: NodeId) -> Vec<NodeId> {
        self.edges
            .iter()
            .filter(|edge| edge.from == id)
            .map(|edge| edge.to)
            .collect()
    }

    pub fn max_id(&self) -> Option<NodeId> {
        self.nodes.keys().next_back().copied()
    }

    pub fn next_id(&self) -> NodeId {
        self.max_id().map(|id| NodeId(id.0 + 1)).unwrap_or_default()
    }
}

/// Dot-separated source lines of the Var nodes visited on one root-to-node history.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PathId(String);

impl PathId {
    pub fn root() -> Self {
        Self(String::new())
    }

    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn extended(&self, line: i64) -> Self {
        if self.0.is_empty() {
            Self(line.to_string())
        } else {
            Self(format!("{}.{}", self.0, line))
        }
    }

    /// Sum of the numeric components; the long display form orders paths by it.
    pub fn digit_sum(&self) -> i64 {
        self.0
            .split('.')
            .filter_map(|part| part.parse::<i64>().ok())
            .sum()
    }
}

impl fmt::Display for PathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod types_tests {
    use super::*;

    #[test]
    fn shapes_map_to_kinds() {
        assert_eq!(NodeKind::from_shape("box", Some(3)), Some(NodeKind::Text));
        assert_eq!(NodeKind::from_shape("hexagon", Some(4)), Some(NodeKind::Var));
        assert_eq!(
            NodeKind::from_shape("doublecircle", Some(0)),
            Some(NodeKind::Start)
        );
        assert_eq!(
            NodeKind::from_shape("doublecircle", Some(-1)),
            Some(NodeKind::End)
        );
        assert_eq!(NodeKind::from_shape("doublecircle", Some(9)), None);
        assert_eq!(NodeKind::from_shape("ellipse", Some(9)), None);
    }

    #[test]
    fn kind_names_parse_back() {
        for kind in NodeKind::ALL {
            assert_eq!(kind.name().parse::<NodeKind>().expect("kind parses"), kind);
        }
        assert!("Goto".parse::<NodeKind>().is_ok());
        assert!("nope".parse::<NodeKind>().is_err());
    }

    #[test]
    fn path_ids_extend_and_sum() {
        let path = PathId::root().extended(4).extended(12);
        assert_eq!(path.as_str(), "4.12");
        assert_eq!(path.digit_sum(), 16);
        assert_eq!(PathId::root().digit_sum(), 0);
        assert!(PathId::root().is_root());
    }

    #[test]
    fn predecessors_follow_edge_order() {
        let mut graph = FlowGraph::default();
        for id in 0..4 {
            graph.add_node(GraphNode::new(NodeId(id), NodeKind::Text));
        }
        graph.add_edge(NodeId(2), NodeId(3), None);
        graph.add_edge(NodeId(1), NodeId(3), Some("Y".to_string()));
        assert_eq!(graph.predecessors(NodeId(3)), vec![NodeId(2), NodeId(1)]);
        assert_eq!(graph.next_id(), NodeId(4));
        let removed = graph.remove_edge(NodeId(1), NodeId(3)).expect("edge exists");
        assert_eq!(removed.label.as_deref(), Some("Y"));
        assert_eq!(graph.predecessors(NodeId(3)), vec![NodeId(2)]);
    }

    #[test]
    fn graph_node_json_uses_camel_case() {
        let node: GraphNode = serde_json::from_str(
            r#"{"id": 5, "kind": "text", "sourceLine": 12, "label": "T[1]", "tooltip": "Hello"}"#,
        )
        .expect("graph node json");
        assert_eq!(node.statement_text(), "Hello");
        assert_eq!(node.source_line, Some(12));
    }
}
