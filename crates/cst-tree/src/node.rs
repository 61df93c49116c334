use std::collections::BTreeMap;

use serde::Serialize;

use cst_core::{GraphNode, NodeId, NodeKind, VarTable};

pub const MARKER_LABEL: &str = "…";

/// Which of the two variable display formats a summary uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VarForm {
    Short,
    Long,
}

/// Variables surfaced on a node by `annotate_important`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Surfaced {
    pub names: Vec<String>,
    pub form: VarForm,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TreeNode {
    pub id: NodeId,
    pub kind: NodeKind,
    pub source_line: Option<i64>,
    /// Statement text as read from the graph. Never edited.
    pub raw_label: String,
    /// Working label; squashing appends to it.
    pub plain_label: String,
    pub parent: Option<NodeId>,
    pub children: Vec<NodeId>,
    pub next: Option<NodeId>,
    pub prev: Option<NodeId>,
    pub closed: bool,
    pub true_children: Vec<NodeId>,
    pub hidden_contents: Vec<String>,
    /// Nodes merged away into this one, kept whole as an audit trail.
    pub squashed: Vec<TreeNode>,
    pub branch_label: Option<String>,
    pub other_parent_lines: Vec<i64>,
    pub other_parents: Vec<NodeId>,
    pub variable_table: VarTable,
    pub multi_vars: Option<Surfaced>,
    pub old_goto: Option<i64>,
    pub goto_target: Option<NodeId>,
    pub attributes: BTreeMap<String, String>,
}

impl TreeNode {
    pub fn new(id: NodeId, kind: NodeKind, label: impl Into<String>) -> Self {
        let label = label.into();
        Self {
            id,
            kind,
            source_line: None,
            raw_label: label.clone(),
            plain_label: label,
            parent: None,
            children: Vec::new(),
            next: None,
            prev: None,
            closed: false,
            true_children: Vec::new(),
            hidden_contents: Vec::new(),
            squashed: Vec::new(),
            branch_label: None,
            other_parent_lines: Vec::new(),
            other_parents: Vec::new(),
            variable_table: VarTable::new(),
            multi_vars: None,
            old_goto: None,
            goto_target: None,
            attributes: BTreeMap::new(),
        }
    }

    pub fn from_graph(node: &GraphNode) -> Self {
        let mut tree_node = Self::new(node.id, node.kind, node.statement_text());
        tree_node.source_line = node.source_line;
        tree_node.other_parent_lines = node.other_parent_lines.clone();
        tree_node.old_goto = node.old_goto;
        tree_node.goto_target = node.goto_target;
        tree_node.attributes = node.attributes.clone();
        tree_node
    }

    pub fn marker(id: NodeId, kind: NodeKind) -> Self {
        Self::new(id, kind, MARKER_LABEL)
    }

    pub fn is_merge_point(&self) -> bool {
        !self.other_parent_lines.is_empty()
    }

    pub fn first_child(&self) -> Option<NodeId> {
        self.children.first().copied()
    }

    /// Labels this node contributes when it is swallowed by a hide marker.
    pub(crate) fn hideable_contents(&self) -> Vec<String> {
        if self.kind == NodeKind::HideMarker {
            self.hidden_contents.clone()
        } else {
            vec![self.plain_label.clone()]
        }
    }
}
