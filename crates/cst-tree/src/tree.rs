use std::collections::BTreeMap;

use cst_core::{CsTreeError, NodeId, NodeKind};

use crate::node::TreeNode;

/// Declared variable names in declaration order. The order drives display
/// ordering and color slot assignment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableRegistry {
    names: Vec<String>,
}

impl VariableRegistry {
    /// Registers `name` if it is new and returns its slot.
    pub fn register(&mut self, name: &str) -> usize {
        if let Some(slot) = self.slot(name) {
            return slot;
        }
        self.names.push(name.to_string());
        self.names.len() - 1
    }

    pub fn slot(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|known| known == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn contains(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    pub fn clear(&mut self) {
        self.names.clear();
    }
}

/// Arena of tree nodes. `parent -> children` are the owning links; next/prev,
/// other parents and goto targets are id lookups into the same table.
#[derive(Debug, Clone)]
pub struct Tree {
    pub(crate) nodes: BTreeMap<NodeId, TreeNode>,
    pub(crate) root: NodeId,
    pub(crate) cursor: NodeId,
    pub(crate) next_id: u64,
    pub(crate) registry: VariableRegistry,
}

impl Tree {
    pub(crate) fn from_nodes(nodes: BTreeMap<NodeId, TreeNode>, root: NodeId) -> Self {
        let next_id = nodes.keys().next_back().map(|id| id.0 + 1).unwrap_or(0);
        Self {
            nodes,
            root,
            cursor: root,
            next_id,
            registry: VariableRegistry::default(),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn cursor(&self) -> NodeId {
        self.cursor
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&TreeNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = &TreeNode> {
        self.nodes.values()
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    pub fn get(&self, id: NodeId) -> Result<&TreeNode, CsTreeError> {
        self.nodes.get(&id).ok_or_else(|| unknown_node(id))
    }

    pub(crate) fn get_mut(&mut self, id: NodeId) -> Result<&mut TreeNode, CsTreeError> {
        self.nodes.get_mut(&id).ok_or_else(|| unknown_node(id))
    }

    pub fn set_cursor(&mut self, id: NodeId) -> Result<(), CsTreeError> {
        self.get(id)?;
        self.cursor = id;
        Ok(())
    }

    pub(crate) fn mint(&mut self, kind: NodeKind, label: &str) -> NodeId {
        while self.nodes.contains_key(&NodeId(self.next_id)) {
            self.next_id += 1;
        }
        let id = NodeId(self.next_id);
        self.next_id += 1;
        self.nodes.insert(id, TreeNode::new(id, kind, label));
        id
    }

    pub(crate) fn take(&mut self, id: NodeId) -> Result<TreeNode, CsTreeError> {
        self.nodes.remove(&id).ok_or_else(|| unknown_node(id))
    }

    /// Rewrites next/prev of every child of `parent` from its children order.
    pub(crate) fn relink_children(&mut self, parent: NodeId) {
        let Some(children) = self.nodes.get(&parent).map(|node| node.children.clone()) else {
            return;
        };
        for (index, child) in children.iter().enumerate() {
            if let Some(node) = self.nodes.get_mut(child) {
                node.parent = Some(parent);
                node.prev = index.checked_sub(1).map(|i| children[i]);
                node.next = children.get(index + 1).copied();
            }
        }
    }

    /// Visible nodes in pre-order from the root, following `children`.
    pub fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![self.root];
        while let Some(id) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            order.push(id);
            stack.extend(node.children.iter().rev().copied());
        }
        order
    }

    /// Pre-order with the depth of each node, root at depth 0.
    pub fn preorder_with_depth(&self) -> Vec<(NodeId, usize)> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut stack = vec![(self.root, 0usize)];
        while let Some((id, depth)) = stack.pop() {
            let Some(node) = self.nodes.get(&id) else {
                continue;
            };
            order.push((id, depth));
            stack.extend(node.children.iter().rev().map(|child| (*child, depth + 1)));
        }
        order
    }

    /// Exact source line first, then the following line; goto targets in the
    /// graph tool's output are sometimes recorded one line early.
    pub fn find_by_line(&self, line: i64) -> Option<NodeId> {
        let exact = |wanted: i64| {
            self.nodes
                .values()
                .find(|node| node.source_line == Some(wanted) && !node.kind.is_synthetic_goto())
                .map(|node| node.id)
        };
        exact(line).or_else(|| exact(line + 1))
    }

    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut current = self.nodes.get(&id).and_then(|node| node.parent);
        while let Some(parent) = current {
            out.push(parent);
            current = self.nodes.get(&parent).and_then(|node| node.parent);
        }
        out
    }

    /// True when `id` is `ancestor` or sits below it, through visible or
    /// closed-away children.
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        id == ancestor || self.ancestors(id).contains(&ancestor)
    }

    /// Real target of a goto stand-in: the recorded id if it still exists,
    /// else the node that absorbed it during compaction, else the node at its
    /// old goto line.
    pub fn goto_destination(&self, stand_in: &TreeNode) -> Option<NodeId> {
        match stand_in.goto_target {
            Some(target) if self.nodes.contains_key(&target) => Some(target),
            Some(target) => self
                .absorbed_by(target)
                .or_else(|| stand_in.old_goto.and_then(|line| self.find_by_line(line))),
            None => stand_in.old_goto.and_then(|line| self.find_by_line(line)),
        }
    }

    /// Live node whose squashed trail holds `id`, at any depth.
    pub fn absorbed_by(&self, id: NodeId) -> Option<NodeId> {
        fn holds(node: &TreeNode, id: NodeId) -> bool {
            node.squashed
                .iter()
                .any(|squashed| squashed.id == id || holds(squashed, id))
        }
        self.nodes
            .values()
            .find(|node| holds(node, id))
            .map(|node| node.id)
    }

    /// Checks the structural invariants: single parent, children agree with
    /// parent links and the next/prev chain, closed nodes hold one marker.
    pub fn check_invariants(&self) -> Result<(), CsTreeError> {
        let mut seen = 0usize;
        for id in self.preorder() {
            seen += 1;
            let node = self.get(id)?;
            if id != self.root && node.parent.is_none() {
                return Err(inconsistent(id, "non-root node has no parent"));
            }
            if node.closed {
                let single_marker = node.children.len() == 1
                    && self
                        .node(node.children[0])
                        .is_some_and(|child| child.kind == NodeKind::CloseMarker);
                if !single_marker {
                    return Err(inconsistent(id, "closed node must hold a single close marker"));
                }
            }
            for (index, child) in node.children.iter().enumerate() {
                let child = self.get(*child)?;
                if child.parent != Some(id) {
                    return Err(inconsistent(child.id, "child does not point back at its parent"));
                }
                let prev = index.checked_sub(1).map(|i| node.children[i]);
                let next = node.children.get(index + 1).copied();
                if child.prev != prev || child.next != next {
                    return Err(inconsistent(child.id, "sibling links disagree with children order"));
                }
            }
        }
        if seen > self.nodes.len() {
            return Err(inconsistent(self.root, "a node is reachable twice"));
        }
        Ok(())
    }
}

fn unknown_node(id: NodeId) -> CsTreeError {
    CsTreeError::inconsistency("TREE_NODE_UNKNOWN", format!("Tree has no node {}.", id)).at_node(id)
}

fn inconsistent(id: NodeId, message: &str) -> CsTreeError {
    CsTreeError::inconsistency("TREE_INVARIANT", message).at_node(id)
}
