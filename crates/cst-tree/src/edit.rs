use tracing::debug;

use cst_core::{CsTreeError, NodeId, NodeKind};

use crate::node::TreeNode;
use crate::tree::Tree;

/// Appends a new text node under `parent` and returns its id.
pub fn add_child(tree: &mut Tree, parent: NodeId, label: &str) -> Result<NodeId, CsTreeError> {
    let parent_node = tree.get(parent)?;
    if parent_node.closed || parent_node.kind.is_marker() {
        return Err(CsTreeError::inconsistency(
            "EDIT_PARENT_COLLAPSED",
            "Cannot add under a collapsed node or marker.",
        )
        .at_node(parent));
    }
    let id = tree.mint(NodeKind::Text, label);
    tree.get_mut(parent)?.children.push(id);
    tree.relink_children(parent);
    debug!(node = %id, parent = %parent, "added node");
    Ok(id)
}

/// Removes `id` and its whole subtree, including closed-away children, and
/// returns the removed nodes in pre-order. The cursor falls back to the parent
/// when it was inside the subtree.
pub fn delete(tree: &mut Tree, id: NodeId) -> Result<Vec<TreeNode>, CsTreeError> {
    let node = tree.get(id)?;
    let Some(parent) = node.parent else {
        return Err(CsTreeError::inconsistency("EDIT_DELETE_ROOT", "The root cannot be deleted.")
            .at_node(id));
    };
    if node.kind == NodeKind::CloseMarker {
        return Err(CsTreeError::inconsistency(
            "EDIT_DELETE_MARKER",
            "Open the node instead of deleting its close marker.",
        )
        .at_node(id));
    }

    let cursor_inside = tree.is_within(tree.cursor, id);
    tree.get_mut(parent)?.children.retain(|child| *child != id);
    tree.relink_children(parent);

    let mut removed = Vec::new();
    let mut stack = vec![id];
    while let Some(current) = stack.pop() {
        let node = tree.take(current)?;
        stack.extend(node.true_children.iter().rev().copied());
        stack.extend(node.children.iter().rev().copied());
        removed.push(node);
    }
    if cursor_inside {
        tree.cursor = parent;
    }
    debug!(node = %id, removed = removed.len(), "deleted subtree");
    Ok(removed)
}
