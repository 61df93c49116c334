use std::collections::BTreeSet;

use tracing::{debug, info};

use cst_core::{CsTreeError, NodeId, NodeKind};

use crate::display::has_multi_valued;
use crate::node::MARKER_LABEL;
use crate::tree::Tree;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompactReport {
    pub applied: usize,
    pub skipped: usize,
    pub markers: Vec<NodeId>,
}

fn ineligible(id: NodeId, code: &str, message: impl Into<String>) -> CsTreeError {
    CsTreeError::inconsistency(code, message).at_node(id)
}

fn parent_of(tree: &Tree, id: NodeId, code: &str) -> Result<NodeId, CsTreeError> {
    tree.get(id)?
        .parent
        .ok_or_else(|| ineligible(id, code, "The root node cannot be compacted."))
}

fn child_position(tree: &Tree, parent: NodeId, child: NodeId) -> Result<usize, CsTreeError> {
    tree.get(parent)?
        .children
        .iter()
        .position(|id| *id == child)
        .ok_or_else(|| {
            CsTreeError::inconsistency(
                "TREE_INVARIANT",
                format!("Node {} is not listed under its parent {}.", child, parent),
            )
            .at_node(child)
        })
}

/// Gives `children` to `owner`, re-parents them and rebuilds sibling links.
fn adopt(tree: &mut Tree, owner: NodeId, children: Vec<NodeId>) -> Result<(), CsTreeError> {
    tree.get_mut(owner)?.children = children;
    tree.relink_children(owner);
    Ok(())
}

fn replace_child(
    tree: &mut Tree,
    parent: NodeId,
    old: NodeId,
    new: &[NodeId],
) -> Result<(), CsTreeError> {
    let position = child_position(tree, parent, old)?;
    let mut children = tree.get(parent)?.children.clone();
    children.splice(position..=position, new.iter().copied());
    adopt(tree, parent, children)
}

fn move_cursor_off(tree: &mut Tree, removed: &[NodeId], to: NodeId) {
    if removed.contains(&tree.cursor) {
        tree.cursor = to;
    }
}

/// Merges a cosmetic node into its parent. Its children take its place in the
/// parent's child list; the node itself is kept in the parent's audit trail.
pub fn squash(tree: &mut Tree, id: NodeId) -> Result<(), CsTreeError> {
    let parent = parent_of(tree, id, "COMPACT_SQUASH_ROOT")?;
    let node = tree.get(id)?;
    let kind = node.kind;
    if !matches!(
        kind,
        NodeKind::Goto | NodeKind::Choice | NodeKind::Text | NodeKind::Option
    ) {
        return Err(ineligible(
            id,
            "COMPACT_SQUASH_KIND",
            format!("Cannot squash a {} node.", kind),
        ));
    }
    if node.closed {
        return Err(ineligible(id, "COMPACT_NODE_CLOSED", "Open the node before squashing it."));
    }
    let parent_kind = tree.get(parent)?.kind;
    if kind == NodeKind::Text && parent_kind != NodeKind::Label {
        return Err(ineligible(
            id,
            "COMPACT_SQUASH_PARENT",
            format!("Text squashes only into a label, not a {}.", parent_kind),
        ));
    }

    let node = tree.take(id)?;
    for child in &node.children {
        let child = tree.get_mut(*child)?;
        if child.branch_label.is_none() {
            child.branch_label = node.branch_label.clone();
        }
    }
    replace_child(tree, parent, id, &node.children)?;

    let parent_node = tree.get_mut(parent)?;
    if kind == NodeKind::Text {
        parent_node.plain_label = format!("{}: {}", parent_node.plain_label, node.plain_label);
    }
    parent_node.squashed.push(node);
    move_cursor_off(tree, &[id], parent);
    debug!(node = %id, parent = %parent, %kind, "squashed node");
    Ok(())
}

fn squash_candidates(tree: &Tree, kind: NodeKind) -> Vec<NodeId> {
    tree.preorder()
        .into_iter()
        .filter(|id| tree.node(*id).is_some_and(|node| node.kind == kind))
        .collect()
}

fn squash_allowed(tree: &Tree, id: NodeId) -> bool {
    let Some(node) = tree.node(id) else {
        return false;
    };
    let Some(parent) = node.parent.and_then(|parent| tree.node(parent)) else {
        return false;
    };
    match node.kind {
        NodeKind::Goto => parent.kind != NodeKind::Choice,
        NodeKind::Text => parent.kind == NodeKind::Label,
        NodeKind::Choice | NodeKind::Option => true,
        _ => false,
    }
}

/// Bulk squash: gotos not directly under a choice, then text under labels, then
/// any other configured kinds. Ineligible nodes are counted and skipped.
pub fn squash_all(tree: &mut Tree, kinds: &BTreeSet<NodeKind>) -> CompactReport {
    let mut report = CompactReport::default();
    let order = [NodeKind::Goto, NodeKind::Text, NodeKind::Choice, NodeKind::Option];
    for kind in order.into_iter().filter(|kind| kinds.contains(kind)) {
        for id in squash_candidates(tree, kind) {
            if !squash_allowed(tree, id) {
                report.skipped += 1;
                continue;
            }
            match squash(tree, id) {
                Ok(()) => report.applied += 1,
                Err(error) => {
                    debug!(node = %id, code = %error.code, "squash skipped");
                    report.skipped += 1;
                }
            }
        }
    }
    info!(squashed = report.applied, skipped = report.skipped, "squash pass finished");
    report
}

/// Collapses `id` into a hide marker, merging with an adjacent marker instead
/// of nesting one. Returns the marker that now holds the content.
pub fn hide(tree: &mut Tree, id: NodeId) -> Result<NodeId, CsTreeError> {
    let parent = parent_of(tree, id, "COMPACT_HIDE_ROOT")?;
    let node = tree.get(id)?;
    if node.closed {
        return Err(ineligible(id, "COMPACT_NODE_CLOSED", "Open the node before hiding it."));
    }
    let children = node.children.clone();
    let kind = node.kind;
    let parent_node = tree.get(parent)?;

    if parent_node.kind == NodeKind::HideMarker {
        if parent_node.children.len() != 1 {
            return Err(ineligible(
                id,
                "COMPACT_HIDE_AMBIGUOUS",
                "Hide marker parent has several children.",
            ));
        }
        return absorb_into_parent_marker(tree, parent, id);
    }

    let single_child = match children.as_slice() {
        [child] => Some(*child),
        _ => None,
    };
    if let Some(child) = single_child {
        let child_node = tree.get(child)?;
        if child_node.closed {
            return Err(ineligible(child, "COMPACT_NODE_CLOSED", "Open the child before hiding."));
        }
        if child_node.kind == NodeKind::HideMarker {
            return absorb_into_child_marker(tree, parent, id, child);
        }
        if kind == NodeKind::HideMarker {
            return absorb_child_into_marker(tree, id, child);
        }
        return replace_with_marker(tree, parent, id, child);
    }

    Err(ineligible(
        id,
        "COMPACT_HIDE_AMBIGUOUS",
        format!("Cannot hide a node with {} children.", children.len()),
    ))
}

fn absorb_into_parent_marker(
    tree: &mut Tree,
    marker: NodeId,
    id: NodeId,
) -> Result<NodeId, CsTreeError> {
    let node = tree.take(id)?;
    let children = node.children.clone();
    {
        let marker_node = tree.get_mut(marker)?;
        // A parent's contents come before whatever its marker already holds.
        let mut contents = node.hideable_contents();
        contents.append(&mut marker_node.hidden_contents);
        marker_node.hidden_contents = contents;
        marker_node.squashed.push(node);
    }
    adopt(tree, marker, children)?;
    move_cursor_off(tree, &[id], marker);
    debug!(node = %id, marker = %marker, "hid node into parent marker");
    Ok(marker)
}

fn joined_branch(outer: Option<String>, inner: Option<String>) -> Option<String> {
    match (outer, inner) {
        (Some(outer), Some(inner)) => Some(format!("{}: {}", outer, inner)),
        (outer, inner) => outer.or(inner),
    }
}

fn absorb_into_child_marker(
    tree: &mut Tree,
    parent: NodeId,
    id: NodeId,
    marker: NodeId,
) -> Result<NodeId, CsTreeError> {
    replace_child(tree, parent, id, &[marker])?;
    let node = tree.take(id)?;
    let marker_node = tree.get_mut(marker)?;
    let mut contents = node.hideable_contents();
    contents.append(&mut marker_node.hidden_contents);
    marker_node.hidden_contents = contents;
    marker_node.branch_label = joined_branch(node.branch_label.clone(), marker_node.branch_label.take());
    marker_node.squashed.insert(0, node);
    move_cursor_off(tree, &[id], marker);
    debug!(node = %id, marker = %marker, "hid node into child marker");
    Ok(marker)
}

fn absorb_child_into_marker(
    tree: &mut Tree,
    marker: NodeId,
    child: NodeId,
) -> Result<NodeId, CsTreeError> {
    let child_node = tree.take(child)?;
    let grandchildren = child_node.children.clone();
    {
        let marker_node = tree.get_mut(marker)?;
        marker_node.hidden_contents.extend(child_node.hideable_contents());
        marker_node.squashed.push(child_node);
    }
    adopt(tree, marker, grandchildren)?;
    move_cursor_off(tree, &[child], marker);
    debug!(marker = %marker, child = %child, "flattened child into marker");
    Ok(marker)
}

fn replace_with_marker(
    tree: &mut Tree,
    parent: NodeId,
    id: NodeId,
    child: NodeId,
) -> Result<NodeId, CsTreeError> {
    let marker = tree.mint(NodeKind::HideMarker, MARKER_LABEL);
    replace_child(tree, parent, id, &[marker])?;
    let node = tree.take(id)?;
    let child_node = tree.take(child)?;
    let grandchildren = child_node.children.clone();
    {
        let marker_node = tree.get_mut(marker)?;
        marker_node.hidden_contents = node.hideable_contents();
        marker_node
            .hidden_contents
            .extend(child_node.hideable_contents());
        marker_node.branch_label = node.branch_label.clone();
        marker_node.squashed = vec![node, child_node];
    }
    adopt(tree, marker, grandchildren)?;
    move_cursor_off(tree, &[id, child], marker);
    debug!(node = %id, child = %child, marker = %marker, "replaced node with hide marker");
    Ok(marker)
}

fn hide_candidate(tree: &Tree, id: NodeId) -> bool {
    let Some(node) = tree.node(id) else {
        return false;
    };
    if node.parent.is_none() || node.closed {
        return false;
    }
    let first_is_stand_in = node
        .first_child()
        .and_then(|child| tree.node(child))
        .is_some_and(|child| child.kind.is_synthetic_goto());
    if first_is_stand_in {
        return false;
    }
    if has_multi_valued(node) {
        return false;
    }
    !node
        .children
        .iter()
        .filter_map(|child| tree.node(*child))
        .any(has_multi_valued)
}

/// Post-order pass hiding every node with no observable variable divergence
/// on it or its children. Whole quiet runs end up in a single marker.
pub fn hide_all(tree: &mut Tree) -> CompactReport {
    let mut report = CompactReport::default();
    let root = tree.root;
    hide_all_from(tree, root, &mut report);
    let mut markers = report
        .markers
        .iter()
        .copied()
        .filter(|id| tree.node(*id).is_some())
        .collect::<Vec<_>>();
    markers.sort();
    markers.dedup();
    report.markers = markers;
    info!(
        hidden = report.applied,
        skipped = report.skipped,
        markers = report.markers.len(),
        "hide pass finished"
    );
    report
}

fn hide_all_from(tree: &mut Tree, id: NodeId, report: &mut CompactReport) {
    let children = tree
        .node(id)
        .map(|node| node.children.clone())
        .unwrap_or_default();
    for child in children {
        hide_all_from(tree, child, report);
    }

    if !hide_candidate(tree, id) {
        return;
    }
    match hide(tree, id) {
        Ok(marker) => {
            report.applied += 1;
            report.markers.push(marker);
        }
        Err(error) => {
            debug!(node = %id, code = %error.code, "left node expanded");
            report.skipped += 1;
        }
    }
}

/// Toggles a manual collapse. Closing parks the children aside behind one
/// close marker; opening restores the very same children.
pub fn open_close(tree: &mut Tree, id: NodeId) -> Result<(), CsTreeError> {
    let node = tree.get(id)?;
    if node.closed {
        let markers = node.children.clone();
        for marker in markers {
            tree.take(marker)?;
        }
        let node = tree.get_mut(id)?;
        let restored = std::mem::take(&mut node.true_children);
        node.closed = false;
        adopt(tree, id, restored)?;
        debug!(node = %id, "opened node");
        return Ok(());
    }
    if node.children.is_empty() {
        return Ok(());
    }

    let marker = tree.mint(NodeKind::CloseMarker, MARKER_LABEL);
    let cursor_inside = tree.cursor != id && tree.is_within(tree.cursor, id);
    let node = tree.get_mut(id)?;
    node.true_children = std::mem::take(&mut node.children);
    node.closed = true;
    adopt(tree, id, vec![marker])?;
    if cursor_inside {
        tree.cursor = id;
    }
    debug!(node = %id, marker = %marker, "closed node");
    Ok(())
}
