use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, warn};

use cst_core::{CsTreeError, FlowGraph, NodeId, START_NODE};
use cst_graph::{canonicalize, CanonicalReport};

use crate::node::TreeNode;
use crate::tree::Tree;

/// Materializes a canonical (acyclic, single-parent) graph into a tree rooted
/// at the start node. Child order follows edge order.
pub fn build_tree(graph: &FlowGraph) -> Result<Tree, CsTreeError> {
    if graph.node(START_NODE).is_none() {
        return Err(CsTreeError::malformed(
            "GRAPH_START_MISSING",
            "Graph has no start node with id 0.",
        ));
    }

    let mut nodes = graph
        .nodes
        .values()
        .map(|node| (node.id, TreeNode::from_graph(node)))
        .collect::<BTreeMap<_, _>>();

    for edge in &graph.edges {
        let Some(child) = nodes.get_mut(&edge.to) else {
            return Err(dangling(edge.to));
        };
        if let Some(existing) = child.parent {
            return Err(CsTreeError::malformed(
                "TREE_MULTIPLE_PARENTS",
                format!(
                    "Node {} has parents {} and {}; canonicalize the graph first.",
                    edge.to, existing, edge.from
                ),
            )
            .at_node(edge.to)
            .at_line(child.source_line));
        }
        child.parent = Some(edge.from);
        child.branch_label = edge.label.clone();
        let Some(parent) = nodes.get_mut(&edge.from) else {
            return Err(dangling(edge.from));
        };
        parent.children.push(edge.to);
    }

    let reachable = reachable_from_start(&nodes);
    let unreachable = nodes
        .keys()
        .copied()
        .filter(|id| !reachable.contains(id))
        .collect::<Vec<_>>();
    if !unreachable.is_empty() {
        warn!(count = unreachable.len(), "dropping nodes unreachable from the start node");
        for id in &unreachable {
            nodes.remove(id);
        }
    }
    if let Some(start) = nodes.get_mut(&START_NODE) {
        start.parent = None;
    }

    let mut tree = Tree::from_nodes(nodes, START_NODE);
    let parents = tree.nodes.keys().copied().collect::<Vec<_>>();
    for parent in parents {
        tree.relink_children(parent);
    }
    resolve_other_parents(&mut tree);
    debug!(nodes = tree.len(), "built tree");
    Ok(tree)
}

/// Canonicalizes `graph` and builds the tree in one step.
pub fn build_canonical_tree(graph: FlowGraph) -> Result<(Tree, CanonicalReport), CsTreeError> {
    let canonical = canonicalize(graph)?;
    let tree = build_tree(&canonical.graph)?;
    Ok((tree, canonical.report))
}

fn dangling(id: NodeId) -> CsTreeError {
    CsTreeError::malformed(
        "GRAPH_EDGE_ENDPOINT",
        format!("Edge references unknown node {}.", id),
    )
    .at_node(id)
}

fn reachable_from_start(nodes: &BTreeMap<NodeId, TreeNode>) -> BTreeSet<NodeId> {
    let mut seen = BTreeSet::new();
    let mut stack = vec![START_NODE];
    while let Some(id) = stack.pop() {
        if !seen.insert(id) {
            continue;
        }
        if let Some(node) = nodes.get(&id) {
            stack.extend(node.children.iter().copied());
        }
    }
    seen
}

// Second pass: every node exists now, so other-parent lines can be resolved.
fn resolve_other_parents(tree: &mut Tree) {
    let merges = tree
        .nodes
        .values()
        .filter(|node| node.is_merge_point())
        .map(|node| (node.id, node.other_parent_lines.clone()))
        .collect::<Vec<_>>();

    for (id, lines) in merges {
        let mut resolved = Vec::new();
        for line in lines {
            match tree.find_by_line(line) {
                Some(parent) => resolved.push(parent),
                None => warn!(node = %id, line, "no node at other-parent line"),
            }
        }
        if let Some(node) = tree.nodes.get_mut(&id) {
            node.other_parents = resolved;
        }
    }
}
