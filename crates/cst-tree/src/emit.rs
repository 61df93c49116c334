use cst_core::{NodeId, NodeKind};

use crate::display::{format_surfaced, PlainDecorator};
use crate::node::TreeNode;
use crate::tree::Tree;

fn shape_for(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Start | NodeKind::End => "doublecircle",
        NodeKind::Text | NodeKind::Option | NodeKind::HideMarker | NodeKind::CloseMarker => "box",
        NodeKind::Choice => "triangle",
        NodeKind::Var => "hexagon",
        NodeKind::Label => "cds",
        NodeKind::Cond => "diamond",
        NodeKind::Goto | NodeKind::LoopGoto | NodeKind::MultiGoto => "point",
    }
}

fn escape(text: &str) -> String {
    text.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

fn node_line(tree: &Tree, node: &TreeNode) -> String {
    let attribute = |key: &str, fallback: &str| {
        node.attributes
            .get(key)
            .cloned()
            .unwrap_or_else(|| fallback.to_string())
    };

    let mut tooltip = if node.kind.is_marker() {
        node.hidden_contents
            .iter()
            .map(|line| format!("{}\n", line))
            .collect::<String>()
    } else if node.kind == NodeKind::Text {
        node.raw_label.clone()
    } else {
        String::new()
    };
    let mut border = String::new();
    if let Some(surfaced) = &node.multi_vars {
        border.push_str(" color=red penwidth=5");
        let summary = format_surfaced(node, surfaced, tree.registry(), &PlainDecorator);
        if tooltip.is_empty() {
            tooltip = summary;
        } else {
            tooltip.push('\n');
            tooltip.push_str(&summary);
        }
    }

    let (shape, fillcolor, style) = if node.kind.is_marker() {
        ("box".to_string(), "none".to_string(), "filled".to_string())
    } else {
        (
            attribute("shape", shape_for(node.kind)),
            attribute("fillcolor", "none"),
            attribute("style", "filled"),
        )
    };

    let startln = node
        .source_line
        .map(|line| format!(" startln={}", line))
        .unwrap_or_default();
    format!(
        "\t{} [label=\"{}\" shape={} fillcolor={} style={}{}{} tooltip=\"{}\"]\n",
        node.id,
        escape(&node.plain_label),
        shape,
        fillcolor,
        style,
        startln,
        border,
        escape(&tooltip)
    )
}

fn edge_line(from: &TreeNode, to: NodeId, label: Option<&str>) -> String {
    match label {
        Some(label) => format!("\t{} -> {} [label=\"{}\"]\n", from.id, to, escape(label)),
        None => format!("\t{} -> {}\n", from.id, to),
    }
}

/// Re-emits the visible tree as a digraph: one node line per visited node and
/// one edge line per child, in pre-order. Merge stand-ins become an edge to
/// the real target instead of a node of their own.
pub fn emit_dot(tree: &Tree) -> String {
    let mut out = String::from("digraph {\n");
    let mut stack = vec![tree.root()];
    while let Some(id) = stack.pop() {
        let Some(node) = tree.node(id) else {
            continue;
        };
        out.push_str(&node_line(tree, node));
        let mut pending = Vec::new();
        for child_id in &node.children {
            let Some(child) = tree.node(*child_id) else {
                continue;
            };
            let label = child.branch_label.as_deref();
            if child.kind == NodeKind::MultiGoto {
                if let Some(target) = tree.goto_destination(child) {
                    out.push_str(&edge_line(node, target, label));
                    continue;
                }
            }
            out.push_str(&edge_line(node, *child_id, label));
            pending.push(*child_id);
        }
        stack.extend(pending.into_iter().rev());
    }
    out.push_str("}\n");
    out
}
