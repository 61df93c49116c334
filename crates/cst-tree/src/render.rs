use cst_core::{NodeKind, START_NODE};

use crate::display::{format_surfaced, LabelDecorator};
use crate::node::TreeNode;
use crate::tree::Tree;

/// One node's label the way the browser shows it: branch label, line number,
/// kind-specific text, other-links note and surfaced variables.
pub fn display_label(tree: &Tree, node: &TreeNode, decorator: &dyn LabelDecorator) -> String {
    let mut out = String::new();
    if let Some(branch) = &node.branch_label {
        out.push_str(&decorator.branch(branch));
    }

    let line = node.source_line.filter(|line| *line >= 0 && node.id != START_NODE);
    match node.kind {
        NodeKind::Goto | NodeKind::Choice => {
            out.push_str(&decorator.label(node.kind, &node.plain_label));
            if let Some(line) = line {
                out.push_str(&decorator.note(&format!(" (line {})", line)));
            }
        }
        NodeKind::HideMarker if !node.hidden_contents.is_empty() => {
            out.push_str(&decorator.label(node.kind, &node.plain_label));
            out.push_str(&decorator.note(&format!(" ({} hidden)", node.hidden_contents.len())));
        }
        _ => {
            if let Some(line) = line {
                out.push_str(&decorator.line_number(line));
            }
            out.push_str(&decorator.label(node.kind, &node.plain_label));
        }
    }

    if node.is_merge_point() {
        let lines = node
            .other_parent_lines
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(" ");
        out.push_str(&decorator.note(&format!(" (Other links: {})", lines)));
    }
    if let Some(surfaced) = &node.multi_vars {
        let vars = format_surfaced(node, surfaced, tree.registry(), decorator);
        if !vars.is_empty() {
            out.push(' ');
            out.push_str(&vars);
        }
    }
    out
}

/// Whole visible tree with guide lines, one node per line, the cursor node
/// passed through `LabelDecorator::current`.
pub fn render_tree(tree: &Tree, decorator: &dyn LabelDecorator) -> String {
    let mut out = String::new();
    let Some(root) = tree.node(tree.root()) else {
        return out;
    };
    push_line(&mut out, tree, root, "", decorator);
    render_children(&mut out, tree, root, "", decorator);
    out
}

fn push_line(
    out: &mut String,
    tree: &Tree,
    node: &TreeNode,
    prefix: &str,
    decorator: &dyn LabelDecorator,
) {
    let label = display_label(tree, node, decorator);
    let label = if node.id == tree.cursor() {
        decorator.current(&label)
    } else {
        label
    };
    out.push_str(prefix);
    out.push_str(&label);
    out.push('\n');
}

fn render_children(
    out: &mut String,
    tree: &Tree,
    node: &TreeNode,
    indent: &str,
    decorator: &dyn LabelDecorator,
) {
    let count = node.children.len();
    for (index, child) in node.children.iter().enumerate() {
        let Some(child) = tree.node(*child) else {
            continue;
        };
        let last = index + 1 == count;
        let branch = if last { "└── " } else { "├── " };
        push_line(out, tree, child, &format!("{}{}", indent, branch), decorator);
        let nested = format!("{}{}", indent, if last { "    " } else { "│   " });
        render_children(out, tree, child, &nested, decorator);
    }
}
