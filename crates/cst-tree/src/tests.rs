use cst_core::{NodeId, NodeKind};
use cst_graph::parse_dot_graph;

use crate::tree_test_support::*;
use crate::*;

#[test]
fn build_requires_start_node() {
    let error = build_tree(&graph(vec![node(4, NodeKind::Text, 1, "x")], &[])).expect_err("no start");
    assert_eq!(error.code, "GRAPH_START_MISSING");
}

#[test]
fn build_rejects_graphs_that_still_have_merges() {
    let raw = graph(
        vec![
            start(),
            node(2, NodeKind::Text, 1, "a"),
            node(3, NodeKind::Text, 2, "b"),
            node(4, NodeKind::Text, 3, "c"),
        ],
        &[(0, 2, None), (0, 3, None), (2, 4, None), (3, 4, None)],
    );
    let error = build_tree(&raw).expect_err("merge");
    assert_eq!(error.code, "TREE_MULTIPLE_PARENTS");
}

#[test]
fn build_wires_children_in_edge_order_and_resolves_other_parents() {
    let tree = diverging_scores();
    tree.check_invariants().expect("invariants");

    let choice = tree.node(id_by_line(&tree, 2)).expect("choice");
    assert_eq!(choice.children.len(), 2);
    let first = tree.node(choice.children[0]).expect("first option");
    assert_eq!(first.branch_label.as_deref(), Some("Brave"));
    assert_eq!(first.next, Some(choice.children[1]));

    let shared = tree.node(id_by_line(&tree, 9)).expect("shared");
    assert_eq!(shared.other_parent_lines, vec![4]);
    assert_eq!(shared.other_parents, vec![id_by_line(&tree, 4)]);
}

#[test]
fn find_by_line_falls_back_to_the_next_line() {
    let tree = diverging_scores();
    assert_eq!(tree.find_by_line(9), Some(id_by_line(&tree, 9)));
    assert_eq!(tree.find_by_line(8), Some(id_by_line(&tree, 9)));
    assert_eq!(tree.find_by_line(40), None);
}

#[test]
fn unreachable_nodes_are_dropped() {
    let tree = tree_of(
        vec![start(), node(2, NodeKind::Text, 1, "a"), node(7, NodeKind::Text, 9, "orphan")],
        &[(0, 2, None)],
    );
    assert!(tree.node(NodeId(7)).is_none());
    assert_eq!(tree.len(), 2);
}

#[test]
fn render_draws_guides_and_marks_the_cursor() {
    let mut tree = tree_of(
        vec![
            start(),
            node(2, NodeKind::Choice, 1, "*choice"),
            node(3, NodeKind::Text, 2, "Run"),
            node(4, NodeKind::Text, 4, "Hide"),
        ],
        &[(0, 2, None), (2, 3, Some("Flee")), (2, 4, Some("Stay"))],
    );
    tree.set_cursor(NodeId(4)).expect("cursor");
    let text = render_tree(&tree, &PlainDecorator);
    let lines = text.lines().collect::<Vec<_>>();
    assert_eq!(
        lines,
        vec![
            "START",
            "└── *choice (line 1)",
            "    ├── Flee: 2: Run",
            "    └── [Stay: 4: Hide]",
        ]
    );
}

#[test]
fn display_label_notes_other_links_and_hidden_counts() {
    let mut tree = diverging_scores();
    let shared = id_by_line(&tree, 9);
    let label = display_label(&tree, tree.node(shared).expect("shared"), &PlainDecorator);
    assert_eq!(label, "9: Together again. (Other links: 4)");

    annotate_important(&mut tree);
    let label = display_label(&tree, tree.node(shared).expect("shared"), &PlainDecorator);
    assert!(label.ends_with("1.4: score=5 1.6: score=10"), "{}", label);
}

#[test]
fn emit_dot_walks_the_visible_tree_in_preorder() {
    let mut tree = diverging_scores();
    annotate_important(&mut tree);
    let dot = emit_dot(&tree);
    assert!(dot.starts_with("digraph {\n"));
    assert!(dot.trim_end().ends_with('}'));

    let shared = id_by_line(&tree, 9);
    let brave = id_by_line(&tree, 4);
    // The stand-in under "Brave" is replaced by an edge to the merge node.
    assert!(dot.contains(&format!("\t{} -> {}\n", brave, shared)));
    assert!(dot.contains("color=red penwidth=5"));

    let node_lines = dot.lines().filter(|line| line.contains(" [label=") && !line.contains("->")).count();
    let stand_ins = tree
        .nodes()
        .filter(|node| node.kind == NodeKind::MultiGoto)
        .count();
    assert_eq!(node_lines, tree.preorder().len() - stand_ins);

    let reparsed = parse_dot_graph(&dot).expect("emitted dot parses back");
    assert!(reparsed.node(shared).is_some());
}

#[test]
fn emit_dot_describes_markers_with_their_hidden_contents() {
    let mut tree = tree_of(
        vec![
            start(),
            node(2, NodeKind::Text, 1, "one"),
            node(3, NodeKind::Text, 2, "two"),
            end(1),
        ],
        &[(0, 2, None), (2, 3, None), (3, 1, None)],
    );
    let marker = hide(&mut tree, NodeId(2)).expect("hide");
    let dot = emit_dot(&tree);
    let line = dot
        .lines()
        .find(|line| line.starts_with(&format!("\t{} [", marker)))
        .expect("marker line");
    assert!(line.contains("shape=box"));
    assert!(line.contains("tooltip=\"one\\ntwo\\n\""));
}

/// Choice whose first option reaches "Welcome" under a label and whose second
/// option jumps back to it. The node after "Welcome" sits on the next line.
fn shortcut_to_welcome() -> Tree {
    tree_of(
        vec![
            start(),
            node(5, NodeKind::Choice, 1, "*choice"),
            node(2, NodeKind::Label, 2, "intro"),
            node(3, NodeKind::Text, 3, "Welcome"),
            node(4, NodeKind::Var, 4, "CREATE hp 1"),
            node(6, NodeKind::Goto, 6, "*goto intro"),
        ],
        &[
            (0, 5, None),
            (5, 2, Some("Walk")),
            (2, 3, None),
            (3, 4, None),
            (5, 6, Some("Skip")),
            (6, 3, None),
        ],
    )
}

#[test]
fn emit_dot_follows_a_squashed_merge_target_to_its_label() {
    let mut tree = shortcut_to_welcome();
    let kinds = [NodeKind::Text].into_iter().collect();
    let report = squash_all(&mut tree, &kinds);
    assert_eq!(report.applied, 1);
    assert!(tree.node(NodeId(3)).is_none());

    let dot = emit_dot(&tree);
    assert!(dot.contains("\t6 -> 2\n"), "{}", dot);
    assert!(!dot.contains("\t6 -> 4\n"), "{}", dot);
}

#[test]
fn emit_dot_follows_a_hidden_merge_target_to_its_marker() {
    let mut tree = shortcut_to_welcome();
    let marker = hide(&mut tree, NodeId(3)).expect("hide welcome");
    assert!(tree.node(NodeId(3)).is_none());
    assert_eq!(tree.absorbed_by(NodeId(3)), Some(marker));

    let dot = emit_dot(&tree);
    assert!(dot.contains(&format!("\t6 -> {}\n", marker)), "{}", dot);
}

#[test]
fn add_child_and_delete_edit_the_tree() {
    let mut tree = diverging_scores();
    let parent = id_by_line(&tree, 10);
    let added = add_child(&mut tree, parent, "Epilogue").expect("add");
    let parent_node = tree.node(parent).expect("parent");
    assert_eq!(parent_node.children.last(), Some(&added));
    assert_eq!(tree.node(added).map(|node| node.kind), Some(NodeKind::Text));
    tree.check_invariants().expect("after add");

    tree.set_cursor(added).expect("cursor");
    let shared = id_by_line(&tree, 9);
    let removed = delete(&mut tree, shared).expect("delete");
    assert_eq!(removed[0].id, shared);
    assert!(removed.iter().any(|node| node.id == added));
    assert_eq!(tree.cursor(), id_by_line(&tree, 6));
    assert!(tree.node(added).is_none());
    tree.check_invariants().expect("after delete");

    let error = delete(&mut tree, cst_core::START_NODE).expect_err("root");
    assert_eq!(error.code, "EDIT_DELETE_ROOT");
}

#[test]
fn tree_nodes_serialize_for_dumps() {
    let tree = diverging_scores();
    let shared = tree.node(id_by_line(&tree, 9)).expect("shared");
    let json = serde_json::to_value(shared).expect("serialize");
    assert_eq!(json["kind"], "text");
    assert_eq!(json["variableTable"]["score"]["1.4"], 5);
}
