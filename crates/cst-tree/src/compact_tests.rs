use std::collections::BTreeSet;

use cst_core::{NodeId, NodeKind};

use crate::tree_test_support::*;
use crate::*;

fn labelled_story() -> Tree {
    tree_of(
        vec![
            start(),
            node(2, NodeKind::Label, 1, "intro"),
            node(3, NodeKind::Text, 2, "Hello there."),
            node(4, NodeKind::Goto, 3, "*goto next"),
            node(5, NodeKind::Label, 7, "next"),
            node(6, NodeKind::Var, 8, "CREATE hp 1"),
            end(1),
        ],
        &[
            (0, 2, None),
            (2, 3, None),
            (3, 4, None),
            (4, 5, None),
            (5, 6, None),
            (6, 1, None),
        ],
    )
}

fn quiet_chain() -> Tree {
    analyzed(
        vec![
            start(),
            node(2, NodeKind::Text, 1, "one"),
            node(3, NodeKind::Text, 2, "two"),
            node(4, NodeKind::Text, 3, "three"),
            end(1),
        ],
        &[(0, 2, None), (2, 3, None), (3, 4, None), (4, 1, None)],
    )
}

fn lines_with_audit(tree: &Tree) -> BTreeSet<i64> {
    fn collect(node: &TreeNode, out: &mut BTreeSet<i64>) {
        out.extend(node.source_line);
        for squashed in &node.squashed {
            collect(squashed, out);
        }
    }
    let mut out = BTreeSet::new();
    for id in tree.preorder() {
        collect(tree.node(id).expect("visible"), &mut out);
    }
    out
}

fn visible_labels(tree: &Tree) -> Vec<String> {
    tree.preorder()
        .into_iter()
        .filter_map(|id| tree.node(id))
        .filter(|node| !node.kind.is_marker())
        .map(|node| node.plain_label.clone())
        .collect()
}

fn hidden_labels(tree: &Tree) -> Vec<String> {
    tree.preorder()
        .into_iter()
        .filter_map(|id| tree.node(id))
        .flat_map(|node| node.hidden_contents.clone())
        .collect()
}

#[test]
fn squash_text_appends_to_label_and_splices_children() {
    let mut tree = labelled_story();
    let before = lines_with_audit(&tree);

    squash(&mut tree, NodeId(3)).expect("text squash");
    let label = tree.node(NodeId(2)).expect("label");
    assert_eq!(label.plain_label, "intro: Hello there.");
    assert_eq!(label.children, vec![NodeId(4)]);
    assert_eq!(label.squashed.len(), 1);
    assert_eq!(tree.node(NodeId(4)).and_then(|node| node.parent), Some(NodeId(2)));

    squash(&mut tree, NodeId(4)).expect("goto squash");
    let label = tree.node(NodeId(2)).expect("label");
    assert_eq!(label.plain_label, "intro: Hello there.");
    assert_eq!(label.children, vec![NodeId(5)]);

    tree.check_invariants().expect("invariants hold");
    assert_eq!(lines_with_audit(&tree), before);
}

#[test]
fn squash_rejects_ineligible_nodes() {
    let mut tree = labelled_story();
    let error = squash(&mut tree, NodeId(6)).expect_err("var");
    assert_eq!(error.code, "COMPACT_SQUASH_KIND");
    assert_eq!(error.kind, cst_core::ErrorKind::AnalysisInconsistency);

    let error = squash(&mut tree, START_ID).expect_err("root");
    assert_eq!(error.code, "COMPACT_SQUASH_ROOT");

    let mut tree = quiet_chain();
    let error = squash(&mut tree, NodeId(3)).expect_err("text under text");
    assert_eq!(error.code, "COMPACT_SQUASH_PARENT");
}

const START_ID: NodeId = cst_core::START_NODE;

#[test]
fn squash_all_squashes_gotos_then_text_under_labels() {
    let mut tree = labelled_story();
    let kinds = [NodeKind::Goto, NodeKind::Text].into_iter().collect();
    let report = squash_all(&mut tree, &kinds);
    assert_eq!(report.applied, 2);
    assert_eq!(tree.node(NodeId(2)).map(|node| node.children.clone()), Some(vec![NodeId(5)]));
    assert!(tree.node(NodeId(3)).is_none());
    assert!(tree.node(NodeId(4)).is_none());
}

#[test]
fn squash_all_keeps_gotos_under_choices() {
    let mut tree = tree_of(
        vec![
            start(),
            node(2, NodeKind::Choice, 1, "*choice"),
            node(3, NodeKind::Goto, 2, "*goto a"),
            node(4, NodeKind::Text, 3, "b"),
            node(5, NodeKind::Label, 5, "a"),
        ],
        &[(0, 2, None), (2, 3, Some("A")), (2, 4, Some("B")), (3, 5, None)],
    );
    let kinds = [NodeKind::Goto].into_iter().collect();
    let report = squash_all(&mut tree, &kinds);
    assert_eq!(report.applied, 0);
    assert!(tree.node(NodeId(3)).is_some());
}

#[test]
fn hide_replaces_node_and_child_with_a_marker() {
    let mut tree = quiet_chain();
    let marker = hide(&mut tree, NodeId(2)).expect("hide one");
    let node = tree.node(marker).expect("marker");
    assert_eq!(node.kind, NodeKind::HideMarker);
    assert_eq!(node.plain_label, MARKER_LABEL);
    assert_eq!(node.hidden_contents, vec!["one", "two"]);
    assert_eq!(node.children, vec![NodeId(4)]);
    assert_eq!(tree.node(START_ID).map(|root| root.children.clone()), Some(vec![marker]));

    // Parent marker absorbs the node below it, ahead of what it already holds.
    let again = hide(&mut tree, NodeId(4)).expect("hide three");
    assert_eq!(again, marker);
    let node = tree.node(marker).expect("marker");
    assert_eq!(node.hidden_contents, vec!["three", "one", "two"]);
    assert_eq!(node.children, vec![NodeId(1)]);

    // A marker with one child flattens it inward.
    let flat = hide(&mut tree, marker).expect("flatten");
    assert_eq!(flat, marker);
    let node = tree.node(marker).expect("marker");
    assert_eq!(node.hidden_contents, vec!["three", "one", "two", "END"]);
    assert!(node.children.is_empty());
    tree.check_invariants().expect("invariants hold");
}

#[test]
fn hide_into_child_marker_prepends_and_keeps_branch_label() {
    let mut tree = tree_of(
        vec![
            start(),
            node(2, NodeKind::Choice, 1, "*choice"),
            node(3, NodeKind::Text, 2, "x"),
            node(4, NodeKind::Text, 3, "y"),
            node(5, NodeKind::Text, 4, "z"),
            node(6, NodeKind::Text, 6, "other"),
        ],
        &[
            (0, 2, None),
            (2, 3, Some("Left")),
            (3, 4, None),
            (4, 5, None),
            (2, 6, Some("Right")),
        ],
    );
    let marker = hide(&mut tree, NodeId(4)).expect("inner");
    let merged = hide(&mut tree, NodeId(3)).expect("outer");
    assert_eq!(merged, marker);

    let node = tree.node(marker).expect("marker");
    assert_eq!(node.hidden_contents, vec!["x", "y", "z"]);
    assert_eq!(node.branch_label.as_deref(), Some("Left"));
    let choice = tree.node(NodeId(2)).expect("choice");
    assert_eq!(choice.children, vec![marker, NodeId(6)]);
    assert_eq!(node.next, Some(NodeId(6)));
    assert_eq!(tree.node(NodeId(6)).and_then(|other| other.prev), Some(marker));

    let error = hide(&mut tree, NodeId(2)).expect_err("two children");
    assert_eq!(error.code, "COMPACT_HIDE_AMBIGUOUS");
    let error = hide(&mut tree, START_ID).expect_err("root");
    assert_eq!(error.code, "COMPACT_HIDE_ROOT");
}

#[test]
fn hide_all_collapses_quiet_runs_into_one_marker() {
    let mut tree = quiet_chain();
    let before = visible_labels(&tree);

    let report = hide_all(&mut tree);
    assert_eq!(report.markers.len(), 1);
    let marker = tree.node(report.markers[0]).expect("marker");
    assert_eq!(marker.hidden_contents, vec!["one", "two", "three", "END"]);
    assert_eq!(tree.node(START_ID).map(|root| root.children.len()), Some(1));

    let mut after = visible_labels(&tree);
    after.extend(hidden_labels(&tree));
    assert_eq!(after, before);
    tree.check_invariants().expect("invariants hold");
}

#[test]
fn hide_all_leaves_divergent_nodes_visible() {
    let mut tree = diverging_scores();
    let shared = id_by_line(&tree, 9);
    let mut before = visible_labels(&tree);

    hide_all(&mut tree);
    assert!(tree.preorder().contains(&shared));
    assert_eq!(tree.node(shared).map(|node| node.kind), Some(NodeKind::Text));

    let mut after = visible_labels(&tree);
    after.extend(hidden_labels(&tree));
    before.sort();
    after.sort();
    assert_eq!(after, before);
    tree.check_invariants().expect("invariants hold");
}

#[test]
fn open_close_twice_restores_the_same_children() {
    let mut tree = labelled_story();
    let original = tree.node(NodeId(2)).expect("label").children.clone();
    tree.set_cursor(NodeId(4)).expect("cursor");

    open_close(&mut tree, NodeId(2)).expect("close");
    let closed = tree.node(NodeId(2)).expect("label");
    assert!(closed.closed);
    assert_eq!(closed.true_children, original);
    let marker = closed.children[0];
    assert_eq!(tree.node(marker).map(|node| node.kind), Some(NodeKind::CloseMarker));
    assert_eq!(tree.cursor(), NodeId(2));
    tree.check_invariants().expect("closed invariants");

    open_close(&mut tree, NodeId(2)).expect("open");
    let opened = tree.node(NodeId(2)).expect("label");
    assert!(!opened.closed);
    assert_eq!(opened.children, original);
    assert!(opened.true_children.is_empty());
    assert!(tree.node(marker).is_none());
    tree.check_invariants().expect("open invariants");

    let leaf = NodeId(1);
    open_close(&mut tree, leaf).expect("leaf is a no-op");
    assert!(!tree.node(leaf).expect("end").closed);
}

#[test]
fn closed_nodes_refuse_compaction() {
    let mut tree = quiet_chain();
    open_close(&mut tree, NodeId(3)).expect("close");
    let error = hide(&mut tree, NodeId(2)).expect_err("closed child");
    assert_eq!(error.code, "COMPACT_NODE_CLOSED");
}
