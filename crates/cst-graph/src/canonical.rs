use std::collections::BTreeSet;

use petgraph::graphmap::DiGraphMap;
use petgraph::visit::{depth_first_search, Control, DfsEvent};
use tracing::{debug, info, warn};

use cst_core::{CsTreeError, FlowGraph, GraphEdge, GraphNode, NodeId, NodeKind, START_NODE};

#[derive(Debug, Clone, PartialEq)]
pub struct RemovedCycle {
    pub from: NodeId,
    pub to: NodeId,
    pub stand_in: NodeId,
}

/// Which selection rule kept the surviving parent of a merge node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentRule {
    /// Two parents, one of them a conditional: the conditional stays.
    Conditional,
    /// Exactly one parent is not a script goto: that one stays.
    SoleStatement,
    /// Fallback: the numerically largest id stays. Flagged for manual review.
    LargestId,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeResolution {
    pub node: NodeId,
    pub kept: NodeId,
    pub demoted: Vec<NodeId>,
    pub stand_ins: Vec<NodeId>,
    pub rule: ParentRule,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CanonicalReport {
    pub removed_cycles: Vec<RemovedCycle>,
    pub merges: Vec<MergeResolution>,
}

impl CanonicalReport {
    /// Merge nodes whose parent was picked by the largest-id fallback.
    pub fn fallback_nodes(&self) -> Vec<NodeId> {
        self.merges
            .iter()
            .filter(|merge| merge.rule == ParentRule::LargestId)
            .map(|merge| merge.node)
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct CanonicalGraph {
    pub graph: FlowGraph,
    pub report: CanonicalReport,
}

fn require_start(graph: &FlowGraph) -> Result<(), CsTreeError> {
    if graph.node(START_NODE).is_none() {
        return Err(CsTreeError::malformed(
            "GRAPH_START_MISSING",
            "Graph has no start node with id 0.",
        ));
    }
    Ok(())
}

/// Turns the raw graph into an acyclic graph where every node keeps at most one
/// real predecessor. Removed edges survive as goto stand-in nodes.
pub fn canonicalize(mut graph: FlowGraph) -> Result<CanonicalGraph, CsTreeError> {
    require_start(&graph)?;
    let removed_cycles = remove_cycles(&mut graph)?;
    let merges = resolve_single_parents(&mut graph)?;
    Ok(CanonicalGraph {
        graph,
        report: CanonicalReport {
            removed_cycles,
            merges,
        },
    })
}

fn back_edge_from_start(graph: &FlowGraph) -> Option<(NodeId, NodeId)> {
    let mut map = DiGraphMap::<NodeId, ()>::new();
    for id in graph.nodes.keys() {
        map.add_node(*id);
    }
    for edge in &graph.edges {
        map.add_edge(edge.from, edge.to, ());
    }

    depth_first_search(&map, Some(START_NODE), |event| {
        if let DfsEvent::BackEdge(from, to) = event {
            return Control::Break((from, to));
        }
        Control::Continue
    })
    .break_value()
}

/// Compact description of where a goto stand-in jumps: the label plus line for
/// script labels, the bare line otherwise, the label alone for start and end.
fn jump_summary(graph: &FlowGraph, target: NodeId) -> String {
    let Some(node) = graph.node(target) else {
        return target.to_string();
    };
    let label = node.label.clone().unwrap_or_default();
    let line = node
        .source_line
        .map(|line| line.to_string())
        .unwrap_or_default();
    if target.0 <= 1 {
        label
    } else if node.kind == NodeKind::Label {
        format!("{} ({})", label, line)
    } else {
        line
    }
}

fn line_text(graph: &FlowGraph, id: NodeId) -> String {
    graph
        .node(id)
        .and_then(|node| node.source_line)
        .map(|line| line.to_string())
        .unwrap_or_else(|| "?".to_string())
}

fn stand_in(graph: &FlowGraph, id: NodeId, kind: NodeKind, target: NodeId, label: String) -> GraphNode {
    let mut node = GraphNode::new(id, kind);
    node.label = Some(label);
    node.old_goto = graph.node(target).and_then(|target| target.source_line);
    node.goto_target = Some(target);
    node.loop_goto = kind == NodeKind::LoopGoto;
    node
}

/// Repeatedly finds a cycle reachable from the start node and replaces its
/// closing back edge `u -> v` with `u -> LoopGoto(v)`.
pub fn remove_cycles(graph: &mut FlowGraph) -> Result<Vec<RemovedCycle>, CsTreeError> {
    require_start(graph)?;
    let budget = graph.edges.len() + 1;
    let mut removed = Vec::new();

    while let Some((from, to)) = back_edge_from_start(graph) {
        if removed.len() >= budget {
            return Err(CsTreeError::malformed(
                "GRAPH_CYCLE_UNTERMINATED",
                format!("Cycle removal did not terminate after {} edges.", budget),
            )
            .at_node(from));
        }

        let index = graph
            .edges
            .iter()
            .position(|edge| edge.from == from && edge.to == to)
            .expect("back edge should exist in the edge list");
        let id = graph.next_id();
        let label = format!(
            "(cycle) {}: Goto {}",
            line_text(graph, from),
            jump_summary(graph, to)
        );
        let node = stand_in(graph, id, NodeKind::LoopGoto, to, label);
        let edge_label = graph.edges[index].label.clone();
        graph.add_node(node);
        graph.edges[index] = GraphEdge::new(from, id, edge_label);
        debug!(%from, %to, stand_in = %id, "replaced back edge with loop goto");
        removed.push(RemovedCycle {
            from,
            to,
            stand_in: id,
        });
    }

    if !removed.is_empty() {
        info!(count = removed.len(), "removed cycles from flow graph");
    }
    Ok(removed)
}

fn kind_of(graph: &FlowGraph, id: NodeId) -> Option<NodeKind> {
    graph.node(id).map(|node| node.kind)
}

fn choose_parent(graph: &FlowGraph, preds: &[NodeId]) -> (NodeId, ParentRule) {
    if preds.len() == 2 {
        if let Some(cond) = preds
            .iter()
            .find(|pred| kind_of(graph, **pred) == Some(NodeKind::Cond))
        {
            return (*cond, ParentRule::Conditional);
        }
    }

    let statements = preds
        .iter()
        .filter(|pred| kind_of(graph, **pred) != Some(NodeKind::Goto))
        .collect::<Vec<_>>();
    if statements.len() == 1 {
        return (*statements[0], ParentRule::SoleStatement);
    }

    let largest = preds
        .iter()
        .copied()
        .max()
        .expect("merge nodes have at least two predecessors");
    (largest, ParentRule::LargestId)
}

/// Keeps exactly one incoming edge per node; every other incoming edge is
/// redirected to a fresh MultiGoto stand-in that remembers the real target.
pub fn resolve_single_parents(graph: &mut FlowGraph) -> Result<Vec<MergeResolution>, CsTreeError> {
    require_start(graph)?;
    let mut merges = Vec::new();
    let targets = graph.nodes.keys().copied().collect::<Vec<_>>();

    for target in targets {
        let incoming = graph
            .edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| edge.to == target)
            .map(|(index, _)| index)
            .collect::<Vec<_>>();
        if incoming.len() < 2 {
            continue;
        }

        let preds = incoming
            .iter()
            .map(|index| graph.edges[*index].from)
            .collect::<Vec<_>>();
        let (kept, rule) = choose_parent(graph, &preds);
        let kept_index = incoming[preds
            .iter()
            .position(|pred| *pred == kept)
            .expect("kept parent is one of the predecessors")];
        if rule == ParentRule::LargestId {
            warn!(
                node = %target,
                kept = %kept,
                "single-parent fallback kept the largest id; review this merge"
            );
        }

        let demoted_indices = incoming
            .iter()
            .copied()
            .filter(|index| *index != kept_index)
            .collect::<BTreeSet<_>>();
        let mut demoted = Vec::new();
        let mut stand_ins = Vec::new();
        let mut other_lines = Vec::new();

        for index in demoted_indices {
            let pred = graph.edges[index].from;
            let id = graph.next_id();
            let label = format!("{}: Goto {}", line_text(graph, pred), jump_summary(graph, target));
            let node = stand_in(graph, id, NodeKind::MultiGoto, target, label);
            match graph.node(pred).and_then(|node| node.source_line) {
                Some(line) => other_lines.push(line),
                None => debug!(pred = %pred, "demoted parent has no source line"),
            }
            let edge_label = graph.edges[index].label.clone();
            graph.add_node(node);
            graph.edges[index] = GraphEdge::new(pred, id, edge_label);
            demoted.push(pred);
            stand_ins.push(id);
        }

        if let Some(node) = graph.node_mut(target) {
            node.other_parent_lines.extend(other_lines);
        }
        debug!(node = %target, kept = %kept, demoted = demoted.len(), ?rule, "resolved merge node");
        merges.push(MergeResolution {
            node: target,
            kept,
            demoted,
            stand_ins,
            rule,
        });
    }

    Ok(merges)
}
