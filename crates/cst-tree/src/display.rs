use cst_core::{NodeId, NodeKind, PathId, VarValue};
use cst_expr::referenced_names;

use crate::node::{Surfaced, TreeNode, VarForm};
use crate::tree::{Tree, VariableRegistry};

/// Styling hooks for text output. Every method defaults to plain text.
pub trait LabelDecorator {
    fn line_number(&self, line: i64) -> String {
        format!("{}: ", line)
    }

    fn label(&self, _kind: NodeKind, text: &str) -> String {
        text.to_string()
    }

    fn branch(&self, text: &str) -> String {
        format!("{}: ", text)
    }

    fn variable(&self, name: &str, _slot: usize) -> String {
        name.to_string()
    }

    fn value(&self, text: &str) -> String {
        text.to_string()
    }

    fn path(&self, text: &str) -> String {
        text.to_string()
    }

    fn note(&self, text: &str) -> String {
        text.to_string()
    }

    fn current(&self, text: &str) -> String {
        format!("[{}]", text)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PlainDecorator;

impl LabelDecorator for PlainDecorator {}

fn distinct_values(values: impl Iterator<Item = VarValue>) -> Vec<VarValue> {
    let mut out: Vec<VarValue> = Vec::new();
    for value in values {
        if !out.contains(&value) {
            out.push(value);
        }
    }
    out
}

/// Two or more entries with differing values. Differing paths alone do not count.
pub fn multi_valued(node: &TreeNode, name: &str) -> bool {
    node.variable_table
        .get(name)
        .map(|paths| distinct_values(paths.values().cloned()).len() > 1)
        .unwrap_or(false)
}

pub fn has_multi_valued(node: &TreeNode) -> bool {
    node.variable_table
        .keys()
        .any(|name| multi_valued(node, name))
}

fn registry_order(registry: &VariableRegistry, mut names: Vec<String>) -> Vec<String> {
    names.sort_by_key(|name| registry.slot(name).unwrap_or(usize::MAX));
    names
}

/// Variables worth showing on a node: referenced and multi-valued for
/// assignments and conditionals, every multi-valued one at merge points.
pub fn surfaced_variables(tree: &Tree, id: NodeId) -> Vec<String> {
    let Some(node) = tree.node(id) else {
        return Vec::new();
    };
    let mut names = Vec::new();
    if matches!(node.kind, NodeKind::Var | NodeKind::Cond) {
        for name in referenced_names(&node.raw_label) {
            if multi_valued(node, &name) && !names.contains(&name) {
                names.push(name);
            }
        }
    }
    if node.is_merge_point() {
        for name in node.variable_table.keys() {
            if multi_valued(node, name) && !names.contains(name) {
                names.push(name.clone());
            }
        }
    }
    registry_order(tree.registry(), names)
}

fn slot_of(registry: &VariableRegistry, name: &str) -> usize {
    registry.slot(name).unwrap_or(0)
}

/// `hp = 5,10 gold = 1,2`: each variable once, its distinct values joined.
pub fn short_form(
    node: &TreeNode,
    names: &[String],
    registry: &VariableRegistry,
    decorator: &dyn LabelDecorator,
) -> String {
    names
        .iter()
        .filter_map(|name| {
            let paths = node.variable_table.get(name)?;
            let values = distinct_values(paths.values().cloned())
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(",");
            Some(format!(
                "{} = {}",
                decorator.variable(name, slot_of(registry, name)),
                decorator.value(&values)
            ))
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// `3.7: hp=5 gold=1 3.9: hp=10`: grouped by path, paths ordered by the sum of
/// their components. Equal sums fall back to path order.
pub fn long_form(
    node: &TreeNode,
    names: &[String],
    registry: &VariableRegistry,
    decorator: &dyn LabelDecorator,
) -> String {
    let mut rows: Vec<(PathId, &str, String)> = Vec::new();
    for name in names {
        if let Some(paths) = node.variable_table.get(name) {
            for (path, value) in paths {
                rows.push((path.clone(), name.as_str(), value.to_string()));
            }
        }
    }
    rows.sort_by(|(left, _, _), (right, _, _)| {
        left.digit_sum()
            .cmp(&right.digit_sum())
            .then_with(|| left.cmp(right))
    });

    let mut out = Vec::new();
    let mut current: Option<&PathId> = None;
    for (path, name, value) in &rows {
        if current != Some(path) {
            out.push(format!("{}:", decorator.path(path.as_str())));
            current = Some(path);
        }
        out.push(format!(
            "{}={}",
            decorator.variable(name, slot_of(registry, name)),
            decorator.value(value)
        ));
    }
    out.join(" ")
}

pub fn format_surfaced(
    node: &TreeNode,
    surfaced: &Surfaced,
    registry: &VariableRegistry,
    decorator: &dyn LabelDecorator,
) -> String {
    match surfaced.form {
        VarForm::Short => short_form(node, &surfaced.names, registry, decorator),
        VarForm::Long => long_form(node, &surfaced.names, registry, decorator),
    }
}

/// Attaches a surfaced-variable summary to every node that has one: short form
/// on conditionals, long form on assignments and merge points. Returns how many
/// nodes were annotated.
pub fn annotate_important(tree: &mut Tree) -> usize {
    let ids = tree.nodes.keys().copied().collect::<Vec<_>>();
    let mut annotated = 0;
    for id in ids {
        let names = surfaced_variables(tree, id);
        let Some(node) = tree.nodes.get_mut(&id) else {
            continue;
        };
        if names.is_empty() {
            node.multi_vars = None;
            continue;
        }
        let form = if node.kind == NodeKind::Cond {
            VarForm::Short
        } else {
            VarForm::Long
        };
        node.multi_vars = Some(Surfaced { names, form });
        annotated += 1;
    }
    annotated
}

/// Every variable on the node in long form, for full dumps.
pub fn all_variables(tree: &Tree, id: NodeId, decorator: &dyn LabelDecorator) -> String {
    let Some(node) = tree.node(id) else {
        return String::new();
    };
    let names = registry_order(
        tree.registry(),
        node.variable_table.keys().cloned().collect(),
    );
    long_form(node, &names, tree.registry(), decorator)
}
