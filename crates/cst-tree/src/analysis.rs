use tracing::{debug, info, warn};

use cst_core::{CsTreeError, NodeId, NodeKind, PathId, VarTable, VarValue};
use cst_expr::{resolve_assignment, resolve_condition, tokenize, Bindings, Command, Evaluator};

use crate::tree::Tree;

/// Outcome of one analysis run. Failures stop the history they occur on;
/// sibling histories carry on.
#[derive(Debug, Clone, Default)]
pub struct AnalysisReport {
    pub visits: usize,
    pub failures: Vec<CsTreeError>,
}

impl AnalysisReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Clears every variable table and the registry, then walks the tree from the
/// root threading a per-history environment.
pub fn analyze(tree: &mut Tree, evaluator: &dyn Evaluator) -> AnalysisReport {
    for node in tree.nodes.values_mut() {
        node.variable_table.clear();
    }
    tree.registry.clear();

    let mut analysis = Analysis {
        tree,
        evaluator,
        report: AnalysisReport::default(),
    };
    let root = analysis.tree.root;
    analysis.visit(root, PathId::root(), VarTable::new());

    let report = analysis.report;
    info!(
        visits = report.visits,
        failures = report.failures.len(),
        "variable flow analysis finished"
    );
    report
}

struct Analysis<'a> {
    tree: &'a mut Tree,
    evaluator: &'a dyn Evaluator,
    report: AnalysisReport,
}

/// Values visible on `path`: the entry recorded for that path, else the latest
/// recorded one.
fn bindings_at(env: &VarTable, path: &PathId) -> Bindings {
    env.iter()
        .filter_map(|(name, paths)| {
            paths
                .get(path)
                .or_else(|| paths.values().next_back())
                .map(|value| (name.clone(), value.clone()))
        })
        .collect()
}

fn rekey(table: &mut VarTable, from: &PathId, to: &PathId) {
    for paths in table.values_mut() {
        if let Some(value) = paths.remove(from) {
            paths.insert(to.clone(), value);
        }
    }
}

fn merge_into(table: &mut VarTable, env: &VarTable, node: NodeId) {
    for (name, paths) in env {
        let entries = table.entry(name.clone()).or_default();
        for (path, value) in paths {
            match entries.get(path) {
                None => {
                    entries.insert(path.clone(), value.clone());
                }
                Some(existing) if existing == value => {}
                Some(existing) => debug!(
                    node = %node,
                    variable = %name,
                    %path,
                    kept = %existing,
                    "path already recorded with another value"
                ),
            }
        }
    }
}

impl Analysis<'_> {
    fn fail(&mut self, id: NodeId, error: CsTreeError) {
        let line = self.tree.node(id).and_then(|node| node.source_line);
        let error = error.at_node(id).at_line(line);
        warn!(
            code = %error.code,
            location = error.location().unwrap_or_default(),
            "analysis stopped on one history"
        );
        self.report.failures.push(error);
    }

    /// Children to descend into after stand-in substitution. Loop stand-ins
    /// are never followed.
    fn effective_children(&self, id: NodeId) -> Vec<(NodeId, Option<String>)> {
        let Some(node) = self.tree.node(id) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for child_id in node.children.iter().chain(node.true_children.iter()) {
            let Some(child) = self.tree.node(*child_id) else {
                continue;
            };
            match child.kind {
                NodeKind::LoopGoto | NodeKind::CloseMarker => {}
                NodeKind::MultiGoto => match self.tree.goto_destination(child) {
                    Some(target) => out.push((target, child.branch_label.clone())),
                    None => warn!(stand_in = %child.id, "goto stand-in target not found"),
                },
                _ => out.push((*child_id, child.branch_label.clone())),
            }
        }
        out
    }

    fn visit(&mut self, id: NodeId, path: PathId, mut env: VarTable) {
        self.report.visits += 1;
        let Some(node) = self.tree.nodes.get_mut(&id) else {
            return;
        };
        merge_into(&mut node.variable_table, &env, id);
        let kind = node.kind;
        let line = node.source_line;
        let statement = node.raw_label.clone();

        match kind {
            NodeKind::Var => {
                let extended = match line {
                    Some(line) => path.extended(line),
                    None => path.clone(),
                };
                if let Some(node) = self.tree.nodes.get_mut(&id) {
                    rekey(&mut node.variable_table, &path, &extended);
                }
                rekey(&mut env, &path, &extended);
                if let Err(error) = self.apply_var(id, &statement, &extended, &mut env) {
                    self.fail(id, error);
                    return;
                }
                self.visit_children(id, &extended, &env);
            }
            NodeKind::Cond => self.visit_branch(id, &statement, &path, &env),
            _ => self.visit_children(id, &path, &env),
        }
    }

    fn visit_children(&mut self, id: NodeId, path: &PathId, env: &VarTable) {
        for (child, _) in self.effective_children(id) {
            self.visit(child, path.clone(), env.clone());
        }
    }

    fn visit_branch(&mut self, id: NodeId, statement: &str, path: &PathId, env: &VarTable) {
        let children = self.effective_children(id);
        let branch = |wanted: &str| {
            children
                .iter()
                .find(|(_, label)| label.as_deref() == Some(wanted))
                .map(|(child, _)| *child)
        };
        let (Some(yes), Some(no)) = (branch("Y"), branch("N")) else {
            self.fail(
                id,
                CsTreeError::inconsistency(
                    "ANALYSIS_COND_BRANCH",
                    "Conditional needs both a Y and an N child.",
                )
                .with_statement(statement),
            );
            return;
        };

        match resolve_condition(statement, &bindings_at(env, path), self.evaluator) {
            Ok(result) => {
                debug!(node = %id, result, "conditional evaluated");
                let chosen = if result { yes } else { no };
                self.visit(chosen, path.clone(), env.clone());
            }
            Err(error) => self.fail(id, error),
        }
    }

    fn apply_var(
        &mut self,
        id: NodeId,
        statement: &str,
        path: &PathId,
        env: &mut VarTable,
    ) -> Result<(), CsTreeError> {
        let parsed = tokenize(statement)?;
        let Some(target) = parsed.target.clone() else {
            return Err(CsTreeError::malformed(
                "ANALYSIS_VAR_TARGET",
                "Variable statement names no variable.",
            )
            .with_statement(statement));
        };

        let value = match parsed.command {
            Command::Create | Command::Temp => {
                self.tree.registry.register(&target);
                resolve_assignment(statement, &bindings_at(env, path), self.evaluator)?
            }
            Command::Set => {
                if !env.contains_key(&target) {
                    warn!(node = %id, variable = %target, "set before declaration; skipped");
                    return Ok(());
                }
                resolve_assignment(statement, &bindings_at(env, path), self.evaluator)?
            }
            Command::If | Command::Other => {
                warn!(node = %id, command = %parsed.command_word, "unsupported variable command; skipped");
                return Ok(());
            }
        };

        debug!(node = %id, variable = %target, %path, %value, "variable assigned");
        self.record(id, &target, path, value, env);
        Ok(())
    }

    fn record(&mut self, id: NodeId, name: &str, path: &PathId, value: VarValue, env: &mut VarTable) {
        let paths = env.entry(name.to_string()).or_default();
        paths.clear();
        paths.insert(path.clone(), value.clone());
        if let Some(node) = self.tree.nodes.get_mut(&id) {
            node.variable_table
                .entry(name.to_string())
                .or_default()
                .insert(path.clone(), value);
        }
    }
}
