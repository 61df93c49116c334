mod rhai_bridge;
mod statement;

pub use rhai_bridge::RhaiEvaluator;
pub use statement::{
    condition_expression, referenced_names, resolve_assignment, resolve_condition, tokenize, Command,
    Statement,
};

use std::collections::BTreeMap;

use cst_core::{CsTreeError, VarValue};

/// name -> value bindings handed to the evaluator for one expression.
pub type Bindings = BTreeMap<String, VarValue>;

/// Evaluation boundary: one expression against one binding set, no side effects.
pub trait Evaluator {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<VarValue, CsTreeError>;
}
