use rhai::{Dynamic, Engine, ImmutableString, Scope, FLOAT, INT};

use cst_core::{CsTreeError, VarValue};

use crate::{Bindings, Evaluator};

pub(crate) const FAIR_ADD_FN: &str = "fair_add";
pub(crate) const FAIR_SUB_FN: &str = "fair_sub";

/// Evaluator backed by a strict-variables rhai engine with the fair-math
/// helpers registered.
pub struct RhaiEvaluator {
    engine: Engine,
}

impl Default for RhaiEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

// Fair math moves a percentage of the way toward 100 (add) or 0 (sub).
// Integer versions saturate instead of overflowing.
fn fair_add_int(value: INT, amount: INT) -> INT {
    value.saturating_add((100 as INT).saturating_sub(value).saturating_mul(amount) / 100)
}

fn fair_sub_int(value: INT, amount: INT) -> INT {
    value.saturating_sub(value.saturating_mul(amount) / 100)
}

fn fair_add_float(value: FLOAT, amount: FLOAT) -> FLOAT {
    (value + (100.0 - value) * amount / 100.0).trunc()
}

fn fair_sub_float(value: FLOAT, amount: FLOAT) -> FLOAT {
    (value - value * amount / 100.0).trunc()
}

impl RhaiEvaluator {
    pub fn new() -> Self {
        let mut engine = Engine::new();
        engine.set_strict_variables(true);
        engine.register_fn(FAIR_ADD_FN, fair_add_int);
        engine.register_fn(FAIR_SUB_FN, fair_sub_int);
        engine.register_fn(FAIR_ADD_FN, fair_add_float);
        engine.register_fn(FAIR_SUB_FN, fair_sub_float);
        engine.register_fn(FAIR_ADD_FN, |value: INT, amount: FLOAT| {
            fair_add_float(value as FLOAT, amount)
        });
        engine.register_fn(FAIR_SUB_FN, |value: INT, amount: FLOAT| {
            fair_sub_float(value as FLOAT, amount)
        });
        engine.register_fn(FAIR_ADD_FN, |value: FLOAT, amount: INT| {
            fair_add_float(value, amount as FLOAT)
        });
        engine.register_fn(FAIR_SUB_FN, |value: FLOAT, amount: INT| {
            fair_sub_float(value, amount as FLOAT)
        });
        Self { engine }
    }
}

impl Evaluator for RhaiEvaluator {
    fn evaluate(&self, expression: &str, bindings: &Bindings) -> Result<VarValue, CsTreeError> {
        let mut scope = Scope::new();
        for (name, value) in bindings {
            scope.push_dynamic(name.clone(), value_to_dynamic(value));
        }

        self.engine
            .eval_with_scope::<Dynamic>(&mut scope, expression)
            .map_err(|error| {
                CsTreeError::evaluator(
                    "EXPR_EVAL_ERROR",
                    format!("Expression eval failed: {}", error),
                )
            })
            .and_then(dynamic_to_value)
            .map_err(|error| error.with_statement(expression))
    }
}

pub(crate) fn value_to_dynamic(value: &VarValue) -> Dynamic {
    match value {
        VarValue::Bool(value) => Dynamic::from_bool(*value),
        VarValue::Int(value) => Dynamic::from_int(*value as INT),
        VarValue::Float(value) => Dynamic::from_float(*value as FLOAT),
        VarValue::Str(value) => Dynamic::from(value.clone()),
    }
}

pub(crate) fn dynamic_to_value(value: Dynamic) -> Result<VarValue, CsTreeError> {
    if value.is::<bool>() {
        return Ok(VarValue::Bool(value.cast::<bool>()));
    }
    if value.is::<INT>() {
        return Ok(VarValue::Int(value.cast::<INT>() as i64));
    }
    if value.is::<FLOAT>() {
        return Ok(VarValue::Float(value.cast::<FLOAT>() as f64));
    }
    if value.is::<ImmutableString>() {
        return Ok(VarValue::Str(value.cast::<ImmutableString>().to_string()));
    }
    if value.is::<char>() {
        return Ok(VarValue::Str(value.cast::<char>().to_string()));
    }

    Err(CsTreeError::evaluator(
        "EXPR_VALUE_UNSUPPORTED",
        format!("Unsupported expression result type \"{}\".", value.type_name()),
    ))
}
