use std::sync::OnceLock;

use regex::Regex;

use cst_core::{CsTreeError, VarValue};

use crate::rhai_bridge::{FAIR_ADD_FN, FAIR_SUB_FN};
use crate::{Bindings, Evaluator};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Create,
    Temp,
    Set,
    If,
    Other,
}

impl Command {
    fn from_token(token: &str) -> Self {
        let word = token.trim_start_matches('*').to_ascii_uppercase();
        match word.as_str() {
            "CREATE" => Self::Create,
            "TEMP" => Self::Temp,
            "SET" => Self::Set,
            "IF" | "ELSEIF" | "ELSIF" => Self::If,
            _ => Self::Other,
        }
    }

    pub fn is_declaration(self) -> bool {
        matches!(self, Self::Create | Self::Temp)
    }
}

/// A statement split into command word, target variable and operand.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub command: Command,
    pub command_word: String,
    pub target: Option<String>,
    pub operand_tokens: Vec<String>,
    pub operand: String,
}

const ARITHMETIC: [&str; 4] = ["+", "-", "*", "/"];

fn spaced(source: &str) -> String {
    let mut out = String::with_capacity(source.len() + 8);
    let mut quote: Option<char> = None;
    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        if let Some(open) = quote {
            out.push(ch);
            if ch == open {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => {
                quote = Some(ch);
                out.push(ch);
            }
            '%' if matches!(chars.peek(), Some('+') | Some('-')) => {
                let op = chars.next().unwrap_or('+');
                out.push_str(" %");
                out.push(op);
                out.push(' ');
            }
            '+' | '-' | '*' | '/' => {
                out.push(' ');
                out.push(ch);
                out.push(' ');
            }
            _ => out.push(ch),
        }
    }
    out
}

fn split_tokens(source: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;

    for ch in source.chars() {
        match quote {
            Some(open) => {
                current.push(ch);
                if ch == open {
                    quote = None;
                }
            }
            None if ch.is_whitespace() => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            None => {
                if ch == '"' || ch == '\'' {
                    quote = Some(ch);
                }
                current.push(ch);
            }
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

/// Splits a statement such as `SET hp+1` into `SET`, `hp`, `["+", "1"]`.
/// Operators inside quoted strings are left alone.
pub fn tokenize(statement: &str) -> Result<Statement, CsTreeError> {
    let mut tokens = split_tokens(&spaced(statement)).into_iter();
    let Some(command_word) = tokens.next() else {
        return Err(CsTreeError::malformed(
            "EXPR_STATEMENT_EMPTY",
            "Statement has no tokens.",
        )
        .with_statement(statement));
    };
    let target = tokens.next();
    let operand_tokens = tokens.collect::<Vec<_>>();
    let operand = operand_tokens.join(" ");

    Ok(Statement {
        command: Command::from_token(&command_word),
        command_word,
        target,
        operand_tokens,
        operand,
    })
}

fn coerce_integer(value: VarValue) -> VarValue {
    match value {
        VarValue::Float(raw) if raw.is_finite() => VarValue::Int(raw.trunc() as i64),
        VarValue::Str(raw) => match raw.trim().parse::<i64>() {
            Ok(parsed) => VarValue::Int(parsed),
            Err(_) => VarValue::Str(raw),
        },
        other => other,
    }
}

fn assignment_expression(statement: &Statement) -> Result<String, CsTreeError> {
    let Some(target) = statement.target.as_deref() else {
        return Err(CsTreeError::malformed(
            "EXPR_TARGET_MISSING",
            format!("{} has no target variable.", statement.command_word),
        ));
    };
    let Some(first) = statement.operand_tokens.first() else {
        return Err(CsTreeError::malformed(
            "EXPR_OPERAND_MISSING",
            format!("{} {} has no value.", statement.command_word, target),
        ));
    };

    // Declarations store their operand as written, so `CREATE debt -5` is -5.
    if statement.command != Command::Set {
        return Ok(statement.operand.clone());
    }

    let rest = statement.operand_tokens[1..].join(" ");
    let expression = match first.as_str() {
        "%+" => format!("{}({}, {})", FAIR_ADD_FN, target, rest),
        "%-" => format!("{}({}, {})", FAIR_SUB_FN, target, rest),
        op if ARITHMETIC.contains(&op) => format!("{} {}", target, statement.operand),
        _ => statement.operand.clone(),
    };
    Ok(expression)
}

/// Evaluates the right-hand side of an assignment or declaration. A `SET`
/// operand that starts with an operator applies to the target's current value.
pub fn resolve_assignment(
    statement: &str,
    env: &Bindings,
    evaluator: &dyn Evaluator,
) -> Result<VarValue, CsTreeError> {
    let parsed = tokenize(statement)?;
    let expression =
        assignment_expression(&parsed).map_err(|error| error.with_statement(statement))?;
    let value = evaluator
        .evaluate(&expression, env)
        .map_err(|error| error.with_statement(statement))?;
    Ok(coerce_integer(value))
}

fn single_equals_as_equality(source: &str) -> String {
    let chars = source.chars().collect::<Vec<_>>();
    let mut out = String::with_capacity(source.len() + 4);
    let mut quote: Option<char> = None;

    for (index, ch) in chars.iter().copied().enumerate() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            out.push(ch);
            continue;
        }
        if ch == '"' || ch == '\'' {
            quote = Some(ch);
        }
        let previous = index.checked_sub(1).map(|i| chars[i]);
        let next = chars.get(index + 1).copied();
        let lone = ch == '='
            && !matches!(previous, Some('=') | Some('!') | Some('<') | Some('>'))
            && next != Some('=');
        if lone {
            out.push_str("==");
        } else {
            out.push(ch);
        }
    }
    out
}

fn word_operators() -> &'static Regex {
    static WORDS: OnceLock<Regex> = OnceLock::new();
    WORDS.get_or_init(|| Regex::new(r"\b(and|or|AND|OR)\b").expect("operator pattern is valid"))
}

/// Rewrites a conditional statement into an evaluator expression: drops the
/// leading `IF`, turns `=` into `==` and `and`/`or` into `&&`/`||`.
pub fn condition_expression(statement: &str) -> Result<String, CsTreeError> {
    let trimmed = statement.trim();
    let Some(first) = trimmed.split_whitespace().next() else {
        return Err(CsTreeError::malformed(
            "EXPR_STATEMENT_EMPTY",
            "Conditional has no tokens.",
        ));
    };
    let body = if Command::from_token(first) == Command::If {
        trimmed[first.len()..].trim()
    } else {
        trimmed
    };
    if body.is_empty() {
        return Err(CsTreeError::malformed(
            "EXPR_CONDITION_MISSING",
            "Conditional has no expression.",
        )
        .with_statement(statement));
    }

    let equality = single_equals_as_equality(body);
    let rewritten = word_operators().replace_all(&equality, |caps: &regex::Captures<'_>| {
        if caps[1].eq_ignore_ascii_case("and") {
            "&&"
        } else {
            "||"
        }
    });
    Ok(rewritten.into_owned())
}

pub fn resolve_condition(
    statement: &str,
    env: &Bindings,
    evaluator: &dyn Evaluator,
) -> Result<bool, CsTreeError> {
    let expression = condition_expression(statement)?;
    let value = evaluator
        .evaluate(&expression, env)
        .map_err(|error| error.with_statement(statement))?;
    Ok(value.is_truthy())
}

fn identifier_pattern() -> &'static Regex {
    static IDENT: OnceLock<Regex> = OnceLock::new();
    IDENT.get_or_init(|| {
        Regex::new(r#""[^"]*"|'[^']*'|[A-Za-z_][A-Za-z0-9_]*"#).expect("identifier pattern is valid")
    })
}

/// Identifiers the statement mentions after its command word, in order of
/// first appearance. Quoted strings are skipped.
pub fn referenced_names(statement: &str) -> Vec<String> {
    let trimmed = statement.trim();
    let body = match trimmed.split_whitespace().next() {
        Some(first) if Command::from_token(first) != Command::Other => &trimmed[first.len()..],
        _ => trimmed,
    };

    let mut names: Vec<String> = Vec::new();
    for found in identifier_pattern().find_iter(body) {
        let text = found.as_str();
        if text.starts_with('"') || text.starts_with('\'') {
            continue;
        }
        if matches!(text, "and" | "or" | "AND" | "OR" | "true" | "false") {
            continue;
        }
        if !names.iter().any(|name| name == text) {
            names.push(text.to_string());
        }
    }
    names
}
