use std::fmt;

use thiserror::Error;

use crate::types::NodeId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Missing start node, unparseable statements, unterminated canonicalization.
    MalformedInput,
    /// Shape violations: a conditional without both branches, squash/hide on an ineligible node.
    AnalysisInconsistency,
    EvaluatorFailure,
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MalformedInput => "malformed input",
            Self::AnalysisInconsistency => "analysis inconsistency",
            Self::EvaluatorFailure => "evaluator failure",
            Self::Io => "io",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
#[error("{code}: {message}")]
pub struct CsTreeError {
    pub code: String,
    pub message: String,
    pub kind: ErrorKind,
    pub node: Option<NodeId>,
    pub line: Option<i64>,
    pub statement: Option<String>,
}

impl CsTreeError {
    pub fn new(kind: ErrorKind, code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            kind,
            node: None,
            line: None,
            statement: None,
        }
    }

    pub fn malformed(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::MalformedInput, code, message)
    }

    pub fn inconsistency(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::AnalysisInconsistency, code, message)
    }

    pub fn evaluator(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EvaluatorFailure, code, message)
    }

    pub fn io(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Io, code, message)
    }

    pub fn at_node(mut self, node: NodeId) -> Self {
        self.node = Some(node);
        self
    }

    pub fn at_line(mut self, line: Option<i64>) -> Self {
        self.line = line.or(self.line);
        self
    }

    pub fn with_statement(mut self, statement: impl Into<String>) -> Self {
        self.statement = Some(statement.into());
        self
    }

    /// One-line location suffix such as `node 12, line 40, "SET hp + 1"`.
    pub fn location(&self) -> Option<String> {
        let mut parts = Vec::new();
        if let Some(node) = self.node {
            parts.push(format!("node {}", node));
        }
        if let Some(line) = self.line {
            parts.push(format!("line {}", line));
        }
        if let Some(statement) = &self.statement {
            parts.push(format!("\"{}\"", statement));
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        }
    }
}
