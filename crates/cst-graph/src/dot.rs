use std::collections::BTreeMap;

use cst_core::{CsTreeError, FlowGraph, GraphNode, NodeId, NodeKind};

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Id(String),
    Quoted(String),
    Arrow,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Equals,
    Comma,
    Semi,
}

fn lex_error(line: usize, message: impl Into<String>) -> CsTreeError {
    CsTreeError::malformed("GRAPH_DOT_SYNTAX", message).at_line(Some(line as i64))
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>, CsTreeError> {
    let mut tokens = Vec::new();
    let mut chars = source.chars().peekable();
    let mut line = 1usize;

    while let Some(&ch) = chars.peek() {
        match ch {
            '\n' => {
                line += 1;
                chars.next();
            }
            c if c.is_whitespace() => {
                chars.next();
            }
            '#' => {
                while chars.peek().is_some_and(|c| *c != '\n') {
                    chars.next();
                }
            }
            '/' => {
                chars.next();
                match chars.next() {
                    Some('/') => {
                        while chars.peek().is_some_and(|c| *c != '\n') {
                            chars.next();
                        }
                    }
                    Some('*') => {
                        let mut previous = '\0';
                        loop {
                            let Some(c) = chars.next() else {
                                return Err(lex_error(line, "Unterminated block comment."));
                            };
                            if c == '\n' {
                                line += 1;
                            }
                            if previous == '*' && c == '/' {
                                break;
                            }
                            previous = c;
                        }
                    }
                    _ => return Err(lex_error(line, "Stray '/' in graph source.")),
                }
            }
            '"' => {
                chars.next();
                let start_line = line;
                let mut value = String::new();
                loop {
                    match chars.next() {
                        None => return Err(lex_error(start_line, "Unterminated string.")),
                        Some('"') => break,
                        Some('\\') => match chars.next() {
                            Some('"') => value.push('"'),
                            Some('\n') => line += 1,
                            Some(other) => {
                                value.push('\\');
                                value.push(other);
                            }
                            None => return Err(lex_error(start_line, "Unterminated string.")),
                        },
                        Some(c) => {
                            if c == '\n' {
                                line += 1;
                            }
                            value.push(c);
                        }
                    }
                }
                tokens.push((Token::Quoted(value), start_line));
            }
            '-' if matches!(chars.clone().nth(1), Some('>')) => {
                chars.next();
                chars.next();
                tokens.push((Token::Arrow, line));
            }
            '[' | ']' | '{' | '}' | '=' | ',' | ';' => {
                chars.next();
                let token = match ch {
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '=' => Token::Equals,
                    ',' => Token::Comma,
                    _ => Token::Semi,
                };
                tokens.push((token, line));
            }
            c if is_id_char(c) => {
                let mut value = String::new();
                while let Some(&c) = chars.peek() {
                    if c == '-' && matches!(chars.clone().nth(1), Some('>')) {
                        break;
                    }
                    if !is_id_char(c) {
                        break;
                    }
                    value.push(c);
                    chars.next();
                }
                tokens.push((Token::Id(value), line));
            }
            other => {
                return Err(lex_error(
                    line,
                    format!("Unexpected character '{}' in graph source.", other),
                ))
            }
        }
    }

    Ok(tokens)
}

fn is_id_char(ch: char) -> bool {
    ch.is_alphanumeric() || ch == '_' || ch == '.' || ch == '-'
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    cursor: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.cursor).map(|(token, _)| token)
    }

    fn line(&self) -> usize {
        self.tokens
            .get(self.cursor)
            .or_else(|| self.tokens.last())
            .map(|(_, line)| *line)
            .unwrap_or(1)
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.cursor).map(|(token, _)| token.clone());
        self.cursor += 1;
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), CsTreeError> {
        let line = self.line();
        match self.next() {
            Some(token) if token == expected => Ok(()),
            other => Err(lex_error(
                line,
                format!("Expected {:?}, found {:?}.", expected, other),
            )),
        }
    }

    fn identifier(&mut self) -> Result<String, CsTreeError> {
        let line = self.line();
        match self.next() {
            Some(Token::Id(value)) | Some(Token::Quoted(value)) => Ok(value),
            other => Err(lex_error(
                line,
                format!("Expected identifier, found {:?}.", other),
            )),
        }
    }

    fn attributes(&mut self) -> Result<BTreeMap<String, String>, CsTreeError> {
        let mut attributes = BTreeMap::new();
        while self.peek() == Some(&Token::LBracket) {
            self.next();
            loop {
                match self.peek() {
                    Some(Token::RBracket) => {
                        self.next();
                        break;
                    }
                    Some(Token::Comma) | Some(Token::Semi) => {
                        self.next();
                    }
                    _ => {
                        let key = self.identifier()?;
                        self.expect(Token::Equals)?;
                        let value = self.identifier()?;
                        attributes.insert(key, value);
                    }
                }
            }
        }
        Ok(attributes)
    }
}

/// Reads the DOT subset emitted by the script-to-graph tool: one `digraph`
/// with node statements, edge statements (chains allowed) and attribute lists.
/// `graph`/`node`/`edge` default statements and graph attributes are skipped.
pub fn parse_dot_graph(source: &str) -> Result<FlowGraph, CsTreeError> {
    let mut parser = Parser {
        tokens: tokenize(source)?,
        cursor: 0,
    };

    if let Some(Token::Id(word)) = parser.peek() {
        if word.eq_ignore_ascii_case("strict") {
            parser.next();
        }
    }
    match parser.next() {
        Some(Token::Id(word)) if word.eq_ignore_ascii_case("digraph") => {}
        other => {
            return Err(lex_error(
                1,
                format!("Expected 'digraph', found {:?}.", other),
            ))
        }
    }
    if parser.peek() != Some(&Token::LBrace) {
        parser.identifier()?;
    }
    parser.expect(Token::LBrace)?;

    let mut declared: BTreeMap<NodeId, BTreeMap<String, String>> = BTreeMap::new();
    let mut edges: Vec<(NodeId, NodeId, BTreeMap<String, String>)> = Vec::new();

    loop {
        let line = parser.line();
        match parser.peek() {
            None => return Err(lex_error(line, "Missing closing '}'.")),
            Some(Token::RBrace) => {
                parser.next();
                break;
            }
            Some(Token::Semi) => {
                parser.next();
            }
            _ => {
                let head = parser.identifier()?;
                if matches!(head.as_str(), "graph" | "node" | "edge")
                    && parser.peek() == Some(&Token::LBracket)
                {
                    parser.attributes()?;
                    continue;
                }
                if head == "subgraph" {
                    return Err(lex_error(line, "Subgraphs are not supported."));
                }
                if parser.peek() == Some(&Token::Equals) {
                    parser.next();
                    parser.identifier()?;
                    continue;
                }

                let mut chain = vec![head.parse::<NodeId>()?];
                while parser.peek() == Some(&Token::Arrow) {
                    parser.next();
                    chain.push(parser.identifier()?.parse::<NodeId>()?);
                }
                let attributes = parser.attributes()?;
                if chain.len() == 1 {
                    declared.entry(chain[0]).or_default().extend(attributes);
                } else {
                    for id in &chain {
                        declared.entry(*id).or_default();
                    }
                    for pair in chain.windows(2) {
                        edges.push((pair[0], pair[1], attributes.clone()));
                    }
                }
            }
        }
    }

    let mut graph = FlowGraph::default();
    for (id, attributes) in declared {
        graph.add_node(graph_node_from_attributes(id, attributes)?);
    }
    for (from, to, mut attributes) in edges {
        graph.add_edge(from, to, attributes.remove("label").filter(|l| !l.is_empty()));
    }
    Ok(graph)
}

fn parse_line(raw: Option<String>, id: NodeId) -> Result<Option<i64>, CsTreeError> {
    match raw {
        None => Ok(None),
        Some(value) if value.trim().is_empty() => Ok(None),
        Some(value) => value.trim().parse::<i64>().map(Some).map_err(|_| {
            CsTreeError::malformed(
                "GRAPH_SOURCE_LINE",
                format!("Node {} has non-numeric source line \"{}\".", id, value),
            )
            .at_node(id)
        }),
    }
}

fn graph_node_from_attributes(
    id: NodeId,
    mut attributes: BTreeMap<String, String>,
) -> Result<GraphNode, CsTreeError> {
    let source_line = parse_line(attributes.remove("startln"), id)?;
    let loop_goto = attributes
        .remove("loopgoto")
        .map(|value| matches!(value.trim(), "1" | "true"));

    let kind = if let Some(kind) = attributes.remove("kind") {
        kind.parse::<NodeKind>()?
    } else if let Some(kind) = attributes
        .get("shape")
        .and_then(|shape| NodeKind::from_shape(shape, source_line))
    {
        kind
    } else {
        match loop_goto {
            Some(true) => NodeKind::LoopGoto,
            Some(false) => NodeKind::MultiGoto,
            None => {
                return Err(CsTreeError::malformed(
                    "GRAPH_NODE_KIND",
                    format!(
                        "Cannot determine kind of node {} (shape {:?}).",
                        id,
                        attributes.get("shape")
                    ),
                )
                .at_node(id)
                .at_line(source_line))
            }
        }
    };

    let mut node = GraphNode::new(id, kind);
    node.source_line = source_line;
    node.loop_goto = loop_goto.unwrap_or(kind == NodeKind::LoopGoto);
    node.label = attributes.remove("label").map(|label| {
        if label == "\\N" {
            "*".to_string()
        } else {
            label
        }
    });
    node.tooltip = attributes.remove("tooltip");
    node.old_goto = parse_line(attributes.remove("oldgoto"), id)?;
    if let Some(lines) = attributes.remove("otherparents") {
        for raw in lines.split_whitespace() {
            if let Some(line) = parse_line(Some(raw.to_string()), id)? {
                node.other_parent_lines.push(line);
            }
        }
    }
    node.attributes = attributes;
    Ok(node)
}
