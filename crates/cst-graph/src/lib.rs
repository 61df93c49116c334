mod canonical;
mod dot;
mod json;

pub use canonical::{
    canonicalize, remove_cycles, resolve_single_parents, CanonicalGraph, CanonicalReport,
    MergeResolution, ParentRule, RemovedCycle,
};
pub use dot::parse_dot_graph;
pub use json::{parse_json_graph, write_json_graph};

use std::path::Path;

use cst_core::{CsTreeError, FlowGraph};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphFormat {
    Dot,
    Json,
}

impl GraphFormat {
    /// `.json` files are JSON, everything else is read as DOT.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Self::Json,
            _ => Self::Dot,
        }
    }
}

pub fn parse_graph(source: &str, format: GraphFormat) -> Result<FlowGraph, CsTreeError> {
    match format {
        GraphFormat::Dot => parse_dot_graph(source),
        GraphFormat::Json => parse_json_graph(source),
    }
}
