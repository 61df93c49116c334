use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use cst_core::{CsTreeError, FlowGraph, NodeId, NodeKind};
use cst_expr::RhaiEvaluator;
use cst_graph::{parse_graph, CanonicalReport, GraphFormat};
use cst_tree::{
    analyze, annotate_important, build_canonical_tree, hide_all, squash_all, AnalysisReport,
    CompactReport, Tree,
};

use crate::{map_cli_graph_read, CliConfig, PipelineArgs};

#[derive(Debug, Clone, Default)]
pub(crate) struct PipelineOptions {
    pub(crate) squash: Option<BTreeSet<NodeKind>>,
    pub(crate) hide: bool,
    pub(crate) vars: bool,
}

impl PipelineOptions {
    pub(crate) fn from_args(args: &PipelineArgs, config: &CliConfig) -> Result<Self, CsTreeError> {
        Self::from_flags(args.squash, args.hide, args.vars, config)
    }

    pub(crate) fn from_flags(
        squash: bool,
        hide: bool,
        vars: bool,
        config: &CliConfig,
    ) -> Result<Self, CsTreeError> {
        Ok(Self {
            squash: if squash {
                Some(config.squash_kinds()?)
            } else {
                None
            },
            hide,
            vars,
        })
    }
}

pub(crate) struct Pipeline {
    pub(crate) tree: Tree,
    pub(crate) canonical: CanonicalReport,
    pub(crate) analysis: AnalysisReport,
    pub(crate) squashed: Option<CompactReport>,
    pub(crate) hidden: Option<CompactReport>,
    pub(crate) annotated: usize,
}

pub(crate) fn read_graph(path: &Path) -> Result<FlowGraph, CsTreeError> {
    if !path.is_file() {
        return Err(CsTreeError::io(
            "CLI_GRAPH_NOT_FOUND",
            format!("Graph file does not exist: {}", path.display()),
        ));
    }
    let source = fs::read_to_string(path).map_err(map_cli_graph_read)?;
    parse_graph(&source, GraphFormat::from_path(path))
}

/// Canonicalize, build, analyze, then apply the requested compaction.
/// Variables are annotated before compaction so hide sees every summary.
pub(crate) fn run_pipeline(
    graph: FlowGraph,
    options: &PipelineOptions,
) -> Result<Pipeline, CsTreeError> {
    let (mut tree, canonical) = build_canonical_tree(graph)?;
    let analysis = analyze(&mut tree, &RhaiEvaluator::new());
    if !analysis.is_clean() {
        warn!(
            failures = analysis.failures.len(),
            "some histories could not be analyzed"
        );
    }

    let annotated = if options.vars {
        annotate_important(&mut tree)
    } else {
        0
    };
    let squashed = options
        .squash
        .as_ref()
        .map(|kinds| squash_all(&mut tree, kinds));
    let hidden = options.hide.then(|| hide_all(&mut tree));
    tree.check_invariants()?;

    info!(nodes = tree.len(), "pipeline finished");
    Ok(Pipeline {
        tree,
        canonical,
        analysis,
        squashed,
        hidden,
        annotated,
    })
}

pub(crate) fn load_pipeline(path: &Path, options: &PipelineOptions) -> Result<Pipeline, CsTreeError> {
    run_pipeline(read_graph(path)?, options)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct FailureSummary {
    pub(crate) code: String,
    pub(crate) kind: String,
    pub(crate) message: String,
    pub(crate) location: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PipelineSummary {
    pub(crate) nodes: usize,
    pub(crate) removed_cycles: usize,
    pub(crate) merges: usize,
    pub(crate) fallback_nodes: Vec<NodeId>,
    pub(crate) visits: usize,
    pub(crate) failures: Vec<FailureSummary>,
    pub(crate) variables: Vec<String>,
    pub(crate) squashed: Option<usize>,
    pub(crate) hidden: Option<usize>,
    pub(crate) annotated: usize,
}

impl Pipeline {
    pub(crate) fn summary(&self) -> PipelineSummary {
        PipelineSummary {
            nodes: self.tree.len(),
            removed_cycles: self.canonical.removed_cycles.len(),
            merges: self.canonical.merges.len(),
            fallback_nodes: self.canonical.fallback_nodes(),
            visits: self.analysis.visits,
            failures: self
                .analysis
                .failures
                .iter()
                .map(|error| FailureSummary {
                    code: error.code.clone(),
                    kind: error.kind.to_string(),
                    message: error.message.clone(),
                    location: error.location(),
                })
                .collect(),
            variables: self.tree.registry().names().to_vec(),
            squashed: self.squashed.as_ref().map(|report| report.applied),
            hidden: self.hidden.as_ref().map(|report| report.markers.len()),
            annotated: self.annotated,
        }
    }
}

#[cfg(test)]
mod pipeline_tests {
    use super::*;
    use crate::cli_test_support::fixture;

    #[test]
    fn pipeline_reports_cycles_merges_and_variables() {
        let pipeline = load_pipeline(&fixture("loop.dot"), &PipelineOptions::default())
            .expect("pipeline");
        let summary = pipeline.summary();
        assert_eq!(summary.removed_cycles, 1);
        assert!(summary.failures.is_empty(), "{:?}", summary.failures);
        assert_eq!(summary.variables, vec!["tries".to_string()]);
        assert_eq!(summary.squashed, None);
    }

    #[test]
    fn compaction_flags_shrink_the_tree() {
        let plain = load_pipeline(&fixture("branching.dot"), &PipelineOptions::default())
            .expect("plain");
        let options = PipelineOptions::from_flags(true, true, true, &CliConfig::default())
            .expect("options");
        let compacted = load_pipeline(&fixture("branching.dot"), &options).expect("compacted");
        assert!(compacted.tree.len() <= plain.tree.len());
        assert!(compacted.annotated > 0);
        assert!(compacted.hidden.is_some());
        compacted.tree.check_invariants().expect("tree stays consistent");
    }

    #[test]
    fn missing_graph_file_is_reported() {
        let error = read_graph(Path::new("/definitely/not/here.dot")).expect_err("missing");
        assert_eq!(error.code, "CLI_GRAPH_NOT_FOUND");
    }
}
