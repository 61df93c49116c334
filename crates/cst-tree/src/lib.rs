mod analysis;
mod builder;
mod compact;
mod display;
mod edit;
mod emit;
mod navigator;
mod node;
mod render;
mod tree;

pub use analysis::{analyze, AnalysisReport};
pub use builder::{build_canonical_tree, build_tree};
pub use compact::{hide, hide_all, open_close, squash, squash_all, CompactReport};
pub use display::{
    all_variables, annotate_important, format_surfaced, has_multi_valued, long_form,
    multi_valued, short_form, surfaced_variables, LabelDecorator, PlainDecorator,
};
pub use edit::{add_child, delete};
pub use emit::emit_dot;
pub use node::{Surfaced, TreeNode, VarForm, MARKER_LABEL};
pub use render::{display_label, render_tree};
pub use tree::{Tree, VariableRegistry};


#[cfg(test)]
mod compact_tests;
#[cfg(test)]
mod tests;
