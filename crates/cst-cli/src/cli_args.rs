use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "cstree")]
#[command(about = "Browse and compact ChoiceScript flow graphs as trees")]
pub(crate) struct Cli {
    /// Config file; defaults to `$HOME/.config/cstree/config.toml`.
    #[arg(long = "config", global = true)]
    pub(crate) config: Option<String>,
    /// Overrides `RUST_LOG`, e.g. `debug` or `cst_tree=trace`.
    #[arg(long = "log-level", global = true)]
    pub(crate) log_level: Option<String>,
    #[arg(long = "no-color", global = true)]
    pub(crate) no_color: bool,
    #[command(subcommand)]
    pub(crate) command: Mode,
}

#[derive(Debug, Subcommand)]
pub(crate) enum Mode {
    /// Print the tree with guide lines.
    Tree(PipelineArgs),
    /// Re-emit the (compacted) tree as DOT.
    Dot(DotArgs),
    /// Print every variable's per-path values at a node.
    Vars(VarsArgs),
    /// Summarize canonicalization and analysis.
    Report(PipelineArgs),
    /// Interactive line-mode browser.
    Browse(PipelineArgs),
    /// Convert every graph under a directory to compacted DOT.
    Batch(BatchArgs),
    Config(ConfigArgs),
}

#[derive(Debug, Clone, Args)]
pub(crate) struct PipelineArgs {
    /// Input graph, `.dot` or `.json`.
    pub(crate) graph: String,
    /// Squash the configured node kinds after analysis.
    #[arg(long = "squash")]
    pub(crate) squash: bool,
    /// Hide every eligible node behind markers.
    #[arg(long = "hide")]
    pub(crate) hide: bool,
    /// Annotate nodes with their multi-valued variables.
    #[arg(long = "vars")]
    pub(crate) vars: bool,
}

#[derive(Debug, Args)]
pub(crate) struct DotArgs {
    #[command(flatten)]
    pub(crate) pipeline: PipelineArgs,
    #[arg(long = "out")]
    pub(crate) out: Option<String>,
}

#[derive(Debug, Args)]
pub(crate) struct VarsArgs {
    #[command(flatten)]
    pub(crate) pipeline: PipelineArgs,
    /// Source line of the node; the root when omitted.
    #[arg(long = "line", allow_negative_numbers = true)]
    pub(crate) line: Option<i64>,
}

#[derive(Debug, Args)]
pub(crate) struct BatchArgs {
    pub(crate) dir: String,
    #[arg(long = "out-dir")]
    pub(crate) out_dir: String,
    #[arg(long = "squash")]
    pub(crate) squash: bool,
    #[arg(long = "hide")]
    pub(crate) hide: bool,
    #[arg(long = "vars")]
    pub(crate) vars: bool,
}

#[derive(Debug, Args)]
pub(crate) struct ConfigArgs {
    #[command(subcommand)]
    pub(crate) command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub(crate) enum ConfigCommand {
    /// Write the default config file.
    Init(ConfigInitArgs),
    /// Print the effective config as TOML.
    Show,
}

#[derive(Debug, Args)]
pub(crate) struct ConfigInitArgs {
    #[arg(long = "force")]
    pub(crate) force: bool,
}
