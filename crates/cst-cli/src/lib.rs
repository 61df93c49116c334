use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use tracing::info;
use walkdir::WalkDir;

use cst_core::CsTreeError;
use cst_tree::{all_variables, display_label, emit_dot, render_tree, LabelDecorator, PlainDecorator};

mod browse;
mod cli_args;
mod config;
mod decorate;
mod error_map;
mod logging;
mod pipeline;

pub(crate) use browse::run_browse;
pub(crate) use cli_args::{
    BatchArgs, Cli, ConfigArgs, ConfigCommand, DotArgs, Mode, PipelineArgs, VarsArgs,
};
pub(crate) use config::{default_config_path, load_config, CliConfig};
pub(crate) use decorate::ColorDecorator;
pub(crate) use error_map::{
    emit_error, map_browse_io, map_cli_config_encode, map_cli_config_parse, map_cli_config_read,
    map_cli_config_write, map_cli_graph_read, map_cli_graph_scan, map_cli_output_write,
    map_cli_report_json,
};
pub(crate) use logging::init_tracing;
pub(crate) use pipeline::{load_pipeline, PipelineOptions};

pub fn run_cli_from_args<I, T>(args: I) -> i32
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = match Cli::try_parse_from(args) {
        Ok(cli) => cli,
        Err(error) => {
            let _ = error.print();
            return error.exit_code();
        }
    };
    init_tracing(cli.log_level.as_deref());
    match run(cli) {
        Ok(code) => code,
        Err(error) => emit_error(error),
    }
}

fn run(cli: Cli) -> Result<i32, CsTreeError> {
    if let Mode::Config(args) = &cli.command {
        return run_config(args, cli.config.as_deref());
    }

    let config = load_config(cli.config.as_deref())?;
    let color = ColorDecorator::from_config(&config);
    let decorator: &dyn LabelDecorator = if cli.no_color {
        &PlainDecorator
    } else {
        &color
    };

    match cli.command {
        Mode::Tree(args) => run_tree(&args, &config, decorator),
        Mode::Dot(args) => run_dot(&args, &config),
        Mode::Vars(args) => run_vars(&args, &config, decorator),
        Mode::Report(args) => run_report(&args, &config),
        Mode::Browse(args) => {
            let options = PipelineOptions::from_args(&args, &config)?;
            let mut pipeline = load_pipeline(Path::new(&args.graph), &options)?;
            run_browse(&mut pipeline.tree, decorator)
        }
        Mode::Batch(args) => run_batch(&args, &config),
        Mode::Config(args) => run_config(&args, cli.config.as_deref()),
    }
}

fn run_tree(
    args: &PipelineArgs,
    config: &CliConfig,
    decorator: &dyn LabelDecorator,
) -> Result<i32, CsTreeError> {
    let options = PipelineOptions::from_args(args, config)?;
    let pipeline = load_pipeline(Path::new(&args.graph), &options)?;
    print!("{}", render_tree(&pipeline.tree, decorator));
    Ok(0)
}

fn run_dot(args: &DotArgs, config: &CliConfig) -> Result<i32, CsTreeError> {
    let options = PipelineOptions::from_args(&args.pipeline, config)?;
    let pipeline = load_pipeline(Path::new(&args.pipeline.graph), &options)?;
    let dot = emit_dot(&pipeline.tree);
    match &args.out {
        Some(out) => {
            write_output(Path::new(out), &dot)?;
            println!("WROTE:{}", out);
        }
        None => print!("{}", dot),
    }
    Ok(0)
}

fn run_vars(
    args: &VarsArgs,
    config: &CliConfig,
    decorator: &dyn LabelDecorator,
) -> Result<i32, CsTreeError> {
    let options = PipelineOptions::from_args(&args.pipeline, config)?;
    let pipeline = load_pipeline(Path::new(&args.pipeline.graph), &options)?;
    let tree = &pipeline.tree;
    let id = match args.line {
        Some(line) => tree.find_by_line(line).ok_or_else(|| {
            CsTreeError::io(
                "CLI_LINE_NOT_FOUND",
                format!("No node at line {} or {}.", line, line + 1),
            )
        })?,
        None => tree.root(),
    };
    let node = tree.get(id)?;
    println!("{}", display_label(tree, node, decorator));
    let vars = all_variables(tree, id, decorator);
    if vars.is_empty() {
        println!("(no variables)");
    } else {
        println!("{}", vars);
    }
    Ok(0)
}

fn run_report(args: &PipelineArgs, config: &CliConfig) -> Result<i32, CsTreeError> {
    let options = PipelineOptions::from_args(args, config)?;
    let pipeline = load_pipeline(Path::new(&args.graph), &options)?;
    let json = serde_json::to_string_pretty(&pipeline.summary()).map_err(map_cli_report_json)?;
    println!("{}", json);
    Ok(0)
}

fn is_graph_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|ext| ext.to_str()),
        Some("dot" | "gv" | "json")
    )
}

/// Converts every graph below `dir`; a failing graph is reported and the
/// rest still run. Exits non-zero when any graph failed.
fn run_batch(args: &BatchArgs, config: &CliConfig) -> Result<i32, CsTreeError> {
    let options = PipelineOptions::from_flags(args.squash, args.hide, args.vars, config)?;
    let out_dir = PathBuf::from(&args.out_dir);
    let mut written = 0;
    let mut failed = 0;

    for entry in WalkDir::new(&args.dir).follow_links(false).sort_by_file_name() {
        let entry = entry.map_err(map_cli_graph_scan)?;
        if !entry.file_type().is_file() || !is_graph_file(entry.path()) {
            continue;
        }
        let Some(stem) = entry.path().file_stem() else {
            continue;
        };
        let target = out_dir.join(stem).with_extension("tree.dot");
        match load_pipeline(entry.path(), &options) {
            Ok(pipeline) => {
                write_output(&target, &emit_dot(&pipeline.tree))?;
                println!("WROTE:{}", target.display());
                written += 1;
            }
            Err(error) => {
                println!("FAILED:{}:{}", entry.path().display(), error.code);
                failed += 1;
            }
        }
    }

    info!(written, failed, "batch finished");
    println!("RESULT:{}", if failed == 0 { "OK" } else { "PARTIAL" });
    Ok(if failed == 0 { 0 } else { 1 })
}

fn write_output(path: &Path, content: &str) -> Result<(), CsTreeError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(map_cli_output_write)?;
    }
    fs::write(path, content).map_err(map_cli_output_write)
}

fn run_config(args: &ConfigArgs, explicit: Option<&str>) -> Result<i32, CsTreeError> {
    match &args.command {
        ConfigCommand::Init(init) => {
            let path = match explicit {
                Some(path) => PathBuf::from(path),
                None => default_config_path().ok_or_else(|| {
                    CsTreeError::io("CLI_CONFIG_PATH", "No home directory found; pass --config.")
                })?,
            };
            if path.exists() && !init.force {
                return Err(CsTreeError::io(
                    "CLI_CONFIG_EXISTS",
                    format!("Config file already exists: {} (use --force)", path.display()),
                ));
            }
            CliConfig::default().to_file(&path)?;
            println!("WROTE:{}", path.display());
            Ok(0)
        }
        ConfigCommand::Show => {
            print!("{}", load_config(explicit)?.to_toml()?);
            Ok(0)
        }
    }
}


#[cfg(test)]
mod tests;
