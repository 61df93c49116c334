use std::fs;
use std::path::PathBuf;

use super::*;
use crate::cli_test_support::fixture;

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir()
        .join(format!("cstree-cli-{}", std::process::id()))
        .join(name)
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("path should be utf-8")
}

fn config_file(name: &str) -> PathBuf {
    let path = temp_path(name);
    CliConfig::default().to_file(&path).expect("write config");
    path
}

#[test]
fn parse_errors_use_clap_exit_codes() {
    assert_eq!(run_cli_from_args(["cstree", "frobnicate"]), 2);
    assert_eq!(run_cli_from_args(["cstree", "tree"]), 2);
}

#[test]
fn tree_and_report_run_on_fixtures() {
    let config = config_file("tree.toml");
    let graph = fixture("branching.dot");
    for command in ["tree", "report"] {
        let code = run_cli_from_args([
            "cstree",
            "--no-color",
            "--config",
            path_str(&config),
            command,
            path_str(&graph),
            "--squash",
            "--vars",
        ]);
        assert_eq!(code, 0, "{} failed", command);
    }
}

#[test]
fn dot_out_writes_a_graph_that_reads_back() {
    let config = config_file("dot.toml");
    let out = temp_path("branching.out.dot");
    let code = run_cli_from_args([
        "cstree",
        "--config",
        path_str(&config),
        "dot",
        path_str(&fixture("branching.dot")),
        "--hide",
        "--out",
        path_str(&out),
    ]);
    assert_eq!(code, 0);
    let written = fs::read_to_string(&out).expect("dot written");
    let graph = cst_graph::parse_dot_graph(&written).expect("emitted dot parses");
    assert!(graph.node(cst_core::START_NODE).is_some());
}

#[test]
fn errors_exit_non_zero() {
    let config = config_file("errors.toml");
    assert_eq!(
        run_cli_from_args([
            "cstree",
            "--config",
            path_str(&config),
            "tree",
            path_str(&fixture("missing_start.dot")),
        ]),
        1
    );
    assert_eq!(
        run_cli_from_args([
            "cstree",
            "--config",
            path_str(&config),
            "vars",
            path_str(&fixture("branching.dot")),
            "--line",
            "400",
        ]),
        1
    );
    assert_eq!(
        run_cli_from_args(["cstree", "--config", "/definitely/not/here.toml", "tree", "x.dot"]),
        1
    );
}

#[test]
fn config_init_refuses_to_overwrite_without_force() {
    let path = temp_path("init/config.toml");
    let _ = fs::remove_file(&path);
    let init = |force: bool| {
        let mut args = vec!["cstree", "--config", path_str(&path), "config", "init"];
        if force {
            args.push("--force");
        }
        run_cli_from_args(args)
    };
    assert_eq!(init(false), 0);
    assert_eq!(init(false), 1);
    assert_eq!(init(true), 0);
    assert_eq!(
        CliConfig::from_file(&path).expect("config readable"),
        CliConfig::default()
    );
    assert_eq!(
        run_cli_from_args(["cstree", "--config", path_str(&path), "config", "show"]),
        0
    );
}

#[test]
fn batch_converts_every_graph_and_reports_failures() {
    let config = config_file("batch.toml");
    let out_dir = temp_path("batch-out");
    let graphs = fixture("");
    let code = run_cli_from_args([
        "cstree",
        "--config",
        path_str(&config),
        "batch",
        path_str(&graphs),
        "--out-dir",
        path_str(&out_dir),
        "--squash",
    ]);
    assert_eq!(code, 1, "missing_start.dot should fail the batch");
    for name in ["branching.tree.dot", "loop.tree.dot", "merge.tree.dot"] {
        assert!(out_dir.join(name).is_file(), "{} not written", name);
    }
    assert!(!out_dir.join("missing_start.tree.dot").exists());
}
