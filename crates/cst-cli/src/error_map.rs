use cst_core::CsTreeError;
use std::fmt::Display;

fn map_error(code: &'static str, error: impl Display) -> CsTreeError {
    CsTreeError::io(code, error.to_string())
}

pub(crate) fn emit_error(error: CsTreeError) -> i32 {
    println!("RESULT:ERROR");
    println!("ERROR_CODE:{}", error.code);
    println!("ERROR_KIND:{}", error.kind);
    println!(
        "ERROR_MSG_JSON:{}",
        serde_json::to_string(&error.message).expect("string json")
    );
    if let Some(location) = error.location() {
        println!("ERROR_LOCATION:{}", location);
    }
    1
}

pub(crate) fn map_cli_graph_read(error: std::io::Error) -> CsTreeError {
    map_error("CLI_GRAPH_READ", error)
}

pub(crate) fn map_cli_graph_scan(error: walkdir::Error) -> CsTreeError {
    map_error("CLI_GRAPH_SCAN", error)
}

pub(crate) fn map_cli_config_read(error: std::io::Error) -> CsTreeError {
    map_error("CLI_CONFIG_READ", error)
}

pub(crate) fn map_cli_config_parse(error: toml::de::Error) -> CsTreeError {
    CsTreeError::malformed("CLI_CONFIG_PARSE", error.to_string())
}

pub(crate) fn map_cli_config_encode(error: toml::ser::Error) -> CsTreeError {
    map_error("CLI_CONFIG_ENCODE", error)
}

pub(crate) fn map_cli_config_write(error: std::io::Error) -> CsTreeError {
    map_error("CLI_CONFIG_WRITE", error)
}

pub(crate) fn map_cli_output_write(error: std::io::Error) -> CsTreeError {
    map_error("CLI_OUTPUT_WRITE", error)
}

pub(crate) fn map_cli_report_json(error: serde_json::Error) -> CsTreeError {
    map_error("CLI_REPORT_JSON", error)
}

pub(crate) fn map_browse_io(error: std::io::Error) -> CsTreeError {
    map_error("BROWSE_IO", error)
}

#[cfg(test)]
mod error_map_tests {
    use super::*;
    use cst_core::{ErrorKind, NodeId};

    #[test]
    fn emit_error_returns_non_zero_exit_code() {
        let code = emit_error(CsTreeError::io("ERR", "failed"));
        assert_eq!(code, 1);
        let code = emit_error(
            CsTreeError::evaluator("EXPR_EVAL_ERROR", "bad")
                .at_node(NodeId(4))
                .at_line(Some(12)),
        );
        assert_eq!(code, 1);
    }

    #[test]
    fn mapping_helpers_keep_error_codes() {
        assert_eq!(
            map_cli_graph_read(std::io::Error::other("read")).code,
            "CLI_GRAPH_READ"
        );
        assert_eq!(
            map_cli_config_read(std::io::Error::other("read")).code,
            "CLI_CONFIG_READ"
        );
        assert_eq!(
            map_cli_config_write(std::io::Error::other("write")).code,
            "CLI_CONFIG_WRITE"
        );
        assert_eq!(
            map_cli_output_write(std::io::Error::other("write")).code,
            "CLI_OUTPUT_WRITE"
        );
        assert_eq!(map_browse_io(std::io::Error::other("io")).code, "BROWSE_IO");

        let invalid = toml::from_str::<toml::Value>("main = [").expect_err("invalid toml");
        let mapped = map_cli_config_parse(invalid);
        assert_eq!(mapped.code, "CLI_CONFIG_PARSE");
        assert_eq!(mapped.kind, ErrorKind::MalformedInput);

        let invalid = serde_json::from_str::<serde_json::Value>("{").expect_err("invalid json");
        assert_eq!(map_cli_report_json(invalid).code, "CLI_REPORT_JSON");

        let missing = walkdir::WalkDir::new("/definitely/not/here/cstree")
            .into_iter()
            .find_map(Result::err)
            .expect("walk error");
        assert_eq!(map_cli_graph_scan(missing).code, "CLI_GRAPH_SCAN");
    }
}
