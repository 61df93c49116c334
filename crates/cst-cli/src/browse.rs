use std::io::{self, BufRead, Write};

use cst_core::{CsTreeError, ErrorKind, NodeId};
use cst_tree::{
    add_child, all_variables, delete, display_label, hide, open_close, render_tree, squash,
    LabelDecorator, Tree,
};

use crate::map_browse_io;

const HELP: &str = "commands: n next  p previous  c children  u up  o open/close  h hide  s squash  d delete  a <text> add  i info  ? help  q quit";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BrowseAction {
    Continue,
    Redraw,
    Quit,
}

pub(crate) fn run_browse(tree: &mut Tree, decorator: &dyn LabelDecorator) -> Result<i32, CsTreeError> {
    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut writer = io::stdout();
    run_browse_with_io(tree, decorator, &mut reader, &mut writer)
}

pub(crate) fn run_browse_with_io(
    tree: &mut Tree,
    decorator: &dyn LabelDecorator,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<i32, CsTreeError> {
    writeln!(writer, "{}", HELP).map_err(map_browse_io)?;
    write!(writer, "{}", render_tree(tree, decorator)).map_err(map_browse_io)?;

    loop {
        let Some(raw) = prompt_input_from("> ", reader, writer)? else {
            return Ok(0);
        };
        let mut lines = Vec::new();
        let mut emit = |line: String| lines.push(line);
        // Commands on the wrong kind of node are reported, not fatal.
        let action = match handle_browse_command(raw.trim(), tree, decorator, &mut emit) {
            Ok(action) => action,
            Err(error) if error.kind != ErrorKind::Io => {
                emit(format!("error: {}", error));
                BrowseAction::Continue
            }
            Err(error) => return Err(error),
        };
        for line in lines {
            writeln!(writer, "{}", line).map_err(map_browse_io)?;
        }
        match action {
            BrowseAction::Quit => return Ok(0),
            BrowseAction::Redraw => {
                write!(writer, "{}", render_tree(tree, decorator)).map_err(map_browse_io)?
            }
            BrowseAction::Continue => {}
        }
    }
}

fn report_move(moved: Option<NodeId>, emit: &mut dyn FnMut(String)) -> BrowseAction {
    match moved {
        Some(_) => BrowseAction::Redraw,
        None => {
            emit("cannot move there".to_string());
            BrowseAction::Continue
        }
    }
}

pub(crate) fn handle_browse_command(
    raw: &str,
    tree: &mut Tree,
    decorator: &dyn LabelDecorator,
    emit: &mut dyn FnMut(String),
) -> Result<BrowseAction, CsTreeError> {
    let (command, rest) = match raw.split_once(char::is_whitespace) {
        Some((command, rest)) => (command, rest.trim()),
        None => (raw, ""),
    };
    let cursor = tree.cursor();

    match command {
        "" => Ok(BrowseAction::Continue),
        "n" => Ok(report_move(tree.go_next()?, emit)),
        "p" => Ok(report_move(tree.go_previous()?, emit)),
        "c" => Ok(report_move(tree.go_children()?, emit)),
        "u" => Ok(report_move(tree.go_parent()?, emit)),
        "o" => {
            open_close(tree, cursor)?;
            Ok(BrowseAction::Redraw)
        }
        "h" => {
            let marker = hide(tree, cursor)?;
            emit(format!("hidden into node {}", marker));
            Ok(BrowseAction::Redraw)
        }
        "s" => {
            squash(tree, cursor)?;
            Ok(BrowseAction::Redraw)
        }
        "d" => {
            let removed = delete(tree, cursor)?;
            emit(format!("deleted {} node(s)", removed.len()));
            Ok(BrowseAction::Redraw)
        }
        "a" => {
            if rest.is_empty() {
                emit("usage: a <text>".to_string());
                return Ok(BrowseAction::Continue);
            }
            let id = add_child(tree, cursor, rest)?;
            tree.set_cursor(id)?;
            Ok(BrowseAction::Redraw)
        }
        "i" => {
            let node = tree.get(cursor)?;
            emit(format!("node {} ({})", node.id, node.kind.name()));
            emit(display_label(tree, node, decorator));
            if !node.raw_label.is_empty() && node.raw_label != node.plain_label {
                emit(node.raw_label.clone());
            }
            let vars = all_variables(tree, cursor, decorator);
            emit(if vars.is_empty() {
                "no variables".to_string()
            } else {
                vars
            });
            Ok(BrowseAction::Continue)
        }
        "?" => {
            emit(HELP.to_string());
            Ok(BrowseAction::Continue)
        }
        "q" => Ok(BrowseAction::Quit),
        other => {
            emit(format!("unknown command: {} (? for help)", other));
            Ok(BrowseAction::Continue)
        }
    }
}

/// `None` once the input is exhausted.
pub(crate) fn prompt_input_from(
    prefix: &str,
    reader: &mut dyn BufRead,
    writer: &mut dyn Write,
) -> Result<Option<String>, CsTreeError> {
    write!(writer, "{}", prefix).map_err(map_browse_io)?;
    writer.flush().map_err(map_browse_io)?;
    let mut input = String::new();
    let read = reader.read_line(&mut input).map_err(map_browse_io)?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(input.trim_end_matches(&['\r', '\n'][..]).to_string()))
}
