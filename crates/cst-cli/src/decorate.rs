use std::collections::BTreeMap;

use colored::{Color, Colorize};
use tracing::debug;

use cst_core::NodeKind;
use cst_tree::LabelDecorator;

use crate::config::CliConfig;

/// xterm-256 names used by the default palette that `colored` does not know.
const NAMED_RGB: [(&str, (u8, u8, u8)); 18] = [
    ("dark_red", (135, 0, 0)),
    ("orange4", (135, 95, 0)),
    ("dark_green", (0, 95, 0)),
    ("dark_blue", (0, 0, 135)),
    ("purple4", (95, 0, 175)),
    ("deep_pink3", (215, 0, 135)),
    ("red3", (215, 0, 0)),
    ("orange3", (215, 135, 0)),
    ("yellow2", (215, 255, 0)),
    ("light_green", (135, 255, 135)),
    ("sky_blue1", (135, 215, 255)),
    ("medium_purple3", (135, 95, 215)),
    ("pink1", (255, 175, 215)),
    ("plum3", (215, 135, 215)),
    ("plum4", (135, 95, 135)),
    ("grey46", (118, 118, 118)),
    ("grey37", (94, 94, 94)),
    ("grey27", (68, 68, 68)),
];

pub(crate) fn color_named(name: &str) -> Option<Color> {
    let wanted = name.trim().to_ascii_lowercase();
    if let Some((_, (r, g, b))) = NAMED_RGB.iter().find(|(known, _)| *known == wanted) {
        return Some(Color::TrueColor {
            r: *r,
            g: *g,
            b: *b,
        });
    }
    wanted.replace('_', " ").parse::<Color>().ok()
}

/// A parsed style string such as `bold yellow`, `reverse` or `white on grey27`.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Style {
    pub(crate) fg: Option<Color>,
    pub(crate) bg: Option<Color>,
    pub(crate) bold: bool,
    pub(crate) italic: bool,
    pub(crate) underline: bool,
    pub(crate) reverse: bool,
    pub(crate) dim: bool,
}

impl Style {
    pub(crate) fn parse(text: &str) -> Self {
        let mut style = Self::default();
        let mut words = text.split_whitespace();
        while let Some(word) = words.next() {
            match word.to_ascii_lowercase().as_str() {
                "bold" | "b" => style.bold = true,
                "italic" | "i" => style.italic = true,
                "underline" | "u" => style.underline = true,
                "reverse" | "r" => style.reverse = true,
                "dim" => style.dim = true,
                "on" => style.bg = words.next().and_then(color_named),
                other => match color_named(other) {
                    Some(color) => style.fg = Some(color),
                    None => debug!(word = other, "ignoring unknown style word"),
                },
            }
        }
        style
    }

    pub(crate) fn with_background(&self, bg: Option<Color>) -> Self {
        Self {
            bg: bg.or(self.bg),
            ..self.clone()
        }
    }

    pub(crate) fn apply(&self, text: &str) -> String {
        let mut out = text.normal();
        if let Some(fg) = self.fg {
            out = out.color(fg);
        }
        if let Some(bg) = self.bg {
            out = out.on_color(bg);
        }
        if self.bold {
            out = out.bold();
        }
        if self.italic {
            out = out.italic();
        }
        if self.underline {
            out = out.underline();
        }
        if self.reverse {
            out = out.reversed();
        }
        if self.dim {
            out = out.dimmed();
        }
        out.to_string()
    }
}

/// Terminal colors for tree labels, resolved once from the `[colors]` table.
#[derive(Debug, Clone)]
pub(crate) struct ColorDecorator {
    styles: BTreeMap<String, Style>,
    selected: Style,
    palette: Vec<Color>,
}

impl ColorDecorator {
    pub(crate) fn from_config(config: &CliConfig) -> Self {
        Self {
            styles: config
                .colors
                .iter()
                .map(|(key, style)| (key.clone(), Style::parse(style)))
                .collect(),
            selected: Style::parse(&config.main.selected),
            palette: config
                .main
                .variable_palette
                .iter()
                .filter_map(|name| color_named(name))
                .collect(),
        }
    }

    fn paint(&self, key: &str, text: &str) -> String {
        match self.styles.get(key) {
            Some(style) => style.apply(text),
            None => text.to_string(),
        }
    }
}

fn style_key(kind: NodeKind) -> Option<&'static str> {
    match kind {
        NodeKind::Text => Some("text"),
        NodeKind::Choice => Some("choice"),
        NodeKind::Option => Some("option"),
        NodeKind::Label => Some("label"),
        NodeKind::Goto | NodeKind::MultiGoto | NodeKind::LoopGoto => Some("gototarget"),
        NodeKind::Var => Some("varcmd"),
        NodeKind::Cond => Some("cond"),
        NodeKind::HideMarker | NodeKind::CloseMarker => Some("note"),
        NodeKind::Start | NodeKind::End => None,
    }
}

impl LabelDecorator for ColorDecorator {
    fn line_number(&self, line: i64) -> String {
        format!("{}: ", self.paint("linenum", &line.to_string()))
    }

    fn label(&self, kind: NodeKind, text: &str) -> String {
        match style_key(kind) {
            Some(key) => self.paint(key, text),
            None => text.to_string(),
        }
    }

    fn branch(&self, text: &str) -> String {
        format!("{}: ", self.paint("branch", text))
    }

    fn variable(&self, name: &str, slot: usize) -> String {
        let base = self.styles.get("varname").cloned().unwrap_or_default();
        let bg = match self.palette.len() {
            0 => None,
            len => Some(self.palette[slot % len]),
        };
        base.with_background(bg).apply(name)
    }

    fn value(&self, text: &str) -> String {
        self.paint("varvalue", text)
    }

    fn path(&self, text: &str) -> String {
        self.paint("path", text)
    }

    fn note(&self, text: &str) -> String {
        self.paint("note", text)
    }

    fn current(&self, text: &str) -> String {
        self.selected.apply(text)
    }
}

#[cfg(test)]
mod decorate_tests {
    use super::*;

    #[test]
    fn style_parse_reads_modifiers_and_colors() {
        let style = Style::parse("bold yellow");
        assert!(style.bold);
        assert_eq!(style.fg, Some(Color::Yellow));

        let style = Style::parse("bold plum3");
        assert_eq!(
            style.fg,
            Some(Color::TrueColor {
                r: 215,
                g: 135,
                b: 215
            })
        );

        let style = Style::parse("white on grey27");
        assert_eq!(style.fg, Some(Color::White));
        assert_eq!(
            style.bg,
            Some(Color::TrueColor {
                r: 68,
                g: 68,
                b: 68
            })
        );

        let style = Style::parse("reverse sparkly");
        assert!(style.reverse);
        assert_eq!(style.fg, None);
    }

    #[test]
    fn decorator_resolves_palette_and_kind_keys() {
        let decorator = ColorDecorator::from_config(&CliConfig::default());
        assert_eq!(decorator.palette.len(), 12);
        assert!(decorator.selected.reverse);
        assert_eq!(style_key(NodeKind::MultiGoto), Some("gototarget"));
        assert_eq!(style_key(NodeKind::Start), None);
        assert_eq!(color_named("bright_blue"), Some(Color::BrightBlue));
    }
}
