use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use cst_core::{CsTreeError, NodeKind};

use crate::{map_cli_config_encode, map_cli_config_parse, map_cli_config_read, map_cli_config_write};

const DEFAULT_COLORS: [(&str, &str); 16] = [
    ("guide_style", "blue"),
    ("linenum", "bold yellow"),
    ("choice", "red"),
    ("option", "orange3"),
    ("label", "bold plum3"),
    ("gototarget", "plum4"),
    ("text", "white"),
    ("goto", "white"),
    ("varcmd", "white"),
    ("varname", "green"),
    ("varvalue", "grey46"),
    ("cond", "magenta"),
    ("path", "grey46"),
    ("equals", "grey37"),
    ("note", "grey37"),
    ("branch", "bold cyan"),
];

const DEFAULT_VARIABLE_PALETTE: [&str; 12] = [
    "dark_red",
    "orange4",
    "dark_green",
    "dark_blue",
    "purple4",
    "deep_pink3",
    "red3",
    "orange3",
    "yellow2",
    "light_green",
    "sky_blue1",
    "pink1",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct MainSection {
    /// Style of the current node in the browser.
    pub(crate) selected: String,
    /// Node kinds `--squash` squashes.
    pub(crate) squash: Vec<String>,
    /// Background colors assigned to variables in registry order.
    pub(crate) variable_palette: Vec<String>,
}

impl Default for MainSection {
    fn default() -> Self {
        Self {
            selected: "reverse".to_string(),
            squash: vec!["goto".to_string(), "text".to_string()],
            variable_palette: DEFAULT_VARIABLE_PALETTE
                .iter()
                .map(|name| name.to_string())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct CliConfig {
    pub(crate) main: MainSection,
    pub(crate) colors: BTreeMap<String, String>,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            main: MainSection::default(),
            colors: DEFAULT_COLORS
                .iter()
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .collect(),
        }
    }
}

impl CliConfig {
    pub(crate) fn from_file(path: &Path) -> Result<Self, CsTreeError> {
        let content = fs::read_to_string(path).map_err(map_cli_config_read)?;
        let mut config: Self = toml::from_str(&content).map_err(map_cli_config_parse)?;
        // Partial `[colors]` tables only override the keys they name.
        for (key, value) in DEFAULT_COLORS {
            config
                .colors
                .entry(key.to_string())
                .or_insert_with(|| value.to_string());
        }
        Ok(config)
    }

    pub(crate) fn to_file(&self, path: &Path) -> Result<(), CsTreeError> {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(map_cli_config_write)?;
        }
        fs::write(path, self.to_toml()?).map_err(map_cli_config_write)
    }

    pub(crate) fn to_toml(&self) -> Result<String, CsTreeError> {
        toml::to_string_pretty(self).map_err(map_cli_config_encode)
    }

    pub(crate) fn squash_kinds(&self) -> Result<BTreeSet<NodeKind>, CsTreeError> {
        self.main
            .squash
            .iter()
            .map(|name| {
                name.parse::<NodeKind>().map_err(|error| {
                    CsTreeError::malformed(
                        "CLI_CONFIG_SQUASH_KIND",
                        format!("Unknown squash kind in config: {}", error.message),
                    )
                })
            })
            .collect()
    }
}

pub(crate) fn default_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("cstree").join("config.toml"))
}

/// An explicit path must exist; the default path falls back to built-in
/// defaults when the file is absent.
pub(crate) fn load_config(explicit: Option<&str>) -> Result<CliConfig, CsTreeError> {
    if let Some(path) = explicit {
        let path = Path::new(path);
        if !path.exists() {
            return Err(CsTreeError::io(
                "CLI_CONFIG_NOT_FOUND",
                format!("Config file does not exist: {}", path.display()),
            ));
        }
        return CliConfig::from_file(path);
    }

    match default_config_path() {
        Some(path) if path.exists() => CliConfig::from_file(&path),
        _ => {
            debug!("no config file found, using defaults");
            Ok(CliConfig::default())
        }
    }
}
