//! Board configuration, read from `.kanban/config.yaml`.
//!
//! ```yaml
//! calendar_name: Team Board
//! history_page_size: 25
//! targets:
//!   - kind: ical
//!     path: .kanban/kanban.ics
//!   - kind: command
//!     name: google
//!     program: gog
//!     args: ["calendar", "create", "--summary", "{summary}", "--from", "{due_date}"]
//! ```

use crate::calendar::{CommandTarget, IcalFileTarget, SyncTarget};
use crate::history::DEFAULT_PAGE_SIZE;
use crate::storage::KANBAN_DIR;
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file name inside the `.kanban` directory.
pub const CONFIG_FILE: &str = "config.yaml";

/// Calendar file written by the default target.
pub const DEFAULT_CALENDAR_FILE: &str = "kanban.ics";

fn default_calendar_name() -> String {
    "Kanban Board".to_string()
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_targets() -> Vec<TargetConfig> {
    vec![TargetConfig::Ical {
        path: Path::new(KANBAN_DIR).join(DEFAULT_CALENDAR_FILE),
    }]
}

/// Settings for one board.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BoardConfig {
    /// Shown as the calendar name in iCal exports.
    #[serde(default = "default_calendar_name")]
    pub calendar_name: String,

    /// Default page size for completion history.
    #[serde(default = "default_page_size")]
    pub history_page_size: usize,

    /// Where `sync` pushes the board.
    #[serde(default = "default_targets")]
    pub targets: Vec<TargetConfig>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            calendar_name: default_calendar_name(),
            history_page_size: default_page_size(),
            targets: default_targets(),
        }
    }
}

/// One configured sync destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TargetConfig {
    /// Write an `.ics` file. Relative paths resolve against the board root.
    Ical { path: PathBuf },
    /// Run an external program once per dated item.
    Command {
        name: String,
        program: String,
        #[serde(default)]
        args: Vec<String>,
    },
}

impl BoardConfig {
    /// Load the config for the board at `root`. A missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self> {
        let path = Self::path(root);
        if !path.exists() {
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content =
            std::fs::read_to_string(&path).wrap_err_with(|| format!("Failed to read {}", path.display()))?;
        Self::parse(&content).wrap_err_with(|| format!("Invalid config in {}", path.display()))
    }

    /// Parse config from YAML text. Empty text yields defaults.
    pub fn parse(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content).context("Failed to parse config YAML")?;
        if config.history_page_size == 0 {
            eyre::bail!("history_page_size must be at least 1");
        }
        Ok(config)
    }

    /// Path of the config file for the board at `root`.
    pub fn path(root: &Path) -> PathBuf {
        root.join(KANBAN_DIR).join(CONFIG_FILE)
    }

    /// Instantiate the configured sync targets for the board at `root`.
    pub fn build_targets(&self, root: &Path) -> Vec<Box<dyn SyncTarget>> {
        self.targets
            .iter()
            .map(|target| -> Box<dyn SyncTarget> {
                match target {
                    TargetConfig::Ical { path } => {
                        let path = if path.is_absolute() { path.clone() } else { root.join(path) };
                        Box::new(IcalFileTarget::new("ical", path))
                    }
                    TargetConfig::Command { name, program, args } => {
                        Box::new(CommandTarget::new(name.clone(), program.clone(), args.clone()))
                    }
                }
            })
            .collect()
    }
}
