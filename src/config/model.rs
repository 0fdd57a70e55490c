// src/config/model.rs

use std::collections::BTreeMap;

use serde::Deserialize;

/// Top-level configuration as read from `multiwatch.toml`.
///
/// ```toml
/// loglevel = "debug"
///
/// [compile]
/// dir = "src"
/// cmd = ["make", "build"]
///
/// [test]
/// cmd = ["make", "test"]
/// depends = ["compile", { stage = "lint", async = true }]
/// files = [".*\\.go", { pattern = "^\\..*", exclude = true }]
/// ```
///
/// `dirname` and `loglevel` are the only reserved keys; every other
/// top-level table is a stage spec, keyed by its stage name.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawConfig {
    /// Search path override. Only effective via `--dirname` / `MW_DIRNAME`;
    /// accepted here so the key is never mistaken for a stage name.
    #[serde(default)]
    pub dirname: Option<String>,

    /// One of `trace|debug|info|warn|error|fatal|panic`.
    #[serde(default)]
    pub loglevel: Option<String>,

    /// All stages, keyed by name.
    #[serde(flatten)]
    pub stages: BTreeMap<String, StageSpec>,
}

/// A single `[<stage>]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StageSpec {
    /// Root directory to observe.
    #[serde(default = "default_dir")]
    pub dir: String,

    /// Whether subdirectories are observed.
    #[serde(default = "default_true")]
    pub recursive: bool,

    /// Argv of the command to (re)spawn; `cmd[0]` is the executable.
    #[serde(default = "default_cmd")]
    pub cmd: Vec<String>,

    /// If true, an outstanding child is killed before spawning a new one;
    /// otherwise the new spawn waits for it.
    #[serde(default = "default_true", rename = "early-terminate")]
    pub early_terminate: bool,

    /// If true, spawn once at graph boot with an empty trigger.
    #[serde(default = "default_true")]
    pub start: bool,

    /// Upstream stages this one reloads on.
    #[serde(default)]
    pub depends: Vec<DependsItem>,

    /// Basename filters, evaluated last-match-wins.
    #[serde(default = "default_files")]
    pub files: Vec<PatternItem>,
}

/// One entry of `depends`: a bare stage name (sync edge) or an inline table
/// with an explicit `async` discriminator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DependsItem {
    Name(String),
    Edge {
        stage: String,
        #[serde(default)]
        r#async: bool,
    },
}

impl DependsItem {
    /// Name of the upstream stage this entry points at.
    pub fn stage(&self) -> &str {
        match self {
            DependsItem::Name(name) => name,
            DependsItem::Edge { stage, .. } => stage,
        }
    }

    /// Whether this is an async edge (notified at upstream spawn time).
    pub fn is_async(&self) -> bool {
        match self {
            DependsItem::Name(_) => false,
            DependsItem::Edge { r#async, .. } => *r#async,
        }
    }
}

/// One entry of `files`: a bare include regex or an inline table with an
/// explicit `exclude` discriminator.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum PatternItem {
    Bare(String),
    Qualified {
        pattern: String,
        #[serde(default)]
        exclude: bool,
    },
}

impl PatternItem {
    /// The regex source of this entry.
    pub fn pattern(&self) -> &str {
        match self {
            PatternItem::Bare(pattern) => pattern,
            PatternItem::Qualified { pattern, .. } => pattern,
        }
    }

    /// Whether a match rejects instead of accepts.
    pub fn is_exclude(&self) -> bool {
        match self {
            PatternItem::Bare(_) => false,
            PatternItem::Qualified { exclude, .. } => *exclude,
        }
    }
}

fn default_dir() -> String {
    ".".to_string()
}

fn default_true() -> bool {
    true
}

fn default_cmd() -> Vec<String> {
    vec!["echo".to_string(), "No command provided".to_string()]
}

/// Default filter set: everything except dotfiles.
fn default_files() -> Vec<PatternItem> {
    vec![
        PatternItem::Bare(".*".to_string()),
        PatternItem::Qualified {
            pattern: "^\\..*".to_string(),
            exclude: true,
        },
    ]
}
