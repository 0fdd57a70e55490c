// src/graph/stage.rs

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use regex::Regex;
use tracing::warn;

use crate::config::model::{RawConfig, StageSpec};

/// When a downstream stage is notified by an upstream edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeMode {
    /// Notified when the upstream's child exits.
    Sync,
    /// Notified when the upstream's child spawns.
    Async,
}

/// A directed dependency edge, as seen from the downstream stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    pub stage: String,
    pub mode: EdgeMode,
}

/// A compiled basename filter entry.
///
/// Keeps the regex source alongside the compiled form so stages and graphs
/// stay comparable.
#[derive(Debug, Clone)]
pub struct FilePattern {
    source: String,
    regex: Regex,
    pub exclude: bool,
}

impl FilePattern {
    pub fn compile(source: &str, exclude: bool) -> Result<Self> {
        let regex = Regex::new(source)
            .with_context(|| format!("compiling file pattern regex {:?}", source))?;
        Ok(Self {
            source: source.to_string(),
            regex,
            exclude,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn is_match(&self, basename: &str) -> bool {
        self.regex.is_match(basename)
    }
}

impl PartialEq for FilePattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source && self.exclude == other.exclude
    }
}

impl Eq for FilePattern {}

/// A named unit of work: a watched directory, a basename filter set, a
/// command, and dependency edges onto other stages.
#[derive(Debug, Clone, PartialEq)]
pub struct Stage {
    pub name: String,
    pub dir: PathBuf,
    pub recursive: bool,
    pub files: Vec<FilePattern>,
    pub cmd: Vec<String>,
    pub early_terminate: bool,
    pub start: bool,
    pub dependencies: Vec<Dependency>,
}

/// The full stage graph, keyed by stage name.
///
/// Built from a validated [`RawConfig`]; dependency references are known to
/// exist and to be acyclic by the time this is constructed.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StageGraph {
    stages: BTreeMap<String, Stage>,
}

impl StageGraph {
    /// Compile a validated raw config into a stage graph.
    ///
    /// File patterns that fail to compile are warned and dropped; the
    /// stage's remaining patterns still apply.
    pub fn from_raw(cfg: &RawConfig) -> Self {
        let mut stages = BTreeMap::new();

        for (name, spec) in cfg.stages.iter() {
            stages.insert(name.clone(), compile_stage(name, spec));
        }

        Self { stages }
    }

    pub fn get(&self, name: &str) -> Option<&Stage> {
        self.stages.get(name)
    }

    pub fn stages(&self) -> impl Iterator<Item = &Stage> {
        self.stages.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.stages.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

fn compile_stage(name: &str, spec: &StageSpec) -> Stage {
    let mut files = Vec::with_capacity(spec.files.len());
    for item in spec.files.iter() {
        match FilePattern::compile(item.pattern(), item.is_exclude()) {
            Ok(pattern) => files.push(pattern),
            Err(err) => {
                warn!(
                    stage = %name,
                    pattern = %item.pattern(),
                    error = %err,
                    "invalid file pattern; dropping it"
                );
            }
        }
    }

    let dependencies = spec
        .depends
        .iter()
        .map(|dep| Dependency {
            stage: dep.stage().to_string(),
            mode: if dep.is_async() {
                EdgeMode::Async
            } else {
                EdgeMode::Sync
            },
        })
        .collect();

    Stage {
        name: name.to_string(),
        dir: PathBuf::from(&spec.dir),
        recursive: spec.recursive,
        files,
        cmd: spec.cmd.clone(),
        early_terminate: spec.early_terminate,
        start: spec.start,
        dependencies,
    }
}
