// src/watch/filter.rs

use crate::graph::stage::FilePattern;

/// Basename filter for one stage, installed on its watcher.
///
/// Evaluation is last-match-wins: the pattern list is scanned from the end
/// toward the beginning and the first regex matching the basename decides
/// (`exclude` rejects, otherwise accept). A basename matching nothing is
/// rejected.
#[derive(Debug, Clone)]
pub struct PatternFilter {
    patterns: Vec<FilePattern>,
}

impl PatternFilter {
    pub fn new(patterns: Vec<FilePattern>) -> Self {
        Self { patterns }
    }

    pub fn accepts(&self, basename: &str) -> bool {
        for pattern in self.patterns.iter().rev() {
            if pattern.is_match(basename) {
                return !pattern.exclude;
            }
        }
        false
    }
}
