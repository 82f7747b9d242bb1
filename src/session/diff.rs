//! Line diff between the reference markdown and the raw source.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "op", content = "line", rename_all = "lowercase")]
pub enum DiffLine {
    Same(String),
    Added(String),
    Removed(String),
}

impl DiffLine {
    /// Unified-diff style rendering of one line.
    pub fn render(&self) -> String {
        match self {
            Self::Same(line) => format!("  {line}"),
            Self::Added(line) => format!("+ {line}"),
            Self::Removed(line) => format!("- {line}"),
        }
    }
}

/// Longest-common-subsequence diff of `old` against `new`, line by line.
pub fn line_diff(old: &str, new: &str) -> Vec<DiffLine> {
    let old: Vec<&str> = old.lines().collect();
    let new: Vec<&str> = new.lines().collect();

    // lengths[i][j]: LCS of old[i..] and new[j..]
    let mut lengths = vec![vec![0usize; new.len() + 1]; old.len() + 1];
    for i in (0..old.len()).rev() {
        for j in (0..new.len()).rev() {
            lengths[i][j] = if old[i] == new[j] {
                lengths[i + 1][j + 1] + 1
            } else {
                lengths[i + 1][j].max(lengths[i][j + 1])
            };
        }
    }

    let mut out = Vec::with_capacity(old.len().max(new.len()));
    let (mut i, mut j) = (0, 0);
    while i < old.len() && j < new.len() {
        if old[i] == new[j] {
            out.push(DiffLine::Same(old[i].to_string()));
            i += 1;
            j += 1;
        } else if lengths[i + 1][j] >= lengths[i][j + 1] {
            out.push(DiffLine::Removed(old[i].to_string()));
            i += 1;
        } else {
            out.push(DiffLine::Added(new[j].to_string()));
            j += 1;
        }
    }
    out.extend(old[i..].iter().map(|line| DiffLine::Removed((*line).to_string())));
    out.extend(new[j..].iter().map(|line| DiffLine::Added((*line).to_string())));
    out
}

/// Whether a diff has any change at all.
pub fn has_changes(diff: &[DiffLine]) -> bool {
    diff.iter().any(|line| !matches!(line, DiffLine::Same(_)))
}
