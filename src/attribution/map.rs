use super::patterns::{assigned_names, loop_targets};
use crate::grid::split_lines;
use std::collections::HashMap;

/// Best-effort name → line index guess for trace entries without a line number.
///
/// Built from a per-line pattern scan only: there is no knowledge of control
/// flow, scopes or shadowing. A name assigned in a function body and again at
/// module level maps to whichever line comes first in the file.
#[derive(Debug, Clone, Default)]
pub struct LineAttributionMap {
    lines: HashMap<String, usize>,
    line_count: usize,
}

impl LineAttributionMap {
    /// Scan the full document text once. The first binding of a name wins.
    pub fn build(text: &str) -> Self {
        let source_lines = split_lines(text);
        let mut lines = HashMap::new();

        for (i, line) in source_lines.iter().enumerate() {
            for name in assigned_names(line).into_iter().chain(loop_targets(line)) {
                lines.entry(name.to_string()).or_insert(i);
            }
        }

        Self {
            lines,
            line_count: source_lines.len(),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<usize> {
        self.lines.get(name).copied()
    }

    /// Line used when a name has no binding: the last line, or 0 when empty.
    pub fn fallback_line(&self) -> usize {
        self.line_count.saturating_sub(1)
    }

    /// `lookup`, falling back to [`Self::fallback_line`].
    pub fn line_for(&self, name: &str) -> usize {
        self.lookup(name).unwrap_or_else(|| self.fallback_line())
    }

    pub fn line_count(&self) -> usize {
        self.line_count
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
