use super::types::{Cell, Row, ScopeGrid};
use std::collections::BTreeSet;

/// Column separator the tracer writes between nested scopes.
pub const SEPARATOR: char = '|';

/// Split text into lines. A trailing newline does not add an empty line.
pub fn split_lines(text: &str) -> Vec<&str> {
    text.lines().collect()
}

/// Union of every separator offset (in chars) across all trace lines, ascending.
pub fn separator_offsets(trace_lines: &[&str]) -> Vec<usize> {
    let offsets: BTreeSet<usize> = trace_lines
        .iter()
        .flat_map(|line| {
            line.chars()
                .enumerate()
                .filter(|(_, ch)| *ch == SEPARATOR)
                .map(|(i, _)| i)
        })
        .collect();
    offsets.into_iter().collect()
}

/// Cut one trace line against the global separator offsets.
///
/// A global offset where this line has no separator is not a boundary for
/// the row: the pending cell widens by one column instead.
pub fn build_row(line: &str, separators: &[usize]) -> Row {
    let chars: Vec<char> = line.chars().collect();
    let mut cells = Vec::with_capacity(separators.len() + 1);

    let mut segment_start = 0usize;
    let mut span = 1usize;
    let mut column = 0usize;

    for &offset in separators {
        if chars.get(offset) == Some(&SEPARATOR) {
            cells.push(Cell {
                span,
                column,
                text: chars[segment_start..offset].iter().collect(),
            });
            segment_start = offset + 1;
            column += span;
            span = 1;
        } else {
            span += 1;
        }
    }

    let rest = if segment_start < chars.len() {
        chars[segment_start..].iter().collect()
    } else {
        String::new()
    };
    cells.push(Cell {
        span,
        column,
        text: rest,
    });

    Row {
        cells,
        plain: !chars.contains(&SEPARATOR),
    }
}

/// Build the grid for a source text and the tracer's output.
///
/// Row count always equals the source line count. Missing trace lines count
/// as empty; trace lines past the end of the source are only used for the
/// separator set.
pub fn build_grid(source: &str, trace: &str) -> ScopeGrid {
    let source_lines = split_lines(source);
    let trace_lines = split_lines(trace);
    let separators = separator_offsets(&trace_lines);

    let rows = (0..source_lines.len())
        .map(|i| build_row(trace_lines.get(i).copied().unwrap_or(""), &separators))
        .collect();

    ScopeGrid::new(rows, separators)
}
