/// One segment of a trace line, cut at a separator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cell {
    /// How many global columns this cell covers.
    pub span: usize,
    /// Cumulative column index at which the cell starts.
    pub column: usize,
    pub text: String,
}

/// One grid row, aligned with one source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub cells: Vec<Cell>,
    /// The trace line has no separator at all: source only, nothing to color.
    pub plain: bool,
}

impl Row {
    /// Total number of global columns covered by this row.
    pub fn width(&self) -> usize {
        self.cells.iter().map(|c| c.span).sum()
    }
}

/// Rows aligned 1:1 with source lines. Built once per trace; never patched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScopeGrid {
    rows: Vec<Row>,
    separators: Vec<usize>,
}

impl ScopeGrid {
    pub(crate) fn new(rows: Vec<Row>, separators: Vec<usize>) -> Self {
        Self { rows, separators }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Global separator offsets, ascending.
    pub fn separators(&self) -> &[usize] {
        &self.separators
    }

    /// Number of global columns every row spans.
    pub fn column_count(&self) -> usize {
        self.separators.len() + 1
    }
}
