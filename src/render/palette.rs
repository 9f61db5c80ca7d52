use crate::grid::{Cell, Row};

/// Saturated swatches, indexed by column ordinal.
pub const PALETTE: [&str; 8] = [
    "#90CAF9", // blue
    "#A5D6A7", // green
    "#EF9A9A", // red
    "#FFF59D", // yellow
    "#CE93D8", // purple
    "#FFCC80", // orange
    "#80CBC4", // teal
    "#9FA8DA", // indigo
];

/// Fill for rows that carry no trace data.
pub const NEUTRAL: &str = "#f5f5f5";

pub fn column_color(column: usize) -> &'static str {
    PALETTE[column % PALETTE.len()]
}

pub fn cell_color(row: &Row, cell: &Cell) -> &'static str {
    if row.plain {
        NEUTRAL
    } else {
        column_color(cell.column)
    }
}
