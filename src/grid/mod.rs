mod builder;
mod types;

pub use builder::{build_grid, build_row, separator_offsets, split_lines, SEPARATOR};
pub use types::{Cell, Row, ScopeGrid};
