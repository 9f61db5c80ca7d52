mod map;
mod patterns;
mod placement;

pub use map::LineAttributionMap;
pub use patterns::{assigned_names, loop_targets};
pub use placement::{place_variables, VariablePlacement};
