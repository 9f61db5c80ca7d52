//! Live execution traces for Python source, re-run as the user types.
//!
//! The pipeline: [`scheduler`] decides when the external tracer runs,
//! [`grid`] rebuilds its aligned output into rows and columns, [`render`]
//! turns that into HTML, and [`attribution`] guesses source lines for
//! variables that arrive without one. [`host`] wires it all to an editor over
//! stdio.

pub mod attribution;
pub mod config;
pub mod error;
pub mod grid;
pub mod host;
pub mod interpreter;
pub mod logging;
pub mod render;
pub mod scheduler;
