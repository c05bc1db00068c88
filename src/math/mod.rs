//! Mathematical utilities: uncertainty propagation, grids and bounded least squares.

pub mod grid;
pub mod lm;
pub mod uncertainty;

pub use grid::*;
pub use lm::*;
pub use uncertainty::*;
