//! Drude fitting orchestration.
//!
//! Responsibilities:
//!
//! - build guesses and bounds for the real and imaginary fits (`guesses`)
//! - run the bounded fits and chain real into imaginary (`fitter`)

pub mod fitter;
pub mod guesses;

pub use fitter::*;
pub use guesses::*;
