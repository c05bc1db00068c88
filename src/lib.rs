//! `drude-fit` library crate.
//!
//! The binary (`drude`) is a thin wrapper around this library so that:
//!
//! - the physics and fitting code is testable without spawning processes
//! - modules are reusable from notebooks or other front-ends
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod data;
pub mod domain;
pub mod error;
pub mod fit;
pub mod io;
pub mod math;
pub mod models;
pub mod quantities;
pub mod report;
