//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - scalar-with-error quantities (`Measured`) and physical `Constants`
//! - measurement inputs (`SampleData`, `MeasurementRecord`)
//! - fit inputs and outputs (`ParameterTable`, `ParameterSet`, `FitResult`)
//! - run configuration and skip bookkeeping (`RunConfig`, `SkipRecord`)

pub mod types;

pub use types::*;
