//! Input/output helpers.
//!
//! - measurement ingest: CSV, sample JSON, S4 JSON, `.fitnk` (`ingest`)
//! - configuration files (`config`)
//! - batch file discovery (`discover`)
//! - JSON record export (`export`)

pub mod config;
pub mod discover;
pub mod export;
pub mod ingest;

pub use config::*;
pub use discover::*;
pub use export::*;
pub use ingest::*;
