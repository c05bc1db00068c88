//! Configuration files: constants, run info and the Drude parameter table.
//!
//! Everything here is fatal on error: a run never starts with a malformed
//! configuration.

use std::fs::File;
use std::path::Path;

use log::info;
use serde::de::DeserializeOwned;

use crate::domain::{Constants, ParameterTable, RunInfo};
use crate::error::AppError;
use crate::fit::required_table_names;

fn read_json<T: DeserializeOwned>(path: &Path, what: &str) -> Result<T, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::config(format!("Failed to open {what} '{}': {e}", path.display())))?;
    serde_json::from_reader(file)
        .map_err(|e| AppError::config(format!("Invalid {what} '{}': {e}", path.display())))
}

/// Physical constants; CODATA values when no file is given.
pub fn load_constants(path: Option<&Path>) -> Result<Constants, AppError> {
    match path {
        Some(p) => {
            let constants: Constants = read_json(p, "constants file")?;
            if constants.effective_mass <= 0.0 || constants.electron_mass <= 0.0 {
                return Err(AppError::config(format!(
                    "'{}': masses must be positive",
                    p.display()
                )));
            }
            info!("constants from {}", p.display());
            Ok(constants)
        }
        None => Ok(Constants::default()),
    }
}

/// `info.json`; defaults when absent.
pub fn load_info(path: Option<&Path>) -> Result<RunInfo, AppError> {
    match path {
        Some(p) if p.is_file() => read_json(p, "info file"),
        Some(p) => Err(AppError::config(format!("info file '{}' not found", p.display()))),
        None => Ok(RunInfo::default()),
    }
}

/// The Drude parameter table, validated for both fits.
pub fn load_parameter_table(path: &Path) -> Result<ParameterTable, AppError> {
    let table: ParameterTable = read_json(path, "parameter table")?;
    table
        .validate(&required_table_names())
        .map_err(|e| AppError::config(format!("'{}': {e}", path.display())))?;
    Ok(table)
}
