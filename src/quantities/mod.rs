//! Derived physical quantities with propagated errors.
//!
//! Lab files carry convenient units (nm, cm²/Vs, THz); everything is
//! converted to SI here before it reaches `models::equations`.
//!
//! - electrical path: sheet resistance → conductivity → carrier density →
//!   plasma frequency → Drude curve (`electrical`)
//! - optical path: refractive index, extinction and resonances → permittivity
//!   points and angular frequencies (`optical`)

use crate::domain::Measured;
use crate::error::DrudeError;

pub mod electrical;
pub mod optical;

pub use electrical::*;
pub use optical::*;

/// nm → m
pub const NANOMETRE: f64 = 1e-9;
/// cm²/Vs → m²/Vs
pub const CM2_PER_VS: f64 = 1e-4;
/// THz → Hz
pub const TERAHERTZ: f64 = 1e12;

/// Read a `[value, error]` field from a sample file.
pub(crate) fn scalar_field(name: &str, values: &[f64]) -> Result<Measured, DrudeError> {
    match values {
        [] => Err(DrudeError::MissingMeasurement(format!("`{name}` is absent or empty"))),
        [_] => Err(DrudeError::MissingMeasurement(format!("`{name}` has no error entry"))),
        [value, error, ..] => Ok(Measured::new(*value, *error)),
    }
}

pub(crate) fn ensure_same_len(what: &str, left: usize, right: usize) -> Result<(), DrudeError> {
    if left != right {
        return Err(DrudeError::mismatched(what, left, right));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_field_needs_value_and_error() {
        assert_eq!(scalar_field("x", &[1.0, 0.1]).unwrap(), Measured::new(1.0, 0.1));
        assert!(scalar_field("x", &[]).is_err());
        assert!(scalar_field("x", &[1.0]).is_err());
    }
}
