//! Initial guesses and bounds for the two Drude fits.
//!
//! Both builders emit parameters in the order the target component consumes
//! them (see `DrudeComponent::parameter_names`), regardless of the order the
//! parameter table lists them in.

use crate::domain::{
    CARRIER_DENSITY, DrudeComponent, EFFECTIVE_MASS, EPSILON_INFINITY, FitResult, Measured,
    ParameterSet, ParameterTable, RELAXATION_TIME,
};
use crate::error::DrudeError;

fn table_entry(table: &ParameterTable, name: &str) -> Result<(f64, (f64, f64)), DrudeError> {
    table.lookup(name).ok_or_else(|| {
        DrudeError::MissingMeasurement(format!("parameter table has no `{name}` entry"))
    })
}

/// `[Carrier Density, Effective Mass, Epsilon Infinity]` for the real fit.
///
/// The carrier density is the measured value with bounds `N ± dN`, the lower
/// bound clamped at zero. The other two come from the table.
pub fn real_guesses_bounds(
    carrier_density: Measured,
    table: &ParameterTable,
) -> Result<ParameterSet, DrudeError> {
    if !(carrier_density.value.is_finite() && carrier_density.error.is_finite()) {
        return Err(DrudeError::FitDivergence(format!(
            "non-finite measured carrier density {:e} ± {:e}",
            carrier_density.value, carrier_density.error
        )));
    }
    let mut set = ParameterSet::default();
    set.push(
        CARRIER_DENSITY,
        carrier_density.value,
        carrier_density.lower().max(0.0),
        carrier_density.upper(),
    );
    for &name in &DrudeComponent::Real.parameter_names()[1..] {
        let (guess, (lower, upper)) = table_entry(table, name)?;
        set.push(name, guess, lower, upper);
    }
    set.check_feasible()?;
    Ok(set)
}

/// `[Carrier Density, Effective Mass, Epsilon Infinity, Relaxation Time]` for
/// the imaginary fit.
///
/// The first three are seeded from the real fit as `value ± error`. The
/// carrier density window is additionally widened by the relative `margin`
/// on both sides; carrier density and effective mass never go below zero.
pub fn imag_guesses_bounds(
    real: &FitResult,
    table: &ParameterTable,
    margin: f64,
) -> Result<ParameterSet, DrudeError> {
    if !(margin.is_finite() && margin >= 0.0) {
        return Err(DrudeError::FitDivergence(format!(
            "carrier density margin must be finite and >= 0, got {margin}"
        )));
    }
    let mut set = ParameterSet::default();
    for &name in &DrudeComponent::Real.parameter_names()[..] {
        let m = real.get(name).ok_or_else(|| {
            DrudeError::FitDivergence(format!("real fit did not report `{name}`"))
        })?;
        if !(m.value.is_finite() && m.error.is_finite()) {
            return Err(DrudeError::FitDivergence(format!(
                "real fit produced a non-finite `{name}` ({:e} ± {:e})",
                m.value, m.error
            )));
        }
        let (mut lower, mut upper) = (m.lower(), m.upper());
        if name == CARRIER_DENSITY {
            lower *= 1.0 - margin;
            upper *= 1.0 + margin;
        }
        if name == CARRIER_DENSITY || name == EFFECTIVE_MASS {
            lower = lower.max(0.0);
        }
        set.push(name, m.value, lower, upper);
    }
    let (guess, (lower, upper)) = table_entry(table, RELAXATION_TIME)?;
    set.push(RELAXATION_TIME, guess, lower, upper);

    debug_assert_eq!(set.names, DrudeComponent::Imaginary.parameter_names());
    set.check_feasible()?;
    Ok(set)
}

/// Parameter names the table must carry for both fits.
pub fn required_table_names() -> [&'static str; 3] {
    [EFFECTIVE_MASS, EPSILON_INFINITY, RELAXATION_TIME]
}
