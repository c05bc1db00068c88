//! Bounded least-squares fits of the Drude permittivity.
//!
//! Given:
//! - angular frequencies `ω_i`
//! - measured permittivity `ε_i` with per-point standard deviation `σ_i`
//! - a `ParameterSet` (guesses and bounds in model order)
//!
//! we minimise `Σ ((ε_i − model(ω_i; p)) / σ_i)²` inside the bounds and
//! report the optimum together with standard errors from the covariance
//! diagonal.
//!
//! The two-stage driver fits the real part first; its result seeds and
//! bounds the imaginary fit.

use log::{debug, info};

use crate::domain::{Constants, DrudeComponent, FitResult, Measured, ParameterSet, ParameterTable};
use crate::error::DrudeError;
use crate::fit::guesses::{imag_guesses_bounds, real_guesses_bounds};
use crate::math::{CurveData, LmOptions, curve_fit};
use crate::models::evaluate;
use crate::quantities::PermittivityPoints;

/// Fit one Drude component to measured permittivity points.
pub fn fit_component(
    component: DrudeComponent,
    omegas: &[f64],
    values: &[f64],
    errors: &[f64],
    params: &ParameterSet,
    constants: &Constants,
    opts: &LmOptions,
) -> Result<FitResult, DrudeError> {
    if omegas.len() != values.len() {
        return Err(DrudeError::mismatched(
            "angular frequency/permittivity",
            omegas.len(),
            values.len(),
        ));
    }
    if values.len() != errors.len() {
        return Err(DrudeError::mismatched(
            "permittivity/permittivity error",
            values.len(),
            errors.len(),
        ));
    }
    if params.names != component.parameter_names() {
        return Err(DrudeError::FitDivergence(format!(
            "parameters {:?} do not match the {} model order {:?}",
            params.names,
            component.label().to_lowercase(),
            component.parameter_names()
        )));
    }
    params.check_feasible()?;

    let model = |w: f64, p: &[f64]| evaluate(component, w, p, constants).unwrap_or(f64::NAN);
    let data = CurveData {
        x: omegas,
        y: values,
        sigma: errors,
    };
    let solution = curve_fit(model, data, &params.guesses, &params.lowers, &params.uppers, opts)?;

    if solution.params.iter().any(|v| !v.is_finite()) {
        return Err(DrudeError::FitDivergence(format!(
            "{} fit produced non-finite parameters",
            component.label().to_lowercase()
        )));
    }
    debug!(
        "{} fit: {} iterations, chi2 {:.4e}",
        component.label(),
        solution.iterations,
        solution.chi_square
    );

    Ok(FitResult {
        component,
        names: params.names.clone(),
        reduced_chi_square: solution.reduced_chi_square(),
        values: solution.params,
        errors: solution.std_errors,
        chi_square: solution.chi_square,
        iterations: solution.iterations,
    })
}

/// Both fits of one batch together with the parameter sets that seeded them.
#[derive(Debug, Clone, PartialEq)]
pub struct DrudeFit {
    pub real_guesses: ParameterSet,
    pub real: FitResult,
    pub imaginary_guesses: ParameterSet,
    pub imaginary: FitResult,
}

/// Fit real then imaginary permittivity.
///
/// `carrier_density` is the electrically measured density that seeds the
/// real fit; `margin` widens its window for the imaginary fit.
pub fn optimize_drude_permittivity(
    omegas: &[f64],
    permittivity: &PermittivityPoints,
    carrier_density: Measured,
    table: &ParameterTable,
    margin: f64,
    constants: &Constants,
    opts: &LmOptions,
) -> Result<DrudeFit, DrudeError> {
    let real_guesses = real_guesses_bounds(carrier_density, table)?;
    let real = fit_component(
        DrudeComponent::Real,
        omegas,
        &permittivity.real,
        &permittivity.real_error,
        &real_guesses,
        constants,
        opts,
    )?;
    info!(
        "real fit: N {:.4e}, m* {:.4}, eps_inf {:.4} (chi2/dof {:.3})",
        real.values[0], real.values[1], real.values[2], real.reduced_chi_square
    );

    let imaginary_guesses = imag_guesses_bounds(&real, table, margin)?;
    let imaginary = fit_component(
        DrudeComponent::Imaginary,
        omegas,
        &permittivity.imaginary,
        &permittivity.imaginary_error,
        &imaginary_guesses,
        constants,
        opts,
    )?;
    info!(
        "imaginary fit: tau {:.4e} s (chi2/dof {:.3})",
        imaginary.values[3], imaginary.reduced_chi_square
    );

    Ok(DrudeFit {
        real_guesses,
        real,
        imaginary_guesses,
        imaginary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::synthetic::{SyntheticTruth, generate_permittivity};
    use crate::domain::{EFFECTIVE_MASS, EPSILON_INFINITY};

    fn table() -> ParameterTable {
        serde_json::from_str(
            r#"{
                "Names": ["Effective Mass", "Epsilon Infinity", "Relaxation Time"],
                "Guesses": [0.35, 3.0, 1e-14],
                "Bounds": [[0.35, 0.35], [1.0, 10.0], [1e-16, 1e-12]]
            }"#,
        )
        .unwrap()
    }

    fn truth() -> SyntheticTruth {
        SyntheticTruth {
            carrier_density: 1e26,
            effective_mass: 0.35,
            epsilon_infinity: 3.9,
            relaxation_time: 5e-15,
            omega_start: 3e14,
            omega_stop: 2e15,
            points: 40,
            noise: 0.05,
            seed: 7,
        }
    }

    #[test]
    fn real_fit_recovers_epsilon_infinity() {
        let c = Constants::default();
        let (omegas, points) = generate_permittivity(&truth(), &c).unwrap();

        let mut params = ParameterSet::default();
        params.push(crate::domain::CARRIER_DENSITY, 1.1e26, 5e25, 2e26);
        params.push(EFFECTIVE_MASS, 0.35, 0.35, 0.35);
        params.push(EPSILON_INFINITY, 3.0, 1.0, 10.0);

        let fit = fit_component(
            DrudeComponent::Real,
            &omegas,
            &points.real,
            &points.real_error,
            &params,
            &c,
            &LmOptions::default(),
        )
        .unwrap();

        let eps = fit.get(EPSILON_INFINITY).unwrap();
        assert!((eps.value - 3.9).abs() < 0.1, "eps_inf = {}", eps.value);
        assert!((fit.values[0] / 1e26 - 1.0).abs() < 0.05, "N = {:e}", fit.values[0]);
        assert_eq!(fit.errors[1], 0.0);
        assert!(fit.errors.iter().all(|e| e.is_finite()));
    }

    #[test]
    fn two_stage_fit_feeds_imaginary_from_real() {
        let c = Constants::default();
        let (omegas, points) = generate_permittivity(&truth(), &c).unwrap();

        let fit = optimize_drude_permittivity(
            &omegas,
            &points,
            Measured::new(1.1e26, 4e25),
            &table(),
            0.1,
            &c,
            &LmOptions::default(),
        )
        .unwrap();

        assert_eq!(fit.imaginary.names.len(), 4);
        assert_eq!(fit.imaginary_guesses.guesses[0], fit.real.values[0]);
        for (i, v) in fit.imaginary.values.iter().enumerate() {
            assert!(
                fit.imaginary_guesses.lowers[i] <= *v && *v <= fit.imaginary_guesses.uppers[i],
                "{} escaped its bounds",
                fit.imaginary.names[i]
            );
        }
        let eps = fit.real.get(EPSILON_INFINITY).unwrap();
        assert!((eps.value - 3.9).abs() < 0.1, "eps_inf = {}", eps.value);
    }

    #[test]
    fn mismatched_errors_are_reported() {
        let c = Constants::default();
        let mut params = ParameterSet::default();
        params.push(crate::domain::CARRIER_DENSITY, 1e26, 5e25, 2e26);
        params.push(EFFECTIVE_MASS, 0.35, 0.1, 1.0);
        params.push(EPSILON_INFINITY, 3.9, 1.0, 10.0);
        let err = fit_component(
            DrudeComponent::Real,
            &[1e15, 2e15],
            &[1.0, 2.0],
            &[0.1],
            &params,
            &c,
            &LmOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "mismatched_lengths");
    }

    #[test]
    fn parameters_out_of_model_order_are_rejected() {
        let c = Constants::default();
        let mut params = ParameterSet::default();
        params.push(EFFECTIVE_MASS, 0.35, 0.1, 1.0);
        params.push(crate::domain::CARRIER_DENSITY, 1e26, 5e25, 2e26);
        params.push(EPSILON_INFINITY, 3.9, 1.0, 10.0);
        let err = fit_component(
            DrudeComponent::Real,
            &[1e15, 2e15, 3e15, 4e15],
            &[1.0, 2.0, 3.0, 3.5],
            &[0.1; 4],
            &params,
            &c,
            &LmOptions::default(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "fit_divergence");
    }
}
