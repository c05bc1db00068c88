//! Drude permittivity components as fit targets.
//!
//! Each component consumes its parameters in the order given by
//! [`DrudeComponent::parameter_names`]:
//!
//! - real: `[N, m*, ε∞]`
//! - imaginary: `[N, m*, ε∞, τ]`
//!
//! `m*` is the dimensionless effective-mass multiplier; it is scaled by the
//! electron mass here.

use crate::domain::{Constants, DrudeComponent};
use crate::error::DrudeError;
use crate::models::equations::{drude_imag, drude_real, plasma_frequency};

/// Evaluate one component at angular frequency `omega` (rad/s).
pub fn evaluate(
    component: DrudeComponent,
    omega: f64,
    params: &[f64],
    constants: &Constants,
) -> Result<f64, DrudeError> {
    if params.len() != component.param_count() {
        return Err(DrudeError::mismatched(
            format!("{} Drude parameters", component.label().to_lowercase()),
            params.len(),
            component.param_count(),
        ));
    }
    let wp = plasma_frequency(
        params[0],
        constants.electron_charge,
        constants.epsilon_naught,
        params[1] * constants.electron_mass,
    )?;
    Ok(match component {
        DrudeComponent::Real => drude_real(params[2], wp, omega),
        DrudeComponent::Imaginary => drude_imag(params[2], wp, omega, params[3]),
    })
}

/// Evaluate one component over a grid of angular frequencies.
pub fn curve(
    component: DrudeComponent,
    omegas: &[f64],
    params: &[f64],
    constants: &Constants,
) -> Result<Vec<f64>, DrudeError> {
    omegas
        .iter()
        .map(|&w| evaluate(component, w, params, constants))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn real_component_matches_equations() {
        let c = Constants::default();
        let params = [1e26, 0.35, 3.9];
        let wp = plasma_frequency(1e26, c.electron_charge, c.epsilon_naught, 0.35 * c.electron_mass)
            .unwrap();
        let got = evaluate(DrudeComponent::Real, 1e15, &params, &c).unwrap();
        assert_relative_eq!(got, drude_real(3.9, wp, 1e15), max_relative = 1e-15);
    }

    #[test]
    fn imaginary_component_uses_relaxation_time() {
        let c = Constants::default();
        let a = evaluate(DrudeComponent::Imaginary, 1e15, &[1e26, 0.35, 3.9, 1e-14], &c).unwrap();
        let b = evaluate(DrudeComponent::Imaginary, 1e15, &[1e26, 0.35, 3.9, 2e-14], &c).unwrap();
        assert_relative_eq!(a, 2.0 * b, max_relative = 1e-12);
    }

    #[test]
    fn wrong_parameter_count_is_rejected() {
        let c = Constants::default();
        let err = evaluate(DrudeComponent::Imaginary, 1e15, &[1e26, 0.35, 3.9], &c).unwrap_err();
        assert_eq!(err.kind(), "mismatched_lengths");
    }

    #[test]
    fn curve_covers_grid() {
        let c = Constants::default();
        let ys = curve(DrudeComponent::Real, &[1e15, 2e15, 3e15], &[1e26, 0.35, 3.9], &c).unwrap();
        assert_eq!(ys.len(), 3);
        assert!(ys.windows(2).all(|w| w[1] > w[0]));
    }
}
