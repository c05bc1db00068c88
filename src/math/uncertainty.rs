//! Sample statistics and uncertainty propagation.
//!
//! Every derived quantity that is reported with an error gets that error from
//! one of two primitives:
//!
//! - [`quadrature_error`] for products, quotients and powers: relative errors
//!   add in quadrature. A power `x^k` enters as the pair `(x, k·dx)`.
//! - [`absolute_quadrature`] for sums and differences: absolute errors add in
//!   quadrature.

use crate::error::DrudeError;

/// Arithmetic mean. `None` for an empty slice.
pub fn mean(x: &[f64]) -> Option<f64> {
    if x.is_empty() {
        return None;
    }
    Some(x.iter().sum::<f64>() / x.len() as f64)
}

/// Population standard deviation (`ddof = 0`).
pub fn standard_deviation(x: &[f64]) -> Option<f64> {
    let m = mean(x)?;
    let var = x.iter().map(|v| (v - m) * (v - m)).sum::<f64>() / x.len() as f64;
    Some(var.sqrt())
}

/// Standard error of the mean, `std / sqrt(n - 1)`.
///
/// Needs at least two samples.
pub fn standard_error_mean(x: &[f64]) -> Result<f64, DrudeError> {
    if x.len() < 2 {
        return Err(DrudeError::MissingMeasurement(format!(
            "standard error needs at least 2 readings, got {}",
            x.len()
        )));
    }
    let std = standard_deviation(x).unwrap_or(0.0);
    Ok(std / ((x.len() - 1) as f64).sqrt())
}

/// Propagate independent uncertainties of `variables` into `value`:
///
/// `value * sqrt(Σ (error_i / variable_i)^2)`
///
/// `variables` and `errors` must pair up one-to-one in the same order.
pub fn quadrature_error(value: f64, variables: &[f64], errors: &[f64]) -> Result<f64, DrudeError> {
    if variables.len() != errors.len() {
        return Err(DrudeError::mismatched(
            "quadrature variables/errors",
            variables.len(),
            errors.len(),
        ));
    }
    let mut sum = 0.0;
    for (&v, &e) in variables.iter().zip(errors) {
        if v == 0.0 {
            return Err(DrudeError::DivisionByZero(
                "quadrature error (zero-valued variable)".to_string(),
            ));
        }
        let rel = e / v;
        sum += rel * rel;
    }
    // Magnitude only: a negative value (e.g. a negative permittivity) still has a positive error.
    Ok((value * sum.sqrt()).abs())
}

/// Combine absolute errors of summed or subtracted terms: `sqrt(Σ error_i^2)`.
pub fn absolute_quadrature(errors: &[f64]) -> f64 {
    errors.iter().map(|e| e * e).sum::<f64>().sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn quadrature_is_order_independent() {
        let a = quadrature_error(10.0, &[2.0, 5.0, 8.0], &[0.1, 0.4, 0.2]).unwrap();
        let b = quadrature_error(10.0, &[8.0, 2.0, 5.0], &[0.2, 0.1, 0.4]).unwrap();
        assert_relative_eq!(a, b, max_relative = 1e-15);
    }

    #[test]
    fn quadrature_zero_errors_gives_zero() {
        let e = quadrature_error(42.0, &[1.0, 2.0, 3.0], &[0.0, 0.0, 0.0]).unwrap();
        assert_eq!(e, 0.0);
    }

    #[test]
    fn quadrature_single_variable_keeps_relative_error() {
        // 1% on the input is 1% on the output.
        let e = quadrature_error(250.0, &[50.0], &[0.5]).unwrap();
        assert_relative_eq!(e, 2.5, max_relative = 1e-12);
    }

    #[test]
    fn quadrature_rejects_zero_variable() {
        let err = quadrature_error(1.0, &[0.0], &[0.1]).unwrap_err();
        assert_eq!(err.kind(), "division_by_zero");
    }

    #[test]
    fn quadrature_rejects_mismatched_lengths() {
        let err = quadrature_error(1.0, &[1.0, 2.0], &[0.1]).unwrap_err();
        assert_eq!(
            err,
            DrudeError::mismatched("quadrature variables/errors", 2, 1)
        );
    }

    #[test]
    fn quadrature_of_negative_value_is_positive() {
        let e = quadrature_error(-4.0, &[2.0], &[0.2]).unwrap();
        assert_relative_eq!(e, 0.4, max_relative = 1e-12);
    }

    #[test]
    fn absolute_quadrature_is_root_sum_square() {
        assert_relative_eq!(absolute_quadrature(&[3.0, 4.0]), 5.0);
        assert_eq!(absolute_quadrature(&[]), 0.0);
    }

    #[test]
    fn sample_statistics() {
        let x = [2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0];
        assert_relative_eq!(mean(&x).unwrap(), 5.0);
        assert_relative_eq!(standard_deviation(&x).unwrap(), 2.0);
        assert_relative_eq!(standard_error_mean(&x).unwrap(), 2.0 / 7f64.sqrt());
        assert!(mean(&[]).is_none());
        assert!(standard_error_mean(&[1.0]).is_err());
    }
}
