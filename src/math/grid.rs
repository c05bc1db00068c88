//! Frequency grids and 1-D interpolation.

use crate::error::DrudeError;

/// Largest grid `arange` will build.
pub const MAX_GRID_POINTS: usize = 1_000_000;

/// Values `start, start + step, ...` strictly before `stop` (numpy `arange`).
///
/// A zero step, a non-finite input, a step pointing away from `stop` or a
/// grid above [`MAX_GRID_POINTS`] is an error.
pub fn arange(start: f64, stop: f64, step: f64) -> Result<Vec<f64>, DrudeError> {
    if !(start.is_finite() && stop.is_finite() && step.is_finite()) || step == 0.0 {
        return Err(DrudeError::MissingMeasurement(format!(
            "invalid frequency range [{start}, {stop}, {step}]"
        )));
    }
    let n = ((stop - start) / step).ceil();
    if n <= 0.0 {
        return Err(DrudeError::MissingMeasurement(format!(
            "frequency range [{start}, {stop}, {step}] is empty"
        )));
    }
    if n > MAX_GRID_POINTS as f64 {
        return Err(DrudeError::MissingMeasurement(format!(
            "frequency range [{start}, {stop}, {step}] has {n:e} points, more than {MAX_GRID_POINTS}"
        )));
    }
    let n = n as usize;
    Ok((0..n).map(|i| start + step * i as f64).collect())
}

/// Piecewise-linear interpolation of `(xp, fp)` at `x` (numpy `interp`).
///
/// Points outside the sampled range take the nearest end value. `xp` need
/// not be sorted.
pub fn interp(x: &[f64], xp: &[f64], fp: &[f64]) -> Result<Vec<f64>, DrudeError> {
    if xp.len() != fp.len() {
        return Err(DrudeError::mismatched("interpolation xp/fp", xp.len(), fp.len()));
    }
    if xp.is_empty() {
        return Err(DrudeError::MissingMeasurement("no points to interpolate".to_string()));
    }

    let mut pairs: Vec<(f64, f64)> = xp.iter().copied().zip(fp.iter().copied()).collect();
    pairs.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let first = pairs[0];
    let last = pairs[pairs.len() - 1];

    Ok(x.iter()
        .map(|&xi| {
            if xi <= first.0 {
                return first.1;
            }
            if xi >= last.0 {
                return last.1;
            }
            // First index with pairs[idx].0 > xi; idx >= 1 because xi > first.0.
            let idx = pairs.partition_point(|p| p.0 <= xi);
            let (x0, y0) = pairs[idx - 1];
            let (x1, y1) = pairs[idx];
            if x1 == x0 {
                return y0;
            }
            y0 + (y1 - y0) * (xi - x0) / (x1 - x0)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arange_excludes_stop() {
        let v = arange(1.0, 4.0, 1.0).unwrap();
        assert_eq!(v, vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn arange_counts_down() {
        let v = arange(900.0, 1.0, -1.0).unwrap();
        assert_eq!(v.len(), 899);
        assert_eq!(v[0], 900.0);
        assert_eq!(v[v.len() - 1], 2.0);
    }

    #[test]
    fn arange_rejects_bad_steps() {
        assert!(arange(1.0, 4.0, 0.0).is_err());
        assert!(arange(1.0, 4.0, -1.0).is_err());
    }

    #[test]
    fn arange_rejects_oversized_grids() {
        let err = arange(0.0, 1e12, 1e-6).unwrap_err();
        assert!(err.to_string().contains("more than"), "{err}");
        assert_eq!(arange(0.0, MAX_GRID_POINTS as f64, 1.0).unwrap().len(), MAX_GRID_POINTS);
    }

    #[test]
    fn interp_linear_and_clamped() {
        let xp = [3.0, 1.0, 2.0];
        let fp = [30.0, 10.0, 20.0];
        let y = interp(&[0.0, 1.5, 2.5, 5.0], &xp, &fp).unwrap();
        assert_eq!(y, vec![10.0, 15.0, 25.0, 30.0]);
    }
}
