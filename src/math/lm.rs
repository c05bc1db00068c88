//! Bounded Levenberg–Marquardt least squares.
//!
//! Solves
//!
//! ```text
//! minimize Σ ((y_i - f(x_i; p)) / σ_i)^2    subject to  lower <= p <= upper
//! ```
//!
//! Implementation choices:
//! - Parameters are rescaled by their initial guess so that carrier densities
//!   (~1e26) and relaxation times (~1e-14) are conditioned alike.
//! - Bounds are enforced by projecting every trial point back into the box.
//! - A parameter with `lower == upper` is held fixed and reported with a
//!   zero error.
//! - The Jacobian is a forward difference, stepping inwards at an upper bound.
//! - Covariance follows the `curve_fit` convention with relative sigma: the
//!   SVD pseudo-inverse of `JᵀJ`, scaled by the reduced chi-square.

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::error::DrudeError;

const MIN_LAMBDA: f64 = 1e-15;
const MAX_LAMBDA: f64 = 1e16;

/// Solver knobs.
#[derive(Debug, Clone)]
pub struct LmOptions {
    /// Hard cap on accepted-or-rejected outer iterations.
    pub max_iterations: usize,
    /// Stop when an accepted step reduces chi-square by less than this fraction.
    pub ftol: f64,
    /// Stop when the scaled step is below this fraction of the scaled parameter norm.
    pub xtol: f64,
    /// Starting damping factor.
    pub initial_lambda: f64,
}

impl Default for LmOptions {
    fn default() -> Self {
        Self {
            max_iterations: 200,
            ftol: 1e-10,
            xtol: 1e-10,
            initial_lambda: 1e-3,
        }
    }
}

/// Observations for a weighted fit. All three slices are parallel.
#[derive(Debug, Clone, Copy)]
pub struct CurveData<'a> {
    pub x: &'a [f64],
    pub y: &'a [f64],
    /// Per-point standard deviation.
    pub sigma: &'a [f64],
}

#[derive(Debug, Clone)]
pub struct LmSolution {
    pub params: Vec<f64>,
    pub std_errors: Vec<f64>,
    pub covariance: DMatrix<f64>,
    pub chi_square: f64,
    /// Degrees of freedom: points minus free parameters.
    pub dof: usize,
    pub iterations: usize,
}

impl LmSolution {
    pub fn reduced_chi_square(&self) -> f64 {
        if self.dof == 0 {
            f64::NAN
        } else {
            self.chi_square / self.dof as f64
        }
    }
}

/// Fit `model(x, p)` to `data` starting from `p0` within `[lower, upper]`.
pub fn curve_fit<F>(
    model: F,
    data: CurveData<'_>,
    p0: &[f64],
    lower: &[f64],
    upper: &[f64],
    opts: &LmOptions,
) -> Result<LmSolution, DrudeError>
where
    F: Fn(f64, &[f64]) -> f64,
{
    validate_inputs(data, p0, lower, upper)?;

    let n = data.x.len();
    let free: Vec<usize> = (0..p0.len()).filter(|&i| upper[i] > lower[i]).collect();
    let m = free.len();

    if m > 0 && n <= m {
        return Err(DrudeError::FitDivergence(format!(
            "underdetermined: {n} points for {m} free parameters"
        )));
    }

    let problem = Problem {
        model: &model,
        data,
        p0,
        free: &free,
        scale: p0
            .iter()
            .zip(lower.iter().zip(upper))
            .map(|(&p, (&lo, &hi))| param_scale(p, lo, hi))
            .collect(),
    };

    let u_lo = DVector::from_iterator(m, free.iter().map(|&i| lower[i] / problem.scale[i]));
    let u_hi = DVector::from_iterator(m, free.iter().map(|&i| upper[i] / problem.scale[i]));
    let mut u = DVector::from_iterator(m, free.iter().map(|&i| p0[i] / problem.scale[i]));

    let mut r = problem.residuals(&u).ok_or_else(|| {
        DrudeError::FitDivergence("model is not finite at the initial guess".to_string())
    })?;
    let mut cost = r.norm_squared();

    if m == 0 {
        return Ok(LmSolution {
            params: p0.to_vec(),
            std_errors: vec![0.0; p0.len()],
            covariance: DMatrix::zeros(p0.len(), p0.len()),
            chi_square: cost,
            dof: n,
            iterations: 0,
        });
    }

    let mut lambda = opts.initial_lambda;
    let mut iterations = 0usize;
    let mut converged = false;
    let mut jac = problem.jacobian(&u, &u_hi)?;

    while iterations < opts.max_iterations {
        iterations += 1;
        if cost == 0.0 {
            converged = true;
            break;
        }

        let jtj = jac.transpose() * &jac;
        let jtr = jac.transpose() * &r;
        let max_diag = (0..m).map(|k| jtj[(k, k)]).fold(0.0_f64, f64::max);
        if !(max_diag.is_finite() && max_diag > 0.0) {
            return Err(DrudeError::FitDivergence(
                "Jacobian vanishes: parameters do not affect the model".to_string(),
            ));
        }
        let diag_floor = max_diag * 1e-12;

        // Parameters pinned at a bound with the descent direction pointing
        // outwards stay put; the step is solved over the rest.
        let inactive: Vec<usize> = (0..m)
            .filter(|&k| {
                let at_lo = u[k] <= u_lo[k] && jtr[k] < 0.0;
                let at_hi = u[k] >= u_hi[k] && jtr[k] > 0.0;
                !(at_lo || at_hi)
            })
            .collect();
        if inactive.is_empty() {
            converged = true;
            break;
        }
        let q = inactive.len();
        let jtj_q = DMatrix::from_fn(q, q, |a, b| jtj[(inactive[a], inactive[b])]);
        let jtr_q = DVector::from_fn(q, |a, _| jtr[inactive[a]]);

        // Inner loop: raise the damping until a step lowers chi-square.
        let mut accepted: Option<(DVector<f64>, DVector<f64>, f64)> = None;
        while lambda <= MAX_LAMBDA {
            let mut a = jtj_q.clone();
            for k in 0..q {
                a[(k, k)] += lambda * jtj_q[(k, k)].max(diag_floor);
            }
            let Some(chol) = a.cholesky() else {
                lambda *= 10.0;
                continue;
            };
            let step_q = chol.solve(&jtr_q);
            let mut step = DVector::zeros(m);
            for (a, &k) in inactive.iter().enumerate() {
                step[k] = step_q[a];
            }
            let trial = clamp(&(&u + &step), &u_lo, &u_hi);
            if (&trial - &u).norm() == 0.0 {
                lambda *= 10.0;
                continue;
            }
            if let Some(r_trial) = problem.residuals(&trial) {
                let c = r_trial.norm_squared();
                if c < cost {
                    accepted = Some((trial, r_trial, c));
                    break;
                }
            }
            lambda *= 10.0;
        }

        // No damping produces descent: we sit at a (possibly bound-constrained) minimum.
        let Some((u_new, r_new, cost_new)) = accepted else {
            converged = true;
            break;
        };

        let step_norm = (&u_new - &u).norm();
        let reduction = (cost - cost_new) / cost;
        debug!("lm iter {iterations}: chi2 {cost:.6e} -> {cost_new:.6e}, lambda {lambda:.1e}");

        u = u_new;
        r = r_new;
        cost = cost_new;

        if reduction < opts.ftol || step_norm <= opts.xtol * (u.norm() + opts.xtol) {
            converged = true;
            break;
        }

        lambda = (lambda / 10.0).max(MIN_LAMBDA);
        jac = problem.jacobian(&u, &u_hi)?;
    }

    if !converged {
        return Err(DrudeError::FitDivergence(format!(
            "no convergence after {} iterations (chi2 = {cost:.6e})",
            opts.max_iterations
        )));
    }

    let jac = problem.jacobian(&u, &u_hi)?;
    let dof = n - m;
    let cov_u = pseudo_inverse_normal(&jac)? * (cost / dof as f64);

    let p_len = p0.len();
    let mut covariance = DMatrix::zeros(p_len, p_len);
    for (a, &i) in free.iter().enumerate() {
        for (b, &j) in free.iter().enumerate() {
            covariance[(i, j)] = cov_u[(a, b)] * problem.scale[i] * problem.scale[j];
        }
    }
    let std_errors: Vec<f64> = (0..p_len).map(|i| covariance[(i, i)].max(0.0).sqrt()).collect();
    if std_errors.iter().any(|e| !e.is_finite()) {
        return Err(DrudeError::FitDivergence(
            "parameter covariance could not be estimated".to_string(),
        ));
    }

    Ok(LmSolution {
        params: problem.params(&u),
        std_errors,
        covariance,
        chi_square: cost,
        dof,
        iterations,
    })
}

struct Problem<'a, F> {
    model: &'a F,
    data: CurveData<'a>,
    p0: &'a [f64],
    free: &'a [usize],
    scale: Vec<f64>,
}

impl<F> Problem<'_, F>
where
    F: Fn(f64, &[f64]) -> f64,
{
    fn params(&self, u: &DVector<f64>) -> Vec<f64> {
        let mut p = self.p0.to_vec();
        for (k, &i) in self.free.iter().enumerate() {
            p[i] = u[k] * self.scale[i];
        }
        p
    }

    fn predict(&self, p: &[f64]) -> Option<Vec<f64>> {
        let f: Vec<f64> = self.data.x.iter().map(|&x| (self.model)(x, p)).collect();
        f.iter().all(|v| v.is_finite()).then_some(f)
    }

    /// Weighted residuals `(y - f) / σ`; `None` if the model is not finite.
    fn residuals(&self, u: &DVector<f64>) -> Option<DVector<f64>> {
        let f = self.predict(&self.params(u))?;
        let d = self.data;
        Some(DVector::from_iterator(
            f.len(),
            f.iter()
                .zip(d.y.iter().zip(d.sigma))
                .map(|(fi, (yi, si))| (yi - fi) / si),
        ))
    }

    /// `∂f/∂u / σ`, shape `n × m`.
    fn jacobian(&self, u: &DVector<f64>, u_hi: &DVector<f64>) -> Result<DMatrix<f64>, DrudeError> {
        let n = self.data.x.len();
        let m = self.free.len();
        let base = self.predict(&self.params(u)).ok_or_else(|| {
            DrudeError::FitDivergence("model is not finite at the current parameters".to_string())
        })?;

        let mut jac = DMatrix::zeros(n, m);
        for k in 0..m {
            let mut h = f64::EPSILON.sqrt() * u[k].abs().max(1.0);
            if u[k] + h > u_hi[k] {
                h = -h;
            }
            let mut u_step = u.clone();
            u_step[k] += h;
            let shifted = self.predict(&self.params(&u_step)).ok_or_else(|| {
                DrudeError::FitDivergence(format!(
                    "model is not finite near parameter {}",
                    self.free[k]
                ))
            })?;
            for i in 0..n {
                jac[(i, k)] = (shifted[i] - base[i]) / (h * self.data.sigma[i]);
            }
        }
        Ok(jac)
    }
}

fn validate_inputs(
    data: CurveData<'_>,
    p0: &[f64],
    lower: &[f64],
    upper: &[f64],
) -> Result<(), DrudeError> {
    if data.x.len() != data.y.len() {
        return Err(DrudeError::mismatched("fit x/y", data.x.len(), data.y.len()));
    }
    if data.y.len() != data.sigma.len() {
        return Err(DrudeError::mismatched("fit y/sigma", data.y.len(), data.sigma.len()));
    }
    if p0.len() != lower.len() || p0.len() != upper.len() {
        return Err(DrudeError::mismatched(
            "fit guesses/bounds",
            p0.len(),
            lower.len().min(upper.len()),
        ));
    }
    if data.x.is_empty() {
        return Err(DrudeError::MissingMeasurement("no points to fit".to_string()));
    }
    if data.sigma.iter().any(|s| *s == 0.0) {
        return Err(DrudeError::DivisionByZero("fit weights (zero sigma)".to_string()));
    }
    if data
        .x
        .iter()
        .chain(data.y)
        .chain(data.sigma)
        .any(|v| !v.is_finite())
    {
        return Err(DrudeError::FitDivergence("non-finite data point".to_string()));
    }
    for i in 0..p0.len() {
        let (p, lo, hi) = (p0[i], lower[i], upper[i]);
        if !(p.is_finite() && lo.is_finite() && hi.is_finite()) || !(lo <= p && p <= hi) {
            return Err(DrudeError::FitDivergence(format!(
                "initial guess {i} ({p:e}) outside bounds [{lo:e}, {hi:e}]"
            )));
        }
    }
    Ok(())
}

fn param_scale(p0: f64, lower: f64, upper: f64) -> f64 {
    if p0 != 0.0 {
        p0.abs()
    } else if upper > lower {
        upper - lower
    } else {
        1.0
    }
}

fn clamp(u: &DVector<f64>, lo: &DVector<f64>, hi: &DVector<f64>) -> DVector<f64> {
    DVector::from_iterator(
        u.len(),
        u.iter()
            .zip(lo.iter().zip(hi.iter()))
            .map(|(&v, (&l, &h))| v.clamp(l, h)),
    )
}

/// `(JᵀJ)⁺` via the SVD of `J`, dropping singular values below
/// `eps · max(n, m) · s_max`.
fn pseudo_inverse_normal(jac: &DMatrix<f64>) -> Result<DMatrix<f64>, DrudeError> {
    let (n, m) = jac.shape();
    let svd = jac.clone().svd(false, true);
    let Some(v_t) = svd.v_t else {
        return Err(DrudeError::FitDivergence("SVD of the Jacobian failed".to_string()));
    };
    let s = &svd.singular_values;
    let s_max = s.iter().copied().fold(0.0_f64, f64::max);
    if !(s_max.is_finite() && s_max > 0.0) {
        return Err(DrudeError::FitDivergence("singular Jacobian".to_string()));
    }
    let threshold = f64::EPSILON * n.max(m) as f64 * s_max;

    let mut cov = DMatrix::zeros(m, m);
    for k in 0..s.len() {
        if s[k] <= threshold {
            continue;
        }
        let inv_sq = 1.0 / (s[k] * s[k]);
        for a in 0..m {
            for b in 0..m {
                cov[(a, b)] += v_t[(k, a)] * v_t[(k, b)] * inv_sq;
            }
        }
    }
    Ok(cov)
}
