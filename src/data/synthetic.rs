//! Synthetic permittivity points from known Drude parameters.
//!
//! Useful to check that a parameter table and the fitter can recover a film
//! before spending it on real measurements.

use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::Normal;
use serde::{Deserialize, Serialize};

use crate::domain::{Constants, DrudeComponent};
use crate::error::DrudeError;
use crate::models::evaluate;
use crate::quantities::PermittivityPoints;

/// Ground truth and sampling plan for one synthetic film.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyntheticTruth {
    /// m⁻³
    #[serde(rename = "True Carrier Density")]
    pub carrier_density: f64,
    #[serde(rename = "True Effective Mass")]
    pub effective_mass: f64,
    #[serde(rename = "True Epsilon Infinity")]
    pub epsilon_infinity: f64,
    /// s
    #[serde(rename = "True Relaxation Time")]
    pub relaxation_time: f64,
    /// rad/s
    #[serde(rename = "Omega Start")]
    pub omega_start: f64,
    #[serde(rename = "Omega Stop")]
    pub omega_stop: f64,
    #[serde(rename = "Points")]
    pub points: usize,
    /// Standard deviation of the additive Gaussian noise; also the reported error.
    #[serde(rename = "Noise")]
    pub noise: f64,
    #[serde(rename = "Seed")]
    pub seed: u64,
}

/// Evenly spaced angular frequencies with noisy real and imaginary permittivity.
pub fn generate_permittivity(
    truth: &SyntheticTruth,
    constants: &Constants,
) -> Result<(Vec<f64>, PermittivityPoints), DrudeError> {
    if truth.points < 2 {
        return Err(DrudeError::MissingMeasurement(format!(
            "synthetic data needs at least 2 points, got {}",
            truth.points
        )));
    }
    if !(truth.omega_start > 0.0 && truth.omega_stop > truth.omega_start) {
        return Err(DrudeError::MissingMeasurement(format!(
            "invalid synthetic omega range [{:e}, {:e}]",
            truth.omega_start, truth.omega_stop
        )));
    }
    let normal = Normal::new(0.0, truth.noise)
        .map_err(|e| DrudeError::MissingMeasurement(format!("noise distribution: {e}")))?;
    let mut rng = StdRng::seed_from_u64(truth.seed);

    let step = (truth.omega_stop - truth.omega_start) / (truth.points - 1) as f64;
    let omegas: Vec<f64> = (0..truth.points)
        .map(|i| truth.omega_start + step * i as f64)
        .collect();

    let real_params = [truth.carrier_density, truth.effective_mass, truth.epsilon_infinity];
    let imag_params = [
        truth.carrier_density,
        truth.effective_mass,
        truth.epsilon_infinity,
        truth.relaxation_time,
    ];

    let mut points = PermittivityPoints {
        real: Vec::with_capacity(truth.points),
        real_error: vec![truth.noise; truth.points],
        imaginary: Vec::with_capacity(truth.points),
        imaginary_error: vec![truth.noise; truth.points],
    };
    for &w in &omegas {
        let re = evaluate(DrudeComponent::Real, w, &real_params, constants)?;
        let im = evaluate(DrudeComponent::Imaginary, w, &imag_params, constants)?;
        points.real.push(re + normal.sample(&mut rng));
        points.imaginary.push(im + normal.sample(&mut rng));
    }
    Ok((omegas, points))
}
