//! Electrical path: four-point-probe sheet resistance to a Drude curve.

use log::debug;
use serde::Serialize;

use crate::domain::{Constants, Measured, SampleData};
use crate::error::DrudeError;
use crate::math::{absolute_quadrature, mean, quadrature_error, standard_error_mean};
use crate::models::equations::{
    conductivity_to_carrier_density, drude_real, plasma_frequency,
    sheet_resistance_to_conductivity,
};
use crate::quantities::{CM2_PER_VS, NANOMETRE, ensure_same_len, scalar_field};

/// Quantities derived from one sample file's electrical measurements.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ElectricalResults {
    /// Ω/sq, mean and standard error of the probe readings.
    #[serde(rename = "Sheet Resistance")]
    pub sheet_resistance: Measured,
    /// S/m
    #[serde(rename = "Conductivity")]
    pub conductivity: Measured,
    /// m⁻³
    #[serde(rename = "Carrier Density")]
    pub carrier_density: Measured,
    /// rad/s
    #[serde(rename = "Plasma Frequency")]
    pub plasma_frequency: Measured,
    #[serde(rename = "Drude Permittivity")]
    pub drude_permittivity: Vec<f64>,
    #[serde(rename = "Drude Permittivity Error")]
    pub drude_permittivity_error: Vec<f64>,
}

/// Batch conductivity from probe readings and S4 film thicknesses.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConductivityEstimate {
    #[serde(rename = "Sheet Resistance")]
    pub sheet_resistance: Measured,
    /// nm
    #[serde(rename = "Average Film Thickness")]
    pub film_thickness: Measured,
    #[serde(rename = "Conductivity")]
    pub conductivity: Measured,
}

/// Carrier density of a batch from its conductivity and tabulated mobility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CarrierEstimate {
    /// cm²/Vs
    #[serde(rename = "Mobility")]
    pub mobility: Measured,
    #[serde(rename = "Carrier Density")]
    pub carrier_density: Measured,
}

/// Mean and standard error of repeated sheet-resistance readings.
pub fn sheet_resistance_stats(readings: &[f64]) -> Result<Measured, DrudeError> {
    let value = mean(readings)
        .ok_or_else(|| DrudeError::MissingMeasurement("no sheet resistance readings".to_string()))?;
    Ok(Measured::new(value, standard_error_mean(readings)?))
}

/// σ = 1 / (R t), thickness in nm.
pub fn conductivity(sheet_resistance: Measured, thickness_nm: Measured) -> Result<Measured, DrudeError> {
    let t = thickness_nm.value * NANOMETRE;
    let dt = thickness_nm.error * NANOMETRE;
    let sigma = sheet_resistance_to_conductivity(sheet_resistance.value, t)?;
    let error = quadrature_error(
        sigma,
        &[sheet_resistance.value, t],
        &[sheet_resistance.error, dt],
    )?;
    Ok(Measured::new(sigma, error))
}

/// N = σ / (μ e), mobility in cm²/Vs.
pub fn carrier_density(
    conductivity: Measured,
    mobility_cm2: Measured,
    constants: &Constants,
) -> Result<Measured, DrudeError> {
    let mu = mobility_cm2.value * CM2_PER_VS;
    let dmu = mobility_cm2.error * CM2_PER_VS;
    let n = conductivity_to_carrier_density(conductivity.value, mu, constants.electron_charge)?;
    let error = quadrature_error(n, &[conductivity.value, mu], &[conductivity.error, dmu])?;
    Ok(Measured::new(n, error))
}

/// ωp with error; ωp ∝ √N so the relative error halves.
pub fn plasma_frequency_with_error(
    carrier_density: Measured,
    effective_mass: f64,
    constants: &Constants,
) -> Result<Measured, DrudeError> {
    let wp = plasma_frequency(
        carrier_density.value,
        constants.electron_charge,
        constants.epsilon_naught,
        effective_mass * constants.electron_mass,
    )?;
    let error = quadrature_error(wp, &[carrier_density.value], &[carrier_density.error / 2.0])?;
    Ok(Measured::new(wp, error))
}

/// `ε∞ − ωp²/ω²` over a grid, with errors from ε∞ and ωp.
pub fn drude_real_curve(
    epsilon_infinity: Measured,
    plasma_frequency: Measured,
    omegas: &[f64],
) -> Result<(Vec<f64>, Vec<f64>), DrudeError> {
    let mut values = Vec::with_capacity(omegas.len());
    let mut errors = Vec::with_capacity(omegas.len());
    for &w in omegas {
        let screening = plasma_frequency.value.powi(2) / (w * w);
        let screening_error = quadrature_error(
            screening,
            &[plasma_frequency.value],
            &[2.0 * plasma_frequency.error],
        )?;
        values.push(drude_real(epsilon_infinity.value, plasma_frequency.value, w));
        errors.push(absolute_quadrature(&[epsilon_infinity.error, screening_error]));
    }
    Ok((values, errors))
}

/// Full electrical path for one sample file over the angular-frequency grid.
pub fn resistance_to_drude(
    sample: &SampleData,
    constants: &Constants,
    omegas: &[f64],
) -> Result<ElectricalResults, DrudeError> {
    let sheet_resistance = sheet_resistance_stats(&sample.sheet_resistance)?;
    let thickness = scalar_field("Film Thickness", &sample.film_thickness)?;
    let mobility = scalar_field("Electron Mobility", &sample.electron_mobility)?;
    let epsilon_infinity = scalar_field("Epsilon Infinity", &sample.epsilon_infinity)?;

    let sigma = conductivity(sheet_resistance, thickness)?;
    let n = carrier_density(sigma, mobility, constants)?;
    let wp = plasma_frequency_with_error(n, constants.effective_mass, constants)?;
    let (drude, drude_error) = drude_real_curve(epsilon_infinity, wp, omegas)?;
    debug!(
        "{}: sigma {:.4e} S/m, N {:.4e} m^-3, wp {:.4e} rad/s",
        sample.file_name, sigma.value, n.value, wp.value
    );

    Ok(ElectricalResults {
        sheet_resistance,
        conductivity: sigma,
        carrier_density: n,
        plasma_frequency: wp,
        drude_permittivity: drude,
        drude_permittivity_error: drude_error,
    })
}

/// Conductivity of a batch: probe readings against the mean S4 film thickness.
///
/// The thickness error is the standard error across gratings when there are
/// at least two, otherwise the single grating's own TE/TM spread.
pub fn average_sample_conductivity(
    film_thicknesses_nm: &[f64],
    film_thickness_errors_nm: &[f64],
    sheet_resistances: &[f64],
) -> Result<ConductivityEstimate, DrudeError> {
    ensure_same_len(
        "film thickness/error",
        film_thicknesses_nm.len(),
        film_thickness_errors_nm.len(),
    )?;
    let t = mean(film_thicknesses_nm)
        .ok_or_else(|| DrudeError::MissingMeasurement("no film thickness values".to_string()))?;
    let dt = if film_thicknesses_nm.len() >= 2 {
        standard_error_mean(film_thicknesses_nm)?
    } else {
        film_thickness_errors_nm[0]
    };
    let film_thickness = Measured::new(t, dt);
    let sheet_resistance = sheet_resistance_stats(sheet_resistances)?;
    Ok(ConductivityEstimate {
        sheet_resistance,
        film_thickness,
        conductivity: conductivity(sheet_resistance, film_thickness)?,
    })
}

/// One mobility step of a what-if sweep: the same films at an assumed mobility.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SweepRecord {
    /// cm²/Vs
    #[serde(rename = "Mobility")]
    pub mobility: f64,
    #[serde(rename = "Sample Names")]
    pub samples: Vec<String>,
    #[serde(rename = "Carrier Density")]
    pub carrier_density: Vec<f64>,
    #[serde(rename = "Plasma Frequency")]
    pub plasma_frequency: Vec<f64>,
    /// One curve per sample, parallel to the frequency grid.
    #[serde(rename = "Drude Permittivity")]
    pub drude_permittivity: Vec<Vec<f64>>,
}

/// A film measured by four-point probe, as input to a mobility sweep.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepFilm {
    pub name: String,
    /// Ω/sq, before the probe offset is removed.
    pub sheet_resistance: f64,
    pub thickness_nm: f64,
}

/// Drude real permittivity of each film for every mobility in `mobilities`.
///
/// `probe_offset` (Ω/sq) is the contact contribution subtracted from every
/// raw reading.
pub fn sweep_mobility(
    films: &[SweepFilm],
    probe_offset: f64,
    mobilities: &[f64],
    epsilon_infinity: f64,
    constants: &Constants,
    omegas: &[f64],
) -> Result<Vec<SweepRecord>, DrudeError> {
    if films.is_empty() {
        return Err(DrudeError::MissingMeasurement("no films to sweep".to_string()));
    }
    let conductivities = films
        .iter()
        .map(|f| {
            sheet_resistance_to_conductivity(
                f.sheet_resistance - probe_offset,
                f.thickness_nm * NANOMETRE,
            )
        })
        .collect::<Result<Vec<_>, _>>()?;

    let mut out = Vec::with_capacity(mobilities.len());
    for &mu in mobilities {
        let mut densities = Vec::with_capacity(films.len());
        let mut plasma = Vec::with_capacity(films.len());
        let mut curves = Vec::with_capacity(films.len());
        for &sigma in &conductivities {
            let n = conductivity_to_carrier_density(sigma, mu * CM2_PER_VS, constants.electron_charge)?;
            let wp = plasma_frequency(
                n,
                constants.electron_charge,
                constants.epsilon_naught,
                constants.effective_mass * constants.electron_mass,
            )?;
            curves.push(omegas.iter().map(|&w| drude_real(epsilon_infinity, wp, w)).collect());
            densities.push(n);
            plasma.push(wp);
        }
        out.push(SweepRecord {
            mobility: mu,
            samples: films.iter().map(|f| f.name.clone()).collect(),
            carrier_density: densities,
            plasma_frequency: plasma,
            drude_permittivity: curves,
        });
    }
    Ok(out)
}
