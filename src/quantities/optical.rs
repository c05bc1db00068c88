//! Optical path: refractive index, extinction coefficient and resonances.

use std::f64::consts::PI;

use serde::Serialize;

use crate::domain::{Constants, MeasurementRecord, NkSpectrum, SampleData};
use crate::error::DrudeError;
use crate::math::{absolute_quadrature, interp, quadrature_error};
use crate::models::equations::{permittivity_from_nk, wavelength_or_frequency};
use crate::quantities::{NANOMETRE, TERAHERTZ, ensure_same_len};

/// Permittivity points measured on a grating series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PermittivityPoints {
    #[serde(rename = "Real Permittivity")]
    pub real: Vec<f64>,
    #[serde(rename = "Real Permittivity Error")]
    pub real_error: Vec<f64>,
    #[serde(rename = "Imaginary Permittivity")]
    pub imaginary: Vec<f64>,
    #[serde(rename = "Imaginary Permittivity Error")]
    pub imaginary_error: Vec<f64>,
}

/// Resonance positions as angular frequencies (rad/s).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AngularFrequencies {
    #[serde(rename = "Angular Frequency")]
    pub values: Vec<f64>,
    #[serde(rename = "Angular Frequency Error")]
    pub errors: Vec<f64>,
}

/// Optical results for one sample file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OpticalResults {
    #[serde(rename = "Resonant Frequency THz")]
    pub resonant_frequency_thz: Vec<f64>,
    #[serde(rename = "Resonant Frequency Error")]
    pub resonant_frequency_error: Vec<f64>,
    /// `n²`
    #[serde(rename = "Real Permittivity")]
    pub real_permittivity: Vec<f64>,
    #[serde(rename = "Real Permittivity Error")]
    pub real_permittivity_error: Vec<f64>,
    /// `(n_lo², n_hi²)`
    #[serde(rename = "Permittivity Range")]
    pub permittivity_range: Vec<(f64, f64)>,
}

/// `(ε_real, ε_imag)` with errors from `(n ± dn, k ± dk)`.
pub fn permittivities(
    n: &[f64],
    dn: &[f64],
    k: &[f64],
    dk: &[f64],
) -> Result<PermittivityPoints, DrudeError> {
    ensure_same_len("refractive index/error", n.len(), dn.len())?;
    ensure_same_len("extinction coefficient/error", k.len(), dk.len())?;
    ensure_same_len("refractive index/extinction coefficient", n.len(), k.len())?;

    let mut out = PermittivityPoints {
        real: Vec::with_capacity(n.len()),
        real_error: Vec::with_capacity(n.len()),
        imaginary: Vec::with_capacity(n.len()),
        imaginary_error: Vec::with_capacity(n.len()),
    };
    for i in 0..n.len() {
        let (real, imaginary) = permittivity_from_nk(n[i], k[i]);
        // Absolute forms of the power rule; a lossless grating (k = 0) is valid.
        let n_sq_error = 2.0 * (n[i] * dn[i]).abs();
        let k_sq_error = 2.0 * (k[i] * dk[i]).abs();
        out.real.push(real);
        out.real_error.push(absolute_quadrature(&[n_sq_error, k_sq_error]));
        out.imaginary.push(imaginary);
        out.imaginary_error.push(2.0 * absolute_quadrature(&[k[i] * dn[i], n[i] * dk[i]]));
    }
    Ok(out)
}

/// Permittivity points from a reduced S4 record.
pub fn record_permittivities(record: &MeasurementRecord) -> Result<PermittivityPoints, DrudeError> {
    permittivities(
        &record.refractive_index,
        &record.refractive_index_error,
        &record.extinction_coefficient,
        &record.extinction_coefficient_error,
    )
}

/// `ω = 2πc/λ` for resonant peaks in nm, with errors from the peak widths.
pub fn peaks_to_angular_frequencies(
    peaks_nm: &[f64],
    peak_errors_nm: &[f64],
    constants: &Constants,
) -> Result<AngularFrequencies, DrudeError> {
    ensure_same_len("peak wavelength/error", peaks_nm.len(), peak_errors_nm.len())?;
    let mut values = Vec::with_capacity(peaks_nm.len());
    let mut errors = Vec::with_capacity(peaks_nm.len());
    for (&peak, &dpeak) in peaks_nm.iter().zip(peak_errors_nm) {
        let omega = 2.0 * PI * wavelength_or_frequency(constants.speed_of_light, peak * NANOMETRE)?;
        errors.push(quadrature_error(omega, &[peak], &[dpeak])?);
        values.push(omega);
    }
    Ok(AngularFrequencies { values, errors })
}

/// Optical path for one sample file.
///
/// Resonance errors come from `Resonant Wavelength Error` when present,
/// otherwise every peak gets `default_wavelength_error_nm`. The `n²` error
/// uses half the index bound spread as the index uncertainty.
pub fn optical_to_drude(
    sample: &SampleData,
    constants: &Constants,
    default_wavelength_error_nm: f64,
) -> Result<OpticalResults, DrudeError> {
    let wavelengths = &sample.resonant_wavelength;
    if wavelengths.is_empty() {
        return Err(DrudeError::MissingMeasurement(
            "`Resonant Wavelength` is absent or empty".to_string(),
        ));
    }
    if sample.material_index.is_empty() {
        return Err(DrudeError::MissingMeasurement(
            "`Material Index` is absent or empty".to_string(),
        ));
    }
    let wavelength_errors = if sample.resonant_wavelength_error.is_empty() {
        vec![default_wavelength_error_nm; wavelengths.len()]
    } else {
        sample.resonant_wavelength_error.clone()
    };
    ensure_same_len("resonant wavelength/error", wavelengths.len(), wavelength_errors.len())?;
    ensure_same_len(
        "resonant wavelength/material index",
        wavelengths.len(),
        sample.material_index.len(),
    )?;
    ensure_same_len(
        "index lower/upper bound",
        sample.index_lower_bound.len(),
        sample.index_upper_bound.len(),
    )?;
    ensure_same_len(
        "material index/index bounds",
        sample.material_index.len(),
        sample.index_lower_bound.len(),
    )?;

    let mut frequency = Vec::with_capacity(wavelengths.len());
    let mut frequency_error = Vec::with_capacity(wavelengths.len());
    for (&wl, &dwl) in wavelengths.iter().zip(&wavelength_errors) {
        let f = wavelength_or_frequency(constants.speed_of_light, wl * NANOMETRE)? / TERAHERTZ;
        frequency_error.push(quadrature_error(f, &[wl], &[dwl])?);
        frequency.push(f);
    }

    let mut real = Vec::with_capacity(sample.material_index.len());
    let mut real_error = Vec::with_capacity(sample.material_index.len());
    let mut range = Vec::with_capacity(sample.material_index.len());
    for ((&n, &lo), &hi) in sample
        .material_index
        .iter()
        .zip(&sample.index_lower_bound)
        .zip(&sample.index_upper_bound)
    {
        let dn = (hi - lo).abs() / 2.0;
        real.push(n * n);
        real_error.push(quadrature_error(n * n, &[n], &[2.0 * dn])?);
        range.push((lo * lo, hi * hi));
    }

    Ok(OpticalResults {
        resonant_frequency_thz: frequency,
        resonant_frequency_error: frequency_error,
        real_permittivity: real,
        real_permittivity_error: real_error,
        permittivity_range: range,
    })
}

/// Permittivity of a reflectometer n/k spectrum resampled onto a THz grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NkPermittivity {
    #[serde(rename = "Frequency THz")]
    pub frequency_thz: Vec<f64>,
    #[serde(rename = "Refractive Index")]
    pub n: Vec<f64>,
    #[serde(rename = "Extinction Coefficient")]
    pub k: Vec<f64>,
    #[serde(rename = "Real Permittivity")]
    pub real: Vec<f64>,
    #[serde(rename = "Imaginary Permittivity")]
    pub imaginary: Vec<f64>,
}

/// Interpolate n and k in wavelength onto `frequency_thz`, then form ε.
///
/// Grid points outside the measured band take the nearest measured value.
pub fn nk_to_permittivity(
    spectrum: &NkSpectrum,
    frequency_thz: &[f64],
    constants: &Constants,
) -> Result<NkPermittivity, DrudeError> {
    ensure_same_len("n/k wavelength/n", spectrum.wavelength_nm.len(), spectrum.n.len())?;
    ensure_same_len("n/k wavelength/k", spectrum.wavelength_nm.len(), spectrum.k.len())?;
    let grid_nm = frequency_thz
        .iter()
        .map(|&f| {
            wavelength_or_frequency(constants.speed_of_light, f * TERAHERTZ).map(|l| l / NANOMETRE)
        })
        .collect::<Result<Vec<_>, _>>()?;
    let n = interp(&grid_nm, &spectrum.wavelength_nm, &spectrum.n)?;
    let k = interp(&grid_nm, &spectrum.wavelength_nm, &spectrum.k)?;
    let (real, imaginary) = n.iter().zip(&k).map(|(&n, &k)| permittivity_from_nk(n, k)).unzip();
    Ok(NkPermittivity {
        frequency_thz: frequency_thz.to_vec(),
        n,
        k,
        real,
        imaginary,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn permittivity_errors_follow_power_rule() {
        let p = permittivities(&[2.0], &[0.02], &[0.5], &[0.005]).unwrap();
        assert_relative_eq!(p.real[0], 3.75);
        assert_relative_eq!(p.imaginary[0], 2.0);
        // d(n²) = 2 n dn = 0.08, d(k²) = 2 k dk = 0.005
        assert_relative_eq!(p.real_error[0], (0.08f64.powi(2) + 0.005f64.powi(2)).sqrt(), max_relative = 1e-12);
        // 1% on n and 1% on k
        assert_relative_eq!(p.imaginary_error[0], 2.0 * 2f64.sqrt() * 0.01, max_relative = 1e-12);
    }

    #[test]
    fn lossless_grating_keeps_finite_errors() {
        let p = permittivities(&[2.0], &[0.01], &[0.0], &[0.005]).unwrap();
        assert_relative_eq!(p.real[0], 4.0);
        assert_eq!(p.imaginary[0], 0.0);
        assert_relative_eq!(p.real_error[0], 0.04, max_relative = 1e-12);
        // d(2nk) = 2 n dk at k = 0
        assert_relative_eq!(p.imaginary_error[0], 0.02, max_relative = 1e-12);
    }

    #[test]
    fn permittivity_lengths_must_match() {
        let err = permittivities(&[2.0, 2.1], &[0.02], &[0.5], &[0.005]).unwrap_err();
        assert_eq!(err.kind(), "mismatched_lengths");
    }

    #[test]
    fn peaks_convert_to_angular_frequency() {
        let c = Constants::default();
        let w = peaks_to_angular_frequencies(&[1000.0], &[10.0], &c).unwrap();
        assert_relative_eq!(w.values[0], 2.0 * PI * c.speed_of_light / 1e-6, max_relative = 1e-12);
        assert_relative_eq!(w.errors[0], 0.01 * w.values[0], max_relative = 1e-12);
    }

    #[test]
    fn optical_sample_defaults_wavelength_error() {
        let sample = SampleData {
            resonant_wavelength: vec![1000.0, 1200.0],
            material_index: vec![1.8, 1.7],
            index_lower_bound: vec![1.7, 1.6],
            index_upper_bound: vec![1.9, 1.8],
            ..SampleData::default()
        };
        let c = Constants::default();
        let r = optical_to_drude(&sample, &c, 10.0).unwrap();
        assert_relative_eq!(r.resonant_frequency_thz[0], 299.792_458, max_relative = 1e-9);
        assert_relative_eq!(r.resonant_frequency_error[0], 2.997_924_58, max_relative = 1e-9);
        assert_relative_eq!(r.real_permittivity[0], 3.24, max_relative = 1e-12);
        assert_relative_eq!(r.permittivity_range[1].0, 2.56, max_relative = 1e-12);
        assert_eq!(r.real_permittivity_error.len(), 2);
    }

    #[test]
    fn optical_sample_needs_resonances() {
        let err = optical_to_drude(&SampleData::default(), &Constants::default(), 10.0).unwrap_err();
        assert_eq!(err.kind(), "missing_measurement");
    }

    #[test]
    fn nk_spectrum_resamples_onto_grid() {
        let c = Constants::default();
        let spectrum = NkSpectrum {
            wavelength_nm: vec![400.0, 800.0, 1200.0],
            n: vec![2.0, 1.8, 1.4],
            k: vec![0.0, 0.1, 0.5],
        };
        // 299.792458 THz is exactly 1000 nm.
        let out = nk_to_permittivity(&spectrum, &[299.792_458, 10.0], &c).unwrap();
        assert_relative_eq!(out.n[0], 1.6, max_relative = 1e-9);
        assert_relative_eq!(out.k[0], 0.3, max_relative = 1e-9);
        assert_relative_eq!(out.real[0], 1.6 * 1.6 - 0.09, max_relative = 1e-9);
        assert_relative_eq!(out.imaginary[0], 2.0 * 1.6 * 0.3, max_relative = 1e-9);
        // Far infrared clamps to the longest measured wavelength.
        assert_eq!(out.n[1], 1.4);
    }
}
