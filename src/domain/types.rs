//! Shared domain types.
//!
//! These types are intentionally kept lightweight and serializable so they can be:
//!
//! - loaded straight from the JSON files the lab tooling produces
//! - used in-memory during fitting
//! - merged into flat result records for export

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DrudeError;

pub const CARRIER_DENSITY: &str = "Carrier Density";
pub const EFFECTIVE_MASS: &str = "Effective Mass";
pub const EPSILON_INFINITY: &str = "Epsilon Infinity";
pub const RELAXATION_TIME: &str = "Relaxation Time";

/// A derived physical quantity with its propagated uncertainty.
///
/// Serialized as a two-element array `[value, error]`, the shape every
/// downstream plotting script expects.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Measured {
    pub value: f64,
    pub error: f64,
}

impl Measured {
    pub fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }

    /// `value - |error|`.
    pub fn lower(&self) -> f64 {
        self.value - self.error.abs()
    }

    /// `value + |error|`.
    pub fn upper(&self) -> f64 {
        self.value + self.error.abs()
    }
}

impl From<[f64; 2]> for Measured {
    fn from(pair: [f64; 2]) -> Self {
        Self::new(pair[0], pair[1])
    }
}

impl From<Measured> for [f64; 2] {
    fn from(m: Measured) -> Self {
        [m.value, m.error]
    }
}

/// Which Drude permittivity component a fit targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrudeComponent {
    Real,
    Imaginary,
}

impl DrudeComponent {
    /// Label used as the key prefix in result records ("Real Results", ...).
    pub fn label(self) -> &'static str {
        match self {
            DrudeComponent::Real => "Real",
            DrudeComponent::Imaginary => "Imaginary",
        }
    }

    /// Fit parameters in the order the model function consumes them.
    pub fn parameter_names(self) -> &'static [&'static str] {
        match self {
            DrudeComponent::Real => &[CARRIER_DENSITY, EFFECTIVE_MASS, EPSILON_INFINITY],
            DrudeComponent::Imaginary => &[
                CARRIER_DENSITY,
                EFFECTIVE_MASS,
                EPSILON_INFINITY,
                RELAXATION_TIME,
            ],
        }
    }

    pub fn param_count(self) -> usize {
        self.parameter_names().len()
    }
}

/// Physical constants (SI). Missing keys in a constants file fall back to CODATA values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constants {
    #[serde(rename = "Electron Charge")]
    pub electron_charge: f64,
    #[serde(rename = "Epsilon Naught")]
    pub epsilon_naught: f64,
    #[serde(rename = "Electron Mass")]
    pub electron_mass: f64,
    #[serde(rename = "Speed Light")]
    pub speed_of_light: f64,
    /// Effective mass multiplier used by the electrical path (ITO ≈ 0.35).
    #[serde(rename = "Effective Mass ITO")]
    pub effective_mass: f64,
}

impl Default for Constants {
    fn default() -> Self {
        Self {
            electron_charge: 1.602_176_634e-19,
            epsilon_naught: 8.854_187_812_8e-12,
            electron_mass: 9.109_383_701_5e-31,
            speed_of_light: 299_792_458.0,
            effective_mass: 0.35,
        }
    }
}

/// User parameter table (`Drude_parameters.json`).
///
/// `Names`, `Guesses` and `Bounds` are parallel arrays; `Bounds` holds
/// `[lower, upper]` pairs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParameterTable {
    #[serde(rename = "Names")]
    pub names: Vec<String>,
    #[serde(rename = "Guesses")]
    pub guesses: Vec<f64>,
    #[serde(rename = "Bounds")]
    pub bounds: Vec<(f64, f64)>,
    /// Mobility per batch identifier, cm²/Vs.
    #[serde(rename = "Mobilities", default)]
    pub mobilities: BTreeMap<String, f64>,
    /// Mobility uncertainty per batch identifier, cm²/Vs.
    #[serde(rename = "Mobility Errors", default)]
    pub mobility_errors: BTreeMap<String, f64>,
    /// Relative widening of the carrier-density bounds for the imaginary fit.
    #[serde(rename = "Carrier Density Margin", default = "default_carrier_density_margin")]
    pub carrier_density_margin: f64,
    #[serde(rename = "Frequency THz Range", default)]
    pub frequency_thz_range: Option<FrequencyRange>,
}

fn default_carrier_density_margin() -> f64 {
    0.1
}

impl ParameterTable {
    /// Guess and `(lower, upper)` bounds for a named parameter.
    pub fn lookup(&self, name: &str) -> Option<(f64, (f64, f64))> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some((self.guesses[idx], self.bounds[idx]))
    }

    /// Structural checks; a table that fails these is unusable for every batch.
    pub fn validate(&self, required: &[&str]) -> Result<(), String> {
        if self.names.len() != self.guesses.len() || self.names.len() != self.bounds.len() {
            return Err(format!(
                "Names/Guesses/Bounds lengths differ: {}/{}/{}",
                self.names.len(),
                self.guesses.len(),
                self.bounds.len()
            ));
        }
        for name in required {
            if !self.names.iter().any(|n| n == name) {
                return Err(format!("missing required parameter `{name}`"));
            }
        }
        for ((name, &guess), &(lower, upper)) in
            self.names.iter().zip(&self.guesses).zip(&self.bounds)
        {
            if !(guess.is_finite() && lower.is_finite() && upper.is_finite()) {
                return Err(format!("non-finite guess or bound for `{name}`"));
            }
            if !(lower <= guess && guess <= upper) {
                return Err(format!(
                    "guess for `{name}` ({guess:e}) lies outside its bounds [{lower:e}, {upper:e}]"
                ));
            }
        }
        if !(self.carrier_density_margin.is_finite() && self.carrier_density_margin >= 0.0) {
            return Err("Carrier Density Margin must be finite and >= 0".to_string());
        }
        Ok(())
    }

    pub fn mobility(&self, batch: &str) -> Option<Measured> {
        let value = *self.mobilities.get(batch)?;
        let error = self.mobility_errors.get(batch).copied().unwrap_or(0.0);
        Some(Measured::new(value, error))
    }
}

/// Initial guesses and bounds for one optimiser call.
///
/// The three vectors share the order of `names`, which is the order the
/// corresponding model function consumes its parameters in.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ParameterSet {
    pub names: Vec<String>,
    pub guesses: Vec<f64>,
    pub lowers: Vec<f64>,
    pub uppers: Vec<f64>,
}

impl ParameterSet {
    pub fn push(&mut self, name: &str, guess: f64, lower: f64, upper: f64) {
        self.names.push(name.to_string());
        self.guesses.push(guess);
        self.lowers.push(lower);
        self.uppers.push(upper);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// `lower <= guess <= upper` for every entry, all finite.
    pub fn check_feasible(&self) -> Result<(), DrudeError> {
        for i in 0..self.len() {
            let (g, lo, hi) = (self.guesses[i], self.lowers[i], self.uppers[i]);
            if !(g.is_finite() && lo.is_finite() && hi.is_finite()) {
                return Err(DrudeError::FitDivergence(format!(
                    "non-finite guess or bound for `{}`",
                    self.names[i]
                )));
            }
            if !(lo <= g && g <= hi) {
                return Err(DrudeError::FitDivergence(format!(
                    "initial guess for `{}` ({g:e}) outside bounds [{lo:e}, {hi:e}]",
                    self.names[i]
                )));
            }
        }
        Ok(())
    }
}

/// Optimised parameters of one fit with their standard errors.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    pub component: DrudeComponent,
    pub names: Vec<String>,
    pub values: Vec<f64>,
    /// Square roots of the covariance diagonal, parallel to `values`.
    pub errors: Vec<f64>,
    pub chi_square: f64,
    pub reduced_chi_square: f64,
    pub iterations: usize,
}

impl FitResult {
    pub fn get(&self, name: &str) -> Option<Measured> {
        let idx = self.names.iter().position(|n| n == name)?;
        Some(Measured::new(self.values[idx], self.errors[idx]))
    }
}

/// `numpy.arange`-style THz grid: `[start, stop, step]`, stop exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 3]", into = "[f64; 3]")]
pub struct FrequencyRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
}

impl Default for FrequencyRange {
    /// 900 THz down to 1 THz, the range of the reference ITO plots.
    fn default() -> Self {
        Self {
            start: 900.0,
            stop: 1.0,
            step: -1.0,
        }
    }
}

impl From<[f64; 3]> for FrequencyRange {
    fn from(v: [f64; 3]) -> Self {
        Self {
            start: v[0],
            stop: v[1],
            step: v[2],
        }
    }
}

impl From<FrequencyRange> for [f64; 3] {
    fn from(r: FrequencyRange) -> Self {
        [r.start, r.stop, r.step]
    }
}

/// Run-wide settings from `info.json`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunInfo {
    #[serde(rename = "Frequency THz Range", default)]
    pub frequency_thz_range: FrequencyRange,
    /// Axis ticks for downstream plots; carried into result records untouched.
    #[serde(rename = "Frequency THz Ticks", default)]
    pub frequency_thz_ticks: Vec<f64>,
    /// Samples to create blank description files for.
    #[serde(rename = "Sample Names", default)]
    pub sample_names: Vec<String>,
}

/// n/k spectrum from a spectral reflectometer export.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NkSpectrum {
    /// nm
    pub wavelength_nm: Vec<f64>,
    pub n: Vec<f64>,
    pub k: Vec<f64>,
}

/// A single sample description file.
///
/// Every numeric field is a list: scalar quantities are stored as
/// `[value, error]`, series as plain lists. Unknown keys are carried through
/// to the result record untouched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SampleData {
    #[serde(rename = "File Name", default)]
    pub file_name: String,
    /// Ohms/sq, one entry per four-point-probe reading.
    #[serde(rename = "Sheet Resistance", default)]
    pub sheet_resistance: Vec<f64>,
    /// `[nm, nm]`
    #[serde(rename = "Film Thickness", default)]
    pub film_thickness: Vec<f64>,
    #[serde(rename = "Epsilon Infinity", default)]
    pub epsilon_infinity: Vec<f64>,
    /// `[cm²/Vs, cm²/Vs]`
    #[serde(rename = "Electron Mobility", default)]
    pub electron_mobility: Vec<f64>,
    /// nm
    #[serde(rename = "Resonant Wavelength", default)]
    pub resonant_wavelength: Vec<f64>,
    #[serde(
        rename = "Resonant Wavelength Error",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub resonant_wavelength_error: Vec<f64>,
    #[serde(rename = "Material Index", default)]
    pub material_index: Vec<f64>,
    #[serde(rename = "Index Upper Bound", default)]
    pub index_upper_bound: Vec<f64>,
    #[serde(rename = "Index Lower Bound", default)]
    pub index_lower_bound: Vec<f64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SampleData {
    /// Lab files mark known-bad samples with a top-level `"Skip"` key.
    pub fn is_flagged_skip(&self) -> bool {
        self.extra.contains_key("Skip")
    }
}

/// Per-batch optical measurements reduced from an S4 output file.
///
/// All series are parallel: entry `i` belongs to the `i`-th usable grating.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    #[serde(rename = "Gratings")]
    pub gratings: Vec<String>,
    #[serde(rename = "Refractive Index")]
    pub refractive_index: Vec<f64>,
    #[serde(rename = "Refractive Index Error")]
    pub refractive_index_error: Vec<f64>,
    #[serde(rename = "Extinction Coefficient")]
    pub extinction_coefficient: Vec<f64>,
    #[serde(rename = "Extinction Coefficient Error")]
    pub extinction_coefficient_error: Vec<f64>,
    /// nm
    #[serde(rename = "Peak Wavelength")]
    pub peak_wavelength: Vec<f64>,
    #[serde(rename = "Peak Wavelength Error")]
    pub peak_wavelength_error: Vec<f64>,
    /// nm
    #[serde(rename = "Film Thickness")]
    pub film_thickness: Vec<f64>,
    #[serde(rename = "Film Thickness Error")]
    pub film_thickness_error: Vec<f64>,
    #[serde(rename = "Figure Of Merit")]
    pub figure_of_merit: Vec<f64>,
}

impl MeasurementRecord {
    pub fn is_empty(&self) -> bool {
        self.peak_wavelength.is_empty()
    }
}

/// Why a sample or batch produced no output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkipRecord {
    pub sample: String,
    pub kind: String,
    pub reason: String,
}

impl SkipRecord {
    pub fn new(sample: impl Into<String>, kind: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            sample: sample.into(),
            kind: kind.into(),
            reason: reason.into(),
        }
    }

    pub fn from_error(sample: impl Into<String>, err: &DrudeError) -> Self {
        Self::new(sample, err.kind(), err.to_string())
    }
}

/// A full run's configuration as understood by the pipeline.
///
/// This is derived from CLI flags, environment and config files.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub constants: Constants,
    pub frequency: FrequencyRange,
    /// Plot ticks copied into records for downstream plotting.
    pub frequency_ticks: Vec<f64>,
    pub out_dir: PathBuf,
    /// Process independent batches on the rayon pool.
    pub parallel: bool,
    /// Recompute batches whose output file already exists.
    pub force: bool,
    pub max_iterations: usize,
    /// Assumed resonance uncertainty when a sample file carries none.
    pub wavelength_error_nm: f64,
    /// Overrides the parameter file's `Carrier Density Margin`.
    pub carrier_density_margin: Option<f64>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            constants: Constants::default(),
            frequency: FrequencyRange::default(),
            frequency_ticks: Vec::new(),
            out_dir: PathBuf::from("."),
            parallel: false,
            force: false,
            max_iterations: 200,
            wavelength_error_nm: 10.0,
            carrier_density_margin: None,
        }
    }
}
