//! Batch Drude fit pipeline.
//!
//! One batch is a set of four-point-probe CSVs sharing a `<batch>_` prefix plus
//! the S4 grating output for the same batch:
//!
//! probe CSV + S4 -> conductivity -> carrier density -> permittivity points
//! -> real fit -> imaginary fit -> fitted curves -> `<batch>_Drude.json`
//!
//! A failing batch becomes a [`SkipRecord`]; the other batches are unaffected.

use std::f64::consts::PI;
use std::path::{Path, PathBuf};

use log::{info, warn};
use rayon::prelude::*;
use serde_json::Value;

use crate::domain::{
    DrudeComponent, FrequencyRange, MeasurementRecord, ParameterTable, RunConfig, SkipRecord,
};
use crate::error::{AppError, DrudeError};
use crate::fit::{DrudeFit, optimize_drude_permittivity};
use crate::io::{
    find_s4_measurement, group_batches, load_s4_document, load_sheet_resistance, output_path,
    reduce_s4, write_json,
};
use crate::math::{LmOptions, arange};
use crate::models::{angular_frequency, curve};
use crate::quantities::{
    AngularFrequencies, CarrierEstimate, TERAHERTZ, average_sample_conductivity,
    carrier_density, peaks_to_angular_frequencies, record_permittivities,
};
use crate::report::{ResultRecord, RunSummary, fit_result_record, parameter_set_record};

/// A THz grid and the matching angular frequencies.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyGrid {
    pub thz: Vec<f64>,
    /// rad/s
    pub omegas: Vec<f64>,
}

impl FrequencyGrid {
    pub fn new(range: &FrequencyRange) -> Result<Self, DrudeError> {
        let thz = arange(range.start, range.stop, range.step)?;
        let omegas = thz.iter().map(|&f| angular_frequency(f * TERAHERTZ)).collect();
        Ok(Self { thz, omegas })
    }

    /// `"Frequency THz"` plus the plot ticks when configured.
    pub fn insert_into(&self, record: &mut ResultRecord, stage: &str, ticks: &[f64]) {
        record.insert(stage, "Frequency THz", Value::from(self.thz.clone()));
        if !ticks.is_empty() {
            record.insert(stage, "Frequency THz Ticks", Value::from(ticks.to_vec()));
        }
    }
}

/// What happened to one batch.
#[derive(Debug, Clone, PartialEq)]
pub enum BatchOutcome {
    Written(String),
    /// Result file already present and `force` was not set.
    Existing(String),
    Skipped(SkipRecord),
}

/// Why one batch or sample produced no record: a file problem or a
/// computation problem.
#[derive(Debug)]
pub(crate) enum Failure {
    Io(AppError),
    Compute(DrudeError),
}

impl From<AppError> for Failure {
    fn from(err: AppError) -> Self {
        Failure::Io(err)
    }
}

impl From<DrudeError> for Failure {
    fn from(err: DrudeError) -> Self {
        Failure::Compute(err)
    }
}

impl Failure {
    pub(crate) fn into_skip(self, sample: &str) -> SkipRecord {
        match self {
            // Exit code 4 marks an internal record failure, not a filesystem fault.
            Failure::Io(e) if e.exit_code() == 4 => SkipRecord::new(sample, "serialization", e.message()),
            Failure::Io(e) => SkipRecord::new(sample, "io", e.message()),
            Failure::Compute(e) => SkipRecord::from_error(sample, &e),
        }
    }
}

/// Inputs shared by every batch of a run.
#[derive(Debug, Clone)]
pub struct BatchContext<'a> {
    pub config: &'a RunConfig,
    pub table: &'a ParameterTable,
    pub grid: &'a FrequencyGrid,
    pub s4_dir: &'a Path,
}

/// Fit every batch found in `csv_dir`, write one record per batch and `summary.json`.
///
/// Returns the summary; the error case is reserved for configuration
/// problems and for runs where no batch produced a result.
pub fn run_batches(ctx: &BatchContext<'_>, csv_dir: &Path) -> Result<RunSummary, AppError> {
    let batches: Vec<(String, Vec<PathBuf>)> = group_batches(csv_dir, ".csv")?.into_iter().collect();
    if batches.is_empty() {
        return Err(AppError::new(
            3,
            format!("No `<batch>_*.csv` files in '{}'", csv_dir.display()),
        ));
    }
    info!("{} batches in {}", batches.len(), csv_dir.display());

    let outcomes: Vec<BatchOutcome> = if ctx.config.parallel {
        batches
            .par_iter()
            .map(|(batch, files)| process_batch(ctx, batch, files))
            .collect()
    } else {
        batches
            .iter()
            .map(|(batch, files)| process_batch(ctx, batch, files))
            .collect()
    };

    let mut processed = Vec::new();
    let mut existing = Vec::new();
    let mut skipped = Vec::new();
    for outcome in outcomes {
        match outcome {
            BatchOutcome::Written(b) => processed.push(b),
            BatchOutcome::Existing(b) => existing.push(b),
            BatchOutcome::Skipped(s) => skipped.push(s),
        }
    }
    let summary = RunSummary::new(processed, existing, skipped);
    write_json(&ctx.config.out_dir.join("summary.json"), &summary)?;

    if summary.processed.is_empty() && summary.existing.is_empty() {
        return Err(AppError::new(
            3,
            format!("All {} batches were skipped; see summary.json", summary.skipped.len()),
        ));
    }
    Ok(summary)
}

/// Run one batch end to end, turning any failure into a skip record.
pub fn process_batch(ctx: &BatchContext<'_>, batch: &str, files: &[PathBuf]) -> BatchOutcome {
    let out = output_path(&ctx.config.out_dir, batch, "_Drude");
    if out.is_file() && !ctx.config.force {
        info!("{batch}: {} exists, skipping", out.display());
        return BatchOutcome::Existing(batch.to_string());
    }
    let result = batch_record(ctx, batch, files)
        .and_then(|record| write_json(&out, &record).map_err(Failure::from));
    match result {
        Ok(()) => BatchOutcome::Written(batch.to_string()),
        Err(failure) => {
            let skip = failure.into_skip(batch);
            warn!("{batch}: skipped ({}): {}", skip.kind, skip.reason);
            BatchOutcome::Skipped(skip)
        }
    }
}

fn batch_record(
    ctx: &BatchContext<'_>,
    batch: &str,
    files: &[PathBuf],
) -> Result<ResultRecord, Failure> {
    let Some(s4_path) = find_s4_measurement(ctx.s4_dir, batch)? else {
        return Err(DrudeError::MissingMeasurement(format!(
            "no `{batch}_*S4.json` in '{}'",
            ctx.s4_dir.display()
        ))
        .into());
    };
    let Some(csv_path) = files.first() else {
        return Err(DrudeError::MissingMeasurement("no sheet resistance file".to_string()).into());
    };
    let sheet_resistances = load_sheet_resistance(csv_path)?;
    let measurements = reduce_s4(&load_s4_document(&s4_path)?)?;
    info!(
        "{batch}: {} readings, {} gratings",
        sheet_resistances.len(),
        measurements.gratings.len()
    );

    let mut record = ResultRecord::new();
    record.insert("batch", "Batch", Value::from(batch));
    record.insert(
        "batch",
        "Sheet Resistance Files",
        Value::from(files.iter().map(|p| p.display().to_string()).collect::<Vec<_>>()),
    );
    record.insert("batch", "S4 File", Value::from(s4_path.display().to_string()));
    record.merge("S4 measurement", &measurements)?;

    let fit = fit_batch(ctx, batch, &sheet_resistances, &measurements, &mut record)?;
    info!(
        "{batch}: eps_inf {:.3}, tau {:.3e} s",
        fit.real.values[2], fit.imaginary.values[3]
    );
    Ok(record)
}

/// The numerical part of a batch: everything after the files are read.
fn fit_batch(
    ctx: &BatchContext<'_>,
    batch: &str,
    sheet_resistances: &[f64],
    measurements: &MeasurementRecord,
    record: &mut ResultRecord,
) -> Result<DrudeFit, Failure> {
    let constants = &ctx.config.constants;
    let conductivity = average_sample_conductivity(
        &measurements.film_thickness,
        &measurements.film_thickness_error,
        sheet_resistances,
    )?;
    let mobility = ctx.table.mobility(batch).ok_or_else(|| {
        DrudeError::MissingMeasurement(format!("no `Mobilities` entry for batch `{batch}`"))
    })?;
    let carriers = CarrierEstimate {
        mobility,
        carrier_density: carrier_density(conductivity.conductivity, mobility, constants)?,
    };
    let permittivity = record_permittivities(measurements)?;
    let angular = peaks_to_angular_frequencies(
        &measurements.peak_wavelength,
        &measurements.peak_wavelength_error,
        constants,
    )?;
    record.merge("conductivity", &conductivity)?;
    record.merge("carrier density", &carriers)?;
    record.merge("permittivity", &permittivity)?;
    record.merge("angular frequency", &angular)?;

    let margin = ctx
        .config
        .carrier_density_margin
        .unwrap_or(ctx.table.carrier_density_margin);
    let opts = LmOptions {
        max_iterations: ctx.config.max_iterations,
        ..LmOptions::default()
    };
    let fit = optimize_drude_permittivity(
        &angular.values,
        &permittivity,
        carriers.carrier_density,
        ctx.table,
        margin,
        constants,
        &opts,
    )?;
    merge_fit(record, &fit);
    insert_fitted_curves(record, ctx, &fit, &angular)?;
    Ok(fit)
}

/// Parameter sets and results of both fits, real first.
pub fn merge_fit(record: &mut ResultRecord, fit: &DrudeFit) {
    let real = DrudeComponent::Real.label();
    let imaginary = DrudeComponent::Imaginary.label();
    record.merge_map("real fit", parameter_set_record(real, &fit.real_guesses));
    record.merge_map("real fit", fit_result_record(&fit.real));
    record.merge_map("imaginary fit", parameter_set_record(imaginary, &fit.imaginary_guesses));
    record.merge_map("imaginary fit", fit_result_record(&fit.imaginary));
}

fn insert_fitted_curves(
    record: &mut ResultRecord,
    ctx: &BatchContext<'_>,
    fit: &DrudeFit,
    angular: &AngularFrequencies,
) -> Result<(), DrudeError> {
    let constants = &ctx.config.constants;
    let real = curve(DrudeComponent::Real, &ctx.grid.omegas, &fit.real.values, constants)?;
    let imaginary = curve(
        DrudeComponent::Imaginary,
        &ctx.grid.omegas,
        &fit.imaginary.values,
        constants,
    )?;
    let to_thz = |w: &f64| w / (2.0 * PI * TERAHERTZ);

    ctx.grid.insert_into(record, "curves", &ctx.config.frequency_ticks);
    record.insert("curves", "Real Drude Permittivity", Value::from(real));
    record.insert("curves", "Imaginary Drude Permittivity", Value::from(imaginary));
    record.insert(
        "curves",
        "Frequency Points THz",
        Value::from(angular.values.iter().map(to_thz).collect::<Vec<_>>()),
    );
    record.insert(
        "curves",
        "Frequency Points Error",
        Value::from(angular.errors.iter().map(to_thz).collect::<Vec<_>>()),
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{SyntheticTruth, generate_permittivity};
    use crate::domain::Constants;
    use serde_json::json;

    fn table() -> ParameterTable {
        serde_json::from_value(json!({
            "Names": ["Effective Mass", "Epsilon Infinity", "Relaxation Time"],
            "Guesses": [0.35, 3.5, 1e-14],
            "Bounds": [[0.35, 0.35], [1.0, 10.0], [1e-16, 1e-12]],
            "Mobilities": {"B1": 20.0},
            "Mobility Errors": {"B1": 1.0}
        }))
        .unwrap()
    }

    fn s4_grating(name: &str, n: f64, k_raw: f64, peak: f64) -> Value {
        let strings = json!(["material_n", "material_k", "film_thickness"]);
        let mut g = serde_json::Map::new();
        g.insert(
            format!("{name}_TE Variables"),
            json!({"S4 Strings": strings.clone(), "S4 Guesses": [n, k_raw, 150.0]}),
        );
        g.insert(
            format!("{name}_TM Variables"),
            json!({"S4 Strings": strings, "S4 Guesses": [n + 0.0004, k_raw, 152.0]}),
        );
        g.insert(format!("{name}_TE Optimizer Errors"), json!([0.01, 0.02, 1.0]));
        g.insert(format!("{name}_TE Fano Fit Parameters"), json!(["Peak", "Width"]));
        g.insert(format!("{name}_TE Fano Fit"), json!([peak, 20.0]));
        g.insert(format!("{name}_TE Fano Errors"), json!([2.0, 1.0]));
        g.insert(format!("{name}_TE Figure Of Merit"), json!(1.0));
        g.insert(format!("{name}_TM Figure Of Merit"), json!(2.0));
        Value::Object(g)
    }

    /// S4 document whose (n, k) sit on a Drude film with known parameters.
    fn write_batch(dir: &Path) -> (PathBuf, PathBuf) {
        let csv_dir = dir.join("4pp");
        let s4_dir = dir.join("s4");
        std::fs::create_dir_all(&csv_dir).unwrap();
        std::fs::create_dir_all(&s4_dir).unwrap();
        std::fs::write(csv_dir.join("B1_probe.csv"), "R\n500\n502\n498\n").unwrap();
        std::fs::write(csv_dir.join("B2_probe.csv"), "R\n400\n401\n").unwrap();

        let truth = SyntheticTruth {
            carrier_density: 4.0e25,
            effective_mass: 0.35,
            epsilon_infinity: 3.9,
            relaxation_time: 5e-15,
            omega_start: 1.0e15,
            omega_stop: 2.0e15,
            points: 6,
            noise: 1e-3,
            seed: 3,
        };
        let (omegas, eps) = generate_permittivity(&truth, &Constants::default()).unwrap();
        let mut names = Vec::new();
        let mut doc = serde_json::Map::new();
        for (i, &w) in omegas.iter().enumerate() {
            // n, k from (ε', ε''): n² - k² = ε', 2nk = ε''
            let modulus = (eps.real[i].powi(2) + eps.imaginary[i].powi(2)).sqrt();
            let n = ((modulus + eps.real[i]) / 2.0).sqrt();
            let k = eps.imaginary[i] / (2.0 * n);
            let peak_nm = 2.0 * PI * 299_792_458.0 / w * 1e9;
            let name = format!("G{i}");
            doc.insert(name.clone(), s4_grating(&name, n, k / 10.0, peak_nm));
            names.push(name);
        }
        doc.insert("Gratings".into(), json!(names));
        std::fs::write(
            s4_dir.join("B1_run_S4.json"),
            serde_json::to_string(&Value::Object(doc)).unwrap(),
        )
        .unwrap();
        (csv_dir, s4_dir)
    }

    #[test]
    fn frequency_grid_matches_range() {
        let grid = FrequencyGrid::new(&FrequencyRange::default()).unwrap();
        assert_eq!(grid.thz.len(), 899);
        assert_eq!(grid.thz[0], 900.0);
        assert!((grid.omegas[0] - 2.0 * PI * 900e12).abs() < 1.0);
    }

    #[test]
    fn batch_without_s4_is_skipped_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let (csv_dir, s4_dir) = write_batch(dir.path());
        let config = RunConfig {
            out_dir: dir.path().join("results"),
            ..RunConfig::default()
        };
        let table = table();
        let grid = FrequencyGrid::new(&FrequencyRange::from([900.0, 100.0, -100.0])).unwrap();
        let ctx = BatchContext {
            config: &config,
            table: &table,
            grid: &grid,
            s4_dir: &s4_dir,
        };
        let outcome = process_batch(&ctx, "B2", &[csv_dir.join("B2_probe.csv")]);
        let BatchOutcome::Skipped(skip) = outcome else {
            panic!("expected a skip, got {outcome:?}");
        };
        assert_eq!(skip.kind, "missing_measurement");
        assert!(!config.out_dir.join("B2_Drude.json").exists());
    }

    #[test]
    fn full_run_writes_records_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let (csv_dir, s4_dir) = write_batch(dir.path());
        let config = RunConfig {
            out_dir: dir.path().join("results"),
            ..RunConfig::default()
        };
        let table = table();
        let grid = FrequencyGrid::new(&FrequencyRange::from([900.0, 100.0, -100.0])).unwrap();
        let ctx = BatchContext {
            config: &config,
            table: &table,
            grid: &grid,
            s4_dir: &s4_dir,
        };
        let summary = run_batches(&ctx, &csv_dir).unwrap();
        assert_eq!(summary.processed, ["B1"]);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].sample, "B2");

        let text = std::fs::read_to_string(config.out_dir.join("B1_Drude.json")).unwrap();
        let record: Value = serde_json::from_str(&text).unwrap();
        let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
        assert_eq!(keys[0], "Batch");
        assert_eq!(record["Real Variable Names"][0], "Carrier Density");
        assert_eq!(record["Imaginary Results"].as_array().unwrap().len(), 4);
        assert_eq!(record["Real Drude Permittivity"].as_array().unwrap().len(), 8);
        let eps_inf = record["Real Results"][2].as_f64().unwrap();
        assert!((eps_inf - 3.9).abs() < 0.5, "eps_inf {eps_inf}");
        assert!(config.out_dir.join("summary.json").is_file());

        // a second run leaves the existing record alone
        let again = run_batches(&ctx, &csv_dir).unwrap();
        assert_eq!(again.existing, ["B1"]);
        assert!(again.processed.is_empty());
    }

    #[test]
    fn divergent_batch_does_not_stop_its_siblings() {
        let dir = tempfile::tempdir().unwrap();
        let (csv_dir, s4_dir) = write_batch(dir.path());
        std::fs::copy(s4_dir.join("B1_run_S4.json"), s4_dir.join("B2_run_S4.json")).unwrap();
        let config = RunConfig {
            out_dir: dir.path().join("results"),
            ..RunConfig::default()
        };
        // An overflowing mobility error leaves B2 with a non-finite carrier density window.
        let mut table = table();
        table.mobilities.insert("B2".into(), 20.0);
        table.mobility_errors.insert("B2".into(), 1e308);
        let grid = FrequencyGrid::new(&FrequencyRange::from([900.0, 100.0, -100.0])).unwrap();
        let ctx = BatchContext {
            config: &config,
            table: &table,
            grid: &grid,
            s4_dir: &s4_dir,
        };
        let summary = run_batches(&ctx, &csv_dir).unwrap();
        assert_eq!(summary.processed, ["B1"]);
        assert_eq!(summary.skipped.len(), 1);
        assert_eq!(summary.skipped[0].sample, "B2");
        assert_eq!(summary.skipped[0].kind, "fit_divergence");
        assert!(config.out_dir.join("B1_Drude.json").is_file());
        assert!(!config.out_dir.join("B2_Drude.json").exists());
    }

    #[test]
    fn record_failures_are_not_reported_as_io() {
        let skip = Failure::from(AppError::new(4, "non-object record")).into_skip("B1");
        assert_eq!(skip.kind, "serialization");
        let skip = Failure::from(AppError::config("cannot read 'x.json'")).into_skip("B1");
        assert_eq!(skip.kind, "io");
    }
}
