//! Single-file commands: per-sample electrical/optical analysis, mobility
//! sweeps, n/k spectra, synthetic data and sample templates.

use std::path::{Path, PathBuf};

use log::{info, warn};
use serde_json::Value;

use crate::app::pipeline::{Failure, FrequencyGrid, merge_fit};
use crate::cli::{SimulateArgs, SweepArgs};
use crate::data::{SyntheticTruth, generate_permittivity};
use crate::domain::{Measured, RunConfig, SampleData};
use crate::error::{AppError, DrudeError};
use crate::fit::{DrudeFit, optimize_drude_permittivity};
use crate::io::{
    load_fitnk, load_parameter_table, load_sample, load_sweep_films, output_path, write_json,
};
use crate::math::{LmOptions, arange};
use crate::quantities::{nk_to_permittivity, optical_to_drude, resistance_to_drude, sweep_mobility};
use crate::report::{ResultRecord, RunSummary};

/// Which analysis a sample command runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleAnalysis {
    Electrical,
    Optical,
    /// Optical then electrical, in one record.
    Compare,
}

impl SampleAnalysis {
    fn suffix(self) -> &'static str {
        match self {
            SampleAnalysis::Electrical => "_Electrical",
            SampleAnalysis::Optical => "_Optical",
            SampleAnalysis::Compare => "_Results",
        }
    }
}

/// Run `handle` on each path; failures become skip records named after the file stem.
fn for_each_file<F>(paths: &[PathBuf], mut handle: F) -> Result<RunSummary, AppError>
where
    F: FnMut(&Path) -> Result<String, Failure>,
{
    let mut processed = Vec::new();
    let mut skipped = Vec::new();
    for path in paths {
        match handle(path) {
            Ok(name) => processed.push(name),
            Err(failure) => {
                let stem = path
                    .file_stem()
                    .map(|s| s.to_string_lossy().into_owned())
                    .unwrap_or_else(|| path.display().to_string());
                let skip = failure.into_skip(&stem);
                warn!("{stem}: skipped ({}): {}", skip.kind, skip.reason);
                skipped.push(skip);
            }
        }
    }
    let summary = RunSummary::new(processed, Vec::new(), skipped);
    if summary.processed.is_empty() {
        return Err(AppError::new(
            3,
            format!("None of the {} input files produced a result", paths.len()),
        ));
    }
    Ok(summary)
}

/// Analyse sample description files, one record per sample.
pub fn run_samples(
    analysis: SampleAnalysis,
    paths: &[PathBuf],
    config: &RunConfig,
    grid: &FrequencyGrid,
) -> Result<RunSummary, AppError> {
    for_each_file(paths, |path| {
        let sample = load_sample(path)?;
        let record = sample_record(analysis, &sample, config, grid)?;
        write_json(
            &output_path(&config.out_dir, &sample.file_name, analysis.suffix()),
            &record,
        )?;
        Ok(sample.file_name)
    })
}

/// The record of one sample: its own fields followed by the derived quantities.
pub fn sample_record(
    analysis: SampleAnalysis,
    sample: &SampleData,
    config: &RunConfig,
    grid: &FrequencyGrid,
) -> Result<ResultRecord, Failure> {
    if sample.is_flagged_skip() {
        let reason = format!("`{}` is flagged Skip", sample.file_name);
        return Err(DrudeError::MissingMeasurement(reason).into());
    }
    let constants = &config.constants;
    let mut record = ResultRecord::new();
    record.merge("sample", sample)?;

    if matches!(analysis, SampleAnalysis::Optical | SampleAnalysis::Compare) {
        let optical = optical_to_drude(sample, constants, config.wavelength_error_nm)?;
        record.merge("optical", &optical)?;
    }
    if matches!(analysis, SampleAnalysis::Electrical | SampleAnalysis::Compare) {
        let electrical = resistance_to_drude(sample, constants, &grid.omegas)?;
        grid.insert_into(&mut record, "electrical", &config.frequency_ticks);
        record.merge("electrical", &electrical)?;
        info!(
            "{}: N {:.4e} ± {:.2e} m^-3",
            sample.file_name, electrical.carrier_density.value, electrical.carrier_density.error
        );
    }
    Ok(record)
}

/// One record per mobility: `<films stem>_<mobility>mu.json`.
pub fn run_sweep(args: &SweepArgs, config: &RunConfig, grid: &FrequencyGrid) -> Result<Vec<PathBuf>, AppError> {
    let films = load_sweep_films(&args.films)?;
    let &[start, stop, step] = args.mobilities.as_slice() else {
        return Err(AppError::config("--mobilities takes START STOP STEP"));
    };
    let mobilities = arange(start, stop, step)?;
    let sweeps = sweep_mobility(
        &films,
        args.probe_offset,
        &mobilities,
        args.epsilon_infinity,
        &config.constants,
        &grid.omegas,
    )?;

    let stem = args
        .films
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "sweep".to_string());
    let mut written = Vec::with_capacity(sweeps.len());
    for sweep in &sweeps {
        let mut record = ResultRecord::new();
        grid.insert_into(&mut record, "grid", &config.frequency_ticks);
        record.merge("sweep", sweep)?;
        let path = output_path(&config.out_dir, &stem, &format!("_{}mu", sweep.mobility));
        write_json(&path, &record)?;
        written.push(path);
    }
    Ok(written)
}

/// Permittivity of each `.fitnk` spectrum on the configured grid.
pub fn run_nk(paths: &[PathBuf], config: &RunConfig, grid: &FrequencyGrid) -> Result<RunSummary, AppError> {
    for_each_file(paths, |path| {
        let name = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let spectrum = load_fitnk(path)?;
        let permittivity = nk_to_permittivity(&spectrum, &grid.thz, &config.constants)?;
        let mut record = ResultRecord::new();
        record.insert("nk", "File Name", Value::from(name.as_str()));
        record.merge("nk", &permittivity)?;
        if !config.frequency_ticks.is_empty() {
            record.insert("nk", "Frequency THz Ticks", Value::from(config.frequency_ticks.clone()));
        }
        write_json(&output_path(&config.out_dir, &name, "_Permittivity"), &record)?;
        Ok(name)
    })
}

/// Generate synthetic permittivity and optionally fit it back.
pub fn run_simulate(args: &SimulateArgs, config: &RunConfig) -> Result<Option<DrudeFit>, AppError> {
    let &[omega_start, omega_stop] = args.omega.as_slice() else {
        return Err(AppError::config("--omega takes START STOP"));
    };
    let truth = SyntheticTruth {
        carrier_density: args.carrier_density,
        effective_mass: args.effective_mass,
        epsilon_infinity: args.epsilon_infinity,
        relaxation_time: args.relaxation_time,
        omega_start,
        omega_stop,
        points: args.points,
        noise: args.noise,
        seed: args.seed,
    };
    let (omegas, points) = generate_permittivity(&truth, &config.constants)?;

    let mut record = ResultRecord::new();
    record.insert("synthetic", "File Name", Value::from(args.name.as_str()));
    record.merge("synthetic", &truth)?;
    record.insert("synthetic", "Angular Frequency", Value::from(omegas.clone()));
    record.merge("synthetic", &points)?;

    let fit = match &args.fit {
        Some(table_path) => {
            let table = load_parameter_table(table_path)?;
            let seed = Measured::new(
                truth.carrier_density,
                truth.carrier_density * args.carrier_density_error,
            );
            let opts = LmOptions {
                max_iterations: args.max_iterations,
                ..LmOptions::default()
            };
            let margin = config
                .carrier_density_margin
                .unwrap_or(table.carrier_density_margin);
            let fit = optimize_drude_permittivity(
                &omegas,
                &points,
                seed,
                &table,
                margin,
                &config.constants,
                &opts,
            )?;
            merge_fit(&mut record, &fit);
            Some(fit)
        }
        None => None,
    };

    write_json(&output_path(&config.out_dir, &args.name, "_Simulated"), &record)?;
    Ok(fit)
}

/// Blank sample description files `<dir>/<name>.json`; existing files are kept unless `force`.
pub fn run_init(names: &[String], dir: &Path, force: bool) -> Result<Vec<PathBuf>, AppError> {
    if names.is_empty() {
        return Err(AppError::new(
            3,
            "No sample names given and the info file lists no `Sample Names`",
        ));
    }
    let mut written = Vec::new();
    for name in names {
        let path = output_path(dir, name, "");
        if path.exists() && !force {
            info!("{} exists, leaving it", path.display());
            continue;
        }
        let template = SampleData {
            file_name: name.clone(),
            ..SampleData::default()
        };
        write_json(&path, &template)?;
        written.push(path);
    }
    Ok(written)
}
