//! Top-level application orchestration.
//!
//! `src/main.rs` stays tiny; this module is the "real main" that:
//! - loads `.env` and parses CLI arguments
//! - loads constants, run info and the parameter table
//! - collapses everything into one `RunConfig`
//! - dispatches to the batch pipeline or a single-file command
//! - prints the run summary

use clap::Parser;
use log::info;

use crate::cli::{BatchArgs, Cli, Command, CommonArgs};
use crate::domain::{Constants, FrequencyRange, RunConfig, RunInfo};
use crate::error::AppError;
use crate::io::{load_constants, load_info, load_parameter_table};
use crate::report::{format_drude_fit, format_run_summary};

pub mod commands;
pub mod pipeline;

use commands::SampleAnalysis;
use pipeline::{BatchContext, FrequencyGrid};

/// Entry point for the `drude` binary.
pub fn run() -> Result<(), AppError> {
    // A missing `.env` is normal; variables may come from the shell.
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let info = load_info(cli.common.info.as_deref())?;
    let constants = load_constants(cli.common.constants.as_deref())?;
    let mut config = run_config(&cli.common, &info, constants)?;

    match cli.command {
        Command::Electrical(args) => {
            handle_samples(SampleAnalysis::Electrical, &args.samples, &config)
        }
        Command::Optical(args) => {
            config.wavelength_error_nm = args.wavelength_error;
            handle_samples(SampleAnalysis::Optical, &args.samples.samples, &config)
        }
        Command::Compare(args) => {
            config.wavelength_error_nm = args.wavelength_error;
            handle_samples(SampleAnalysis::Compare, &args.samples.samples, &config)
        }
        Command::Batch(args) => handle_batch(&args, &cli.common, config),
        Command::Sweep(args) => {
            let grid = frequency_grid(&config.frequency)?;
            let written = commands::run_sweep(&args, &config, &grid)?;
            println!("wrote {} sweep records to {}", written.len(), config.out_dir.display());
            Ok(())
        }
        Command::Nk(args) => {
            let grid = frequency_grid(&config.frequency)?;
            let summary = commands::run_nk(&args.files, &config, &grid)?;
            println!("{}", format_run_summary(&summary));
            Ok(())
        }
        Command::Simulate(args) => {
            if let Some(fit) = commands::run_simulate(&args, &config)? {
                println!("{}", format_drude_fit(&args.name, &fit));
            }
            Ok(())
        }
        Command::Init(args) => {
            let names = if args.names.is_empty() {
                info.sample_names.clone()
            } else {
                args.names
            };
            let written = commands::run_init(&names, &config.out_dir, args.force)?;
            for path in &written {
                println!("{}", path.display());
            }
            Ok(())
        }
    }
}

/// Collapse CLI flags, run info and constants into one configuration.
///
/// The frequency grid comes from `--frequency`, else the info file, else the
/// default 900 → 1 THz range.
pub fn run_config(common: &CommonArgs, info: &RunInfo, constants: Constants) -> Result<RunConfig, AppError> {
    let frequency = match common.frequency.as_deref() {
        Some(&[start, stop, step]) => FrequencyRange { start, stop, step },
        Some(other) => {
            return Err(AppError::config(format!(
                "--frequency takes START STOP STEP, got {} values",
                other.len()
            )));
        }
        None => info.frequency_thz_range,
    };
    Ok(RunConfig {
        constants,
        frequency,
        frequency_ticks: info.frequency_thz_ticks.clone(),
        out_dir: common.out_dir.clone(),
        ..RunConfig::default()
    })
}

fn frequency_grid(range: &FrequencyRange) -> Result<FrequencyGrid, AppError> {
    FrequencyGrid::new(range).map_err(|e| AppError::config(format!("Frequency grid: {e}")))
}

fn handle_samples(
    analysis: SampleAnalysis,
    samples: &[std::path::PathBuf],
    config: &RunConfig,
) -> Result<(), AppError> {
    let grid = frequency_grid(&config.frequency)?;
    let summary = commands::run_samples(analysis, samples, config, &grid)?;
    println!("{}", format_run_summary(&summary));
    Ok(())
}

fn handle_batch(args: &BatchArgs, common: &CommonArgs, mut config: RunConfig) -> Result<(), AppError> {
    let table = load_parameter_table(&args.parameters)?;
    if common.frequency.is_none() {
        if let Some(range) = table.frequency_thz_range {
            info!("frequency grid from {}", args.parameters.display());
            config.frequency = range;
        }
    }
    config.parallel = args.parallel;
    config.force = args.force;
    config.max_iterations = args.max_iterations;
    if let Some(margin) = args.margin {
        if !(margin.is_finite() && margin >= 0.0) {
            return Err(AppError::config("--margin must be finite and >= 0"));
        }
        config.carrier_density_margin = Some(margin);
    }

    let grid = frequency_grid(&config.frequency)?;
    let ctx = BatchContext {
        config: &config,
        table: &table,
        grid: &grid,
        s4_dir: &args.s4_dir,
    };
    let summary = pipeline::run_batches(&ctx, &args.csv_dir)?;
    println!("{}", format_run_summary(&summary));
    Ok(())
}
