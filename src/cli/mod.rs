//! Command-line parsing for the Drude permittivity fitter.
//!
//! Argument parsing and command dispatch stay separate from the physics and
//! fitting code. Paths that are the same for every run (parameter table,
//! constants, results directory) may come from the environment or a `.env`
//! file instead of flags.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "drude", version, about = "Drude permittivity analysis of thin conducting films")]
pub struct Cli {
    #[command(flatten)]
    pub common: CommonArgs,

    #[command(subcommand)]
    pub command: Command,
}

/// Options shared by every subcommand.
#[derive(Debug, Args, Clone)]
pub struct CommonArgs {
    /// Physical constants JSON; CODATA values when omitted.
    #[arg(long, global = true, env = "DRUDE_CONSTANTS", value_name = "JSON")]
    pub constants: Option<PathBuf>,

    /// Run info JSON (`Frequency THz Range`, `Frequency THz Ticks`, `Sample Names`).
    #[arg(long, global = true, value_name = "JSON")]
    pub info: Option<PathBuf>,

    /// Frequency grid in THz as START STOP STEP (stop exclusive).
    #[arg(long, global = true, num_args = 3, value_names = ["START", "STOP", "STEP"], allow_negative_numbers = true)]
    pub frequency: Option<Vec<f64>>,

    /// Directory result records are written to.
    #[arg(short = 'o', long, global = true, env = "DRUDE_RESULTS", default_value = "results")]
    pub out_dir: PathBuf,
}

/// CLI subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Sheet resistance, thickness and mobility to a Drude curve.
    Electrical(SampleArgs),
    /// Resonant wavelengths and refractive index to permittivity points.
    Optical(OpticalArgs),
    /// Electrical and optical results of each sample in one record.
    Compare(OpticalArgs),
    /// Two-stage Drude fit of every batch of probe CSVs against its S4 output.
    Batch(BatchArgs),
    /// Drude curves for a set of films across a range of assumed mobilities.
    Sweep(SweepArgs),
    /// Permittivity from reflectometer n/k spectra.
    Nk(NkArgs),
    /// Generate noisy permittivity from known Drude parameters, optionally fitting it.
    Simulate(SimulateArgs),
    /// Write blank sample description files.
    Init(InitArgs),
}

#[derive(Debug, Args, Clone)]
pub struct SampleArgs {
    /// Sample description JSON files.
    #[arg(required = true, value_name = "JSON")]
    pub samples: Vec<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct OpticalArgs {
    #[command(flatten)]
    pub samples: SampleArgs,

    /// Resonance uncertainty (nm) for samples without `Resonant Wavelength Error`.
    #[arg(long, default_value_t = 10.0)]
    pub wavelength_error: f64,
}

#[derive(Debug, Args, Clone)]
pub struct BatchArgs {
    /// Directory of four-point-probe CSV files named `<batch>_….csv`.
    #[arg(long, value_name = "DIR")]
    pub csv_dir: PathBuf,

    /// Directory of S4 outputs named `<batch>_…S4.json`.
    #[arg(long, value_name = "DIR")]
    pub s4_dir: PathBuf,

    /// Drude parameter table.
    #[arg(long, env = "DRUDE_PARAMETERS", value_name = "JSON")]
    pub parameters: PathBuf,

    /// Process batches in parallel.
    #[arg(long)]
    pub parallel: bool,

    /// Recompute batches whose result file already exists.
    #[arg(long)]
    pub force: bool,

    /// Optimiser iteration cap per fit.
    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,

    /// Relative widening of the carrier-density window for the imaginary fit;
    /// overrides the parameter table.
    #[arg(long)]
    pub margin: Option<f64>,
}

#[derive(Debug, Args, Clone)]
pub struct SweepArgs {
    /// CSV with `Sample`, `Sheet Resistance` (Ω/sq) and `Film Thickness` (nm) columns.
    #[arg(value_name = "CSV")]
    pub films: PathBuf,

    /// Contact resistance (Ω/sq) subtracted from every reading.
    #[arg(long, default_value_t = 1.17)]
    pub probe_offset: f64,

    /// Mobility grid in cm²/Vs as START STOP STEP (stop exclusive).
    #[arg(long, num_args = 3, value_names = ["START", "STOP", "STEP"], default_values_t = [5.0, 51.0, 5.0])]
    pub mobilities: Vec<f64>,

    #[arg(long, default_value_t = 3.9)]
    pub epsilon_infinity: f64,
}

#[derive(Debug, Args, Clone)]
pub struct NkArgs {
    /// Reflectometer `.fitnk` exports.
    #[arg(required = true, value_name = "FITNK")]
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Args, Clone)]
pub struct SimulateArgs {
    /// Name used for the output record.
    #[arg(long, default_value = "synthetic")]
    pub name: String,

    /// Carrier density, m⁻³.
    #[arg(long, default_value_t = 1e26)]
    pub carrier_density: f64,

    #[arg(long, default_value_t = 0.35)]
    pub effective_mass: f64,

    #[arg(long, default_value_t = 3.9)]
    pub epsilon_infinity: f64,

    /// Relaxation time, s.
    #[arg(long, default_value_t = 5e-15)]
    pub relaxation_time: f64,

    /// Angular frequency range in rad/s as START STOP.
    #[arg(long, num_args = 2, value_names = ["START", "STOP"], default_values_t = [3e14, 2e15])]
    pub omega: Vec<f64>,

    #[arg(long, default_value_t = 40)]
    pub points: usize,

    /// Gaussian noise standard deviation on both components.
    #[arg(long, default_value_t = 0.05)]
    pub noise: f64,

    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Fit the generated points with this parameter table.
    #[arg(long, value_name = "JSON")]
    pub fit: Option<PathBuf>,

    /// Relative uncertainty of the carrier density seeding the fit.
    #[arg(long, default_value_t = 0.1)]
    pub carrier_density_error: f64,

    #[arg(long, default_value_t = 200)]
    pub max_iterations: usize,
}

#[derive(Debug, Args, Clone)]
pub struct InitArgs {
    /// Sample names; defaults to `Sample Names` from the info file.
    #[arg(value_name = "NAME")]
    pub names: Vec<String>,

    /// Overwrite existing files.
    #[arg(long)]
    pub force: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn batch_flags_parse() {
        let cli = Cli::try_parse_from([
            "drude", "batch", "--csv-dir", "4pp", "--s4-dir", "s4", "--parameters", "p.json",
            "--parallel", "--margin", "0.2",
        ])
        .unwrap();
        let Command::Batch(args) = cli.command else {
            panic!("expected batch");
        };
        assert!(args.parallel);
        assert!(!args.force);
        assert_eq!(args.margin, Some(0.2));
    }

    #[test]
    fn frequency_takes_three_values() {
        let cli = Cli::try_parse_from([
            "drude", "nk", "a.fitnk", "--frequency", "500", "100", "-5",
        ])
        .unwrap();
        assert_eq!(cli.common.frequency, Some(vec![500.0, 100.0, -5.0]));
    }

    #[test]
    fn sweep_defaults() {
        let cli = Cli::try_parse_from(["drude", "sweep", "films.csv"]).unwrap();
        let Command::Sweep(args) = cli.command else {
            panic!("expected sweep");
        };
        assert_eq!(args.mobilities, vec![5.0, 51.0, 5.0]);
        assert_eq!(args.probe_offset, 1.17);
    }
}
