//! Error types.
//!
//! Two layers:
//!
//! - [`DrudeError`]: typed, per-sample failures raised by the physics, the
//!   uncertainty propagation and the optimiser. The batch pipeline turns
//!   these into skip records instead of aborting the run.
//! - [`AppError`]: what the binary reports on exit (message + exit code).

use thiserror::Error;

/// Failure kinds of a single sample/batch computation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DrudeError {
    /// A required field is absent or empty (includes the S4 "Skip" sentinel).
    #[error("missing measurement: {0}")]
    MissingMeasurement(String),

    /// A zero denominator in a formula.
    #[error("division by zero in {0}")]
    DivisionByZero(String),

    /// The optimiser could not honour its bounds, converge, or estimate a covariance.
    #[error("fit diverged: {0}")]
    FitDivergence(String),

    /// Parallel arrays of unequal length.
    #[error("mismatched lengths for {what}: {left} vs {right}")]
    MismatchedLengths {
        what: String,
        left: usize,
        right: usize,
    },

    /// `sqrt(N e^2 / eps0 m*)` has no real value for `N < 0`.
    #[error("negative carrier density {0:e} m^-3 has no real plasma frequency")]
    NegativeCarrierDensity(f64),
}

impl DrudeError {
    /// Short label used in skip records and summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            DrudeError::MissingMeasurement(_) => "missing_measurement",
            DrudeError::DivisionByZero(_) => "division_by_zero",
            DrudeError::FitDivergence(_) => "fit_divergence",
            DrudeError::MismatchedLengths { .. } => "mismatched_lengths",
            DrudeError::NegativeCarrierDensity(_) => "negative_carrier_density",
        }
    }

    pub(crate) fn mismatched(what: impl Into<String>, left: usize, right: usize) -> Self {
        DrudeError::MismatchedLengths {
            what: what.into(),
            left,
            right,
        }
    }
}

#[derive(Clone)]
pub struct AppError {
    exit_code: u8,
    message: String,
}

impl AppError {
    pub fn new(exit_code: u8, message: impl Into<String>) -> Self {
        Self {
            exit_code,
            message: message.into(),
        }
    }

    /// Configuration or file-system problem.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(2, message)
    }

    pub fn exit_code(&self) -> u8 {
        self.exit_code
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<DrudeError> for AppError {
    fn from(err: DrudeError) -> Self {
        AppError::new(4, err.to_string())
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("exit_code", &self.exit_code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::error::Error for AppError {}
