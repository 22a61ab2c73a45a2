use thiserror::Error;

use crate::data::{ingest::IngestError, DataError};

/// Crate-wide error type
///
/// Every fallible operation in `seirfit` returns this error. Data and ingestion problems are
/// wrapped from their module-level errors; the remaining variants belong to the estimation
/// pipeline itself.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SeirError {
    /// The region series is malformed or cannot support rate derivation
    #[error("Data error: {0}")]
    Data(#[from] DataError),

    /// The case file could not be read or normalized
    #[error("Ingestion error: {0}")]
    Ingest(#[from] IngestError),

    /// The infectious estimate is not usable inside the logarithm of the objective
    #[error("Numerical fault at day {day} for beta = {beta}: infectious estimate is {value}")]
    NumericalFault { beta: f64, day: usize, value: f64 },

    /// The inner optimizer never reported success across the scanned susceptible range
    #[error("No inner optimization converged for initial susceptible counts in [{from}, {to}]")]
    NoConvergence { from: u64, to: u64 },

    /// A setting is outside its admissible range
    #[error("Invalid setting {name} = {value}: {reason}")]
    InvalidSettings {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    /// The ODE solver could not reach a requested time
    #[error("Solver error: {0}")]
    Solver(String),

    /// The optimizer backend failed outside of the objective
    #[error("Optimizer error: {0}")]
    Optimizer(String),
}

impl From<diffsol::error::DiffsolError> for SeirError {
    fn from(e: diffsol::error::DiffsolError) -> Self {
        SeirError::Solver(e.to_string())
    }
}

impl SeirError {
    pub(crate) fn invalid_setting(
        name: &'static str,
        value: impl ToString,
        reason: &'static str,
    ) -> Self {
        SeirError::InvalidSettings {
            name,
            value: value.to_string(),
            reason,
        }
    }
}
