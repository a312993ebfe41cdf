use std::fmt;

use thiserror::Error;

/// A generation phase of the synthetic data set.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Phase {
    /// Patient demographics.
    Patients,
    /// Encounters of the generated patients.
    Encounters,
    /// Lab results of the generated encounters.
    LabResults,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Phase::Patients => "patients",
            Phase::Encounters => "encounters",
            Phase::LabResults => "lab results",
        })
    }
}

/// Errors that can occur while generating, exporting or loading synthetic data.
#[derive(Debug, Error)]
pub enum GenerateError {
    /// A phase was run before the phase it builds on.
    #[error("cannot generate {phase} before {requires}")]
    IllegalState {
        /// The phase that was requested.
        phase: Phase,
        /// The phase that has to run first.
        requires: Phase,
    },

    /// A fan-out mean is not a positive, finite number.
    #[error("{name} must be positive, got {value}")]
    InvalidMean {
        /// The parameter name.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },

    /// A weighted draw was configured with unusable weights.
    #[error("invalid weights: {0}")]
    InvalidWeights(#[from] rand_distr::weighted::Error),

    /// A generated date fell outside the representable range.
    #[error("date out of range relative to {0}")]
    DateOutOfRange(chrono::NaiveDateTime),

    /// Writing a CSV file failed.
    #[error("failed to write {path}")]
    Io {
        /// The file being written.
        path: String,
        /// The underlying I/O error.
        #[source]
        cause: std::io::Error,
    },

    /// Serializing records as CSV failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    /// Loading into the warehouse failed.
    #[error("warehouse error: {0}")]
    Warehouse(#[from] clinops_warehouse::WarehouseError),
}

/// Result type for synthetic data operations.
pub type GenerateResult<T, E = GenerateError> = std::result::Result<T, E>;
