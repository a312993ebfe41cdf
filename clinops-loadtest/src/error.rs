use thiserror::Error;

/// Errors that halt a load generation phase or the export of its results.
///
/// Failures of individual queries are not errors; they are recorded as failed
/// [`QueryResult`](crate::QueryResult)s.
#[derive(Debug, Error)]
pub enum LoadError {
    /// The warehouse returned no patients to open dashboards for.
    #[error("no patients available")]
    NoPatients,

    /// Sampling patients from the warehouse failed.
    #[error("warehouse error: {0}")]
    Warehouse(#[from] clinops_warehouse::WarehouseError),

    /// Writing a result file failed.
    #[error("failed to write {path}")]
    Io {
        /// The file being written.
        path: String,
        /// The underlying I/O error.
        #[source]
        cause: std::io::Error,
    },

    /// Serializing results as CSV failed.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

/// Result type for load generation operations.
pub type LoadResult<T, E = LoadError> = std::result::Result<T, E>;
