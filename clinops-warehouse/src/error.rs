use thiserror::Error;

/// Errors that can occur while talking to the warehouse or decoding its rows.
#[derive(Debug, Error)]
pub enum WarehouseError {
    /// All errors stemming from the reqwest client.
    ///
    /// These can be network errors encountered when sending the request, or errors while reading
    /// the response body.
    #[error("reqwest error: {context}")]
    Reqwest {
        /// What we were doing when the error occurred.
        context: String,
        /// The underlying client error.
        #[source]
        cause: reqwest::Error,
    },

    /// Errors related to de/serialization of API payloads.
    #[error("serde error: {context}")]
    Serde {
        /// What we were decoding when the error occurred.
        context: String,
        /// The underlying serde error.
        #[source]
        cause: serde_json::Error,
    },

    /// The warehouse rejected or failed the statement.
    #[error("statement failed ({code}): {message}")]
    Statement {
        /// The vendor error code.
        code: String,
        /// The vendor error message.
        message: String,
        /// The ANSI SQL state, if provided.
        sql_state: Option<String>,
    },

    /// The statement did not complete within the configured timeout.
    #[error("statement timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// The session was used after [`Warehouse::close`](crate::Warehouse::close).
    #[error("session is closed")]
    Closed,

    /// A row value could not be decoded into the requested type.
    #[error("cannot decode column {column}: {reason}")]
    Decode {
        /// Zero-based column index.
        column: usize,
        /// Human readable explanation.
        reason: String,
    },

    /// The configuration cannot be used to open a session.
    #[error("invalid warehouse configuration: {0}")]
    Config(String),
}

impl WarehouseError {
    pub(crate) fn decode(column: usize, reason: impl Into<String>) -> Self {
        Self::Decode {
            column,
            reason: reason.into(),
        }
    }
}

/// Result type for warehouse operations.
pub type WarehouseResult<T> = Result<T, WarehouseError>;
