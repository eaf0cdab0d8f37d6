//! Error types for the flowsignal system.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for the flowsignal system.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A source table is missing or failed to answer.
    #[error("Source table {table} unavailable: {reason}")]
    SourceUnavailable { table: String, reason: String },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Create a configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }

    /// Create a source-unavailable error for a named table.
    pub fn source_unavailable(table: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::SourceUnavailable {
            table: table.into(),
            reason: reason.into(),
        }
    }

    /// Create a database error.
    pub fn database(msg: impl Into<String>) -> Self {
        Error::Database(msg.into())
    }

    /// Whether this error means "the table is not there", as opposed to a
    /// broken connection or bad input.
    pub fn is_source_unavailable(&self) -> bool {
        matches!(self, Error::SourceUnavailable { .. })
    }
}
