//! Error types for querydef.

use thiserror::Error;

/// The main error type for querydef operations.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The model is in the wrong state for the requested operation.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The serialized query type tag is not one we know about.
    #[error("Unsupported query type: {0}. Expected: 0 (uninitialised), 1 (managed) or 2 (raw)")]
    UnsupportedKind(i64),

    /// Serialized input is not a valid query model document.
    #[error("Malformed query model: {0}")]
    Malformed(String),

    /// Encoding a model failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A clause was rejected by the statement builder.
    #[error("Invalid {clause} clause: {message}")]
    InvalidClause {
        clause: &'static str,
        message: String,
    },

    /// A projected column is outside the configured allow-list.
    #[error("Invalid column: '{0}'")]
    InvalidColumn(String),

    /// Database error raised by the driver.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Execution error raised by a non-sqlx connection.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Cursor lookup by name failed.
    #[error("Column not found: '{0}'")]
    ColumnNotFound(String),

    /// Cursor is positioned before the first or after the last row.
    #[error("Cursor is not positioned on a row")]
    NoCurrentRow,

    /// Cursor value could not be read as the requested type.
    #[error("Type mismatch for column '{column}': expected {expected}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl QueryError {
    /// Create a clause rejection error.
    pub fn clause(clause: &'static str, message: impl Into<String>) -> Self {
        Self::InvalidClause {
            clause,
            message: message.into(),
        }
    }

    /// Create a type mismatch error.
    pub fn mismatch(column: impl Into<String>, expected: &'static str) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected,
        }
    }
}

/// Result type alias for querydef operations.
pub type QueryResult<T> = Result<T, QueryError>;
