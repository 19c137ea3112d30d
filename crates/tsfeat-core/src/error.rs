//! Error types for table feature operations.

use thiserror::Error;

/// Result type for feature operations.
pub type Result<T> = std::result::Result<T, FeatureError>;

/// Error types for table transforms and diagnostics.
#[derive(Error, Debug)]
pub enum FeatureError {
    #[error("Column not found: {0}")]
    MissingColumn(String),

    #[error("Duplicate column: {0}")]
    DuplicateColumn(String),

    #[error("Length mismatch for column '{column}': expected {expected} rows, got {got}")]
    LengthMismatch {
        column: String,
        expected: usize,
        got: usize,
    },

    #[error("Type mismatch for column '{column}': expected {expected}, found {found}")]
    TypeMismatch {
        column: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("Unable to parse '{value}' in column '{column}' at row {row} as a datetime")]
    DateParse {
        column: String,
        row: usize,
        value: String,
    },

    #[error("Insufficient data: need at least {needed} observations, got {got}")]
    InsufficientData { needed: usize, got: usize },

    #[error("Non-finite values: {0}")]
    NonFinite(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Invalid parameter '{param}' = '{value}': {reason}")]
    InvalidParameter {
        param: String,
        value: String,
        reason: String,
    },

    #[error("Computation error: {0}")]
    ComputationError(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
