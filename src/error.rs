//! Error types for the rapport analysis pipeline
//!
//! Three families, all fatal for a batch run:
//! - data access: a source file is missing or not tabular
//! - schema: an expected column is absent or has the wrong shape
//! - statistics: an empty group, degenerate variance or singular design

use thiserror::Error;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Pipeline error types
#[derive(Error, Debug)]
pub enum Error {
    /// Source file missing, unreadable or not parsable as a table
    #[error("Storage error: {0}")]
    StorageError(String),

    /// Expected column absent from a table
    #[error("Column not found: {column}\nAvailable columns: {available}")]
    ColumnNotFound {
        /// Requested column name
        column: String,
        /// Comma separated list of the columns the table does have
        available: String,
    },

    /// Column present but unusable (wrong type, non-numeric values, ...)
    #[error("Schema error: {0}")]
    SchemaError(String),

    /// Statistical precondition violated (empty group, zero variance, singular design)
    #[error("Statistics error: {0}")]
    Statistics(String),

    /// Plot rendering failed
    #[error("Plot error: {0}")]
    Plot(String),

    /// Invalid pipeline configuration
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Invalid argument to an operation
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Arrow error
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet error
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    /// Spreadsheet read error
    #[error("Spreadsheet read error: {0}")]
    Spreadsheet(#[from] calamine::Error),

    /// Spreadsheet write error
    #[error("Spreadsheet write error: {0}")]
    Xlsx(#[from] rust_xlsxwriter::XlsxError),

    /// JSON (config, manifest, report) error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error
    #[error("{0}")]
    Other(String),
}
