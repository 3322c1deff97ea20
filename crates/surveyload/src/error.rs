//! Error types for the conversion pipeline
//!
//! Every variant aborts the current run. Messages name the table, column and
//! row involved so the offending export can be inspected by hand.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for pipeline operations
pub type Result<T> = std::result::Result<T, LoadError>;

#[derive(Error, Debug)]
pub enum LoadError {
    /// Export service unreachable or answered with something unparseable
    #[error("Export service error: {0}")]
    Transport(String),

    /// No archive can be downloaded for the job
    #[error("Export job {job_id} has no downloadable archive (status: {status})")]
    ExportIncomplete {
        job_id: i64,
        status: surveyload_common::types::JobStatus,
    },

    /// Job reached the Failed state on the server
    #[error("Export job {job_id} failed on the server: {reason}")]
    ExportFailed { job_id: i64, reason: String },

    /// Neither an embedded nor a fallback questionnaire document exists
    #[error("No questionnaire document in archive '{}' and no fallback document given. Pass --document to supply one.", archive.display())]
    MissingMetadata { archive: PathBuf },

    /// A system table header disagrees with its fixed schema
    #[error("Header of system table '{table}' does not match its fixed schema: expected [{expected}], found [{found}]")]
    SchemaMismatch {
        table: String,
        expected: String,
        found: String,
    },

    /// A non-null value could not be parsed as its declared column type
    #[error("Cannot read '{value}' as {expected} in table '{table}', column '{column}', row {row}")]
    TypeCoercion {
        table: String,
        column: String,
        row: u64,
        value: String,
        expected: &'static str,
    },

    /// Duplicate or null primary key
    #[error("Primary key violation in table '{table}' at row {row}: {detail}")]
    KeyViolation {
        table: String,
        row: u64,
        detail: String,
    },

    /// Store address scheme is not one of the supported drivers
    #[error("Unsupported store address '{0}'. Use a sqlite:// or postgres:// URL.")]
    UnsupportedStore(String),

    /// Configuration is missing or invalid
    #[error("Configuration error: {0}. Check your environment variables or command-line flags.")]
    Config(String),

    #[error(transparent)]
    Common(#[from] surveyload_common::CommonError),

    #[error("File operation failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("Malformed tab-separated file: {0}")]
    Tabular(#[from] csv::Error),

    #[error("Database error: {0}. Check the store address and credentials.")]
    Database(#[from] sqlx::Error),
}

impl LoadError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn key_violation(table: impl Into<String>, row: u64, detail: impl Into<String>) -> Self {
        Self::KeyViolation {
            table: table.into(),
            row,
            detail: detail.into(),
        }
    }
}

impl From<reqwest::Error> for LoadError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
