//! Error types shared across Surveyload crates

use thiserror::Error;

/// Result type alias for common operations
pub type Result<T> = std::result::Result<T, CommonError>;

/// Errors raised while parsing the shared vocabulary
#[derive(Error, Debug, PartialEq, Eq)]
pub enum CommonError {
    #[error("Invalid questionnaire identity '{0}': expected '<id>$<version>'")]
    InvalidIdentity(String),

    #[error("Invalid {kind}: '{value}'")]
    InvalidValue { kind: &'static str, value: String },
}

impl CommonError {
    /// Create an invalid value error for a named vocabulary
    pub fn invalid_value(kind: &'static str, value: impl Into<String>) -> Self {
        Self::InvalidValue {
            kind,
            value: value.into(),
        }
    }
}
