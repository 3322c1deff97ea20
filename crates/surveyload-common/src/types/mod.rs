//! Common types used across Surveyload

use crate::error::{CommonError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ============================================================================
// Questionnaire Identity
// ============================================================================

/// Names one revision of a questionnaire.
///
/// The export service keys its jobs by this pair and renders it on the wire as
/// `<id>$<version>`, where `<id>` is the questionnaire GUID in lowercase hex
/// without dashes.
///
/// # Examples
///
/// ```rust
/// use surveyload_common::types::QuestionnaireIdentity;
///
/// let identity = QuestionnaireIdentity::new("0D4F2A3B-8C1E-4F5A-9B7C-6D5E4F3A2B1C", 2).unwrap();
/// assert_eq!(identity.to_string(), "0d4f2a3b8c1e4f5a9b7c6d5e4f3a2b1c$2");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuestionnaireIdentity {
    id: String,
    version: i64,
}

impl QuestionnaireIdentity {
    /// Build an identity from a GUID (dashed or not, any case) and a version
    pub fn new(id: &str, version: i64) -> Result<Self> {
        let normalized: String = id
            .chars()
            .filter(|c| *c != '-')
            .collect::<String>()
            .to_ascii_lowercase();

        if normalized.len() != 32 || !normalized.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(CommonError::InvalidIdentity(format!("{}${}", id, version)));
        }
        if version < 1 {
            return Err(CommonError::InvalidIdentity(format!("{}${}", id, version)));
        }

        Ok(Self {
            id: normalized,
            version,
        })
    }

    /// Questionnaire GUID as 32 lowercase hex digits
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn version(&self) -> i64 {
        self.version
    }
}

impl fmt::Display for QuestionnaireIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}${}", self.id, self.version)
    }
}

impl FromStr for QuestionnaireIdentity {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        let (id, version) = s
            .split_once('$')
            .ok_or_else(|| CommonError::InvalidIdentity(s.to_string()))?;
        let version = version
            .parse::<i64>()
            .map_err(|_| CommonError::InvalidIdentity(s.to_string()))?;
        Self::new(id, version).map_err(|_| CommonError::InvalidIdentity(s.to_string()))
    }
}

// ============================================================================
// Export Request Vocabulary
// ============================================================================

/// Export file format produced by the service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ExportType {
    #[default]
    Tabular,
    #[serde(rename = "STATA")]
    Stata,
    #[serde(rename = "SPSS")]
    Spss,
    Binary,
    #[serde(rename = "DDI")]
    Ddi,
    Paradata,
}

impl ExportType {
    /// Spelling used by the export service
    pub fn as_str(&self) -> &'static str {
        match self {
            ExportType::Tabular => "Tabular",
            ExportType::Stata => "STATA",
            ExportType::Spss => "SPSS",
            ExportType::Binary => "Binary",
            ExportType::Ddi => "DDI",
            ExportType::Paradata => "Paradata",
        }
    }
}

impl fmt::Display for ExportType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportType {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "tabular" => Ok(ExportType::Tabular),
            "stata" => Ok(ExportType::Stata),
            "spss" => Ok(ExportType::Spss),
            "binary" => Ok(ExportType::Binary),
            "ddi" => Ok(ExportType::Ddi),
            "paradata" => Ok(ExportType::Paradata),
            _ => Err(CommonError::invalid_value("export type", s)),
        }
    }
}

/// Which interviews an export should include
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum InterviewStatus {
    #[default]
    All,
    SupervisorAssigned,
    InterviewerAssigned,
    Completed,
    RejectedBySupervisor,
    ApprovedBySupervisor,
    RejectedByHeadquarters,
    ApprovedByHeadquarters,
}

impl InterviewStatus {
    const ALL: [InterviewStatus; 8] = [
        InterviewStatus::All,
        InterviewStatus::SupervisorAssigned,
        InterviewStatus::InterviewerAssigned,
        InterviewStatus::Completed,
        InterviewStatus::RejectedBySupervisor,
        InterviewStatus::ApprovedBySupervisor,
        InterviewStatus::RejectedByHeadquarters,
        InterviewStatus::ApprovedByHeadquarters,
    ];

    /// Spelling used by the export service
    pub fn as_str(&self) -> &'static str {
        match self {
            InterviewStatus::All => "All",
            InterviewStatus::SupervisorAssigned => "SupervisorAssigned",
            InterviewStatus::InterviewerAssigned => "InterviewerAssigned",
            InterviewStatus::Completed => "Completed",
            InterviewStatus::RejectedBySupervisor => "RejectedBySupervisor",
            InterviewStatus::ApprovedBySupervisor => "ApprovedBySupervisor",
            InterviewStatus::RejectedByHeadquarters => "RejectedByHeadquarters",
            InterviewStatus::ApprovedByHeadquarters => "ApprovedByHeadquarters",
        }
    }
}

impl fmt::Display for InterviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InterviewStatus {
    type Err = CommonError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| CommonError::invalid_value("interview status", s))
    }
}

// ============================================================================
// Export Job State
// ============================================================================

/// Lifecycle of a server-side export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    /// Completed and Failed end the poll loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::NotStarted => write!(f, "not started"),
            JobStatus::Running => write!(f, "running"),
            JobStatus::Completed => write!(f, "completed"),
            JobStatus::Failed => write!(f, "failed"),
        }
    }
}
