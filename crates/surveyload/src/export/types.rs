//! Export request/response types
//!
//! Wire types match the Headquarters REST API (PascalCase JSON).

use serde::{Deserialize, Serialize};
use surveyload_common::types::{ExportType, InterviewStatus, JobStatus, QuestionnaireIdentity};

use crate::error::{LoadError, Result};

/// What to export: one questionnaire revision, one format, one status filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportRequest {
    pub identity: QuestionnaireIdentity,
    pub export_type: ExportType,
    pub interview_status: InterviewStatus,
}

impl ExportRequest {
    pub fn new(identity: QuestionnaireIdentity) -> Self {
        Self {
            identity,
            export_type: ExportType::default(),
            interview_status: InterviewStatus::default(),
        }
    }

    pub fn with_export_type(mut self, export_type: ExportType) -> Self {
        self.export_type = export_type;
        self
    }

    pub fn with_interview_status(mut self, status: InterviewStatus) -> Self {
        self.interview_status = status;
        self
    }
}

/// Server-side id of an export job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobHandle(pub i64);

impl std::fmt::Display for JobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One observation of a job's state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobInfo {
    pub job: JobHandle,
    pub status: JobStatus,
    /// Clamped to 0-100
    pub progress: u8,
    pub has_export_file: bool,
    pub error: Option<String>,
}

// ============================================================================
// Wire Types
// ============================================================================

/// Body of `POST /api/v2/export`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct StartExportRequest {
    pub export_type: String,
    pub questionnaire_id: String,
    pub interview_status: String,
}

impl From<&ExportRequest> for StartExportRequest {
    fn from(request: &ExportRequest) -> Self {
        Self {
            export_type: request.export_type.as_str().to_string(),
            questionnaire_id: request.identity.to_string(),
            interview_status: request.interview_status.as_str().to_string(),
        }
    }
}

/// Export job as reported by the service
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ExportJobResponse {
    pub job_id: i64,
    pub export_status: String,
    #[serde(default)]
    pub progress: Option<i64>,
    #[serde(default)]
    pub has_export_file: bool,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ExportJobResponse {
    /// Translate the service's view into a [`JobInfo`].
    ///
    /// An unrecognized status string means the response cannot be trusted and
    /// surfaces as a transport error.
    pub fn into_info(self) -> Result<JobInfo> {
        let status = parse_job_status(&self.export_status).ok_or_else(|| {
            LoadError::transport(format!(
                "unrecognized status '{}' for export job {}",
                self.export_status, self.job_id
            ))
        })?;

        let error = match self.error {
            None | Some(serde_json::Value::Null) => None,
            Some(serde_json::Value::String(message)) => Some(message),
            Some(other) => Some(other.to_string()),
        };

        Ok(JobInfo {
            job: JobHandle(self.job_id),
            status,
            progress: self.progress.unwrap_or(0).clamp(0, 100) as u8,
            has_export_file: self.has_export_file,
            error,
        })
    }
}

fn parse_job_status(raw: &str) -> Option<JobStatus> {
    match raw.to_ascii_lowercase().as_str() {
        "created" | "queued" | "notstarted" => Some(JobStatus::NotStarted),
        "running" | "compressing" => Some(JobStatus::Running),
        "completed" => Some(JobStatus::Completed),
        "fail" | "failed" | "canceled" | "cancelled" => Some(JobStatus::Failed),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn job(status: &str, progress: Option<i64>) -> ExportJobResponse {
        ExportJobResponse {
            job_id: 7,
            export_status: status.to_string(),
            progress,
            has_export_file: false,
            error: None,
        }
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(job("Created", None).into_info().unwrap().status, JobStatus::NotStarted);
        assert_eq!(job("Running", Some(40)).into_info().unwrap().status, JobStatus::Running);
        assert_eq!(job("Completed", Some(100)).into_info().unwrap().status, JobStatus::Completed);
        assert_eq!(job("Fail", None).into_info().unwrap().status, JobStatus::Failed);
        assert_eq!(job("Canceled", None).into_info().unwrap().status, JobStatus::Failed);
    }

    #[test]
    fn test_unknown_status_is_transport_error() {
        let err = job("Exploded", None).into_info().unwrap_err();
        assert!(matches!(err, LoadError::Transport(_)));
    }

    #[test]
    fn test_progress_is_clamped() {
        assert_eq!(job("Running", Some(-1)).into_info().unwrap().progress, 0);
        assert_eq!(job("Running", Some(250)).into_info().unwrap().progress, 100);
    }

    #[test]
    fn test_deserialize_service_payload() {
        let payload = serde_json::json!({
            "JobId": 42,
            "ExportStatus": "Completed",
            "Progress": 100,
            "HasExportFile": true,
            "Error": null,
            "ExportType": "Tabular",
            "QuestionnaireId": "0d4f2a3b8c1e4f5a9b7c6d5e4f3a2b1c$1"
        });
        let response: ExportJobResponse = serde_json::from_value(payload).unwrap();
        let info = response.into_info().unwrap();
        assert_eq!(info.job, JobHandle(42));
        assert!(info.has_export_file);
        assert!(info.error.is_none());
    }

    #[test]
    fn test_start_request_uses_wire_spelling() {
        let identity = "0d4f2a3b8c1e4f5a9b7c6d5e4f3a2b1c$2".parse().unwrap();
        let request = ExportRequest::new(identity)
            .with_export_type(ExportType::Stata)
            .with_interview_status(InterviewStatus::Completed);
        let body = serde_json::to_value(StartExportRequest::from(&request)).unwrap();
        assert_eq!(body["ExportType"], "STATA");
        assert_eq!(body["QuestionnaireId"], "0d4f2a3b8c1e4f5a9b7c6d5e4f3a2b1c$2");
        assert_eq!(body["InterviewStatus"], "Completed");
    }
}
