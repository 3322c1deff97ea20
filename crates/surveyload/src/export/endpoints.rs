//! Export API endpoint URL builders

use super::types::JobHandle;

/// Job collection: list with query filters, or start a new job
pub fn exports_url(base_url: &str) -> String {
    format!("{}/api/v2/export", base_url.trim_end_matches('/'))
}

pub fn job_url(base_url: &str, job: JobHandle) -> String {
    format!("{}/{}", exports_url(base_url), job)
}

pub fn job_file_url(base_url: &str, job: JobHandle) -> String {
    format!("{}/file", job_url(base_url, job))
}
