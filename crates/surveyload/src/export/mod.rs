//! Export job acquisition
//!
//! The export service is reached through the [`ExportService`] trait;
//! [`HeadquartersClient`] implements it over HTTP and tests substitute
//! scripted services. [`ExportJobController`] drives a job from submission to
//! a downloaded archive.

pub mod client;
pub mod controller;
pub mod endpoints;
pub mod types;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use client::HeadquartersClient;
pub use controller::{ExportJob, ExportJobController};
pub use types::{ExportRequest, JobHandle, JobInfo};

/// Remote service producing export archives
#[async_trait]
pub trait ExportService: Send + Sync {
    /// Most recent completed job with a downloadable file for `request`
    async fn find_completed(&self, request: &ExportRequest) -> Result<Option<JobHandle>>;

    async fn start(&self, request: &ExportRequest) -> Result<JobHandle>;

    async fn job_info(&self, job: JobHandle) -> Result<JobInfo>;

    /// Save the job's archive under `dir`; `None` if the service has no file
    async fn download(&self, job: JobHandle, dir: &Path) -> Result<Option<PathBuf>>;
}
