//! HTTP client for the Headquarters export API

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::{Client, StatusCode};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use super::endpoints;
use super::types::{ExportJobResponse, ExportRequest, JobHandle, JobInfo, StartExportRequest};
use super::ExportService;
use crate::config::ServiceConfig;
use crate::error::{LoadError, Result};

/// Export service reached over HTTP with basic authentication
pub struct HeadquartersClient {
    client: Client,
    base_url: String,
    username: String,
    password: String,
}

impl HeadquartersClient {
    pub fn new(service: &ServiceConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: service.url.trim_end_matches('/').to_string(),
            username: service.username.clone(),
            password: service.password.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .get(url)
            .basic_auth(&self.username, Some(&self.password))
    }
}

#[async_trait]
impl ExportService for HeadquartersClient {
    async fn find_completed(&self, request: &ExportRequest) -> Result<Option<JobHandle>> {
        let url = endpoints::exports_url(&self.base_url);
        let identity = request.identity.to_string();

        let jobs: Vec<ExportJobResponse> = self
            .get(&url)
            .query(&[
                ("exportType", request.export_type.as_str()),
                ("interviewStatus", request.interview_status.as_str()),
                ("questionnaireIdentity", identity.as_str()),
                ("exportStatus", "Completed"),
                ("hasFile", "true"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let latest = jobs
            .into_iter()
            .filter(|job| job.has_export_file)
            .map(|job| JobHandle(job.job_id))
            .max();

        debug!(questionnaire = %identity, job = ?latest, "Looked up completed exports");
        Ok(latest)
    }

    async fn start(&self, request: &ExportRequest) -> Result<JobHandle> {
        let url = endpoints::exports_url(&self.base_url);

        let job: ExportJobResponse = self
            .client
            .post(&url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&StartExportRequest::from(request))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!(job = job.job_id, questionnaire = %request.identity, "Started export job");
        Ok(JobHandle(job.job_id))
    }

    async fn job_info(&self, job: JobHandle) -> Result<JobInfo> {
        let url = endpoints::job_url(&self.base_url, job);

        let response: ExportJobResponse = self
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        response.into_info()
    }

    async fn download(&self, job: JobHandle, dir: &Path) -> Result<Option<PathBuf>> {
        let url = endpoints::job_file_url(&self.base_url, job);
        let response = self.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = response.error_for_status()?;

        let file_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|value| value.to_str().ok())
            .and_then(attachment_file_name)
            .unwrap_or_else(|| format!("export_{}.zip", job));
        let target = dir.join(file_name);

        tokio::fs::create_dir_all(dir).await?;
        let written = save_stream(response.bytes_stream(), &target).await?;

        info!(job = %job, path = %target.display(), bytes = written, "Downloaded export archive");
        Ok(Some(target))
    }
}

/// Stream chunks into `<target>.part` and rename it to `target` once complete.
///
/// A failed transfer removes the partial file, so `target` only ever holds a
/// whole archive.
async fn save_stream<S, B, E>(stream: S, target: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<LoadError>,
{
    let mut partial = target.as_os_str().to_owned();
    partial.push(".part");
    let partial = PathBuf::from(partial);

    match write_chunks(stream, &partial).await {
        Ok(written) => {
            tokio::fs::rename(&partial, target).await?;
            Ok(written)
        }
        Err(err) => {
            warn!(path = %partial.display(), error = %err, "Discarding incomplete download");
            let _ = tokio::fs::remove_file(&partial).await;
            Err(err)
        }
    }
}

async fn write_chunks<S, B, E>(stream: S, path: &Path) -> Result<u64>
where
    S: Stream<Item = std::result::Result<B, E>>,
    B: AsRef<[u8]>,
    E: Into<LoadError>,
{
    let mut stream = std::pin::pin!(stream);
    let mut file = tokio::fs::File::create(path).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(Into::into)?;
        let bytes = chunk.as_ref();
        file.write_all(bytes).await?;
        written += bytes.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

/// File name from a `Content-Disposition` header, stripped of any directory part
fn attachment_file_name(header: &str) -> Option<String> {
    header
        .split(';')
        .map(str::trim)
        .find_map(|part| part.strip_prefix("filename="))
        .map(|name| name.trim_matches('"'))
        .and_then(|name| Path::new(name).file_name())
        .map(|name| name.to_string_lossy().into_owned())
        .filter(|name| !name.is_empty())
}
