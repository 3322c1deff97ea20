//! Drives one export job through NotStarted -> Running -> Completed | Failed

use std::path::{Path, PathBuf};
use std::time::Duration;
use surveyload_common::types::JobStatus;
use tracing::{debug, info, instrument, warn};

use super::types::{ExportRequest, JobHandle, JobInfo};
use super::ExportService;
use crate::config::DEFAULT_POLL_INTERVAL_MS;
use crate::error::{LoadError, Result};
use crate::progress::ProgressSink;

/// Client-side view of the job tracked during a run
#[derive(Debug, Clone)]
pub struct ExportJob {
    pub request: ExportRequest,
    pub handle: JobHandle,
    pub status: JobStatus,
    progress: u8,
}

impl ExportJob {
    pub fn new(request: ExportRequest, handle: JobHandle) -> Self {
        Self {
            request,
            handle,
            status: JobStatus::NotStarted,
            progress: 0,
        }
    }

    /// Highest progress observed so far
    pub fn progress(&self) -> u8 {
        self.progress
    }

    /// Record a poll result and return how far progress advanced.
    ///
    /// Progress never moves backwards; a lower report yields a zero delta.
    pub fn observe(&mut self, info: &JobInfo) -> u8 {
        self.status = info.status;
        let next = info.progress.min(100).max(self.progress);
        let delta = next - self.progress;
        self.progress = next;
        delta
    }

    /// Force progress to 100 and return the remaining top-up
    pub fn complete(&mut self) -> u8 {
        let delta = 100 - self.progress;
        self.progress = 100;
        self.status = JobStatus::Completed;
        delta
    }
}

pub struct ExportJobController<S> {
    service: S,
    download_dir: PathBuf,
    poll_interval: Duration,
}

impl<S: ExportService> ExportJobController<S> {
    pub fn new(service: S, download_dir: impl Into<PathBuf>) -> Self {
        Self {
            service,
            download_dir: download_dir.into(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn download_dir(&self) -> &Path {
        &self.download_dir
    }

    /// Download the archive of an earlier completed export, if there is one
    pub async fn find_existing(&self, request: &ExportRequest) -> Result<Option<PathBuf>> {
        match self.service.find_completed(request).await? {
            Some(job) => {
                info!(job = %job, "Reusing completed export");
                self.service.download(job, &self.download_dir).await
            }
            None => Ok(None),
        }
    }

    pub async fn submit(&self, request: &ExportRequest) -> Result<JobHandle> {
        self.service.start(request).await
    }

    pub async fn poll(&self, job: JobHandle) -> Result<JobInfo> {
        self.service.job_info(job).await
    }

    /// Download the archive of a job that has completed with a result file
    pub async fn fetch(&self, job: JobHandle) -> Result<PathBuf> {
        let info = self.poll(job).await?;
        self.download_result(&info).await
    }

    async fn download_result(&self, info: &JobInfo) -> Result<PathBuf> {
        let incomplete = || LoadError::ExportIncomplete {
            job_id: info.job.0,
            status: info.status,
        };
        if info.status != JobStatus::Completed || !info.has_export_file {
            return Err(incomplete());
        }

        self.service
            .download(info.job, &self.download_dir)
            .await?
            .ok_or_else(incomplete)
    }

    /// Obtain an archive for `request`: reuse an existing export or run a new
    /// job to completion, polling at the fixed interval.
    #[instrument(skip(self, sink), fields(questionnaire = %request.identity))]
    pub async fn acquire(&self, request: &ExportRequest, sink: &dyn ProgressSink) -> Result<PathBuf> {
        if let Some(path) = self.find_existing(request).await? {
            return Ok(path);
        }

        let handle = self.submit(request).await?;
        let mut job = ExportJob::new(request.clone(), handle);

        let last = loop {
            let info = self.poll(handle).await?;
            let delta = job.observe(&info);
            if delta > 0 {
                sink.export_progress(job.progress(), delta);
            }
            debug!(job = %handle, status = %info.status, progress = info.progress, "Polled export job");

            match info.status {
                JobStatus::Completed => break info,
                JobStatus::Failed => {
                    warn!(job = %handle, "Export job failed");
                    return Err(LoadError::ExportFailed {
                        job_id: handle.0,
                        reason: info.error.unwrap_or_else(|| "no reason given".to_string()),
                    });
                }
                JobStatus::NotStarted | JobStatus::Running => {
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        };

        let top_up = job.complete();
        if top_up > 0 {
            sink.export_progress(job.progress(), top_up);
        }
        sink.export_finished();

        let path = self.download_result(&last).await?;
        info!(job = %handle, path = %path.display(), "Export archive ready");
        Ok(path)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    /// Replays a fixed sequence of job observations
    struct ScriptedService {
        existing: Option<JobHandle>,
        polls: Mutex<VecDeque<(JobStatus, u8, bool)>>,
        poll_count: AtomicUsize,
        file_available: bool,
    }

    impl ScriptedService {
        fn new(polls: Vec<(JobStatus, u8, bool)>) -> Self {
            Self {
                existing: None,
                polls: Mutex::new(polls.into()),
                poll_count: AtomicUsize::new(0),
                file_available: true,
            }
        }
    }

    #[async_trait]
    impl ExportService for ScriptedService {
        async fn find_completed(&self, _request: &ExportRequest) -> Result<Option<JobHandle>> {
            Ok(self.existing)
        }

        async fn start(&self, _request: &ExportRequest) -> Result<JobHandle> {
            Ok(JobHandle(9))
        }

        async fn job_info(&self, job: JobHandle) -> Result<JobInfo> {
            self.poll_count.fetch_add(1, Ordering::SeqCst);
            let mut polls = self.polls.lock().unwrap();
            let (status, progress, has_export_file) = if polls.len() > 1 {
                polls.pop_front().unwrap()
            } else {
                *polls.front().unwrap()
            };
            Ok(JobInfo {
                job,
                status,
                progress,
                has_export_file,
                error: (status == JobStatus::Failed).then(|| "disk full".to_string()),
            })
        }

        async fn download(&self, job: JobHandle, dir: &Path) -> Result<Option<PathBuf>> {
            Ok(self
                .file_available
                .then(|| dir.join(format!("export_{}.zip", job))))
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        deltas: Mutex<Vec<(u8, u8)>>,
        finished: AtomicUsize,
    }

    impl ProgressSink for RecordingSink {
        fn export_progress(&self, position: u8, delta: u8) {
            self.deltas.lock().unwrap().push((position, delta));
        }

        fn export_finished(&self) {
            self.finished.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn request() -> ExportRequest {
        ExportRequest::new("0d4f2a3b8c1e4f5a9b7c6d5e4f3a2b1c$1".parse().unwrap())
    }

    fn running(progress: u8) -> (JobStatus, u8, bool) {
        (JobStatus::Running, progress, false)
    }

    #[tokio::test(start_paused = true)]
    async fn test_progress_deltas_sum_to_one_hundred() {
        let service = ScriptedService::new(vec![
            running(0),
            running(10),
            running(35),
            running(35),
            running(80),
            (JobStatus::Completed, 100, true),
        ]);
        let controller = ExportJobController::new(service, "/tmp/exports");
        let sink = RecordingSink::default();

        let path = controller.acquire(&request(), &sink).await.unwrap();
        assert_eq!(path, PathBuf::from("/tmp/exports/export_9.zip"));

        let deltas = sink.deltas.lock().unwrap();
        let total: u32 = deltas.iter().map(|(_, d)| u32::from(*d)).sum();
        assert_eq!(total, 100);
        assert_eq!(deltas.last().map(|(position, _)| *position), Some(100));
        assert_eq!(sink.finished.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_final_delta_tops_up_under_reported_progress() {
        let service = ScriptedService::new(vec![
            running(10),
            running(35),
            running(20),
            (JobStatus::Completed, 80, true),
        ]);
        let controller = ExportJobController::new(service, "/tmp/exports");
        let sink = RecordingSink::default();

        controller.acquire(&request(), &sink).await.unwrap();

        let deltas = sink.deltas.lock().unwrap();
        assert_eq!(*deltas, vec![(10, 10), (35, 25), (80, 45), (100, 20)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_are_separated_by_interval() {
        let service = ScriptedService::new(vec![
            running(0),
            running(50),
            (JobStatus::Completed, 100, true),
        ]);
        let controller = ExportJobController::new(service, "/tmp/exports")
            .with_poll_interval(Duration::from_secs(2));

        let started = tokio::time::Instant::now();
        controller.acquire(&request(), &RecordingSink::default()).await.unwrap();

        assert_eq!(controller.service.poll_count.load(Ordering::SeqCst), 3);
        assert_eq!(started.elapsed(), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_file_is_incomplete() {
        let service = ScriptedService::new(vec![running(40), (JobStatus::Completed, 100, false)]);
        let controller = ExportJobController::new(service, "/tmp/exports");

        let err = controller
            .acquire(&request(), &RecordingSink::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::ExportIncomplete { job_id: 9, status: JobStatus::Completed }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_job_reports_reason() {
        let service = ScriptedService::new(vec![running(5), (JobStatus::Failed, 5, false)]);
        let controller = ExportJobController::new(service, "/tmp/exports");

        let err = controller
            .acquire(&request(), &RecordingSink::default())
            .await
            .unwrap_err();
        match err {
            LoadError::ExportFailed { job_id, reason } => {
                assert_eq!(job_id, 9);
                assert_eq!(reason, "disk full");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_existing_export_is_reused_without_polling() {
        let mut service = ScriptedService::new(vec![running(0)]);
        service.existing = Some(JobHandle(3));
        let controller = ExportJobController::new(service, "/tmp/exports");

        let path = controller.acquire(&request(), &RecordingSink::default()).await.unwrap();
        assert_eq!(path, PathBuf::from("/tmp/exports/export_3.zip"));
        assert_eq!(controller.service.poll_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_fetch_requires_completed_job() {
        let service = ScriptedService::new(vec![running(60)]);
        let controller = ExportJobController::new(service, "/tmp/exports");

        let err = controller.fetch(JobHandle(9)).await.unwrap_err();
        assert!(matches!(
            err,
            LoadError::ExportIncomplete { status: JobStatus::Running, .. }
        ));
    }

    #[test]
    fn test_observe_never_regresses() {
        let mut job = ExportJob::new(request(), JobHandle(1));
        let info = |progress| JobInfo {
            job: JobHandle(1),
            status: JobStatus::Running,
            progress,
            has_export_file: false,
            error: None,
        };

        assert_eq!(job.observe(&info(30)), 30);
        assert_eq!(job.observe(&info(10)), 0);
        assert_eq!(job.progress(), 30);
        assert_eq!(job.complete(), 70);
        assert_eq!(job.complete(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_result_file_is_incomplete() {
        let mut service = ScriptedService::new(vec![(JobStatus::Completed, 100, true)]);
        service.file_available = false;
        let controller = ExportJobController::new(service, "/tmp/exports");

        let err = controller
            .acquire(&request(), &RecordingSink::default())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LoadError::ExportIncomplete { job_id: 9, status: JobStatus::Completed }
        ));

        let err = controller.fetch(JobHandle(9)).await.unwrap_err();
        assert!(matches!(err, LoadError::ExportIncomplete { job_id: 9, .. }));
    }
}
