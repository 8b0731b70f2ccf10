// src/jobs.rs
//! Review job tracking and scheduling
//!
//! Submitted artifacts are reviewed on blocking workers, at most
//! `max_concurrent` at a time:
//! - Create a job per submitted artifact URL
//! - Track job status (pending, running, accepted, rejected, failed)
//! - Prevent stampede (same URL while in flight = same job)
//! - Clean up finished jobs after TTL

use crate::artifact::{ArtifactWorkspace, LintPolicy, Review, ReviewTools};
use crate::config::LarderConfig;
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{RwLock, Semaphore};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long finished jobs stay queryable
pub const DEFAULT_JOB_TTL: Duration = Duration::from_secs(3600);

/// Unique job identifier, also used as the workspace directory name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobId(Uuid);

impl JobId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Job status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    /// Waiting for a worker
    Pending,
    /// Fetching, extracting or linting
    Running,
    /// Linter passed; carries its report
    Accepted(String),
    /// An enabled lint rule failed; carries the report
    Rejected(String),
    /// The review could not be completed
    Failed(String),
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Pending | JobStatus::Running)
    }

    fn from_review(review: Review) -> Self {
        match review.verdict {
            Ok(outcome) if outcome.failed => JobStatus::Rejected(outcome.report),
            Ok(outcome) => JobStatus::Accepted(outcome.report),
            Err(e) => JobStatus::Failed(e.to_string()),
        }
    }
}

/// A review job
#[derive(Debug, Clone)]
pub struct ReviewJob {
    pub id: JobId,
    /// Artifact reference being reviewed (deduplication key)
    pub url: String,
    pub status: JobStatus,
    pub created_at: Instant,
    /// When the job finished (for TTL cleanup)
    pub completed_at: Option<Instant>,
}

/// Bookkeeping for review jobs
pub struct JobManager {
    /// Active and recently finished jobs
    jobs: HashMap<JobId, ReviewJob>,
    /// Latest job for each URL
    url_to_id: HashMap<String, JobId>,
    max_concurrent: usize,
    /// TTL for finished jobs
    job_ttl: Duration,
}

impl JobManager {
    pub fn new(max_concurrent: usize) -> Self {
        Self {
            jobs: HashMap::new(),
            url_to_id: HashMap::new(),
            max_concurrent,
            job_ttl: DEFAULT_JOB_TTL,
        }
    }

    /// Keep finished jobs for `ttl` instead of the default hour
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.job_ttl = ttl;
        self
    }

    /// Create a review job for `url`
    ///
    /// Expired jobs are dropped first. Returns the existing job if one for
    /// this URL is still in flight. Fails with [`Error::QueueFull`] once
    /// in-flight (pending or running) jobs reach twice the worker count.
    pub fn create_job(&mut self, url: &str) -> Result<(JobId, bool)> {
        self.cleanup_expired();

        if let Some(existing) = self.url_to_id.get(url).and_then(|id| self.jobs.get(id))
            && !existing.status.is_terminal()
        {
            return Ok((existing.id, false));
        }

        let in_flight = self
            .jobs
            .values()
            .filter(|j| !j.status.is_terminal())
            .count();
        if in_flight >= self.max_concurrent * 2 {
            return Err(Error::QueueFull(format!(
                "{} reviews already in flight",
                in_flight
            )));
        }

        let job_id = JobId::new();
        let job = ReviewJob {
            id: job_id,
            url: url.to_string(),
            status: JobStatus::Pending,
            created_at: Instant::now(),
            completed_at: None,
        };

        self.jobs.insert(job_id, job);
        self.url_to_id.insert(url.to_string(), job_id);

        Ok((job_id, true))
    }

    pub fn get_job(&self, id: &JobId) -> Option<&ReviewJob> {
        self.jobs.get(id)
    }

    /// Latest job for a URL
    pub fn get_job_by_url(&self, url: &str) -> Option<JobId> {
        self.url_to_id.get(url).copied()
    }

    pub fn update_status(&mut self, id: &JobId, status: JobStatus) {
        if let Some(job) = self.jobs.get_mut(id) {
            if status.is_terminal() {
                job.completed_at = Some(Instant::now());
            }
            job.status = status;
        }
    }

    /// Drop finished jobs older than the TTL
    pub fn cleanup_expired(&mut self) {
        let now = Instant::now();
        let expired: Vec<JobId> = self
            .jobs
            .iter()
            .filter(|(_, job)| {
                job.completed_at
                    .map(|t| now.duration_since(t) > self.job_ttl)
                    .unwrap_or(false)
            })
            .map(|(id, _)| *id)
            .collect();

        for id in expired {
            if let Some(job) = self.jobs.remove(&id) {
                if self.url_to_id.get(&job.url) == Some(&id) {
                    self.url_to_id.remove(&job.url);
                }
                debug!("Cleaned up expired job: {} ({})", id, job.url);
            }
        }
    }

    pub fn stats(&self) -> JobStats {
        let mut stats = JobStats {
            total: self.jobs.len(),
            ..JobStats::default()
        };

        for job in self.jobs.values() {
            match job.status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Running => stats.running += 1,
                JobStatus::Accepted(_) => stats.accepted += 1,
                JobStatus::Rejected(_) => stats.rejected += 1,
                JobStatus::Failed(_) => stats.failed += 1,
            }
        }

        stats
    }
}

/// Job statistics
#[derive(Debug, Default, PartialEq, Eq)]
pub struct JobStats {
    pub pending: usize,
    pub running: usize,
    pub accepted: usize,
    pub rejected: usize,
    pub failed: usize,
    pub total: usize,
}

/// Runs reviews on a bounded pool of blocking workers
#[derive(Clone)]
pub struct ReviewService {
    jobs: Arc<RwLock<JobManager>>,
    semaphore: Arc<Semaphore>,
    tools: ReviewTools,
    policy: LintPolicy,
    work_root: PathBuf,
    timeout: Duration,
}

impl ReviewService {
    pub fn new(
        tools: ReviewTools,
        policy: LintPolicy,
        work_root: impl Into<PathBuf>,
        max_concurrent: usize,
        timeout: Duration,
        job_ttl: Duration,
    ) -> Self {
        Self {
            jobs: Arc::new(RwLock::new(
                JobManager::new(max_concurrent).with_ttl(job_ttl),
            )),
            semaphore: Arc::new(Semaphore::new(max_concurrent)),
            tools,
            policy,
            work_root: work_root.into(),
            timeout,
        }
    }

    pub fn from_config(config: &LarderConfig, policy: LintPolicy) -> anyhow::Result<Self> {
        Ok(Self::new(
            ReviewTools::from_config(config)?,
            policy,
            config.artifacts.work_root.clone(),
            config.artifacts.max_concurrent_jobs,
            config.review_timeout()?,
            config.job_ttl()?,
        ))
    }

    /// Queue a review and return immediately
    ///
    /// Must be called from within a tokio runtime.
    pub async fn submit(&self, url: &str) -> Result<JobId> {
        let (id, created) = self.jobs.write().await.create_job(url)?;
        if created {
            let service = self.clone();
            let url = url.to_string();
            tokio::spawn(async move { service.run(id, url).await });
        }
        Ok(id)
    }

    /// Review `url` and wait for the verdict
    pub async fn review(&self, url: &str) -> Result<(JobId, JobStatus)> {
        let (id, created) = self.jobs.write().await.create_job(url)?;
        if created {
            self.run(id, url.to_string()).await;
        } else {
            self.wait_for(id).await;
        }

        let status = self
            .status(&id)
            .await
            .ok_or_else(|| Error::NotFound(format!("review job {}", id)))?;
        Ok((id, status))
    }

    pub async fn status(&self, id: &JobId) -> Option<JobStatus> {
        self.jobs.read().await.get_job(id).map(|j| j.status.clone())
    }

    pub async fn stats(&self) -> JobStats {
        self.jobs.read().await.stats()
    }

    /// Drop expired finished jobs now instead of at the next submission
    pub async fn cleanup_expired(&self) {
        self.jobs.write().await.cleanup_expired();
    }

    /// Wait until job `id` finishes or is no longer known
    pub async fn wait_for(&self, id: JobId) {
        loop {
            match self.status(&id).await {
                Some(status) if !status.is_terminal() => {
                    tokio::time::sleep(Duration::from_millis(100)).await
                }
                _ => return,
            }
        }
    }

    async fn run(&self, id: JobId, url: String) {
        let status = self.execute(id, &url).await;
        match &status {
            JobStatus::Failed(reason) => warn!("Review job {} failed: {}", id, reason),
            _ => info!("Review job {} finished", id),
        }
        self.jobs.write().await.update_status(&id, status);
    }

    async fn execute(&self, id: JobId, url: &str) -> JobStatus {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return JobStatus::Failed("review pool is closed".to_string()),
        };

        let workspace =
            match ArtifactWorkspace::with_root(&self.work_root, url, Some(&id.to_string())) {
                Ok(workspace) => workspace,
                Err(e) => return JobStatus::Failed(e.to_string()),
            };

        self.jobs.write().await.update_status(&id, JobStatus::Running);
        debug!("Review job {} running in {}", id, workspace.work_dir().display());

        let tools = self.tools.clone();
        let policy = self.policy.clone();
        // The worker owns the permit and always cleans up, even after we stop waiting
        let worker = tokio::task::spawn_blocking(move || {
            let _permit = permit;
            workspace.review(&tools, &policy)
        });

        match tokio::time::timeout(self.timeout, worker).await {
            Ok(Ok(review)) => JobStatus::from_review(review),
            Ok(Err(e)) => JobStatus::Failed(format!("review worker crashed: {e}")),
            Err(_) => JobStatus::Failed(format!(
                "review timed out after {} seconds",
                self.timeout.as_secs()
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::{ArchiveFetcher, ExtractionReport, Extractor, LintOutcome, Linter};
    use std::path::Path;
    use tempfile::NamedTempFile;

    struct StubFetcher;

    impl ArchiveFetcher for StubFetcher {
        fn fetch(&self, reference: &str) -> Result<NamedTempFile> {
            if reference.contains("missing") {
                return Err(Error::FetchFailed(format!("HTTP 404 from {reference}")));
            }
            Ok(NamedTempFile::new()?)
        }
    }

    struct StubExtractor;

    impl Extractor for StubExtractor {
        fn extract(&self, _archive: &Path, dest: &Path) -> Result<ExtractionReport> {
            std::fs::write(dest.join("metadata.json"), "{}")?;
            Ok(ExtractionReport {
                files: vec![PathBuf::from("metadata.json")],
                ..ExtractionReport::default()
            })
        }
    }

    struct StubLinter {
        delay: Duration,
    }

    impl Linter for StubLinter {
        fn lint(&self, tree: &Path, _policy: &LintPolicy) -> Result<LintOutcome> {
            std::thread::sleep(self.delay);
            assert!(tree.join("metadata.json").exists());
            Ok(LintOutcome {
                report: "FC001 clean".to_string(),
                failed: false,
            })
        }
    }

    fn tools(delay: Duration) -> ReviewTools {
        ReviewTools::new(
            Arc::new(StubFetcher),
            Arc::new(StubExtractor),
            Arc::new(StubLinter { delay }),
        )
    }

    fn service(root: &Path, delay: Duration, timeout: Duration) -> ReviewService {
        ReviewService::new(
            tools(delay),
            LintPolicy::default(),
            root,
            2,
            timeout,
            DEFAULT_JOB_TTL,
        )
    }

    fn workspace_entries(root: &Path) -> usize {
        std::fs::read_dir(root).unwrap().count()
    }

    #[test]
    fn test_job_dedup_while_in_flight() {
        let mut manager = JobManager::new(2);
        let (a, created_a) = manager.create_job("https://example.com/a.tgz").unwrap();
        let (b, created_b) = manager.create_job("https://example.com/a.tgz").unwrap();
        assert!(created_a);
        assert!(!created_b);
        assert_eq!(a, b);

        manager.update_status(&a, JobStatus::Accepted(String::new()));
        let (c, created_c) = manager.create_job("https://example.com/a.tgz").unwrap();
        assert!(created_c);
        assert_ne!(a, c);
        assert_eq!(manager.get_job_by_url("https://example.com/a.tgz"), Some(c));
    }

    #[test]
    fn test_queue_full() {
        let mut manager = JobManager::new(1);
        manager.create_job("a").unwrap();
        manager.create_job("b").unwrap();
        assert!(matches!(manager.create_job("c"), Err(Error::QueueFull(_))));
    }

    #[test]
    fn test_running_jobs_count_against_queue() {
        let mut manager = JobManager::new(1);
        let (a, _) = manager.create_job("a").unwrap();
        let (b, _) = manager.create_job("b").unwrap();
        manager.update_status(&a, JobStatus::Running);
        manager.update_status(&b, JobStatus::Running);
        assert!(matches!(manager.create_job("c"), Err(Error::QueueFull(_))));

        manager.update_status(&a, JobStatus::Accepted(String::new()));
        assert!(manager.create_job("c").is_ok());
    }

    #[test]
    fn test_create_job_drops_expired_jobs() {
        let mut manager = JobManager::new(2).with_ttl(Duration::ZERO);
        let (a, _) = manager.create_job("a").unwrap();
        manager.update_status(&a, JobStatus::Failed("HTTP 404".into()));
        std::thread::sleep(Duration::from_millis(5));

        let (b, _) = manager.create_job("b").unwrap();
        assert!(manager.get_job(&a).is_none());
        assert_eq!(manager.get_job_by_url("a"), None);
        assert!(manager.get_job(&b).is_some());
        assert_eq!(manager.stats().total, 1);
    }

    #[test]
    fn test_cleanup_expired_and_stats() {
        let mut manager = JobManager::new(2).with_ttl(Duration::ZERO);
        let (a, _) = manager.create_job("a").unwrap();
        let (b, _) = manager.create_job("b").unwrap();
        manager.update_status(&a, JobStatus::Rejected("FC001".into()));
        manager.update_status(&b, JobStatus::Running);

        assert_eq!(
            manager.stats(),
            JobStats {
                running: 1,
                rejected: 1,
                total: 2,
                ..JobStats::default()
            }
        );

        std::thread::sleep(Duration::from_millis(5));
        manager.cleanup_expired();
        assert!(manager.get_job(&a).is_none());
        assert!(manager.get_job(&b).is_some());
        assert_eq!(manager.get_job_by_url("a"), None);
    }

    #[test]
    fn test_job_id_round_trip() {
        let id = JobId::new();
        assert_eq!(id.to_string().parse::<JobId>().unwrap(), id);
        assert!("not-a-job".parse::<JobId>().is_err());
    }

    #[tokio::test]
    async fn test_review_accepts_and_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), Duration::ZERO, Duration::from_secs(10));

        let (_, status) = service.review("https://example.com/apache2.tgz").await.unwrap();
        assert_eq!(status, JobStatus::Accepted("FC001 clean".to_string()));
        assert_eq!(workspace_entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_review_fetch_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), Duration::ZERO, Duration::from_secs(10));

        let (_, status) = service.review("https://example.com/missing.tgz").await.unwrap();
        assert!(matches!(status, JobStatus::Failed(ref msg) if msg.contains("404")));
        assert_eq!(workspace_entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_review_timeout_still_cleans_up() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), Duration::from_millis(500), Duration::from_millis(50));

        let (_, status) = service.review("https://example.com/slow.tgz").await.unwrap();
        assert!(matches!(status, JobStatus::Failed(ref msg) if msg.contains("timed out")));

        // The abandoned worker finishes on its own and removes its workspace
        for _ in 0..50 {
            if workspace_entries(tmp.path()) == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(workspace_entries(tmp.path()), 0);
    }

    #[tokio::test]
    async fn test_submit_then_poll() {
        let tmp = tempfile::tempdir().unwrap();
        let service = service(tmp.path(), Duration::from_millis(20), Duration::from_secs(10));

        let id = service.submit("https://example.com/apache2.tgz").await.unwrap();
        assert_eq!(
            service.submit("https://example.com/apache2.tgz").await.unwrap(),
            id
        );

        service.wait_for(id).await;
        assert!(matches!(
            service.status(&id).await,
            Some(JobStatus::Accepted(_))
        ));
        assert_eq!(service.stats().await.accepted, 1);
    }

    #[tokio::test]
    async fn test_finished_reviews_expire_without_manual_cleanup() {
        let tmp = tempfile::tempdir().unwrap();
        let service = ReviewService::new(
            tools(Duration::ZERO),
            LintPolicy::default(),
            tmp.path(),
            2,
            Duration::from_secs(10),
            Duration::from_millis(20),
        );

        let (first, _) = service.review("https://example.com/apache2.tgz").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let (second, _) = service.review("https://example.com/nginx.tgz").await.unwrap();
        assert_eq!(service.status(&first).await, None);
        assert!(service.status(&second).await.is_some());
        assert_eq!(service.stats().await.total, 1);
    }
}
