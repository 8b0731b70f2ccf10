// src/artifact/workspace.rs

//! Per-job working directory
//!
//! Each review gets `<work root>/<job id>`. The directory is created
//! exclusively, so two jobs can never share one, and removed again on
//! every exit path of [`ArtifactWorkspace::review`].

use super::{ExtractionReport, LintOutcome, LintPolicy, ReviewTools};
use crate::error::{Error, Result};
use crate::filesystem::path::sanitize_filename;
use std::fs;
use std::io::ErrorKind;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ArtifactWorkspace {
    url: String,
    job_id: String,
    work_dir: PathBuf,
}

/// Outcome of a full review run
///
/// The cleanup result is kept apart from the verdict: a failed cleanup is
/// an operational problem and never changes whether the artifact passed.
#[derive(Debug)]
pub struct Review {
    pub job_id: String,
    pub verdict: Result<LintOutcome>,
    /// `None` when the workspace was never created by this review
    pub cleanup: Option<Result<()>>,
}

impl Review {
    /// The linter report of an accepted artifact, or why it was not accepted
    pub fn into_acceptance(self) -> Result<String> {
        let outcome = self.verdict?;
        if outcome.failed {
            return Err(Error::ValidationFailed {
                report: outcome.report,
            });
        }
        Ok(outcome.report)
    }

    pub fn accepted(&self) -> bool {
        matches!(&self.verdict, Ok(outcome) if !outcome.failed)
    }
}

impl ArtifactWorkspace {
    /// Workspace under the system temp directory
    pub fn new(url: impl Into<String>, job_id: Option<&str>) -> Result<Self> {
        Self::with_root(std::env::temp_dir(), url, job_id)
    }

    /// Workspace under `root`; a missing job id is replaced with a fresh one
    pub fn with_root(
        root: impl AsRef<Path>,
        url: impl Into<String>,
        job_id: Option<&str>,
    ) -> Result<Self> {
        let job_id = match job_id {
            Some(id) => sanitize_filename(id)?,
            None => Uuid::new_v4().to_string(),
        };

        Ok(Self {
            url: url.into(),
            work_dir: root.as_ref().join(&job_id),
            job_id,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Create the working directory; fails if it already exists
    pub fn create(&self) -> Result<()> {
        if let Some(root) = self.work_dir.parent() {
            fs::create_dir_all(root)?;
        }

        fs::create_dir(&self.work_dir).map_err(|e| {
            if e.kind() == ErrorKind::AlreadyExists {
                Error::InitError(format!(
                    "Workspace {} is already in use",
                    self.work_dir.display()
                ))
            } else {
                Error::Io(e)
            }
        })?;

        debug!("Created workspace {}", self.work_dir.display());
        Ok(())
    }

    /// Create the working directory, then fetch and unpack the artifact into it
    pub fn prep(&self, tools: &ReviewTools) -> Result<ExtractionReport> {
        self.create()?;
        self.populate(tools)
    }

    fn populate(&self, tools: &ReviewTools) -> Result<ExtractionReport> {
        let archive = tools.fetcher.fetch(&self.url)?;
        // The downloaded temp file is deleted when `archive` drops
        tools.extractor.extract(archive.path(), &self.work_dir)
    }

    /// Prepare the workspace and lint the unpacked tree
    ///
    /// Does not clean up; see [`ArtifactWorkspace::review`].
    pub fn criticize(&self, tools: &ReviewTools, policy: &LintPolicy) -> Result<LintOutcome> {
        self.prep(tools)?;
        tools.linter.lint(&self.work_dir, policy)
    }

    /// Remove the working directory
    ///
    /// A missing directory is an error so that a double cleanup is noticed.
    pub fn cleanup(&self) -> Result<()> {
        fs::remove_dir_all(&self.work_dir).map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                Error::CleanupFailed(format!(
                    "Workspace {} does not exist",
                    self.work_dir.display()
                ))
            } else {
                Error::CleanupFailed(format!(
                    "Failed to remove {}: {}",
                    self.work_dir.display(),
                    e
                ))
            }
        })?;

        debug!("Removed workspace {}", self.work_dir.display());
        Ok(())
    }

    /// Fetch, unpack and lint, then always release the workspace
    pub fn review(&self, tools: &ReviewTools, policy: &LintPolicy) -> Review {
        info!("Reviewing {} as job {}", self.url, self.job_id);

        // Never remove a directory this review did not create
        if let Err(e) = self.create() {
            return Review {
                job_id: self.job_id.clone(),
                verdict: Err(e),
                cleanup: None,
            };
        }

        let run = panic::catch_unwind(AssertUnwindSafe(|| {
            self.populate(tools)?;
            tools.linter.lint(&self.work_dir, policy)
        }));

        let cleanup = self.cleanup();
        if let Err(e) = &cleanup {
            warn!("Job {}: {}", self.job_id, e);
        }

        let verdict = match run {
            Ok(verdict) => verdict,
            Err(payload) => panic::resume_unwind(payload),
        };

        match &verdict {
            Ok(outcome) if outcome.failed => info!("Job {} rejected", self.job_id),
            Ok(_) => info!("Job {} accepted", self.job_id),
            Err(e) => warn!("Job {} failed: {}", self.job_id, e),
        }

        Review {
            job_id: self.job_id.clone(),
            verdict,
            cleanup: Some(cleanup),
        }
    }
}
