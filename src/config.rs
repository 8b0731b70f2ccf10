// src/config.rs
//! Configuration file parsing for the registry
//!
//! Supports TOML configuration files with the following sections:
//! - [storage] - Database location
//! - [artifacts] - Workspace root, fetch/review timeouts, worker pool size
//! - [linter] - External linter program, timeout, failing exit codes
//! - [notify] - Post-publish notification spool
//!
//! The lint tag policy is not part of the file: it is read from the
//! environment at the orchestration boundary (see [`lint_policy_from_env`]).

use crate::artifact::LintPolicy;
use crate::db::paths;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable holding the linter's fail-tag expression
pub const FAIL_TAGS_ENV: &str = "LARDER_LINT_FAIL_TAGS";

/// Environment variable holding whitespace-separated include tags
pub const TAGS_ENV: &str = "LARDER_LINT_TAGS";

/// TOML configuration file structure
#[derive(Debug, Default, Deserialize)]
pub struct LarderConfig {
    #[serde(default)]
    pub storage: StorageSection,

    #[serde(default)]
    pub artifacts: ArtifactsSection,

    #[serde(default)]
    pub linter: LinterSection,

    #[serde(default)]
    pub notify: NotifySection,
}

/// Storage configuration section
#[derive(Debug, Deserialize)]
pub struct StorageSection {
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    paths::DEFAULT_DB_PATH.to_string()
}

/// Artifact review configuration section
#[derive(Debug, Deserialize)]
pub struct ArtifactsSection {
    /// Parent directory of per-job workspaces
    #[serde(default = "default_work_root")]
    pub work_root: PathBuf,

    /// HTTP timeout for artifact downloads (e.g., "60s")
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: String,

    /// Overall deadline for one fetch/extract/lint job (e.g., "10m")
    #[serde(default = "default_review_timeout")]
    pub review_timeout: String,

    /// Maximum reviews running at once
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,

    /// Largest single file accepted from an archive (e.g., "64MB")
    #[serde(default = "default_max_file_size")]
    pub max_file_size: String,

    /// How long finished review jobs stay queryable (e.g., "1h")
    #[serde(default = "default_job_ttl")]
    pub job_ttl: String,
}

impl Default for ArtifactsSection {
    fn default() -> Self {
        Self {
            work_root: default_work_root(),
            fetch_timeout: default_fetch_timeout(),
            review_timeout: default_review_timeout(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            max_file_size: default_max_file_size(),
            job_ttl: default_job_ttl(),
        }
    }
}

fn default_work_root() -> PathBuf {
    std::env::temp_dir()
}

fn default_fetch_timeout() -> String {
    "60s".to_string()
}

fn default_review_timeout() -> String {
    "10m".to_string()
}

fn default_max_concurrent_jobs() -> usize {
    4
}

fn default_max_file_size() -> String {
    "64MB".to_string()
}

fn default_job_ttl() -> String {
    "1h".to_string()
}

/// Linter configuration section
#[derive(Debug, Deserialize)]
pub struct LinterSection {
    #[serde(default = "default_linter_program")]
    pub program: PathBuf,

    #[serde(default = "default_linter_timeout")]
    pub timeout: String,

    /// Exit codes meaning "an enabled rule failed" rather than a crash
    #[serde(default = "default_failure_exit_codes")]
    pub failure_exit_codes: Vec<i32>,
}

impl Default for LinterSection {
    fn default() -> Self {
        Self {
            program: default_linter_program(),
            timeout: default_linter_timeout(),
            failure_exit_codes: default_failure_exit_codes(),
        }
    }
}

fn default_linter_program() -> PathBuf {
    PathBuf::from("foodcritic")
}

fn default_linter_timeout() -> String {
    "5m".to_string()
}

fn default_failure_exit_codes() -> Vec<i32> {
    vec![3]
}

/// Notification configuration section
#[derive(Debug, Default, Deserialize)]
pub struct NotifySection {
    /// JSON-lines spool consumed by the notification worker; defaults to a
    /// file next to the database
    #[serde(default)]
    pub spool_path: Option<PathBuf>,
}

impl LarderConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: LarderConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Load `path` when given, otherwise use defaults
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load(path),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.artifacts.max_concurrent_jobs == 0 {
            anyhow::bail!("artifacts.max_concurrent_jobs must be at least 1");
        }
        self.fetch_timeout()?;
        self.review_timeout()?;
        self.job_ttl()?;
        self.linter_timeout()?;
        self.max_file_size()?;
        if self.linter.failure_exit_codes.contains(&0) {
            anyhow::bail!("linter.failure_exit_codes must not contain 0");
        }
        Ok(())
    }

    pub fn fetch_timeout(&self) -> Result<Duration> {
        parse_duration(&self.artifacts.fetch_timeout)
            .context("Invalid artifacts.fetch_timeout")
    }

    pub fn review_timeout(&self) -> Result<Duration> {
        parse_duration(&self.artifacts.review_timeout)
            .context("Invalid artifacts.review_timeout")
    }

    pub fn job_ttl(&self) -> Result<Duration> {
        parse_duration(&self.artifacts.job_ttl).context("Invalid artifacts.job_ttl")
    }

    pub fn linter_timeout(&self) -> Result<Duration> {
        parse_duration(&self.linter.timeout).context("Invalid linter.timeout")
    }

    pub fn max_file_size(&self) -> Result<u64> {
        parse_size(&self.artifacts.max_file_size).context("Invalid artifacts.max_file_size")
    }

    /// Where publish notifications are spooled
    pub fn spool_path(&self) -> PathBuf {
        self.notify
            .spool_path
            .clone()
            .unwrap_or_else(|| paths::spool_path(&self.storage.db_path))
    }
}

/// Read the lint tag policy from the process environment
pub fn lint_policy_from_env() -> LintPolicy {
    lint_policy_from_lookup(|key| std::env::var(key).ok())
}

/// Build the lint tag policy from an arbitrary variable lookup
///
/// Unset or blank variables mean "no filter".
pub fn lint_policy_from_lookup<F>(lookup: F) -> LintPolicy
where
    F: Fn(&str) -> Option<String>,
{
    let fail_tags = lookup(FAIL_TAGS_ENV)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty());

    let tags = lookup(TAGS_ENV)
        .map(|v| v.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    LintPolicy::new(fail_tags, tags)
}

/// Parse a human-readable size string (e.g., "64MB", "1GB", "512")
pub fn parse_size(s: &str) -> Result<u64> {
    let s = s.trim().to_uppercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix("GB") {
        (n, 1024u64 * 1024 * 1024)
    } else if let Some(n) = s.strip_suffix("MB") {
        (n, 1024u64 * 1024)
    } else if let Some(n) = s.strip_suffix("KB") {
        (n, 1024u64)
    } else if let Some(n) = s.strip_suffix('B') {
        (n, 1u64)
    } else {
        (s.as_str(), 1u64)
    };

    let num: f64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid size number: {}", num_str))?;

    Ok((num * multiplier as f64) as u64)
}

/// Parse a human-readable duration string (e.g., "15m", "1h", "30s")
pub fn parse_duration(s: &str) -> Result<Duration> {
    let s = s.trim().to_lowercase();

    let (num_str, multiplier) = if let Some(n) = s.strip_suffix('h') {
        (n, 60 * 60)
    } else if let Some(n) = s.strip_suffix('m') {
        (n, 60)
    } else if let Some(n) = s.strip_suffix('s') {
        (n, 1)
    } else {
        // Assume seconds
        (s.as_str(), 1)
    };

    let num: u64 = num_str
        .trim()
        .parse()
        .with_context(|| format!("Invalid duration number: {}", num_str))?;

    Ok(Duration::from_secs(num * multiplier))
}
