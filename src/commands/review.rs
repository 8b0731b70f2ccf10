// src/commands/review.rs
//! Artifact review command

use anyhow::Result;
use larder::config::lint_policy_from_env;
use larder::{JobStatus, LarderConfig, ReviewService};
use tracing::info;

/// Review an artifact and print the linter report
///
/// Exits with an error unless the artifact was accepted.
pub fn cmd_review(config: &LarderConfig, url: &str) -> Result<()> {
    let policy = lint_policy_from_env();
    info!("Reviewing {} (fail tags: {:?}, tags: {:?})", url, policy.fail_tags, policy.tags);

    let service = ReviewService::from_config(config, policy)?;
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let (job_id, status) = rt.block_on(service.review(url))?;

    match status {
        JobStatus::Accepted(report) => {
            print!("{}", report);
            println!("Job {}: accepted", job_id);
            Ok(())
        }
        JobStatus::Rejected(report) => {
            print!("{}", report);
            anyhow::bail!("Job {}: rejected by linter", job_id)
        }
        JobStatus::Failed(reason) => anyhow::bail!("Job {}: review failed: {}", job_id, reason),
        JobStatus::Pending | JobStatus::Running => {
            anyhow::bail!("Job {}: review did not finish", job_id)
        }
    }
}
