// src/artifact/lint.rs

//! External linter invocation
//!
//! The linter is run as `<program> <tree> [-f <fail tags>] [-t <tag>]...`
//! with stdin closed and a hard timeout. Its combined output is kept
//! verbatim as the review report; it is never parsed. The exit status
//! alone decides the verdict.

use crate::config::LarderConfig;
use crate::error::{Error, Result};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use wait_timeout::ChildExt;

/// Default linter timeout
pub const DEFAULT_LINT_TIMEOUT: Duration = Duration::from_secs(300);

/// How long output readers get to finish after a timed-out linter is killed
const READER_GRACE: Duration = Duration::from_secs(2);

/// Which rules the linter enforces
///
/// `fail_tags` is a single tag expression passed with `-f`; every entry in
/// `tags` is passed with its own `-t`. Empty means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LintPolicy {
    pub fail_tags: Option<String>,
    pub tags: Vec<String>,
}

impl LintPolicy {
    pub fn new(fail_tags: Option<String>, tags: Vec<String>) -> Self {
        Self { fail_tags, tags }
    }

    /// Command line arguments for linting `tree`
    pub fn args(&self, tree: &Path) -> Vec<OsString> {
        let mut args = vec![tree.as_os_str().to_owned()];
        if let Some(fail_tags) = &self.fail_tags {
            args.push("-f".into());
            args.push(fail_tags.into());
        }
        for tag in &self.tags {
            args.push("-t".into());
            args.push(tag.into());
        }
        args
    }
}

/// Result of a completed lint run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LintOutcome {
    /// Raw linter output, stdout followed by stderr
    pub report: String,
    /// Whether an enabled rule failed
    pub failed: bool,
}

/// Runs static analysis over an unpacked cookbook tree
pub trait Linter: Send + Sync {
    /// A linter that could not run to completion yields [`Error::LinterError`]
    fn lint(&self, tree: &Path, policy: &LintPolicy) -> Result<LintOutcome>;
}

/// Linter backed by an external program
#[derive(Debug, Clone)]
pub struct CommandLinter {
    program: PathBuf,
    timeout: Duration,
    failure_exit_codes: Vec<i32>,
}

impl CommandLinter {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration, failure_exit_codes: Vec<i32>) -> Self {
        Self {
            program: program.into(),
            timeout,
            failure_exit_codes,
        }
    }

    pub fn from_config(config: &LarderConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            config.linter.program.clone(),
            config.linter_timeout()?,
            config.linter.failure_exit_codes.clone(),
        ))
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn verdict(&self, status: ExitStatus, report: String) -> Result<LintOutcome> {
        match status.code() {
            Some(0) => Ok(LintOutcome {
                report,
                failed: false,
            }),
            Some(code) if self.failure_exit_codes.contains(&code) => Ok(LintOutcome {
                report,
                failed: true,
            }),
            Some(code) => Err(Error::LinterError(format!(
                "{} exited with code {}: {}",
                self.program.display(),
                code,
                report.trim()
            ))),
            None => Err(Error::LinterError(format!(
                "{} was terminated by a signal",
                self.program.display()
            ))),
        }
    }
}

impl Linter for CommandLinter {
    fn lint(&self, tree: &Path, policy: &LintPolicy) -> Result<LintOutcome> {
        let args = policy.args(tree);
        info!("Linting {} with {}", tree.display(), self.program.display());
        debug!("Linter arguments: {:?}", args);

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                Error::LinterError(format!("Failed to spawn {}: {}", self.program.display(), e))
            })?;

        // Drain both pipes while waiting so a chatty linter cannot fill them and stall
        let stdout = drain(child.stdout.take());
        let stderr = drain(child.stderr.take());

        let status = match child.wait_timeout(self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                reap(stdout, READER_GRACE);
                reap(stderr, READER_GRACE);
                warn!(
                    "Linter timed out after {} seconds on {}",
                    self.timeout.as_secs(),
                    tree.display()
                );
                return Err(Error::LinterError(format!(
                    "{} timed out after {} seconds",
                    self.program.display(),
                    self.timeout.as_secs()
                )));
            }
            Err(e) => {
                let _ = child.kill();
                let _ = child.wait();
                reap(stdout, READER_GRACE);
                reap(stderr, READER_GRACE);
                return Err(Error::LinterError(format!("Failed to wait for linter: {e}")));
            }
        };

        let mut report = collect(stdout);
        report.push_str(&collect(stderr));

        let outcome = self.verdict(status, report)?;
        info!(
            "Linter finished on {}: {}",
            tree.display(),
            if outcome.failed { "failed" } else { "passed" }
        );
        Ok(outcome)
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> Option<JoinHandle<Vec<u8>>> {
    pipe.map(|mut pipe| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            let _ = pipe.read_to_end(&mut buf);
            buf
        })
    })
}

/// Join a reader after its linter was killed, waiting at most `grace`
///
/// Only the linter itself is killed. A grandchild that inherited the pipes
/// keeps them open, and its reader is then left to exit when that process
/// does.
fn reap(handle: Option<JoinHandle<Vec<u8>>>, grace: Duration) {
    let Some(handle) = handle else {
        return;
    };
    let deadline = Instant::now() + grace;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!("Linter output is still held open by a descendant process");
            return;
        }
        thread::sleep(Duration::from_millis(10));
    }
    let _ = handle.join();
}

fn collect(handle: Option<JoinHandle<Vec<u8>>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}
