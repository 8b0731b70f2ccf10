// src/lib.rs

//! Larder cookbook registry core
//!
//! Two independent flows share this crate:
//!
//! - Review: a submitted artifact is fetched, unpacked into a per-job
//!   workspace and linted, yielding an accept/reject verdict. Nothing is
//!   written to the database.
//! - Publish: an accepted artifact's metadata is committed as a new
//!   cookbook version, with its platform and dependency rows, in a single
//!   transaction. Followers are notified after commit.
//!
//! # Architecture
//!
//! - SQLite through rusqlite, one model module per table
//! - Unique indexes enforce one version string per cookbook and one
//!   case-insensitive name per cookbook
//! - Reviews run on a bounded pool of blocking workers

pub mod artifact;
pub mod config;
pub mod db;
mod error;
pub mod filesystem;
pub mod jobs;
pub mod notify;
pub mod publish;

pub use artifact::{
    ArchiveExtractor, ArchiveFetcher, ArtifactFetcher, ArtifactWorkspace, CommandLinter,
    Extractor, LintOutcome, LintPolicy, Linter, Review, ReviewTools,
};
pub use config::LarderConfig;
pub use error::{Error, Result};
pub use jobs::{JobId, JobStatus, ReviewService};
pub use notify::{ChannelNotifier, NoopNotifier, NotificationTrigger, PublishNotice, SpoolNotifier};
pub use publish::{Metadata, Readme, create_cookbook, publish_version};
