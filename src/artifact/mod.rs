// src/artifact/mod.rs

//! Artifact review: fetch a submitted tarball, unpack it into a per-job
//! workspace and run the linter over it
//!
//! Nothing here touches the database. A review only produces a verdict;
//! publishing an accepted artifact is done by [`crate::publish`].

pub mod extract;
pub mod fetch;
pub mod lint;
pub mod workspace;

pub use extract::{ArchiveExtractor, Compression, ExtractionReport, Extractor};
pub use fetch::{ArchiveFetcher, ArtifactFetcher};
pub use lint::{CommandLinter, LintOutcome, LintPolicy, Linter};
pub use workspace::{ArtifactWorkspace, Review};

use crate::config::LarderConfig;
use std::sync::Arc;

/// The collaborators a review runs through
#[derive(Clone)]
pub struct ReviewTools {
    pub fetcher: Arc<dyn ArchiveFetcher>,
    pub extractor: Arc<dyn Extractor>,
    pub linter: Arc<dyn Linter>,
}

impl ReviewTools {
    pub fn new(
        fetcher: Arc<dyn ArchiveFetcher>,
        extractor: Arc<dyn Extractor>,
        linter: Arc<dyn Linter>,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            linter,
        }
    }

    /// Production tools built from configuration
    pub fn from_config(config: &LarderConfig) -> anyhow::Result<Self> {
        Ok(Self::new(
            Arc::new(ArtifactFetcher::new(config.fetch_timeout()?)),
            Arc::new(ArchiveExtractor::new(config.max_file_size()?)),
            Arc::new(CommandLinter::from_config(config)?),
        ))
    }
}
