// src/artifact/fetch.rs

//! Artifact download
//!
//! Materializes an external artifact reference as a temporary file. The
//! temporary file is only handed back once the whole stream has been
//! written and flushed; on any failure it is dropped (and deleted) before
//! the error is returned. Fetching never retries.

use crate::error::{Error, Result};
use reqwest::blocking::{Client, Response};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;
use tracing::{debug, info};
use url::Url;

/// Default timeout for artifact downloads
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(60);

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Retrieves the bytes behind an artifact reference
pub trait ArchiveFetcher: Send + Sync {
    /// Fetch `reference` into a temporary file
    ///
    /// Every failure is reported as [`Error::FetchFailed`].
    fn fetch(&self, reference: &str) -> Result<NamedTempFile>;
}

/// Fetches `http(s)://` references over the network and `file://`
/// references or bare paths from the local filesystem
#[derive(Debug, Clone)]
pub struct ArtifactFetcher {
    timeout: Duration,
}

impl Default for ArtifactFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_FETCH_TIMEOUT)
    }
}

/// Where a reference points
#[derive(Debug, PartialEq, Eq)]
enum Source {
    Http(Url),
    Local(PathBuf),
}

impl ArtifactFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn classify(reference: &str) -> Result<Source> {
        match Url::parse(reference) {
            Ok(url) => match url.scheme() {
                "http" | "https" => Ok(Source::Http(url)),
                "file" => url.to_file_path().map(Source::Local).map_err(|_| {
                    Error::FetchFailed(format!("Invalid file URL: {}", reference))
                }),
                scheme => Err(Error::FetchFailed(format!(
                    "Unsupported scheme '{}' in {}",
                    scheme, reference
                ))),
            },
            Err(url::ParseError::RelativeUrlWithoutBase) => {
                Ok(Source::Local(PathBuf::from(reference)))
            }
            Err(e) => Err(Error::FetchFailed(format!(
                "Invalid artifact reference {}: {}",
                reference, e
            ))),
        }
    }

    fn fetch_http(&self, url: &Url) -> Result<NamedTempFile> {
        // Built per fetch: a blocking client must not live inside an async context
        let client = Client::builder()
            .timeout(self.timeout)
            .build()
            .map_err(|e| Error::FetchFailed(format!("Failed to create HTTP client: {e}")))?;

        info!("Downloading artifact from {}", url);

        let response = client
            .get(url.as_str())
            .send()
            .map_err(|e| Error::FetchFailed(format!("Failed to fetch {}: {}", url, e)))?;

        if !response.status().is_success() {
            return Err(Error::FetchFailed(format!(
                "HTTP {} from {}",
                response.status(),
                url
            )));
        }

        let mut temp = new_temp_file()?;
        let written = stream_response_to_file(response, temp.as_file_mut())?;
        finish(&mut temp)?;

        debug!("Downloaded {} bytes from {}", written, url);
        Ok(temp)
    }

    fn fetch_local(&self, path: &Path) -> Result<NamedTempFile> {
        info!("Copying artifact from {}", path.display());

        let mut source = File::open(path).map_err(|e| {
            Error::FetchFailed(format!("Failed to open {}: {}", path.display(), e))
        })?;

        let mut temp = new_temp_file()?;
        let written = io::copy(&mut source, temp.as_file_mut()).map_err(|e| {
            Error::FetchFailed(format!("Failed to copy {}: {}", path.display(), e))
        })?;
        finish(&mut temp)?;

        debug!("Copied {} bytes from {}", written, path.display());
        Ok(temp)
    }
}

impl ArchiveFetcher for ArtifactFetcher {
    fn fetch(&self, reference: &str) -> Result<NamedTempFile> {
        match Self::classify(reference)? {
            Source::Http(url) => self.fetch_http(&url),
            Source::Local(path) => self.fetch_local(&path),
        }
    }
}

fn new_temp_file() -> Result<NamedTempFile> {
    tempfile::Builder::new()
        .prefix("larder-archive-")
        .tempfile()
        .map_err(|e| Error::FetchFailed(format!("Failed to create temp file: {e}")))
}

fn finish(temp: &mut NamedTempFile) -> Result<()> {
    temp.as_file_mut()
        .flush()
        .and_then(|_| temp.as_file().sync_all())
        .map_err(|e| Error::FetchFailed(format!("Failed to flush artifact: {e}")))
}

/// Stream an HTTP response into `file` without buffering it in memory
fn stream_response_to_file(mut response: Response, file: &mut File) -> Result<u64> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    loop {
        let bytes_read = response
            .read(&mut buffer)
            .map_err(|e| Error::FetchFailed(format!("Failed to read response: {e}")))?;

        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| Error::FetchFailed(format!("Failed to write data: {e}")))?;

        downloaded += bytes_read as u64;
    }

    Ok(downloaded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_references() {
        assert!(matches!(
            ArtifactFetcher::classify("https://example.com/a.tgz").unwrap(),
            Source::Http(_)
        ));
        assert_eq!(
            ArtifactFetcher::classify("file:///tmp/a.tgz").unwrap(),
            Source::Local(PathBuf::from("/tmp/a.tgz"))
        );
        assert_eq!(
            ArtifactFetcher::classify("uploads/a.tgz").unwrap(),
            Source::Local(PathBuf::from("uploads/a.tgz"))
        );
        assert!(matches!(
            ArtifactFetcher::classify("ftp://example.com/a.tgz"),
            Err(Error::FetchFailed(_))
        ));
    }

    #[test]
    fn test_fetch_local_copies_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("artifact.tgz");
        std::fs::write(&source, b"not really a tarball").unwrap();

        let temp = ArtifactFetcher::default()
            .fetch(source.to_str().unwrap())
            .unwrap();
        assert_eq!(std::fs::read(temp.path()).unwrap(), b"not really a tarball");
    }

    #[test]
    fn test_fetch_missing_local_file() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.tgz");

        let err = ArtifactFetcher::default()
            .fetch(missing.to_str().unwrap())
            .unwrap_err();
        assert!(matches!(err, Error::FetchFailed(_)));
    }
}
