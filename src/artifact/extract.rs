// src/artifact/extract.rs

//! Artifact unpacking
//!
//! Unpacks a cookbook tarball (gzip, zstd or uncompressed) into a work
//! directory. Permission bits from the archive are never restored and no
//! link entry is ever materialized, so the unpacked tree contains only
//! plain directories (0755) and plain files (0644).

use crate::error::{Error, Result};
use crate::filesystem::path::{link_target_escapes, safe_join};
use flate2::read::GzDecoder;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom};
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::path::{Component, Path, PathBuf};
use tar::{Archive, EntryType};
use tracing::{debug, info, warn};

/// Mode of every regular file written by the extractor
pub const FILE_MODE: u32 = 0o644;

/// Mode of every directory created by the extractor
pub const DIR_MODE: u32 = 0o755;

/// Default per-file size cap (64 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 64 * 1024 * 1024;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Unpacks an archive file into a destination directory
pub trait Extractor: Send + Sync {
    /// Every failure is reported as [`Error::ExtractionFailed`]
    fn extract(&self, archive: &Path, dest: &Path) -> Result<ExtractionReport>;
}

/// Compression formats recognized by magic bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    Gzip,
    Zstd,
    None,
}

impl Compression {
    fn detect(magic: &[u8]) -> Self {
        if magic.starts_with(&ZSTD_MAGIC) {
            Compression::Zstd
        } else if magic.starts_with(&GZIP_MAGIC) {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

/// What an extraction produced, as paths relative to the destination
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ExtractionReport {
    pub files: Vec<PathBuf>,
    pub directories: Vec<PathBuf>,
    /// Entries intentionally not materialized (links, devices, fifos)
    pub skipped: Vec<PathBuf>,
}

impl ExtractionReport {
    pub fn entry_count(&self) -> usize {
        self.files.len() + self.directories.len()
    }
}

/// Tar extractor with normalized permissions and traversal checks
#[derive(Debug, Clone)]
pub struct ArchiveExtractor {
    max_file_size: u64,
}

impl Default for ArchiveExtractor {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE)
    }
}

impl ArchiveExtractor {
    pub fn new(max_file_size: u64) -> Self {
        Self { max_file_size }
    }

    /// Open an archive, picking the decoder from its leading bytes
    fn open_archive(path: &Path) -> Result<Archive<Box<dyn Read>>> {
        let mut file = File::open(path)
            .map_err(|e| failed(format!("Failed to open archive {}: {}", path.display(), e)))?;

        let mut magic = Vec::with_capacity(ZSTD_MAGIC.len());
        (&mut file)
            .take(ZSTD_MAGIC.len() as u64)
            .read_to_end(&mut magic)
            .map_err(|e| failed(format!("Failed to read archive header: {e}")))?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| failed(format!("Failed to rewind archive: {e}")))?;

        let compression = Compression::detect(&magic);
        debug!("Archive {} compression: {:?}", path.display(), compression);

        let reader: Box<dyn Read> = match compression {
            Compression::Zstd => {
                let decoder = zstd::Decoder::new(file)
                    .map_err(|e| failed(format!("Failed to create zstd decoder: {e}")))?;
                Box::new(decoder)
            }
            Compression::Gzip => Box::new(GzDecoder::new(file)),
            Compression::None => Box::new(file),
        };

        Ok(Archive::new(reader))
    }

    fn write_file(&self, entry: &mut impl Read, size: u64, target: &Path) -> Result<()> {
        if size > self.max_file_size {
            return Err(failed(format!(
                "{} is {} bytes, limit is {}",
                target.display(),
                size,
                self.max_file_size
            )));
        }

        if let Some(parent) = target.parent() {
            create_dir(parent)?;
        }

        let mut out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(FILE_MODE)
            .open(target)
            .map_err(|e| failed(format!("Failed to create {}: {}", target.display(), e)))?;

        // Header sizes can lie for sparse or malformed entries
        let written = io::copy(&mut entry.take(self.max_file_size + 1), &mut out)
            .map_err(|e| failed(format!("Failed to write {}: {}", target.display(), e)))?;
        if written > self.max_file_size {
            return Err(failed(format!(
                "{} exceeds the {} byte limit",
                target.display(),
                self.max_file_size
            )));
        }

        // The umask may have narrowed the create mode
        fs::set_permissions(target, fs::Permissions::from_mode(FILE_MODE))
            .map_err(|e| failed(format!("Failed to set mode on {}: {}", target.display(), e)))?;

        Ok(())
    }
}

impl Extractor for ArchiveExtractor {
    fn extract(&self, archive_path: &Path, dest: &Path) -> Result<ExtractionReport> {
        info!("Extracting {} into {}", archive_path.display(), dest.display());

        create_dir(dest)?;

        let mut archive = Self::open_archive(archive_path)?;
        let mut report = ExtractionReport::default();

        let entries = archive
            .entries()
            .map_err(|e| failed(format!("Failed to read archive entries: {e}")))?;

        for entry in entries {
            let mut entry = entry.map_err(|e| failed(format!("Failed to read entry: {e}")))?;
            let path = entry
                .path()
                .map_err(|e| failed(format!("Invalid entry path: {e}")))?
                .into_owned();

            if is_archive_root(&path) {
                debug!("Skipping archive root entry {}", path.display());
                continue;
            }

            let target = safe_join(dest, &path).map_err(|e| failed(e.to_string()))?;
            let relative = target.strip_prefix(dest).unwrap_or(&target).to_path_buf();

            match entry.header().entry_type() {
                EntryType::Regular | EntryType::Continuous => {
                    let size = entry.header().size().unwrap_or(0);
                    self.write_file(&mut entry, size, &target)?;
                    report.files.push(relative);
                }
                EntryType::Directory => {
                    create_dir(&target)?;
                    report.directories.push(relative);
                }
                EntryType::Symlink | EntryType::Link => {
                    let link = entry
                        .link_name()
                        .map_err(|e| failed(format!("Invalid link target: {e}")))?
                        .map(|l| l.into_owned())
                        .unwrap_or_default();

                    if link_target_escapes(&link) {
                        return Err(failed(format!(
                            "Path traversal attempt: {} links to {}",
                            path.display(),
                            link.display()
                        )));
                    }

                    warn!("Skipping link {} -> {}", path.display(), link.display());
                    report.skipped.push(relative);
                }
                EntryType::XGlobalHeader | EntryType::XHeader => {}
                other => {
                    warn!("Skipping {:?} entry {}", other, path.display());
                    report.skipped.push(relative);
                }
            }
        }

        if report.entry_count() == 0 {
            return Err(failed(format!(
                "{} contains no files",
                archive_path.display()
            )));
        }

        info!(
            "Extracted {} files and {} directories ({} skipped)",
            report.files.len(),
            report.directories.len(),
            report.skipped.len()
        );

        Ok(report)
    }
}

fn failed(msg: impl Into<String>) -> Error {
    Error::ExtractionFailed(msg.into())
}

/// `.`, `./` and friends name the destination itself
fn is_archive_root(path: &Path) -> bool {
    path.components()
        .all(|c| matches!(c, Component::CurDir | Component::RootDir))
}

fn create_dir(path: &Path) -> Result<()> {
    fs::create_dir_all(path)
        .and_then(|_| fs::set_permissions(path, fs::Permissions::from_mode(DIR_MODE)))
        .map_err(|e| failed(format!("Failed to create directory {}: {}", path.display(), e)))
}
