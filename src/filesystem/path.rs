// src/filesystem/path.rs

//! Path sanitization utilities for security
//!
//! Artifact archives and job identifiers come from untrusted sources. These
//! helpers keep every path they produce inside the directory it is joined
//! to.

use crate::error::{Error, Result};
use std::path::{Component, Path, PathBuf};

/// Sanitize a path from an untrusted source
///
/// This function:
/// 1. Rejects paths containing `..` (parent directory) components
/// 2. Skips `.` (current directory) components
/// 3. Strips leading slashes to make the path relative
/// 4. Returns an error for empty paths
///
/// # Examples
///
/// ```
/// use larder::filesystem::path::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("apache2/recipes/default.rb").unwrap(),
///            PathBuf::from("apache2/recipes/default.rb"));
/// assert_eq!(sanitize_path("/apache2/metadata.rb").unwrap(),
///            PathBuf::from("apache2/metadata.rb"));
/// assert!(sanitize_path("../etc/passwd").is_err());
/// assert!(sanitize_path("apache2/../../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    let relative = path_str.trim_start_matches('/');

    let mut normalized = PathBuf::new();

    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir => {}
            Component::ParentDir => {
                return Err(Error::PathTraversal(path_str.to_string()));
            }
            Component::Prefix(_) | Component::RootDir => {}
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath("Empty path after sanitization".to_string()));
    }

    Ok(normalized)
}

/// Safely join a root path with an untrusted path
///
/// The path is sanitized first; when both paths already exist the joined
/// path is also checked to resolve under the root.
///
/// # Examples
///
/// ```
/// use larder::filesystem::path::safe_join;
/// use std::path::{Path, PathBuf};
///
/// let root = Path::new("/tmp/job-1");
/// assert_eq!(safe_join(root, "apache2/README.md").unwrap(),
///            PathBuf::from("/tmp/job-1/apache2/README.md"));
/// assert!(safe_join(root, "../etc/passwd").is_err());
/// ```
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let sanitized = sanitize_path(path.as_ref())?;
    let joined = root.join(&sanitized);

    if let (Ok(canonical_root), Ok(canonical_joined)) =
        (root.canonicalize(), joined.canonicalize())
        && !canonical_joined.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "Path {} escapes root {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Whether a link target, interpreted relative to the link's directory,
/// could point outside the tree it was unpacked into
pub fn link_target_escapes(target: impl AsRef<Path>) -> bool {
    let target = target.as_ref();
    target.is_absolute()
        || target
            .components()
            .any(|c| matches!(c, Component::ParentDir | Component::Prefix(_) | Component::RootDir))
}

/// Sanitize a filename (single path component) from an untrusted source
///
/// This is stricter than `sanitize_path` - it rejects any path separators.
///
/// # Examples
///
/// ```
/// use larder::filesystem::path::sanitize_filename;
///
/// assert_eq!(sanitize_filename("job-42").unwrap(), "job-42");
/// assert!(sanitize_filename("../job").is_err());
/// assert!(sanitize_filename("a/b").is_err());
/// ```
pub fn sanitize_filename(name: &str) -> Result<String> {
    if name.contains('/') || name.contains('\\') {
        return Err(Error::PathTraversal(format!(
            "Filename contains path separator: {}",
            name
        )));
    }

    if name == ".." || name == "." {
        return Err(Error::PathTraversal(format!("Invalid filename: {}", name)));
    }

    if name.is_empty() {
        return Err(Error::InvalidPath("Empty filename".to_string()));
    }

    Ok(name.to_string())
}
