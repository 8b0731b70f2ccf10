// src/db/paths.rs
//! Centralized path derivation for Larder directories

use std::path::{Path, PathBuf};

/// Default database location
pub const DEFAULT_DB_PATH: &str = "/var/lib/larder/larder.db";

/// Get the directory containing the database
pub fn db_dir(db_path: &str) -> PathBuf {
    Path::new(db_path)
        .parent()
        .unwrap_or(Path::new("/var/lib/larder"))
        .to_path_buf()
}

/// Get the notification spool file kept next to the database
pub fn spool_path(db_path: &str) -> PathBuf {
    db_dir(db_path).join("notifications.jsonl")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_dir() {
        assert_eq!(
            db_dir("/var/lib/larder/larder.db"),
            PathBuf::from("/var/lib/larder")
        );
    }

    #[test]
    fn test_spool_path() {
        assert_eq!(
            spool_path("/srv/registry/larder.db"),
            PathBuf::from("/srv/registry/notifications.jsonl")
        );
    }
}
