// src/db/schema.rs

//! Database schema definitions and migrations for Larder
//!
//! This module defines the SQLite schema for the registry tables and provides
//! a migration system to evolve the schema over time.

use crate::error::{Error, Result};
use rusqlite::Connection;
use tracing::{debug, info};

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Initialize the schema version tracking table
fn init_schema_version(conn: &Connection) -> Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )?;
    Ok(())
}

/// Get the current schema version from the database
pub fn get_schema_version(conn: &Connection) -> Result<i32> {
    init_schema_version(conn)?;

    let version = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_version",
            [],
            |row| row.get(0),
        )?;

    Ok(version)
}

/// Set the schema version
fn set_schema_version(conn: &Connection, version: i32) -> Result<()> {
    conn.execute(
        "INSERT INTO schema_version (version) VALUES (?1)",
        [version],
    )?;
    Ok(())
}

/// Apply all pending migrations to bring the database up to date
pub fn migrate(conn: &Connection) -> Result<()> {
    let current_version = get_schema_version(conn)?;
    info!("Current schema version: {}", current_version);

    if current_version >= SCHEMA_VERSION {
        info!("Schema is up to date");
        return Ok(());
    }

    for version in (current_version + 1)..=SCHEMA_VERSION {
        info!("Applying migration to version {}", version);
        apply_migration(conn, version)?;
        set_schema_version(conn, version)?;
    }

    info!(
        "Schema migration complete. Now at version {}",
        SCHEMA_VERSION
    );
    Ok(())
}

/// Apply a specific migration version
fn apply_migration(conn: &Connection, version: i32) -> Result<()> {
    match version {
        1 => migrate_v1(conn),
        _ => Err(Error::InitError(format!(
            "Unknown migration version: {}",
            version
        ))),
    }
}

/// Initial schema - Version 1
///
/// Creates the registry tables:
/// - cookbooks: Named units, with a lowercase shadow of the name for
///   case-insensitive uniqueness
/// - cookbook_versions: Immutable published versions, unique per cookbook
/// - supported_platforms / cookbook_dependencies: Per-version declarations
/// - cookbook_collaborators / cookbook_followers: User associations
fn migrate_v1(conn: &Connection) -> Result<()> {
    debug!("Creating schema version 1");

    conn.execute_batch(
        "
        CREATE TABLE cookbooks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            lowercase_name TEXT NOT NULL UNIQUE,
            maintainer TEXT NOT NULL,
            description TEXT NOT NULL,
            source_url TEXT,
            issues_url TEXT,
            category TEXT,
            user_id INTEGER,
            download_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX idx_cookbooks_name ON cookbooks(name);

        CREATE TABLE cookbook_versions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cookbook_id INTEGER NOT NULL,
            version TEXT NOT NULL,
            license TEXT,
            tarball TEXT NOT NULL,
            readme TEXT NOT NULL DEFAULT '',
            readme_extension TEXT NOT NULL DEFAULT '',
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(cookbook_id, version),
            FOREIGN KEY (cookbook_id) REFERENCES cookbooks(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_cookbook_versions_cookbook_id ON cookbook_versions(cookbook_id);

        CREATE TABLE supported_platforms (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cookbook_version_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            version_constraint TEXT NOT NULL,
            FOREIGN KEY (cookbook_version_id) REFERENCES cookbook_versions(id) ON DELETE CASCADE
        );

        CREATE INDEX idx_supported_platforms_version ON supported_platforms(cookbook_version_id);

        CREATE TABLE cookbook_dependencies (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cookbook_version_id INTEGER NOT NULL,
            name TEXT NOT NULL,
            version_constraint TEXT NOT NULL,
            cookbook_id INTEGER,
            FOREIGN KEY (cookbook_version_id) REFERENCES cookbook_versions(id) ON DELETE CASCADE,
            FOREIGN KEY (cookbook_id) REFERENCES cookbooks(id) ON DELETE SET NULL
        );

        CREATE INDEX idx_cookbook_dependencies_version ON cookbook_dependencies(cookbook_version_id);
        CREATE INDEX idx_cookbook_dependencies_name ON cookbook_dependencies(name);

        CREATE TABLE cookbook_collaborators (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cookbook_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(cookbook_id, user_id),
            FOREIGN KEY (cookbook_id) REFERENCES cookbooks(id) ON DELETE CASCADE
        );

        CREATE TABLE cookbook_followers (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            cookbook_id INTEGER NOT NULL,
            user_id INTEGER NOT NULL,
            created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP,
            UNIQUE(cookbook_id, user_id),
            FOREIGN KEY (cookbook_id) REFERENCES cookbooks(id) ON DELETE CASCADE
        );
        ",
    )?;

    info!("Schema version 1 created successfully");
    Ok(())
}
