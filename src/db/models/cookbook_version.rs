// src/db/models/cookbook_version.rs

//! CookbookVersion model - one immutable published release of a cookbook

use super::cookbook_dependency::CookbookDependency;
use super::supported_platform::SupportedPlatform;
use super::validate_present;
use crate::db::is_unique_violation;
use crate::error::{Error, Result};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, params};
use std::sync::LazyLock;

static VERSION_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\d+\.\d+\.\d+$").unwrap());

const COLUMNS: &str =
    "id, cookbook_id, version, license, tarball, readme, readme_extension, created_at";

/// A published version of a cookbook
#[derive(Debug, Clone, PartialEq)]
pub struct CookbookVersion {
    pub id: Option<i64>,
    pub cookbook_id: i64,
    /// Dotted numeric triple, e.g. `2.0.1`
    pub version: String,
    pub license: Option<String>,
    /// Reference to the stored artifact
    pub tarball: String,
    pub readme: String,
    pub readme_extension: String,
    pub created_at: Option<String>,
}

impl CookbookVersion {
    /// Create a new, unsaved CookbookVersion
    pub fn new(cookbook_id: i64, version: &str, tarball: &str) -> Self {
        Self {
            id: None,
            cookbook_id,
            version: version.to_string(),
            license: None,
            tarball: tarball.to_string(),
            readme: String::new(),
            readme_extension: String::new(),
            created_at: None,
        }
    }

    /// Translate a URL-friendly version (`2_0_1`) into its dotted form
    pub fn version_from_param(token: &str) -> String {
        token.replace('_', ".")
    }

    /// Check field-level invariants
    pub fn validate(&self) -> Result<()> {
        validate_present("version", &self.version)?;
        if !VERSION_RE.is_match(&self.version) {
            return Err(Error::invalid(
                "version",
                format!("'{}' is not a MAJOR.MINOR.PATCH version", self.version),
            ));
        }
        validate_present("tarball", &self.tarball)?;
        Ok(())
    }

    /// Insert this version into the database
    ///
    /// A second version with the same string for the same cookbook fails with
    /// [`Error::PublishConflict`].
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        self.validate()?;

        conn.execute(
            "INSERT INTO cookbook_versions (cookbook_id, version, license, tarball, readme, readme_extension)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                &self.cookbook_id,
                &self.version,
                &self.license,
                &self.tarball,
                &self.readme,
                &self.readme_extension,
            ],
        )
        .map_err(|e| {
            if is_unique_violation(&e) {
                Error::PublishConflict(format!(
                    "version {} already exists for cookbook {}",
                    self.version, self.cookbook_id
                ))
            } else {
                Error::Database(e)
            }
        })?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Replace the readme after reprocessing; every other field is immutable
    pub fn update_readme(&mut self, conn: &Connection, readme: &str, extension: &str) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot update version without ID".to_string()))?;

        conn.execute(
            "UPDATE cookbook_versions SET readme = ?1, readme_extension = ?2 WHERE id = ?3",
            params![readme, extension, id],
        )?;

        self.readme = readme.to_string();
        self.readme_extension = extension.to_string();
        Ok(())
    }

    /// Find a version by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM cookbook_versions WHERE id = ?1"
        ))?;
        let version = stmt.query_row([id], Self::from_row).optional()?;
        Ok(version)
    }

    /// All versions of a cookbook, newest first
    pub fn find_by_cookbook(conn: &Connection, cookbook_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM cookbook_versions WHERE cookbook_id = ?1 ORDER BY id DESC"
        ))?;

        let versions = stmt
            .query_map([cookbook_id], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(versions)
    }

    /// The most recently created version of a cookbook
    pub fn find_latest(conn: &Connection, cookbook_id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM cookbook_versions WHERE cookbook_id = ?1 ORDER BY id DESC LIMIT 1"
        ))?;
        let version = stmt.query_row([cookbook_id], Self::from_row).optional()?;
        Ok(version)
    }

    /// Find an exact version string of a cookbook
    pub fn find_by_cookbook_and_version(
        conn: &Connection,
        cookbook_id: i64,
        version: &str,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM cookbook_versions WHERE cookbook_id = ?1 AND version = ?2"
        ))?;
        let found = stmt
            .query_row(params![cookbook_id, version], Self::from_row)
            .optional()?;
        Ok(found)
    }

    /// Platforms declared by this version
    pub fn supported_platforms(&self, conn: &Connection) -> Result<Vec<SupportedPlatform>> {
        match self.id {
            Some(id) => SupportedPlatform::find_by_version(conn, id),
            None => Ok(Vec::new()),
        }
    }

    /// Dependencies declared by this version
    pub fn dependencies(&self, conn: &Connection) -> Result<Vec<CookbookDependency>> {
        match self.id {
            Some(id) => CookbookDependency::find_by_version(conn, id),
            None => Ok(Vec::new()),
        }
    }

    /// Convert a database row to a CookbookVersion
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            cookbook_id: row.get(1)?,
            version: row.get(2)?,
            license: row.get(3)?,
            tarball: row.get(4)?,
            readme: row.get(5)?,
            readme_extension: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}
