// src/db/models/supported_platform.rs

//! SupportedPlatform model - a platform compatibility declaration of a version

use super::{validate_constraint, validate_present};
use crate::error::Result;
use rusqlite::{Connection, Row, params};

/// A (platform, version constraint) pair declared by one cookbook version
#[derive(Debug, Clone, PartialEq)]
pub struct SupportedPlatform {
    pub id: Option<i64>,
    pub cookbook_version_id: i64,
    pub name: String,
    pub version_constraint: String,
}

impl SupportedPlatform {
    /// Create a new SupportedPlatform
    pub fn new(cookbook_version_id: i64, name: &str, version_constraint: &str) -> Self {
        Self {
            id: None,
            cookbook_version_id,
            name: name.to_string(),
            version_constraint: version_constraint.to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_present("platform name", &self.name)?;
        validate_constraint("platform version constraint", &self.version_constraint)
    }

    /// Insert this platform into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        self.validate()?;

        conn.execute(
            "INSERT INTO supported_platforms (cookbook_version_id, name, version_constraint)
             VALUES (?1, ?2, ?3)",
            params![&self.cookbook_version_id, &self.name, &self.version_constraint],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find all platforms for a version
    pub fn find_by_version(conn: &Connection, cookbook_version_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, cookbook_version_id, name, version_constraint
             FROM supported_platforms WHERE cookbook_version_id = ?1 ORDER BY id",
        )?;

        let platforms = stmt
            .query_map([cookbook_version_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(platforms)
    }

    /// Convert a database row to a SupportedPlatform
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            cookbook_version_id: row.get(1)?,
            name: row.get(2)?,
            version_constraint: row.get(3)?,
        })
    }
}
