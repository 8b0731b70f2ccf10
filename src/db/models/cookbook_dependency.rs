// src/db/models/cookbook_dependency.rs

//! CookbookDependency model - a named reference from a version to another cookbook

use super::{validate_constraint, validate_present};
use crate::error::Result;
use rusqlite::{Connection, Row, params};

/// Dependency entry declared by one cookbook version
///
/// `cookbook_id` links to the registered cookbook with the same name at
/// publish time, or stays `None` when the name was not registered yet. The
/// link is never re-resolved afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct CookbookDependency {
    pub id: Option<i64>,
    pub cookbook_version_id: i64,
    pub name: String,
    pub version_constraint: String,
    pub cookbook_id: Option<i64>,
}

impl CookbookDependency {
    /// Create a new CookbookDependency
    pub fn new(
        cookbook_version_id: i64,
        name: &str,
        version_constraint: &str,
        cookbook_id: Option<i64>,
    ) -> Self {
        Self {
            id: None,
            cookbook_version_id,
            name: name.to_string(),
            version_constraint: version_constraint.to_string(),
            cookbook_id,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate_present("dependency name", &self.name)?;
        validate_constraint("dependency version constraint", &self.version_constraint)
    }

    /// Insert this dependency into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        self.validate()?;

        conn.execute(
            "INSERT INTO cookbook_dependencies (cookbook_version_id, name, version_constraint, cookbook_id)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                &self.cookbook_version_id,
                &self.name,
                &self.version_constraint,
                &self.cookbook_id,
            ],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find all dependencies declared by a version
    pub fn find_by_version(conn: &Connection, cookbook_version_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, cookbook_version_id, name, version_constraint, cookbook_id
             FROM cookbook_dependencies WHERE cookbook_version_id = ?1 ORDER BY id",
        )?;

        let deps = stmt
            .query_map([cookbook_version_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(deps)
    }

    /// Find all dependency entries naming a cookbook (reverse dependencies)
    pub fn find_dependents(conn: &Connection, name: &str) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, cookbook_version_id, name, version_constraint, cookbook_id
             FROM cookbook_dependencies WHERE name = ?1 ORDER BY id",
        )?;

        let deps = stmt
            .query_map([name], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(deps)
    }

    /// Count dependency rows for a version
    pub fn count_by_version(conn: &Connection, cookbook_version_id: i64) -> Result<i64> {
        let count = conn.query_row(
            "SELECT COUNT(*) FROM cookbook_dependencies WHERE cookbook_version_id = ?1",
            params![cookbook_version_id],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    /// Convert a database row to a CookbookDependency
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            cookbook_version_id: row.get(1)?,
            name: row.get(2)?,
            version_constraint: row.get(3)?,
            cookbook_id: row.get(4)?,
        })
    }
}
