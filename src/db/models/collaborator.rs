// src/db/models/collaborator.rs

//! CookbookCollaborator model - users allowed to publish a cookbook besides its owner
//!
//! Authorization decisions are made outside the registry core; this only
//! records the associations.

use crate::error::Result;
use rusqlite::{Connection, OptionalExtension, Row, params};

#[derive(Debug, Clone, PartialEq)]
pub struct CookbookCollaborator {
    pub id: Option<i64>,
    pub cookbook_id: i64,
    pub user_id: i64,
    pub created_at: Option<String>,
}

impl CookbookCollaborator {
    pub fn new(cookbook_id: i64, user_id: i64) -> Self {
        Self {
            id: None,
            cookbook_id,
            user_id,
            created_at: None,
        }
    }

    /// Insert this collaborator; a (cookbook, user) pair may only exist once
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO cookbook_collaborators (cookbook_id, user_id) VALUES (?1, ?2)",
            params![&self.cookbook_id, &self.user_id],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Find the collaborator record for a cookbook and user
    pub fn with_cookbook_and_user(
        conn: &Connection,
        cookbook_id: i64,
        user_id: i64,
    ) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, cookbook_id, user_id, created_at
             FROM cookbook_collaborators WHERE cookbook_id = ?1 AND user_id = ?2",
        )?;
        let found = stmt
            .query_row(params![cookbook_id, user_id], Self::from_row)
            .optional()?;
        Ok(found)
    }

    /// All collaborators of a cookbook
    pub fn find_by_cookbook(conn: &Connection, cookbook_id: i64) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(
            "SELECT id, cookbook_id, user_id, created_at
             FROM cookbook_collaborators WHERE cookbook_id = ?1 ORDER BY id",
        )?;

        let collaborators = stmt
            .query_map([cookbook_id], Self::from_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(collaborators)
    }

    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM cookbook_collaborators WHERE id = ?1", [id])?;
        Ok(())
    }

    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            cookbook_id: row.get(1)?,
            user_id: row.get(2)?,
            created_at: row.get(3)?,
        })
    }
}
