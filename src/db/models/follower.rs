// src/db/models/follower.rs

//! CookbookFollower model - users subscribed to a cookbook's releases

use crate::error::Result;
use rusqlite::{Connection, params};

#[derive(Debug, Clone, PartialEq)]
pub struct CookbookFollower {
    pub id: Option<i64>,
    pub cookbook_id: i64,
    pub user_id: i64,
}

impl CookbookFollower {
    pub fn new(cookbook_id: i64, user_id: i64) -> Self {
        Self {
            id: None,
            cookbook_id,
            user_id,
        }
    }

    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        conn.execute(
            "INSERT INTO cookbook_followers (cookbook_id, user_id) VALUES (?1, ?2)",
            params![&self.cookbook_id, &self.user_id],
        )?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// User ids following a cookbook, used to address release notifications
    pub fn user_ids(conn: &Connection, cookbook_id: i64) -> Result<Vec<i64>> {
        let mut stmt = conn.prepare(
            "SELECT user_id FROM cookbook_followers WHERE cookbook_id = ?1 ORDER BY id",
        )?;

        let ids = stmt
            .query_map([cookbook_id], |row| row.get(0))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(ids)
    }

    pub fn delete(conn: &Connection, cookbook_id: i64, user_id: i64) -> Result<()> {
        conn.execute(
            "DELETE FROM cookbook_followers WHERE cookbook_id = ?1 AND user_id = ?2",
            params![cookbook_id, user_id],
        )?;
        Ok(())
    }
}
