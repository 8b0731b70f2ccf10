// src/db/models/cookbook.rs

//! Cookbook model - the named, versioned unit of the registry

use super::cookbook_dependency::CookbookDependency;
use super::cookbook_version::CookbookVersion;
use super::supported_platform::SupportedPlatform;
use super::validate_present;
use crate::db::is_unique_violation;
use crate::error::{Error, Result};
use regex::Regex;
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter};
use std::str::FromStr;
use std::sync::LazyLock;
use url::Url;

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());

const COLUMNS: &str = "id, name, lowercase_name, maintainer, description, source_url, issues_url, \
                       category, user_id, download_count, created_at, updated_at";

/// Sort order for cookbook listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CookbookOrdering {
    RecentlyUpdated,
    RecentlyAdded,
    MostDownloaded,
    MostFollowed,
    #[default]
    Name,
}

impl CookbookOrdering {
    fn order_clause(&self) -> &'static str {
        match self {
            CookbookOrdering::RecentlyUpdated => "updated_at DESC, id DESC",
            CookbookOrdering::RecentlyAdded => "created_at DESC, id DESC",
            CookbookOrdering::MostDownloaded => "download_count DESC, name ASC",
            CookbookOrdering::MostFollowed => {
                "(SELECT COUNT(*) FROM cookbook_followers f WHERE f.cookbook_id = cookbooks.id) DESC, name ASC"
            }
            CookbookOrdering::Name => "name ASC",
        }
    }
}

impl FromStr for CookbookOrdering {
    type Err = std::convert::Infallible;

    /// Unknown orderings fall back to ordering by name
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "recently_updated" => CookbookOrdering::RecentlyUpdated,
            "recently_added" => CookbookOrdering::RecentlyAdded,
            "most_downloaded" => CookbookOrdering::MostDownloaded,
            "most_followed" => CookbookOrdering::MostFollowed,
            _ => CookbookOrdering::Name,
        })
    }
}

/// A Cookbook is a named collection of published versions
#[derive(Debug, Clone, PartialEq)]
pub struct Cookbook {
    pub id: Option<i64>,
    pub name: String,
    /// Lowercase shadow of `name`, kept in sync on every write
    pub lowercase_name: String,
    pub maintainer: String,
    pub description: String,
    pub source_url: Option<String>,
    pub issues_url: Option<String>,
    pub category: Option<String>,
    /// Owning user (user management lives outside the registry core)
    pub user_id: Option<i64>,
    pub download_count: i64,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
}

impl Cookbook {
    /// Create a new, unsaved Cookbook
    pub fn new(name: &str, maintainer: &str, description: &str) -> Self {
        Self {
            id: None,
            name: name.to_string(),
            lowercase_name: name.to_lowercase(),
            maintainer: maintainer.to_string(),
            description: description.to_string(),
            source_url: None,
            issues_url: None,
            category: None,
            user_id: None,
            download_count: 0,
            created_at: None,
            updated_at: None,
        }
    }

    /// Check field-level invariants
    pub fn validate(&self) -> Result<()> {
        validate_present("name", &self.name)?;
        if !NAME_RE.is_match(&self.name) {
            return Err(Error::invalid(
                "name",
                format!(
                    "'{}' may only contain letters, digits, underscores and dashes",
                    self.name
                ),
            ));
        }
        validate_present("maintainer", &self.maintainer)?;
        validate_present("description", &self.description)?;
        validate_url("source_url", self.source_url.as_deref())?;
        validate_url("issues_url", self.issues_url.as_deref())?;
        Ok(())
    }

    /// Insert this cookbook into the database
    pub fn insert(&mut self, conn: &Connection) -> Result<i64> {
        self.lowercase_name = self.name.to_lowercase();
        self.validate()?;

        conn.execute(
            "INSERT INTO cookbooks (name, lowercase_name, maintainer, description, source_url, issues_url, category, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                &self.name,
                &self.lowercase_name,
                &self.maintainer,
                &self.description,
                &self.source_url,
                &self.issues_url,
                &self.category,
                &self.user_id,
            ],
        )
        .map_err(|e| self.map_write_error(e))?;

        let id = conn.last_insert_rowid();
        self.id = Some(id);
        Ok(id)
    }

    /// Persist changed fields and bump `updated_at`
    pub fn update(&mut self, conn: &Connection) -> Result<()> {
        let id = self
            .id
            .ok_or_else(|| Error::InitError("Cannot update cookbook without ID".to_string()))?;
        self.lowercase_name = self.name.to_lowercase();
        self.validate()?;

        conn.execute(
            "UPDATE cookbooks SET name = ?1, lowercase_name = ?2, maintainer = ?3, description = ?4,
                    source_url = ?5, issues_url = ?6, category = ?7, user_id = ?8,
                    updated_at = CURRENT_TIMESTAMP
             WHERE id = ?9",
            params![
                &self.name,
                &self.lowercase_name,
                &self.maintainer,
                &self.description,
                &self.source_url,
                &self.issues_url,
                &self.category,
                &self.user_id,
                id,
            ],
        )
        .map_err(|e| self.map_write_error(e))?;

        Ok(())
    }

    /// Set maintainer and description from published metadata
    ///
    /// Every other column keeps whatever the database currently holds.
    pub fn update_maintainer(
        conn: &Connection,
        id: i64,
        maintainer: &str,
        description: &str,
    ) -> Result<()> {
        validate_present("maintainer", maintainer)?;
        validate_present("description", description)?;

        let changed = conn.execute(
            "UPDATE cookbooks SET maintainer = ?1, description = ?2, updated_at = CURRENT_TIMESTAMP
             WHERE id = ?3",
            params![maintainer, description, id],
        )?;
        if changed != 1 {
            return Err(Error::NotFound(format!("cookbook {}", id)));
        }
        Ok(())
    }

    fn map_write_error(&self, err: rusqlite::Error) -> Error {
        if is_unique_violation(&err) {
            Error::PublishConflict(format!("cookbook name '{}' is already taken", self.name))
        } else {
            Error::Database(err)
        }
    }

    /// Find a cookbook by ID
    pub fn find_by_id(conn: &Connection, id: i64) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!("SELECT {COLUMNS} FROM cookbooks WHERE id = ?1"))?;
        let cookbook = stmt.query_row([id], Self::from_row).optional()?;
        Ok(cookbook)
    }

    /// Find a cookbook by name, ignoring case
    pub fn find_by_name(conn: &Connection, name: &str) -> Result<Option<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM cookbooks WHERE lowercase_name = ?1"
        ))?;
        let cookbook = stmt
            .query_row([name.to_lowercase()], Self::from_row)
            .optional()?;
        Ok(cookbook)
    }

    /// Find every cookbook whose name exactly matches one of `names`, in one query
    pub fn find_by_names(conn: &Connection, names: &[String]) -> Result<Vec<Self>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = vec!["?"; names.len()].join(", ");
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM cookbooks WHERE name IN ({placeholders})"
        ))?;

        let cookbooks = stmt
            .query_map(params_from_iter(names.iter()), Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(cookbooks)
    }

    /// List cookbooks in the requested order
    pub fn list_ordered(conn: &Connection, ordering: CookbookOrdering) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM cookbooks ORDER BY {}",
            ordering.order_clause()
        ))?;

        let cookbooks = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(cookbooks)
    }

    /// Cookbooks updated within the last two weeks
    pub fn recently_updated(conn: &Connection) -> Result<Vec<Self>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {COLUMNS} FROM cookbooks
             WHERE updated_at > datetime('now', '-14 days')
             ORDER BY updated_at DESC, id DESC"
        ))?;

        let cookbooks = stmt
            .query_map([], Self::from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(cookbooks)
    }

    /// Delete a cookbook and, through cascades, all of its versions
    pub fn delete(conn: &Connection, id: i64) -> Result<()> {
        conn.execute("DELETE FROM cookbooks WHERE id = ?1", [id])?;
        Ok(())
    }

    /// URL-friendly form of the name
    pub fn to_param(&self) -> String {
        let mut param = String::with_capacity(self.name.len());
        for c in self.name.to_lowercase().chars() {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                param.push(c);
            } else if !param.ends_with('-') {
                param.push('-');
            }
        }
        param.trim_matches('-').to_string()
    }

    /// All versions, newest first
    pub fn versions(&self, conn: &Connection) -> Result<Vec<CookbookVersion>> {
        CookbookVersion::find_by_cookbook(conn, self.require_id()?)
    }

    /// The most recently created version
    pub fn latest_version(&self, conn: &Connection) -> Result<Option<CookbookVersion>> {
        CookbookVersion::find_latest(conn, self.require_id()?)
    }

    /// Resolve a version token: `"latest"` or a version with `_` standing in for `.`
    pub fn get_version(&self, conn: &Connection, token: &str) -> Result<CookbookVersion> {
        let version = CookbookVersion::version_from_param(token);

        let found = if version == "latest" {
            self.latest_version(conn)?
        } else {
            CookbookVersion::find_by_cookbook_and_version(conn, self.require_id()?, &version)?
        };

        found.ok_or_else(|| {
            Error::NotFound(format!("version {} of cookbook {}", version, self.name))
        })
    }

    /// Platforms declared by the latest version
    pub fn supported_platforms(&self, conn: &Connection) -> Result<Vec<SupportedPlatform>> {
        match self.latest_version(conn)? {
            Some(latest) => latest.supported_platforms(conn),
            None => Ok(Vec::new()),
        }
    }

    /// Dependencies declared by the latest version
    pub fn dependencies(&self, conn: &Connection) -> Result<Vec<CookbookDependency>> {
        match self.latest_version(conn)? {
            Some(latest) => latest.dependencies(conn),
            None => Ok(Vec::new()),
        }
    }

    /// Whether `user_id` follows this cookbook
    pub fn followed_by(&self, conn: &Connection, user_id: i64) -> Result<bool> {
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM cookbook_followers WHERE cookbook_id = ?1 AND user_id = ?2",
            params![self.require_id()?, user_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn require_id(&self) -> Result<i64> {
        self.id
            .ok_or_else(|| Error::NotFound(format!("cookbook {} has not been saved", self.name)))
    }

    /// Convert a database row to a Cookbook
    pub(crate) fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: Some(row.get(0)?),
            name: row.get(1)?,
            lowercase_name: row.get(2)?,
            maintainer: row.get(3)?,
            description: row.get(4)?,
            source_url: row.get(5)?,
            issues_url: row.get(6)?,
            category: row.get(7)?,
            user_id: row.get(8)?,
            download_count: row.get(9)?,
            created_at: row.get(10)?,
            updated_at: row.get(11)?,
        })
    }
}

/// Optional URLs must be absolute http(s) URLs when set
fn validate_url(field: &str, value: Option<&str>) -> Result<()> {
    let Some(value) = value.filter(|v| !v.trim().is_empty()) else {
        return Ok(());
    };

    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(Error::invalid(field, format!("'{}' is not a valid URL", value))),
    }
}
