// src/publish.rs

//! Version publishing
//!
//! Publishing writes a cookbook's new version together with its platform
//! and dependency rows in one immediate transaction. Either everything
//! lands (including the maintainer/description edit to the parent
//! cookbook) or nothing does. The notification is sent only after commit.

use crate::db;
use crate::db::models::{Cookbook, CookbookDependency, CookbookVersion, SupportedPlatform};
use crate::error::{Error, Result};
use crate::notify::{NotificationTrigger, PublishNotice};
use rusqlite::{Connection, Transaction};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use tracing::{debug, info, warn};

/// Parsed cookbook metadata (`metadata.json`)
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    pub version: String,
    #[serde(default)]
    pub maintainer: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub license: Option<String>,
    /// Platform name to version constraint
    #[serde(default)]
    pub platforms: BTreeMap<String, String>,
    /// Cookbook name to version constraint
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
}

impl Metadata {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| Error::invalid("metadata", format!("malformed metadata.json: {e}")))
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// A readme body and the extension naming its format
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Readme {
    pub contents: String,
    pub extension: String,
}

impl Readme {
    pub fn new(contents: impl Into<String>, extension: impl Into<String>) -> Self {
        Self {
            contents: contents.into(),
            extension: extension.into(),
        }
    }

    /// Read a readme file; `README.md` yields extension `md`, `README` none
    pub fn from_path(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Self::new(contents, extension))
    }
}

/// Publish a new version of an existing cookbook
///
/// Only the cookbook's maintainer and description are written; other
/// columns keep their stored values even if `cookbook` is stale. On success
/// `cookbook` reflects the committed maintainer/description. On any error
/// nothing was written and `cookbook` is left untouched.
pub fn publish_version(
    conn: &mut Connection,
    cookbook: &mut Cookbook,
    metadata: &Metadata,
    tarball: &str,
    readme: &Readme,
    notifier: &dyn NotificationTrigger,
) -> Result<CookbookVersion> {
    let id = cookbook.id.ok_or_else(|| {
        Error::NotFound(format!("cookbook {} has not been saved", cookbook.name))
    })?;

    let links = resolve_dependency_links(conn, metadata)?;

    let mut working = cookbook.clone();
    apply_metadata(&mut working, metadata);
    let version = db::transaction(conn, |tx| {
        Cookbook::update_maintainer(tx, id, &working.maintainer, &working.description)?;
        write_version(tx, &working, metadata, tarball, readme, &links)
    })?;

    cookbook.maintainer = working.maintainer;
    cookbook.description = working.description;
    info!("Published {} {}", cookbook.name, version.version);

    notify(notifier, cookbook, &version);
    Ok(version)
}

/// Register a new cookbook together with its first version
///
/// A cookbook never exists without a version, so both rows are written in
/// the same transaction. A case-insensitive name collision is a
/// [`Error::PublishConflict`].
pub fn create_cookbook(
    conn: &mut Connection,
    cookbook: &mut Cookbook,
    metadata: &Metadata,
    tarball: &str,
    readme: &Readme,
    notifier: &dyn NotificationTrigger,
) -> Result<CookbookVersion> {
    let links = resolve_dependency_links(conn, metadata)?;

    let mut working = cookbook.clone();
    let version = db::transaction(conn, |tx| {
        apply_metadata(&mut working, metadata);
        working.insert(tx)?;
        write_version(tx, &working, metadata, tarball, readme, &links)
    })?;

    *cookbook = working;
    info!("Created cookbook {} at {}", cookbook.name, version.version);

    notify(notifier, cookbook, &version);
    Ok(version)
}

fn apply_metadata(cookbook: &mut Cookbook, metadata: &Metadata) {
    cookbook.maintainer = metadata.maintainer.clone();
    cookbook.description = metadata.description.clone();
}

/// Map each declared dependency to the registered cookbook of that exact
/// name, looked up once before the transaction opens
fn resolve_dependency_links(
    conn: &Connection,
    metadata: &Metadata,
) -> Result<HashMap<String, i64>> {
    let names: Vec<String> = metadata.dependencies.keys().cloned().collect();

    let links: HashMap<String, i64> = Cookbook::find_by_names(conn, &names)?
        .into_iter()
        .filter_map(|c| c.id.map(|id| (c.name, id)))
        .collect();

    debug!(
        "Resolved {} of {} dependencies to registered cookbooks",
        links.len(),
        names.len()
    );
    Ok(links)
}

fn write_version(
    tx: &Transaction,
    cookbook: &Cookbook,
    metadata: &Metadata,
    tarball: &str,
    readme: &Readme,
    links: &HashMap<String, i64>,
) -> Result<CookbookVersion> {
    let cookbook_id = cookbook
        .id
        .ok_or_else(|| Error::InitError("Cookbook was not saved".to_string()))?;

    let mut version = CookbookVersion::new(cookbook_id, &metadata.version, tarball);
    version.license = metadata.license.clone();
    version.readme = readme.contents.clone();
    version.readme_extension = readme.extension.clone();
    let version_id = version.insert(tx)?;

    for (name, constraint) in &metadata.platforms {
        SupportedPlatform::new(version_id, name, constraint).insert(tx)?;
    }

    for (name, constraint) in &metadata.dependencies {
        let link = links.get(name).copied();
        CookbookDependency::new(version_id, name, constraint, link).insert(tx)?;
    }

    Ok(version)
}

/// Hand off the post-commit notice; the publish already stands either way
fn notify(notifier: &dyn NotificationTrigger, cookbook: &Cookbook, version: &CookbookVersion) {
    let Some(cookbook_id) = cookbook.id else {
        return;
    };

    let notice = PublishNotice {
        cookbook_id,
        cookbook: cookbook.name.clone(),
        version: version.version.clone(),
    };

    if let Err(e) = notifier.cookbook_published(&notice) {
        warn!(
            "Published {} {} but could not queue notification: {}",
            notice.cookbook, notice.version, e
        );
    }
}
