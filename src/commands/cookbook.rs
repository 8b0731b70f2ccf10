// src/commands/cookbook.rs
//! Cookbook publishing and query commands

use anyhow::{Context, Result};
use larder::db::models::{Cookbook, CookbookOrdering, CookbookVersion};
use larder::{LarderConfig, Metadata, Readme, SpoolNotifier};
use std::path::Path;
use tracing::info;

/// Optional descriptive fields for a new cookbook
pub struct NewCookbook {
    pub name: Option<String>,
    pub user_id: Option<i64>,
    pub source_url: Option<String>,
    pub issues_url: Option<String>,
    pub category: Option<String>,
}

fn load_readme(path: Option<&Path>) -> Result<Readme> {
    match path {
        Some(path) => Readme::from_path(path)
            .with_context(|| format!("Failed to read readme {}", path.display())),
        None => Ok(Readme::default()),
    }
}

fn load_metadata(path: &Path) -> Result<Metadata> {
    Metadata::from_path(path).with_context(|| format!("Failed to read metadata {}", path.display()))
}

/// Register a new cookbook with its first version
pub fn cmd_create(
    config: &LarderConfig,
    metadata_path: &Path,
    tarball: &str,
    readme_path: Option<&Path>,
    new: NewCookbook,
) -> Result<()> {
    let metadata = load_metadata(metadata_path)?;
    let readme = load_readme(readme_path)?;

    let name = new.name.unwrap_or_else(|| metadata.name.clone());
    info!("Creating cookbook {} at {}", name, metadata.version);

    let mut cookbook = Cookbook::new(&name, &metadata.maintainer, &metadata.description);
    cookbook.user_id = new.user_id;
    cookbook.source_url = new.source_url;
    cookbook.issues_url = new.issues_url;
    cookbook.category = new.category;

    let mut conn = larder::db::open(&config.storage.db_path)?;
    let notifier = SpoolNotifier::new(config.spool_path());
    let version =
        larder::create_cookbook(&mut conn, &mut cookbook, &metadata, tarball, &readme, &notifier)?;

    println!("Created cookbook: {}", cookbook.name);
    print_version(&conn, &version)?;
    Ok(())
}

/// Publish a new version of an existing cookbook
pub fn cmd_publish(
    config: &LarderConfig,
    name: &str,
    metadata_path: &Path,
    tarball: &str,
    readme_path: Option<&Path>,
) -> Result<()> {
    let metadata = load_metadata(metadata_path)?;
    let readme = load_readme(readme_path)?;

    let mut conn = larder::db::open(&config.storage.db_path)?;
    let mut cookbook = Cookbook::find_by_name(&conn, name)?
        .ok_or_else(|| anyhow::anyhow!("Cookbook '{}' not found", name))?;

    info!("Publishing {} {}", cookbook.name, metadata.version);
    let notifier = SpoolNotifier::new(config.spool_path());
    let version =
        larder::publish_version(&mut conn, &mut cookbook, &metadata, tarball, &readme, &notifier)?;

    println!("Published: {} {}", cookbook.name, version.version);
    print_version(&conn, &version)?;
    Ok(())
}

/// Show one version of a cookbook
pub fn cmd_show(config: &LarderConfig, name: &str, token: &str) -> Result<()> {
    let conn = larder::db::open(&config.storage.db_path)?;
    let cookbook = Cookbook::find_by_name(&conn, name)?
        .ok_or_else(|| anyhow::anyhow!("Cookbook '{}' not found", name))?;
    let version = cookbook.get_version(&conn, token)?;

    println!("Cookbook: {}", cookbook.name);
    println!("  Maintainer: {}", cookbook.maintainer);
    println!("  Description: {}", cookbook.description);
    if let Some(url) = &cookbook.source_url {
        println!("  Source: {}", url);
    }
    if let Some(url) = &cookbook.issues_url {
        println!("  Issues: {}", url);
    }
    print_version(&conn, &version)?;

    let versions = cookbook.versions(&conn)?;
    let all: Vec<&str> = versions.iter().map(|v| v.version.as_str()).collect();
    println!("  All versions: {}", all.join(", "));
    Ok(())
}

/// List cookbooks
pub fn cmd_list(config: &LarderConfig, order: &str, recent: bool) -> Result<()> {
    let conn = larder::db::open(&config.storage.db_path)?;
    let cookbooks = if recent {
        Cookbook::recently_updated(&conn)?
    } else {
        // Unknown orderings fall back to name order
        let ordering: CookbookOrdering = order.parse().unwrap_or_default();
        Cookbook::list_ordered(&conn, ordering)?
    };

    if cookbooks.is_empty() {
        println!("No cookbooks found");
        return Ok(());
    }

    for cookbook in cookbooks {
        let latest = cookbook
            .latest_version(&conn)?
            .map(|v| v.version)
            .unwrap_or_else(|| "-".to_string());
        println!("  {} {} ({})", cookbook.name, latest, cookbook.maintainer);
    }
    Ok(())
}

fn print_version(conn: &rusqlite::Connection, version: &CookbookVersion) -> Result<()> {
    println!("  Version: {}", version.version);
    if let Some(license) = &version.license {
        println!("  License: {}", license);
    }
    println!("  Tarball: {}", version.tarball);

    let platforms = version.supported_platforms(conn)?;
    if !platforms.is_empty() {
        println!("  Platforms:");
        for platform in platforms {
            println!("    {} {}", platform.name, platform.version_constraint);
        }
    }

    let dependencies = version.dependencies(conn)?;
    if !dependencies.is_empty() {
        println!("  Dependencies:");
        for dep in dependencies {
            let registered = if dep.cookbook_id.is_some() { "" } else { " (unregistered)" };
            println!("    {} {}{}", dep.name, dep.version_constraint, registered);
        }
    }
    Ok(())
}
