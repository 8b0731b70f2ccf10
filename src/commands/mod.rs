// src/commands/mod.rs
//! Command handlers for the Larder CLI

mod cookbook;
mod review;

pub use cookbook::{NewCookbook, cmd_create, cmd_list, cmd_publish, cmd_show};
pub use review::cmd_review;

use anyhow::Result;
use larder::LarderConfig;
use tracing::info;

/// Initialize the registry database
pub fn cmd_init(config: &LarderConfig) -> Result<()> {
    let db_path = &config.storage.db_path;
    info!("Initializing registry database at: {}", db_path);
    larder::db::init(db_path)?;
    println!("Database initialized successfully at: {}", db_path);
    Ok(())
}
