// src/cli.rs
//! CLI definitions for the Larder registry
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "larder")]
#[command(author = "Larder Contributors")]
#[command(version)]
#[command(about = "Cookbook registry: artifact review and version publishing", long_about = None)]
pub struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path (overrides the configuration file)
    #[arg(short, long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize the registry database
    Init,

    /// Register a new cookbook together with its first version
    Create {
        /// Path to the cookbook's metadata.json
        metadata: PathBuf,

        /// Tarball reference stored with the version
        tarball: String,

        /// Readme file (extension determines its format)
        #[arg(short, long)]
        readme: Option<PathBuf>,

        /// Cookbook name (defaults to the name in metadata.json)
        #[arg(short, long)]
        name: Option<String>,

        /// Owning user id
        #[arg(long)]
        user_id: Option<i64>,

        /// Source code URL
        #[arg(long)]
        source_url: Option<String>,

        /// Issue tracker URL
        #[arg(long)]
        issues_url: Option<String>,

        /// Category name
        #[arg(long)]
        category: Option<String>,
    },

    /// Publish a new version of an existing cookbook
    Publish {
        /// Cookbook name
        cookbook: String,

        /// Path to the cookbook's metadata.json
        metadata: PathBuf,

        /// Tarball reference stored with the version
        tarball: String,

        /// Readme file (extension determines its format)
        #[arg(short, long)]
        readme: Option<PathBuf>,
    },

    /// Fetch, unpack and lint an artifact, then report the verdict
    Review {
        /// Artifact URL or local path
        url: String,
    },

    /// Show a cookbook version
    Show {
        /// Cookbook name
        cookbook: String,

        /// Version token: "latest" or a version such as 2_0_1
        #[arg(default_value = "latest")]
        version: String,
    },

    /// List cookbooks
    List {
        /// Ordering: recently_updated, recently_added, most_downloaded, most_followed, name
        #[arg(short, long, default_value = "name")]
        order: String,

        /// Only cookbooks updated in the last two weeks
        #[arg(long)]
        recent: bool,
    },
}
