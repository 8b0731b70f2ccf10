// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};
use larder::LarderConfig;

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = LarderConfig::load_or_default(cli.config.as_deref())?;
    if let Some(db_path) = cli.db_path {
        config.storage.db_path = db_path;
    }

    match cli.command {
        Commands::Init => commands::cmd_init(&config),
        Commands::Create {
            metadata,
            tarball,
            readme,
            name,
            user_id,
            source_url,
            issues_url,
            category,
        } => commands::cmd_create(
            &config,
            &metadata,
            &tarball,
            readme.as_deref(),
            commands::NewCookbook {
                name,
                user_id,
                source_url,
                issues_url,
                category,
            },
        ),
        Commands::Publish {
            cookbook,
            metadata,
            tarball,
            readme,
        } => commands::cmd_publish(&config, &cookbook, &metadata, &tarball, readme.as_deref()),
        Commands::Review { url } => commands::cmd_review(&config, &url),
        Commands::Show { cookbook, version } => commands::cmd_show(&config, &cookbook, &version),
        Commands::List { order, recent } => commands::cmd_list(&config, &order, recent),
    }
}
