// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: metadata.json path
fn metadata_arg() -> Arg {
    Arg::new("metadata")
        .required(true)
        .value_name("PATH")
        .help("Path to the cookbook's metadata.json")
}

/// Common argument: tarball reference
fn tarball_arg() -> Arg {
    Arg::new("tarball")
        .required(true)
        .help("Tarball reference stored with the version")
}

/// Common argument: readme file
fn readme_arg() -> Arg {
    Arg::new("readme")
        .short('r')
        .long("readme")
        .value_name("PATH")
        .help("Readme file (extension determines its format)")
}

fn build_cli() -> Command {
    Command::new("larder")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Larder Contributors")
        .about("Cookbook registry: artifact review and version publishing")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Path to a TOML configuration file"),
        )
        .arg(
            Arg::new("db_path")
                .short('d')
                .long("db-path")
                .value_name("PATH")
                .global(true)
                .help("Database path (overrides the configuration file)"),
        )
        .subcommand(Command::new("init").about("Initialize the registry database"))
        .subcommand(
            Command::new("create")
                .about("Register a new cookbook together with its first version")
                .arg(metadata_arg())
                .arg(tarball_arg())
                .arg(readme_arg())
                .arg(
                    Arg::new("name")
                        .short('n')
                        .long("name")
                        .help("Cookbook name (defaults to the name in metadata.json)"),
                )
                .arg(Arg::new("user_id").long("user-id").help("Owning user id"))
                .arg(Arg::new("source_url").long("source-url").help("Source code URL"))
                .arg(Arg::new("issues_url").long("issues-url").help("Issue tracker URL"))
                .arg(Arg::new("category").long("category").help("Category name")),
        )
        .subcommand(
            Command::new("publish")
                .about("Publish a new version of an existing cookbook")
                .arg(Arg::new("cookbook").required(true).help("Cookbook name"))
                .arg(metadata_arg())
                .arg(tarball_arg())
                .arg(readme_arg()),
        )
        .subcommand(
            Command::new("review")
                .about("Fetch, unpack and lint an artifact, then report the verdict")
                .arg(Arg::new("url").required(true).help("Artifact URL or local path")),
        )
        .subcommand(
            Command::new("show")
                .about("Show a cookbook version")
                .arg(Arg::new("cookbook").required(true).help("Cookbook name"))
                .arg(
                    Arg::new("version")
                        .default_value("latest")
                        .help("Version token: \"latest\" or a version such as 2_0_1"),
                ),
        )
        .subcommand(
            Command::new("list")
                .about("List cookbooks")
                .arg(
                    Arg::new("order")
                        .short('o')
                        .long("order")
                        .default_value("name")
                        .help("Ordering: recently_updated, recently_added, most_downloaded, most_followed, name"),
                )
                .arg(
                    Arg::new("recent")
                        .long("recent")
                        .action(clap::ArgAction::SetTrue)
                        .help("Only cookbooks updated in the last two weeks"),
                ),
        )
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    // Create man directory - use CARGO_MANIFEST_DIR which is always set by cargo
    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("larder.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
