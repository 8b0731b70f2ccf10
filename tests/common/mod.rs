// tests/common/mod.rs

//! Shared test utilities and helpers for integration tests.

#![allow(dead_code)]

use larder::db;
use larder::db::models::Cookbook;
use larder::{Metadata, NoopNotifier, NotificationTrigger, PublishNotice, Readme};
use rusqlite::Connection;
use std::collections::BTreeMap;
use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::TempDir;

/// Create an initialized on-disk registry database.
///
/// Returns (TempDir, db_path) - keep the TempDir alive to prevent cleanup.
pub fn setup_db() -> (TempDir, String) {
    let temp_dir = tempfile::tempdir().unwrap();
    let db_path = temp_dir
        .path()
        .join("larder.db")
        .to_str()
        .unwrap()
        .to_string();

    db::init(&db_path).unwrap();
    (temp_dir, db_path)
}

pub fn metadata(version: &str, platforms: &[(&str, &str)], deps: &[(&str, &str)]) -> Metadata {
    let to_map = |pairs: &[(&str, &str)]| -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    };

    Metadata {
        name: "apache2".to_string(),
        version: version.to_string(),
        maintainer: format!("Maintainer of {version}"),
        description: format!("Apache web server, release {version}"),
        license: Some("Apache-2.0".to_string()),
        platforms: to_map(platforms),
        dependencies: to_map(deps),
    }
}

pub fn readme() -> Readme {
    Readme::new("# apache2\n\nInstalls and configures Apache.", "md")
}

/// Register a cookbook with a single 0.1.0 version and no dependencies
pub fn register(conn: &mut Connection, name: &str) -> Cookbook {
    let mut meta = metadata("0.1.0", &[], &[]);
    meta.name = name.to_string();

    let mut cookbook = Cookbook::new(name, &meta.maintainer, &meta.description);
    larder::create_cookbook(
        conn,
        &mut cookbook,
        &meta,
        &format!("https://artifacts.example.com/{name}-0.1.0.tgz"),
        &readme(),
        &NoopNotifier,
    )
    .unwrap();
    cookbook
}

pub fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

/// Notifier that remembers every notice it was handed
#[derive(Default)]
pub struct RecordingNotifier {
    pub notices: Mutex<Vec<PublishNotice>>,
}

impl RecordingNotifier {
    pub fn notices(&self) -> Vec<PublishNotice> {
        self.notices.lock().unwrap().clone()
    }
}

impl NotificationTrigger for RecordingNotifier {
    fn cookbook_published(&self, notice: &PublishNotice) -> larder::Result<()> {
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Notifier whose queue is always unavailable
pub struct FailingNotifier;

impl NotificationTrigger for FailingNotifier {
    fn cookbook_published(&self, _notice: &PublishNotice) -> larder::Result<()> {
        Err(larder::Error::NotifyFailed("queue unavailable".to_string()))
    }
}

/// A gzipped cookbook tarball with a `./` root entry and an executable file
pub fn cookbook_tarball() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    for dir in ["./", "./apache2/", "./apache2/recipes/"] {
        let mut header = tar::Header::new_gnu();
        header.set_path(dir).unwrap();
        header.set_entry_type(tar::EntryType::Directory);
        header.set_mode(0o777);
        header.set_size(0);
        header.set_cksum();
        builder.append(&header, std::io::empty()).unwrap();
    }

    let files: [(&str, &[u8], u32); 3] = [
        ("./apache2/metadata.json", br#"{"name":"apache2","version":"1.0.0"}"#, 0o644),
        ("./apache2/recipes/default.rb", b"package 'apache2'\n", 0o664),
        ("./apache2/run.sh", b"#!/bin/sh\nexec apache2\n", 0o4755),
    ];
    for (path, data, mode) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(path).unwrap();
        header.set_size(data.len() as u64);
        header.set_mode(mode);
        header.set_cksum();
        builder.append(&header, data).unwrap();
    }

    gzip(&builder.into_inner().unwrap())
}

/// A gzipped tarball holding one regular file with raw path bytes.
/// Bypasses the tar crate's own path validation.
pub fn raw_path_tarball(path_bytes: &[u8], data: &[u8]) -> Vec<u8> {
    let mut header = [0u8; 512];

    let len = path_bytes.len().min(100);
    header[..len].copy_from_slice(&path_bytes[..len]);
    header[100..108].copy_from_slice(b"0000644\0");
    let size_str = format!("{:011o}\0", data.len());
    header[124..136].copy_from_slice(size_str.as_bytes());
    header[156] = b'0';

    header[148..156].copy_from_slice(b"        ");
    let cksum: u32 = header.iter().map(|&b| u32::from(b)).sum();
    let cksum_str = format!("{cksum:06o}\0 ");
    header[148..156].copy_from_slice(cksum_str.as_bytes());

    let mut tar_data = Vec::new();
    tar_data.extend_from_slice(&header);
    tar_data.extend_from_slice(data);
    let padding = (512 - (data.len() % 512)) % 512;
    tar_data.extend(std::iter::repeat_n(0u8, padding));
    tar_data.extend(std::iter::repeat_n(0u8, 1024));

    gzip(&tar_data)
}

pub fn gzip(bytes: &[u8]) -> Vec<u8> {
    let mut encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

pub fn write_file(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, bytes).unwrap();
    path
}

/// Write an executable shell script standing in for the linter
pub fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Serve a single HTTP response on a loopback port and return its URL
pub fn serve_once(status: &str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let status = status.to_string();

    std::thread::spawn(move || {
        if let Ok((mut stream, _)) = listener.accept() {
            let mut request = [0u8; 4096];
            let _ = stream.read(&mut request);
            let head = format!(
                "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                body.len()
            );
            let _ = stream.write_all(head.as_bytes());
            let _ = stream.write_all(&body);
        }
    });

    format!("http://{addr}/cookbooks/apache2.tgz")
}
