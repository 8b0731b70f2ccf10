// src/filesystem/mod.rs

//! Filesystem helpers for handling untrusted artifact content

pub mod path;

pub use path::{safe_join, sanitize_filename, sanitize_path};
