// src/db/models/mod.rs

//! Data models for Larder database entities
//!
//! This module defines Rust structs that correspond to database tables
//! and provides methods for creating, reading, updating, and deleting records.
//! Field-level validation lives with each model and reports
//! [`Error::PublishValidationFailed`](crate::Error::PublishValidationFailed).

mod collaborator;
mod cookbook;
mod cookbook_dependency;
mod cookbook_version;
mod follower;
mod supported_platform;

pub use collaborator::CookbookCollaborator;
pub use cookbook::{Cookbook, CookbookOrdering};
pub use cookbook_dependency::CookbookDependency;
pub use cookbook_version::CookbookVersion;
pub use follower::CookbookFollower;
pub use supported_platform::SupportedPlatform;

use crate::error::{Error, Result};
use regex::Regex;
use std::sync::LazyLock;

/// Version constraint as written in cookbook metadata (`>= 1.0`, `~> 2.4.1`, `= 0.1.0`)
static CONSTRAINT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(=|>=|>|<=|<|~>|!=)?\s*\d+(\.\d+){0,2}$").unwrap()
});

/// Check a version constraint string, reporting failures against `field`
pub(crate) fn validate_constraint(field: &str, constraint: &str) -> Result<()> {
    if CONSTRAINT_RE.is_match(constraint.trim()) {
        Ok(())
    } else {
        Err(Error::invalid(
            field,
            format!("'{}' is not a valid version constraint", constraint),
        ))
    }
}

/// Reject empty or whitespace-only values
pub(crate) fn validate_present(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::invalid(field, "can't be blank"))
    } else {
        Ok(())
    }
}
