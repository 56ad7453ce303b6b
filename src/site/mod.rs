//! site
//!
//! Static site generation for published nodes.
//!
//! # Modules
//!
//! - [`content`] - Content fallback chain and media inlining
//! - [`builder`] - Template rendering, bundle assembly, orphan-branch deploy
//!
//! Site failures never fail a publication; the publisher logs them and
//! keeps whatever site URL was recorded before.

pub mod builder;
pub mod content;

use std::path::PathBuf;

use thiserror::Error;

use crate::git::GitError;

pub use builder::{link_map, LinkMap, LinkTarget, SiteBuilder, SiteBundle};
pub use content::{ContentBlock, ContentResolver, FileContentResolver};

/// Errors from building or deploying a site.
#[derive(Debug, Error)]
pub enum SiteError {
    /// Tera template engine error.
    #[error("template engine error: {0}")]
    Template(#[from] tera::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Filesystem error.
    #[error("site io error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Deploy failed.
    #[error("deploy failed: {0}")]
    Git(#[from] GitError),
}
