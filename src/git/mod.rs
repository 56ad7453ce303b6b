//! git
//!
//! Single interface for all Git operations.
//!
//! # Architecture
//!
//! This module is the **ONLY doorway** to Git. No other module imports
//! `git2`, and nothing shells out to the git CLI.
//!
//! # Responsibilities
//!
//! - Repository opening and initialization (working and bare)
//! - Staging and committing selected paths
//! - Orphan-branch commits for site bundles
//! - Remote add/remove/get-url
//! - Branch push, including forced pushes of disconnected history
//! - Status summaries

mod interface;

pub use interface::{
    Git, GitError, GitIdentity, WorktreeStatus, DEFAULT_AUTHOR_EMAIL, DEFAULT_AUTHOR_NAME,
};
