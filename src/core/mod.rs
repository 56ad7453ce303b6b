//! core
//!
//! Core domain types, schemas, and operations.
//!
//! # Modules
//!
//! - [`types`] - Strong types: NodeId, BranchName, PublicationRecord, etc.
//! - [`metadata`] - The `.udd` node record and its storage
//! - [`deps`] - Dependency declarations (`.gitmodules`) and their resolution
//! - [`node`] - A loaded node: metadata plus resolved dependencies
//! - [`naming`] - Remote-safe repository names and collision resolution
//! - [`config`] - Configuration schema and loading
//!
//! # Design Principles
//!
//! - Strong typing prevents invalid states at compile time
//! - Files owned by other tools are rewritten surgically, never regenerated
//! - Unresolvable dependency edges degrade, they do not fail

pub mod config;
pub mod deps;
pub mod metadata;
pub mod naming;
pub mod node;
pub mod types;
