//! interbrain-publish - Recursive publication of DreamNode graphs
//!
//! A DreamNode is a git repository with a `.udd` metadata file. Nodes depend
//! on each other through `.gitmodules` declarations. This crate publishes a
//! node and every node it reaches: each one gets a hosted repository, a static
//! site on a disconnected branch and a one-click clone link, and local
//! dependency paths are rewritten to the published URLs.
//!
//! # Architecture
//!
//! - [`cli`] - Command-line interface layer (parses args, delegates to engine)
//! - [`engine`] - Recursive publisher, unpublisher and batch coordinator
//! - [`core`] - Domain types, metadata, dependency declarations, naming, config
//! - [`git`] - Single interface for all Git operations
//! - [`forge`] - Abstraction for the hosting backend (GitHub, mock)
//! - [`site`] - Static site rendering and deployment
//! - [`ui`] - User-facing output
//!
//! # Invariants
//!
//! 1. A node's id never changes across publish/unpublish cycles
//! 2. Publishing a published node never creates a second repository
//! 3. A failing dependency never fails the node that declares it
//! 4. Traversal terminates on cyclic graphs

pub mod cli;
pub mod core;
pub mod engine;
pub mod forge;
pub mod git;
pub mod site;
pub mod ui;
