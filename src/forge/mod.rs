//! forge
//!
//! Abstraction for remote hosting backends.
//!
//! # Architecture
//!
//! The `Forge` trait defines the interface for interacting with remote
//! hosting services: repository existence, creation and deletion, static-site
//! enablement and teardown. Commands use the [`create_forge`] factory function
//! rather than importing specific forge implementations directly.
//!
//! Forge failures never corrupt local state: the publisher writes a node's
//! metadata only after the remote side has answered.
//!
//! # Modules
//!
//! - `traits`: Core `Forge` trait and request/response types
//! - [`github`]: GitHub implementation using the REST API
//! - [`mock`]: Mock implementation for deterministic testing
//! - `factory`: Forge selection and creation

mod factory;
pub mod github;
pub mod mock;
mod traits;

pub use factory::{create_forge, valid_forge_names, ForgeProvider};
pub use traits::*;
