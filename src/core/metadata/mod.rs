//! core::metadata
//!
//! DreamNode metadata schema and storage.
//!
//! # Modules
//!
//! - [`schema`] - The `.udd` record
//! - [`store`] - Reading and writing the record inside a node directory
//!
//! # Architecture
//!
//! Every node directory carries one `.udd` JSON file. Publication state lives
//! in its `repoUrl` / `siteUrl` fields: both absent means unpublished.
//!
//! # Example
//!
//! ```
//! use interbrain_publish::core::metadata::{parse_metadata, NodeMetadata};
//!
//! let meta = NodeMetadata::new("My Idea");
//! let json = meta.to_json().unwrap();
//! let parsed = parse_metadata(&json).unwrap();
//! assert_eq!(parsed.id, meta.id);
//! assert!(!parsed.is_published());
//! ```

pub mod schema;
pub mod store;

pub use schema::{parse_metadata, MetadataError, NodeMetadata, DEFAULT_NODE_KIND};
pub use store::{MetadataStore, StoreError, METADATA_FILE};
