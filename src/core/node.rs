//! core::node
//!
//! A DreamNode as seen by the publication engine: its metadata record, its
//! working directory, and its resolved dependency declarations.

use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::core::deps::{read_dependencies, DependencyReference, DepsError, PathResolver};
use crate::core::metadata::{MetadataStore, NodeMetadata, StoreError};
use crate::core::types::{NodeId, PublicationRecord};

/// Errors from loading a node.
#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Metadata(#[from] StoreError),

    #[error(transparent)]
    Dependencies(#[from] DepsError),
}

/// A loaded node.
#[derive(Debug, Clone)]
pub struct Node {
    pub metadata: NodeMetadata,
    pub local_path: PathBuf,
    pub dependencies: Vec<DependencyReference>,
}

impl Node {
    /// Load the node rooted at `dir`.
    pub fn load(dir: &Path, resolver: &dyn PathResolver) -> Result<Self, NodeError> {
        let metadata = MetadataStore::new(dir).read()?;
        let dependencies = read_dependencies(dir, resolver)?;
        Ok(Self {
            metadata,
            local_path: dir.to_path_buf(),
            dependencies,
        })
    }

    pub fn id(&self) -> NodeId {
        self.metadata.id
    }

    pub fn title(&self) -> &str {
        &self.metadata.title
    }

    pub fn is_published(&self) -> bool {
        self.metadata.is_published()
    }

    pub fn publication(&self, deep_link_prefix: &str) -> Option<PublicationRecord> {
        self.metadata.publication(deep_link_prefix)
    }
}
