//! core::metadata::schema
//!
//! The `.udd` node record.
//!
//! # Schema Design
//!
//! The file is shared with other tools (the workspace scanner, the node
//! creation flow), so:
//! - Field names are camelCase on disk
//! - Fields this crate does not know about are preserved on rewrite
//! - `repoUrl` absent (or blank) means unpublished
//!
//! # Publication Fields
//!
//! Only the publisher writes `repoUrl`/`siteUrl` and only the unpublisher
//! clears them. Everything else is owned elsewhere.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::types::{NodeId, PublicationRecord, TypeError};

/// Node type recorded when a record omits it.
pub const DEFAULT_NODE_KIND: &str = "dream";

/// Errors from metadata operations.
#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to parse metadata: {0}")]
    ParseError(String),

    #[error("failed to serialize metadata: {0}")]
    SerializeError(String),

    #[error("invalid metadata value: {0}")]
    InvalidValue(String),

    #[error("type validation failed: {0}")]
    TypeError(#[from] TypeError),
}

fn default_kind() -> String {
    DEFAULT_NODE_KIND.to_string()
}

/// The per-node metadata record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeMetadata {
    /// Immutable node identity.
    pub id: NodeId,

    /// Human-readable title.
    pub title: String,

    /// Node type (`dream`, `dreamer`, ...).
    #[serde(rename = "type", default = "default_kind")]
    pub kind: String,

    /// Relative path of the node's primary media item.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dream_talk: Option<String>,

    /// Remote repository address, present only when published.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repo_url: Option<String>,

    /// Hosted site address, present only when site hosting succeeded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site_url: Option<String>,

    /// Ids of nodes this node depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,

    /// Ids of nodes depending on this node.
    #[serde(default)]
    pub dependents: Vec<String>,

    /// Fields owned by other tools, carried through untouched.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

impl NodeMetadata {
    /// Create an unpublished record with a fresh id.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            id: NodeId::new(),
            title: title.into(),
            kind: default_kind(),
            dream_talk: None,
            repo_url: None,
            site_url: None,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            extra: serde_json::Map::new(),
        }
    }

    /// Whether the node currently has a publication.
    pub fn is_published(&self) -> bool {
        self.repo_url
            .as_deref()
            .is_some_and(|url| !url.trim().is_empty())
    }

    /// The node's publication record, if published.
    pub fn publication(&self, deep_link_prefix: &str) -> Option<PublicationRecord> {
        let repo_url = self.repo_url.as_deref().filter(|u| !u.trim().is_empty())?;
        PublicationRecord::new(repo_url, self.site_url.clone(), deep_link_prefix).ok()
    }

    /// Record a publication.
    pub fn set_publication(&mut self, record: &PublicationRecord) {
        self.repo_url = Some(record.repo_url.clone());
        self.site_url = record.site_url.clone();
    }

    /// Clear publication state. Identity and everything else stay untouched.
    pub fn clear_publication(&mut self) {
        self.repo_url = None;
        self.site_url = None;
    }

    /// Serialize to pretty-printed JSON with a trailing newline.
    pub fn to_json(&self) -> Result<String, MetadataError> {
        let mut json = serde_json::to_string_pretty(self)
            .map_err(|e| MetadataError::SerializeError(e.to_string()))?;
        json.push('\n');
        Ok(json)
    }

    fn validate(&self) -> Result<(), MetadataError> {
        if self.title.trim().is_empty() {
            return Err(MetadataError::InvalidValue("title cannot be empty".into()));
        }
        Ok(())
    }
}

/// Parse and validate a `.udd` record.
pub fn parse_metadata(json: &str) -> Result<NodeMetadata, MetadataError> {
    let meta: NodeMetadata =
        serde_json::from_str(json).map_err(|e| MetadataError::ParseError(e.to_string()))?;
    meta.validate()?;
    Ok(meta)
}
