//! core::metadata::store
//!
//! Metadata storage in the node directory.
//!
//! # Architecture
//!
//! The record is the `.udd` file at the root of the node's working tree.
//! Writes go to a temp file in the same directory and are renamed into place
//! so a crash never leaves a truncated record behind.
//!
//! There is no locking. Callers read immediately before mutating and write
//! immediately after; safety comes from publication requests being
//! serialized (see [`crate::engine::batch`]).
//!
//! # Example
//!
//! ```ignore
//! use interbrain_publish::core::metadata::MetadataStore;
//!
//! let store = MetadataStore::new(node_dir);
//! let mut meta = store.read()?;
//! meta.clear_publication();
//! store.write(&meta)?;
//! ```

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::schema::{parse_metadata, MetadataError, NodeMetadata};

/// Name of the metadata file inside a node directory.
pub const METADATA_FILE: &str = ".udd";

/// Errors from metadata storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The directory has no metadata file.
    #[error("no {METADATA_FILE} metadata in {0}")]
    NotFound(PathBuf),

    #[error("failed to read {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid metadata in {path}: {source}")]
    Invalid {
        path: PathBuf,
        source: MetadataError,
    },
}

/// Metadata store for one node directory.
#[derive(Debug, Clone, Copy)]
pub struct MetadataStore<'a> {
    dir: &'a Path,
}

impl<'a> MetadataStore<'a> {
    /// Create a store for the node rooted at `dir`.
    pub fn new(dir: &'a Path) -> Self {
        Self { dir }
    }

    /// Path of the metadata file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(METADATA_FILE)
    }

    /// Whether the directory carries a metadata file at all.
    pub fn exists(&self) -> bool {
        self.path().is_file()
    }

    /// Read and validate the record.
    ///
    /// # Errors
    ///
    /// - [`StoreError::NotFound`] if the directory is not a node
    /// - [`StoreError::Invalid`] if the JSON is malformed
    pub fn read(&self) -> Result<NodeMetadata, StoreError> {
        let path = self.path();
        let json = match fs::read_to_string(&path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(self.dir.to_path_buf()))
            }
            Err(source) => return Err(StoreError::ReadError { path, source }),
        };
        parse_metadata(&json).map_err(|source| StoreError::Invalid { path, source })
    }

    /// Write the record atomically (temp file, then rename).
    pub fn write(&self, metadata: &NodeMetadata) -> Result<(), StoreError> {
        let path = self.path();
        let json = metadata.to_json().map_err(|source| StoreError::Invalid {
            path: path.clone(),
            source,
        })?;

        let temp_path = self.dir.join(format!("{METADATA_FILE}.tmp"));
        let write_err = |source| StoreError::WriteError {
            path: temp_path.clone(),
            source,
        };
        let mut file = fs::File::create(&temp_path).map_err(write_err)?;
        file.write_all(json.as_bytes()).map_err(write_err)?;
        file.sync_all().map_err(write_err)?;

        fs::rename(&temp_path, &path).map_err(|source| StoreError::WriteError { path, source })
    }
}
