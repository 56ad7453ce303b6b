//! core::deps
//!
//! Dependency graph reader.
//!
//! A node declares the nodes it depends on as git submodules in its
//! `.gitmodules` file:
//!
//! ```text
//! [submodule "Other Idea"]
//!     path = Other Idea
//!     url = ../Other Idea
//! ```
//!
//! Each entry becomes a [`DependencyReference`]. Resolving an entry to a local
//! directory is delegated to a [`PathResolver`]; entries that cannot be
//! resolved stay in the list with `resolved_local_path = None`. They are dead
//! edges, not errors.
//!
//! # Resolution order ([`SiblingResolver`])
//!
//! 1. `url` is a local path (absolute, `file://`, or relative to the declaring
//!    node) naming an existing directory: use it.
//! 2. `url` is remote: use the workspace directory whose name equals the last
//!    segment of `path`, if it exists.
//! 3. Otherwise unresolved.

use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, warn};

use crate::core::types::is_remote_url;

/// Name of the dependency declaration file.
pub const DECLARATION_FILE: &str = ".gitmodules";

/// Errors from reading or rewriting declarations.
#[derive(Debug, Error)]
pub enum DepsError {
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
}

/// One declared edge of the dependency graph.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DependencyReference {
    /// Identifier of the declaration block. Not unique across the workspace.
    pub name: String,
    /// Relative path recorded in the declaration.
    pub declared_path: String,
    /// Remote URL or local filesystem path.
    pub remote_url: String,
    /// Local directory of the dependency, when it could be found.
    pub resolved_local_path: Option<PathBuf>,
}

impl DependencyReference {
    /// Whether traversal can follow this edge.
    pub fn is_navigable(&self) -> bool {
        self.resolved_local_path.is_some()
    }

    /// Whether the declaration already records a remote URL.
    pub fn is_remote(&self) -> bool {
        is_remote_url(&self.remote_url)
    }
}

/// Strategy turning a declaration into a local directory.
pub trait PathResolver: Send + Sync {
    /// Resolve a declaration made by the node at `node_dir`.
    fn resolve(&self, node_dir: &Path, declared_path: &str, url: &str) -> Option<PathBuf>;
}

/// Default resolver: local paths as-is, remote URLs to a same-named sibling.
#[derive(Debug, Clone, Default)]
pub struct SiblingResolver {
    workspace_root: Option<PathBuf>,
}

impl SiblingResolver {
    /// Resolve siblings inside `root` instead of the declaring node's parent.
    pub fn with_workspace_root(root: impl Into<PathBuf>) -> Self {
        Self {
            workspace_root: Some(root.into()),
        }
    }

    fn local_path(node_dir: &Path, url: &str) -> Option<PathBuf> {
        let raw = url.strip_prefix("file://").unwrap_or(url);
        let candidate = Path::new(raw);
        let candidate = if candidate.is_absolute() {
            candidate.to_path_buf()
        } else {
            node_dir.join(candidate)
        };
        candidate
            .is_dir()
            .then(|| fs::canonicalize(&candidate).unwrap_or(candidate))
    }
}

impl PathResolver for SiblingResolver {
    fn resolve(&self, node_dir: &Path, declared_path: &str, url: &str) -> Option<PathBuf> {
        if !is_remote_url(url) {
            return Self::local_path(node_dir, url);
        }

        let segment = declared_path
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())?;
        let root = match &self.workspace_root {
            Some(root) => root.clone(),
            None => node_dir.parent()?.to_path_buf(),
        };
        let sibling = root.join(segment);
        sibling.is_dir().then_some(sibling)
    }
}

/// A raw `[submodule]` block before resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredEntry {
    pub name: String,
    pub path: Option<String>,
    pub url: Option<String>,
}

fn section_name(line: &str) -> Option<Option<&str>> {
    let inner = line.strip_prefix('[')?.strip_suffix(']')?.trim();
    let submodule = inner
        .strip_prefix("submodule")
        .map(str::trim)
        .and_then(|rest| rest.strip_prefix('"'))
        .and_then(|rest| rest.strip_suffix('"'));
    Some(submodule)
}

fn key_value(line: &str) -> Option<(String, &str)> {
    let (key, value) = line.split_once('=')?;
    Some((key.trim().to_ascii_lowercase(), value.trim()))
}

fn is_comment(line: &str) -> bool {
    line.is_empty() || line.starts_with('#') || line.starts_with(';')
}

/// Parse declaration text into entries, in file order.
///
/// Sections other than `[submodule "..."]` are ignored.
pub fn parse_declarations(text: &str) -> Vec<DeclaredEntry> {
    let mut entries: Vec<DeclaredEntry> = Vec::new();
    let mut in_submodule = false;

    for line in text.lines().map(str::trim) {
        if is_comment(line) {
            continue;
        }
        if let Some(section) = section_name(line) {
            in_submodule = section.is_some();
            if let Some(name) = section {
                entries.push(DeclaredEntry {
                    name: name.to_string(),
                    path: None,
                    url: None,
                });
            }
            continue;
        }
        if !in_submodule {
            continue;
        }
        let (Some((key, value)), Some(entry)) = (key_value(line), entries.last_mut()) else {
            continue;
        };
        match key.as_str() {
            "path" => entry.path = Some(value.to_string()),
            "url" => entry.url = Some(value.to_string()),
            _ => {}
        }
    }

    entries
}

/// Read and resolve the dependencies declared by the node at `node_dir`.
///
/// A missing declaration file yields an empty list. Incomplete entries are
/// skipped with a warning; unresolvable ones are kept as dead edges.
pub fn read_dependencies(
    node_dir: &Path,
    resolver: &dyn PathResolver,
) -> Result<Vec<DependencyReference>, DepsError> {
    let path = node_dir.join(DECLARATION_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(source) => return Err(DepsError::ReadError { path, source }),
    };

    let mut deps = Vec::new();
    for entry in parse_declarations(&text) {
        let (Some(declared_path), Some(remote_url)) = (entry.path, entry.url) else {
            warn!(node = %node_dir.display(), submodule = %entry.name, "incomplete dependency declaration skipped");
            continue;
        };

        let resolved_local_path = resolver.resolve(node_dir, &declared_path, &remote_url);
        match &resolved_local_path {
            Some(local) => debug!(submodule = %entry.name, path = %local.display(), "dependency resolved"),
            None => warn!(
                node = %node_dir.display(),
                submodule = %entry.name,
                url = %remote_url,
                "dependency has no local directory, not navigable"
            ),
        }

        deps.push(DependencyReference {
            name: entry.name,
            declared_path,
            remote_url,
            resolved_local_path,
        });
    }

    Ok(deps)
}

/// Rewrite the `url` of submodule `name` in declaration text.
///
/// Every other byte of the text is preserved. Returns `None` if no such
/// submodule (or no `url` key in it) exists.
pub fn rewrite_url_in(text: &str, name: &str, new_url: &str) -> Option<String> {
    let mut out = String::with_capacity(text.len() + new_url.len());
    let mut in_target = false;
    let mut replaced = false;

    for line in text.split_inclusive('\n') {
        let trimmed = line.trim();
        if let Some(section) = section_name(trimmed) {
            in_target = section == Some(name);
        } else if in_target && !replaced && !is_comment(trimmed) {
            if let Some((key, _)) = key_value(trimmed) {
                if key == "url" {
                    let indent = &line[..line.len() - line.trim_start().len()];
                    let ending = if line.ends_with("\r\n") {
                        "\r\n"
                    } else if line.ends_with('\n') {
                        "\n"
                    } else {
                        ""
                    };
                    out.push_str(&format!("{indent}url = {new_url}{ending}"));
                    replaced = true;
                    continue;
                }
            }
        }
        out.push_str(line);
    }

    replaced.then_some(out)
}

/// Rewrite the `url` of submodule `name` in the node's declaration file.
///
/// Returns `Ok(false)` if the file or entry does not exist, `Ok(true)` when the
/// file was changed.
pub fn rewrite_url(node_dir: &Path, name: &str, new_url: &str) -> Result<bool, DepsError> {
    let path = node_dir.join(DECLARATION_FILE);
    let text = match fs::read_to_string(&path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
        Err(source) => return Err(DepsError::ReadError { path, source }),
    };

    match rewrite_url_in(&text, name, new_url) {
        Some(updated) if updated != text => {
            fs::write(&path, updated).map_err(|source| DepsError::WriteError { path, source })?;
            Ok(true)
        }
        _ => Ok(false),
    }
}
