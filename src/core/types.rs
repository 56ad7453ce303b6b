//! core::types
//!
//! Strong types for core domain concepts.
//!
//! # Types
//!
//! - [`NodeId`] - Immutable DreamNode identity (UUID)
//! - [`BranchName`] - Validated Git branch name
//! - [`RepoCoordinates`] - Host/owner/name triple parsed from a repository URL
//! - [`PublicationRecord`] - Result of publishing a node
//!
//! # Validation
//!
//! These types enforce validity at construction time. A publication record
//! with an empty repository URL cannot be represented.
//!
//! # Examples
//!
//! ```
//! use interbrain_publish::core::types::{BranchName, NodeId, PublicationRecord};
//!
//! let id = NodeId::new();
//! assert_eq!(NodeId::parse(&id.to_string()).unwrap(), id);
//!
//! let record = PublicationRecord::new(
//!     "https://github.com/octocat/my-idea",
//!     None,
//!     "app://clone?repo=",
//! )
//! .unwrap();
//! assert_eq!(record.deep_link, "app://clone?repo=github.com/octocat/my-idea");
//!
//! assert!(BranchName::new("gh-pages").is_ok());
//! assert!(BranchName::new("invalid..name").is_err());
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Errors from type validation.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TypeError {
    #[error("invalid node id: {0}")]
    InvalidNodeId(String),

    #[error("invalid branch name: {0}")]
    InvalidBranchName(String),

    #[error("invalid publication record: {0}")]
    InvalidPublication(String),
}

/// Identity of a DreamNode.
///
/// Assigned once by whoever creates the node. Publication never regenerates
/// it, so it survives any number of publish/unpublish cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(Uuid);

impl NodeId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse an id from its hyphenated string form.
    pub fn parse(s: &str) -> Result<Self, TypeError> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| TypeError::InvalidNodeId(format!("{s}: {e}")))
    }

    /// The underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for NodeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// A validated Git branch name.
///
/// Branch names must conform to Git's refname rules (see `git check-ref-format`):
/// - Cannot be empty
/// - Cannot start with `.` or `-`
/// - Cannot end with `.lock` or `/`
/// - Cannot contain `..`, `@{`, `//`, or ASCII control characters
/// - Cannot contain spaces, `~`, `^`, `:`, `\`, `?`, `*`, `[`
///
/// # Example
///
/// ```
/// use interbrain_publish::core::types::BranchName;
///
/// let name = BranchName::new("gh-pages").unwrap();
/// assert_eq!(name.as_str(), "gh-pages");
///
/// assert!(BranchName::new("").is_err());
/// assert!(BranchName::new("has space").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BranchName(String);

impl BranchName {
    /// Create a new validated branch name.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidBranchName` if the name violates Git's refname rules.
    pub fn new(name: impl Into<String>) -> Result<Self, TypeError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), TypeError> {
        let reject = |why: &str| Err(TypeError::InvalidBranchName(format!("'{name}' {why}")));

        if name.is_empty() {
            return reject("is empty");
        }
        if name == "@" {
            return reject("is reserved");
        }
        if name.starts_with('.') || name.starts_with('-') {
            return reject("cannot start with '.' or '-'");
        }
        if name.ends_with(".lock") || name.ends_with('/') {
            return reject("cannot end with '.lock' or '/'");
        }
        for seq in ["..", "@{", "//"] {
            if name.contains(seq) {
                return reject(&format!("cannot contain '{seq}'"));
            }
        }

        const INVALID_CHARS: [char; 8] = [' ', '~', '^', ':', '\\', '?', '*', '['];
        if name
            .chars()
            .any(|c| INVALID_CHARS.contains(&c) || c.is_ascii_control())
        {
            return reject("contains an invalid character");
        }

        if name
            .split('/')
            .any(|c| c.starts_with('.') || c.ends_with(".lock"))
        {
            return reject("has an invalid path component");
        }

        Ok(())
    }

    /// The conventional static-site branch, `gh-pages`.
    pub fn site_default() -> Self {
        Self("gh-pages".to_string())
    }

    /// Get the branch name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BranchName {
    type Error = TypeError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::new(s)
    }
}

impl From<BranchName> for String {
    fn from(name: BranchName) -> Self {
        name.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Host, owner and repository name extracted from a repository URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoCoordinates {
    pub host: String,
    pub owner: String,
    pub name: String,
}

impl RepoCoordinates {
    /// Parse a repository URL.
    ///
    /// Supports both HTTPS and SCP-style SSH forms:
    /// - `https://github.com/owner/repo(.git)`
    /// - `git@github.com:owner/repo(.git)`
    /// - `ssh://git@github.com/owner/repo(.git)`
    ///
    /// # Example
    ///
    /// ```
    /// use interbrain_publish::core::types::RepoCoordinates;
    ///
    /// let c = RepoCoordinates::parse("git@github.com:octocat/hello.git").unwrap();
    /// assert_eq!((c.host.as_str(), c.owner.as_str(), c.name.as_str()),
    ///            ("github.com", "octocat", "hello"));
    /// ```
    pub fn parse(url: &str) -> Option<Self> {
        let url = url.trim();
        let (host, path) = if let Some((_, rest)) = url.split_once("://") {
            let (authority, path) = rest.split_once('/')?;
            let host = authority.rsplit('@').next()?;
            (host, path)
        } else {
            let (authority, path) = url.split_once(':')?;
            let (_, host) = authority.split_once('@')?;
            (host, path)
        };

        let path = path.trim_end_matches('/');
        let path = path.strip_suffix(".git").unwrap_or(path);
        let (owner, name) = path.split_once('/')?;
        if host.is_empty() || owner.is_empty() || name.is_empty() || name.contains('/') {
            return None;
        }

        Some(Self {
            host: host.to_string(),
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl std::fmt::Display for RepoCoordinates {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.host, self.owner, self.name)
    }
}

/// Whether a dependency URL points at a remote host rather than a local path.
///
/// Network schemes (`https://`, `ssh://`, `git://`) and SCP-style
/// `user@host:path` strings count as remote. `file://` URLs and bare paths do not.
pub fn is_remote_url(url: &str) -> bool {
    let url = url.trim();
    if let Some((scheme, _)) = url.split_once("://") {
        return matches!(scheme, "http" | "https" | "ssh" | "git" | "git+ssh");
    }
    match url.split_once(':') {
        Some((authority, _)) => authority.contains('@') && !authority.contains('/'),
        None => false,
    }
}

/// The persisted result of publishing a node.
///
/// `repo_url` is never empty. `site_url` is only present when static-site
/// hosting was configured successfully; its absence does not make the node
/// unpublished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicationRecord {
    pub repo_url: String,
    pub site_url: Option<String>,
    pub deep_link: String,
}

impl PublicationRecord {
    /// Build a record, deriving the deep link from `repo_url`.
    ///
    /// # Errors
    ///
    /// Returns `TypeError::InvalidPublication` if `repo_url` is empty.
    pub fn new(
        repo_url: impl Into<String>,
        site_url: Option<String>,
        deep_link_prefix: &str,
    ) -> Result<Self, TypeError> {
        let repo_url = repo_url.into();
        if repo_url.trim().is_empty() {
            return Err(TypeError::InvalidPublication(
                "repository URL cannot be empty".into(),
            ));
        }
        let deep_link = deep_link(&repo_url, deep_link_prefix);
        Ok(Self {
            repo_url,
            site_url: site_url.filter(|s| !s.trim().is_empty()),
            deep_link,
        })
    }
}

/// Derive the one-click clone link for a repository URL.
///
/// Produces `<prefix><host>/<owner>/<name>`. URLs that cannot be parsed into
/// coordinates are appended verbatim.
pub fn deep_link(repo_url: &str, prefix: &str) -> String {
    match RepoCoordinates::parse(repo_url) {
        Some(coords) => format!("{prefix}{coords}"),
        None => format!("{prefix}{repo_url}"),
    }
}
