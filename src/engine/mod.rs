//! engine
//!
//! Recursive publication and teardown of DreamNode graphs.
//!
//! # Architecture
//!
//! The engine walks the dependency graph rooted at one node and drives the
//! per-node choreography against three collaborators:
//!
//! - the local repository, through [`Git`]
//! - the hosting backend, through a borrowed [`Forge`]
//! - the static site, through [`SiteBuilder`]
//!
//! Traversal is strictly depth-first and sequential. A dependency is
//! published before the node that declares it so the declaring node can
//! record the dependency's remote URL.
//!
//! # Failure Policy
//!
//! Only failures concerning the root node surface as errors. A failing
//! dependency is recorded as a [`SkippedDependency`] on the outcome and its
//! siblings continue. Site failures are logged and never fail a node.
//!
//! # Example
//!
//! ```ignore
//! use interbrain_publish::engine::{Engine, EngineSettings};
//! use interbrain_publish::forge::mock::MockForge;
//!
//! let forge = MockForge::new();
//! let engine = Engine::new(&forge, EngineSettings::default())?;
//! let outcome = engine.publish(Path::new("workspace/my-idea")).await?;
//! println!("{}", outcome.record.repo_url);
//! ```

pub mod batch;
pub mod publish;
pub mod unpublish;

pub use batch::{BatchCoordinator, BatchEntry, BatchReport};
pub use publish::{PublishError, PublishOutcome};
pub use unpublish::{UnpublishError, UnpublishOutcome};

use std::fmt;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

use tracing::info;

use crate::core::config::{Config, DEFAULT_DEEP_LINK_PREFIX};
use crate::core::deps::{PathResolver, SiblingResolver};
use crate::core::types::{BranchName, NodeId, TypeError};
use crate::forge::Forge;
use crate::git::{Git, GitError, GitIdentity};
use crate::site::{ContentResolver, FileContentResolver, SiteBuilder, SiteError};

/// Boxed future returned by the recursive node walkers.
pub(crate) type NodeFuture<'s, T> = Pin<Box<dyn Future<Output = T> + 's>>;

/// Remote name used when none is configured.
pub const DEFAULT_REMOTE: &str = "origin";

/// Execution context for commands.
///
/// Contains global settings derived from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Working directory override.
    pub cwd: Option<PathBuf>,
    /// Debug logging enabled.
    pub debug: bool,
    /// Quiet mode (minimal output).
    pub quiet: bool,
}

/// Settings the engine applies to every node it touches.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Name of the local remote pointing at the hosted repository
    pub remote: String,
    /// Branch the static site is deployed to
    pub site_branch: BranchName,
    /// Prefix for one-click clone links
    pub deep_link_prefix: String,
    /// Create repositories as private
    pub private: bool,
    /// Commit signature fallback and push credentials
    pub identity: GitIdentity,
}

impl EngineSettings {
    /// Derive settings from loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self, TypeError> {
        Ok(Self {
            remote: config.remote().to_string(),
            site_branch: BranchName::new(config.site_branch())?,
            deep_link_prefix: config.deep_link_prefix().to_string(),
            private: config.private(),
            identity: GitIdentity {
                name: config.author_name().map(String::from),
                email: config.author_email().map(String::from),
                token: config.token(),
            },
        })
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            remote: DEFAULT_REMOTE.to_string(),
            site_branch: BranchName::site_default(),
            deep_link_prefix: DEFAULT_DEEP_LINK_PREFIX.to_string(),
            private: false,
            identity: GitIdentity::default(),
        }
    }
}

/// Why a dependency was left out of a publication or teardown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    /// The declaration has no local directory.
    NotNavigable,
    /// Revisited while still unpublished and never resolved.
    UnresolvedCycle,
    /// Publishing or tearing down the dependency failed.
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotNavigable => write!(f, "not navigable"),
            SkipReason::UnresolvedCycle => write!(f, "unresolved cycle"),
            SkipReason::Failed(message) => write!(f, "{}", message),
        }
    }
}

/// A dependency that was not processed, reported alongside the result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedDependency {
    /// Node id, when the dependency's metadata could be read
    pub id: Option<NodeId>,
    /// Declaration name
    pub name: String,
    pub reason: SkipReason,
}

impl SkippedDependency {
    pub(crate) fn new(id: Option<NodeId>, name: impl Into<String>, reason: SkipReason) -> Self {
        Self {
            id,
            name: name.into(),
            reason,
        }
    }
}

/// The publication engine.
///
/// Borrows the forge for its whole lifetime so one authenticated client
/// serves an entire traversal.
pub struct Engine<'a> {
    forge: &'a dyn Forge,
    resolver: Box<dyn PathResolver>,
    content: Box<dyn ContentResolver>,
    site: SiteBuilder,
    settings: EngineSettings,
}

impl fmt::Debug for Engine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("forge", &self.forge.name())
            .field("settings", &self.settings)
            .finish()
    }
}

impl<'a> Engine<'a> {
    /// Create an engine with the default resolver and content chain.
    pub fn new(forge: &'a dyn Forge, settings: EngineSettings) -> Result<Self, SiteError> {
        let site = SiteBuilder::new(settings.site_branch.clone())?
            .with_identity(settings.identity.clone());
        Ok(Self {
            forge,
            resolver: Box::new(SiblingResolver::default()),
            content: Box::new(FileContentResolver),
            site,
            settings,
        })
    }

    /// Replace the dependency path resolver.
    pub fn with_resolver(mut self, resolver: impl PathResolver + 'static) -> Self {
        self.resolver = Box::new(resolver);
        self
    }

    /// Replace the site content resolver.
    pub fn with_content(mut self, content: impl ContentResolver + 'static) -> Self {
        self.content = Box::new(content);
        self
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn forge(&self) -> &dyn Forge {
        self.forge
    }

    pub(crate) fn resolver(&self) -> &dyn PathResolver {
        self.resolver.as_ref()
    }

    /// Open the node's repository, initializing one with an initial commit
    /// if the directory is not yet under version control.
    pub(crate) fn open_repo(&self, dir: &Path) -> Result<Git, GitError> {
        match Git::open(dir) {
            Ok(git) => {
                let git = git.with_identity(self.settings.identity.clone());
                if !git.has_history() {
                    info!(path = %dir.display(), "creating initial commit");
                    git.stage_all_and_commit("Initialize DreamNode")?;
                }
                Ok(git)
            }
            Err(GitError::NotARepo { .. }) => {
                info!(path = %dir.display(), "initializing repository");
                let git = Git::init(dir)?.with_identity(self.settings.identity.clone());
                git.stage_all_and_commit("Initialize DreamNode")?;
                Ok(git)
            }
            Err(e) => Err(e),
        }
    }
}
