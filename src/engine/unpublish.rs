//! engine::unpublish
//!
//! Recursive teardown, mirroring [`super::publish`].
//!
//! Dependencies are torn down before the node that declares them. Each node
//! is removed from the hosting backend in a fixed order:
//!
//! 1. Delete the deployed site branch
//! 2. Delete the hosted repository
//! 3. Remove the local remote
//! 4. Clear the publication record and commit
//!
//! Anything already gone counts as done, so an interrupted teardown can be
//! repeated. Declaration files keep their remote URLs.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Engine, NodeFuture, SkipReason, SkippedDependency};
use crate::core::metadata::{MetadataStore, StoreError, METADATA_FILE};
use crate::core::node::{Node, NodeError};
use crate::core::types::{NodeId, PublicationRecord, RepoCoordinates};
use crate::forge::ForgeError;
use crate::git::GitError;

const CLEAR_COMMIT: &str = "Clear publication";

/// Errors that fail an unpublish.
#[derive(Debug, Error)]
pub enum UnpublishError {
    /// The hosting backend cannot be reached or rejects our credentials.
    #[error("hosting backend unavailable: {0}")]
    BackendUnavailable(ForgeError),

    /// The root node has no publication record.
    #[error("{path} is not published")]
    NotPublished { path: PathBuf },

    /// The token may not delete the repository.
    #[error(
        "not allowed to delete {repo}: {message}\n  \
         grant the token the `delete_repo` scope and run unpublish again"
    )]
    PermissionDenied { repo: String, message: String },

    /// The recorded repository URL has no owner and name.
    #[error("cannot parse recorded repository url '{0}'")]
    InvalidRepoUrl(String),

    #[error("hosting backend error: {0}")]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Metadata(#[from] StoreError),
}

impl UnpublishError {
    /// The backend error behind this failure, if it means the backend is gone.
    pub fn backend_failure(&self) -> Option<&ForgeError> {
        match self {
            UnpublishError::BackendUnavailable(e) => Some(e),
            UnpublishError::Forge(e) if e.is_unavailable() => Some(e),
            _ => None,
        }
    }
}

/// Result of a successful unpublish.
#[derive(Debug, Clone, Default)]
pub struct UnpublishOutcome {
    /// Nodes torn down, dependencies first, root last
    pub unpublished: Vec<NodeId>,
    /// Dependencies whose teardown failed or could not be attempted
    pub skipped: Vec<SkippedDependency>,
}

#[derive(Debug, Default)]
struct Teardown {
    visited: HashSet<NodeId>,
    outcome: UnpublishOutcome,
}

impl Engine<'_> {
    /// Unpublish the node at `node_dir` and its published dependencies.
    pub async fn unpublish(&self, node_dir: &Path) -> Result<UnpublishOutcome, UnpublishError> {
        let mut visited = HashSet::new();
        self.unpublish_with_visited(node_dir, &mut visited).await
    }

    /// Unpublish with an explicit visited set.
    pub async fn unpublish_with_visited(
        &self,
        node_dir: &Path,
        visited: &mut HashSet<NodeId>,
    ) -> Result<UnpublishOutcome, UnpublishError> {
        let login = self
            .forge
            .check_available()
            .await
            .map_err(UnpublishError::BackendUnavailable)?;
        debug!(forge = self.forge.name(), login = %login, "backend available");

        let mut walk = Teardown {
            visited: std::mem::take(visited),
            ..Teardown::default()
        };
        let result = self.unpublish_node(node_dir, &mut walk).await;
        *visited = std::mem::take(&mut walk.visited);
        result?;

        info!(
            nodes = walk.outcome.unpublished.len(),
            skipped = walk.outcome.skipped.len(),
            "unpublish complete"
        );
        Ok(walk.outcome)
    }

    fn unpublish_node<'s>(
        &'s self,
        dir: &'s Path,
        walk: &'s mut Teardown,
    ) -> NodeFuture<'s, Result<(), UnpublishError>> {
        Box::pin(async move {
            let node = Node::load(dir, self.resolver())?;
            let id = node.id();
            walk.visited.insert(id);

            let record = node
                .publication(&self.settings.deep_link_prefix)
                .ok_or_else(|| UnpublishError::NotPublished {
                    path: dir.to_path_buf(),
                })?;
            info!(node = %id, repo = %record.repo_url, "unpublishing");

            for dep in &node.dependencies {
                let Some(dep_dir) = dep.resolved_local_path.as_deref() else {
                    walk.outcome.skipped.push(SkippedDependency::new(
                        None,
                        &dep.name,
                        SkipReason::NotNavigable,
                    ));
                    continue;
                };

                let metadata = match MetadataStore::new(dep_dir).read() {
                    Ok(metadata) => metadata,
                    Err(e) => {
                        warn!(submodule = %dep.name, error = %e, "dependency metadata unreadable");
                        walk.outcome.skipped.push(SkippedDependency::new(
                            None,
                            &dep.name,
                            SkipReason::Failed(e.to_string()),
                        ));
                        continue;
                    }
                };

                if walk.visited.contains(&metadata.id) {
                    continue;
                }
                if !metadata.is_published() {
                    debug!(dependency = %metadata.id, "dependency not published");
                    continue;
                }

                if let Err(e) = self.unpublish_node(dep_dir, walk).await {
                    if let Some(backend) = e.backend_failure() {
                        return Err(UnpublishError::BackendUnavailable(backend.clone()));
                    }
                    warn!(dependency = %metadata.id, submodule = %dep.name, error = %e, "dependency not unpublished");
                    walk.outcome.skipped.push(SkippedDependency::new(
                        Some(metadata.id),
                        &dep.name,
                        SkipReason::Failed(e.to_string()),
                    ));
                }
            }

            self.teardown(dir, &record).await?;
            walk.outcome.unpublished.push(id);
            info!(node = %id, "unpublished");
            Ok(())
        })
    }

    async fn teardown(&self, dir: &Path, record: &PublicationRecord) -> Result<(), UnpublishError> {
        let branch = self.settings.site_branch.as_str();
        match self.forge.delete_site_ref(&record.repo_url, branch).await {
            Ok(()) => debug!(repo = %record.repo_url, branch, "site branch deleted"),
            Err(ForgeError::NotFound(_)) => debug!(repo = %record.repo_url, branch, "site branch already gone"),
            Err(e) => return Err(e.into()),
        }

        let coords = RepoCoordinates::parse(&record.repo_url)
            .ok_or_else(|| UnpublishError::InvalidRepoUrl(record.repo_url.clone()))?;
        match self.forge.delete_repo(&coords.owner, &coords.name).await {
            Ok(()) => info!(repo = %record.repo_url, "repository deleted"),
            Err(ForgeError::NotFound(_)) => debug!(repo = %record.repo_url, "repository already gone"),
            Err(ForgeError::PermissionDenied(message)) => {
                return Err(UnpublishError::PermissionDenied {
                    repo: record.repo_url.clone(),
                    message,
                })
            }
            Err(e) => return Err(e.into()),
        }

        let git = self.open_repo(dir)?;
        if !git.remove_remote(&self.settings.remote)? {
            debug!(path = %dir.display(), remote = %self.settings.remote, "remote already removed");
        }

        let store = MetadataStore::new(dir);
        let mut metadata = store.read()?;
        metadata.clear_publication();
        store.write(&metadata)?;
        git.stage_and_commit(&[METADATA_FILE], CLEAR_COMMIT)?;
        Ok(())
    }
}
