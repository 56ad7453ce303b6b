//! engine::publish
//!
//! Recursive publication of a node and everything it depends on.
//!
//! # Algorithm
//!
//! For each node, depth-first:
//!
//! 1. Mark the node visited.
//! 2. Publish each navigable dependency. A dependency already visited in
//!    this traversal is a cycle: its record is reused when it has one,
//!    otherwise the link is deferred until the dependency completes.
//! 3. Point local-path declarations at the published repositories and
//!    commit the declaration file once.
//! 4. Create the hosted repository (unpublished nodes only, under a free
//!    name) and push the current branch. Published nodes are pushed to
//!    their existing repository instead.
//! 5. Build and deploy the static site, then enable hosting for it.
//! 6. Persist the publication record and commit it.
//!
//! Deferred links are completed as soon as their target is published.
//! Links whose target never publishes are reported as unresolved cycles.
//!
//! # Idempotence
//!
//! Publishing an already published node never creates a second repository.
//! The existing record is reused and the node's content and site refreshed.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::{Engine, NodeFuture, SkipReason, SkippedDependency};
use crate::core::deps::{rewrite_url, DependencyReference, DepsError, DECLARATION_FILE};
use crate::core::metadata::{MetadataStore, StoreError, METADATA_FILE};
use crate::core::naming::{resolve_available_name, NamingError};
use crate::core::node::{Node, NodeError};
use crate::core::types::{is_remote_url, BranchName, NodeId, PublicationRecord, TypeError};
use crate::forge::{CreateRepoRequest, ForgeError, RemoteRepo};
use crate::git::{Git, GitError};
use crate::site::{link_map, SiteError};

const DECLARATIONS_COMMIT: &str = "Point dependencies at published repositories";
const RECORD_COMMIT: &str = "Record publication";

/// Errors that fail a publication.
#[derive(Debug, Error)]
pub enum PublishError {
    /// The hosting backend cannot be reached or rejects our credentials.
    #[error("hosting backend unavailable: {0}")]
    BackendUnavailable(ForgeError),

    #[error(transparent)]
    Naming(#[from] NamingError),

    #[error("hosting backend error: {0}")]
    Forge(#[from] ForgeError),

    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Node(#[from] NodeError),

    #[error(transparent)]
    Metadata(#[from] StoreError),

    #[error(transparent)]
    Declarations(#[from] DepsError),

    #[error("invalid publication record: {0}")]
    Record(#[from] TypeError),

    #[error("site error: {0}")]
    Site(#[from] SiteError),

    /// HEAD is detached, so there is no branch to publish.
    #[error("{path} is not on a branch")]
    DetachedHead { path: PathBuf },
}

impl PublishError {
    /// The backend error behind this failure, if it means the backend is gone.
    pub fn backend_failure(&self) -> Option<&ForgeError> {
        match self {
            PublishError::BackendUnavailable(e) => Some(e),
            PublishError::Forge(e) | PublishError::Naming(NamingError::Forge(e))
                if e.is_unavailable() =>
            {
                Some(e)
            }
            _ => None,
        }
    }
}

/// A dependency with a publication record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedDependency {
    pub id: NodeId,
    pub title: String,
    pub record: PublicationRecord,
}

/// Result of a successful publication.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// Record of the root node
    pub record: PublicationRecord,
    /// Every dependency published or refreshed by this call
    pub published_dependencies: Vec<PublishedDependency>,
    /// Dependencies left out, from anywhere in the graph
    pub skipped: Vec<SkippedDependency>,
}

impl PublishOutcome {
    /// Ids of skipped dependencies that could be identified.
    pub fn skipped_ids(&self) -> Vec<NodeId> {
        self.skipped.iter().filter_map(|s| s.id).collect()
    }
}

/// A declaration waiting for its target to be published.
#[derive(Debug, Clone)]
struct PendingLink {
    dependent: PathBuf,
    name: String,
    target: NodeId,
}

/// State threaded through one recursive publication.
#[derive(Debug, Default)]
struct Traversal {
    visited: HashSet<NodeId>,
    pending: Vec<PendingLink>,
    published: Vec<PublishedDependency>,
    skipped: Vec<SkippedDependency>,
}

impl Engine<'_> {
    /// Publish the node at `node_dir` and its reachable dependencies.
    pub async fn publish(&self, node_dir: &Path) -> Result<PublishOutcome, PublishError> {
        let mut visited = HashSet::new();
        self.publish_with_visited(node_dir, &mut visited).await
    }

    /// Publish with an explicit visited set.
    ///
    /// Nodes already in `visited` are treated as in progress. On return the
    /// set holds every node this call reached.
    pub async fn publish_with_visited(
        &self,
        node_dir: &Path,
        visited: &mut HashSet<NodeId>,
    ) -> Result<PublishOutcome, PublishError> {
        let login = self
            .forge
            .check_available()
            .await
            .map_err(PublishError::BackendUnavailable)?;
        debug!(forge = self.forge.name(), login = %login, "backend available");

        let mut walk = Traversal {
            visited: std::mem::take(visited),
            ..Traversal::default()
        };
        let result = self.publish_node(node_dir, &mut walk).await;
        *visited = std::mem::take(&mut walk.visited);
        let record = result?;

        for link in walk.pending.drain(..) {
            warn!(
                dependent = %link.dependent.display(),
                submodule = %link.name,
                target = %link.target,
                "cycle left unresolved"
            );
            walk.skipped.push(SkippedDependency::new(
                Some(link.target),
                link.name,
                SkipReason::UnresolvedCycle,
            ));
        }

        info!(
            repo = %record.repo_url,
            dependencies = walk.published.len(),
            skipped = walk.skipped.len(),
            "publication complete"
        );
        Ok(PublishOutcome {
            record,
            published_dependencies: walk.published,
            skipped: walk.skipped,
        })
    }

    fn publish_node<'s>(
        &'s self,
        dir: &'s Path,
        walk: &'s mut Traversal,
    ) -> NodeFuture<'s, Result<PublicationRecord, PublishError>> {
        Box::pin(async move {
            let node = Node::load(dir, self.resolver())?;
            let id = node.id();
            walk.visited.insert(id);
            info!(node = %id, title = node.title(), "publishing");

            let mut linked: Vec<(&DependencyReference, PublishedDependency)> = Vec::new();
            for dep in &node.dependencies {
                if let Some(published) = self.publish_dependency(dir, dep, walk).await? {
                    linked.push((dep, published));
                }
            }

            let git = self.open_repo(dir)?;
            self.record_dependency_urls(dir, &git, &linked)?;

            let branch = git.current_branch()?.ok_or_else(|| PublishError::DetachedHead {
                path: dir.to_path_buf(),
            })?;
            let existing = node.publication(&self.settings.deep_link_prefix);
            let (repo_url, push_url, created) = match &existing {
                Some(record) => {
                    debug!(node = %id, repo = %record.repo_url, "already published, refreshing");
                    let push_url = self.forge.push_url(&record.repo_url)?;
                    git.set_remote(&self.settings.remote, &push_url)?;
                    if let Err(e) = git.push(&self.settings.remote, &branch, false) {
                        warn!(node = %id, repo = %record.repo_url, error = %e, "refresh push failed, keeping existing publication");
                    }
                    (record.repo_url.clone(), push_url, None)
                }
                None => {
                    let repo = self.create_remote(&node, &git, &branch).await?;
                    (repo.url.clone(), repo.push_url.clone(), Some(repo))
                }
            };

            // The site links to dependencies, so it needs the provisional record.
            let mut site_url = existing.and_then(|r| r.site_url);
            let provisional = PublicationRecord::new(
                repo_url.as_str(),
                site_url.clone(),
                &self.settings.deep_link_prefix,
            )?;
            let links = link_map(
                linked
                    .iter()
                    .map(|(_, d)| (d.id, d.title.as_str(), &d.record)),
            );
            match self.site.build_and_deploy(
                &node,
                Some(&provisional),
                self.content.as_ref(),
                &links,
                &push_url,
            ) {
                Ok(()) => match self
                    .forge
                    .enable_site(&repo_url, self.settings.site_branch.as_str())
                    .await
                {
                    Ok(url) => site_url = Some(url),
                    Err(e) => warn!(node = %id, error = %e, "site hosting not enabled"),
                },
                Err(e) => warn!(node = %id, error = %e, "site build failed, continuing without a fresh site"),
            }

            let record =
                PublicationRecord::new(repo_url, site_url, &self.settings.deep_link_prefix)?;
            if let Err(e) = self.persist_record(dir, &git, &branch, &record) {
                if let Some(repo) = &created {
                    self.discard_created(dir, &git, repo).await;
                }
                return Err(e);
            }
            info!(node = %id, repo = %record.repo_url, site = ?record.site_url, "published");

            self.complete_pending(id, &record, walk);
            Ok(record)
        })
    }

    /// Publish one dependency edge of the node at `dir`.
    ///
    /// Returns the dependency's record when the edge can be linked. Contained
    /// failures land in `walk.skipped`; only a vanished backend is returned.
    async fn publish_dependency(
        &self,
        dir: &Path,
        dep: &DependencyReference,
        walk: &mut Traversal,
    ) -> Result<Option<PublishedDependency>, PublishError> {
        let prefix = &self.settings.deep_link_prefix;
        let Some(dep_dir) = dep.resolved_local_path.as_deref() else {
            debug!(submodule = %dep.name, "dependency not navigable");
            walk.skipped
                .push(SkippedDependency::new(None, &dep.name, SkipReason::NotNavigable));
            return Ok(None);
        };

        let metadata = match MetadataStore::new(dep_dir).read() {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(submodule = %dep.name, error = %e, "dependency metadata unreadable");
                walk.skipped.push(SkippedDependency::new(
                    None,
                    &dep.name,
                    SkipReason::Failed(e.to_string()),
                ));
                return Ok(None);
            }
        };
        let dep_id = metadata.id;

        if walk.visited.contains(&dep_id) {
            return Ok(match metadata.publication(prefix) {
                Some(record) => {
                    debug!(dependency = %dep_id, "cycle closed by existing publication");
                    Some(PublishedDependency {
                        id: dep_id,
                        title: metadata.title,
                        record,
                    })
                }
                None => {
                    debug!(dependency = %dep_id, submodule = %dep.name, "dependency in progress, deferring link");
                    walk.pending.push(PendingLink {
                        dependent: dir.to_path_buf(),
                        name: dep.name.clone(),
                        target: dep_id,
                    });
                    None
                }
            });
        }

        match self.publish_node(dep_dir, walk).await {
            Ok(record) => {
                let published = PublishedDependency {
                    id: dep_id,
                    title: metadata.title,
                    record,
                };
                walk.published.push(published.clone());
                Ok(Some(published))
            }
            Err(e) => {
                if let Some(backend) = e.backend_failure() {
                    return Err(PublishError::BackendUnavailable(backend.clone()));
                }
                match metadata.publication(prefix) {
                    Some(record) => {
                        warn!(dependency = %dep_id, error = %e, "refresh failed, keeping existing publication");
                        Ok(Some(PublishedDependency {
                            id: dep_id,
                            title: metadata.title,
                            record,
                        }))
                    }
                    None => {
                        warn!(dependency = %dep_id, submodule = %dep.name, error = %e, "dependency not published");
                        walk.skipped.push(SkippedDependency::new(
                            Some(dep_id),
                            &dep.name,
                            SkipReason::Failed(e.to_string()),
                        ));
                        Ok(None)
                    }
                }
            }
        }
    }

    /// Rewrite local-path declarations to their published URLs.
    fn record_dependency_urls(
        &self,
        dir: &Path,
        git: &Git,
        linked: &[(&DependencyReference, PublishedDependency)],
    ) -> Result<(), PublishError> {
        let mut rewritten = 0;
        for (dep, published) in linked {
            if is_remote_url(&dep.remote_url) {
                continue;
            }
            if rewrite_url(dir, &dep.name, &published.record.repo_url)? {
                debug!(submodule = %dep.name, url = %published.record.repo_url, "declaration rewritten");
                rewritten += 1;
            }
        }

        if rewritten > 0 {
            git.stage_and_commit(&[DECLARATION_FILE], DECLARATIONS_COMMIT)?;
        }
        Ok(())
    }

    /// Create the hosted repository and push to it.
    ///
    /// A repository whose first push fails is deleted again.
    async fn create_remote(
        &self,
        node: &Node,
        git: &Git,
        branch: &BranchName,
    ) -> Result<RemoteRepo, PublishError> {
        let name = resolve_available_name(self.forge, node.title()).await?;
        let repo = self
            .forge
            .create_repo(CreateRepoRequest {
                name,
                description: Some(node.title().to_string()),
                private: self.settings.private,
            })
            .await?;
        info!(node = %node.id(), repo = %repo.url, "repository created");

        let pushed = git
            .set_remote(&self.settings.remote, &repo.push_url)
            .and_then(|()| git.push(&self.settings.remote, branch, false));
        if let Err(e) = pushed {
            warn!(repo = %repo.url, error = %e, "initial push failed, removing repository");
            if let Err(cleanup) = self.forge.delete_repo(&repo.owner, &repo.name).await {
                warn!(repo = %repo.url, error = %cleanup, "could not remove repository");
            }
            return Err(e.into());
        }

        Ok(repo)
    }

    /// Remove a repository created by this call whose record could not be saved.
    ///
    /// Leaves the node unpublished so the next attempt starts from scratch.
    async fn discard_created(&self, dir: &Path, git: &Git, repo: &RemoteRepo) {
        warn!(repo = %repo.url, "publication record not saved, removing repository");
        if let Err(e) = self.forge.delete_repo(&repo.owner, &repo.name).await {
            warn!(repo = %repo.url, error = %e, "could not remove repository");
        }
        if let Err(e) = git.remove_remote(&self.settings.remote) {
            warn!(path = %dir.display(), error = %e, "could not remove remote");
        }

        let store = MetadataStore::new(dir);
        if let Ok(mut metadata) = store.read() {
            if metadata.is_published() {
                metadata.clear_publication();
                if let Err(e) = store.write(&metadata) {
                    warn!(path = %dir.display(), error = %e, "could not clear publication record");
                }
            }
        }
    }

    /// Write the record into the node's metadata and commit it.
    fn persist_record(
        &self,
        dir: &Path,
        git: &Git,
        branch: &BranchName,
        record: &PublicationRecord,
    ) -> Result<(), PublishError> {
        let store = MetadataStore::new(dir);
        let mut metadata = store.read()?;
        metadata.set_publication(record);
        store.write(&metadata)?;

        if git.stage_and_commit(&[METADATA_FILE], RECORD_COMMIT)?.is_some() {
            if let Err(e) = git.push(&self.settings.remote, branch, false) {
                warn!(path = %dir.display(), error = %e, "publication record not pushed");
            }
        }
        Ok(())
    }

    /// Complete deferred links that were waiting for `target`.
    fn complete_pending(&self, target: NodeId, record: &PublicationRecord, walk: &mut Traversal) {
        let (ready, waiting): (Vec<_>, Vec<_>) = std::mem::take(&mut walk.pending)
            .into_iter()
            .partition(|link| link.target == target);
        walk.pending = waiting;

        for link in ready {
            if let Err(e) = self.complete_link(&link, record) {
                warn!(dependent = %link.dependent.display(), submodule = %link.name, error = %e, "deferred link not recorded");
                walk.skipped.push(SkippedDependency::new(
                    Some(target),
                    link.name,
                    SkipReason::Failed(e.to_string()),
                ));
            }
        }
    }

    fn complete_link(&self, link: &PendingLink, record: &PublicationRecord) -> Result<(), PublishError> {
        if !rewrite_url(&link.dependent, &link.name, &record.repo_url)? {
            return Ok(());
        }

        let git = self.open_repo(&link.dependent)?;
        if git
            .stage_and_commit(&[DECLARATION_FILE], DECLARATIONS_COMMIT)?
            .is_none()
        {
            return Ok(());
        }
        info!(dependent = %link.dependent.display(), submodule = %link.name, url = %record.repo_url, "deferred link recorded");

        let branch = git.current_branch()?;
        let remote = git.remote_url(&self.settings.remote)?;
        if let (Some(branch), Some(_)) = (branch, remote) {
            if let Err(e) = git.push(&self.settings.remote, &branch, false) {
                warn!(dependent = %link.dependent.display(), error = %e, "deferred link not pushed");
            }
        }

        if let Err(e) = self.redeploy_site(&link.dependent) {
            warn!(dependent = %link.dependent.display(), error = %e, "site not refreshed after deferred link");
        }
        Ok(())
    }

    /// Rebuild a published node's site from its dependencies' current records.
    fn redeploy_site(&self, dir: &Path) -> Result<(), PublishError> {
        let prefix = &self.settings.deep_link_prefix;
        let node = Node::load(dir, self.resolver())?;
        let Some(record) = node.publication(prefix) else {
            return Ok(());
        };
        let push_url = self.forge.push_url(&record.repo_url)?;

        let published: Vec<_> = node
            .dependencies
            .iter()
            .filter_map(|dep| dep.resolved_local_path.as_deref())
            .filter_map(|dep_dir| MetadataStore::new(dep_dir).read().ok())
            .filter_map(|meta| {
                let record = meta.publication(prefix)?;
                Some((meta.id, meta.title, record))
            })
            .collect();
        let links = link_map(
            published
                .iter()
                .map(|(id, title, record)| (*id, title.as_str(), record)),
        );

        self.site.build_and_deploy(
            &node,
            Some(&record),
            self.content.as_ref(),
            &links,
            &push_url,
        )?;
        debug!(node = %node.id(), links = links.len(), "site refreshed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_forge_errors_are_backend_failures() {
        let err = PublishError::Forge(ForgeError::NetworkError("reset".into()));
        assert!(err.backend_failure().is_some());

        let err = PublishError::Naming(NamingError::Forge(ForgeError::AuthRequired));
        assert!(err.backend_failure().is_some());
    }

    #[test]
    fn contained_errors_are_not_backend_failures() {
        let err = PublishError::Forge(ForgeError::ApiError {
            status: 500,
            message: "boom".into(),
        });
        assert!(err.backend_failure().is_none());

        let err = PublishError::Naming(NamingError::Exhausted {
            title: "x".into(),
            attempts: 100,
        });
        assert!(err.backend_failure().is_none());
    }

    #[test]
    fn skipped_ids_ignore_unidentified() {
        let id = NodeId::new();
        let outcome = PublishOutcome {
            record: PublicationRecord::new("https://github.com/o/n", None, "app://clone?repo=")
                .unwrap(),
            published_dependencies: vec![],
            skipped: vec![
                SkippedDependency::new(None, "dead", SkipReason::NotNavigable),
                SkippedDependency::new(Some(id), "r", SkipReason::Failed("x".into())),
            ],
        };
        assert_eq!(outcome.skipped_ids(), vec![id]);
    }
}
