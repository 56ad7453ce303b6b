//! git::interface
//!
//! Git interface implementation using git2.
//!
//! This module provides the **single doorway** to all Git operations in the
//! publisher. All Git interactions flow through this interface, which provides
//! structured results and normalizes errors into typed failure categories.
//!
//! # Error Handling
//!
//! Git errors are categorized into typed variants:
//! - [`GitError::NotARepo`]: Directory is not a Git repository
//! - [`GitError::NoHistory`]: HEAD is unborn, nothing to push
//! - [`GitError::PushRejected`]: The remote refused a ref update
//! - [`GitError::PushFailed`]: Transport or authentication failure
//!
//! # Example
//!
//! ```ignore
//! use interbrain_publish::git::Git;
//! use std::path::Path;
//!
//! let git = Git::open(Path::new("./my-node"))?;
//! git.stage_and_commit(&[".udd"], "Update metadata")?;
//! git.push("origin", &git.current_branch()?.unwrap(), false)?;
//! ```

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::debug;

use crate::core::types::{BranchName, TypeError};

/// Fallback commit author name.
pub const DEFAULT_AUTHOR_NAME: &str = "InterBrain";

/// Fallback commit author email.
pub const DEFAULT_AUTHOR_EMAIL: &str = "interbrain@localhost";

/// Errors from Git operations.
#[derive(Debug, Error)]
pub enum GitError {
    /// Not a Git repository.
    #[error("not a git repository: {path}")]
    NotARepo {
        /// The path that was opened
        path: PathBuf,
    },

    /// Repository is bare (no working directory).
    #[error("bare repository not supported")]
    BareRepo,

    /// Requested ref does not exist.
    #[error("ref not found: {refname}")]
    RefNotFound {
        /// The ref that was not found
        refname: String,
    },

    /// HEAD is unborn.
    #[error("repository has no commits")]
    NoHistory,

    /// Named remote does not exist.
    #[error("remote not found: {name}")]
    RemoteNotFound {
        /// The remote name
        name: String,
    },

    /// Invalid ref name format.
    #[error("invalid ref name: {message}")]
    InvalidRefName {
        /// Description of the problem
        message: String,
    },

    /// The remote rejected a ref update.
    #[error("push rejected: {message}")]
    PushRejected {
        /// Ref and reason reported by the remote
        message: String,
    },

    /// Push could not complete.
    #[error("push to '{remote}' failed: {message}")]
    PushFailed {
        /// Remote name or URL
        remote: String,
        /// Underlying error message
        message: String,
    },

    /// Permission or filesystem error.
    #[error("repository access error: {message}")]
    AccessError {
        /// Description of the error
        message: String,
    },

    /// Internal git2 error.
    #[error("git error: {message}")]
    Internal {
        /// The error message
        message: String,
    },
}

impl GitError {
    /// Create a GitError from a git2::Error with richer context.
    fn from_git2(err: git2::Error, context: &str) -> Self {
        match err.code() {
            git2::ErrorCode::NotFound if context.starts_with("refs/") => GitError::RefNotFound {
                refname: context.to_string(),
            },
            git2::ErrorCode::UnbornBranch => GitError::NoHistory,
            git2::ErrorCode::Locked => GitError::AccessError {
                message: format!("repository is locked: {}", err.message()),
            },
            _ => GitError::Internal {
                message: format!("{}: {}", context, err.message()),
            },
        }
    }
}

impl From<git2::Error> for GitError {
    fn from(err: git2::Error) -> Self {
        match err.code() {
            git2::ErrorCode::UnbornBranch => GitError::NoHistory,
            _ => GitError::Internal {
                message: err.message().to_string(),
            },
        }
    }
}

impl From<TypeError> for GitError {
    fn from(err: TypeError) -> Self {
        GitError::InvalidRefName {
            message: err.to_string(),
        }
    }
}

/// Summary of working tree status.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorktreeStatus {
    /// Number of staged changes
    pub staged: usize,
    /// Number of unstaged changes to tracked files
    pub unstaged: usize,
    /// Number of untracked files (if requested)
    pub untracked: usize,
    /// Whether there are unresolved conflicts
    pub has_conflicts: bool,
}

impl WorktreeStatus {
    /// Check if the worktree is completely clean (no changes at all).
    pub fn is_clean(&self) -> bool {
        self.staged == 0 && self.unstaged == 0 && !self.has_conflicts
    }

    /// Check if there are any staged changes ready to commit.
    pub fn has_staged(&self) -> bool {
        self.staged > 0
    }
}

/// Commit signature fallback and push credentials.
#[derive(Clone, Default)]
pub struct GitIdentity {
    /// Author name used when git config has none
    pub name: Option<String>,
    /// Author email used when git config has none
    pub email: Option<String>,
    /// Token for HTTPS pushes
    pub token: Option<String>,
}

impl std::fmt::Debug for GitIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitIdentity")
            .field("name", &self.name)
            .field("email", &self.email)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// The Git interface.
///
/// This is the **single point of interaction** with Git. No other module
/// imports `git2` directly.
pub struct Git {
    /// The underlying git2 repository
    repo: git2::Repository,
    identity: GitIdentity,
}

impl std::fmt::Debug for Git {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Git")
            .field("path", &self.repo.path())
            .finish()
    }
}

impl Git {
    // =========================================================================
    // Repository Opening
    // =========================================================================

    /// Open the repository rooted exactly at `path`.
    ///
    /// Unlike discovery, a node directory nested inside another repository
    /// is not mistaken for its parent.
    ///
    /// # Errors
    ///
    /// - [`GitError::NotARepo`] if `path` is not a repository root
    /// - [`GitError::BareRepo`] if the repository has no working directory
    pub fn open(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;

        if repo.is_bare() {
            return Err(GitError::BareRepo);
        }

        Ok(Self::wrap(repo))
    }

    /// Open a bare repository.
    pub fn open_bare(path: &Path) -> Result<Self, GitError> {
        let repo = git2::Repository::open_bare(path).map_err(|_| GitError::NotARepo {
            path: path.to_path_buf(),
        })?;
        Ok(Self::wrap(repo))
    }

    /// Initialize a repository with a working directory.
    pub fn init(path: &Path) -> Result<Self, GitError> {
        let repo =
            git2::Repository::init(path).map_err(|e| GitError::from_git2(e, "init"))?;
        Ok(Self::wrap(repo))
    }

    /// Initialize a bare repository.
    pub fn init_bare(path: &Path) -> Result<Self, GitError> {
        let repo =
            git2::Repository::init_bare(path).map_err(|e| GitError::from_git2(e, "init"))?;
        Ok(Self::wrap(repo))
    }

    fn wrap(repo: git2::Repository) -> Self {
        Self {
            repo,
            identity: GitIdentity::default(),
        }
    }

    /// Use `identity` for commit signatures and push credentials.
    pub fn with_identity(mut self, identity: GitIdentity) -> Self {
        self.identity = identity;
        self
    }

    /// Working directory of the repository.
    pub fn work_dir(&self) -> Result<&Path, GitError> {
        self.repo.workdir().ok_or(GitError::BareRepo)
    }

    // =========================================================================
    // Status
    // =========================================================================

    /// Get working tree status summary.
    ///
    /// If `include_untracked` is false, untracked files are not counted.
    pub fn worktree_status(&self, include_untracked: bool) -> Result<WorktreeStatus, GitError> {
        let mut opts = git2::StatusOptions::new();
        opts.include_untracked(include_untracked)
            .include_ignored(false);

        let statuses = self
            .repo
            .statuses(Some(&mut opts))
            .map_err(|e| GitError::from_git2(e, "status"))?;

        let mut result = WorktreeStatus::default();

        for entry in statuses.iter() {
            let status = entry.status();

            if status.is_conflicted() {
                result.has_conflicts = true;
            }

            if status.is_index_new()
                || status.is_index_modified()
                || status.is_index_deleted()
                || status.is_index_renamed()
                || status.is_index_typechange()
            {
                result.staged += 1;
            }

            if status.is_wt_modified()
                || status.is_wt_deleted()
                || status.is_wt_renamed()
                || status.is_wt_typechange()
            {
                result.unstaged += 1;
            }

            if status.is_wt_new() {
                result.untracked += 1;
            }
        }

        Ok(result)
    }

    /// Whether HEAD points at a commit.
    pub fn has_history(&self) -> bool {
        self.repo
            .head()
            .ok()
            .and_then(|h| h.peel_to_commit().ok())
            .is_some()
    }

    /// Get the current branch name, if on a branch.
    ///
    /// Returns `None` if HEAD is detached or unborn.
    pub fn current_branch(&self) -> Result<Option<BranchName>, GitError> {
        let head = match self.repo.head() {
            Ok(h) => h,
            Err(e) if e.code() == git2::ErrorCode::UnbornBranch => return Ok(None),
            Err(e) if e.code() == git2::ErrorCode::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        if head.is_branch() {
            if let Some(name) = head.shorthand() {
                return Ok(Some(BranchName::new(name)?));
            }
        }

        Ok(None)
    }

    /// Check if a local branch exists.
    pub fn branch_exists(&self, branch: &BranchName) -> bool {
        self.repo
            .find_reference(&format!("refs/heads/{}", branch))
            .is_ok()
    }

    /// Delete a local branch. Returns `false` if it did not exist.
    pub fn delete_branch(&self, branch: &BranchName) -> Result<bool, GitError> {
        match self.repo.find_branch(branch.as_str(), git2::BranchType::Local) {
            Ok(mut b) => {
                b.delete()
                    .map_err(|e| GitError::from_git2(e, &format!("refs/heads/{}", branch)))?;
                Ok(true)
            }
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    // =========================================================================
    // Commits
    // =========================================================================

    /// Stage `paths` (relative to the work dir) and commit them on HEAD.
    ///
    /// Paths that no longer exist are removed from the index. Returns `None`
    /// when the resulting tree equals HEAD's tree, so no empty commit is made.
    pub fn stage_and_commit(
        &self,
        paths: &[&str],
        message: &str,
    ) -> Result<Option<String>, GitError> {
        let work_dir = self.work_dir()?.to_path_buf();
        let mut index = self.repo.index()?;

        for path in paths {
            let rel = Path::new(path);
            if work_dir.join(rel).exists() {
                index
                    .add_path(rel)
                    .map_err(|e| GitError::from_git2(e, path))?;
            } else {
                match index.remove_path(rel) {
                    Ok(()) => {}
                    Err(e) if e.code() == git2::ErrorCode::NotFound => {}
                    Err(e) => return Err(GitError::from_git2(e, path)),
                }
            }
        }
        index.write()?;

        self.commit_index(&mut index, message)
    }

    /// Stage every non-ignored file and commit on HEAD.
    pub fn stage_all_and_commit(&self, message: &str) -> Result<Option<String>, GitError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;

        self.commit_index(&mut index, message)
    }

    fn commit_index(
        &self,
        index: &mut git2::Index,
        message: &str,
    ) -> Result<Option<String>, GitError> {
        let tree_oid = index.write_tree()?;
        let tree = self.repo.find_tree(tree_oid)?;

        let parent = match self.repo.head() {
            Ok(head) => Some(head.peel_to_commit()?),
            Err(e)
                if e.code() == git2::ErrorCode::UnbornBranch
                    || e.code() == git2::ErrorCode::NotFound =>
            {
                None
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(ref p) = parent {
            if p.tree_id() == tree_oid {
                return Ok(None);
            }
        }

        let sig = self.signature()?;
        let parents: Vec<&git2::Commit> = parent.iter().collect();
        let oid = self
            .repo
            .commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)?;

        debug!(oid = %oid, message, "committed");
        Ok(Some(oid.to_string()))
    }

    /// Commit the whole work dir as the first commit of `branch`, with no
    /// parents, and point HEAD at it.
    pub fn commit_orphan(&self, branch: &BranchName, message: &str) -> Result<String, GitError> {
        let mut index = self.repo.index()?;
        index.add_all(["*"], git2::IndexAddOption::DEFAULT, None)?;
        index.write()?;
        let tree = self.repo.find_tree(index.write_tree()?)?;

        let sig = self.signature()?;
        let oid = self.repo.commit(None, &sig, &sig, message, &tree, &[])?;

        let refname = format!("refs/heads/{}", branch);
        self.repo.reference(&refname, oid, true, message)?;
        self.repo
            .set_head(&refname)
            .map_err(|e| GitError::from_git2(e, &refname))?;

        Ok(oid.to_string())
    }

    fn signature(&self) -> Result<git2::Signature<'static>, GitError> {
        if let Ok(sig) = self.repo.signature() {
            return Ok(sig.to_owned());
        }
        let name = self.identity.name.as_deref().unwrap_or(DEFAULT_AUTHOR_NAME);
        let email = self
            .identity
            .email
            .as_deref()
            .unwrap_or(DEFAULT_AUTHOR_EMAIL);
        Ok(git2::Signature::now(name, email)?)
    }

    // =========================================================================
    // Remote Operations
    // =========================================================================

    /// Get the URL for a remote.
    ///
    /// Returns `None` if the remote doesn't exist.
    pub fn remote_url(&self, name: &str) -> Result<Option<String>, GitError> {
        match self.repo.find_remote(name) {
            Ok(remote) => Ok(remote.url().map(String::from)),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(None),
            Err(e) => Err(GitError::from_git2(e, name)),
        }
    }

    /// Point remote `name` at `url`, creating it or replacing a stale URL.
    pub fn set_remote(&self, name: &str, url: &str) -> Result<(), GitError> {
        match self.remote_url(name)? {
            Some(existing) if existing == url => Ok(()),
            Some(_) => {
                self.repo
                    .remote_set_url(name, url)
                    .map_err(|e| GitError::from_git2(e, name))?;
                Ok(())
            }
            None => {
                self.repo
                    .remote(name, url)
                    .map_err(|e| GitError::from_git2(e, name))?;
                Ok(())
            }
        }
    }

    /// Remove a remote. Returns `false` if it did not exist.
    pub fn remove_remote(&self, name: &str) -> Result<bool, GitError> {
        match self.repo.remote_delete(name) {
            Ok(()) => Ok(true),
            Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
            Err(e) => Err(GitError::from_git2(e, name)),
        }
    }

    /// Push `branch` to the same-named branch on remote `name`.
    pub fn push(&self, name: &str, branch: &BranchName, force: bool) -> Result<(), GitError> {
        let mut remote = self.repo.find_remote(name).map_err(|e| {
            if e.code() == git2::ErrorCode::NotFound {
                GitError::RemoteNotFound {
                    name: name.to_string(),
                }
            } else {
                GitError::from_git2(e, name)
            }
        })?;
        self.push_branch(&mut remote, name, branch, force)
    }

    /// Push `branch` to a URL without configuring a named remote.
    pub fn push_to_url(&self, url: &str, branch: &BranchName, force: bool) -> Result<(), GitError> {
        let mut remote = self
            .repo
            .remote_anonymous(url)
            .map_err(|e| GitError::from_git2(e, url))?;
        self.push_branch(&mut remote, url, branch, force)
    }

    fn push_branch(
        &self,
        remote: &mut git2::Remote,
        label: &str,
        branch: &BranchName,
        force: bool,
    ) -> Result<(), GitError> {
        let refspec = format!(
            "{}refs/heads/{b}:refs/heads/{b}",
            if force { "+" } else { "" },
            b = branch
        );

        let rejection: RefCell<Option<String>> = RefCell::new(None);
        let token = self.identity.token.clone();
        let mut attempts = 0u8;

        let mut callbacks = git2::RemoteCallbacks::new();
        callbacks.credentials(move |_url, username, allowed| {
            attempts += 1;
            if attempts > 3 {
                return Err(git2::Error::from_str("authentication failed"));
            }
            if allowed.contains(git2::CredentialType::USER_PASS_PLAINTEXT) {
                if let Some(token) = &token {
                    return git2::Cred::userpass_plaintext("x-access-token", token);
                }
            }
            if allowed.contains(git2::CredentialType::SSH_KEY) {
                return git2::Cred::ssh_key_from_agent(username.unwrap_or("git"));
            }
            git2::Cred::default()
        });
        callbacks.push_update_reference(|refname, status| {
            if let Some(reason) = status {
                *rejection.borrow_mut() = Some(format!("{}: {}", refname, reason));
            }
            Ok(())
        });

        let mut opts = git2::PushOptions::new();
        opts.remote_callbacks(callbacks);

        remote
            .push(&[refspec.as_str()], Some(&mut opts))
            .map_err(|e| GitError::PushFailed {
                remote: label.to_string(),
                message: e.message().to_string(),
            })?;
        drop(opts);

        if let Some(message) = rejection.into_inner() {
            return Err(GitError::PushRejected { message });
        }

        debug!(remote = label, refspec = %refspec, "pushed");
        Ok(())
    }
}
