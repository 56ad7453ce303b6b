//! forge::mock
//!
//! Mock forge implementation for deterministic testing.
//!
//! # Design
//!
//! Repositories live in memory, but each created repository is also backed by
//! a real bare repository in a temporary directory, so pushes made by the
//! publisher land somewhere and can be inspected. Failure scenarios are
//! configured with [`FailOn`] rules, optionally scoped to one repository name.
//!
//! # Example
//!
//! ```
//! use interbrain_publish::forge::mock::MockForge;
//! use interbrain_publish::forge::{CreateRepoRequest, Forge};
//!
//! # tokio_test::block_on(async {
//! let forge = MockForge::new().with_repo("my-idea");
//!
//! assert!(forge.repo_exists("my-idea").await.unwrap());
//!
//! let repo = forge.create_repo(CreateRepoRequest {
//!     name: "other".to_string(),
//!     description: None,
//!     private: false,
//! }).await.unwrap();
//!
//! assert_eq!(repo.url, "https://github.com/mock-owner/other");
//! assert_eq!(forge.create_count(), 1);
//! # });
//! ```

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use tempfile::TempDir;

use super::traits::{CreateRepoRequest, Forge, ForgeError, RemoteRepo};
use crate::core::types::{BranchName, RepoCoordinates};
use crate::git::Git;

/// Owner of every mock repository.
pub const MOCK_OWNER: &str = "mock-owner";

/// Mock forge for testing.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockForge {
    /// Internal state shared across clones.
    inner: Arc<Mutex<MockForgeInner>>,
    /// Storage for bare repositories, removed when the last clone drops.
    storage: Option<Arc<TempDir>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockForgeInner {
    /// Repositories by name.
    repos: BTreeMap<String, MockRepo>,
    /// Failure rules (for testing error paths).
    fail_on: Vec<FailOn>,
    /// Recorded operations for verification.
    operations: Vec<MockOperation>,
}

#[derive(Debug, Clone, Default)]
struct MockRepo {
    /// Bare repository backing this entry, absent for seeded names.
    path: Option<PathBuf>,
    site_url: Option<String>,
}

/// Configuration for which operation should fail.
#[derive(Debug, Clone)]
pub enum FailOn {
    /// Fail check_available with the given error.
    CheckAvailable(ForgeError),
    /// Fail repo_exists with the given error.
    RepoExists(ForgeError),
    /// Fail create_repo, for one name or for all.
    CreateRepo {
        name: Option<String>,
        error: ForgeError,
    },
    /// Fail delete_repo, for one name or for all.
    DeleteRepo {
        name: Option<String>,
        error: ForgeError,
    },
    /// Fail enable_site with the given error.
    EnableSite(ForgeError),
    /// Fail delete_site_ref with the given error.
    DeleteSiteRef(ForgeError),
}

/// Recorded operation for test verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockOperation {
    CheckAvailable,
    RepoExists { name: String },
    CreateRepo { name: String },
    DeleteRepo { owner: String, name: String },
    EnableSite { repo_url: String, branch: String },
    DeleteSiteRef { repo_url: String, branch: String },
}

impl MockForge {
    /// Create a new empty mock forge.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MockForgeInner::default())),
            storage: TempDir::new().ok().map(Arc::new),
        }
    }

    /// Seed a repository name as already taken.
    pub fn with_repo(self, name: &str) -> Self {
        self.state()
            .repos
            .insert(name.to_string(), MockRepo::default());
        self
    }

    /// Add a failure rule.
    ///
    /// # Example
    ///
    /// ```
    /// use interbrain_publish::forge::mock::{MockForge, FailOn};
    /// use interbrain_publish::forge::ForgeError;
    ///
    /// let forge = MockForge::new()
    ///     .fail_on(FailOn::CreateRepo { name: Some("r".into()), error: ForgeError::RateLimited });
    /// ```
    pub fn fail_on(self, fail_on: FailOn) -> Self {
        self.add_fail_on(fail_on);
        self
    }

    /// Add a failure rule to a forge already in use.
    pub fn add_fail_on(&self, fail_on: FailOn) {
        self.state().fail_on.push(fail_on);
    }

    /// Clear all failure rules.
    pub fn clear_fail_on(&self) {
        self.state().fail_on.clear();
    }

    /// Get all recorded operations.
    pub fn operations(&self) -> Vec<MockOperation> {
        self.state().operations.clone()
    }

    /// Number of create_repo calls that succeeded.
    pub fn create_count(&self) -> usize {
        self.state()
            .operations
            .iter()
            .filter(|op| matches!(op, MockOperation::CreateRepo { .. }))
            .count()
    }

    /// Names of all repositories currently held.
    pub fn repo_names(&self) -> Vec<String> {
        self.state().repos.keys().cloned().collect()
    }

    /// Whether a repository exists (synchronous, for assertions).
    pub fn has_repo(&self, name: &str) -> bool {
        self.state().repos.contains_key(name)
    }

    /// Path of the bare repository backing `name`.
    pub fn repo_path(&self, name: &str) -> Option<PathBuf> {
        self.state().repos.get(name).and_then(|r| r.path.clone())
    }

    /// Whether `branch` exists in the bare repository backing `name`.
    pub fn has_branch(&self, name: &str, branch: &str) -> bool {
        let (Some(path), Ok(branch)) = (self.repo_path(name), BranchName::new(branch)) else {
            return false;
        };
        Git::open_bare(&path)
            .map(|git| git.branch_exists(&branch))
            .unwrap_or(false)
    }

    /// Public URL of a mock repository.
    pub fn repo_url(name: &str) -> String {
        format!("https://github.com/{}/{}", MOCK_OWNER, name)
    }

    fn state(&self) -> MutexGuard<'_, MockForgeInner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record an operation.
    fn record(&self, op: MockOperation) {
        self.state().operations.push(op);
    }

    /// Check if we should fail and return the error if so.
    fn check_fail(&self, matches: impl Fn(&FailOn) -> Option<ForgeError>) -> Result<(), ForgeError> {
        match self.state().fail_on.iter().find_map(matches) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// Name of a mock repository URL, rejecting other owners.
    fn name_of(repo_url: &str) -> Result<String, ForgeError> {
        match RepoCoordinates::parse(repo_url) {
            Some(c) if c.owner == MOCK_OWNER => Ok(c.name),
            _ => Err(ForgeError::InvalidRepoUrl(repo_url.to_string())),
        }
    }

    fn bare_path(&self, name: &str) -> Result<PathBuf, ForgeError> {
        self.storage
            .as_ref()
            .map(|dir| dir.path().join(format!("{}.git", name)))
            .ok_or_else(|| ForgeError::ApiError {
                status: 500,
                message: "mock storage unavailable".into(),
            })
    }
}

impl Default for MockForge {
    fn default() -> Self {
        Self::new()
    }
}

fn scoped(rule: &Option<String>, name: &str) -> bool {
    rule.as_deref().map_or(true, |n| n == name)
}

#[async_trait]
impl Forge for MockForge {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn check_available(&self) -> Result<String, ForgeError> {
        self.record(MockOperation::CheckAvailable);
        self.check_fail(|f| match f {
            FailOn::CheckAvailable(e) => Some(e.clone()),
            _ => None,
        })?;
        Ok(MOCK_OWNER.to_string())
    }

    async fn repo_exists(&self, name: &str) -> Result<bool, ForgeError> {
        self.record(MockOperation::RepoExists {
            name: name.to_string(),
        });
        self.check_fail(|f| match f {
            FailOn::RepoExists(e) => Some(e.clone()),
            _ => None,
        })?;
        Ok(self.has_repo(name))
    }

    async fn create_repo(&self, request: CreateRepoRequest) -> Result<RemoteRepo, ForgeError> {
        let name = request.name;
        self.check_fail(|f| match f {
            FailOn::CreateRepo { name: rule, error } if scoped(rule, &name) => Some(error.clone()),
            _ => None,
        })?;

        if self.has_repo(&name) {
            return Err(ForgeError::AlreadyExists(name));
        }

        let path = self.bare_path(&name)?;
        Git::init_bare(&path).map_err(|e| ForgeError::ApiError {
            status: 500,
            message: e.to_string(),
        })?;

        let mut inner = self.state();
        inner.repos.insert(
            name.clone(),
            MockRepo {
                path: Some(path.clone()),
                site_url: None,
            },
        );
        inner.operations.push(MockOperation::CreateRepo { name: name.clone() });

        Ok(RemoteRepo {
            owner: MOCK_OWNER.to_string(),
            url: Self::repo_url(&name),
            push_url: path.to_string_lossy().into_owned(),
            name,
        })
    }

    async fn delete_repo(&self, owner: &str, name: &str) -> Result<(), ForgeError> {
        self.record(MockOperation::DeleteRepo {
            owner: owner.to_string(),
            name: name.to_string(),
        });
        self.check_fail(|f| match f {
            FailOn::DeleteRepo { name: rule, error } if scoped(rule, name) => Some(error.clone()),
            _ => None,
        })?;

        if owner != MOCK_OWNER {
            return Err(ForgeError::NotFound(format!("{}/{}", owner, name)));
        }

        let removed = self.state().repos.remove(name);
        match removed {
            Some(repo) => {
                if let Some(path) = repo.path {
                    let _ = std::fs::remove_dir_all(path);
                }
                Ok(())
            }
            None => Err(ForgeError::NotFound(format!("{}/{}", owner, name))),
        }
    }

    async fn enable_site(&self, repo_url: &str, branch: &str) -> Result<String, ForgeError> {
        self.record(MockOperation::EnableSite {
            repo_url: repo_url.to_string(),
            branch: branch.to_string(),
        });
        self.check_fail(|f| match f {
            FailOn::EnableSite(e) => Some(e.clone()),
            _ => None,
        })?;

        let name = Self::name_of(repo_url)?;
        if !self.has_repo(&name) {
            return Err(ForgeError::NotFound(repo_url.to_string()));
        }
        if !self.has_branch(&name, branch) {
            return Err(ForgeError::ApiError {
                status: 422,
                message: format!("branch '{}' does not exist", branch),
            });
        }

        let mut inner = self.state();
        let repo = inner.repos.entry(name.clone()).or_default();
        let url = repo
            .site_url
            .get_or_insert_with(|| format!("https://{}.github.io/{}/", MOCK_OWNER, name))
            .clone();
        Ok(url)
    }

    async fn delete_site_ref(&self, repo_url: &str, branch: &str) -> Result<(), ForgeError> {
        self.record(MockOperation::DeleteSiteRef {
            repo_url: repo_url.to_string(),
            branch: branch.to_string(),
        });
        self.check_fail(|f| match f {
            FailOn::DeleteSiteRef(e) => Some(e.clone()),
            _ => None,
        })?;

        let name = Self::name_of(repo_url)?;
        let not_found = || ForgeError::NotFound(format!("{}@{}", repo_url, branch));
        let path = self.repo_path(&name).ok_or_else(not_found)?;
        let branch_name = BranchName::new(branch).map_err(|_| not_found())?;

        let deleted = Git::open_bare(&path)
            .and_then(|git| git.delete_branch(&branch_name))
            .map_err(|e| ForgeError::ApiError {
                status: 500,
                message: e.to_string(),
            })?;
        if !deleted {
            return Err(not_found());
        }

        if let Some(repo) = self.state().repos.get_mut(&name) {
            repo.site_url = None;
        }
        Ok(())
    }

    fn push_url(&self, repo_url: &str) -> Result<String, ForgeError> {
        let name = Self::name_of(repo_url)?;
        Ok(self.bare_path(&name)?.to_string_lossy().into_owned())
    }
}
