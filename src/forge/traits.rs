//! forge::traits
//!
//! Forge trait definition for interacting with remote hosting services.
//!
//! # Design
//!
//! The `Forge` trait is async because forge operations involve network I/O.
//! All methods return `Result` to handle API errors gracefully.
//!
//! Idempotence lives partly here: "already configured" answers from the
//! backend are reported as success by implementations, while "already
//! deleted" answers surface as [`ForgeError::NotFound`] so callers can decide.
//!
//! # Example
//!
//! ```ignore
//! use interbrain_publish::forge::{Forge, CreateRepoRequest};
//!
//! async fn host(forge: &dyn Forge) -> Result<(), ForgeError> {
//!     forge.check_available().await?;
//!     let repo = forge.create_repo(CreateRepoRequest {
//!         name: "my-idea".to_string(),
//!         description: Some("My Idea".to_string()),
//!         private: false,
//!     }).await?;
//!     println!("Created {}", repo.url);
//!     Ok(())
//! }
//! ```

use async_trait::async_trait;
use thiserror::Error;

/// Errors from forge operations.
///
/// These error types map to common failure modes when interacting
/// with remote hosting services like GitHub.
#[derive(Debug, Clone, Error)]
pub enum ForgeError {
    /// Authentication is required but not available.
    #[error("authentication required")]
    AuthRequired,

    /// Authentication failed (invalid token, expired).
    #[error("authentication failed: {0}")]
    AuthFailed(String),

    /// Authenticated, but the token lacks rights for the operation.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// The resource already exists.
    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Rate limit exceeded.
    #[error("rate limited")]
    RateLimited,

    /// API returned an error.
    #[error("API error: {status} - {message}")]
    ApiError {
        /// HTTP status code
        status: u16,
        /// Error message from the API
        message: String,
    },

    /// Network or connection error.
    #[error("network error: {0}")]
    NetworkError(String),

    /// A repository URL that does not belong to this forge.
    #[error("invalid repository url: {0}")]
    InvalidRepoUrl(String),

    /// The operation is not supported by this forge.
    #[error("not implemented: {0}")]
    NotImplemented(String),
}

impl ForgeError {
    /// Whether this error means the backend cannot be used at all.
    pub fn is_unavailable(&self) -> bool {
        matches!(
            self,
            ForgeError::AuthRequired | ForgeError::AuthFailed(_) | ForgeError::NetworkError(_)
        )
    }
}

/// Request to create a repository.
#[derive(Debug, Clone)]
pub struct CreateRepoRequest {
    /// Repository name (already resolved to a free name)
    pub name: String,
    /// Optional description shown by the host
    pub description: Option<String>,
    /// Create as private
    pub private: bool,
}

/// A repository on the hosting backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteRepo {
    /// Owner (user or organization)
    pub owner: String,
    /// Repository name
    pub name: String,
    /// Public web URL, recorded as the node's `repoUrl`
    pub url: String,
    /// URL git pushes to
    pub push_url: String,
}

/// The Forge trait for interacting with remote hosting services.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow use across async tasks.
///
/// # Error Handling
///
/// All methods return `Result<T, ForgeError>`. Callers should handle:
/// - `AuthRequired` / `AuthFailed` / `NetworkError`: backend unavailable
/// - `PermissionDenied`: token lacks a scope, show remediation
/// - `NotFound`: resource doesn't exist (already deleted)
/// - `AlreadyExists`: name taken between check and create
#[async_trait]
pub trait Forge: Send + Sync {
    /// Get the forge name (e.g., "github").
    fn name(&self) -> &'static str;

    /// Check the backend is reachable and the token is accepted.
    ///
    /// Returns the authenticated login.
    async fn check_available(&self) -> Result<String, ForgeError>;

    /// Whether the authenticated owner already has a repository `name`.
    async fn repo_exists(&self, name: &str) -> Result<bool, ForgeError>;

    /// Create a repository owned by the authenticated user.
    ///
    /// # Errors
    ///
    /// - `AlreadyExists` if the name was taken
    /// - `PermissionDenied` if the token cannot create repositories
    async fn create_repo(&self, request: CreateRepoRequest) -> Result<RemoteRepo, ForgeError>;

    /// Delete a repository.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the repository is already gone
    /// - `PermissionDenied` if the token lacks the delete scope
    async fn delete_repo(&self, owner: &str, name: &str) -> Result<(), ForgeError>;

    /// Serve a static site from `branch` of the repository at `repo_url`.
    ///
    /// An already-configured site is success and returns its URL.
    async fn enable_site(&self, repo_url: &str, branch: &str) -> Result<String, ForgeError>;

    /// Delete the site branch of the repository at `repo_url`.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the branch or repository does not exist
    async fn delete_site_ref(&self, repo_url: &str, branch: &str) -> Result<(), ForgeError>;

    /// URL git pushes to for a previously recorded `repo_url`.
    fn push_url(&self, repo_url: &str) -> Result<String, ForgeError>;
}
