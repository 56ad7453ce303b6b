//! forge::github
//!
//! GitHub forge implementation using the REST API.
//!
//! # Design
//!
//! Repositories are created under the authenticated user. The login is
//! fetched once per forge instance and cached in a `OnceCell`, so a whole
//! recursive publish costs a single `GET /user`.
//!
//! Static sites are GitHub Pages served from a branch root.
//!
//! # Status Mapping
//!
//! | Status | Error |
//! |--------|-------|
//! | 401 | `AuthFailed` |
//! | 403 | `PermissionDenied` (with required/granted scopes when reported) |
//! | 404 | `NotFound` |
//! | 422 on create | `AlreadyExists` |
//! | 429 | `RateLimited` |
//!
//! # Example
//!
//! ```ignore
//! use interbrain_publish::forge::github::GitHubForge;
//! use interbrain_publish::forge::Forge;
//!
//! let forge = GitHubForge::new(Some(token), "https://api.github.com");
//! let login = forge.check_available().await?;
//! ```

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, USER_AGENT};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::debug;

use super::traits::{CreateRepoRequest, Forge, ForgeError, RemoteRepo};
use crate::core::types::RepoCoordinates;

/// Default GitHub API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// User-Agent header value for API requests.
const USER_AGENT_VALUE: &str = "interbrain-publish";

/// GitHub forge implementation.
pub struct GitHubForge {
    /// HTTP client for making requests
    client: Client,
    /// Personal access token
    token: Option<String>,
    /// API base URL (configurable for GitHub Enterprise and tests)
    api_base: String,
    /// Authenticated login, fetched on first use
    login: OnceCell<String>,
}

// Custom Debug to avoid exposing the token
impl std::fmt::Debug for GitHubForge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GitHubForge")
            .field("has_token", &self.token.is_some())
            .field("api_base", &self.api_base)
            .field("login", &self.login.get())
            .finish()
    }
}

impl GitHubForge {
    /// Create a GitHub forge.
    ///
    /// # Arguments
    ///
    /// * `token` - Personal access token (`repo`, `delete_repo` scopes)
    /// * `api_base` - API base URL, e.g. `https://github.example.com/api/v3`
    pub fn new(token: Option<String>, api_base: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            login: OnceCell::new(),
        }
    }

    /// Get the API base URL.
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Build common headers for API requests.
    fn headers(&self) -> Result<HeaderMap, ForgeError> {
        let token = self.token.as_deref().ok_or(ForgeError::AuthRequired)?;
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ForgeError::AuthFailed("token contains invalid characters".into()))?,
        );
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(USER_AGENT_VALUE));
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static("2022-11-28"),
        );
        Ok(headers)
    }

    /// Attach headers and send, mapping transport failures.
    async fn send(&self, request: RequestBuilder) -> Result<Response, ForgeError> {
        request
            .headers(self.headers()?)
            .send()
            .await
            .map_err(|e| ForgeError::NetworkError(e.to_string()))
    }

    /// Build URL for a repository endpoint.
    fn repo_endpoint(&self, owner: &str, name: &str, path: &str) -> String {
        if path.is_empty() {
            format!("{}/repos/{}/{}", self.api_base, owner, name)
        } else {
            format!("{}/repos/{}/{}/{}", self.api_base, owner, name, path)
        }
    }

    /// The authenticated login, fetched once.
    async fn owner(&self) -> Result<String, ForgeError> {
        let login = self
            .login
            .get_or_try_init(|| async {
                let response = self
                    .send(self.client.get(format!("{}/user", self.api_base)))
                    .await?;
                let user: GitHubUser = self.handle_response(response).await?;
                debug!(login = %user.login, "authenticated");
                Ok::<_, ForgeError>(user.login)
            })
            .await?;
        Ok(login.clone())
    }

    /// Handle API response, mapping errors appropriately.
    async fn handle_response<T: for<'de> Deserialize<'de>>(
        &self,
        response: Response,
    ) -> Result<T, ForgeError> {
        let status = response.status();

        if status.is_success() {
            response.json().await.map_err(|e| ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("Failed to parse response: {}", e),
            })
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle a response whose success body is ignored.
    async fn handle_empty_response(&self, response: Response) -> Result<(), ForgeError> {
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            self.handle_error_response(response, status).await
        }
    }

    /// Handle an error response from the API.
    async fn handle_error_response<T>(
        &self,
        response: Response,
        status: StatusCode,
    ) -> Result<T, ForgeError> {
        // Classic tokens report scopes in headers; read them before the body.
        let headers = response.headers();
        let required_scopes = headers
            .get("X-Accepted-OAuth-Scopes")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let granted_scopes = headers
            .get("X-OAuth-Scopes")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let message = match response.json::<GitHubErrorResponse>().await {
            Ok(err) => err.message,
            Err(_) => "Unknown error".to_string(),
        };

        Err(match status {
            StatusCode::UNAUTHORIZED => ForgeError::AuthFailed("Invalid or expired token".into()),
            StatusCode::FORBIDDEN if message.to_lowercase().contains("rate limit") => {
                ForgeError::RateLimited
            }
            StatusCode::FORBIDDEN => {
                let mut err_msg = message;
                if let Some(scopes) = required_scopes.filter(|s| !s.is_empty()) {
                    err_msg.push_str(&format!(" [required scopes: {}]", scopes));
                    if let Some(granted) = granted_scopes {
                        err_msg.push_str(&format!(" [granted: {}]", granted));
                    }
                }
                ForgeError::PermissionDenied(err_msg)
            }
            StatusCode::NOT_FOUND => ForgeError::NotFound(message),
            StatusCode::TOO_MANY_REQUESTS => ForgeError::RateLimited,
            _ if status.is_server_error() => ForgeError::ApiError {
                status: status.as_u16(),
                message: format!("GitHub server error: {}", message),
            },
            _ => ForgeError::ApiError {
                status: status.as_u16(),
                message,
            },
        })
    }

    /// Owner and name of a recorded repository URL.
    fn coordinates(repo_url: &str) -> Result<RepoCoordinates, ForgeError> {
        RepoCoordinates::parse(repo_url)
            .ok_or_else(|| ForgeError::InvalidRepoUrl(repo_url.to_string()))
    }

    /// Pages URL GitHub assigns by default.
    pub fn default_site_url(owner: &str, name: &str) -> String {
        format!("https://{}.github.io/{}/", owner.to_lowercase(), name)
    }

    async fn existing_site_url(&self, owner: &str, name: &str) -> Result<String, ForgeError> {
        let response = self
            .send(self.client.get(self.repo_endpoint(owner, name, "pages")))
            .await?;
        let pages: GitHubPages = self.handle_response(response).await?;
        Ok(pages
            .html_url
            .unwrap_or_else(|| Self::default_site_url(owner, name)))
    }
}

#[async_trait]
impl Forge for GitHubForge {
    fn name(&self) -> &'static str {
        "github"
    }

    async fn check_available(&self) -> Result<String, ForgeError> {
        self.owner().await
    }

    async fn repo_exists(&self, name: &str) -> Result<bool, ForgeError> {
        let owner = self.owner().await?;
        let response = self
            .send(self.client.get(self.repo_endpoint(&owner, name, "")))
            .await?;

        match response.status() {
            s if s.is_success() => Ok(true),
            StatusCode::NOT_FOUND => Ok(false),
            s => self.handle_error_response(response, s).await,
        }
    }

    async fn create_repo(&self, request: CreateRepoRequest) -> Result<RemoteRepo, ForgeError> {
        let body = CreateRepoBody {
            name: &request.name,
            description: request.description.as_deref(),
            private: request.private,
            auto_init: false,
        };

        let response = self
            .send(
                self.client
                    .post(format!("{}/user/repos", self.api_base))
                    .json(&body),
            )
            .await?;

        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ForgeError::AlreadyExists(request.name));
        }

        let repo: GitHubRepo = self.handle_response(response).await?;
        debug!(repo = %repo.full_name(), "created repository");
        Ok(repo.into())
    }

    async fn delete_repo(&self, owner: &str, name: &str) -> Result<(), ForgeError> {
        let response = self
            .send(self.client.delete(self.repo_endpoint(owner, name, "")))
            .await?;
        self.handle_empty_response(response).await
    }

    async fn enable_site(&self, repo_url: &str, branch: &str) -> Result<String, ForgeError> {
        let coords = Self::coordinates(repo_url)?;
        let body = serde_json::json!({
            "source": { "branch": branch, "path": "/" }
        });

        let response = self
            .send(
                self.client
                    .post(self.repo_endpoint(&coords.owner, &coords.name, "pages"))
                    .json(&body),
            )
            .await?;

        match response.status() {
            StatusCode::CONFLICT => {
                debug!(repo = %coords, "pages already enabled");
                self.existing_site_url(&coords.owner, &coords.name).await
            }
            _ => {
                let pages: GitHubPages = self.handle_response(response).await?;
                Ok(pages
                    .html_url
                    .unwrap_or_else(|| Self::default_site_url(&coords.owner, &coords.name)))
            }
        }
    }

    async fn delete_site_ref(&self, repo_url: &str, branch: &str) -> Result<(), ForgeError> {
        let coords = Self::coordinates(repo_url)?;
        let path = format!("git/refs/heads/{}", branch);
        let response = self
            .send(
                self.client
                    .delete(self.repo_endpoint(&coords.owner, &coords.name, &path)),
            )
            .await?;

        // GitHub answers 422 "Reference does not exist" for a missing branch.
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(ForgeError::NotFound(format!("{}@{}", coords, branch)));
        }
        self.handle_empty_response(response).await
    }

    fn push_url(&self, repo_url: &str) -> Result<String, ForgeError> {
        let coords = Self::coordinates(repo_url)?;
        Ok(format!(
            "https://{}/{}/{}.git",
            coords.host, coords.owner, coords.name
        ))
    }
}

// --------------------------------------------------------------------------
// Request/Response Types
// --------------------------------------------------------------------------

/// Body for creating a repository.
#[derive(Serialize)]
struct CreateRepoBody<'a> {
    name: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    private: bool,
    auto_init: bool,
}

/// GitHub error response format.
#[derive(Deserialize)]
struct GitHubErrorResponse {
    message: String,
}

/// Authenticated user.
#[derive(Deserialize)]
struct GitHubUser {
    login: String,
}

/// Repository response (subset).
#[derive(Deserialize)]
struct GitHubRepo {
    name: String,
    html_url: String,
    clone_url: String,
    owner: GitHubOwnerInfo,
}

impl GitHubRepo {
    fn full_name(&self) -> String {
        format!("{}/{}", self.owner.login, self.name)
    }
}

/// Minimal GitHub owner info.
#[derive(Deserialize)]
struct GitHubOwnerInfo {
    login: String,
}

/// Pages site response (subset).
#[derive(Deserialize)]
struct GitHubPages {
    html_url: Option<String>,
}

impl From<GitHubRepo> for RemoteRepo {
    fn from(repo: GitHubRepo) -> Self {
        RemoteRepo {
            owner: repo.owner.login,
            name: repo.name,
            url: repo.html_url,
            push_url: repo.clone_url,
        }
    }
}
