//! core::config::schema
//!
//! Configuration schema types.
//!
//! # Global Config
//!
//! Located at (in order of precedence):
//! 1. `$INTERBRAIN_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/interbrain/config.toml`
//! 3. `~/.interbrain/config.toml` (canonical write location)
//!
//! # Workspace Config
//!
//! Located at `<workspace>/.interbrain/publish.toml`.
//!
//! # Validation
//!
//! Config values are validated after parsing (e.g., the site branch must be a
//! valid branch name, the API base must be an http(s) URL).

use serde::{Deserialize, Serialize};

use super::ConfigError;
use crate::core::types::BranchName;

/// Global configuration (user scope).
///
/// # Example
///
/// ```toml
/// forge = "github"
/// api_base = "https://api.github.com"
/// token_env = "GITHUB_TOKEN"
/// private = false
/// deep_link_prefix = "app://clone?repo="
///
/// [author]
/// name = "Dreamer"
/// email = "dreamer@example.com"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct GlobalConfig {
    /// Hosting backend (e.g., "github")
    pub forge: Option<String>,

    /// REST API base URL (GitHub Enterprise, tests)
    pub api_base: Option<String>,

    /// Environment variable holding the API token
    pub token_env: Option<String>,

    /// Create published repositories as private
    pub private: Option<bool>,

    /// Prefix of one-click clone links
    pub deep_link_prefix: Option<String>,

    /// Commit identity used when git has none configured
    pub author: Option<AuthorConfig>,
}

impl GlobalConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(forge) = &self.forge {
            let valid_forges = crate::forge::valid_forge_names();
            if !valid_forges.contains(&forge.as_str()) {
                return Err(ConfigError::InvalidValue(format!(
                    "invalid forge '{}', must be one of: {}",
                    forge,
                    valid_forges.join(", ")
                )));
            }
        }

        if let Some(api_base) = &self.api_base {
            if !(api_base.starts_with("https://") || api_base.starts_with("http://")) {
                return Err(ConfigError::InvalidValue(format!(
                    "api_base must be an http(s) URL, got '{}'",
                    api_base
                )));
            }
        }

        if let Some(token_env) = &self.token_env {
            if token_env.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "token_env cannot be empty".to_string(),
                ));
            }
        }

        if let Some(prefix) = &self.deep_link_prefix {
            if prefix.trim().is_empty() {
                return Err(ConfigError::InvalidValue(
                    "deep_link_prefix cannot be empty".to_string(),
                ));
            }
        }

        if let Some(author) = &self.author {
            author.validate()?;
        }

        Ok(())
    }
}

/// Workspace configuration.
///
/// # Example
///
/// ```toml
/// remote = "origin"
/// site_branch = "gh-pages"
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct WorkspaceConfig {
    /// Remote name nodes are published under (default: "origin")
    pub remote: Option<String>,

    /// Branch the static site is deployed to (default: "gh-pages")
    pub site_branch: Option<String>,
}

impl WorkspaceConfig {
    /// Validate the configuration values.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if any value is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Some(branch) = &self.site_branch {
            BranchName::new(branch).map_err(|e| {
                ConfigError::InvalidValue(format!("invalid site branch name: {}", e))
            })?;
        }

        if let Some(remote) = &self.remote {
            if remote.is_empty() {
                return Err(ConfigError::InvalidValue(
                    "remote cannot be empty".to_string(),
                ));
            }
        }

        Ok(())
    }
}

/// Commit author fallback.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct AuthorConfig {
    pub name: Option<String>,
    pub email: Option<String>,
}

impl AuthorConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(email) = &self.email {
            if !email.contains('@') {
                return Err(ConfigError::InvalidValue(format!(
                    "author email '{}' is not an email address",
                    email
                )));
            }
        }
        Ok(())
    }
}
