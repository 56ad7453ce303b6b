//! forge::factory
//!
//! Forge selection and creation.
//!
//! # Design
//!
//! This module provides a central location for forge selection logic.
//! Commands use `create_forge()` instead of directly importing specific
//! forge implementations, ensuring the engine stays independent of any
//! one hosting backend.
//!
//! # Example
//!
//! ```ignore
//! use interbrain_publish::forge::create_forge;
//!
//! let forge = create_forge("github", Some(token), "https://api.github.com")?;
//! ```

use super::github::GitHubForge;
use super::traits::{Forge, ForgeError};

/// Supported forge providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForgeProvider {
    /// GitHub repositories and GitHub Pages
    GitHub,
}

impl ForgeProvider {
    /// Get all available providers.
    ///
    /// # Example
    ///
    /// ```
    /// use interbrain_publish::forge::ForgeProvider;
    ///
    /// let providers = ForgeProvider::all();
    /// assert!(providers.contains(&ForgeProvider::GitHub));
    /// ```
    pub fn all() -> &'static [ForgeProvider] {
        &[ForgeProvider::GitHub]
    }

    /// Get the provider name as a string.
    ///
    /// This matches the name used in configuration files.
    pub fn name(&self) -> &'static str {
        match self {
            ForgeProvider::GitHub => "github",
        }
    }

    /// Parse a provider from a string.
    ///
    /// # Example
    ///
    /// ```
    /// use interbrain_publish::forge::ForgeProvider;
    ///
    /// assert_eq!(ForgeProvider::parse("GitHub"), Some(ForgeProvider::GitHub));
    /// assert_eq!(ForgeProvider::parse("unknown"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "github" => Some(ForgeProvider::GitHub),
            _ => None,
        }
    }
}

impl std::fmt::Display for ForgeProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Names accepted by the `forge` config key.
pub fn valid_forge_names() -> Vec<&'static str> {
    ForgeProvider::all().iter().map(|p| p.name()).collect()
}

/// Create a forge by provider name.
///
/// # Arguments
///
/// * `provider` - Provider name from configuration
/// * `token` - API token, if one is available
/// * `api_base` - REST API base URL
///
/// # Errors
///
/// Returns `ForgeError::NotImplemented` for unknown providers.
pub fn create_forge(
    provider: &str,
    token: Option<String>,
    api_base: &str,
) -> Result<Box<dyn Forge>, ForgeError> {
    match ForgeProvider::parse(provider) {
        Some(ForgeProvider::GitHub) => Ok(Box::new(GitHubForge::new(token, api_base))),
        None => Err(ForgeError::NotImplemented(format!(
            "unknown forge '{}', expected one of: {}",
            provider,
            valid_forge_names().join(", ")
        ))),
    }
}
