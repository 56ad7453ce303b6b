//! core::config
//!
//! Configuration schema and loading.
//!
//! # Overview
//!
//! Two configuration scopes:
//! - **Global**: User-level settings (backend, token source, commit identity)
//! - **Workspace**: Per-workspace overrides (remote name, site branch)
//!
//! # Precedence
//!
//! Configuration values are resolved in this order (later overrides earlier):
//! 1. Default values
//! 2. Global config file
//! 3. Workspace config file
//! 4. CLI flags (not handled here)
//!
//! # Global Config Locations
//!
//! Searched in order:
//! 1. `$INTERBRAIN_CONFIG` if set
//! 2. `$XDG_CONFIG_HOME/interbrain/config.toml`
//! 3. `~/.interbrain/config.toml` (canonical write location)
//!
//! # Workspace Config Location
//!
//! `<workspace>/.interbrain/publish.toml`
//!
//! # Example
//!
//! ```no_run
//! use interbrain_publish::core::config::Config;
//! use std::path::Path;
//!
//! let result = Config::load(Some(Path::new("/path/to/workspace"))).unwrap();
//! let config = result.config;
//!
//! println!("Remote: {}", config.remote());
//! println!("Site branch: {}", config.site_branch());
//! ```

pub mod schema;

pub use schema::{AuthorConfig, GlobalConfig, WorkspaceConfig};

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Default GitHub REST API base URL.
pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// Default environment variable holding the API token.
pub const DEFAULT_TOKEN_ENV: &str = "GITHUB_TOKEN";

/// Default prefix of one-click clone links.
pub const DEFAULT_DEEP_LINK_PREFIX: &str = "app://clone?repo=";

/// Default static-site branch.
pub const DEFAULT_SITE_BRANCH: &str = "gh-pages";

/// Errors from configuration operations.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config file '{path}': {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("failed to write config file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config value: {0}")]
    InvalidValue(String),

    #[error("home directory not found")]
    NoHomeDir,
}

/// Result of loading configuration.
#[derive(Debug)]
pub struct ConfigLoadResult {
    /// The loaded configuration.
    pub config: Config,
}

/// Merged configuration from all sources.
///
/// Accessor methods apply precedence and defaults.
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Global configuration
    pub global: GlobalConfig,
    /// Workspace configuration (if present)
    pub workspace: Option<WorkspaceConfig>,
    global_path: Option<PathBuf>,
    workspace_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from default locations.
    ///
    /// If `workspace` is provided, also loads the workspace config.
    ///
    /// # Errors
    ///
    /// Returns an error if config files exist but cannot be parsed or fail
    /// validation. Missing config files are not an error.
    pub fn load(workspace: Option<&Path>) -> Result<ConfigLoadResult, ConfigError> {
        let (global, global_path) = Self::load_global()?;

        let (workspace_config, workspace_path) = match workspace {
            Some(dir) => Self::load_workspace(dir)?,
            None => (None, None),
        };

        global.validate()?;
        if let Some(ref w) = workspace_config {
            w.validate()?;
        }

        Ok(ConfigLoadResult {
            config: Config {
                global,
                workspace: workspace_config,
                global_path,
                workspace_path,
            },
        })
    }

    fn load_global() -> Result<(GlobalConfig, Option<PathBuf>), ConfigError> {
        if let Ok(path) = std::env::var("INTERBRAIN_CONFIG") {
            let path = PathBuf::from(path);
            if path.exists() {
                let config = Self::read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        if let Ok(xdg_home) = std::env::var("XDG_CONFIG_HOME") {
            let path = PathBuf::from(xdg_home).join("interbrain/config.toml");
            if path.exists() {
                let config = Self::read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        if let Some(home) = dirs::home_dir() {
            let path = home.join(".interbrain/config.toml");
            if path.exists() {
                let config = Self::read_toml(&path)?;
                return Ok((config, Some(path)));
            }
        }

        Ok((GlobalConfig::default(), None))
    }

    fn load_workspace(
        dir: &Path,
    ) -> Result<(Option<WorkspaceConfig>, Option<PathBuf>), ConfigError> {
        let path = Self::workspace_config_path(dir);
        if !path.exists() {
            return Ok((None, None));
        }
        let config = Self::read_toml(&path)?;
        Ok((Some(config), Some(path)))
    }

    fn read_toml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }

    /// Get the canonical path for global config.
    ///
    /// Returns `~/.interbrain/config.toml`.
    pub fn global_config_path() -> Result<PathBuf, ConfigError> {
        let home = dirs::home_dir().ok_or(ConfigError::NoHomeDir)?;
        Ok(home.join(".interbrain/config.toml"))
    }

    /// Get the path for workspace config.
    pub fn workspace_config_path(dir: &Path) -> PathBuf {
        dir.join(".interbrain/publish.toml")
    }

    /// Write workspace config atomically.
    pub fn write_workspace(dir: &Path, config: &WorkspaceConfig) -> Result<PathBuf, ConfigError> {
        let path = Self::workspace_config_path(dir);
        Self::write_config_atomic(&path, config)?;
        Ok(path)
    }

    /// Write a config file atomically (temp file, then rename).
    fn write_config_atomic<T: serde::Serialize>(
        path: &Path,
        config: &T,
    ) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            })?;
        }

        let contents =
            toml::to_string_pretty(config).map_err(|e| ConfigError::InvalidValue(e.to_string()))?;

        let temp_path = path.with_extension("toml.tmp");
        let mut file = fs::File::create(&temp_path).map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        file.write_all(contents.as_bytes())
            .map_err(|e| ConfigError::WriteError {
                path: temp_path.clone(),
                source: e,
            })?;

        file.sync_all().map_err(|e| ConfigError::WriteError {
            path: temp_path.clone(),
            source: e,
        })?;

        fs::rename(&temp_path, path).map_err(|e| ConfigError::WriteError {
            path: path.to_path_buf(),
            source: e,
        })?;

        Ok(())
    }

    // =========================================================================
    // Accessor methods with precedence
    // =========================================================================

    /// Hosting backend. Defaults to "github".
    pub fn forge(&self) -> &str {
        self.global.forge.as_deref().unwrap_or("github")
    }

    /// REST API base URL.
    pub fn api_base(&self) -> &str {
        self.global.api_base.as_deref().unwrap_or(DEFAULT_API_BASE)
    }

    /// Name of the environment variable holding the token.
    pub fn token_env(&self) -> &str {
        self.global.token_env.as_deref().unwrap_or(DEFAULT_TOKEN_ENV)
    }

    /// The API token, read from [`Config::token_env`].
    pub fn token(&self) -> Option<String> {
        std::env::var(self.token_env())
            .ok()
            .filter(|t| !t.trim().is_empty())
    }

    /// Whether new repositories are private. Defaults to `false`.
    pub fn private(&self) -> bool {
        self.global.private.unwrap_or(false)
    }

    /// Prefix of one-click clone links.
    pub fn deep_link_prefix(&self) -> &str {
        self.global
            .deep_link_prefix
            .as_deref()
            .unwrap_or(DEFAULT_DEEP_LINK_PREFIX)
    }

    /// Fallback commit author name, if configured.
    pub fn author_name(&self) -> Option<&str> {
        self.global.author.as_ref().and_then(|a| a.name.as_deref())
    }

    /// Fallback commit author email, if configured.
    pub fn author_email(&self) -> Option<&str> {
        self.global.author.as_ref().and_then(|a| a.email.as_deref())
    }

    /// Remote name. Defaults to "origin".
    pub fn remote(&self) -> &str {
        self.workspace
            .as_ref()
            .and_then(|w| w.remote.as_deref())
            .unwrap_or("origin")
    }

    /// Static-site branch. Defaults to "gh-pages".
    pub fn site_branch(&self) -> &str {
        self.workspace
            .as_ref()
            .and_then(|w| w.site_branch.as_deref())
            .unwrap_or(DEFAULT_SITE_BRANCH)
    }

    /// Get the path to the loaded global config file.
    pub fn global_config_loaded_from(&self) -> Option<&Path> {
        self.global_path.as_deref()
    }

    /// Get the path to the loaded workspace config file.
    pub fn workspace_config_loaded_from(&self) -> Option<&Path> {
        self.workspace_path.as_deref()
    }
}
