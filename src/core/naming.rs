//! core::naming
//!
//! Remote repository naming rules and collision resolution.
//!
//! # Features
//!
//! - Derive a canonical remote-safe name from a node title
//! - Resolve collisions against the hosting backend by numeric suffix

use thiserror::Error;
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::forge::{Forge, ForgeError};

/// Longest repository name the hosting backend accepts.
pub const MAX_NAME_LEN: usize = 100;

/// Room kept free at the end of a canonical name for a `-N` suffix.
pub const SUFFIX_ROOM: usize = 4;

/// Name used when a title has no usable characters.
pub const DEFAULT_NAME: &str = "dreamnode";

/// Attempts before giving up on finding a free name.
pub const MAX_ATTEMPTS: u32 = 100;

/// Errors from name resolution.
#[derive(Debug, Error)]
pub enum NamingError {
    #[error("no free repository name for '{title}' after {attempts} attempts")]
    Exhausted { title: String, attempts: u32 },

    #[error(transparent)]
    Forge(#[from] ForgeError),
}

/// Generate a remote-safe slug from a title.
///
/// - Lowercase, diacritics stripped
/// - Every run of other characters becomes one hyphen
/// - Truncated to leave room for a collision suffix
/// - Empty results become [`DEFAULT_NAME`]
///
/// # Example
///
/// ```
/// use interbrain_publish::core::naming::slugify;
///
/// assert_eq!(slugify("My Idea"), "my-idea");
/// assert_eq!(slugify("Café Été!"), "cafe-ete");
/// assert_eq!(slugify("???"), "dreamnode");
/// ```
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_sep = false;

    for c in title.nfd().filter(|c| !is_combining_mark(*c)) {
        if c.is_ascii_alphanumeric() {
            if pending_sep && !slug.is_empty() {
                slug.push('-');
            }
            pending_sep = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_sep = true;
        }
    }

    // Slug is pure ASCII here, so byte truncation is safe.
    slug.truncate(MAX_NAME_LEN - SUFFIX_ROOM);
    let trimmed = slug.trim_matches('-');

    if trimmed.is_empty() {
        DEFAULT_NAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Candidate name for the given attempt (1-based).
fn candidate(base: &str, attempt: u32) -> String {
    if attempt == 1 {
        base.to_string()
    } else {
        format!("{}-{}", base, attempt)
    }
}

/// Find a repository name for `title` that is not taken on the backend.
///
/// Backend errors during the existence check propagate unchanged.
pub async fn resolve_available_name(forge: &dyn Forge, title: &str) -> Result<String, NamingError> {
    let base = slugify(title);

    for attempt in 1..=MAX_ATTEMPTS {
        let name = candidate(&base, attempt);
        if !forge.repo_exists(&name).await? {
            debug!(title, name = %name, attempt, "resolved repository name");
            return Ok(name);
        }
        debug!(name = %name, "repository name taken");
    }

    Err(NamingError::Exhausted {
        title: title.to_string(),
        attempts: MAX_ATTEMPTS,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::mock::{FailOn, MockForge};

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("Hello World"), "hello-world");
        assert_eq!(slugify("My Idea"), "my-idea");
        assert_eq!(slugify("fix: something"), "fix-something");
    }

    #[test]
    fn slugify_collapses_runs() {
        assert_eq!(slugify("a  --  b"), "a-b");
        assert_eq!(slugify("  leading and trailing  "), "leading-and-trailing");
        assert_eq!(slugify("Test: foo/bar"), "test-foo-bar");
    }

    #[test]
    fn slugify_strips_diacritics() {
        assert_eq!(slugify("Ångström Über"), "angstrom-uber");
        assert_eq!(slugify("naïve résumé"), "naive-resume");
    }

    #[test]
    fn slugify_empty_uses_default() {
        assert_eq!(slugify(""), DEFAULT_NAME);
        assert_eq!(slugify("!!!"), DEFAULT_NAME);
        assert_eq!(slugify("日本語"), DEFAULT_NAME);
    }

    #[test]
    fn slugify_truncates_with_suffix_room() {
        let long = "word ".repeat(60);
        let slug = slugify(&long);
        assert!(slug.len() <= MAX_NAME_LEN - SUFFIX_ROOM);
        assert!(!slug.ends_with('-'));
    }

    #[tokio::test]
    async fn free_name_used_as_is() {
        let forge = MockForge::new();
        let name = resolve_available_name(&forge, "My Idea").await.unwrap();
        assert_eq!(name, "my-idea");
    }

    #[tokio::test]
    async fn collision_appends_suffix() {
        let forge = MockForge::new().with_repo("my-idea").with_repo("my-idea-2");
        let name = resolve_available_name(&forge, "My Idea").await.unwrap();
        assert_eq!(name, "my-idea-3");
    }

    #[tokio::test]
    async fn exhaustion_is_an_error() {
        let mut forge = MockForge::new().with_repo("x");
        for n in 2..=MAX_ATTEMPTS {
            forge = forge.with_repo(&format!("x-{}", n));
        }
        let err = resolve_available_name(&forge, "x").await.unwrap_err();
        assert!(matches!(err, NamingError::Exhausted { attempts: 100, .. }));
    }

    #[tokio::test]
    async fn backend_errors_propagate() {
        let forge = MockForge::new().fail_on(FailOn::RepoExists(ForgeError::NetworkError(
            "offline".into(),
        )));
        let err = resolve_available_name(&forge, "anything").await.unwrap_err();
        assert!(matches!(err, NamingError::Forge(ForgeError::NetworkError(_))));
    }
}
