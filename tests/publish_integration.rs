//! Integration tests for recursive publication.
//!
//! Each test builds a workspace of real node repositories in a temp dir and
//! publishes them against MockForge, whose repositories are real bare
//! repositories, so every push is exercised.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

use interbrain_publish::core::metadata::{MetadataStore, NodeMetadata, METADATA_FILE};
use interbrain_publish::core::node::Node;
use interbrain_publish::core::types::NodeId;
use interbrain_publish::engine::{
    BatchCoordinator, Engine, EngineSettings, PublishError, SkipReason, UnpublishError,
};
use interbrain_publish::forge::mock::{FailOn, MockForge, MockOperation};
use interbrain_publish::forge::{Forge, ForgeError};
use interbrain_publish::git::{Git, GitIdentity};
use interbrain_publish::site::{ContentBlock, ContentResolver, SiteError};

fn identity() -> GitIdentity {
    GitIdentity {
        name: Some("Test User".into()),
        email: Some("test@example.com".into()),
        token: None,
    }
}

fn engine(forge: &MockForge) -> Engine<'_> {
    let settings = EngineSettings {
        identity: identity(),
        ..EngineSettings::default()
    };
    Engine::new(forge, settings).expect("engine")
}

/// A directory of sibling nodes.
struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create a node directory with metadata, a README and declarations
    /// pointing at sibling directories, without version control.
    fn plain_node(&self, dir_name: &str, title: &str, deps: &[&str]) -> PathBuf {
        let dir = self.path().join(dir_name);
        fs::create_dir_all(&dir).unwrap();
        MetadataStore::new(&dir)
            .write(&NodeMetadata::new(title))
            .unwrap();
        fs::write(dir.join("README.md"), format!("# {}\n\nSome thoughts.\n", title)).unwrap();
        if !deps.is_empty() {
            let text: String = deps
                .iter()
                .map(|d| format!("[submodule \"{d}\"]\n\tpath = {d}\n\turl = ../{d}\n"))
                .collect();
            fs::write(dir.join(".gitmodules"), text).unwrap();
        }
        dir
    }

    /// Create a committed node.
    fn node(&self, dir_name: &str, title: &str, deps: &[&str]) -> PathBuf {
        let dir = self.plain_node(dir_name, title, deps);
        let git = Git::init(&dir).unwrap().with_identity(identity());
        git.stage_all_and_commit("Initial commit").unwrap();
        dir
    }
}

fn metadata(dir: &Path) -> NodeMetadata {
    MetadataStore::new(dir).read().unwrap()
}

fn id_of(dir: &Path) -> NodeId {
    metadata(dir).id
}

fn declarations(dir: &Path) -> String {
    fs::read_to_string(dir.join(".gitmodules")).unwrap()
}

/// Run the git CLI in `dir`, panicking on failure.
fn git_cli(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .current_dir(dir)
        .args(["-c", "user.name=Test User", "-c", "user.email=test@example.com"])
        .args(args)
        .output()
        .expect("failed to run git");
    assert!(output.status.success(), "git {:?} failed", args);
    String::from_utf8_lossy(&output.stdout).into_owned()
}

/// The `node.json` deployed on the site branch of a mock repository.
fn deployed_document(forge: &MockForge, name: &str) -> String {
    let bare = forge.repo_path(name).expect("repository exists");
    git_cli(&bare, &["show", "gh-pages:node.json"])
}

/// Content source that always fails.
struct BrokenContent;

impl ContentResolver for BrokenContent {
    fn resolve(&self, node: &Node) -> Result<Vec<ContentBlock>, SiteError> {
        Err(SiteError::Io {
            path: node.local_path.join("README.md"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "unreadable"),
        })
    }
}

/// Content source that corrupts the node's metadata while rendering.
struct CorruptingContent;

impl ContentResolver for CorruptingContent {
    fn resolve(&self, node: &Node) -> Result<Vec<ContentBlock>, SiteError> {
        let path = node.local_path.join(METADATA_FILE);
        fs::write(&path, "not json").map_err(|e| SiteError::Io { path, source: e })?;
        Ok(vec![])
    }
}

// =============================================================================
// Single node
// =============================================================================

mod single_node {
    use super::*;

    #[tokio::test]
    async fn publish_records_repository_site_and_deep_link() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();

        let outcome = engine(&forge).publish(&dir).await.unwrap();

        assert_eq!(outcome.record.repo_url, MockForge::repo_url("my-idea"));
        assert_eq!(
            outcome.record.site_url.as_deref(),
            Some("https://mock-owner.github.io/my-idea/")
        );
        assert_eq!(
            outcome.record.deep_link,
            "app://clone?repo=github.com/mock-owner/my-idea"
        );
        assert!(outcome.skipped.is_empty());

        let meta = metadata(&dir);
        assert_eq!(meta.repo_url.as_deref(), Some(outcome.record.repo_url.as_str()));
        assert_eq!(meta.site_url, outcome.record.site_url);
    }

    #[tokio::test]
    async fn publish_pushes_source_and_site_branches() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();

        engine(&forge).publish(&dir).await.unwrap();

        assert!(forge.has_branch("my-idea", "gh-pages"));
        let git = Git::open(&dir).unwrap();
        let branch = git.current_branch().unwrap().unwrap();
        assert!(forge.has_branch("my-idea", branch.as_str()));
        assert!(git.remote_url("origin").unwrap().is_some());
    }

    #[tokio::test]
    async fn publish_is_idempotent() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();
        let engine = engine(&forge);

        let first = engine.publish(&dir).await.unwrap();
        let second = engine.publish(&dir).await.unwrap();

        assert_eq!(first.record.repo_url, second.record.repo_url);
        assert_eq!(forge.create_count(), 1);
    }

    #[tokio::test]
    async fn naming_collision_gets_suffix() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new().with_repo("my-idea");

        let outcome = engine(&forge).publish(&dir).await.unwrap();

        assert_eq!(outcome.record.repo_url, MockForge::repo_url("my-idea-2"));
    }

    #[tokio::test]
    async fn plain_directory_gets_a_repository() {
        let ws = Workspace::new();
        let dir = ws.plain_node("loose", "Loose Thought", &[]);
        let forge = MockForge::new();

        engine(&forge).publish(&dir).await.unwrap();

        let git = Git::open(&dir).unwrap();
        assert!(git.has_history());
        assert!(forge.has_repo("loose-thought"));
    }

    #[tokio::test]
    async fn unavailable_backend_aborts() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new().fail_on(FailOn::CheckAvailable(ForgeError::AuthRequired));

        let err = engine(&forge).publish(&dir).await.unwrap_err();

        assert!(matches!(err, PublishError::BackendUnavailable(_)));
        assert_eq!(forge.create_count(), 0);
        assert!(!metadata(&dir).is_published());
    }

    #[tokio::test]
    async fn site_hosting_failure_is_not_fatal() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new().fail_on(FailOn::EnableSite(ForgeError::ApiError {
            status: 500,
            message: "pages unavailable".into(),
        }));

        let outcome = engine(&forge).publish(&dir).await.unwrap();

        assert!(outcome.record.site_url.is_none());
        assert!(metadata(&dir).is_published());
    }

    #[tokio::test]
    async fn rejected_refresh_push_keeps_publication() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();
        let engine = engine(&forge);

        let first = engine.publish(&dir).await.unwrap();
        git_cli(&dir, &["commit", "--amend", "--quiet", "-m", "Rewritten history"]);
        let second = engine.publish(&dir).await.unwrap();

        assert_eq!(first.record.repo_url, second.record.repo_url);
        assert_eq!(forge.create_count(), 1);
        assert!(metadata(&dir).is_published());
    }

    #[tokio::test]
    async fn content_failure_still_publishes() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();

        let outcome = engine(&forge)
            .with_content(BrokenContent)
            .publish(&dir)
            .await
            .unwrap();

        assert_eq!(outcome.record.repo_url, MockForge::repo_url("my-idea"));
        assert!(outcome.record.site_url.is_none());
        assert!(metadata(&dir).is_published());
        assert!(!forge.has_branch("my-idea", "gh-pages"));
    }

    #[tokio::test]
    async fn content_failure_keeps_existing_site() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();

        let first = engine(&forge).publish(&dir).await.unwrap();
        let second = engine(&forge)
            .with_content(BrokenContent)
            .publish(&dir)
            .await
            .unwrap();

        assert!(first.record.site_url.is_some());
        assert_eq!(second.record.site_url, first.record.site_url);
    }

    #[tokio::test]
    async fn unsaved_record_removes_created_repository() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let saved = fs::read(dir.join(METADATA_FILE)).unwrap();
        let forge = MockForge::new();

        let err = engine(&forge)
            .with_content(CorruptingContent)
            .publish(&dir)
            .await
            .unwrap_err();

        assert!(matches!(err, PublishError::Metadata(_)));
        assert!(!forge.has_repo("my-idea"));
        assert!(forge.operations().contains(&MockOperation::DeleteRepo {
            owner: "mock-owner".into(),
            name: "my-idea".into(),
        }));
        assert_eq!(Git::open(&dir).unwrap().remote_url("origin").unwrap(), None);

        fs::write(dir.join(METADATA_FILE), saved).unwrap();
        let outcome = engine(&forge).publish(&dir).await.unwrap();
        assert_eq!(outcome.record.repo_url, MockForge::repo_url("my-idea"));
    }

    #[tokio::test]
    async fn missing_metadata_is_an_error() {
        let ws = Workspace::new();
        let dir = ws.path().join("empty");
        fs::create_dir_all(&dir).unwrap();
        let forge = MockForge::new();

        let err = engine(&forge).publish(&dir).await.unwrap_err();

        assert!(matches!(err, PublishError::Node(_)));
    }
}

// =============================================================================
// Dependency graphs
// =============================================================================

mod graphs {
    use super::*;

    #[tokio::test]
    async fn dependencies_published_first_and_declarations_rewritten() {
        let ws = Workspace::new();
        let parent = ws.node("parent", "Parent", &["child"]);
        let child = ws.node("child", "Child", &[]);
        let forge = MockForge::new();

        let outcome = engine(&forge).publish(&parent).await.unwrap();

        let child_meta = metadata(&child);
        let child_url = child_meta.repo_url.clone().unwrap();
        assert_eq!(outcome.published_dependencies.len(), 1);
        assert_eq!(outcome.published_dependencies[0].id, child_meta.id);
        assert!(declarations(&parent).contains(&format!("url = {}", child_url)));

        let creates: Vec<_> = forge
            .operations()
            .into_iter()
            .filter_map(|op| match op {
                MockOperation::CreateRepo { name } => Some(name),
                _ => None,
            })
            .collect();
        assert_eq!(creates, vec!["child".to_string(), "parent".to_string()]);
    }

    #[tokio::test]
    async fn cycle_terminates_and_links_both_ways() {
        let ws = Workspace::new();
        let a = ws.node("a", "A", &["b"]);
        let b = ws.node("b", "B", &["a"]);
        let forge = MockForge::new();

        let outcome = engine(&forge).publish(&a).await.unwrap();

        let a_url = metadata(&a).repo_url.unwrap();
        let b_url = metadata(&b).repo_url.unwrap();
        assert!(declarations(&a).contains(&format!("url = {}", b_url)));
        assert!(declarations(&b).contains(&format!("url = {}", a_url)));
        assert!(outcome.skipped.is_empty());
        assert_eq!(forge.create_count(), 2);
    }

    #[tokio::test]
    async fn cycle_sites_link_both_ways() {
        let ws = Workspace::new();
        let a = ws.node("a", "A", &["b"]);
        let b = ws.node("b", "B", &["a"]);
        let forge = MockForge::new();

        engine(&forge).publish(&a).await.unwrap();

        let a_site = deployed_document(&forge, "a");
        let b_site = deployed_document(&forge, "b");
        assert!(a_site.contains(&id_of(&b).to_string()));
        assert!(b_site.contains(&id_of(&a).to_string()));
        assert!(b_site.contains(&MockForge::repo_url("a")));
    }

    #[tokio::test]
    async fn cycle_republish_creates_nothing() {
        let ws = Workspace::new();
        let a = ws.node("a", "A", &["b"]);
        ws.node("b", "B", &["a"]);
        let forge = MockForge::new();
        let engine = engine(&forge);

        engine.publish(&a).await.unwrap();
        let again = engine.publish(&a).await.unwrap();

        assert_eq!(forge.create_count(), 2);
        assert!(again.skipped.is_empty());
    }

    #[tokio::test]
    async fn self_dependency_resolves_after_publication() {
        let ws = Workspace::new();
        let dir = ws.path().join("narcissus");
        fs::create_dir_all(&dir).unwrap();
        MetadataStore::new(&dir)
            .write(&NodeMetadata::new("Narcissus"))
            .unwrap();
        fs::write(
            dir.join(".gitmodules"),
            "[submodule \"self\"]\n\tpath = self\n\turl = .\n",
        )
        .unwrap();
        Git::init(&dir)
            .unwrap()
            .with_identity(identity())
            .stage_all_and_commit("Initial commit")
            .unwrap();
        let forge = MockForge::new();

        let outcome = engine(&forge).publish(&dir).await.unwrap();

        assert!(outcome.skipped.is_empty());
        assert!(declarations(&dir).contains(&format!("url = {}", outcome.record.repo_url)));
    }

    #[tokio::test]
    async fn cycle_through_failed_node_is_reported_unresolved() {
        let ws = Workspace::new();
        let root = ws.node("root", "Root", &["x"]);
        let x = ws.node("x", "X", &["y"]);
        let y = ws.node("y", "Y", &["x"]);
        let forge = MockForge::new().fail_on(FailOn::CreateRepo {
            name: Some("x".into()),
            error: ForgeError::ApiError {
                status: 500,
                message: "boom".into(),
            },
        });

        let outcome = engine(&forge).publish(&root).await.unwrap();

        let x_id = id_of(&x);
        assert!(outcome
            .skipped
            .iter()
            .any(|s| s.id == Some(x_id) && s.reason == SkipReason::UnresolvedCycle));
        assert!(outcome
            .skipped
            .iter()
            .any(|s| s.id == Some(x_id) && matches!(s.reason, SkipReason::Failed(_))));
        assert!(metadata(&y).is_published());
        assert!(declarations(&y).contains("url = ../x"));
    }

    #[tokio::test]
    async fn failing_dependency_is_isolated() {
        let ws = Workspace::new();
        let p = ws.node("p", "P", &["q", "r"]);
        let q = ws.node("q", "Q", &[]);
        let r = ws.node("r", "R", &[]);
        let forge = MockForge::new().fail_on(FailOn::CreateRepo {
            name: Some("r".into()),
            error: ForgeError::ApiError {
                status: 500,
                message: "boom".into(),
            },
        });

        let outcome = engine(&forge).publish(&p).await.unwrap();

        assert!(metadata(&p).is_published());
        assert!(metadata(&q).is_published());
        assert!(!metadata(&r).is_published());
        assert_eq!(outcome.skipped_ids(), vec![id_of(&r)]);
        assert!(declarations(&p).contains("url = ../r"));
    }

    #[tokio::test]
    async fn nested_failures_are_flattened() {
        let ws = Workspace::new();
        let top = ws.node("top", "Top", &["mid"]);
        ws.node("mid", "Mid", &["leaf"]);
        let leaf = ws.node("leaf", "Leaf", &[]);
        let forge = MockForge::new().fail_on(FailOn::CreateRepo {
            name: Some("leaf".into()),
            error: ForgeError::ApiError {
                status: 500,
                message: "boom".into(),
            },
        });

        let outcome = engine(&forge).publish(&top).await.unwrap();

        assert_eq!(outcome.skipped_ids(), vec![id_of(&leaf)]);
    }

    #[tokio::test]
    async fn dead_reference_is_skipped() {
        let ws = Workspace::new();
        let p = ws.node("p", "P", &["missing"]);
        let forge = MockForge::new();

        let outcome = engine(&forge).publish(&p).await.unwrap();

        assert_eq!(outcome.skipped.len(), 1);
        assert_eq!(outcome.skipped[0].name, "missing");
        assert_eq!(outcome.skipped[0].reason, SkipReason::NotNavigable);
        assert!(metadata(&p).is_published());
    }

    #[tokio::test]
    async fn backend_loss_during_dependency_aborts() {
        let ws = Workspace::new();
        let p = ws.node("p", "P", &["q"]);
        ws.node("q", "Q", &[]);
        let forge = MockForge::new().fail_on(FailOn::CreateRepo {
            name: Some("q".into()),
            error: ForgeError::NetworkError("connection reset".into()),
        });

        let err = engine(&forge).publish(&p).await.unwrap_err();

        assert!(matches!(err, PublishError::BackendUnavailable(_)));
        assert!(!metadata(&p).is_published());
    }

    #[tokio::test]
    async fn visited_set_is_returned() {
        let ws = Workspace::new();
        let a = ws.node("a", "A", &["b"]);
        let b = ws.node("b", "B", &[]);
        let forge = MockForge::new();
        let mut visited = HashSet::new();

        engine(&forge)
            .publish_with_visited(&a, &mut visited)
            .await
            .unwrap();

        assert!(visited.contains(&id_of(&a)));
        assert!(visited.contains(&id_of(&b)));
    }
}

// =============================================================================
// Unpublish
// =============================================================================

mod unpublish {
    use super::*;

    #[tokio::test]
    async fn publish_then_unpublish_is_symmetric() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();
        let engine = engine(&forge);

        engine.publish(&dir).await.unwrap();
        let outcome = engine.unpublish(&dir).await.unwrap();

        let meta = metadata(&dir);
        assert!(meta.repo_url.is_none());
        assert!(meta.site_url.is_none());
        assert_eq!(outcome.unpublished, vec![meta.id]);
        assert!(!forge.repo_exists("my-idea").await.unwrap());
        assert!(Git::open(&dir).unwrap().remote_url("origin").unwrap().is_none());
    }

    #[tokio::test]
    async fn unpublish_tears_down_dependencies_first() {
        let ws = Workspace::new();
        let p = ws.node("p", "P", &["q"]);
        let q = ws.node("q", "Q", &[]);
        let forge = MockForge::new();
        let engine = engine(&forge);

        engine.publish(&p).await.unwrap();
        let outcome = engine.unpublish(&p).await.unwrap();

        assert_eq!(outcome.unpublished, vec![id_of(&q), id_of(&p)]);
        assert!(forge.repo_names().is_empty());
        // Declarations keep their remote URLs.
        assert!(declarations(&p).contains(&MockForge::repo_url("q")));
    }

    #[tokio::test]
    async fn unpublished_dependency_is_skipped_silently() {
        let ws = Workspace::new();
        let p = ws.node("p", "P", &["q"]);
        let q = ws.node("q", "Q", &[]);
        let forge = MockForge::new();
        let engine = engine(&forge);

        engine.publish(&p).await.unwrap();
        engine.unpublish(&q).await.unwrap();
        let outcome = engine.unpublish(&p).await.unwrap();

        assert_eq!(outcome.unpublished, vec![id_of(&p)]);
        assert!(outcome.skipped.is_empty());
    }

    #[tokio::test]
    async fn unpublished_root_is_an_error() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();

        let err = engine(&forge).unpublish(&dir).await.unwrap_err();

        assert!(matches!(err, UnpublishError::NotPublished { .. }));
    }

    #[tokio::test]
    async fn permission_denied_is_distinguished() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();
        let engine = engine(&forge);
        engine.publish(&dir).await.unwrap();

        forge.add_fail_on(FailOn::DeleteRepo {
            name: None,
            error: ForgeError::PermissionDenied("Must have admin rights".into()),
        });
        let err = engine.unpublish(&dir).await.unwrap_err();

        assert!(matches!(err, UnpublishError::PermissionDenied { .. }));
        assert!(err.to_string().contains("delete_repo"));
        assert!(metadata(&dir).is_published());
    }

    #[tokio::test]
    async fn repository_already_gone_counts_as_done() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();
        let engine = engine(&forge);
        engine.publish(&dir).await.unwrap();

        forge.delete_repo("mock-owner", "my-idea").await.unwrap();
        engine.unpublish(&dir).await.unwrap();

        assert!(!metadata(&dir).is_published());
    }

    #[tokio::test]
    async fn republish_after_unpublish_keeps_id() {
        let ws = Workspace::new();
        let dir = ws.node("my-idea", "My Idea", &[]);
        let forge = MockForge::new();
        let engine = engine(&forge);
        let id = id_of(&dir);

        engine.publish(&dir).await.unwrap();
        engine.unpublish(&dir).await.unwrap();
        let outcome = engine.publish(&dir).await.unwrap();

        assert_eq!(id_of(&dir), id);
        assert_eq!(outcome.record.repo_url, MockForge::repo_url("my-idea"));
    }
}

// =============================================================================
// Batch
// =============================================================================

mod batch {
    use super::*;

    #[tokio::test]
    async fn failing_root_does_not_stop_later_roots() {
        let ws = Workspace::new();
        let a = ws.node("a", "A", &[]);
        let broken = ws.path().join("broken");
        fs::create_dir_all(&broken).unwrap();
        let b = ws.node("b", "B", &[]);
        let forge = MockForge::new();

        let coordinator = BatchCoordinator::new(engine(&forge));
        let report = coordinator
            .publish_all(&[a.clone(), broken, b.clone()])
            .await;

        assert_eq!(report.entries.len(), 3);
        assert_eq!(report.succeeded(), 2);
        assert!(report.entries[1].result.is_err());
        assert!(metadata(&a).is_published());
        assert!(metadata(&b).is_published());
    }

    #[tokio::test]
    async fn batch_unpublish() {
        let ws = Workspace::new();
        let a = ws.node("a", "A", &[]);
        let b = ws.node("b", "B", &[]);
        let forge = MockForge::new();
        let coordinator = BatchCoordinator::new(engine(&forge));

        let roots = vec![a.clone(), b.clone()];
        assert!(coordinator.publish_all(&roots).await.is_success());
        let report = coordinator.unpublish_all(&roots).await;

        assert!(report.is_success());
        assert!(forge.repo_names().is_empty());
    }
}
