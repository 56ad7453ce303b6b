//! site::builder
//!
//! Static bundle assembly and orphan-branch deployment.
//!
//! # Bundle Layout
//!
//! | File | Content |
//! |------|---------|
//! | `index.html` | Rendered page |
//! | `node.json` | Node metadata, content blocks and link map |
//! | `style.css`, `links.js` | Packaged assets |
//! | `.nojekyll` | Serve files as-is |
//!
//! # Deployment
//!
//! The bundle directory becomes its own repository with a single parentless
//! commit on the site branch, force-pushed to the node's remote. The site
//! branch therefore shares no history with the node's source.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use serde::Serialize;
use tempfile::TempDir;
use tera::{Context, Tera};
use tracing::{debug, info};

use super::content::{ContentBlock, ContentResolver};
use super::SiteError;
use crate::core::node::Node;
use crate::core::types::{BranchName, NodeId, PublicationRecord};
use crate::git::{Git, GitIdentity};

const INDEX_TEMPLATE: &str = "index.html";

// Embedded at compile time so the binary carries its own site skeleton.
const TEMPLATES: &[(&str, &str)] = &[(INDEX_TEMPLATE, include_str!("templates/index.html.tera"))];

const ASSETS: &[(&str, &str)] = &[
    ("style.css", include_str!("assets/style.css")),
    ("links.js", include_str!("assets/links.js")),
    (".nojekyll", ""),
];

/// Where a published dependency can be reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkTarget {
    pub title: String,
    pub repo_url: String,
    pub site_url: Option<String>,
}

/// Dependency id to link target, rendered into the page.
pub type LinkMap = BTreeMap<String, LinkTarget>;

/// Build the link map from published dependencies.
pub fn link_map<'a>(
    deps: impl IntoIterator<Item = (NodeId, &'a str, &'a PublicationRecord)>,
) -> LinkMap {
    deps.into_iter()
        .map(|(id, title, record)| {
            (
                id.to_string(),
                LinkTarget {
                    title: title.to_string(),
                    repo_url: record.repo_url.clone(),
                    site_url: record.site_url.clone(),
                },
            )
        })
        .collect()
}

/// A built site in a transient directory, removed on drop.
#[derive(Debug)]
pub struct SiteBundle {
    dir: TempDir,
    files: Vec<String>,
}

impl SiteBundle {
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Files written, relative to [`SiteBundle::path`].
    pub fn files(&self) -> &[String] {
        &self.files
    }
}

#[derive(Serialize)]
struct NodeView<'a> {
    id: String,
    title: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Serialize)]
struct NodeDocument<'a> {
    node: &'a NodeView<'a>,
    blocks: &'a [ContentBlock],
    links: &'a LinkMap,
}

/// Renders and deploys node sites.
pub struct SiteBuilder {
    tera: Tera,
    branch: BranchName,
    identity: GitIdentity,
}

impl std::fmt::Debug for SiteBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteBuilder")
            .field("branch", &self.branch)
            .finish()
    }
}

impl SiteBuilder {
    /// Create a builder deploying to `branch`.
    pub fn new(branch: BranchName) -> Result<Self, SiteError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATES.iter().copied())?;
        Ok(Self {
            tera,
            branch,
            identity: GitIdentity::default(),
        })
    }

    /// Commit identity and push credentials for deploys.
    pub fn with_identity(mut self, identity: GitIdentity) -> Self {
        self.identity = identity;
        self
    }

    pub fn branch(&self) -> &BranchName {
        &self.branch
    }

    /// Render a node into a fresh bundle.
    pub fn build(
        &self,
        node: &Node,
        publication: Option<&PublicationRecord>,
        blocks: &[ContentBlock],
        links: &LinkMap,
    ) -> Result<SiteBundle, SiteError> {
        let dir = TempDir::new().map_err(|e| SiteError::Io {
            path: std::env::temp_dir(),
            source: e,
        })?;

        let view = NodeView {
            id: node.id().to_string(),
            title: node.title(),
            kind: &node.metadata.kind,
        };

        let links_json = serde_json::to_string(links)?.replace("</", "<\\/");
        let mut context = Context::new();
        context.insert("node", &view);
        context.insert("publication", &publication);
        context.insert("blocks", blocks);
        context.insert("links", links);
        context.insert("links_json", &links_json);
        let page = self.tera.render(INDEX_TEMPLATE, &context)?;

        let document = NodeDocument {
            node: &view,
            blocks,
            links,
        };
        let json = serde_json::to_string_pretty(&document)?;

        let mut files = Vec::new();
        let mut write = |name: &str, contents: &str| -> Result<(), SiteError> {
            let path = dir.path().join(name);
            fs::write(&path, contents).map_err(|e| SiteError::Io { path, source: e })?;
            files.push(name.to_string());
            Ok(())
        };

        write("index.html", &page)?;
        write("node.json", &json)?;
        for &(name, contents) in ASSETS {
            write(name, contents)?;
        }

        debug!(node = %node.id(), files = files.len(), "site bundle built");
        Ok(SiteBundle { dir, files })
    }

    /// Force-push the bundle as a parentless commit on the site branch.
    ///
    /// The bundle's directory is removed when this returns, on every path.
    pub fn deploy(&self, bundle: SiteBundle, push_url: &str) -> Result<(), SiteError> {
        let git = Git::init(bundle.path())?.with_identity(self.identity.clone());
        git.commit_orphan(&self.branch, "Publish DreamNode site")?;
        git.push_to_url(push_url, &self.branch, true)?;
        info!(branch = %self.branch, "site deployed");
        Ok(())
    }

    /// Resolve content, build and deploy in one step.
    pub fn build_and_deploy(
        &self,
        node: &Node,
        publication: Option<&PublicationRecord>,
        content: &dyn ContentResolver,
        links: &LinkMap,
        push_url: &str,
    ) -> Result<(), SiteError> {
        let blocks = content.resolve(node)?;
        let bundle = self.build(node, publication, &blocks, links)?;
        self.deploy(bundle, push_url)
    }
}
