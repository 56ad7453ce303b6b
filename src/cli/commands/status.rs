//! status command - Show a node's publication state

use std::path::Path;

use anyhow::{Context as _, Result};

use super::{load_config, resolve_path, working_dir};
use crate::core::deps::SiblingResolver;
use crate::core::metadata::MetadataStore;
use crate::core::node::Node;
use crate::engine::Context;
use crate::ui::output::{self, Verbosity};

/// Print the publication state of the node at `path`.
///
/// Reads local state only; the hosting backend is not contacted.
pub fn status(ctx: &Context, path: Option<&Path>) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let config = load_config(ctx)?;
    let dir = match path {
        Some(p) => resolve_path(ctx, p)?,
        None => working_dir(ctx)?,
    };

    let node = Node::load(&dir, &SiblingResolver::default())
        .with_context(|| format!("Failed to load node at {}", dir.display()))?;

    println!("{} ({})", node.title(), node.id());
    match node.publication(config.deep_link_prefix()) {
        Some(record) => {
            println!("  published:  yes");
            println!("  repository: {}", record.repo_url);
            match &record.site_url {
                Some(site) => println!("  site:       {}", site),
                None => println!("  site:       (none)"),
            }
            println!("  clone link: {}", record.deep_link);
        }
        None => println!("  published:  no"),
    }

    if node.dependencies.is_empty() {
        output::print("  dependencies: (none)", verbosity);
        return Ok(());
    }

    output::print("  dependencies:", verbosity);
    for dep in &node.dependencies {
        let state = match dep.resolved_local_path.as_deref() {
            None => "not navigable".to_string(),
            Some(dep_dir) => match MetadataStore::new(dep_dir).read() {
                Ok(meta) if meta.is_published() => format!("{} (published)", meta.title),
                Ok(meta) => format!("{} (unpublished)", meta.title),
                Err(e) => format!("unreadable: {}", e),
            },
        };
        output::print(format!("    {} -> {}", dep.name, state), verbosity);
        output::debug(format!("{} declared as {}", dep.name, dep.remote_url), verbosity);
    }

    Ok(())
}
