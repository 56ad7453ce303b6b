//! unpublish command - Remove nodes from the hosting backend

use std::path::PathBuf;

use anyhow::{bail, Result};

use super::{build_engine, build_forge, load_config, resolve_path, runtime};
use crate::engine::{BatchCoordinator, Context};
use crate::ui::output::{self, Verbosity};

/// Unpublish the nodes at `paths`.
pub fn unpublish(ctx: &Context, paths: &[PathBuf]) -> Result<()> {
    let rt = runtime()?;
    rt.block_on(unpublish_async(ctx, paths))
}

async fn unpublish_async(ctx: &Context, paths: &[PathBuf]) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let config = load_config(ctx)?;
    let forge = build_forge(&config)?;
    let engine = build_engine(&config, forge.as_ref())?;

    let roots = paths
        .iter()
        .map(|p| resolve_path(ctx, p))
        .collect::<Result<Vec<_>>>()?;

    let report = BatchCoordinator::new(engine).unpublish_all(&roots).await;

    for entry in &report.entries {
        match &entry.result {
            Ok(outcome) => {
                output::success(
                    format!(
                        "Unpublished {} ({} node{})",
                        entry.path.display(),
                        outcome.unpublished.len(),
                        if outcome.unpublished.len() == 1 { "" } else { "s" }
                    ),
                    verbosity,
                );
                for skipped in &outcome.skipped {
                    output::warn(
                        format!("dependency '{}' skipped: {}", skipped.name, skipped.reason),
                        verbosity,
                    );
                }
            }
            Err(e) => output::error(format!("{}: {}", entry.path.display(), e)),
        }
    }

    let failed = report.entries.len() - report.succeeded();
    if failed > 0 {
        bail!("{} of {} nodes could not be unpublished", failed, report.entries.len());
    }
    Ok(())
}
