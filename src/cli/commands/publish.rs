//! publish command - Publish nodes and their dependencies

use std::path::PathBuf;

use anyhow::{bail, Result};

use super::{build_engine, build_forge, load_config, resolve_path, runtime};
use crate::engine::{BatchCoordinator, Context, PublishOutcome};
use crate::ui::output::{self, Verbosity};

/// Publish the nodes at `paths`.
pub fn publish(ctx: &Context, paths: &[PathBuf]) -> Result<()> {
    let rt = runtime()?;
    rt.block_on(publish_async(ctx, paths))
}

async fn publish_async(ctx: &Context, paths: &[PathBuf]) -> Result<()> {
    let verbosity = Verbosity::from_flags(ctx.quiet, ctx.debug);
    let config = load_config(ctx)?;
    let forge = build_forge(&config)?;
    let engine = build_engine(&config, forge.as_ref())?;

    let roots = paths
        .iter()
        .map(|p| resolve_path(ctx, p))
        .collect::<Result<Vec<_>>>()?;

    let coordinator = BatchCoordinator::new(engine);
    let report = coordinator.publish_all(&roots).await;

    for entry in &report.entries {
        match &entry.result {
            Ok(outcome) => print_outcome(&entry.path.display().to_string(), outcome, verbosity),
            Err(e) => output::error(format!("{}: {}", entry.path.display(), e)),
        }
    }

    let failed = report.entries.len() - report.succeeded();
    if failed > 0 {
        bail!("{} of {} nodes could not be published", failed, report.entries.len());
    }
    Ok(())
}

fn print_outcome(path: &str, outcome: &PublishOutcome, verbosity: Verbosity) {
    let record = &outcome.record;
    output::success(format!("Published {}", path), verbosity);
    output::print(format!("  repository: {}", record.repo_url), verbosity);
    if let Some(site) = &record.site_url {
        output::print(format!("  site:       {}", site), verbosity);
    }
    output::print(format!("  clone link: {}", record.deep_link), verbosity);

    for dep in &outcome.published_dependencies {
        output::print(
            format!("  dependency {}: {}", dep.title, dep.record.repo_url),
            verbosity,
        );
    }
    for skipped in &outcome.skipped {
        output::warn(
            format!("dependency '{}' skipped: {}", skipped.name, skipped.reason),
            verbosity,
        );
    }
}
