//! config command - Show configuration or write a workspace file

use anyhow::{Context as _, Result};

use super::{load_config, working_dir};
use crate::core::config::{Config, WorkspaceConfig};
use crate::engine::Context;

/// Print the effective configuration.
pub fn show(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;

    println!("# Effective Configuration");
    println!("forge = {}", config.forge());
    println!("api_base = {}", config.api_base());
    println!(
        "token_env = {} ({})",
        config.token_env(),
        if config.token().is_some() { "set" } else { "not set" }
    );
    println!("private = {}", config.private());
    println!("deep_link_prefix = {}", config.deep_link_prefix());
    println!("remote = {}", config.remote());
    println!("site_branch = {}", config.site_branch());
    match (config.author_name(), config.author_email()) {
        (None, None) => println!("author = (git config)"),
        (name, email) => println!(
            "author = {} <{}>",
            name.unwrap_or("(git config)"),
            email.unwrap_or("(git config)")
        ),
    }

    Ok(())
}

/// Print where configuration is read from.
pub fn path(ctx: &Context) -> Result<()> {
    let config = load_config(ctx)?;

    match config.global_config_loaded_from() {
        Some(p) => println!("global:    {}", p.display()),
        None => {
            let canonical = Config::global_config_path().context("Failed to locate home")?;
            println!("global:    {} (not present)", canonical.display());
        }
    }

    match config.workspace_config_loaded_from() {
        Some(p) => println!("workspace: {}", p.display()),
        None => println!(
            "workspace: {} (not present)",
            Config::workspace_config_path(&working_dir(ctx)?).display()
        ),
    }

    Ok(())
}

/// Write the workspace configuration file.
pub fn init(ctx: &Context, remote: Option<String>, site_branch: Option<String>) -> Result<()> {
    let dir = working_dir(ctx)?;
    let workspace = WorkspaceConfig {
        remote,
        site_branch,
    };
    workspace.validate().context("Invalid workspace configuration")?;

    let path = Config::write_workspace(&dir, &workspace).context("Failed to write config")?;
    if !ctx.quiet {
        println!("Wrote {}", path.display());
    }
    Ok(())
}
