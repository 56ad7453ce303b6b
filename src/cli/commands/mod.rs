//! cli::commands
//!
//! Command dispatch and handlers.
//!
//! # Architecture
//!
//! Each command handler:
//! 1. Resolves paths against `--cwd`
//! 2. Loads configuration and builds the engine
//! 3. Formats and displays output
//!
//! # Async Commands
//!
//! Publish and unpublish talk to the hosting backend, so they are async.
//! Their synchronous wrappers build a current-thread runtime and block on
//! the async implementation.

mod completion;
mod config_cmd;
mod publish;
mod status;
mod unpublish;

pub use completion::completion;
pub use config_cmd::{init as config_init, path as config_path, show as config_show};
pub use publish::publish;
pub use status::status;
pub use unpublish::unpublish;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};

use crate::cli::args::{Command, ConfigAction};
use crate::core::config::Config;
use crate::engine::{Context, Engine, EngineSettings};
use crate::forge::{create_forge, Forge};

/// Dispatch a command to its handler.
pub fn dispatch(command: Command, ctx: &Context) -> Result<()> {
    match command {
        Command::Publish { paths } => publish::publish(ctx, &paths),
        Command::Unpublish { paths } => unpublish::unpublish(ctx, &paths),
        Command::Status { path } => status::status(ctx, path.as_deref()),
        Command::Config { action } => match action {
            ConfigAction::Show => config_cmd::show(ctx),
            ConfigAction::Path => config_cmd::path(ctx),
            ConfigAction::Init {
                remote,
                site_branch,
            } => config_cmd::init(ctx, remote, site_branch),
        },
        Command::Completion { shell } => completion::completion(shell),
    }
}

/// The directory commands run in.
pub(crate) fn working_dir(ctx: &Context) -> Result<PathBuf> {
    match &ctx.cwd {
        Some(dir) => Ok(dir.clone()),
        None => std::env::current_dir().context("Failed to determine current directory"),
    }
}

/// Resolve a user-supplied path against the working directory.
pub(crate) fn resolve_path(ctx: &Context, path: &Path) -> Result<PathBuf> {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir(ctx)?.join(path)
    };
    std::fs::canonicalize(&joined)
        .with_context(|| format!("Node directory not found: {}", joined.display()))
}

/// Load configuration, with the working directory as the workspace.
pub(crate) fn load_config(ctx: &Context) -> Result<Config> {
    let dir = working_dir(ctx)?;
    let result = Config::load(Some(&dir)).context("Failed to load config")?;
    Ok(result.config)
}

/// Build the configured hosting backend client.
pub(crate) fn build_forge(config: &Config) -> Result<Box<dyn Forge>> {
    create_forge(config.forge(), config.token(), config.api_base())
        .context("Failed to create hosting backend client")
}

/// Build an engine over `forge`.
pub(crate) fn build_engine<'a>(config: &Config, forge: &'a dyn Forge) -> Result<Engine<'a>> {
    let settings = EngineSettings::from_config(config).context("Invalid configuration")?;
    Engine::new(forge, settings).context("Failed to load site templates")
}

/// Runtime for the async commands.
pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")
}
