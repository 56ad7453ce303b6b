//! cli::args
//!
//! Command-line argument definitions using clap derive.
//!
//! # Global Flags
//!
//! These flags are available on all commands:
//! - `--help` / `-h`: Show help
//! - `--version`: Show version
//! - `--cwd <path>`: Run as if in that directory
//! - `--debug`: Enable debug logging
//! - `--quiet` / `-q`: Minimal output

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Publish DreamNodes and everything they depend on
#[derive(Parser, Debug)]
#[command(name = "ib-publish")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Run as if ib-publish was started in this directory
    #[arg(long, global = true)]
    pub cwd: Option<PathBuf>,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Minimal output
    #[arg(short, long, global = true, conflicts_with = "debug")]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Parse command-line arguments.
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

/// Available commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Publish nodes and their dependencies
    #[command(
        name = "publish",
        long_about = "Publish DreamNodes and every node they depend on.\n\n\
            Each node gets a hosted repository, a static site and a one-click clone \
            link. Dependencies are published first and the declaring node's \
            .gitmodules is updated to point at them. Publishing an already \
            published node refreshes its content and site without creating a new \
            repository.",
        after_help = "\
WORKFLOW EXAMPLES:
    # Publish one node
    ib-publish publish my-idea

    # Publish several independent nodes, one after another
    ib-publish publish idea-a idea-b

AUTHENTICATION:
    The token is read from $GITHUB_TOKEN unless token_env is configured."
    )]
    Publish {
        /// Node directories to publish
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Remove published nodes from the hosting backend
    #[command(
        name = "unpublish",
        long_about = "Remove DreamNodes and their published dependencies from the \
            hosting backend.\n\n\
            Deletes the site branch and the hosted repository, removes the local \
            remote and clears the publication record. Local content is untouched. \
            Deleting repositories requires a token with the delete_repo scope."
    )]
    Unpublish {
        /// Node directories to unpublish
        #[arg(required = true, value_name = "PATH")]
        paths: Vec<PathBuf>,
    },

    /// Show a node's publication state and dependencies
    Status {
        /// Node directory (default: current directory)
        #[arg(value_name = "PATH")]
        path: Option<PathBuf>,
    },

    /// Show or initialize configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Generate shell completion scripts
    #[command(
        name = "completion",
        after_help = "\
WORKFLOW EXAMPLES:
    # Bash (add to ~/.bashrc)
    ib-publish completion bash >> ~/.bashrc

    # Zsh (add to ~/.zshrc)
    ib-publish completion zsh >> ~/.zshrc"
    )]
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print the configuration file locations
    Path,
    /// Write a workspace configuration file
    Init {
        /// Remote name to publish under
        #[arg(long)]
        remote: Option<String>,
        /// Branch to deploy sites to
        #[arg(long)]
        site_branch: Option<String>,
    },
}

/// Supported shells for completion
#[derive(clap::ValueEnum, Debug, Clone, Copy)]
#[allow(clippy::enum_variant_names)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}
