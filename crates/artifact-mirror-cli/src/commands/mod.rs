//! CLI commands and argument parsing.

pub mod autoupdate;
pub mod format;
pub mod generate_regsync;
pub mod validate;

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Artifact Mirror - keeps mirrored container images in step with upstream
#[derive(Parser)]
#[command(name = "artifact-mirror")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub paths: Paths,

    #[command(subcommand)]
    pub command: Commands,
}

/// Files every command reads or writes.
#[derive(Args, Debug, Clone)]
pub struct Paths {
    /// Path to the mirror config file
    #[arg(short = 'c', long, global = true, default_value = "config.yaml")]
    pub config_path: PathBuf,

    /// Path to the autoupdate config file
    #[arg(long, global = true, default_value = "autoupdate.yaml")]
    pub autoupdate_path: PathBuf,

    /// Path to the generated sync file
    #[arg(long, global = true, default_value = "regsync.yaml")]
    pub regsync_path: PathBuf,
}

/// Available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Discover new tags and open pull requests adding them
    Autoupdate(autoupdate::AutoupdateArgs),

    /// Rewrite the config and autoupdate files in canonical order
    Format,

    /// Regenerate the sync file from the config file
    GenerateRegsync,

    /// Check the config file for mistakes
    Validate(validate::ValidateArgs),
}
