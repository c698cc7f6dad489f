//! Artifact Mirror CLI - keeps the mirror configuration in step with upstream.

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "artifact_mirror=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Autoupdate(args) => commands::autoupdate::execute(&cli.paths, args).await,
        Commands::Format => commands::format::run(&cli.paths),
        Commands::GenerateRegsync => commands::generate_regsync::run(&cli.paths),
        Commands::Validate(args) => commands::validate::execute(&cli.paths, &args).await,
    }
}
