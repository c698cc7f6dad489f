//! Autoupdate command implementation.

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;

use artifact_mirror_autoupdate::orchestrator::DEFAULT_BASE_BRANCH;
use artifact_mirror_autoupdate::{
    load_entries, AutoUpdateOptions, AutoUpdater, GitCli, GithubClient, HelmCli, StrategyContext,
    VersionControl,
};
use artifact_mirror_core::Config;
use artifact_mirror_registry::{
    Credentials, HttpConfig, RegistryResolver, ReqwestTransport, RetryingClient,
};

use super::Paths;

/// Arguments for the autoupdate command.
#[derive(Args, Debug)]
pub struct AutoupdateArgs {
    /// Print what would be done without committing or opening pull requests
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Only run the entry with this name
    #[arg(short, long)]
    pub entry: Option<String>,

    /// Token for the GitHub API and ghcr.io
    #[arg(long, env = "GITHUB_TOKEN", hide_env_values = true)]
    pub github_token: Option<String>,

    /// Repository pull requests are opened against, as <owner>/<repo>
    #[arg(long, env = "GITHUB_REPOSITORY")]
    pub github_repository: Option<String>,

    /// Branch pull requests target
    #[arg(long, default_value = DEFAULT_BASE_BRANCH)]
    pub base_branch: String,
}

/// Splits `<owner>/<repo>`.
fn split_repository(repository: &str) -> Result<(&str, &str)> {
    match repository.split_once('/') {
        Some((owner, repo)) if !owner.is_empty() && !repo.is_empty() && !repo.contains('/') => {
            Ok((owner, repo))
        }
        _ => bail!("must define GITHUB_REPOSITORY in form <owner>/<repo>"),
    }
}

/// Runs the autoupdate command.
pub async fn execute(paths: &Paths, args: AutoupdateArgs) -> Result<()> {
    let git = Arc::new(GitCli::new());
    if !args.dry_run {
        let clean = git
            .is_working_tree_clean()
            .await
            .context("failed to get status of working tree")?;
        if !clean {
            bail!("working tree or index has changes");
        }
    }

    let config = Config::load(&paths.config_path)
        .with_context(|| format!("failed to parse {}", paths.config_path.display()))?;
    let entries = load_entries(&paths.autoupdate_path)
        .with_context(|| format!("failed to parse {}", paths.autoupdate_path.display()))?;

    let token = args.github_token.filter(|t| !t.is_empty());
    if token.is_none() && !args.dry_run {
        bail!("must define GITHUB_TOKEN");
    }
    let repository = args
        .github_repository
        .filter(|r| !r.is_empty())
        .context("must define GITHUB_REPOSITORY")?;
    let (owner, repo) = split_repository(&repository)?;

    if let Some(name) = args.entry.as_deref() {
        if !entries.iter().any(|e| e.name == name) {
            bail!("no entry named {name:?} in {}", paths.autoupdate_path.display());
        }
    }

    let transport =
        ReqwestTransport::new(&HttpConfig::default()).context("failed to build HTTP client")?;
    let http = RetryingClient::new(Arc::new(transport));
    let mut credentials = Credentials::new();
    if let Some(token) = token.as_deref() {
        credentials = credentials.with_github_token(token);
    }
    let github = Arc::new(GithubClient::new(http.clone()).with_token(token.as_deref()));
    let context = StrategyContext {
        releases: github.clone(),
        tags: Arc::new(RegistryResolver::new(http, credentials)),
        helm: Arc::new(HelmCli::new()),
    };

    let options = AutoUpdateOptions::new(owner, repo)
        .with_dry_run(args.dry_run)
        .with_base_branch(&args.base_branch)
        .with_paths(&paths.config_path, &paths.regsync_path);
    info!(
        repository = %repository,
        entries = entries.len(),
        dry_run = args.dry_run,
        "starting autoupdate"
    );

    let updater = AutoUpdater::new(context, github, git, options);
    let summary = updater.run(&entries, &config, args.entry.as_deref()).await;
    for line in summary.report_lines() {
        println!("{line}");
    }

    if summary.has_failures() {
        bail!(
            "one or more {} entries failed to update; please see above logs for details",
            paths.autoupdate_path.display()
        );
    }
    Ok(())
}
