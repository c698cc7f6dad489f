//! Validate command implementation.
//!
//! Every check runs and reports before the command fails, so one run
//! surfaces all problems with a config change.

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::{debug, info};

use artifact_mirror_autoupdate::orchestrator::DEFAULT_BASE_BRANCH;
use artifact_mirror_autoupdate::{GitCli, VersionControl};
use artifact_mirror_core::{Artifact, ArtifactAccumulator, Config};
use artifact_mirror_registry::client::DockerHubClient;
use artifact_mirror_registry::{HttpConfig, ReqwestTransport, RetryingClient, DOCKER_HUB_HOST};

use super::Paths;

/// Arguments for the validate command.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Branch whose merge base with HEAD holds the previous config
    #[arg(long, default_value = DEFAULT_BASE_BRANCH)]
    pub merge_base_branch: String,

    /// Docker Hub namespace new artifacts are mirrored into
    #[arg(long, default_value = "rancher")]
    pub docker_hub_namespace: String,
}

/// Runs the validate command.
pub async fn execute(paths: &Paths, args: &ValidateArgs) -> Result<()> {
    let config_path = &paths.config_path;
    info!(path = %config_path.display(), "validating config");

    let contents = std::fs::read_to_string(config_path)
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let config = Config::parse(&contents)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;

    let mut errors = duplicate_identities(&config, config_path);

    let git = GitCli::new();
    match load_merge_base_config(&git, &args.merge_base_branch, config_path).await {
        Ok(old) => {
            errors.extend(removed_tags(&old.artifacts, &config.artifacts));

            let target = format!("{DOCKER_HUB_HOST}/{}", args.docker_hub_namespace);
            let added = added_artifacts(&old, &config, &target);
            if !added.is_empty() {
                errors.extend(check_docker_hub(&args.docker_hub_namespace, &added).await);
            }
        }
        Err(e) => errors.push(format!(
            "failed to load {} from merge base {:?}: {e:#}",
            config_path.display(),
            args.merge_base_branch
        )),
    }

    if !errors.is_empty() {
        println!("validation failed");
        for error in &errors {
            println!("  ✗ {error}");
        }
        bail!("{} validation error(s) in {}", errors.len(), config_path.display());
    }

    println!("✓ {} is valid", config_path.display());
    Ok(())
}

/// Reports every artifact identity that appears more than once.
fn duplicate_identities(config: &Config, path: &Path) -> Vec<String> {
    let mut seen = BTreeSet::new();
    config
        .artifacts
        .iter()
        .filter(|artifact| !seen.insert(artifact.key()))
        .map(|artifact| {
            format!(
                "found multiple artifacts in {} with SourceArtifact {} and TargetArtifactName {}",
                path.display(),
                artifact.source_artifact(),
                artifact.target_artifact_name()
            )
        })
        .collect()
}

async fn load_merge_base_config(
    git: &dyn VersionControl,
    branch: &str,
    path: &Path,
) -> Result<Config> {
    let commit = git
        .merge_base(branch)
        .await
        .context("failed to get merge base")?;
    debug!(branch, commit = %commit, "resolved merge base");
    let contents = git
        .file_at_commit(&commit, &path.to_string_lossy())
        .await
        .with_context(|| format!("failed to get file content at {commit}"))?;
    Config::parse(&contents).with_context(|| format!("failed to parse old {}", path.display()))
}

/// Reports every tag present in `old` but missing from `new`.
fn removed_tags(old: &[Artifact], new: &[Artifact]) -> Vec<String> {
    let current: ArtifactAccumulator = new.iter().cloned().collect();
    old.iter()
        .filter_map(|artifact| current.tag_difference(artifact))
        .flat_map(|missing| {
            missing
                .tags()
                .iter()
                .map(|tag| {
                    format!(
                        "{}:{tag} removed (TargetArtifactName {:?})",
                        missing.source_artifact(),
                        missing.target_artifact_name()
                    )
                })
                .collect::<Vec<_>>()
        })
        .collect()
}

/// Returns artifacts absent from `old` that will be mirrored to `target`.
fn added_artifacts<'a>(old: &Config, new: &'a Config, target: &str) -> Vec<&'a Artifact> {
    let previous = old.accumulator();
    new.artifacts
        .iter()
        .filter(|artifact| !previous.contains(artifact))
        .filter(|artifact| {
            artifact.target_repositories().is_empty()
                || artifact.target_repositories().iter().any(|r| r == target)
        })
        .collect()
}

async fn check_docker_hub(namespace: &str, added: &[&Artifact]) -> Vec<String> {
    let transport = match ReqwestTransport::new(&HttpConfig::default()) {
        Ok(transport) => transport,
        Err(e) => return vec![format!("failed to build HTTP client: {e}")],
    };
    let client = DockerHubClient::new(RetryingClient::new(Arc::new(transport)));
    match client.list_repositories(namespace).await {
        Ok(existing) => missing_repositories(namespace, added, &existing),
        Err(e) => vec![format!(
            "failed to fetch existing repositories from dockerhub: {e}"
        )],
    }
}

fn missing_repositories(namespace: &str, added: &[&Artifact], existing: &[String]) -> Vec<String> {
    let existing: BTreeSet<&str> = existing.iter().map(String::as_str).collect();
    added
        .iter()
        .map(|artifact| artifact.target_artifact_name())
        .filter(|name| !existing.contains(name))
        .map(|name| format!("repository {namespace}/{name} does not exist on dockerhub"))
        .collect()
}
