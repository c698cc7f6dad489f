//! Reconciliation orchestrator.
//!
//! For each autoupdate entry the orchestrator:
//!
//! 1. asks the entry's strategy for the desired artifacts,
//! 2. diffs them against `config.yaml` with the accumulator,
//! 3. names a branch after the fingerprint of the new tags,
//! 4. stops if a pull request for that branch already exists,
//! 5. otherwise commits one config change per artifact, pushes, and opens
//!    a pull request.
//!
//! Entries run one at a time. A failing entry is recorded and the run moves
//! on to the next one.

use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;

use artifact_mirror_core::{fingerprint, regsync, Artifact, Config};
use tracing::{info, warn};

use crate::entry::ConfigEntry;
use crate::error::{AutoUpdateError, Result};
use crate::git::VersionControl;
use crate::github::{NewPullRequest, PullRequestService, Reviewers};
use crate::strategies::StrategyContext;

/// Branch pull requests are opened against.
pub const DEFAULT_BASE_BRANCH: &str = "master";

/// Remote branches are pushed to.
pub const DEFAULT_REMOTE: &str = "origin";

/// Where and how a run proposes changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoUpdateOptions {
    /// Owner of the mirror repository on GitHub.
    pub owner: String,
    /// Name of the mirror repository on GitHub.
    pub repo: String,
    /// Branch pull requests target.
    pub base_branch: String,
    /// Git remote to push to.
    pub remote: String,
    /// Only report what would be done.
    pub dry_run: bool,
    /// Path of `config.yaml`.
    pub config_path: PathBuf,
    /// Path of `regsync.yaml`.
    pub regsync_path: PathBuf,
}

impl AutoUpdateOptions {
    /// Creates options for `owner/repo` with the default branch, remote and
    /// file names.
    pub fn new(owner: impl Into<String>, repo: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            repo: repo.into(),
            base_branch: DEFAULT_BASE_BRANCH.to_string(),
            remote: DEFAULT_REMOTE.to_string(),
            dry_run: false,
            config_path: PathBuf::from("config.yaml"),
            regsync_path: PathBuf::from("regsync.yaml"),
        }
    }

    /// Sets dry-run mode.
    #[must_use]
    pub const fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Sets the base branch.
    #[must_use]
    pub fn with_base_branch(mut self, base_branch: impl Into<String>) -> Self {
        self.base_branch = base_branch.into();
        self
    }

    /// Sets the files rewritten on each commit.
    #[must_use]
    pub fn with_paths(
        mut self,
        config_path: impl Into<PathBuf>,
        regsync_path: impl Into<PathBuf>,
    ) -> Self {
        self.config_path = config_path.into();
        self.regsync_path = regsync_path.into();
        self
    }
}

/// What happened to one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryOutcome {
    /// Excluded by an entry filter.
    Skipped,
    /// Every discovered tag is already configured.
    NoUpdates,
    /// A pull request for the change-set already exists.
    ExistingPullRequest {
        /// `owner:branch`.
        head: String,
        /// Browser URL of the pull request.
        url: String,
    },
    /// Several pull requests share the head branch.
    MultiplePullRequests {
        /// `owner:branch`.
        head: String,
        /// Browser URLs of the pull requests.
        urls: Vec<String>,
    },
    /// Dry run: the pull request that would be opened.
    DryRun {
        /// Branch name.
        branch: String,
        /// Artifacts carrying only new tags.
        artifacts: Vec<Artifact>,
    },
    /// A pull request was opened.
    Created {
        /// Branch name.
        branch: String,
        /// Browser URL of the pull request.
        url: String,
    },
}

impl EntryOutcome {
    /// Renders the user-facing status line(s) for `entry`.
    #[must_use]
    pub fn report(&self, entry: &str) -> String {
        match self {
            Self::Skipped => format!("{entry}: skipped"),
            Self::NoUpdates => format!("{entry}: no updates found"),
            Self::ExistingPullRequest { head, url } => {
                format!("{entry}: found existing PR with head branch {head}: {url}")
            }
            Self::MultiplePullRequests { head, urls } => {
                let mut report =
                    format!("{entry}: warning: found multiple existing PRs with head branch {head}:");
                for url in urls {
                    let _ = write!(report, "\n- {url}");
                }
                report
            }
            Self::DryRun { branch, artifacts } => {
                let mut report = format!("{entry}: would make PR under branch {branch} that adds:");
                for reference in artifacts.iter().flat_map(Artifact::full_references) {
                    let _ = write!(report, "\n  - {reference}");
                }
                report
            }
            Self::Created { url, .. } => format!("{entry}: created pull request: {url}"),
        }
    }
}

/// Per-entry results of a run.
#[derive(Debug, Default)]
pub struct RunSummary {
    results: Vec<(String, Result<EntryOutcome>)>,
}

impl RunSummary {
    /// Returns every entry's result in run order.
    #[must_use]
    pub fn results(&self) -> &[(String, Result<EntryOutcome>)] {
        &self.results
    }

    /// Returns the entries that failed.
    pub fn failures(&self) -> impl Iterator<Item = (&str, &AutoUpdateError)> {
        self.results
            .iter()
            .filter_map(|(name, result)| result.as_ref().err().map(|e| (name.as_str(), e)))
    }

    /// Returns true if any entry failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failures().next().is_some()
    }

    /// Renders one report line per entry, errors included.
    #[must_use]
    pub fn report_lines(&self) -> Vec<String> {
        self.results
            .iter()
            .map(|(name, result)| match result {
                Ok(outcome) => outcome.report(name),
                Err(e) => format!("{name}: error: {e}"),
            })
            .collect()
    }
}

/// Returns the commit message for adding `artifact`'s tags.
#[must_use]
pub fn commit_message(artifact: &Artifact) -> String {
    format!(
        "Add tag(s) {} for artifact {}",
        artifact.tags().join(", "),
        artifact.source_artifact()
    )
}

/// Returns the pull request title for `entry`.
#[must_use]
pub fn pull_request_title(entry: &str, artifacts: &[Artifact]) -> String {
    let count: usize = artifacts.iter().map(|a| a.tags().len()).sum();
    format!("[autoupdate] Add {count} tag(s) for `{entry}`")
}

/// Returns the pull request body listing every new reference.
#[must_use]
pub fn pull_request_body(artifacts: &[Artifact]) -> String {
    let mut body = String::from(
        "This PR was created by the autoupdate workflow.\n\nIt adds the following artifact tags:",
    );
    for reference in artifacts.iter().flat_map(Artifact::full_references) {
        let _ = write!(body, "\n- `{reference}`");
    }
    body
}

/// Returns `autoupdate/<entry>/<fingerprint>`.
#[must_use]
pub fn branch_name(entry: &str, artifacts: &[Artifact]) -> String {
    format!("autoupdate/{entry}/{}", fingerprint(artifacts))
}

/// Runs autoupdate entries against a config.
pub struct AutoUpdater {
    context: StrategyContext,
    pulls: Arc<dyn PullRequestService>,
    git: Arc<dyn VersionControl>,
    options: AutoUpdateOptions,
}

impl std::fmt::Debug for AutoUpdater {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutoUpdater")
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl AutoUpdater {
    /// Creates an orchestrator.
    #[must_use]
    pub fn new(
        context: StrategyContext,
        pulls: Arc<dyn PullRequestService>,
        git: Arc<dyn VersionControl>,
        options: AutoUpdateOptions,
    ) -> Self {
        Self {
            context,
            pulls,
            git,
            options,
        }
    }

    /// Returns the options.
    #[must_use]
    pub const fn options(&self) -> &AutoUpdateOptions {
        &self.options
    }

    /// Discovers `entry`'s artifacts and returns only their tags missing
    /// from `config`, sorted by identity with sorted tags.
    ///
    /// # Errors
    ///
    /// Returns an error if the entry has no strategy or discovery fails.
    pub async fn new_artifacts(&self, entry: &ConfigEntry, config: &Config) -> Result<Vec<Artifact>> {
        let strategy = entry.strategy().ok_or_else(|| {
            AutoUpdateError::Validation(
                std::iter::once(
                    artifact_mirror_core::ValidationError::required("strategy")
                        .with_message("must specify an autoupdate strategy"),
                )
                .collect(),
            )
        })?;
        let discovered = strategy.discover(&self.context).await?;
        info!(entry = %entry.name, strategy = strategy.kind(), artifacts = discovered.len(), "discovered artifacts");

        let accumulator = config.accumulator();
        let mut new: Vec<Artifact> = discovered
            .iter()
            .filter_map(|artifact| accumulator.tag_difference(artifact))
            .collect();
        for artifact in &mut new {
            artifact.sort_tags();
        }
        new.sort_by_key(Artifact::key);
        Ok(new)
    }

    /// Runs one entry.
    ///
    /// # Errors
    ///
    /// Returns an error if discovery, GitHub, git, or a file write fails.
    pub async fn run_entry(&self, entry: &ConfigEntry, config: &Config) -> Result<EntryOutcome> {
        let new = self.new_artifacts(entry, config).await?;
        if new.is_empty() {
            return Ok(EntryOutcome::NoUpdates);
        }

        let branch = branch_name(&entry.name, &new);
        let head = format!("{}:{branch}", self.options.owner);
        let existing = self
            .pulls
            .list_pull_requests(&self.options.owner, &self.options.repo, &head, &self.options.base_branch)
            .await?;
        match existing.as_slice() {
            [] => {}
            [pull] => {
                return Ok(EntryOutcome::ExistingPullRequest {
                    head,
                    url: pull.html_url.clone(),
                })
            }
            pulls => {
                return Ok(EntryOutcome::MultiplePullRequests {
                    head,
                    urls: pulls.iter().map(|p| p.html_url.clone()).collect(),
                })
            }
        }

        if self.options.dry_run {
            return Ok(EntryOutcome::DryRun {
                branch,
                artifacts: new,
            });
        }

        self.propose(entry, config, branch, &new).await
    }

    async fn propose(
        &self,
        entry: &ConfigEntry,
        config: &Config,
        branch: String,
        new: &[Artifact],
    ) -> Result<EntryOutcome> {
        self.git
            .create_and_checkout_branch(&self.options.base_branch, &branch)
            .await?;

        let mut config = config.clone();
        let mut accumulator = config.accumulator();
        for artifact in new {
            accumulator.add(artifact.clone());
            config.replace_artifacts(&accumulator);
            config.write(&self.options.config_path)?;
            regsync::write_config(&self.options.regsync_path, &config.to_regsync_config())?;
            self.git.commit_all(&commit_message(artifact)).await?;
        }

        self.git.push_branch(&branch, &self.options.remote).await?;

        let pull = self
            .pulls
            .create_pull_request(
                &self.options.owner,
                &self.options.repo,
                &NewPullRequest {
                    title: pull_request_title(&entry.name, new),
                    head: branch.clone(),
                    base: self.options.base_branch.clone(),
                    body: pull_request_body(new),
                    maintainer_can_modify: true,
                },
            )
            .await?;
        info!(entry = %entry.name, url = %pull.html_url, "created pull request");

        self.pulls
            .request_reviewers(
                &self.options.owner,
                &self.options.repo,
                pull.number,
                &Reviewers::from_entries(&entry.reviewers),
            )
            .await?;

        Ok(EntryOutcome::Created {
            branch,
            url: pull.html_url,
        })
    }

    /// Runs every entry in order, or only the one named `only`.
    ///
    /// Each entry starts from `config` as given; failures are recorded and
    /// do not stop later entries.
    pub async fn run(&self, entries: &[ConfigEntry], config: &Config, only: Option<&str>) -> RunSummary {
        let mut summary = RunSummary::default();
        for entry in entries {
            if only.is_some_and(|name| name != entry.name) {
                summary.results.push((entry.name.clone(), Ok(EntryOutcome::Skipped)));
                continue;
            }
            let result = self.run_entry(entry, config).await;
            if let Err(e) = &result {
                warn!(entry = %entry.name, error = %e, "autoupdate entry failed");
            }
            summary.results.push((entry.name.clone(), result));
        }
        summary
    }
}
