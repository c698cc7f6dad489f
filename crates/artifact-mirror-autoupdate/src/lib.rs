//! # Artifact Mirror Autoupdate
//!
//! Discovers new upstream tags for configured artifacts and proposes them
//! as pull requests against `config.yaml`.
//!
//! This crate provides:
//!
//! - [`ConfigEntry`] - One `autoupdate.yaml` entry and its validation
//! - [`strategies`] - GitHub release, tagged image file, Helm chart and registry strategies
//! - [`AutoUpdater`] - The per-entry diff, branch naming and pull request flow
//! - [`github`], [`helm`], [`git`] - Collaborators behind traits so runs can be faked
//!
//! ## Flow
//!
//! ```text
//! ConfigEntry ──> UpdateStrategy::discover ──> ArtifactAccumulator::tag_difference
//!                                                     │
//!                                   fingerprint ──> branch ──> PullRequestService
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod entry;
mod error;
pub mod git;
pub mod github;
pub mod helm;
pub mod orchestrator;
pub mod strategies;

pub use entry::{load_entries, parse_entries, write_entries, ArtifactRef, ConfigEntry};
pub use error::{AutoUpdateError, Result};
pub use git::{GitCli, VersionControl};
pub use github::{GithubClient, PullRequestService, ReleaseSource};
pub use helm::{HelmCli, HelmTemplater};
pub use orchestrator::{AutoUpdateOptions, AutoUpdater, EntryOutcome, RunSummary};
pub use strategies::{StrategyContext, UpdateStrategy};
