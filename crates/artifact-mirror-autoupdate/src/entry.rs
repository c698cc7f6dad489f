//! The `autoupdate.yaml` document.
//!
//! Each [`ConfigEntry`] names exactly one update strategy and the reviewers
//! of the pull requests it produces. Entries are parsed strictly and
//! validated before anything touches the network.

use std::collections::BTreeSet;
use std::path::Path;

use artifact_mirror_core::artifact::DOCKER_IO_PREFIX;
use artifact_mirror_core::{Artifact, Validate, ValidationError, ValidationErrors};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AutoUpdateError, Result};
use crate::strategies::{
    GithubRelease, GithubTaggedImagesFile, HelmLatest, Registry, UpdateStrategy,
};

/// Selects which configured artifact receives discovered tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ArtifactRef {
    /// Source reference without a tag.
    #[serde(default)]
    pub source_artifact: String,
    /// Target name override; the default name is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_artifact_name: Option<String>,
}

impl ArtifactRef {
    /// Creates a reference using the default target name.
    pub fn new(source_artifact: impl Into<String>) -> Self {
        Self {
            source_artifact: source_artifact.into(),
            target_artifact_name: None,
        }
    }

    /// Sets the target name override.
    #[must_use]
    pub fn with_target_artifact_name(mut self, name: impl Into<String>) -> Self {
        self.target_artifact_name = Some(name.into());
        self
    }

    /// Builds the artifact this reference selects, carrying `tags`.
    ///
    /// # Errors
    ///
    /// Returns an error if the source reference is malformed.
    pub fn to_artifact(&self, tags: Vec<String>) -> Result<Artifact> {
        let mut artifact = Artifact::new(self.source_artifact.clone(), tags)?;
        if let Some(name) = &self.target_artifact_name {
            artifact.set_target_artifact_name(name.clone());
        }
        Ok(artifact)
    }

    /// Returns true if this reference names `repository`, ignoring an
    /// explicit `docker.io/` prefix on either side.
    #[must_use]
    pub fn selects(&self, repository: &str) -> bool {
        strip_docker_io(&self.source_artifact) == strip_docker_io(repository)
    }
}

impl Validate for ArtifactRef {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.source_artifact.is_empty() {
            errors.add(ValidationError::required("SourceArtifact"));
        } else if let Err(e) = Artifact::new(self.source_artifact.clone(), Vec::new()) {
            errors.add(ValidationError::format("SourceArtifact", e.to_string()));
        }
        errors.into_result()
    }
}

pub(crate) fn strip_docker_io(reference: &str) -> &str {
    reference.strip_prefix(DOCKER_IO_PREFIX).unwrap_or(reference)
}

/// Validates every reference in `refs`, reporting them as `field[i]`.
pub(crate) fn validate_refs(field: &str, refs: &[ArtifactRef], errors: &mut ValidationErrors) {
    for (index, artifact_ref) in refs.iter().enumerate() {
        if let Err(ref_errors) = artifact_ref.validate() {
            errors.merge_within(&format!("{field}[{index}]"), ref_errors);
        }
    }
}

/// One entry of `autoupdate.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", deny_unknown_fields)]
pub struct ConfigEntry {
    /// Entry name, used in branch names and output.
    #[serde(default)]
    pub name: String,
    /// Tags from GitHub releases.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_release: Option<GithubRelease>,
    /// Images listed in a file at each release tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github_tagged_images_file: Option<GithubTaggedImagesFile>,
    /// Images referenced by rendered Helm charts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_latest: Option<HelmLatest>,
    /// Tags listed by the upstream registry.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registry: Option<Registry>,
    /// GitHub users or `org/team` teams to request reviews from.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reviewers: Vec<String>,
}

impl ConfigEntry {
    /// Returns every configured strategy with its key.
    fn configured(&self) -> Vec<(&'static str, &dyn UpdateStrategy)> {
        let mut strategies: Vec<(&'static str, &dyn UpdateStrategy)> = Vec::new();
        if let Some(s) = &self.github_release {
            strategies.push(("GithubRelease", s as &dyn UpdateStrategy));
        }
        if let Some(s) = &self.github_tagged_images_file {
            strategies.push(("GithubTaggedImagesFile", s as &dyn UpdateStrategy));
        }
        if let Some(s) = &self.helm_latest {
            strategies.push(("HelmLatest", s as &dyn UpdateStrategy));
        }
        if let Some(s) = &self.registry {
            strategies.push(("Registry", s as &dyn UpdateStrategy));
        }
        strategies
    }

    /// Returns the entry's strategy, or `None` if none is configured.
    #[must_use]
    pub fn strategy(&self) -> Option<&dyn UpdateStrategy> {
        self.configured().into_iter().next().map(|(_, strategy)| strategy)
    }
}

impl Validate for ConfigEntry {
    fn validate(&self) -> std::result::Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if self.name.is_empty() {
            errors.add(ValidationError::required("Name"));
        }

        let strategies = self.configured();
        match strategies.len() {
            0 => errors.add(ValidationError::required("strategy").with_message(
                "must specify an autoupdate strategy",
            )),
            1 => {}
            _ => errors.add(ValidationError::conflict(
                "strategy",
                "must specify only one autoupdate strategy",
            )),
        }
        for (key, strategy) in strategies {
            if let Err(strategy_errors) = strategy.validate() {
                errors.merge_within(key, strategy_errors);
            }
        }

        if self.reviewers.is_empty() {
            errors.add(ValidationError::empty("Reviewers").with_message(
                "must specify at least one reviewer",
            ));
        }
        for reviewer in &self.reviewers {
            if let Err(error) = validate_reviewer(reviewer) {
                errors.add(error);
            }
        }
        errors.into_result()
    }
}

/// Checks that `reviewer` is a login or `org/team`.
///
/// # Errors
///
/// Returns a format error for more than one `/` or an empty half.
pub fn validate_reviewer(reviewer: &str) -> std::result::Result<(), ValidationError> {
    let parts: Vec<&str> = reviewer.split('/').collect();
    if parts.len() > 2 {
        return Err(ValidationError::format(
            "Reviewers",
            format!("invalid reviewer format for {reviewer:?}: must be a username or in 'org/team' format"),
        ));
    }
    if parts.len() == 2 && (parts[0].is_empty() || parts[1].is_empty()) {
        return Err(ValidationError::format(
            "Reviewers",
            format!("invalid reviewer format for {reviewer:?}: org and team must not be empty"),
        ));
    }
    Ok(())
}

/// Parses and validates an `autoupdate.yaml` document.
///
/// # Errors
///
/// Returns an error on malformed YAML, unknown keys, any invalid entry, or
/// two entries with the same name.
pub fn parse_entries(contents: &str) -> Result<Vec<ConfigEntry>> {
    let entries: Vec<ConfigEntry> = serde_yaml::from_str(contents)?;
    let mut errors = ValidationErrors::new();
    let mut names = BTreeSet::new();
    for (index, entry) in entries.iter().enumerate() {
        let label = if entry.name.is_empty() {
            format!("[{index}]")
        } else {
            entry.name.clone()
        };
        if let Err(entry_errors) = entry.validate() {
            errors.merge_within(&label, entry_errors);
        }
        if !entry.name.is_empty() && !names.insert(entry.name.as_str()) {
            errors.add(ValidationError::duplicate(
                "Name",
                format!("found multiple entries named {:?}", entry.name),
            ));
        }
    }
    errors.into_result()?;
    Ok(entries)
}

/// Reads and parses the entries file at `path`.
///
/// # Errors
///
/// Returns an error if the file cannot be read or fails [`parse_entries`].
pub fn load_entries(path: impl AsRef<Path>) -> Result<Vec<ConfigEntry>> {
    let path = path.as_ref();
    let contents = std::fs::read_to_string(path).map_err(|e| AutoUpdateError::io(path, e))?;
    let entries = parse_entries(&contents)?;
    debug!(path = %path.display(), entries = entries.len(), "loaded autoupdate entries");
    Ok(entries)
}

/// Sorts entries by name (stable) and rewrites the file at `path`.
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub fn write_entries(path: impl AsRef<Path>, entries: &mut [ConfigEntry]) -> Result<()> {
    let path = path.as_ref();
    entries.sort_by(|a, b| a.name.cmp(&b.name));
    let contents = serde_yaml::to_string(entries)?;
    std::fs::write(path, contents).map_err(|e| AutoUpdateError::io(path, e))
}
